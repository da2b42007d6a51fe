//! Scenario runner: scripted input with checks against simulator state.
//!
//! Each scenario runs on a fresh [`Simulator`]. A failing check stops its
//! own scenario only; the remaining scenarios still run.

use std::fmt;

use cartridge_types::{Expr, Program};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::input::Buttons;
use crate::simulator::{Simulator, Snapshot};

/// A condition that must hold after a given tick (0 = before any step).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub after_tick: u32,
    pub condition: Expr,
    pub message: String,
}

impl Check {
    pub fn new(after_tick: u32, condition: Expr, message: impl Into<String>) -> Self {
        Self {
            after_tick,
            condition,
            message: message.into(),
        }
    }
}

/// An input script plus the checks to run along the way. The script is
/// padded with released buttons up to the last check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub inputs: Vec<Buttons>,
    pub checks: Vec<Check>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            checks: Vec::new(),
        }
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = Buttons>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn check(mut self, after_tick: u32, condition: Expr, message: impl Into<String>) -> Self {
        self.checks.push(Check::new(after_tick, condition, message));
        self
    }

    fn ticks(&self) -> u32 {
        let last_check = self.checks.iter().map(|c| c.after_tick).max().unwrap_or(0);
        last_check.max(self.inputs.len() as u32)
    }
}

/// Why a scenario failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioFailure {
    /// A check's condition evaluated to zero.
    Assertion {
        tick: u32,
        message: String,
        condition: String,
        snapshot: Box<Snapshot>,
    },
    /// The simulator itself reported an error.
    Error { tick: u32, error: SimError },
}

impl fmt::Display for ScenarioFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Assertion {
                tick,
                message,
                condition,
                ..
            } => write!(f, "tick {tick}: {message} ({condition} was false)"),
            Self::Error { tick, error } => write!(f, "tick {tick}: {error}"),
        }
    }
}

/// Result of running a single scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioResult {
    pub name: String,
    pub failure: Option<ScenarioFailure>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.failure {
            None => write!(f, "  ok   {}", self.name),
            Some(failure) => write!(f, "  FAIL {}: {failure}", self.name),
        }
    }
}

/// Summary of running a batch of scenarios.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub results: Vec<ScenarioResult>,
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.results {
            writeln!(f, "{r}")?;
        }
        writeln!(f, "\n{} passed, {} failed", self.passed, self.failed)
    }
}

/// Run every scenario against `program`.
pub fn run_scenarios(program: &Program, scenarios: &[Scenario]) -> RunSummary {
    let results: Vec<ScenarioResult> = scenarios
        .iter()
        .map(|s| ScenarioResult {
            name: s.name.clone(),
            failure: run_scenario(program, s).err(),
        })
        .collect();
    let passed = results.iter().filter(|r| r.passed()).count();
    let failed = results.len() - passed;
    RunSummary {
        results,
        passed,
        failed,
    }
}

fn run_scenario(program: &Program, scenario: &Scenario) -> Result<(), ScenarioFailure> {
    let mut sim = Simulator::new(program).map_err(|error| ScenarioFailure::Error { tick: 0, error })?;
    verify(&sim, scenario, 0)?;
    for tick in 1..=scenario.ticks() {
        let buttons = scenario
            .inputs
            .get(tick as usize - 1)
            .copied()
            .unwrap_or(Buttons::NONE);
        sim.step(buttons)
            .map_err(|error| ScenarioFailure::Error { tick, error })?;
        verify(&sim, scenario, tick)?;
    }
    Ok(())
}

fn verify(sim: &Simulator<'_>, scenario: &Scenario, tick: u32) -> Result<(), ScenarioFailure> {
    for check in scenario.checks.iter().filter(|c| c.after_tick == tick) {
        let value = sim
            .eval(&check.condition)
            .map_err(|error| ScenarioFailure::Error { tick, error })?;
        if !value.is_truthy() {
            return Err(ScenarioFailure::Assertion {
                tick,
                message: check.message.clone(),
                condition: check.condition.to_string(),
                snapshot: Box::new(sim.snapshot()),
            });
        }
    }
    Ok(())
}
