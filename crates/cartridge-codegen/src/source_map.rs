//! Source mapping: generated C function → game description location.
//!
//! Each entry maps one emitted scene hook function to the line where it
//! starts in the C output and to the builder call that declared the scene,
//! so toolchain diagnostics can be traced back to the description.

use cartridge_types::{Hook, SourceLocation};
use serde::{Deserialize, Serialize};

/// A complete source map for one generated file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMap {
    pub entries: Vec<SourceMapEntry>,
}

/// One generated function → one scene hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapEntry {
    /// C function name (e.g. `scene_title_frame`).
    pub func_name: String,
    pub scene: String,
    pub hook: Hook,
    /// 1-based line of the function definition in the C output.
    pub c_line: u32,
    /// Where the scene was declared, when the builder captured it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub location: Option<SourceLocation>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn push(
        &mut self,
        func_name: impl Into<String>,
        scene: impl Into<String>,
        hook: Hook,
        c_line: u32,
        location: Option<SourceLocation>,
    ) {
        self.entries.push(SourceMapEntry {
            func_name: func_name.into(),
            scene: scene.into(),
            hook,
            c_line,
            location,
        });
    }

    pub fn find_by_func_name(&self, name: &str) -> Option<&SourceMapEntry> {
        self.entries.iter().find(|e| e.func_name == name)
    }

    /// The function containing a given C line, if it is a scene hook.
    pub fn find_by_c_line(&self, line: u32) -> Option<&SourceMapEntry> {
        self.entries.iter().rev().find(|e| e.c_line <= line)
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }

    /// Deserialize from JSON bytes.
    pub fn from_json(data: &[u8]) -> Option<Self> {
        serde_json::from_slice(data).ok()
    }
}
