//! Compile options.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// What to do with scene-graph findings (dangling `go_to` targets and
/// scenes unreachable from the start scene).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneGraphPolicy {
    /// Skip the pass.
    Allow,
    /// Report findings as warnings on the [`crate::Compilation`].
    #[default]
    Warn,
    /// Fail with [`CompileError::SceneGraph`].
    Deny,
}

/// Options for [`crate::compile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    pub scene_graph: SceneGraphPolicy,
    /// Directory asset paths are resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_dir: Option<PathBuf>,
    /// Attach the scene-function source map to the result.
    pub emit_source_map: bool,
}

impl CompileOptions {
    /// Parse options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> CompileResult<Self> {
        serde_json::from_str(json).map_err(|e| CompileError::InvalidOptions(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    pub fn with_scene_graph(mut self, policy: SceneGraphPolicy) -> Self {
        self.scene_graph = policy;
        self
    }

    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = Some(dir.into());
        self
    }

    pub fn with_source_map(mut self) -> Self {
        self.emit_source_map = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_warn_without_source_map() {
        let opts = CompileOptions::default();
        assert_eq!(opts.scene_graph, SceneGraphPolicy::Warn);
        assert!(opts.asset_dir.is_none());
        assert!(!opts.emit_source_map);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let opts = CompileOptions::from_json(r#"{ "scene_graph": "deny" }"#).unwrap();
        assert_eq!(opts.scene_graph, SceneGraphPolicy::Deny);
        assert!(!opts.emit_source_map);

        let opts = CompileOptions::from_json(r#"{ "asset_dir": "res", "emit_source_map": true }"#)
            .unwrap();
        assert_eq!(opts.asset_dir, Some(PathBuf::from("res")));
        assert_eq!(opts.scene_graph, SceneGraphPolicy::Warn);
    }

    #[test]
    fn unknown_policy_is_invalid() {
        let err = CompileOptions::from_json(r#"{ "scene_graph": "maybe" }"#).unwrap_err();
        assert!(matches!(err, CompileError::InvalidOptions(_)));
    }

    #[test]
    fn json_roundtrip() {
        let opts = CompileOptions::default()
            .with_scene_graph(SceneGraphPolicy::Allow)
            .with_asset_dir("assets")
            .with_source_map();
        assert_eq!(CompileOptions::from_json(&opts.to_json()).unwrap(), opts);
    }
}
