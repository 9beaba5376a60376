// File: args.rs
// License: Apache v2.0

use super::error::{Result, SceneError};
use clap::Parser;
use std::path::Path;

#[derive(Parser, Debug, Clone, serde::Serialize, serde::Deserialize)]
#[clap(author, version, about, long_about = None)]
pub struct ProgramArgs {
    /// Directory written by `FixedScene::export_fixed`.
    #[clap(long, default_value = "")]
    pub path: String,
}

/// Authoring defaults shared by every object of a scene.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SceneArgs {
    pub default_color: [f64; 3],
    pub static_color: [f64; 3],
    pub color_saturation: f64,
    pub color_value: f64,
    pub orthogonal_eps: f64,
    pub grab_eps: f64,
}

impl Default for SceneArgs {
    fn default() -> Self {
        Self {
            default_color: [1.0, 0.85, 0.0],
            static_color: [0.75, 0.75, 0.75],
            color_saturation: 0.75,
            color_value: 1.0,
            orthogonal_eps: 1e-3,
            grab_eps: 1e-3,
        }
    }
}

impl SceneArgs {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SceneError::io(path, e))?;
        Ok(toml::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let args: SceneArgs = toml::from_str("grab_eps = 0.01\n").unwrap();
        assert_eq!(args.grab_eps, 0.01);
        assert_eq!(args.static_color, [0.75, 0.75, 0.75]);
        assert_eq!(args.color_saturation, 0.75);
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.toml");
        std::fs::write(&path, "default_color = [0.1, 0.2, 0.3]\n").unwrap();
        let args = SceneArgs::load(&path).unwrap();
        assert_eq!(args.default_color, [0.1, 0.2, 0.3]);
        assert!(matches!(
            SceneArgs::load(dir.path().join("missing.toml")),
            Err(SceneError::Io { .. })
        ));
    }
}
