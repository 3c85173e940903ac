// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::defaults::BUILTIN_CONFIG;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (task graph correctness, required fields). Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    load_from_str(&contents)
}

pub fn load_from_str(contents: &str) -> Result<RawConfigFile> {
    let config: RawConfigFile = toml::from_str(contents)?;
    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// The built-in pipeline, validated.
pub fn builtin() -> Result<ConfigFile> {
    ConfigFile::try_from(load_from_str(BUILTIN_CONFIG)?)
}

/// Load `path`, falling back to the built-in pipeline when `path` is the
/// default location and no file exists there.
///
/// An explicitly requested file that does not exist is an error.
pub fn load_or_builtin(path: &Path) -> Result<ConfigFile> {
    if !path.exists() && path == default_config_path() {
        info!(
            path = %path.display(),
            "no config file found; using built-in pipeline"
        );
        return builtin();
    }
    load_and_validate(path)
}

/// Default config location: `Rebundle.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Rebundle.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskId;

    #[test]
    fn builtin_pipeline_is_valid() {
        let cfg = builtin().unwrap();
        let graph = cfg.graph();

        for name in [
            "clean",
            "lint-js",
            "lint-python",
            "lint",
            "bootstrap-files",
            "select2-files",
            "webshim-files",
            "frontend-files",
            "postcss",
            "browserify",
            "watch-css",
            "livereload",
            "build",
            "default",
        ] {
            assert!(graph.contains(name), "missing task {name}");
        }

        let build = graph.closure_of(&TaskId::new("build")).unwrap();
        assert!(build.contains("browserify"));
        assert!(build.contains("webshim-files"));
        assert!(!build.contains("watch-css"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_or_builtin(&dir.path().join("Custom.toml")).unwrap_err();
        assert!(matches!(err, crate::errors::RebundleError::IoError(_)));
    }
}
