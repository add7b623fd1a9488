//! Compiler configuration.
//!
//! Options the driver (or an embedding project) hands to the pipeline:
//! whether the embedded runtime manifest applies, and any additional
//! manifests to layer on top of it.

use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct CompilerConfig {
    /// Skip the embedded runtime manifest (`--freestanding`); programs
    /// must declare every function they call.
    pub freestanding: bool,

    /// Extra runtime manifests to load, in order, after the embedded
    /// one.
    pub runtime_manifest_paths: Vec<PathBuf>,
}

impl CompilerConfig {
    pub fn new() -> Self {
        CompilerConfig::default()
    }

    pub fn freestanding(mut self) -> Self {
        self.freestanding = true;
        self
    }

    pub fn with_runtime_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.runtime_manifest_paths.push(path.into());
        self
    }

    pub fn with_runtime_manifests(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.runtime_manifest_paths.extend(paths);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_uses_runtime() {
        let config = CompilerConfig::default();
        assert!(!config.freestanding);
        assert!(config.runtime_manifest_paths.is_empty());
    }

    #[test]
    fn test_builder() {
        let config = CompilerConfig::new()
            .freestanding()
            .with_runtime_manifest("extra.toml");
        assert!(config.freestanding);
        assert_eq!(config.runtime_manifest_paths, vec![PathBuf::from("extra.toml")]);
    }
}
