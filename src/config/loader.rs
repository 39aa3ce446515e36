// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Configuration loading from the two-file layout (`spec.md` §6).
//!
//! # Loader pipeline
//!
//! Global and project configs are independent YAML documents with disjoint
//! shapes (`GlobalConfig` vs `ProjectConfig`), so each layer gets its own
//! `config` crate pipeline; the two are only joined afterwards into a
//! [`super::merge::ResolvedConfig`].
//!
//! ```text
//! ConfigLoader::new()
//!   .global_file(opt)
//!   .project_file_optional(opt)
//!   .with_env_prefix()
//!        |
//!        v
//!    build() --> ResolvedConfig (validated)
//! ```

use std::path::{Path, PathBuf};

use super::merge::ResolvedConfig;
use super::types::{ConfigSource, GlobalConfig, ProjectConfig};
use super::validator;
use crate::error::Result;

/// Builder for loading the global and project configuration layers.
pub struct ConfigLoader {
    global_builder: config::ConfigBuilder<config::builder::DefaultState>,
    project_builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: Option<String>,
    global_file: Option<PathBuf>,
    project_file: Option<PathBuf>,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self {
            global_builder: config::Config::builder(),
            project_builder: config::Config::builder(),
            env_prefix: None,
            global_file: None,
            project_file: None,
        }
    }

    /// Adds the global fleet config file. Missing is not an error: an
    /// absent `<home>/.rr/config.yaml` means "no hosts configured yet".
    #[must_use]
    pub fn global_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        use config::{File, FileFormat};
        let p = path.as_ref();
        self.global_builder = self
            .global_builder
            .add_source(File::from(p.to_path_buf()).format(FileFormat::Yaml).required(false));
        if p.is_file() {
            self.global_file = Some(p.to_path_buf());
        }
        self
    }

    #[must_use]
    pub fn global_yaml_str(mut self, content: &str) -> Self {
        use config::{File, FileFormat};
        self.global_builder = self.global_builder.add_source(File::from_str(content, FileFormat::Yaml));
        self.global_file = Some(PathBuf::from("<string>"));
        self
    }

    /// Adds the per-project config file, as found by
    /// [`super::paths::find_project_config`]. A `None` path means no
    /// `.rr.yaml` was found; this is not an error.
    #[must_use]
    pub fn project_file_optional(mut self, path: Option<&Path>) -> Self {
        use config::{File, FileFormat};
        if let Some(p) = path {
            self.project_builder = self
                .project_builder
                .add_source(File::from(p.to_path_buf()).format(FileFormat::Yaml).required(false));
            if p.is_file() {
                self.project_file = Some(p.to_path_buf());
            }
        }
        self
    }

    #[must_use]
    pub fn project_yaml_str(mut self, content: &str) -> Self {
        use config::{File, FileFormat};
        self.project_builder = self.project_builder.add_source(File::from_str(content, FileFormat::Yaml));
        self.project_file = Some(PathBuf::from("<string>"));
        self
    }

    /// Installs an environment-variable override layer: `<prefix>_GLOBAL_*`
    /// overrides global fields, `<prefix>_PROJECT_*` overrides project
    /// fields (mirroring the teacher's `MOB_*` mapping, split across the
    /// two config layers since they deny unknown fields independently).
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }

    /// Builds and validates the resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Either file has invalid YAML syntax or an unrecognised field.
    /// - Environment variable overrides cannot be parsed.
    /// - The merged view fails C2 validation.
    pub fn build(self) -> Result<ResolvedConfig> {
        let global_builder = match &self.env_prefix {
            Some(prefix) => self.global_builder.add_source(
                config::Environment::with_prefix(&format!("{prefix}_GLOBAL"))
                    .separator("_")
                    .try_parsing(true),
            ),
            None => self.global_builder,
        };
        let project_builder = match &self.env_prefix {
            Some(prefix) => self.project_builder.add_source(
                config::Environment::with_prefix(&format!("{prefix}_PROJECT"))
                    .separator("_")
                    .try_parsing(true),
            ),
            None => self.project_builder,
        };

        let global: GlobalConfig = global_builder.build()?.try_deserialize()?;
        let project: ProjectConfig = project_builder.build()?.try_deserialize()?;

        let source = match (self.global_file.is_some(), self.project_file.is_some()) {
            (true, true) => ConfigSource::Both,
            (true, false) => ConfigSource::GlobalOnly,
            (false, _) => ConfigSource::ProjectOnly,
        };

        let resolved = ResolvedConfig::new(global, project, source);
        validator::validate(&resolved)?;
        Ok(resolved)
    }

    /// Loads using the standard file locations: the global config at
    /// `<home>/.rr/config.yaml`, and the project config found by walking
    /// upward from `cwd` (`spec.md` §6).
    ///
    /// # Errors
    ///
    /// See [`Self::build`].
    pub fn load_standard(cwd: &Path) -> Result<ResolvedConfig> {
        let mut loader = Self::new().with_env_prefix("RR");
        if let Some(global_path) = super::paths::global_config_path() {
            loader = loader.global_file(global_path);
        }
        let project_path = super::paths::find_project_config(cwd);
        loader = loader.project_file_optional(project_path.as_deref());
        loader.build()
    }

    #[must_use]
    pub fn loaded_files(&self) -> Vec<(String, PathBuf)> {
        let mut files = Vec::new();
        if let Some(p) = &self.global_file {
            files.push(("global".to_string(), p.clone()));
        }
        if let Some(p) = &self.project_file {
            files.push(("project".to_string(), p.clone()));
        }
        files
    }

    #[must_use]
    pub fn format_loaded_files(&self) -> Vec<String> {
        self.loaded_files()
            .iter()
            .enumerate()
            .map(|(i, (source, path))| format!("{}. [{}] {}", i + 1, source, path.display()))
            .collect()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
