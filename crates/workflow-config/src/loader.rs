//! Parse and load workflow configuration.

use std::{ffi::OsStr, fs, path::Path};

use tracing::{debug, warn};

use crate::{Configuration, Diagnostic, Error, validate};

/// Load a configuration from a RON file at `path`.
///
/// Definitions that parse but cannot be used are logged and kept; the engine
/// skips them at rebuild time.
pub fn load_from_path(path: &Path) -> Result<Configuration, Error> {
    if path.extension() != Some(OsStr::new("ron")) {
        return Err(Error::Read {
            path: Some(path.to_path_buf()),
            message: "Unsupported config format (expected a .ron file)".to_string(),
        });
    }
    let source = fs::read_to_string(path).map_err(|e| Error::Read {
        path: Some(path.to_path_buf()),
        message: e.to_string(),
    })?;
    load_from_str(&source, Some(path))
}

/// Parse a configuration from RON text. `path` is only used for error context.
pub fn load_from_str(source: &str, path: Option<&Path>) -> Result<Configuration, Error> {
    let config: Configuration = ron::from_str(source).map_err(|e| Error::Parse {
        path: path.map(Path::to_path_buf),
        message: e.to_string(),
    })?;
    for d in config.diagnostics() {
        warn!(group = %d.group, workflow = %d.workflow, "{}", d.message);
    }
    debug!(
        groups = config.groups.len(),
        workflows = config.groups.iter().map(|g| g.workflows.len()).sum::<usize>(),
        "config_loaded"
    );
    Ok(config)
}

impl Configuration {
    /// Parse a configuration from RON text without path context.
    pub fn from_ron(source: &str) -> Result<Self, Error> {
        load_from_str(source, None)
    }

    /// Every problem the engine would skip at rebuild time, in file order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        validate::diagnostics(self)
    }

    /// Fail on the first diagnostic, for callers that want strict loading.
    pub fn validate(&self) -> Result<(), Error> {
        match self.diagnostics().into_iter().next() {
            None => Ok(()),
            Some(d) => Err(Error::Validation {
                path: None,
                message: format!("{}/{}: {}", d.group, d.workflow, d.message),
            }),
        }
    }
}
