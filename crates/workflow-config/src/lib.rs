//! Workflow configuration for keyflow: groups, workflows, triggers and
//! engine settings, plus a RON loader for development and tooling.
//!
//! These types are the configuration snapshot the engine rebuilds from. The
//! engine never owns persistence; it receives a `Configuration` plus a
//! version number from whoever does.
#![allow(missing_docs)]

use std::{
    env,
    path::{Path, PathBuf},
};

mod defaults;
mod error;
mod loader;
mod settings;
mod types;
mod validate;

#[cfg(test)]
mod test_parse;

pub use error::Error;
pub use loader::{load_from_path, load_from_str};
pub use settings::EngineSettings;
pub use types::{
    AppContext, ApplicationTrigger, Command, CommandKind, Configuration, ExecutionMode, Remap,
    RemapAction, Rule, Trigger, Workflow, WorkflowGroup, GLOBAL_SCOPE,
};
pub use validate::Diagnostic;

/// Determine the preferred user config path (`~/.keyflow/workflows.ron`).
pub fn default_config_path() -> PathBuf {
    let mut p = PathBuf::from(env::var_os("HOME").unwrap_or_default());
    p.push(".keyflow");
    p.push("workflows.ron");
    p
}

/// Resolve the effective config path: `explicit` when given, else the
/// default path when it exists, else a read error naming the default path.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, Error> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }

    let preferred = default_config_path();
    if preferred.exists() {
        return Ok(preferred);
    }

    Err(Error::Read {
        path: Some(preferred),
        message: "No config found. Create ~/.keyflow/workflows.ron or pass --config".to_string(),
    })
}
