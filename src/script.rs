//! Script host: compiles scripts and swaps their bindings into the registry.
//!
//! A load is all-or-nothing. When compilation or a load-time unit fails the
//! registry is left untouched and the previous script keeps running.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use thiserror::Error;
use tracing::{error, info};

use crate::builtins::BuiltinTable;
use crate::dsl::{Compiler, LoadEffect, ScriptError};
use crate::hotkey::{HotkeyRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("cannot read {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// What a successful load did.
#[derive(Debug)]
pub struct LoadReport {
    pub effects: Vec<LoadEffect>,
    pub registered: usize,
    /// Patterns that could not be grabbed. The rest of the script is active.
    pub failed: Vec<RegistryError>,
}

struct Watched {
    path: PathBuf,
    modified: Option<SystemTime>,
}

pub struct ScriptHost {
    builtins: Arc<BuiltinTable>,
    registry: Arc<HotkeyRegistry>,
    watched: Option<Watched>,
}

impl ScriptHost {
    pub fn new(builtins: Arc<BuiltinTable>, registry: Arc<HotkeyRegistry>) -> Self {
        Self {
            builtins,
            registry,
            watched: None,
        }
    }

    pub fn registry(&self) -> Arc<HotkeyRegistry> {
        Arc::clone(&self.registry)
    }

    /// Compile `source` and, on success, replace the active bindings.
    pub fn load_source(&mut self, source: &str) -> Result<LoadReport, ScriptError> {
        let script = Compiler::compile(source, &self.builtins).map_err(|e| {
            error!(error = %e, "script rejected; previous bindings stay active");
            e
        })?;

        let install = self.registry.install(script.bindings);
        info!(
            effects = script.effects.len(),
            registered = install.registered.len(),
            "script loaded"
        );
        Ok(LoadReport {
            effects: script.effects,
            registered: install.registered.len(),
            failed: install.failed,
        })
    }

    /// Load a script file and watch it for [`ScriptHost::reload_if_changed`].
    pub fn load_file(&mut self, path: &Path) -> Result<LoadReport, HostError> {
        let modified = modified_time(path);
        self.watched = Some(Watched {
            path: path.to_path_buf(),
            modified,
        });
        let source = fs::read_to_string(path).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.load_source(&source)?)
    }

    /// Reload the watched file if its modification time moved.
    pub fn reload_if_changed(&mut self) -> Option<Result<LoadReport, HostError>> {
        let watched = self.watched.as_ref()?;
        let current = modified_time(&watched.path);
        if current == watched.modified {
            return None;
        }
        let path = watched.path.clone();
        info!(path = %path.display(), "script changed; reloading");
        Some(self.load_file(&path))
    }

    /// Drop every binding and stop watching.
    pub fn unload(&mut self) {
        self.registry.clear();
        self.watched = None;
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::Value;
    use crate::hotkey::{DispatchConfig, DispatchOutcome, KeyEvent, TerminalGrabber};
    use std::fs::File;
    use std::time::Duration;

    fn host() -> ScriptHost {
        let mut table = BuiltinTable::new();
        table.register("echo", 1, |args| Ok(args[0].clone()));
        let config = DispatchConfig {
            sync_budget: Duration::from_secs(5),
            ..DispatchConfig::default()
        };
        let registry = HotkeyRegistry::new(Arc::new(TerminalGrabber::new()), config).unwrap();
        ScriptHost::new(Arc::new(table), Arc::new(registry))
    }

    fn press(host: &ScriptHost, s: &str) -> DispatchOutcome {
        host.registry()
            .on_event(&KeyEvent::from_pattern(&s.parse().unwrap()))
    }

    #[test]
    fn failed_load_keeps_previous_bindings() {
        let mut host = host();
        host.load_source("F1 => echo(1)").unwrap();
        assert!(host.load_source("F1 => echo(").is_err());
        assert!(host.load_source("F1 => missing()").is_err());
        assert_eq!(press(&host, "F1"), DispatchOutcome::Completed(Value::Number(1.0)));
    }

    #[test]
    fn load_reports_effects() {
        let mut host = host();
        let report = host
            .load_source("let a = echo(\"x\")\na + \"y\"\nF2 => echo(a)")
            .unwrap();
        assert_eq!(report.registered, 1);
        assert_eq!(report.effects[1].value, Value::from("xy"));
        assert_eq!(press(&host, "F2"), DispatchOutcome::Completed(Value::from("x")));
    }

    #[test]
    fn reload_when_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.hs");
        fs::write(&path, "F1 => echo(1)").unwrap();

        let mut host = host();
        host.load_file(&path).unwrap();
        assert!(host.reload_if_changed().is_none());

        fs::write(&path, "F1 => echo(2)").unwrap();
        let later = SystemTime::now() + Duration::from_secs(5);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();

        let report = host.reload_if_changed().unwrap().unwrap();
        assert_eq!(report.registered, 1);
        assert_eq!(press(&host, "F1"), DispatchOutcome::Completed(Value::Number(2.0)));
        assert!(host.reload_if_changed().is_none());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = host();
        let err = host.load_file(&dir.path().join("absent.hs")).unwrap_err();
        assert!(matches!(err, HostError::Io { .. }));
    }

    #[test]
    fn unload_clears_registry() {
        let mut host = host();
        host.load_source("F1 => echo(1)").unwrap();
        host.unload();
        assert_eq!(press(&host, "F1"), DispatchOutcome::NoMatch);
    }
}
