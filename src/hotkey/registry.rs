//! Hotkey registry and trigger dispatch.
//!
//! Owned entries hold the grab for their pattern and release it when
//! dropped. Dispatch reads an immutable [`DispatchTable`] published behind a
//! lock as a single `Arc`, so a reload swaps every binding at once: an event
//! sees either the complete old set or the complete new one.
//!
//! Units never run on the input thread. Sync units run on a dispatch thread
//! while the input thread waits at most the sync budget for the result; a
//! unit that overruns keeps running there and its binding is escalated, so
//! later triggers go straight to the background worker.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SendError};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::event::KeyEvent;
use super::grab::{GrabHandle, KeyGrabber};
use super::pattern::HotkeyPattern;
use super::worker::{Job, Worker};
use crate::dsl::{CompiledUnit, HotkeyBinding, RuntimeError, Value};

/// Identifies one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationHandle(u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("could not grab {pattern}: {reason}")]
    OsGrabFailed {
        pattern: HotkeyPattern,
        reason: String,
    },
    #[error("registration {0:?} is not active")]
    UnknownHandle(RegistrationHandle),
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Longest the input thread waits for a sync unit. Units that overrun
    /// finish in the background and are escalated.
    pub sync_budget: Duration,
    pub worker_queue: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            sync_budget: Duration::from_millis(16),
            worker_queue: 32,
        }
    }
}

/// What happened to one key event.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    NoMatch,
    Completed(Value),
    /// The unit raised a runtime error; the binding stays registered.
    Failed(RuntimeError),
    /// Handed to the background worker, or still running after the sync
    /// budget ran out.
    Deferred,
    /// The worker queue was full.
    Dropped,
}

/// Outcome of [`HotkeyRegistry::install`].
#[derive(Debug, Default)]
pub struct InstallReport {
    pub registered: Vec<(HotkeyPattern, RegistrationHandle)>,
    pub failed: Vec<RegistryError>,
}

/// One live binding as dispatch sees it.
#[derive(Debug)]
pub struct ActiveBinding {
    pub pattern: HotkeyPattern,
    pub unit: CompiledUnit,
    pub handle: RegistrationHandle,
    escalated: AtomicBool,
}

impl ActiveBinding {
    /// True once the unit overran the sync budget.
    pub fn is_escalated(&self) -> bool {
        self.escalated.load(Ordering::Relaxed)
    }
}

/// Immutable pattern → binding map.
#[derive(Debug, Default)]
pub struct DispatchTable {
    bindings: HashMap<HotkeyPattern, Arc<ActiveBinding>>,
}

impl DispatchTable {
    pub fn lookup(&self, pattern: &HotkeyPattern) -> Option<&Arc<ActiveBinding>> {
        self.bindings.get(pattern)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &HotkeyPattern> {
        self.bindings.keys()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Releases a grab when dropped.
struct GrabGuard {
    grabber: Arc<dyn KeyGrabber>,
    handle: GrabHandle,
    pattern: HotkeyPattern,
}

impl Drop for GrabGuard {
    fn drop(&mut self) {
        if let Err(e) = self.grabber.ungrab(self.handle) {
            warn!(pattern = %self.pattern, error = %e, "ungrab failed");
        }
    }
}

struct Entry {
    binding: Arc<ActiveBinding>,
    _guard: GrabGuard,
}

pub struct HotkeyRegistry {
    grabber: Arc<dyn KeyGrabber>,
    entries: Mutex<Vec<Entry>>,
    table: RwLock<Arc<DispatchTable>>,
    dispatcher: Worker,
    worker: Worker,
    config: DispatchConfig,
    next_handle: AtomicU64,
}

impl HotkeyRegistry {
    pub fn new(grabber: Arc<dyn KeyGrabber>, config: DispatchConfig) -> io::Result<Self> {
        Ok(Self {
            grabber,
            entries: Mutex::new(Vec::new()),
            table: RwLock::new(Arc::new(DispatchTable::default())),
            dispatcher: Worker::start("hotscript-dispatch", 1)?,
            worker: Worker::start("hotscript-worker", config.worker_queue)?,
            config,
            next_handle: AtomicU64::new(0),
        })
    }

    /// Grab `pattern` and bind it to `unit`.
    pub fn register(
        &self,
        pattern: HotkeyPattern,
        unit: CompiledUnit,
    ) -> Result<RegistrationHandle, RegistryError> {
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.binding.pattern == pattern) {
            return Err(RegistryError::OsGrabFailed {
                pattern,
                reason: "already bound by this registry".into(),
            });
        }
        let entry = self.grab_entry(pattern, unit)?;
        let handle = entry.binding.handle;
        entries.push(entry);
        self.publish(&entries);
        Ok(handle)
    }

    /// Remove one registration, releasing its grab.
    pub fn unregister(&self, handle: RegistrationHandle) -> Result<(), RegistryError> {
        let mut entries = self.entries.lock();
        let index = entries
            .iter()
            .position(|e| e.binding.handle == handle)
            .ok_or(RegistryError::UnknownHandle(handle))?;
        let entry = entries.remove(index);
        self.publish(&entries);
        drop(entry);
        Ok(())
    }

    /// Replace every binding with `bindings` in one transition.
    ///
    /// Old grabs are released before the new ones are taken, but dispatch
    /// keeps using the old table until the new one is published. A pattern
    /// that cannot be grabbed is reported in the result; the rest still bind.
    pub fn install(&self, bindings: Vec<HotkeyBinding>) -> InstallReport {
        let mut entries = self.entries.lock();
        let old = std::mem::take(&mut *entries);
        drop(old);

        let mut report = InstallReport::default();
        for HotkeyBinding { pattern, unit } in bindings {
            match self.grab_entry(pattern.clone(), unit) {
                Ok(entry) => {
                    report.registered.push((pattern, entry.binding.handle));
                    entries.push(entry);
                }
                Err(e) => {
                    warn!(error = %e, "hotkey not registered");
                    report.failed.push(e);
                }
            }
        }
        self.publish(&entries);

        info!(
            registered = report.registered.len(),
            failed = report.failed.len(),
            "installed bindings"
        );
        report
    }

    /// Unregister everything.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let old = std::mem::take(&mut *entries);
        self.publish(&entries);
        drop(old);
    }

    /// The table dispatch currently uses.
    pub fn snapshot(&self) -> Arc<DispatchTable> {
        Arc::clone(&self.table.read())
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Run the unit bound to `event`, if any.
    ///
    /// Called from the input thread, which is blocked for at most the sync
    /// budget. Blocking or escalated units go straight to the worker.
    pub fn on_event(&self, event: &KeyEvent) -> DispatchOutcome {
        let table = self.snapshot();
        let pattern = event.pattern();
        let Some(binding) = table.lookup(&pattern) else {
            return DispatchOutcome::NoMatch;
        };

        if binding.unit.is_blocking() || binding.is_escalated() {
            return self.defer(binding);
        }
        self.run_within_budget(binding)
    }

    fn run_within_budget(&self, binding: &Arc<ActiveBinding>) -> DispatchOutcome {
        let (tx, rx) = mpsc::sync_channel(1);
        let job_binding = Arc::clone(binding);
        let job: Job = Box::new(move || {
            let result = job_binding.unit.call();
            // The input thread stopped waiting; nobody else sees the error.
            if let Err(SendError(Err(e))) = tx.send(result) {
                warn!(pattern = %job_binding.pattern, error = %e, "overrunning hotkey failed");
            }
        });

        if let Err(e) = self.dispatcher.submit(job) {
            debug!(pattern = %binding.pattern, error = %e, "dispatch thread busy");
            return self.defer(binding);
        }

        match rx.recv_timeout(self.config.sync_budget) {
            Ok(Ok(value)) => {
                debug!(pattern = %binding.pattern, "hotkey completed");
                DispatchOutcome::Completed(value)
            }
            Ok(Err(e)) => {
                warn!(pattern = %binding.pattern, error = %e, "hotkey failed");
                DispatchOutcome::Failed(e)
            }
            Err(RecvTimeoutError::Timeout) => {
                binding.escalated.store(true, Ordering::Relaxed);
                warn!(
                    pattern = %binding.pattern,
                    budget_ms = self.config.sync_budget.as_millis() as u64,
                    "unit exceeded sync budget; it finishes in the background"
                );
                DispatchOutcome::Deferred
            }
            Err(RecvTimeoutError::Disconnected) => {
                let e = RuntimeError::new("unit did not finish", binding.unit.position());
                warn!(pattern = %binding.pattern, error = %e, "hotkey failed");
                DispatchOutcome::Failed(e)
            }
        }
    }

    fn defer(&self, binding: &Arc<ActiveBinding>) -> DispatchOutcome {
        let job_binding = Arc::clone(binding);
        let job: Job = Box::new(move || {
            if let Err(e) = job_binding.unit.call() {
                warn!(pattern = %job_binding.pattern, error = %e, "background hotkey failed");
            }
        });
        match self.worker.submit(job) {
            Ok(()) => DispatchOutcome::Deferred,
            Err(e) => {
                warn!(pattern = %binding.pattern, error = %e, "trigger dropped");
                DispatchOutcome::Dropped
            }
        }
    }

    fn grab_entry(
        &self,
        pattern: HotkeyPattern,
        unit: CompiledUnit,
    ) -> Result<Entry, RegistryError> {
        let grab = self
            .grabber
            .grab(&pattern)
            .map_err(|e| RegistryError::OsGrabFailed {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        let guard = GrabGuard {
            grabber: Arc::clone(&self.grabber),
            handle: grab,
            pattern: pattern.clone(),
        };
        let handle = RegistrationHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        debug!(%pattern, ?handle, "grabbed");
        Ok(Entry {
            binding: Arc::new(ActiveBinding {
                pattern,
                unit,
                handle,
                escalated: AtomicBool::new(false),
            }),
            _guard: guard,
        })
    }

    fn publish(&self, entries: &[Entry]) {
        let bindings = entries
            .iter()
            .map(|e| (e.binding.pattern.clone(), Arc::clone(&e.binding)))
            .collect();
        *self.table.write() = Arc::new(DispatchTable { bindings });
    }
}
