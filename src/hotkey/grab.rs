//! Key grabbing: the boundary to whatever owns the keyboard.
//!
//! A desktop host implements [`KeyGrabber`] over the OS hotkey API. The
//! bundled [`TerminalGrabber`] serves the terminal runner and tests. It keeps
//! the bookkeeping an OS would (exclusive ownership, reserved combinations)
//! without touching the system keyboard.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use thiserror::Error;

use super::pattern::HotkeyPattern;

/// Opaque token returned by a successful grab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrabHandle(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrabError {
    #[error("{0} is reserved")]
    Reserved(HotkeyPattern),
    #[error("{0} is owned by another client")]
    AlreadyGrabbed(HotkeyPattern),
    #[error("grab handle {0:?} is not active")]
    UnknownHandle(GrabHandle),
}

/// Exclusive key-combination ownership.
pub trait KeyGrabber: Send + Sync {
    fn grab(&self, pattern: &HotkeyPattern) -> Result<GrabHandle, GrabError>;
    fn ungrab(&self, handle: GrabHandle) -> Result<(), GrabError>;
}

/// In-process grabber for the terminal runner.
#[derive(Debug, Default)]
pub struct TerminalGrabber {
    reserved: HashSet<HotkeyPattern>,
    grabbed: Mutex<HashMap<GrabHandle, HotkeyPattern>>,
    next: AtomicU64,
}

impl TerminalGrabber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to grab any of `patterns`.
    pub fn with_reserved(patterns: impl IntoIterator<Item = HotkeyPattern>) -> Self {
        Self {
            reserved: patterns.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn is_grabbed(&self, pattern: &HotkeyPattern) -> bool {
        self.grabbed.lock().values().any(|p| p == pattern)
    }

    pub fn grab_count(&self) -> usize {
        self.grabbed.lock().len()
    }
}

impl KeyGrabber for TerminalGrabber {
    fn grab(&self, pattern: &HotkeyPattern) -> Result<GrabHandle, GrabError> {
        if self.reserved.contains(pattern) {
            return Err(GrabError::Reserved(pattern.clone()));
        }
        let mut grabbed = self.grabbed.lock();
        if grabbed.values().any(|p| p == pattern) {
            return Err(GrabError::AlreadyGrabbed(pattern.clone()));
        }
        let handle = GrabHandle(self.next.fetch_add(1, Ordering::Relaxed));
        grabbed.insert(handle, pattern.clone());
        Ok(handle)
    }

    fn ungrab(&self, handle: GrabHandle) -> Result<(), GrabError> {
        self.grabbed
            .lock()
            .remove(&handle)
            .map(|_| ())
            .ok_or(GrabError::UnknownHandle(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(s: &str) -> HotkeyPattern {
        s.parse().unwrap()
    }

    #[test]
    fn grab_is_exclusive() {
        let grabber = TerminalGrabber::new();
        let handle = grabber.grab(&pat("Ctrl+a")).unwrap();
        assert_eq!(
            grabber.grab(&pat("Ctrl+a")),
            Err(GrabError::AlreadyGrabbed(pat("Ctrl+a")))
        );
        grabber.ungrab(handle).unwrap();
        assert!(grabber.grab(&pat("Ctrl+a")).is_ok());
    }

    #[test]
    fn reserved_patterns_refused() {
        let grabber = TerminalGrabber::with_reserved([pat("Ctrl+c")]);
        assert_eq!(
            grabber.grab(&pat("Ctrl+c")),
            Err(GrabError::Reserved(pat("Ctrl+c")))
        );
        assert_eq!(grabber.grab_count(), 0);
    }

    #[test]
    fn double_ungrab_fails() {
        let grabber = TerminalGrabber::new();
        let handle = grabber.grab(&pat("F1")).unwrap();
        assert!(grabber.is_grabbed(&pat("F1")));
        grabber.ungrab(handle).unwrap();
        assert_eq!(grabber.ungrab(handle), Err(GrabError::UnknownHandle(handle)));
    }
}
