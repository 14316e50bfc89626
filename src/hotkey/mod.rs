//! Hotkey patterns, key grabbing, and trigger dispatch.

pub mod event;
pub mod grab;
pub mod pattern;
pub mod registry;
pub mod worker;

pub use event::KeyEvent;
pub use grab::{GrabError, GrabHandle, KeyGrabber, TerminalGrabber};
pub use pattern::{HotkeyParseError, HotkeyPattern, Key, Modifiers};
pub use registry::{
    DispatchConfig, DispatchOutcome, HotkeyRegistry, InstallReport, RegistrationHandle,
    RegistryError,
};
