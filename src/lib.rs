//! hotscript: a hotkey automation scripting language.
//!
//! Scripts bind hotkeys to short programs over host-provided builtins:
//!
//! ```text
//! let greeting = "hello"
//! Ctrl+Alt+t => send(greeting)
//! Ctrl+Shift+u => clipboard.get() | text.upper | clipboard.set
//! ```
//!
//! [`dsl::Compiler`] turns source into compiled units, and
//! [`hotkey::HotkeyRegistry`] binds them to live key events.

pub mod builtins;
pub mod config;
pub mod dsl;
pub mod hotkey;
pub mod logging;
pub mod script;
