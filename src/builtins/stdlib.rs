//! Standard host library used by the `hotscript` binary and the tests.
//!
//! A real desktop host would back these with the system clipboard and a
//! synthetic-keystroke sender. Here the clipboard lives in-process and
//! `send` writes to an [`OutputSink`].

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use super::{BuiltinError, BuiltinSymbol, BuiltinTable, ParamType};
use crate::dsl::value::Value;

/// Longest string `repeat` will build, in bytes.
pub const MAX_REPEAT_BYTES: usize = 1 << 20;

/// Longest `sleep`, in milliseconds.
pub const MAX_SLEEP_MS: i64 = 60_000;

/// Destination for text produced by `send`.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

fn str_arg<'a>(args: &'a [Value], i: usize) -> Result<&'a str, BuiltinError> {
    args.get(i)
        .and_then(Value::as_str)
        .ok_or_else(|| BuiltinError::new(format!("argument {} must be a string", i + 1)))
}

fn int_arg(args: &[Value], i: usize) -> Result<i64, BuiltinError> {
    match args.get(i).and_then(Value::as_number) {
        Some(n) if n.fract() == 0.0 => Ok(n as i64),
        _ => Err(BuiltinError::new(format!(
            "argument {} must be an integer",
            i + 1
        ))),
    }
}

fn text_fn(name: &str, f: fn(&str) -> String) -> BuiltinSymbol {
    BuiltinSymbol::new(name, vec![ParamType::String], move |args| {
        Ok(Value::Str(f(str_arg(args, 0)?)))
    })
}

/// Build the standard builtin table.
pub fn standard_library(sink: OutputSink) -> BuiltinTable {
    let mut table = BuiltinTable::new();
    let clipboard = Arc::new(Mutex::new(String::new()));

    table.register_symbol(BuiltinSymbol::new(
        "send",
        vec![ParamType::Any],
        move |args| {
            let text = args.first().map(Value::to_string).unwrap_or_default();
            sink(&text);
            Ok(Value::Unit)
        },
    ));

    table.register("log", 1, |args| {
        let msg = args.first().map(Value::to_string).unwrap_or_default();
        info!(target: "hotscript::script", "{msg}");
        Ok(Value::Unit)
    });

    table.register_symbol(text_fn("text.upper", str::to_uppercase));
    table.register_symbol(text_fn("text.lower", str::to_lowercase));
    table.register_symbol(text_fn("text.trim", |s| s.trim().to_string()));

    table.register_symbol(BuiltinSymbol::new(
        "text.len",
        vec![ParamType::String],
        |args| Ok(Value::Number(str_arg(args, 0)?.chars().count() as f64)),
    ));

    table.register_symbol(BuiltinSymbol::new(
        "text.replace",
        vec![ParamType::String, ParamType::String, ParamType::String],
        |args| {
            let s = str_arg(args, 0)?;
            let from = str_arg(args, 1)?;
            let to = str_arg(args, 2)?;
            if from.is_empty() {
                return Ok(Value::Str(s.to_string()));
            }
            Ok(Value::Str(s.replace(from, to)))
        },
    ));

    table.register_symbol(BuiltinSymbol::new(
        "repeat",
        vec![ParamType::String, ParamType::Integer],
        |args| {
            let s = str_arg(args, 0)?;
            let n = int_arg(args, 1)?;
            let count = usize::try_from(n)
                .map_err(|_| BuiltinError::new("repeat count must not be negative"))?;
            match s.len().checked_mul(count) {
                Some(total) if total <= MAX_REPEAT_BYTES => Ok(Value::Str(s.repeat(count))),
                _ => Err(BuiltinError::new(format!(
                    "repeat result would exceed {MAX_REPEAT_BYTES} bytes"
                ))),
            }
        },
    ));

    let clip = Arc::clone(&clipboard);
    table.register("clipboard.get", 0, move |_| Ok(Value::Str(clip.lock().clone())));

    let clip = Arc::clone(&clipboard);
    table.register("clipboard.set", 1, move |args| {
        let text = args.first().map(Value::to_string).unwrap_or_default();
        *clip.lock() = text;
        Ok(Value::Unit)
    });

    table.register_symbol(
        BuiltinSymbol::new("sleep", vec![ParamType::Integer], |args| {
            let ms = int_arg(args, 0)?;
            if ms > MAX_SLEEP_MS {
                return Err(BuiltinError::new(format!(
                    "sleep is limited to {MAX_SLEEP_MS} ms"
                )));
            }
            thread::sleep(Duration::from_millis(ms.max(0) as u64));
            Ok(Value::Unit)
        })
        .blocking(),
    );

    table
}
