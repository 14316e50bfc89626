//! hotscript: run, check, or inspect hotkey scripts from the terminal.
//!
//! `run` puts the terminal in raw mode and treats key presses in it as the
//! hotkey event source, reloading the script whenever the file changes.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use tracing::{debug, warn};

use hotscript::builtins::{standard_library, BuiltinTable, OutputSink};
use hotscript::config::HostConfig;
use hotscript::dsl::Compiler;
use hotscript::hotkey::{DispatchOutcome, HotkeyRegistry, KeyEvent, TerminalGrabber};
use hotscript::logging::init_tracing;
use hotscript::script::{HostError, LoadReport, ScriptHost};

#[derive(Parser)]
#[command(name = "hotscript", about = "Hotkey automation scripts", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.hotscript/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "hotscript=trace"
    #[arg(long, global = true)]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a script and dispatch key presses from this terminal
    Run {
        script: PathBuf,
        /// Synchronous execution budget in milliseconds
        #[arg(long)]
        budget_ms: Option<u64>,
    },
    /// Compile a script without running it
    Check { script: PathBuf },
    /// Print the token stream of a script
    Tokens { script: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match HostConfig::load_from(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("failed to load config {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => HostConfig::load().unwrap_or_default(),
    };
    init_tracing(cli.log.as_deref().unwrap_or(&config.log_filter));

    match cli.command {
        Commands::Run { script, budget_ms } => {
            let mut config = config;
            if let Some(ms) = budget_ms {
                config.dispatch.sync_budget_ms = ms;
            }
            run(&script, &config)
        }
        Commands::Check { script } => check(&script),
        Commands::Tokens { script } => tokens(&script),
    }
}

fn read_script(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => {
            eprintln!("cannot read {}: {e}", path.display());
            None
        }
    }
}

fn stdout_library() -> Arc<BuiltinTable> {
    let sink: OutputSink = Arc::new(|text: &str| {
        let mut out = io::stdout().lock();
        let _ = write!(out, "{text}\r\n");
        let _ = out.flush();
    });
    Arc::new(standard_library(sink))
}

fn check(path: &Path) -> ExitCode {
    let Some(source) = read_script(path) else {
        return ExitCode::FAILURE;
    };
    match Compiler::check(&source, &stdout_library()) {
        Ok(program) => {
            println!(
                "{}: ok, {} hotkey binding(s), {} load-time unit(s)",
                path.display(),
                program.hotkeys.len(),
                program.top_level.len()
            );
            for (pattern, unit) in &program.hotkeys {
                println!("  {pattern} at {}", unit.position());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

fn tokens(path: &Path) -> ExitCode {
    let Some(source) = read_script(path) else {
        return ExitCode::FAILURE;
    };
    match Compiler::tokenize(&source) {
        Ok(tokens) => {
            for t in tokens {
                println!(
                    "{:>4}:{:<4} {:<14} {}",
                    t.line,
                    t.column,
                    t.kind.describe(),
                    t.raw.escape_debug()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

/// Restores cooked mode on every exit path.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn print_report(report: &LoadReport) {
    print!(
        "loaded: {} binding(s), {} load effect(s)\r\n",
        report.registered,
        report.effects.len()
    );
    for failure in &report.failed {
        print!("  not registered: {failure}\r\n");
    }
}

fn run(path: &Path, config: &HostConfig) -> ExitCode {
    let grabber = Arc::new(TerminalGrabber::with_reserved(config.reserved_patterns()));
    let registry = match HotkeyRegistry::new(grabber, config.dispatch.to_dispatch_config()) {
        Ok(r) => Arc::new(r),
        Err(e) => {
            eprintln!("failed to start dispatch worker: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut host = ScriptHost::new(stdout_library(), Arc::clone(&registry));
    match host.load_file(path) {
        Ok(report) => print_report(&report),
        Err(e) => {
            eprintln!("{}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    if let Err(e) = ctrlc::set_handler(move || r.store(false, Ordering::SeqCst)) {
        warn!(error = %e, "could not install Ctrl+C handler");
    }

    let _raw = match RawMode::enable() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("failed to enter raw mode: {e}");
            return ExitCode::FAILURE;
        }
    };
    print!("listening; Esc or Ctrl+C quits\r\n");

    match event_loop(&mut host, &registry, &running, config.watch_interval()) {
        Ok(()) => {
            host.unload();
            ExitCode::SUCCESS
        }
        Err(e) => {
            host.unload();
            eprint!("terminal error: {e}\r\n");
            ExitCode::FAILURE
        }
    }
}

fn event_loop(
    host: &mut ScriptHost,
    registry: &HotkeyRegistry,
    running: &AtomicBool,
    watch_interval: Duration,
) -> io::Result<()> {
    let mut last_check = Instant::now();

    while running.load(Ordering::SeqCst) {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                let quit = key.code == KeyCode::Esc
                    || (key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL));
                if quit {
                    break;
                }
                if let Some(ev) = KeyEvent::from_crossterm(&key) {
                    match registry.on_event(&ev) {
                        DispatchOutcome::NoMatch => {}
                        DispatchOutcome::Failed(e) => print!("{} failed: {e}\r\n", ev.pattern()),
                        DispatchOutcome::Dropped => print!("{} dropped: worker busy\r\n", ev.pattern()),
                        outcome => debug!(pattern = %ev.pattern(), ?outcome, "dispatched"),
                    }
                }
            }
        }

        if last_check.elapsed() >= watch_interval {
            last_check = Instant::now();
            match host.reload_if_changed() {
                Some(Ok(report)) => print_report(&report),
                Some(Err(HostError::Script(e))) => {
                    print!("reload rejected, previous script still active: {e}\r\n")
                }
                Some(Err(e)) => print!("reload failed: {e}\r\n"),
                None => {}
            }
        }
    }

    Ok(())
}
