//! memterm - debugger memory view and program terminal for the console
//!
//! Two front ends share the same building blocks:
//!
//! - `memterm run` starts a program inside the terminal panel. Output and
//!   error streams appear in a colored transcript and typed lines are sent to
//!   the program's input.
//! - `memterm dump` treats a file as a memory image and prints an examine
//!   memory dump of it. Changed words are highlighted between captures.
//!
//! # Quick Start
//!
//! ```text
//! memterm run -- python3 -i          # Interactive program in the terminal
//! memterm dump core.bin --bytes 64   # Dump 64 bytes at the image start
//! memterm dump ram.bin --base 8000 --address '# 8010' --watch 1
//! ```
//!
//! # Keys (run mode)
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Send the input line |
//! | Left/Right/Home/End | Move within the input line |
//! | Ctrl+Q | Quit |
//! | Esc | Quit once the program has exited |

mod config;
mod core;
mod memory;
mod ui;

use std::cell::RefCell;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::{data_dir, ColorScheme, Config, BYTE_CHOICES};
use crate::core::{join_command_line, LocalHost, Terminal, TerminalRegistry};
use crate::memory::address::{format_address, parse_address};
use crate::memory::{ExamineMemoryPanel, SnapshotMemory, WordSize};
use crate::ui::renderer::write_styled;
use crate::ui::{KeyInput, Renderer};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Arguments of `memterm run`
#[derive(Debug, Default, PartialEq)]
struct RunArgs {
    /// Program followed by its arguments
    program: Vec<String>,
    /// Working directory for the program
    cwd: Option<String>,
    /// `KEY=VALUE` environment overrides
    env: Vec<String>,
}

/// Arguments of `memterm dump`
#[derive(Debug, Default, PartialEq)]
struct DumpArgs {
    file: PathBuf,
    address: Option<String>,
    bytes: Option<usize>,
    word_size: Option<u32>,
    base: Option<String>,
    /// Re-read interval in seconds
    watch: Option<f64>,
}

#[derive(Debug, PartialEq)]
enum Command {
    Run(RunArgs),
    Dump(DumpArgs),
    Help,
    Version,
}

fn print_version() {
    eprintln!("memterm {}", VERSION);
}

fn print_help() {
    eprintln!("memterm {} - Debugger memory view and program terminal", VERSION);
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  memterm run [OPTIONS] [--] PROGRAM [ARGS...]");
    eprintln!("  memterm dump FILE [OPTIONS]");
    eprintln!();
    eprintln!("Run options:");
    eprintln!("  --cwd <DIR>           Working directory for the program");
    eprintln!("  --env <KEY=VALUE>     Environment override (repeatable)");
    eprintln!();
    eprintln!("Dump options:");
    eprintln!("  --address <EXPR>      Address to examine (hex, '#' prefix freezes it)");
    eprintln!("  --bytes <N>           Bytes to show: 16, 32, 64, 128, 256, 512, 1024");
    eprintln!("  --word-size <W>       Highlight granularity: 1, 2, 4, 8");
    eprintln!("  --base <ADDR>         Address the file is loaded at (default 0)");
    eprintln!("  --watch <SECS>        Re-read the file and show changes");
    eprintln!();
    eprintln!("Other options:");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Run mode keys:");
    eprintln!("  Enter                 Send the input line");
    eprintln!("  Ctrl+Q                Quit");
    eprintln!("  Esc                   Quit after the program exited");
    eprintln!();
    eprintln!("Configuration: ~/.memterm/config.toml");
    eprintln!("Color schemes: {}", ColorScheme::list().join(", "));
}

/// Take the value following option `name`
fn option_value(args: &[String], i: &mut usize, name: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("Missing value for {}", name))
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid value for {}: {}", name, value))
}

/// Parse the command line (without the executable name)
fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(first) = args.first() else {
        return Ok(Command::Help);
    };

    match first.as_str() {
        "-h" | "--help" => Ok(Command::Help),
        "-v" | "--version" => Ok(Command::Version),
        "run" => parse_run_args(&args[1..]).map(Command::Run),
        "dump" => parse_dump_args(&args[1..]).map(Command::Dump),
        arg => Err(format!("Unknown command: {}. Use -h for help.", arg)),
    }
}

fn parse_run_args(args: &[String]) -> Result<RunArgs, String> {
    let mut run = RunArgs::default();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--cwd" => {
                run.cwd = Some(option_value(args, &mut i, "--cwd")?);
            }
            "--env" => {
                run.env.push(option_value(args, &mut i, "--env")?);
            }
            "--" => {
                run.program = args[i + 1..].to_vec();
                break;
            }
            arg if arg.starts_with("--") => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            _ => {
                // Everything from the program name on belongs to the program
                run.program = args[i..].to_vec();
                break;
            }
        }
        i += 1;
    }

    if run.program.is_empty() {
        return Err("Missing program to run".to_string());
    }
    Ok(run)
}

fn parse_dump_args(args: &[String]) -> Result<DumpArgs, String> {
    let mut dump = DumpArgs::default();
    let mut file = None;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--address" => {
                dump.address = Some(option_value(args, &mut i, "--address")?);
            }
            "--bytes" => {
                let value = option_value(args, &mut i, "--bytes")?;
                dump.bytes = Some(parse_number(&value, "--bytes")?);
            }
            "--word-size" => {
                let value = option_value(args, &mut i, "--word-size")?;
                dump.word_size = Some(parse_number(&value, "--word-size")?);
            }
            "--base" => {
                dump.base = Some(option_value(args, &mut i, "--base")?);
            }
            "--watch" => {
                let value = option_value(args, &mut i, "--watch")?;
                let secs: f64 = parse_number(&value, "--watch")?;
                if !secs.is_finite() || secs <= 0.0 {
                    return Err(format!("Invalid value for --watch: {}", value));
                }
                dump.watch = Some(secs);
            }
            arg if arg.starts_with("--") => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            arg => {
                if file.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                file = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    dump.file = file.ok_or_else(|| "Missing memory image file".to_string())?;
    Ok(dump)
}

/// Initialize logging to ~/.memterm/memterm.log
fn init_logging() {
    let log_path = data_dir()
        .map(|dir| dir.join("memterm.log"))
        .unwrap_or_else(|| PathBuf::from("memterm.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    // Open log file (append mode)
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::INFO)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    match command {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            print_version();
            Ok(())
        }
        Command::Run(run) => {
            init_logging();
            info!("memterm {} starting (run)", VERSION);
            let config = Config::load();
            run_terminal(run, &config)
        }
        Command::Dump(dump) => {
            init_logging();
            info!("memterm {} starting (dump)", VERSION);
            let mut config = Config::load();
            run_dump(dump, &mut config)
        }
    }
}

/// Run a program in the full-screen terminal panel
fn run_terminal(args: RunArgs, config: &Config) -> anyhow::Result<()> {
    let interval = Duration::from_millis(config.terminal.poll_interval_ms.max(1));
    let terminal = Rc::new(RefCell::new(Terminal::new(LocalHost, interval)));

    let registry = TerminalRegistry::new();
    registry.set(terminal.clone());

    let scheme = config.get_color_scheme();
    let mut renderer = Renderer::new();
    renderer.init()?;

    let result = launch(&registry, &args)
        .and_then(|()| run_main_loop(&terminal, &mut renderer, &scheme));

    // Restore the console before any error is printed
    let _ = renderer.cleanup();
    result
}

/// Start the program through the registered terminal
fn launch(registry: &TerminalRegistry, args: &RunArgs) -> anyhow::Result<()> {
    let panel = registry
        .get()
        .ok_or_else(|| anyhow!("No terminal registered"))?;

    let command = join_command_line(&args.program);
    let cwd = args.cwd.as_deref().unwrap_or("");
    if !panel.borrow_mut().run_program(&command, cwd, &args.env) {
        error!("Failed to start {}", command);
    }
    Ok(())
}

/// Main event loop
fn run_main_loop(
    terminal: &RefCell<Terminal<LocalHost>>,
    renderer: &mut Renderer,
    scheme: &ColorScheme,
) -> anyhow::Result<()> {
    let poll_timeout = terminal.borrow().poll_interval();
    let mut alert: Option<String> = None;
    let mut dirty = true;

    loop {
        {
            let mut term = terminal.borrow_mut();
            let was_running = term.is_running();
            term.tick(Instant::now());
            if was_running != term.is_running() {
                dirty = true;
            }
            if let Some(last) = term.take_alerts().pop() {
                alert = Some(last);
                dirty = true;
            }
            if term.take_scroll_request() {
                dirty = true;
            }

            if dirty {
                let status = status_line(&term, alert.as_deref());
                renderer.render(term.transcript(), term.cursor(), &status, scheme)?;
                dirty = false;
            }
        }

        if !event::poll(poll_timeout)? {
            continue;
        }
        match event::read()? {
            Event::Key(key_event) => {
                if key_event.kind != KeyEventKind::Press {
                    continue;
                }
                if key_event.modifiers.contains(KeyModifiers::CONTROL)
                    && matches!(key_event.code, KeyCode::Char('q') | KeyCode::Char('Q'))
                {
                    info!("Quit requested");
                    break;
                }

                let mut term = terminal.borrow_mut();
                if key_event.code == KeyCode::Esc && !term.is_running() {
                    break;
                }
                term.on_key(KeyInput::from(&key_event));
                alert = None;
                dirty = true;
            }
            Event::Resize(cols, rows) => {
                info!("Resize: {}x{}", cols, rows);
                dirty = true;
            }
            _ => {}
        }
    }

    Ok(())
}

fn status_line(term: &Terminal<LocalHost>, alert: Option<&str>) -> String {
    let state = match term.pid() {
        Some(pid) => format!("running (pid {}) | Ctrl+Q quit", pid),
        None => "idle | Esc/Ctrl+Q quit".to_string(),
    };
    match alert {
        Some(alert) => format!(" memterm | {} | {}", state, alert),
        None => format!(" memterm | {}", state),
    }
}

/// Print an examine memory dump of a file image
fn run_dump(args: DumpArgs, config: &mut Config) -> anyhow::Result<()> {
    let image = fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let base = match args.base.as_deref() {
        Some(text) => parse_address(text).context("Invalid --base")?,
        None => 0,
    };
    let mut memory = SnapshotMemory::new(base, image);

    let mut panel = ExamineMemoryPanel::new(&config.examine_memory);
    if let Some(bytes) = args.bytes {
        if !panel.set_bytes(bytes) {
            bail!("--bytes must be one of {:?}", BYTE_CHOICES);
        }
    }
    if let Some(word_size) = args.word_size {
        let word_size = WordSize::try_from(word_size)
            .map_err(|w| anyhow!("--word-size must be 1, 2, 4 or 8, not {}", w))?;
        panel.renderer_mut().set_word_size(word_size);
    }

    let address = args
        .address
        .clone()
        .unwrap_or_else(|| format_address(memory.base()));
    panel.set_address_text(&address);

    let remembered = config.examine_memory.clone();
    panel.go(&mut memory, &mut config.examine_memory);
    if config.examine_memory != remembered {
        if let Err(e) = config.save() {
            warn!("Failed to save config: {}", e);
        }
    }

    let scheme = config.get_color_scheme();
    let mut stdout = io::stdout();
    write_styled(&mut stdout, panel.view(), &scheme)?;
    println!();

    let Some(secs) = args.watch else {
        return Ok(());
    };
    let interval = Duration::from_secs_f64(secs);
    loop {
        thread::sleep(interval);
        let image = fs::read(&args.file)
            .with_context(|| format!("Failed to read {}", args.file.display()))?;
        memory.replace(image);

        // The target ran; the next capture compares against the last one
        panel.on_debugger_continued();
        panel.request(&mut memory);

        println!();
        write_styled(&mut stdout, panel.view(), &scheme)?;
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_args_shows_help() {
        assert_eq!(parse_args(&[]), Ok(Command::Help));
        assert_eq!(parse_args(&args(&["-v"])), Ok(Command::Version));
    }

    #[test]
    fn test_run_args() {
        let command = parse_args(&args(&[
            "run", "--cwd", "/tmp", "--env", "A=1", "--env", "B=2", "ls", "-l", "--all",
        ]))
        .unwrap();

        assert_eq!(
            command,
            Command::Run(RunArgs {
                program: args(&["ls", "-l", "--all"]),
                cwd: Some("/tmp".to_string()),
                env: args(&["A=1", "B=2"]),
            })
        );
    }

    #[test]
    fn test_run_args_after_separator() {
        let command = parse_args(&args(&["run", "--", "--weird-name", "x"])).unwrap();
        let Command::Run(run) = command else {
            panic!("expected run command");
        };
        assert_eq!(run.program, args(&["--weird-name", "x"]));
    }

    #[test]
    fn test_run_requires_program() {
        assert!(parse_args(&args(&["run"])).is_err());
        assert!(parse_args(&args(&["run", "--cwd"])).is_err());
    }

    #[test]
    fn test_dump_args() {
        let command = parse_args(&args(&[
            "dump", "mem.bin", "--address", "# 10", "--bytes", "64", "--word-size", "8",
            "--base", "0x1000", "--watch", "0.5",
        ]))
        .unwrap();

        assert_eq!(
            command,
            Command::Dump(DumpArgs {
                file: PathBuf::from("mem.bin"),
                address: Some("# 10".to_string()),
                bytes: Some(64),
                word_size: Some(8),
                base: Some("0x1000".to_string()),
                watch: Some(0.5),
            })
        );
    }

    #[test]
    fn test_dump_arg_errors() {
        assert!(parse_args(&args(&["dump"])).is_err());
        assert!(parse_args(&args(&["dump", "a", "b"])).is_err());
        assert!(parse_args(&args(&["dump", "a", "--bytes", "many"])).is_err());
        assert!(parse_args(&args(&["dump", "a", "--watch", "0"])).is_err());
        assert!(parse_args(&args(&["frobnicate"])).is_err());
    }

    #[test]
    fn test_status_line() {
        let term = Terminal::new(LocalHost, Duration::from_millis(10));
        assert_eq!(status_line(&term, None), " memterm | idle | Esc/Ctrl+Q quit");
        assert!(status_line(&term, Some("boom")).ends_with("| boom"));
    }
}
