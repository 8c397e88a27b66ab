//! scriptrack: keep a list of scripts, run them in the background and watch them.
//!
//! This is the entry point of the application. It parses command-line arguments,
//! loads configuration, and either runs a headless subcommand or sets up the main
//! event loop that owns the script list, the process registry and the TUI.

mod app;
mod config;
mod desktop;
mod error;
mod events;
mod launcher;
mod logview;
mod monitor;
mod registry;
mod script;
mod store;
mod tui;

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::{Parser, Subcommand};
use crossterm::event::KeyEventKind;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::app::{display_name, App, AppAction};
use crate::config::Config;
use crate::error::ScriptError;
use crate::events::{Event, ShutdownSignal};
use crate::launcher::{absolute_path, log_path, LaunchSettings};
use crate::monitor::{MonitorReport, ProcessMonitor};
use crate::registry::{ProcessRegistry, Replaced, RestartPolicy, StopRequest};
use crate::script::ScriptList;
use crate::store::FileListStore;

const TICK_RATE: Duration = Duration::from_millis(150);
const DEFAULT_STOP_TIMEOUT_MS: u64 = 3_000;
const DEFAULT_MONITOR_INTERVAL_MS: u64 = 6_000;
const DEFAULT_LIST_FILE: &str = "file.txt";
const CONFIG_FILE: &str = "scriptrack.toml";

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "scriptrack",
    version,
    about = "Run and watch a list of background scripts",
    styles = help_styles(),
    color = clap::ColorChoice::Always,
    disable_help_subcommand = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
    /// Path to scriptrack.toml configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Ignore any scriptrack.toml in the current directory.
    #[arg(long)]
    no_config: bool,
    /// File holding the script list, one path per line.
    #[arg(long)]
    list_file: Option<PathBuf>,
    /// Interval between liveness scans (ms).
    #[arg(long)]
    monitor_interval_ms: Option<u64>,
    /// Interpreter used when none is found next to a script.
    #[arg(long)]
    interpreter: Option<String>,
    /// Time to wait after the terminate signal before force-killing (ms).
    #[arg(long)]
    stop_timeout_ms: Option<u64>,
    /// What starting an already running script does.
    #[arg(long, value_enum)]
    on_restart: Option<RestartPolicy>,
    /// Write diagnostic logs to this file.
    #[arg(long)]
    trace_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Append a script to the list.
    Add { path: String },
    /// Remove a script from the list.
    Remove { path: String },
    /// Print the list.
    List,
    /// Start one script, wait for it and print its exit code.
    Run { path: String },
    /// Show version information.
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(Commands::Version) = &cli.command {
        println!("scriptrack {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    init_logging(cli.trace_file.as_deref(), cli.command.is_some())?;
    let settings = load_settings(&cli)?;

    match &cli.command {
        Some(Commands::Add { path }) => {
            let mut scripts = ScriptList::load(FileListStore::new(&settings.list_file))?;
            let path = absolute_path(path)?.to_string_lossy().to_string();
            scripts.add(path.clone())?;
            println!("added {}", path);
            Ok(())
        }
        Some(Commands::Remove { path }) => {
            let mut scripts = ScriptList::load(FileListStore::new(&settings.list_file))?;
            let removed = match scripts.remove_path(path)? {
                Some(entry) => Some(entry),
                None => {
                    let absolute = absolute_path(path)?.to_string_lossy().to_string();
                    scripts.remove_path(&absolute)?
                }
            };
            match removed {
                Some(entry) => {
                    println!("removed {}", entry.path);
                    Ok(())
                }
                None => bail!("{} is not in {}", path, settings.list_file.display()),
            }
        }
        Some(Commands::List) => {
            let scripts = ScriptList::load(FileListStore::new(&settings.list_file))?;
            for entry in scripts.iter() {
                println!("{}", entry.path);
            }
            Ok(())
        }
        Some(Commands::Run { path }) => {
            let code = run_once(path, &settings).await?;
            if code != Some(0) {
                std::process::exit(code.unwrap_or(1));
            }
            Ok(())
        }
        Some(Commands::Version) => Ok(()),
        None => run_tui(settings).await,
    }
}

async fn run_tui(settings: RunSettings) -> Result<()> {
    let scripts = ScriptList::load(FileListStore::new(&settings.list_file))?;
    let mut registry = ProcessRegistry::new(
        settings.launch.clone(),
        settings.on_restart,
        settings.stop_timeout,
    );
    let monitor = ProcessMonitor::new(settings.monitor_interval);
    let mut app = App::new(scripts, settings.use_symbols);
    tracing::info!(
        list = %settings.list_file.display(),
        scripts = app.scripts.len(),
        "session started"
    );

    let (event_tx, mut event_rx) = mpsc::channel(256);
    let mut terminal = tui::init_terminal()?;
    spawn_input_listener(event_tx.clone());
    spawn_signal_listener(event_tx.clone());

    let mut ticker = tokio::time::interval(TICK_RATE);
    let mut monitor_ticker = monitor.ticker();
    let mut result = Ok(());

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    Event::Key(key) => {
                        if key.kind == KeyEventKind::Press {
                            let action = app.handle_key(key);
                            handle_app_action(action, &mut app, &mut registry).await;
                        }
                    }
                    Event::Mouse(mouse) => {
                        let action = app.handle_mouse(mouse);
                        handle_app_action(action, &mut app, &mut registry).await;
                    }
                    Event::Resize { width, height } => {
                        tracing::debug!(width, height, "terminal resized");
                        let _ = terminal.autoresize();
                    }
                    Event::Shutdown { signal } => {
                        tracing::info!(signal = signal.label(), "shutdown requested");
                        app.should_quit = true;
                    }
                }
            }
            _ = monitor_ticker.tick() => {
                for report in monitor.scan(&mut registry, &mut app.scripts).await {
                    app.on_report(&report);
                }
            }
            _ = ticker.tick() => {
                for (path, transition) in registry.enforce_stop_deadlines().await {
                    app.on_report(&MonitorReport { path, transition });
                }
                app.refresh_log();
            }
        }

        if let Err(err) = tui::draw(&mut app, &registry, &mut terminal) {
            result = Err(err.into());
            break;
        }
        if app.should_quit {
            break;
        }
    }

    app.set_status_warning_persistent("stopping scripts...");
    let _ = tui::draw(&mut app, &registry, &mut terminal);
    let stopped = registry.shutdown_all(settings.stop_timeout).await;
    tui::restore_terminal(terminal)?;
    for (path, outcome) in stopped {
        tracing::info!(path = %path, ?outcome, "stopped on exit");
    }
    result
}

async fn handle_app_action(action: AppAction, app: &mut App, registry: &mut ProcessRegistry) {
    match action {
        AppAction::None => {}
        AppAction::Quit => app.should_quit = true,
        AppAction::Add(path) => match app.scripts.add(path.clone()) {
            Ok(()) => {
                app.selected = app.scripts.len().saturating_sub(1);
                app.set_status_message(format!("added {}", display_name(&path)));
            }
            Err(err) => app.set_status_warning_for(
                format!("add failed: {:#}", err),
                Duration::from_secs(5),
            ),
        },
        AppAction::Remove(index) => match app.scripts.remove(index) {
            Ok(Some(entry)) => {
                app.clamp_selection();
                if app
                    .log_view
                    .as_ref()
                    .map(|view| view.script == entry.path)
                    .unwrap_or(false)
                {
                    app.log_view = None;
                }
                let name = display_name(&entry.path);
                if registry.is_running(&entry.path) {
                    app.set_status_warning_for(
                        format!("removed {} (still running)", name),
                        Duration::from_secs(3),
                    );
                } else {
                    app.set_status_message(format!("removed {}", name));
                }
            }
            Ok(None) => {}
            Err(err) => app.set_status_warning_for(
                format!("remove failed: {:#}", err),
                Duration::from_secs(5),
            ),
        },
        AppAction::Start(index) => {
            let Some(path) = app.scripts.get(index).map(|entry| entry.path.clone()) else {
                return;
            };
            app.scripts.set_running(&path, true);
            match registry.start(&path).await {
                Ok(report) => {
                    let command = shell_words::join([report.interpreter.display(), path.clone()]);
                    let pid = format_pid(report.pid);
                    let message = match report.replaced {
                        Some(Replaced::Restarted { .. }) => {
                            format!("restarted: {} (pid {})", command, pid)
                        }
                        Some(Replaced::Detached { pid: old }) => format!(
                            "started: {} (pid {}), pid {} left running",
                            command,
                            pid,
                            format_pid(old)
                        ),
                        None => format!("started: {} (pid {})", command, pid),
                    };
                    app.set_status_message(message);
                }
                Err(err) => {
                    // A refused double start leaves the live process in place.
                    let still_running = matches!(
                        err.downcast_ref::<ScriptError>(),
                        Some(ScriptError::AlreadyRunning { .. })
                    );
                    app.scripts.set_running(&path, still_running);
                    tracing::warn!(path = %path, error = %format!("{:#}", err), "start failed");
                    app.set_status_warning_for(format!("{:#}", err), Duration::from_secs(5));
                }
            }
        }
        AppAction::Stop(index) => {
            let Some(path) = app.scripts.get(index).map(|entry| entry.path.clone()) else {
                return;
            };
            app.scripts.set_running(&path, false);
            let name = display_name(&path);
            match registry.stop(&path) {
                Ok(StopRequest::Signalled) => app.set_status_message(format!("stopping {}", name)),
                Ok(StopRequest::AlreadyExited(_)) => {
                    app.set_status_message(format!("{} is not running", name))
                }
                Err(err) => app.set_status_warning_for(err.to_string(), Duration::from_secs(3)),
            }
        }
        AppAction::ShowLog(index) => app.open_log(index),
        AppAction::OpenDir(index) => {
            let Some(path) = app.scripts.get(index).map(|entry| entry.path.clone()) else {
                return;
            };
            if let Err(err) = desktop::open_containing_dir(&path) {
                app.set_status_warning_for(
                    format!("open failed: {:#}", err),
                    Duration::from_secs(3),
                );
            }
        }
        AppAction::CopyLog => {
            let Some(text) = app.log_view.as_ref().map(|view| view.text()) else {
                app.set_status_warning_for("nothing to copy", Duration::from_secs(2));
                return;
            };
            match desktop::copy_text(&text) {
                Ok(()) => app.set_status_warning_for("copied to clipboard", Duration::from_secs(2)),
                Err(err) => app.set_status_warning_for(
                    format!("clipboard failed: {}", err),
                    Duration::from_secs(3),
                ),
            }
        }
    }
}

enum RunEnd {
    Exited(Option<i32>),
    Interrupted,
}

/// Starts one script outside the TUI and waits for it. Ctrl-C stops the script.
async fn run_once(path: &str, settings: &RunSettings) -> Result<Option<i32>> {
    let script = absolute_path(path)?.to_string_lossy().to_string();
    let mut registry = ProcessRegistry::new(
        settings.launch.clone(),
        settings.on_restart,
        settings.stop_timeout,
    );
    let report = registry.start(&script).await?;
    println!(
        "started: {} (pid {})",
        shell_words::join([report.interpreter.display(), script.clone()]),
        format_pid(report.pid)
    );

    let end = tokio::select! {
        code = registry.wait(&script) => RunEnd::Exited(code?),
        _ = tokio::signal::ctrl_c() => RunEnd::Interrupted,
    };
    let code = match end {
        RunEnd::Exited(code) => code,
        RunEnd::Interrupted => registry
            .stop_and_wait(&script, settings.stop_timeout)
            .await?
            .code(),
    };
    println!("log: {}", log_path(&script).display());
    println!(
        "exit code: {}",
        code.map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    Ok(code)
}

fn format_pid(pid: Option<u32>) -> String {
    pid.map(|pid| pid.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn init_logging(trace_file: Option<&Path>, headless: bool) -> Result<()> {
    let filter = EnvFilter::try_from_env("SCRIPTRACK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter(headless)));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if let Some(path) = trace_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open trace file {}", path.display()))?;
        let _ = builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init();
    } else if headless || stderr_enabled() {
        let _ = builder.with_writer(io::stderr).try_init();
    } else {
        // The terminal belongs to the TUI.
        let _ = builder.with_writer(io::sink).try_init();
    }
    Ok(())
}

/// Headless runs print their own results on stdout, so lifecycle chatter is hidden there.
fn default_filter(headless: bool) -> &'static str {
    if headless {
        "warn"
    } else {
        "info"
    }
}

fn stderr_enabled() -> bool {
    matches!(
        std::env::var("SCRIPTRACK_LOG_STDERR").ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}

fn spawn_input_listener(tx: mpsc::Sender<Event>) {
    std::thread::spawn(move || loop {
        if crossterm::event::poll(Duration::from_millis(100)).unwrap_or(false) {
            let sent = match crossterm::event::read() {
                Ok(crossterm::event::Event::Key(key)) => tx.blocking_send(Event::Key(key)),
                Ok(crossterm::event::Event::Mouse(mouse)) => {
                    tx.blocking_send(Event::Mouse(mouse))
                }
                Ok(crossterm::event::Event::Resize(width, height)) => {
                    tx.blocking_send(Event::Resize { width, height })
                }
                _ => Ok(()),
            };
            // The loop is gone once the receiver is dropped.
            if sent.is_err() {
                break;
            }
        }
    });
}

fn spawn_signal_listener(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to install SIGTERM handler");
                    return;
                }
            };
            let received = tokio::select! {
                _ = tokio::signal::ctrl_c() => ShutdownSignal::SigInt,
                _ = sigterm.recv() => ShutdownSignal::SigTerm,
            };
            let _ = tx.send(Event::Shutdown { signal: received }).await;
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            let _ = tx
                .send(Event::Shutdown {
                    signal: ShutdownSignal::SigInt,
                })
                .await;
        }
    });
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}

fn load_settings(cli: &Cli) -> Result<RunSettings> {
    let mut config = Config::default();
    if !cli.no_config {
        let config_path = cli
            .config
            .clone()
            .or_else(|| default_config_path().filter(|path| path.exists()));
        if let Some(path) = config_path {
            config = config::load_config(&path)?;
        }
    }
    RunSettings::from_cli(cli, config)
}

fn default_config_path() -> Option<PathBuf> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        Some(path.to_path_buf())
    } else {
        None
    }
}

/// Runtime configuration derived from CLI arguments and the config file.
#[derive(Debug, Clone)]
struct RunSettings {
    list_file: PathBuf,
    monitor_interval: Duration,
    launch: LaunchSettings,
    stop_timeout: Duration,
    on_restart: RestartPolicy,
    use_symbols: bool,
}

impl RunSettings {
    fn from_cli(cli: &Cli, config: Config) -> Result<Self> {
        let defaults = LaunchSettings::default();
        let list_file = cli
            .list_file
            .clone()
            .or(config.list_file.map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LIST_FILE));
        let monitor_interval_ms = cli
            .monitor_interval_ms
            .or(config.monitor_interval_ms)
            .unwrap_or(DEFAULT_MONITOR_INTERVAL_MS);
        let stop_timeout_ms = cli
            .stop_timeout_ms
            .or(config.stop_timeout_ms)
            .unwrap_or(DEFAULT_STOP_TIMEOUT_MS);
        let on_restart = match (cli.on_restart, config.on_restart.as_deref()) {
            (Some(policy), _) => policy,
            (None, Some(value)) => parse_restart_policy(value)
                .with_context(|| format!("invalid on_restart in {}", CONFIG_FILE))?,
            (None, None) => RestartPolicy::Restart,
        };
        let launch = LaunchSettings {
            interpreter: cli
                .interpreter
                .clone()
                .or(config.interpreter)
                .unwrap_or(defaults.interpreter),
            interpreter_names: config
                .interpreter_names
                .unwrap_or(defaults.interpreter_names),
            env_file: config.env_file.unwrap_or(defaults.env_file),
        };
        Ok(Self {
            list_file,
            monitor_interval: Duration::from_millis(monitor_interval_ms),
            launch,
            stop_timeout: Duration::from_millis(stop_timeout_ms),
            on_restart,
            use_symbols: config.symbols.unwrap_or(true),
        })
    }
}

fn parse_restart_policy(value: &str) -> Result<RestartPolicy> {
    match value.trim().to_lowercase().as_str() {
        "restart" => Ok(RestartPolicy::Restart),
        "refuse" => Ok(RestartPolicy::Refuse),
        "detach" => Ok(RestartPolicy::Detach),
        other => bail!("unknown restart policy {:?} (use restart, refuse or detach)", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_restart_policy_accepts_known_values() {
        assert_eq!(parse_restart_policy("Refuse").unwrap(), RestartPolicy::Refuse);
        assert_eq!(parse_restart_policy(" detach ").unwrap(), RestartPolicy::Detach);
        assert!(parse_restart_policy("kill").is_err());
    }

    #[test]
    fn settings_default_without_config() {
        let cli = Cli::parse_from(["scriptrack"]);
        let settings = RunSettings::from_cli(&cli, Config::default()).unwrap();
        assert_eq!(settings.list_file, PathBuf::from("file.txt"));
        assert_eq!(settings.monitor_interval, Duration::from_secs(6));
        assert_eq!(settings.stop_timeout, Duration::from_secs(3));
        assert_eq!(settings.on_restart, RestartPolicy::Restart);
        assert_eq!(settings.launch.env_file, ".env");
        assert!(settings.use_symbols);
    }

    #[test]
    fn cli_flags_win_over_config() {
        let cli = Cli::parse_from([
            "scriptrack",
            "--list-file",
            "jobs.txt",
            "--on-restart",
            "refuse",
            "--interpreter",
            "sh",
        ]);
        let config = Config {
            list_file: Some("other.txt".to_string()),
            on_restart: Some("detach".to_string()),
            stop_timeout_ms: Some(500),
            interpreter: Some("python3.11".to_string()),
            ..Config::default()
        };
        let settings = RunSettings::from_cli(&cli, config).unwrap();
        assert_eq!(settings.list_file, PathBuf::from("jobs.txt"));
        assert_eq!(settings.on_restart, RestartPolicy::Refuse);
        assert_eq!(settings.launch.interpreter, "sh");
        assert_eq!(settings.stop_timeout, Duration::from_millis(500));
    }

    #[test]
    fn invalid_config_policy_is_an_error() {
        let cli = Cli::parse_from(["scriptrack"]);
        let config = Config {
            on_restart: Some("sometimes".to_string()),
            ..Config::default()
        };
        assert!(RunSettings::from_cli(&cli, config).is_err());
    }

    #[test]
    fn subcommands_parse() {
        let cli = Cli::parse_from(["scriptrack", "--no-config", "add", "job.py"]);
        assert!(cli.no_config);
        assert!(matches!(cli.command, Some(Commands::Add { ref path }) if path == "job.py"));
    }

    #[test]
    fn headless_runs_default_to_warnings() {
        assert_eq!(default_filter(true), "warn");
        assert_eq!(default_filter(false), "info");
    }

    #[cfg(unix)]
    mod actions {
        use std::time::Duration;

        use crate::app::{App, AppAction, StatusLevel};
        use crate::handle_app_action;
        use crate::registry::tests::{sh_registry, write_script};
        use crate::registry::RestartPolicy;
        use crate::script::ScriptList;
        use crate::store::FileListStore;

        fn app_with(dir: &tempfile::TempDir, paths: &[&str]) -> App {
            let store = FileListStore::new(dir.path().join("file.txt"));
            let mut scripts = ScriptList::load(store).unwrap();
            for path in paths {
                scripts.add(*path).unwrap();
            }
            App::new(scripts, false)
        }

        #[tokio::test]
        async fn failed_start_clears_marker() {
            let dir = tempfile::tempdir().unwrap();
            let missing = dir.path().join("missing.sh").to_string_lossy().to_string();
            let mut app = app_with(&dir, &[&missing]);
            let mut registry = sh_registry(RestartPolicy::Restart, Duration::from_secs(1));

            handle_app_action(AppAction::Start(0), &mut app, &mut registry).await;

            assert!(!app.scripts.get(0).unwrap().running);
            let (text, level) = app.status_message().unwrap();
            assert!(text.contains("failed to spawn"));
            assert_eq!(level, StatusLevel::Warning);
            assert!(registry.is_empty());
        }

        #[tokio::test]
        async fn refused_double_start_keeps_marker() {
            let dir = tempfile::tempdir().unwrap();
            let script = write_script(&dir, "long.sh", "sleep 30\n");
            let mut app = app_with(&dir, &[&script]);
            let mut registry = sh_registry(RestartPolicy::Refuse, Duration::from_millis(500));

            handle_app_action(AppAction::Start(0), &mut app, &mut registry).await;
            assert!(app.scripts.get(0).unwrap().running);
            assert!(app.status_message().unwrap().0.starts_with("started: sh "));

            handle_app_action(AppAction::Start(0), &mut app, &mut registry).await;
            assert!(app.scripts.get(0).unwrap().running);
            assert!(app.status_message().unwrap().0.contains("already running"));
            assert!(registry.is_running(&script));

            registry.shutdown_all(Duration::from_millis(500)).await;
        }

        #[tokio::test]
        async fn stop_of_never_started_row_reports_lookup_error() {
            let dir = tempfile::tempdir().unwrap();
            let script = write_script(&dir, "idle.sh", "exit 0\n");
            let mut app = app_with(&dir, &[&script]);
            app.scripts.set_running(&script, true);
            let mut registry = sh_registry(RestartPolicy::Restart, Duration::from_secs(1));

            handle_app_action(AppAction::Stop(0), &mut app, &mut registry).await;

            assert!(!app.scripts.get(0).unwrap().running);
            let (text, level) = app.status_message().unwrap();
            assert!(text.contains("has not been started"));
            assert_eq!(level, StatusLevel::Warning);
        }

        #[tokio::test]
        async fn stop_of_running_row_clears_marker() {
            let dir = tempfile::tempdir().unwrap();
            let script = write_script(&dir, "long.sh", "sleep 30\n");
            let mut app = app_with(&dir, &[&script]);
            let mut registry = sh_registry(RestartPolicy::Restart, Duration::from_secs(2));

            handle_app_action(AppAction::Start(0), &mut app, &mut registry).await;
            handle_app_action(AppAction::Stop(0), &mut app, &mut registry).await;

            assert!(!app.scripts.get(0).unwrap().running);
            assert_eq!(app.status_message().unwrap().0, "stopping long.sh");
            registry.shutdown_all(Duration::from_millis(500)).await;
        }

        #[tokio::test]
        async fn removing_running_row_leaves_process_alive() {
            let dir = tempfile::tempdir().unwrap();
            let script = write_script(&dir, "long.sh", "sleep 30\n");
            let mut app = app_with(&dir, &[&script]);
            let mut registry = sh_registry(RestartPolicy::Restart, Duration::from_millis(500));

            handle_app_action(AppAction::Start(0), &mut app, &mut registry).await;
            handle_app_action(AppAction::Remove(0), &mut app, &mut registry).await;

            assert!(app.scripts.is_empty());
            assert_eq!(
                app.status_message().unwrap().0,
                "removed long.sh (still running)"
            );
            assert!(registry.is_running(&script));
            registry.shutdown_all(Duration::from_millis(500)).await;
        }
    }
}
