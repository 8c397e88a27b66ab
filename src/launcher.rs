//! Spawning scripts.
//!
//! A script is run as `<interpreter> <script>` from the script's own directory, with both
//! output streams redirected into a freshly truncated `<script>.log`. The interpreter is
//! looked up in the script's directory tree first (a bundled virtualenv, say) and falls back
//! to a plain command name resolved through `PATH`.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use ignore::WalkBuilder;
use tokio::process::{Child, Command};

use crate::error::ScriptError;

/// How scripts are launched.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    /// Command used when no interpreter is found next to the script.
    pub interpreter: String,
    /// File names that count as an interpreter during the directory search.
    pub interpreter_names: Vec<String>,
    /// Env file looked up in the script's directory.
    pub env_file: String,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter().to_string(),
            interpreter_names: default_interpreter_names(),
            env_file: ".env".to_string(),
        }
    }
}

pub fn default_interpreter() -> &'static str {
    if cfg!(windows) {
        "pythonw"
    } else {
        "python3"
    }
}

pub fn default_interpreter_names() -> Vec<String> {
    if cfg!(windows) {
        vec!["pythonw.exe".to_string()]
    } else {
        vec!["python3".to_string(), "python".to_string()]
    }
}

/// Result of interpreter resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpreter {
    /// An executable found inside the script's directory tree.
    Found(PathBuf),
    /// Nothing found; the default command name is used as-is.
    Fallback(String),
}

impl Interpreter {
    pub fn program(&self) -> &OsStr {
        match self {
            Interpreter::Found(path) => path.as_os_str(),
            Interpreter::Fallback(name) => OsStr::new(name),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Interpreter::Found(path) => path.display().to_string(),
            Interpreter::Fallback(name) => name.clone(),
        }
    }
}

/// A freshly spawned script.
#[derive(Debug)]
pub struct Launched {
    pub child: Child,
    pub pid: Option<u32>,
    pub interpreter: Interpreter,
    pub log_path: PathBuf,
}

/// `<script>.log`
pub fn log_path(script: &str) -> PathBuf {
    PathBuf::from(format!("{}.log", script))
}

/// Searches `dir` recursively for a file named like one of `names` (case-insensitive).
///
/// The shallowest match wins; ties go to the first in file-name order.
pub fn resolve_interpreter(dir: &Path, names: &[String], fallback: &str) -> Interpreter {
    if names.is_empty() {
        return Interpreter::Fallback(fallback.to_string());
    }
    // Deepest level still worth visiting; lowered to one above each match.
    let limit = Arc::new(AtomicUsize::new(usize::MAX));
    let filter_limit = Arc::clone(&limit);
    let walker = WalkBuilder::new(dir)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(move |entry| entry.depth() <= filter_limit.load(Ordering::Relaxed))
        .build();
    let mut best: Option<PathBuf> = None;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(true) {
            continue;
        }
        let matches = {
            let name = entry.file_name().to_string_lossy();
            names.iter().any(|n| n.eq_ignore_ascii_case(&name))
        };
        if !matches {
            continue;
        }
        let depth = entry.depth();
        best = Some(entry.into_path());
        if depth <= 1 {
            break;
        }
        limit.store(depth - 1, Ordering::Relaxed);
    }
    match best {
        Some(path) => Interpreter::Found(path),
        None => Interpreter::Fallback(fallback.to_string()),
    }
}

/// Reads `<dir>/<env_file>` if it exists.
///
/// Keys already present in this process's environment are left out so inherited values win.
pub fn load_env_file(dir: &Path, env_file: &str) -> HashMap<String, String> {
    let path = dir.join(env_file);
    let mut vars = HashMap::new();
    if !path.is_file() {
        return vars;
    }
    let iter = match dotenvy::from_path_iter(&path) {
        Ok(iter) => iter,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to open env file");
            return vars;
        }
    };
    for item in iter {
        match item {
            Ok((key, value)) => {
                if std::env::var_os(&key).is_none() {
                    vars.insert(key, value);
                }
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping env file entry");
            }
        }
    }
    vars
}

/// Makes `script` absolute against the current directory.
pub fn absolute_path(script: &str) -> Result<PathBuf> {
    let path = PathBuf::from(script);
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("failed to resolve current dir")?;
    Ok(cwd.join(path))
}

/// Spawns `script` with its output going to `<script>.log`.
pub fn launch(script: &str, settings: &LaunchSettings) -> Result<Launched> {
    let script_path = absolute_path(script)?;
    if !script_path.is_file() {
        return Err(ScriptError::Spawn {
            path: script.to_string(),
            program: script_path.display().to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "script not found"),
        }
        .into());
    }
    let dir = script_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let interpreter = resolve_interpreter(&dir, &settings.interpreter_names, &settings.interpreter);
    if let Interpreter::Fallback(name) = &interpreter {
        tracing::debug!(script, interpreter = %name, "no interpreter in script tree, using default");
    }

    let log_path = log_path(script);
    let stdout = File::create(&log_path)
        .with_context(|| format!("failed to create log file {}", log_path.display()))?;
    let stderr = stdout
        .try_clone()
        .with_context(|| format!("failed to share log file {}", log_path.display()))?;
    let env = load_env_file(&dir, &settings.env_file);

    let mut command = Command::new(interpreter.program());
    command
        .arg(&script_path)
        .current_dir(&dir)
        .envs(&env)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);

    #[cfg(windows)]
    {
        const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
        command.creation_flags(CREATE_NEW_PROCESS_GROUP);
    }

    #[cfg(unix)]
    unsafe {
        command.pre_exec(|| {
            let _ = libc::setpgid(0, 0);
            Ok(())
        });
    }

    let child = command.spawn().map_err(|source| ScriptError::Spawn {
        path: script.to_string(),
        program: interpreter.display(),
        source,
    })?;
    let pid = child.id();
    tracing::info!(
        script,
        pid,
        interpreter = %interpreter.display(),
        log = %log_path.display(),
        "script started"
    );
    Ok(Launched {
        child,
        pid,
        interpreter,
        log_path,
    })
}
