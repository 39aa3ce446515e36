// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Error handling module.
//!
//! ```text
//!              RrError (~24 bytes)
//!                     |
//!   +------+------+------+------+------+------+------+
//!   |      |      |      |      |      |      |      |
//!   v      v      v      v      v      v      v      v
//! Config Lock  Probe Transport Task Cancelled Dangerous Io/Other
//!  Box   Box    Box    Box     Box    (unit)    Path
//!
//! All non-trivial variants boxed => RrError fits in ~24 bytes.
//! ```
//!
//! The taxonomy mirrors `spec.md` §7 exactly: `ConfigError`, `LockHeld`,
//! `LockStale`, `ProbeFailure` (sub-categorised per §4.3), `TransportError`,
//! `TaskFailure`, `Cancelled`, `DangerousPath`.

use thiserror::Error;

/// Convenience alias for `anyhow::Result`, used by CLI-facing code that only
/// needs to propagate and render errors.
pub type Result<T> = anyhow::Result<T>;

/// Result type using [`RrError`], used by library internals that need to
/// match on error category (the selector falling back on `ProbeFailure`, the
/// lock retrying on `LockHeld`, etc).
pub type RrResult<T> = std::result::Result<T, RrError>;

/// Top-level application error type.
///
/// All sub-errors are boxed to keep this enum small on the stack.
#[derive(Debug, Error)]
pub enum RrError {
    /// Fatal error that should terminate the application.
    #[error("fatal error: {0}")]
    Bailed(Box<str>),

    /// Configuration error: validation failure, missing file, or parse error.
    /// Fatal; never retried.
    #[error("config error: {0}")]
    Config(#[from] Box<ConfigError>),

    /// Distributed lock error: held by a fresh holder, or stale and broken.
    #[error("lock error: {0}")]
    Lock(#[from] Box<LockError>),

    /// Host probe failed, sub-categorised by transport error text.
    #[error("probe error: {0}")]
    Probe(#[from] Box<ProbeError>),

    /// Transient connection loss mid-task. Reported, not retried by the core.
    #[error("transport error: {0}")]
    Transport(#[from] Box<TransportError>),

    /// Task resolution or execution error.
    #[error("task error: {0}")]
    Task(#[from] Box<TaskError>),

    /// Observed at a suspension point; propagates without retry.
    #[error("cancelled")]
    Cancelled,

    /// Refusal to operate on an empty, root, or home path.
    #[error("refusing to operate on dangerous path: {0}")]
    DangerousPath(Box<str>),

    /// Process spawn/runtime error.
    #[error("process error: {0}")]
    Process(#[from] Box<ProcessError>),

    /// I/O error.
    #[error("io error: {0}")]
    Io(Box<std::io::Error>),

    /// Generic error with message.
    #[error("{0}")]
    Other(Box<str>),
}

/// Create a fatal [`RrError::Bailed`] that terminates the application.
pub fn bail_out(message: impl Into<String>) -> RrError {
    RrError::Bailed(message.into().into_boxed_str())
}

macro_rules! impl_from_boxed {
    ($($error:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$error> for RrError {
                fn from(err: $error) -> Self {
                    RrError::$variant(Box::new(err))
                }
            }
        )+
    };
}

impl_from_boxed! {
    ConfigError => Config,
    LockError => Lock,
    ProbeError => Probe,
    TransportError => Transport,
    TaskError => Task,
    ProcessError => Process,
    std::io::Error => Io,
}

// --- Config Errors ---

/// Configuration-related errors. Each carries a remediation hint per
/// `spec.md` §4.2 ("Reports rich errors: a one-line message and a
/// remediation hint").
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a configuration file.
    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },

    /// Configuration file not found.
    #[error("config file not found: {0}")]
    NotFound(String),

    /// Schema/semantic validation failure (host shape, task shape, cycles, etc).
    #[error("{message}\n  hint: {hint}")]
    Validation { message: String, hint: String },

    /// Invalid value for a specific key.
    #[error("invalid value for '{key}' in section '[{section}]': {message}")]
    InvalidValue {
        section: String,
        key: String,
        message: String,
    },
}

impl ConfigError {
    /// Builds a [`ConfigError::Validation`] from a message and a remediation hint.
    pub fn validation(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            hint: hint.into(),
        }
    }
}

// --- Lock Errors ---

/// Distributed lock errors (`spec.md` §4.8, §7).
#[derive(Debug, Error)]
pub enum LockError {
    /// Another holder's heartbeat is fresh; acquisition must wait or rotate hosts.
    #[error("lock for {project}@{host} held by {holder} (pid {pid}, heartbeat {age_secs}s ago)")]
    Held {
        host: String,
        project: String,
        holder: String,
        pid: u32,
        age_secs: u64,
    },

    /// Acquisition timed out waiting for a fresh holder to release.
    #[error("timed out waiting {waited_secs}s for lock on {project}@{host}")]
    WaitTimeout {
        host: String,
        project: String,
        waited_secs: u64,
    },

    /// The lock directory or its `info.json` could not be read or written.
    #[error("lock I/O error on {host}: {message}")]
    Io { host: String, message: String },
}

// --- Probe Errors ---

/// Reason a single alias probe failed, categorised by substring match on the
/// transport error text (`spec.md` §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeErrorKind {
    Timeout,
    Refused,
    Unreachable,
    Auth,
    HostKey,
    Unknown,
}

impl ProbeErrorKind {
    /// Categorise a raw transport error message by ordered substring match.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        const TABLE: &[(&[&str], ProbeErrorKind)] = &[
            (&["i/o timeout", "timed out", "timeout"], ProbeErrorKind::Timeout),
            (&["connection refused"], ProbeErrorKind::Refused),
            (
                &["no route to host", "network is unreachable", "host is down"],
                ProbeErrorKind::Unreachable,
            ),
            (
                &[
                    "unable to authenticate",
                    "permission denied",
                    "authentication failed",
                    "no supported methods",
                ],
                ProbeErrorKind::Auth,
            ),
            (&["host key verification failed"], ProbeErrorKind::HostKey),
        ];
        for (needles, kind) in TABLE {
            if needles.iter().any(|n| lower.contains(n)) {
                return *kind;
            }
        }
        ProbeErrorKind::Unknown
    }
}

impl std::fmt::Display for ProbeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Refused => "refused",
            Self::Unreachable => "unreachable",
            Self::Auth => "auth",
            Self::HostKey => "host-key",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A single alias probe failure.
#[derive(Debug, Error)]
#[error("{alias}: {kind} ({message})")]
pub struct ProbeError {
    pub alias: String,
    pub kind: ProbeErrorKind,
    pub message: String,
}

// --- Transport Errors ---

/// Transient connection loss mid-task, or a missing external tool.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The configured connection dropped mid-command.
    #[error("transport error on {alias}: {message}")]
    ConnectionLost { alias: String, message: String },

    /// A required external tool (`ssh`, `rsync`) is not on PATH.
    #[error("required tool not found on PATH: {tool}")]
    ToolNotFound { tool: String },

    /// The underlying process could not be spawned.
    #[error("failed to spawn transport process: {0}")]
    Spawn(#[from] Box<ProcessError>),
}

// --- Task Errors ---

/// Task resolution and execution errors.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Referenced task does not exist in the resolved config.
    #[error("task '{0}' not found")]
    NotFound(String),

    /// `Resolve(task, {From: X})` could not find `X` anywhere in the plan.
    #[error("task '{from}' is not in the dependency chain for '{target}'")]
    NotInChain { target: String, from: String },

    /// No hosts are configured and local fallback is disabled.
    #[error("no hosts configured and local fallback is disabled")]
    NoHosts,

    /// Non-zero exit from a remote command. Non-fatal unless fail-fast.
    #[error("task '{name}' exited with code {code}")]
    ExecutionFailed { name: String, code: i32 },

    /// A task in the dependency chain failed, aborting execution of a dependent.
    #[error("task '{task}' did not run because dependency '{dependency}' failed")]
    DependencyFailed { task: String, dependency: String },

    /// A concurrently-spawned task panicked before reporting a result.
    #[error("task join failed: {0}")]
    JoinFailure(String),
}

// --- Process Errors ---

/// Local process execution errors (used by the process runner and both
/// transport implementations).
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Executable not found in PATH.
    #[error("executable not found: '{name}' (not in PATH)")]
    ExecutableNotFound { name: String },

    /// Failed to spawn process.
    #[error("failed to spawn process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Process exited with non-zero status.
    #[error("process '{command}' exited with code {code}")]
    NonZeroExit { command: String, code: i32 },

    /// Process timed out.
    #[error("process '{command}' timed out after {timeout_secs} seconds")]
    Timeout { command: String, timeout_secs: u64 },
}
