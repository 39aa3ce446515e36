// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Async process spawning and management.
//!
//! ```text
//! ProcessBuilder::new("ssh")
//!   .args() .cwd() .env() .capture_output() .timeout()
//!   .run() / .run_with_cancellation(token)
//!       --> tokio::process::Command
//!           stream stdout/stderr
//!       --> ProcessOutput { exit_code, stdout, stderr }
//! ```
//!
//! Used by [`crate::transport::local::LocalTransport`] to run commands
//! directly, and by [`crate::transport::ssh::SshTransport`] to spawn the
//! `ssh`/`rsync` client binaries.

pub mod builder;
mod io;
mod runner;
