// rr: remote task runner
//
// SPDX-License-Identifier: MIT

//! Library root.
//!
//! # Crate architecture
//!
//! ```text
//!                         main.rs
//!                            |
//!                           cli
//!                            |
//!              +-------------+-------------+
//!              v                           v
//!           config                       host
//!       types/expand/validator      prober/selector
//!       loader/merge/paths               |
//!              |                         v
//!              +------------+------- transport
//!                           v        ssh/local/mock
//!                        resolver
//!                           |
//!              +------------+------------+
//!              v                         v
//!          executor                orchestrator
//!        (single host,            (work-stealing,
//!         one plan)                many hosts)
//!              |                         |
//!              +------------+------------+
//!                           v
//!                          lock
//!                      (mutual exclusion)
//!
//!                         clean
//!              (stale branch-dir scanner, standalone)
//!
//!   +-------------------------------------------+
//!   |  core    env container, process builder   |
//!   +-------------------------------------------+
//!   |  git     read-only ${PROJECT}/${BRANCH}    |
//!   +-------------------------------------------+
//!   |  foundation   error, logging, utility      |
//!   +-------------------------------------------+
//! ```
//!
//! Five core subsystems (`SPEC_FULL.md` §2 C1-C9): configuration resolution
//! (`config`), host selection and probing (`host`, `transport`), the
//! dependency resolver (`resolver`), the plan executor and parallel
//! orchestrator (`executor`, `orchestrator`), and the distributed lock
//! (`lock`). `clean` is a standalone maintenance scanner. `cli` is the thin
//! external surface wiring the library to a user-facing binary.

pub mod cli;
pub mod clean;
pub mod config;
pub mod core;
pub mod error;
pub mod executor;
pub mod git;
pub mod host;
pub mod lock;
pub mod logging;
pub mod orchestrator;
pub mod resolver;
pub mod transport;
pub mod utility;
