//! Configuration repository helper.
//!
//! `cfgctl` keeps a personal configuration repository tidy: it reformats
//! every tracked file by handing it to an external formatter chosen by path
//! pattern, and it materializes the repository's `home/` subtree as symbolic
//! links under the user's home directory (and takes them down again).
//!
//! The public API is organised into these layers:
//!
//! - **[`walk`]**: lazy, ignore-aware tree walker shared by every command
//! - **[`formatters`]**: pattern registry, dispatch grouping and formatter invocation
//! - **[`resources`]**: idempotent `check + apply` primitives (symlinks)
//! - **[`parallel`]**: bounded fan-out/fan-in job execution
//! - **[`commands`]**: top-level subcommand orchestration (`format`, `symlinks`, `handlers`)
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod formatters;
pub mod logging;
pub mod parallel;
pub mod resources;
pub mod walk;

pub use context::Context;
