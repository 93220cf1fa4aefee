//! Core library for vershift.
//!
//! This crate provides the foundational types and functionality used by the
//! `vershift` CLI and any downstream consumers.
//!
//! # Modules
//!
//! - [`check`] - Version check orchestration (extract, diff, classify)
//! - [`config`] - Configuration loading and management
//! - [`document`] - JSON/YAML/TOML parsing into a common tree
//! - [`error`] - Error types and result aliases
//! - [`git`] - Previous-commit lookups
//! - [`query`] - Dotted key path resolution
//! - [`version`] - Version comparison and change classification
//!
//! # Quick Start
//!
//! ```no_run
//! use vershift_core::check::{self, CheckRequest, Target};
//! use vershift_core::git::Git;
//!
//! let request = CheckRequest {
//!     target: Target::parse("Cargo.toml#package.version", None),
//!     diff_search: true,
//! };
//! let report = check::run(&request, &Git::new()).expect("version check failed");
//! for (name, value) in report.outputs() {
//!     println!("{name}={value}");
//! }
//! ```
#![deny(unsafe_code)]

pub mod check;

pub mod config;

pub mod document;

pub mod error;

pub mod git;

pub mod query;

pub mod version;

pub use check::{CheckRequest, Report, Target};

pub use config::{Config, ConfigLoader, LogLevel, OutputFormat};

pub use error::{CheckError, CheckResult, ConfigError, ConfigResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
