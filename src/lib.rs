//! # CASH: an interactive command shell
//!
//! Lines are split into argument vectors, split again on `|`, and run as
//! one process or a chain of processes connected by pipes.
//! A trailing `&` runs a command in the background; finished background
//! jobs are reported before the next prompt.
//!
//! ## Example
//!
//! ```no_run
//! use cash::{config::Config, shell::Shell};
//! let mut sh = Shell::new(Config::default());
//! sh.execute_line("ls -l | wc -l").unwrap();
//! ```
pub mod builtin;
pub mod color;
pub mod config;
pub mod error;
pub mod exec;
pub mod helper;
pub mod job;
pub mod logging;
pub mod parser;
pub mod prompt;
pub mod redirect;
pub mod shell;
pub mod state;
