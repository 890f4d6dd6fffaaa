//! Errors of the shell
use std::{ffi::NulError, io};
use thiserror::Error;

/// Tokenizer errors. The whole line is rejected
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("mismatched number of string quotes")]
    QuoteMismatch,
    #[error("misuse of string quotes")]
    QuoteMisuse,
}

/// Errors raised by the shell while launching processes. Reported and the loop continues
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("fork failed: {0}")]
    Spawn(nix::Error),
    #[error("pipe failed: {0}")]
    PipeCreate(nix::Error),
    #[error("no command supplied")]
    EmptyCommand,
    #[error("empty command in pipeline stage {0}")]
    EmptyStage(usize),
    #[error("pipelines cannot run in the background")]
    BackgroundPipeline,
    #[error("too many background jobs (limit {0})")]
    JobTableFull(usize),
    #[error("argument contains a nul byte: {0}")]
    Nul(#[from] NulError),
    #[error("cannot watch child termination: {0}")]
    Watch(#[source] io::Error),
    #[error("wait failed: {0}")]
    Wait(#[from] nix::Error),
}

/// Redirection errors. Fatal only to the child that owns the redirection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedirectionError {
    #[error("I/O redirection file unspecified")]
    TargetMissing,
    #[error("I/O redirection failed: {0}")]
    Open(nix::Error),
}

/// `cd` failure
#[derive(Debug, Error)]
#[error("directory not found: {path}")]
pub struct DirectoryError {
    pub path: String,
    #[source]
    pub source: io::Error,
}
