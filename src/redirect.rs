//! I/O redirection (`>`, `>>`, `<`)
//!
//! The operator is located in the parent before `fork`; the child only opens
//! the file and binds it.
use crate::{error::RedirectionError, helper::syscall};
use nix::{
    fcntl::{open, OFlag},
    libc,
    sys::stat::Mode,
    unistd::{close, dup2},
};
use std::{ffi::CString, os::unix::io::RawFd};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Output, // >
    Append, // >>
    Input,  // <
}

impl RedirectKind {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            ">" => Some(RedirectKind::Output),
            ">>" => Some(RedirectKind::Append),
            "<" => Some(RedirectKind::Input),
            _ => None,
        }
    }

    fn flags(self) -> OFlag {
        match self {
            RedirectKind::Output => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
            RedirectKind::Append => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
            RedirectKind::Input => OFlag::O_RDONLY,
        }
    }

    /// Standard descriptor rebound by this operator
    pub fn stdio(self) -> RawFd {
        match self {
            RedirectKind::Output | RedirectKind::Append => libc::STDOUT_FILENO,
            RedirectKind::Input => libc::STDIN_FILENO,
        }
    }
}

/// The first redirection operator of an argument vector
#[derive(Debug, PartialEq, Eq)]
pub struct Redirection {
    pub index: usize, // position of the operator; the argument vector is cut here
    pub kind: RedirectKind,
    pub target: CString,
}

/// Finds the first `>`, `>>` or `<`. Only that one is honored.
///
/// Returns Ok(None) if there is no operator.
pub fn find(argv: &[String]) -> Result<Option<Redirection>, RedirectionError> {
    let Some((index, kind)) = argv
        .iter()
        .enumerate()
        .find_map(|(i, s)| RedirectKind::from_token(s).map(|k| (i, k)))
    else {
        return Ok(None);
    };

    let target = argv.get(index + 1).ok_or(RedirectionError::TargetMissing)?;
    let target =
        CString::new(target.as_str()).map_err(|_| RedirectionError::Open(nix::Error::EINVAL))?;

    Ok(Some(Redirection {
        index,
        kind,
        target,
    }))
}

impl Redirection {
    /// Opens the file and binds it to the standard descriptor of the operator.
    /// Returns the index at which the argument vector must be truncated.
    pub fn apply(&self) -> Result<usize, RedirectionError> {
        self.apply_to(self.kind.stdio())?;
        Ok(self.index)
    }

    /// Opens the file and binds it to `fd`
    fn apply_to(&self, fd: RawFd) -> Result<(), RedirectionError> {
        let mode = Mode::from_bits_truncate(0o666);
        let file = syscall(|| open(self.target.as_c_str(), self.kind.flags(), mode))
            .map_err(RedirectionError::Open)?;
        if file != fd {
            syscall(|| dup2(file, fd)).map_err(RedirectionError::Open)?;
            let _ = close(file);
        }
        Ok(())
    }
}

/// Binds stdin, stdout and stderr to /dev/null
pub fn detach_stdio() -> Result<(), RedirectionError> {
    let null = syscall(|| open("/dev/null", OFlag::O_RDWR, Mode::empty()))
        .map_err(RedirectionError::Open)?;
    for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        if null != fd {
            syscall(|| dup2(null, fd)).map_err(RedirectionError::Open)?;
        }
    }
    if null > libc::STDERR_FILENO {
        let _ = close(null);
    }
    Ok(())
}
