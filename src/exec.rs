//! Process launching: single commands (foreground or background) and pipelines
use crate::{
    builtin::Builtin,
    error::{LaunchError, RedirectionError},
    helper::{child_exit, syscall, CleanUp},
    job::JobControl,
    redirect::{self, detach_stdio, Redirection},
    state::{Flow, State},
};
use log::{debug, info, warn};
use nix::{
    fcntl::OFlag,
    libc,
    sys::{
        signal::{kill, Signal},
        wait::{waitpid, WaitStatus},
    },
    unistd::{self, dup2, execvp, fork, pipe2, setpgid, ForkResult, Pid},
};
use std::{ffi::CString, io::Write, os::unix::io::RawFd};

/// Exit status of a child whose program could not be executed
pub const EXIT_NOT_FOUND: i32 = 127;

/// Exit status of a child whose redirection failed
pub const EXIT_REDIRECT: i32 = 1;

/// What an argument vector runs as
#[derive(Debug)]
pub enum Command<'a> {
    Builtin(Builtin),
    External(&'a [String]),
}

impl<'a> Command<'a> {
    pub fn classify(argv: &'a [String]) -> Self {
        match Builtin::parse(argv) {
            Some(b) => Command::Builtin(b),
            None => Command::External(argv),
        }
    }
}

/// Runs one command. Builtins run in the shell itself, other programs in a child process.
///
/// A foreground command is waited for and its exit status returned in `Flow::Continue`.
/// A background command is registered in the job table and the call returns at once.
pub fn execute_single(
    state: &mut State,
    argv: &[String],
    background: bool,
) -> Result<Flow, LaunchError> {
    if argv.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }

    match Command::classify(argv) {
        Command::Builtin(b) => {
            debug!("builtin: {b:?}");
            Ok(run_builtin(&b, state, &mut std::io::stdout()))
        }
        Command::External(argv) => {
            if background {
                spawn_background(&mut state.jobs, argv)?;
                Ok(Flow::Continue(0))
            } else {
                spawn_foreground(argv).map(Flow::Continue)
            }
        }
    }
}

/// Runs a builtin writing to `out`. An output error is logged and gives status 1
fn run_builtin<W: Write>(b: &Builtin, state: &mut State, out: &mut W) -> Flow {
    b.run(state, out).unwrap_or_else(|e| {
        warn!("builtin {b:?}: failed to write output: {e}");
        Flow::Continue(1)
    })
}

/// Runs a pipeline of two or more commands and waits for every stage
pub fn execute_pipeline(stages: &[Vec<String>]) -> Result<Flow, LaunchError> {
    spawn_pipeline(stages).map(Flow::Continue)
}

fn to_cstrings(argv: &[String]) -> Result<Vec<CString>, LaunchError> {
    Ok(argv
        .iter()
        .map(|s| CString::new(s.as_str()))
        .collect::<Result<Vec<_>, _>>()?)
}

/// Replaces the child with `args[0]`. Never returns
fn exec_child(args: &[CString]) -> ! {
    let Some(filename) = args.first() else {
        child_exit(&[b"error: no command supplied\n"], EXIT_NOT_FOUND);
    };

    let _ = execvp(filename, args);
    child_exit(
        &[b"error: command '", filename.as_bytes(), b"' not found\n"],
        EXIT_NOT_FOUND,
    )
}

/// Applies the redirection found in the parent and returns the arguments left to execute.
/// Terminates the child on failure
fn redirect_child<'a>(
    args: &'a [CString],
    redirection: &Result<Option<Redirection>, RedirectionError>,
) -> &'a [CString] {
    match redirection {
        Ok(None) => args,
        Ok(Some(r)) => match r.apply() {
            Ok(index) => &args[..index],
            Err(_) => child_exit(
                &[b"error: I/O redirection failed: ", r.target.as_bytes(), b"\n"],
                EXIT_REDIRECT,
            ),
        },
        Err(_) => child_exit(&[b"error: I/O redirection file unspecified\n"], EXIT_REDIRECT),
    }
}

/// Exit status of a terminated process. 128 + signal number if killed by a signal
fn wait_status(pid: Pid) -> Result<i32, LaunchError> {
    loop {
        match syscall(|| waitpid(pid, None))? {
            WaitStatus::Exited(_, status) => {
                debug!("pid {pid} exited: status = {status}");
                return Ok(status);
            }
            WaitStatus::Signaled(_, sig, core) => {
                debug!(
                    "pid {pid} killed by {sig}{}",
                    if core { " (core dumped)" } else { "" }
                );
                return Ok(sig as i32 + 128);
            }
            _ => (), // stopped or continued; keep waiting
        }
    }
}

/// Forks and execs `argv`, then blocks until that child terminates
fn spawn_foreground(argv: &[String]) -> Result<i32, LaunchError> {
    let args = to_cstrings(argv)?;
    let redirection = redirect::find(argv);

    match syscall(|| unsafe { fork() }).map_err(LaunchError::Spawn)? {
        ForkResult::Child => {
            let args = redirect_child(&args, &redirection);
            exec_child(args)
        }
        ForkResult::Parent { child } => {
            info!("spawned {child}: {}", argv.join(" "));
            wait_status(child)
        }
    }
}

/// Forks and execs `argv` detached from the terminal and registers it as a job
fn spawn_background(jobs: &mut JobControl, argv: &[String]) -> Result<Pid, LaunchError> {
    let args = to_cstrings(argv)?;
    let redirection = redirect::find(argv);

    // the watcher must be listening before the child can terminate
    jobs.prepare_background()?;

    match syscall(|| unsafe { fork() }).map_err(LaunchError::Spawn)? {
        ForkResult::Child => {
            // own process group: keyboard signals for the shell do not reach it
            let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
            if detach_stdio().is_err() {
                child_exit(&[b"error: cannot open /dev/null\n"], EXIT_REDIRECT);
            }
            let args = redirect_child(&args, &redirection);
            exec_child(args)
        }
        ForkResult::Parent { child } => {
            let _ = setpgid(child, child);
            info!("spawned {child} in the background: {}", argv.join(" "));
            jobs.register(child, argv)?;
            Ok(child)
        }
    }
}

/// Closes every descriptor of `pipes`
fn close_pipes(pipes: &[(RawFd, RawFd)]) {
    for &(r, w) in pipes {
        let _ = unistd::close(r);
        let _ = unistd::close(w);
    }
}

/// Kills and reaps the stages spawned before a failure
fn abort_stages(pids: &[Pid]) {
    for &pid in pids {
        let _ = kill(pid, Signal::SIGKILL);
        let _ = syscall(|| waitpid(pid, None));
        warn!("pipeline aborted: killed {pid}");
    }
}

/// Forks one process per stage. Stage i reads from pipe i - 1 and writes to pipe i
fn spawn_pipeline(stages: &[Vec<String>]) -> Result<i32, LaunchError> {
    if let Some(i) = stages.iter().position(|s| s.is_empty()) {
        return Err(LaunchError::EmptyStage(i));
    }
    let args = stages
        .iter()
        .map(|s| to_cstrings(s))
        .collect::<Result<Vec<_>, _>>()?;
    let n = args.len();

    // n - 1 pipes, closed by the parent whatever happens below
    let mut pipes = Vec::with_capacity(n.saturating_sub(1));
    for _ in 1..n {
        match pipe2(OFlag::O_CLOEXEC) {
            Ok(p) => pipes.push(p),
            Err(e) => {
                close_pipes(&pipes);
                return Err(LaunchError::PipeCreate(e));
            }
        }
    }
    let cleanup_pipe = CleanUp {
        f: || close_pipes(&pipes),
    };

    let mut pids = Vec::with_capacity(n);
    for (i, stage) in args.iter().enumerate() {
        match syscall(|| unsafe { fork() }) {
            Ok(ForkResult::Child) => {
                if i > 0 && syscall(|| dup2(pipes[i - 1].0, libc::STDIN_FILENO)).is_err() {
                    child_exit(&[b"error: dup2 failed\n"], EXIT_REDIRECT);
                }
                if i < n - 1 && syscall(|| dup2(pipes[i].1, libc::STDOUT_FILENO)).is_err() {
                    child_exit(&[b"error: dup2 failed\n"], EXIT_REDIRECT);
                }
                close_pipes(&pipes);
                exec_child(stage)
            }
            Ok(ForkResult::Parent { child }) => {
                info!("spawned {child} (stage {i}): {}", stages[i].join(" "));
                pids.push(child);
            }
            Err(e) => {
                drop(cleanup_pipe);
                abort_stages(&pids);
                return Err(LaunchError::Spawn(e));
            }
        }
    }

    // the parent never uses the pipes
    drop(cleanup_pipe);

    let mut status = 0;
    for pid in pids {
        status = wait_status(pid)?;
    }
    Ok(status)
}
