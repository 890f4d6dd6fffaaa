//! Commands run inside the shell process
use crate::{
    color::{paint, ERR_COLOR, NAMES, PID_COLOR},
    error::DirectoryError,
    state::{Flow, State},
};
use log::info;
use std::{
    io::{self, Write},
    path::PathBuf,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Builtin {
    Exit(Option<String>),      // exit [status]
    ChangeDir(Option<String>), // cd [path]
    SetColor(Option<String>),  // color <0-5|-h>
    ListJobs,                  // jobs
    Help,                      // help
}

impl Builtin {
    /// Returns None if `argv` is not a builtin
    pub fn parse(argv: &[String]) -> Option<Self> {
        let arg = argv.get(1).cloned();
        match argv.first()?.as_str() {
            "exit" => Some(Builtin::Exit(arg)),
            "cd" => Some(Builtin::ChangeDir(arg)),
            "color" => Some(Builtin::SetColor(arg)),
            "jobs" => Some(Builtin::ListJobs),
            "help" => Some(Builtin::Help),
            _ => None,
        }
    }

    /// Runs the builtin. Regular output goes to `out`
    pub fn run<W: Write>(&self, state: &mut State, out: &mut W) -> io::Result<Flow> {
        match self {
            Builtin::Exit(arg) => Ok(run_exit(arg.as_deref())),
            Builtin::ChangeDir(arg) => Ok(run_cd(arg.as_deref())),
            Builtin::SetColor(arg) => run_color(state, arg.as_deref(), out),
            Builtin::ListJobs => run_jobs(state, out),
            Builtin::Help => run_help(out),
        }
    }
}

/// Terminates the shell with status 0, or with the status given as operand.
/// An operand that is not an integer is reported and ignored
fn run_exit(arg: Option<&str>) -> Flow {
    match arg.map(|s| s.parse::<i32>()) {
        None => Flow::Quit(0),
        Some(Ok(n)) => Flow::Quit(n),
        Some(Err(_)) => {
            eprintln!("exit: {} is not a valid status", arg.unwrap_or_default());
            Flow::Quit(0)
        }
    }
}

/// Changes the current directory. Without an operand, moves to the home directory or /
pub fn change_dir(arg: Option<&str>) -> Result<PathBuf, DirectoryError> {
    let path = match arg {
        Some(p) => PathBuf::from(p),
        None => dirs::home_dir().unwrap_or_else(|| PathBuf::from("/")),
    };

    std::env::set_current_dir(&path).map_err(|source| DirectoryError {
        path: path.display().to_string(),
        source,
    })?;
    Ok(path)
}

fn run_cd(arg: Option<&str>) -> Flow {
    match change_dir(arg) {
        Ok(path) => {
            info!("cd {}", path.display());
            Flow::Continue(0)
        }
        Err(e) => {
            eprintln!("{}: directory not found", paint(ERR_COLOR, "cd error"));
            info!("{e}");
            Flow::Continue(1)
        }
    }
}

fn run_color<W: Write>(state: &mut State, arg: Option<&str>, out: &mut W) -> io::Result<Flow> {
    let Some(arg) = arg else {
        writeln!(out, "color: missing operand")?;
        writeln!(out, "Type 'color -h' for proper usage.")?;
        return Ok(Flow::Continue(1));
    };

    if arg == "-h" {
        writeln!(out, "usage: color [color_code]\n")?;
        writeln!(out, "valid color codes:")?;
        for (i, name) in NAMES.iter().enumerate() {
            writeln!(out, "  {i} -> {name}")?;
        }
        return Ok(Flow::Continue(0));
    }

    match arg.parse::<usize>() {
        Ok(n) if n < NAMES.len() => {
            state.accent = n;
            Ok(Flow::Continue(0))
        }
        _ => {
            writeln!(out, "color: invalid operand")?;
            writeln!(out, "Type 'color -h' for proper usage.")?;
            Ok(Flow::Continue(1))
        }
    }
}

fn run_jobs<W: Write>(state: &State, out: &mut W) -> io::Result<Flow> {
    writeln!(out, "currently running:")?;
    let jobs = state.jobs.list();
    if jobs.is_empty() {
        writeln!(out, "none")?;
    }
    for job in jobs {
        writeln!(out, "[{}] {}", paint(PID_COLOR, job.pid), job.command_line())?;
    }
    Ok(Flow::Continue(0))
}

const HELP: &str = "\
built-in commands:
  exit: exit the shell
  cd: change directory
  color: change the accent color
  jobs: shows the processes running in the background
  help: show this message

features:
  - history and readline keybinds
  - running processes in the background ('&')
  - pipes ('|')
  - I/O redirection ('>', '>>', '<')
  - string quotes (e.g: \"hello\")";

fn run_help<W: Write>(out: &mut W) -> io::Result<Flow> {
    writeln!(out, "{HELP}")?;
    Ok(Flow::Continue(0))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use nix::unistd::Pid;
    use std::process::Command;

    fn v(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn run(b: &Builtin, state: &mut State) -> (Flow, String) {
        let mut out = Vec::new();
        let flow = b.run(state, &mut out).unwrap();
        (flow, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_parse() {
        assert_eq!(Builtin::parse(&v(&["exit"])), Some(Builtin::Exit(None)));
        assert_eq!(
            Builtin::parse(&v(&["cd", "/tmp", "extra"])),
            Some(Builtin::ChangeDir(Some("/tmp".into())))
        );
        assert_eq!(Builtin::parse(&v(&["jobs"])), Some(Builtin::ListJobs));
        assert_eq!(Builtin::parse(&v(&["help"])), Some(Builtin::Help));
        assert_eq!(
            Builtin::parse(&v(&["color", "3"])),
            Some(Builtin::SetColor(Some("3".into())))
        );
        assert_eq!(Builtin::parse(&v(&["ls"])), None);
        assert_eq!(Builtin::parse(&[]), None);
    }

    #[test]
    fn test_exit() {
        let mut state = State::new(&Config::default());
        assert_eq!(run(&Builtin::Exit(None), &mut state).0, Flow::Quit(0));
        assert_eq!(
            run(&Builtin::Exit(Some("3".into())), &mut state).0,
            Flow::Quit(3)
        );
        assert_eq!(
            run(&Builtin::Exit(Some("x".into())), &mut state).0,
            Flow::Quit(0)
        );
    }

    #[test]
    fn test_color() {
        let mut state = State::new(&Config::default());

        let (flow, _) = run(&Builtin::SetColor(Some("2".into())), &mut state);
        assert_eq!(flow, Flow::Continue(0));
        assert_eq!(state.accent, 2);

        for bad in ["6", "-1", "blue"] {
            let (flow, out) = run(&Builtin::SetColor(Some(bad.into())), &mut state);
            assert_eq!(flow, Flow::Continue(1));
            assert!(out.starts_with("color: invalid operand"));
        }
        assert_eq!(state.accent, 2);

        let (_, out) = run(&Builtin::SetColor(None), &mut state);
        assert!(out.starts_with("color: missing operand"));

        let (_, out) = run(&Builtin::SetColor(Some("-h".into())), &mut state);
        assert!(out.contains("  5 -> cyan"));
    }

    #[test]
    fn test_jobs() {
        let mut state = State::new(&Config::default());
        let (_, out) = run(&Builtin::ListJobs, &mut state);
        assert_eq!(out, "currently running:\nnone\n");

        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let pid = Pid::from_raw(child.id() as i32);
        state.jobs.prepare_background().unwrap();
        state.jobs.register(pid, &v(&["sleep", "5"])).unwrap();

        let (_, out) = run(&Builtin::ListJobs, &mut state);
        assert!(out.starts_with("currently running:\n"));
        assert!(out.contains(&pid.to_string()));
        assert!(out.trim_end().ends_with("sleep 5"));

        child.kill().unwrap();
        let _ = child.wait();
    }

    #[test]
    fn test_change_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        assert!(change_dir(Some(missing.to_str().unwrap())).is_err());
    }

    #[test]
    fn test_help() {
        let mut state = State::new(&Config::default());
        let (flow, out) = run(&Builtin::Help, &mut state);
        assert_eq!(flow, Flow::Continue(0));
        assert!(out.contains("jobs: shows the processes running in the background"));
    }
}
