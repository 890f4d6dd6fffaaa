use crate::{
    color::{paint, ERR_COLOR},
    config::Config,
    error::{LaunchError, ParseError},
    exec,
    helper::DynError,
    parser, prompt,
    state::{Flow, State},
};
use log::{debug, info, warn};
use rustyline::{error::ReadlineError, Editor};
use signal_hook::{consts::SIGINT, flag};
use std::{
    env,
    sync::{atomic::AtomicBool, Arc},
};

#[derive(Debug)]
struct Identity {
    user: String,
    host: String,
}

impl Identity {
    fn current() -> Self {
        let user = env::var("USER")
            .or_else(|_| env::var("LOGNAME"))
            .unwrap_or_else(|_| "user".to_string());
        let host = nix::unistd::gethostname()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string());
        Identity { user, host }
    }
}

pub struct Shell {
    config: Config,
    state: State,
}

impl Shell {
    pub fn new(config: Config) -> Self {
        let state = State::new(&config);
        Shell { config, state }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Reads and executes lines until `exit` or end of input. Returns the exit status of the shell
    pub fn run(&mut self) -> Result<i32, DynError> {
        // Ctrl+C must terminate the foreground child, not the shell.
        // A handler (unlike SIG_IGN) is reset to the default by exec in the child.
        flag::register(SIGINT, Arc::new(AtomicBool::new(false)))?;

        let mut rl = Editor::<()>::new()?;
        if let Err(e) = rl.load_history(&self.config.history_file) {
            debug!("history not loaded: {e}");
        }

        let id = Identity::current();
        let home = dirs::home_dir();
        if self.config.greeting {
            println!("{}", prompt::greeting(prompt::term_width(), self.state.accent));
        }

        let exit_val; // exit status of the shell
        loop {
            // report finished background jobs before reading the next line
            self.state.jobs.reap_finished();

            let cwd = env::current_dir().unwrap_or_default();
            let face = prompt::render(
                &id.user,
                &id.host,
                &prompt::display_dir(&cwd, home.as_deref()),
                prompt::term_width(),
                self.state.accent,
                self.state.last_status,
            );

            match rl.readline(&face) {
                Ok(line) => {
                    let result = self.execute_line(&line);
                    if let Some(entry) = history_entry(&line, &result) {
                        rl.add_history_entry(entry);
                    }
                    match result {
                        Ok(Flow::Quit(n)) => {
                            exit_val = n;
                            break;
                        }
                        Ok(Flow::Continue(_)) => (),
                        Err(e) => {
                            eprintln!("{}: {e}", paint(ERR_COLOR, "error"));
                            self.state.last_status = 1;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => eprintln!("cash: type exit or Ctrl+D to quit"),
                Err(ReadlineError::Eof) => {
                    exit_val = 0;
                    break;
                }
                Err(e) => {
                    eprintln!("cash: read error\n{e}");
                    exit_val = 1;
                    break;
                }
            }
        }

        if let Err(e) = rl.save_history(&self.config.history_file) {
            eprintln!("cash: failed to write the history file: {e}");
        }
        info!("cash exits: status = {exit_val}");
        Ok(exit_val)
    }

    /// Tokenizes and executes one line. Err if the tokenizer rejected the line, in which case nothing ran
    pub fn execute_line(&mut self, line: &str) -> Result<Flow, ParseError> {
        let argv = parser::tokenize(line)?;
        debug!("line: {argv:?}");
        Ok(self.execute(argv))
    }

    /// Executes an argument vector: a single command, a pipeline, or a background command
    pub fn execute(&mut self, mut argv: Vec<String>) -> Flow {
        if argv.is_empty() {
            return Flow::Continue(self.state.last_status);
        }

        let background = parser::strip_background(&mut argv);
        let result = match parser::split_pipeline(&argv) {
            None => exec::execute_single(&mut self.state, &argv, background),
            Some(_) if background => Err(LaunchError::BackgroundPipeline),
            Some(stages) => exec::execute_pipeline(&stages),
        };

        match result {
            Ok(Flow::Continue(n)) => {
                if !background {
                    self.state.last_status = n;
                }
                Flow::Continue(n)
            }
            Ok(quit) => quit,
            Err(e) => {
                eprintln!("{}: {e}", paint(ERR_COLOR, "error"));
                warn!("{e}");
                self.state.last_status = 1;
                Flow::Continue(1)
            }
        }
    }
}

/// The history entry for `line`: the trimmed line if it is not blank and was tokenized
fn history_entry<'a>(line: &'a str, result: &Result<Flow, ParseError>) -> Option<&'a str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || result.is_err() {
        None
    } else {
        Some(trimmed)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{
        thread,
        time::{Duration, Instant},
    };

    fn new_shell() -> Shell {
        Shell::new(Config::default())
    }

    #[test]
    fn test_parse_error_runs_nothing() {
        let mut sh = new_shell();
        assert_eq!(
            sh.execute_line(r#"echo "unterminated"#),
            Err(ParseError::QuoteMismatch)
        );
        assert_eq!(
            sh.execute_line(r#"echo a"b"c"#),
            Err(ParseError::QuoteMisuse)
        );
    }

    #[test]
    fn test_history_entry() {
        let mut sh = new_shell();

        let line = "   ";
        assert_eq!(history_entry(line, &sh.execute_line(line)), None);

        let line = r#"echo "unterminated"#;
        assert_eq!(history_entry(line, &sh.execute_line(line)), None);

        let line = "  true  ";
        assert_eq!(history_entry(line, &sh.execute_line(line)), Some("true"));

        // a failed command is still recorded
        let line = "false";
        assert_eq!(history_entry(line, &sh.execute_line(line)), Some("false"));
    }

    #[test]
    fn test_blank_line() {
        let mut sh = new_shell();
        assert_eq!(sh.execute_line("   "), Ok(Flow::Continue(0)));
    }

    #[test]
    fn test_exit() {
        let mut sh = new_shell();
        assert_eq!(sh.execute_line("exit"), Ok(Flow::Quit(0)));
        assert_eq!(sh.execute_line("exit 2"), Ok(Flow::Quit(2)));
    }

    #[test]
    fn test_status_propagation() {
        let mut sh = new_shell();
        assert_eq!(sh.execute_line("false"), Ok(Flow::Continue(1)));
        assert_eq!(sh.state().last_status, 1);
        assert_eq!(sh.execute_line("true"), Ok(Flow::Continue(0)));
        assert_eq!(sh.state().last_status, 0);
    }

    #[test]
    fn test_pipeline_waits_for_all() {
        let mut sh = new_shell();
        let start = Instant::now();
        assert_eq!(
            sh.execute_line("sleep 1 | true"),
            Ok(Flow::Continue(0))
        );
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(sh.execute_line("false | true"), Ok(Flow::Continue(0)));
    }

    #[test]
    fn test_launch_errors_continue() {
        let mut sh = new_shell();
        assert_eq!(sh.execute_line("&"), Ok(Flow::Continue(1)));
        assert_eq!(sh.execute_line("a | | b"), Ok(Flow::Continue(1)));
        assert_eq!(sh.execute_line("true | true &"), Ok(Flow::Continue(1)));
        assert!(sh.state().jobs.list().is_empty());
    }

    #[test]
    fn test_background_end_to_end() {
        let mut sh = new_shell();

        let start = Instant::now();
        assert_eq!(sh.execute_line("sleep 1 &"), Ok(Flow::Continue(0)));
        assert!(start.elapsed() < Duration::from_millis(900));

        let jobs = sh.state().jobs.list();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].command_line(), "sleep 1");
        assert_eq!(sh.execute_line("jobs"), Ok(Flow::Continue(0)));

        let mut done = Vec::new();
        while done.is_empty() && start.elapsed() < Duration::from_secs(10) {
            thread::sleep(Duration::from_millis(50));
            done = sh.state.jobs.reap_finished();
        }
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].command_line(), "sleep 1");
        assert!(sh.state().jobs.list().is_empty());
    }
}
