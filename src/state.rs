use crate::{color::CYAN, config::Config, job::JobControl};

/// What the shell does after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue(i32), // read the next line. i32 is the exit status of the command
    Quit(i32),     // terminate the shell. i32 is the exit status of the shell
}

/// State shared by the shell loop, the builtins and the launchers
pub struct State {
    pub jobs: JobControl,
    pub accent: usize,    // accent color index
    pub last_status: i32, // exit status of the last foreground command
}

impl State {
    pub fn new(config: &Config) -> Self {
        State {
            jobs: JobControl::new(config.max_jobs),
            accent: if config.accent_color < 6 {
                config.accent_color
            } else {
                CYAN
            },
            last_status: 0,
        }
    }
}
