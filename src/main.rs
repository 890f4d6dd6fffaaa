use cash::{config::Config, helper::DynError, logging, shell::Shell};
use std::process::exit;

fn main() -> Result<(), DynError> {
    let config = Config::load();
    if let Err(e) = logging::init(&config) {
        eprintln!("cash: log file {} unavailable: {e}", config.log_file.display());
    }

    let mut sh = Shell::new(config);
    let code = sh.run()?;
    exit(code);
}
