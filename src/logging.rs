//! Diagnostic log file
use crate::{config::Config, helper::DynError};
use simplelog::WriteLogger;
use std::fs::File;

/// Truncates the log file and installs it as the `log` backend
pub fn init(config: &Config) -> Result<(), DynError> {
    let file = File::create(&config.log_file)?;
    WriteLogger::init(config.level_filter(), simplelog::Config::default(), file)?;
    log::info!("cash started: pid = {}", std::process::id());
    Ok(())
}
