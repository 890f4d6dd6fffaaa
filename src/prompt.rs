//! Prompt and greeting
use crate::color::{paint, ERR_COLOR};
use nix::libc;
use std::path::Path;

const DEFAULT_WIDTH: usize = 80;

/// Keeps the last `n` components of `dir`
///
/// # Example
///
/// `truncate_dir("/usr/local/share/man", 2)` gives `"share/man"`.
pub fn truncate_dir(dir: &str, n: usize) -> String {
    let slashes = dir.matches('/').count();
    if slashes < n {
        return dir.to_string();
    }
    let parts: Vec<&str> = dir.split('/').collect();
    parts[parts.len() - n..].join("/")
}

/// Current directory as shown in the prompt: ~ for the home directory, otherwise its last two components
pub fn display_dir(cwd: &Path, home: Option<&Path>) -> String {
    if home.map_or(false, |h| h == cwd) {
        return "~".to_string();
    }
    truncate_dir(&cwd.to_string_lossy(), 2)
}

/// Terminal width of stdout
pub fn term_width() -> usize {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let r = unsafe {
        libc::ioctl(
            libc::STDOUT_FILENO,
            libc::TIOCGWINSZ,
            &mut ws as *mut libc::winsize,
        )
    };
    if r == 0 && ws.ws_col > 0 {
        ws.ws_col as usize
    } else {
        DEFAULT_WIDTH
    }
}

/// Two-line prompt
///
/// ```text
/// ┌─{user@host}──────────{dir}
/// └─♥
/// ```
///
/// The heart is red if the last command failed.
pub fn render(
    user: &str,
    host: &str,
    dir: &str,
    width: usize,
    accent: usize,
    last_status: i32,
) -> String {
    // 7 = decoration characters
    let used = user.chars().count() + host.chars().count() + dir.chars().count() + 7;
    let filler = "─".repeat(width.saturating_sub(used));
    let heart = if last_status == 0 {
        paint(accent, "♥")
    } else {
        paint(ERR_COLOR, "♥")
    };

    format!(
        "┌─{{{}@{}}}{filler}{{{}}}\n└─{heart} ",
        paint(accent, user),
        paint(accent, host),
        paint(accent, dir),
    )
}

/// Greeting shown at start-up
pub fn greeting(width: usize, accent: usize) -> String {
    let line1 = "Welcome to CASH! The cute awesome shell.";
    let line2 = "Type help to see the available features.";
    let pad = |s: &str| " ".repeat(width.saturating_sub(s.chars().count()) / 2);

    format!(
        "\n{}Welcome to {}! The cute awesome shell.\n{}Type {} to see the available features.\n",
        pad(line1),
        paint(accent, "CASH"),
        pad(line2),
        paint(accent, "help"),
    )
}
