//! ANSI accent colors

/// 0: red, 1: green, 2: yellow, 3: blue, 4: purple, 5: cyan
pub const COLORS: [&str; 6] = [
    "\x1b[0;31m",
    "\x1b[0;32m",
    "\x1b[0;33m",
    "\x1b[0;34m",
    "\x1b[0;35m",
    "\x1b[0;36m",
];

pub const NAMES: [&str; 6] = ["red", "green", "yellow", "blue", "purple", "cyan"];

pub const RESET: &str = "\x1b[0m";

pub const RED: usize = 0;
pub const BLUE: usize = 3;
pub const CYAN: usize = 5;

pub const PID_COLOR: usize = BLUE;
pub const ERR_COLOR: usize = RED;

/// Wraps `s` with the escape sequence of color `idx`
pub fn paint(idx: usize, s: impl std::fmt::Display) -> String {
    let c = COLORS.get(idx).copied().unwrap_or(COLORS[CYAN]);
    format!("{c}{s}{RESET}")
}
