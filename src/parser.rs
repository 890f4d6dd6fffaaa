//! Splits an input line into an argument vector and the argument vector into pipeline stages
use crate::error::ParseError;

/// Pipeline separator
pub const PIPE: &str = "|";

/// Trailing background marker
pub const BACKGROUND: &str = "&";

const QUOTE: char = '"';

fn count_quotes(s: &str) -> usize {
    s.chars().filter(|c| *c == QUOTE).count()
}

fn strip_quotes(s: &str) -> String {
    s.chars().filter(|c| *c != QUOTE).collect()
}

/// true if the only quote of the word is its first or last character
fn quote_at_edge(word: &str) -> bool {
    word.starts_with(QUOTE) || word.ends_with(QUOTE)
}

/// Splits a line on whitespace. A pair of double quotes makes one argument,
/// which may span several words.
///
/// # Example
///
/// `echo "a b" c` gives `vec!["echo", "a b", "c"]`.
///
/// # Errors
///
/// An odd number of quotes in the line gives `QuoteMismatch`.
/// Quotes placed anywhere but around a word give `QuoteMisuse`.
pub fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut budget = count_quotes(line);
    if budget % 2 == 1 {
        return Err(ParseError::QuoteMismatch);
    }

    let mut args = Vec::new();
    let mut words = line.split_whitespace();

    while let Some(word) = words.next() {
        let n = count_quotes(word);
        if budget == 0 || n == 0 {
            args.push(word.to_string());
            continue;
        }

        match n {
            2 => {
                // "word"
                if word.len() < 2 || !word.starts_with(QUOTE) || !word.ends_with(QUOTE) {
                    return Err(ParseError::QuoteMisuse);
                }
                args.push(strip_quotes(word));
                budget -= 2;
            }
            1 => {
                // "several words", joined with single spaces
                if !quote_at_edge(word) {
                    return Err(ParseError::QuoteMisuse);
                }
                let mut parts = vec![strip_quotes(word)];
                loop {
                    let next = words.next().ok_or(ParseError::QuoteMisuse)?;
                    match count_quotes(next) {
                        0 => parts.push(next.to_string()),
                        1 if quote_at_edge(next) => {
                            parts.push(strip_quotes(next));
                            break;
                        }
                        _ => return Err(ParseError::QuoteMisuse),
                    }
                }
                args.push(parts.join(" "));
                budget -= 2;
            }
            _ => return Err(ParseError::QuoteMisuse),
        }
    }

    Ok(args)
}

/// Removes a trailing `&` and returns true if it was present
pub fn strip_background(argv: &mut Vec<String>) -> bool {
    if argv.last().map_or(false, |s| s == BACKGROUND) {
        argv.pop();
        true
    } else {
        false
    }
}

/// Splits the argument vector on every `|`.
/// Returns None if there is no `|`, i.e., the line is a single command.
///
/// Empty stages (`a | | b`, `| a`) are kept here and rejected by the launcher.
pub fn split_pipeline(argv: &[String]) -> Option<Vec<Vec<String>>> {
    if !argv.iter().any(|s| s == PIPE) {
        return None;
    }

    let stages = argv
        .split(|s| s == PIPE)
        .map(|stage| stage.to_vec())
        .collect();
    Some(stages)
}
