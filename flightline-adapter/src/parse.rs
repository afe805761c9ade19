//! Stateless classification of tool output lines into structured events.
//!
//! The tool speaks an ad hoc line-oriented text protocol. A line that
//! matches no known shape degrades to [`OutputEvent::Info`] rather than
//! aborting a long-running job. The one escalation is a `%`-bearing line
//! whose trailing token fails to parse: it becomes an
//! [`OutputEvent::Error`] carrying the raw line, never a silently wrong
//! percentage.

use crate::types::OutputEvent;

/// Prefix the tool uses to mark lines that should not reach the user.
const NOISE_MARKER: char = '*';

/// Classifies one line of tool output.
///
/// Returns `None` for noise lines, otherwise exactly one event. The percent
/// check runs before the error check, so a well-formed progress line that
/// happens to contain the word "error" still counts as progress.
/// Classification of each line is independent of prior lines.
#[must_use]
pub fn classify_line(line: &str) -> Option<OutputEvent> {
    if line.contains('%') {
        return Some(parse_percent_line(line));
    }
    if line.to_lowercase().contains("error") {
        return Some(OutputEvent::Error {
            message: line.to_string(),
        });
    }
    if line.starts_with(NOISE_MARKER) {
        return None;
    }
    Some(OutputEvent::Info {
        message: line.to_string(),
    })
}

/// Parses a `%`-bearing line: the trailing whitespace-split token carries
/// the percent value, the rest of the line is the label.
fn parse_percent_line(line: &str) -> OutputEvent {
    let Some(token) = line.split_whitespace().next_back() else {
        return OutputEvent::Error {
            message: line.to_string(),
        };
    };
    let digits = token.replace('%', "");
    match digits.trim().parse::<i32>() {
        Ok(percent) => {
            let trimmed = line.trim_end();
            // `token` is the last whitespace-split piece, so it is a suffix
            // of the right-trimmed line.
            let label = trimmed[..trimmed.len() - token.len()].trim_end().to_string();
            OutputEvent::Progress { label, percent }
        }
        Err(_) => OutputEvent::Error {
            message: line.to_string(),
        },
    }
}
