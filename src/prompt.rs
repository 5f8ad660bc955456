//! Building the one-shot prompt from arguments and piped input.

use crate::error::Result;
use std::io::{IsTerminal, Read};

/// Combine the prompt words with piped context.
///
/// Returns `None` when neither carries any text.
pub fn compose_prompt(args_text: &str, stdin_text: Option<&str>) -> Option<String> {
    let args_text = args_text.trim();
    let stdin_text = stdin_text.map(str::trim).unwrap_or("");

    match (args_text.is_empty(), stdin_text.is_empty()) {
        (true, true) => None,
        (false, true) => Some(args_text.to_string()),
        (true, false) => Some(stdin_text.to_string()),
        (false, false) => Some(format!("{}\n\nContext:\n{}", args_text, stdin_text)),
    }
}

/// Read all of stdin when it is a pipe or file, never when it is a terminal
pub fn read_piped_stdin() -> Result<Option<String>> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(Some(buffer))
}
