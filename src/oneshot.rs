//! A single question answered without entering the chat loop.

use crate::error::{AskError, Result};
use crate::llm::broker::LlmBroker;
use crate::llm::chat_session::{ChatOptions, ChatSession};
use crate::render::{Palette, SilentSink, TerminalRenderer};
use crate::repl::report_error;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct OneShot {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub num_ctx: Option<u32>,
    pub chat: ChatOptions,
    /// Write the answer here instead of to `out`
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Answered,
    Failed,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Answered => ExitCode::SUCCESS,
            Outcome::Failed => ExitCode::FAILURE,
        }
    }
}

/// Ask once. Answers go to `out`, failures are reported on `err`.
pub async fn run<W: Write, E: Write>(
    broker: LlmBroker,
    request: OneShot,
    palette: Palette,
    out: &mut W,
    err: &mut E,
) -> Result<Outcome> {
    let mut session = ChatSession::new(broker, request.system_prompt.as_deref(), request.num_ctx);
    session.add_user_message(request.prompt);

    let result = match &request.output {
        Some(_) => session.chat(request.chat, &mut SilentSink).await,
        None => {
            let mut renderer = TerminalRenderer::new(&mut *out, palette);
            session.chat(request.chat, &mut renderer).await
        }
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            report_error(err, palette, &e)?;
            return Ok(Outcome::Failed);
        }
    };

    if let Some(path) = request.output {
        if let Err(e) = std::fs::write(&path, &response.answer) {
            let e = AskError::Io(e);
            writeln!(err, "{}Error writing to {}: {}{}", palette.red, path.display(), e, palette.reset)?;
            return Ok(Outcome::Failed);
        }
        info!("Answer written to {}", path.display());
        writeln!(out, "Written to {}", path.display())?;
    }

    Ok(Outcome::Answered)
}
