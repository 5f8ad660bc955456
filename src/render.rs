//! Terminal output for replies as they stream in.

use crate::error::Result;
use crate::llm::broker::ResponseEvent;
use crate::llm::thinking::AssembledResponse;
use std::io::Write;

/// Receives a reply while it is produced and once it is complete
pub trait ResponseSink {
    fn on_event(&mut self, event: &ResponseEvent) -> Result<()>;

    /// Called once per exchange. `streamed` tells whether `on_event` already saw the text.
    fn on_complete(&mut self, response: &AssembledResponse, streamed: bool) -> Result<()>;
}

/// ANSI codes, all empty when colour is off
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub cyan: &'static str,
    pub green: &'static str,
    pub yellow: &'static str,
    pub red: &'static str,
    pub dim: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        if enabled {
            Self {
                cyan: "\x1b[96m",
                green: "\x1b[92m",
                yellow: "\x1b[93m",
                red: "\x1b[91m",
                dim: "\x1b[2m",
                reset: "\x1b[0m",
            }
        } else {
            Self {
                cyan: "",
                green: "",
                yellow: "",
                red: "",
                dim: "",
                reset: "",
            }
        }
    }

    pub fn enabled(&self) -> bool {
        !self.reset.is_empty()
    }
}

/// Writes answers to a terminal, showing reasoning dimmed when colour is on.
///
/// Without colour (piped output) reasoning is suppressed so only the answer
/// reaches the reader.
pub struct TerminalRenderer<W: Write> {
    out: W,
    palette: Palette,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W, palette: Palette) -> Self {
        Self { out, palette }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResponseSink for TerminalRenderer<W> {
    fn on_event(&mut self, event: &ResponseEvent) -> Result<()> {
        let show_thinking = self.palette.enabled();
        let p = self.palette;

        match event {
            ResponseEvent::ThinkingStarted if show_thinking => write!(self.out, "{}💭 ", p.dim)?,
            ResponseEvent::Thinking(text) if show_thinking => {
                write!(self.out, "{}{}{}", p.dim, text, p.reset)?
            }
            ResponseEvent::ThinkingEnded if show_thinking => writeln!(self.out, "{}", p.reset)?,
            ResponseEvent::Answer(text) => write!(self.out, "{}", text)?,
            _ => {}
        }

        self.out.flush()?;
        Ok(())
    }

    fn on_complete(&mut self, response: &AssembledResponse, streamed: bool) -> Result<()> {
        if streamed {
            writeln!(self.out)?;
        } else {
            writeln!(self.out, "{}", response.answer)?;
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Discards everything; used when the answer goes to a file instead
#[derive(Debug, Default)]
pub struct SilentSink;

impl ResponseSink for SilentSink {
    fn on_event(&mut self, _event: &ResponseEvent) -> Result<()> {
        Ok(())
    }

    fn on_complete(&mut self, _response: &AssembledResponse, _streamed: bool) -> Result<()> {
        Ok(())
    }
}
