//! Interactive chat loop.

use crate::catalog::format_models;
use crate::error::{AskError, Result};
use crate::history::SessionStore;
use crate::llm::broker::LlmBroker;
use crate::llm::chat_session::{ChatOptions, ChatSession};
use crate::render::{Palette, TerminalRenderer};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A line typed at the `>>>` prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    Clear,
    Save(Option<String>),
    Load(String),
    Models,
    Help,
    Empty,
    Message(String),
}

impl Command {
    /// Command words are case-insensitive; names and messages keep their case.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let mut parts = trimmed.splitn(2, char::is_whitespace);
        let word = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next().map(str::trim).filter(|s| !s.is_empty());

        match (word.as_str(), arg) {
            ("", _) => Command::Empty,
            ("exit" | "quit" | "q", None) => Command::Exit,
            ("clear", None) => Command::Clear,
            ("save", name) => Command::Save(name.map(String::from)),
            ("load", Some(name)) => Command::Load(name.to_string()),
            ("models", None) => Command::Models,
            ("help", None) => Command::Help,
            _ => Command::Message(trimmed.to_string()),
        }
    }
}

const HELP: &str = "\
  exit, quit, q     Exit the chat
  clear             Clear conversation history
  save [name]       Save session to file
  load <name>       Load a previous session
  models            List available models
  help              Show this help";

const TIPS: &str = "\
  - Use Ctrl+C to cancel a response
  - Pipe input: cat file.txt | ask \"summarize\"
  - Set default model: export ASK_MODEL=llama3";

/// Settings fixed for the lifetime of the loop
#[derive(Debug, Clone, Default)]
pub struct ReplOptions {
    pub system_prompt: Option<String>,
    pub num_ctx: Option<u32>,
    pub chat: ChatOptions,
    pub load_from: Option<String>,
    pub default_model: String,
}

/// Ctrl+C presses delivered to the loop, one message per press
pub type Interrupts = mpsc::UnboundedReceiver<()>;

/// Route SIGINT to the returned receiver for the rest of the process.
///
/// Must be called from within a Tokio runtime.
pub fn listen_for_ctrl_c() -> Interrupts {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Unable to listen for Ctrl+C: {}", e);
                break;
            }
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

pub struct Repl<R: AsyncBufRead + Unpin, W: Write> {
    broker: LlmBroker,
    store: SessionStore,
    palette: Palette,
    options: ReplOptions,
    session: ChatSession,
    interrupts: Option<Interrupts>,
    input: R,
    output: W,
}

impl<R: AsyncBufRead + Unpin, W: Write> Repl<R, W> {
    pub fn new(
        broker: LlmBroker,
        store: SessionStore,
        palette: Palette,
        options: ReplOptions,
        input: R,
        output: W,
    ) -> Self {
        let session =
            ChatSession::new(broker.clone(), options.system_prompt.as_deref(), options.num_ctx);

        Self {
            broker,
            store,
            palette,
            options,
            session,
            interrupts: None,
            input,
            output,
        }
    }

    /// Treat messages on `interrupts` as Ctrl+C: at the prompt the line is
    /// dropped, during a reply the reply is cancelled.
    pub fn with_interrupts(mut self, interrupts: Interrupts) -> Self {
        self.interrupts = Some(interrupts);
        self
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Run until `exit` or end of input
    pub async fn run(&mut self) -> Result<()> {
        self.banner()?;

        if let Some(name) = self.options.load_from.clone() {
            self.load(&name)?;
        }

        let mut line = String::new();
        loop {
            write!(self.output, "{}>>> {}", self.palette.green, self.palette.reset)?;
            self.output.flush()?;

            line.clear();
            let read = match self.interrupts.as_mut() {
                Some(interrupts) => tokio::select! {
                    biased;
                    Some(()) = interrupts.recv() => None,
                    read = self.input.read_line(&mut line) => Some(read?),
                },
                None => Some(self.input.read_line(&mut line).await?),
            };

            match read {
                None => {
                    self.interrupted()?;
                    continue;
                }
                Some(0) => {
                    writeln!(self.output, "\nExiting...")?;
                    return Ok(());
                }
                Some(_) => {}
            }

            let command = Command::parse(&line);
            debug!("REPL command: {:?}", command);

            match command {
                Command::Exit => return Ok(()),
                Command::Clear => {
                    self.session = self.fresh_session();
                    writeln!(self.output, "{}🧹 History cleared.{}", self.palette.yellow, self.palette.reset)?;
                }
                Command::Save(name) => self.save(name.as_deref())?,
                Command::Load(name) => self.load(&name)?,
                Command::Models => self.models().await?,
                Command::Help => self.help()?,
                Command::Empty => {}
                Command::Message(text) => self.exchange(text).await?,
            }
        }
    }

    fn banner(&mut self) -> Result<()> {
        let p = self.palette;
        writeln!(self.output, "{}🤖 Interactive Chat with {}{}", p.cyan, self.session.model(), p.reset)?;
        writeln!(self.output, "Commands: exit/quit, clear, save [name], load <name>, models, help")?;
        if self.options.chat.json_mode {
            writeln!(self.output, "{}📋 JSON mode enabled{}", p.yellow, p.reset)?;
        }
        if self.options.chat.think {
            writeln!(self.output, "{}💭 Thinking mode enabled{}", p.yellow, p.reset)?;
        }
        writeln!(self.output, "{}", "-".repeat(50))?;
        Ok(())
    }

    fn help(&mut self) -> Result<()> {
        let p = self.palette;
        writeln!(self.output, "\n{}Commands:{}\n{}\n", p.cyan, p.reset, HELP)?;
        writeln!(self.output, "{}Tips:{}\n{}\n", p.cyan, p.reset, TIPS)?;
        Ok(())
    }

    fn fresh_session(&self) -> ChatSession {
        ChatSession::new(
            self.broker.clone(),
            self.options.system_prompt.as_deref(),
            self.options.num_ctx,
        )
    }

    fn save(&mut self, name: Option<&str>) -> Result<()> {
        let p = self.palette;
        match self.store.save(&self.session, name) {
            Ok(path) => {
                let file = path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
                writeln!(self.output, "{}Session saved to {}{}", p.dim, file, p.reset)?;
            }
            Err(e) => {
                warn!("Saving session failed: {}", e);
                writeln!(self.output, "{}Error saving session: {}{}", p.red, e, p.reset)?;
            }
        }
        Ok(())
    }

    fn load(&mut self, name: &str) -> Result<()> {
        let p = self.palette;
        match self.store.load(name) {
            Ok((path, saved)) => {
                self.session = ChatSession::from_saved(&self.broker, saved);
                let file = path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
                writeln!(
                    self.output,
                    "{}Loaded session from {} ({} messages){}",
                    p.green,
                    file,
                    self.session.messages().len(),
                    p.reset
                )?;
            }
            Err(e) => writeln!(self.output, "{}{}{}", p.red, e, p.reset)?,
        }
        Ok(())
    }

    async fn models(&mut self) -> Result<()> {
        let p = self.palette;
        match self.broker.gateway().list_models().await {
            Ok(models) => {
                writeln!(self.output, "{}Available models:{}\n", p.cyan, p.reset)?;
                for line in format_models(&models, &self.options.default_model) {
                    writeln!(self.output, "{}", line)?;
                }
            }
            Err(e) => writeln!(self.output, "{}Error listing models: {}{}", p.red, e, p.reset)?,
        }
        Ok(())
    }

    async fn exchange(&mut self, text: String) -> Result<()> {
        let p = self.palette;
        self.session.add_user_message(text);

        let mut renderer = TerminalRenderer::new(&mut self.output, p);
        let exchange = self.session.chat(self.options.chat, &mut renderer);

        let outcome = match self.interrupts.as_mut() {
            Some(interrupts) => tokio::select! {
                result = exchange => Some(result),
                Some(()) = interrupts.recv() => None,
            },
            None => Some(exchange.await),
        };

        match outcome {
            Some(Ok(_)) => {}
            Some(Err(AskError::Io(e))) => return Err(AskError::Io(e)),
            Some(Err(e)) => report_error(&mut self.output, p, &e)?,
            None => self.interrupted()?,
        }
        Ok(())
    }

    fn interrupted(&mut self) -> Result<()> {
        debug!("Interrupted");
        writeln!(self.output, "\n{}(interrupted){}", self.palette.yellow, self.palette.reset)?;
        Ok(())
    }
}

/// Print a failed exchange the way both modes show it
pub fn report_error<W: Write>(out: &mut W, p: Palette, err: &AskError) -> Result<()> {
    writeln!(out, "\n{}Error: {}{}", p.red, err, p.reset)?;
    if err.is_connection() {
        writeln!(out, "\n{}Tip: Is Ollama running? Try: ollama serve{}", p.yellow, p.reset)?;
    }
    Ok(())
}
