use anyhow::Context;
use ask::catalog::format_models;
use ask::config::Settings;
use ask::history::SessionStore;
use ask::llm::gateways::{OllamaConfig, OllamaGateway};
use ask::llm::{ChatOptions, LlmBroker};
use ask::oneshot::{self, OneShot};
use ask::prompt::{compose_prompt, read_piped_stdin};
use ask::render::Palette;
use ask::repl::{listen_for_ctrl_c, Repl, ReplOptions};
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXAMPLES: &str = "\
Examples:
  ask \"How do I parse JSON in bash?\"
  ask -m llama3 \"Explain quantum physics\"
  cat file.txt | ask \"Summarize this\"
  ask --json \"List 5 fruits as JSON array\"
  ask -t \"Think step by step about this problem\"
  ask  # Enter interactive mode";

/// Ask Ollama anything via CLI
#[derive(Parser, Debug)]
#[command(name = "ask", about, after_help = EXAMPLES, disable_version_flag = true)]
struct Args {
    /// The prompt to send (if empty, enters interactive mode)
    #[arg(trailing_var_arg = true)]
    prompt: Vec<String>,

    /// Model to use (default: $ASK_MODEL or qwen3-coder-next)
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    system: Option<String>,

    /// Enable thinking/reasoning mode
    #[arg(short, long)]
    think: bool,

    /// Disable streaming output
    #[arg(long = "no-stream")]
    no_stream: bool,

    /// Force JSON output format
    #[arg(long)]
    json: bool,

    /// Context window size (num_ctx)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    ctx: Option<u32>,

    /// Load a previous session (interactive mode)
    #[arg(long, value_name = "NAME")]
    load: Option<String>,

    /// List available models
    #[arg(long)]
    list_models: bool,

    /// Write the answer to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Show version, host and default model
    #[arg(short = 'V', long)]
    version: bool,
}

fn version_text(settings: &Settings) -> String {
    format!(
        "ask v{}\nHost: {}\nDefault model: {}",
        env!("CARGO_PKG_VERSION"),
        settings.host,
        settings.default_model
    )
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let settings = Settings::from_env();
    if args.version {
        println!("{}", version_text(&settings));
        return Ok(ExitCode::SUCCESS);
    }

    let palette = Palette::new(settings.color);
    let model = args.model.clone().unwrap_or_else(|| settings.default_model.clone());
    debug!("Using {} at {}", model, settings.host);

    let gateway = Arc::new(OllamaGateway::with_config(OllamaConfig::from(&settings)));
    let broker = LlmBroker::new(model, gateway);

    if args.list_models {
        return list_models(&broker, &settings, palette).await;
    }

    let options = ChatOptions {
        stream: !args.no_stream,
        json_mode: args.json,
        think: args.think,
    };
    let stdin_text = read_piped_stdin().context("Failed to read piped input")?;

    match compose_prompt(&args.prompt.join(" "), stdin_text.as_deref()) {
        Some(prompt) => {
            let request = OneShot {
                prompt,
                system_prompt: args.system,
                num_ctx: args.ctx,
                chat: options,
                output: args.output,
            };
            let outcome = oneshot::run(
                broker,
                request,
                palette,
                &mut std::io::stdout(),
                &mut std::io::stderr(),
            )
            .await?;
            Ok(outcome.into())
        }
        None => {
            let repl_options = ReplOptions {
                system_prompt: args.system,
                num_ctx: args.ctx,
                chat: options,
                load_from: args.load,
                default_model: settings.default_model.clone(),
            };
            let store = SessionStore::from_settings(&settings);
            let mut repl = Repl::new(
                broker,
                store,
                palette,
                repl_options,
                tokio::io::BufReader::new(tokio::io::stdin()),
                std::io::stdout(),
            )
            .with_interrupts(listen_for_ctrl_c());
            repl.run().await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn list_models(
    broker: &LlmBroker,
    settings: &Settings,
    palette: Palette,
) -> anyhow::Result<ExitCode> {
    match broker.gateway().list_models().await {
        Ok(models) => {
            if !models.is_empty() {
                println!("{}Available models:{}\n", palette.cyan, palette.reset);
            }
            for line in format_models(&models, &settings.default_model) {
                println!("{}", line);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("{}Error listing models: {}{}", palette.red, e, palette.reset);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_flags_and_prompt() {
        let args = Args::try_parse_from([
            "ask", "-m", "llama3", "-t", "--json", "--ctx", "8192", "--no-stream", "-vv", "explain",
            "borrowing",
        ])
        .unwrap();

        assert_eq!(args.model.as_deref(), Some("llama3"));
        assert!(args.think);
        assert!(args.json);
        assert!(args.no_stream);
        assert_eq!(args.ctx, Some(8192));
        assert_eq!(args.verbose, 2);
        assert_eq!(args.prompt.join(" "), "explain borrowing");
    }

    #[test]
    fn test_parse_rejects_zero_ctx() {
        assert!(Args::try_parse_from(["ask", "--ctx", "0", "hi"]).is_err());
    }

    #[test]
    fn test_version_flag_shows_host_and_model() {
        let args = Args::try_parse_from(["ask", "-V"]).unwrap();
        assert!(args.version);

        let settings = Settings {
            host: "http://gpu:11434".to_string(),
            default_model: "llama3".to_string(),
            history_dir: PathBuf::from("/tmp"),
            max_history_sessions: 50,
            chat_timeout: std::time::Duration::from_secs(300),
            list_timeout: std::time::Duration::from_secs(10),
            color: false,
        };
        assert_eq!(
            version_text(&settings),
            format!(
                "ask v{}\nHost: http://gpu:11434\nDefault model: llama3",
                env!("CARGO_PKG_VERSION")
            )
        );
    }

    #[test]
    fn test_no_prompt_means_interactive() {
        let args = Args::try_parse_from(["ask", "--load", "work"]).unwrap();
        assert!(args.prompt.is_empty());
        assert_eq!(args.load.as_deref(), Some("work"));
    }
}
