//! Relay CLI binary entry point.

use std::sync::Arc;

use clap::Parser;
use relay::cli::{demo_tools, ChatArgs, Cli, Commands, StdoutConsole};
use relay::config::{LlmOptions, RelayConfig};
use relay::history::HistoryLogger;
use relay::llm::Llm;
use relay::models::ModelCapabilities;
use relay::provider::OpenAiCompatibleProvider;
use relay::tools::ToolContext;
use relay::types::ChatMessage;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Chat(args) => handle_chat(cli.config, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn handle_chat(
    config_path: Option<std::path::PathBuf>,
    args: ChatArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = RelayConfig::load(config_path.as_deref())?;
    if args.history_dir.is_some() {
        config.history_dir = args.history_dir.clone();
    }
    let model = args
        .model
        .clone()
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let capabilities = if args.emulate_tools {
        ModelCapabilities::default().with_json_schema(!args.json_object)
    } else {
        ModelCapabilities::full(128_000)
    };
    let provider = OpenAiCompatibleProvider::from_config(&config, &model, capabilities)?;

    let options = LlmOptions::new(args.prompt.clone()).with_echo();
    let history = match &args.history_dir {
        Some(root) => HistoryLogger::create(root, &options.task),
        None => HistoryLogger::disabled(),
    };
    let cancel = CancellationToken::new();
    let llm = Llm::new(Arc::new(provider), options)
        .with_io(Arc::new(StdoutConsole))
        .with_history(history)
        .with_timeouts(config.timeouts)
        .with_retry_policy(config.retry_policy())
        .with_cancellation(cancel.clone());

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let mut messages = Vec::new();
    if let Some(system) = args.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(args.prompt));

    let tools = match (args.emulate_tools, args.require_tool) {
        (false, _) => ToolContext::empty(),
        (true, false) => ToolContext::auto(demo_tools()),
        (true, true) => ToolContext::required(demo_tools()),
    };
    let result = llm.send_request_with_tools(messages, &tools).await?;

    println!();
    if let Some(reasoning) = result.reasoning().filter(|_| args.emulate_tools) {
        eprintln!("reasoning: {reasoning}");
    }
    if let Some(usage) = result.usage() {
        eprintln!("{usage}");
    }
    match result.into_parts() {
        (_, Some(error)) => Err(error.into()),
        _ => Ok(()),
    }
}
