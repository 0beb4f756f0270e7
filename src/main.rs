//! Opsmate - Entry Point
//!
//! Interactive console that turns operator requests into shell commands on a
//! remote host. Sets up logging and the async runtime, connects over SSH,
//! and runs the read-resolve-confirm-execute loop.

use clap::Parser;
use crossterm::style::Stylize;
use opsmate::command::{execution_lines, resolution_lines, Orchestrator, OutputLine, OutputTag, ResolveMode};
use opsmate::core::config::AssistantConfig;
use opsmate::core::error::Result;
use opsmate::llm::credential_for;
use opsmate::remote::{OpenSshTransport, SshTarget};

use std::io::{self, Write};
use std::path::PathBuf;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "opsmate")]
#[command(about = "Talk to your Linux servers in plain language")]
struct Args {
    /// Host to connect to at startup
    #[arg(long)]
    host: Option<String>,

    #[arg(long, default_value_t = 22)]
    port: u16,

    #[arg(long, default_value = "root")]
    user: String,

    /// Private key passed to ssh
    #[arg(long)]
    identity: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resolution mode: rule or ai
    #[arg(long, default_value = "rule")]
    mode: ResolveMode,

    /// AI backend to select (DeepSeek, OpenAI, Qwen, Ollama, Anthropic)
    #[arg(long)]
    provider: Option<String>,

    /// Model override for --provider
    #[arg(long)]
    model: Option<String>,
}

const REPL_HELP: &str = "\
Console commands:
  :connect <host> [port] [user]   Connect over SSH
  :disconnect                     Close the connection
  :mode rule|ai                   Switch resolution mode
  :provider <name> [key] [model]  Configure and select an AI backend
  :providers                      List AI backends
  :history [keyword]              Search this host's history
  :recent                         Recently executed commands
  :clear                          Forget this host's history
  :help                           Show this help
  :quit                           Exit
Anything else is resolved into a command and run on the connected host.";

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("opsmate=info")),
        )
        .with_writer(io::stderr)
        .init();

    let config = AssistantConfig::load_or_default(args.config.as_deref())?;
    let rt = Runtime::new()?;

    let mut orchestrator = Orchestrator::from_config(&config)?;
    orchestrator.set_mode(args.mode);

    if let Some(name) = &args.provider {
        use_provider(&mut orchestrator, &config, name, None, args.model.as_deref());
    }

    println!("\n=== OPSMATE ===");
    println!("Mode: {}. Type :help for console commands.", orchestrator.mode());

    if let Some(host) = &args.host {
        let target = SshTarget::new(host.clone(), args.port, args.user.clone())
            .with_identity(args.identity.clone());
        rt.block_on(connect(&mut orchestrator, &config, target));
    }

    loop {
        let prompt = match orchestrator.connected_host() {
            Some(host) => format!("{} [{}]> ", host, orchestrator.mode()),
            None => format!("(not connected) [{}]> ", orchestrator.mode()),
        };
        print!("{}", prompt);
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(console) = input.strip_prefix(':') {
            let mut parts = console.split_whitespace();
            let verb = parts.next().unwrap_or_default();
            let rest: Vec<&str> = parts.collect();

            match verb {
                "quit" | "q" | "exit" => break,
                "help" => println!("{}", REPL_HELP),
                "connect" => match rest.first() {
                    Some(host) => {
                        let port = rest.get(1).and_then(|p| p.parse().ok()).unwrap_or(args.port);
                        let user = rest.get(2).map(|u| u.to_string()).unwrap_or_else(|| args.user.clone());
                        let target = SshTarget::new(*host, port, user).with_identity(args.identity.clone());
                        rt.block_on(connect(&mut orchestrator, &config, target));
                    }
                    None => println!("Usage: :connect <host> [port] [user]"),
                },
                "disconnect" => match orchestrator.disconnect() {
                    Some(host) => println!("Disconnected from {}", host),
                    None => println!("Not connected"),
                },
                "mode" => match rest.first().map(|m| m.parse::<ResolveMode>()) {
                    Some(Ok(mode)) => {
                        orchestrator.set_mode(mode);
                        println!("Mode: {}", mode);
                    }
                    Some(Err(e)) => println!("{}", e),
                    None => println!("Mode: {}", orchestrator.mode()),
                },
                "provider" => match rest.first() {
                    Some(name) => {
                        use_provider(&mut orchestrator, &config, name, rest.get(1).copied(), rest.get(2).copied())
                    }
                    None => println!("Usage: :provider <name> [api-key] [model]"),
                },
                "providers" => list_providers(&orchestrator),
                "history" => show_history(&orchestrator, rest.join(" ").as_str()),
                "recent" => {
                    let commands = orchestrator.memory().recent_commands(5);
                    if commands.is_empty() {
                        println!("No commands yet");
                    }
                    for command in commands {
                        println!("  $ {}", command);
                    }
                }
                "clear" => {
                    if orchestrator.memory().current_host().is_some() {
                        orchestrator.memory_mut().clear(None);
                        println!("History cleared");
                    } else {
                        println!("Not connected");
                    }
                }
                other => println!("Unknown console command :{} (try :help)", other),
            }
            continue;
        }

        if let Err(e) = rt.block_on(handle_utterance(&mut orchestrator, input)) {
            render(&OutputLine::new(OutputTag::Error, e.to_string()));
        }
    }

    orchestrator.disconnect();
    println!("\nGoodbye!");
    Ok(())
}

async fn connect(orchestrator: &mut Orchestrator, config: &AssistantConfig, target: SshTarget) {
    println!("Connecting to {}...", target.summary());
    let host = target.host_id();
    match OpenSshTransport::connect(target, config.remote.connect_timeout()).await {
        Ok(transport) => {
            let summary = orchestrator.connect_host(Box::new(transport), host).await;
            render(&OutputLine::new(OutputTag::Success, format!("Connected. {}", summary)));
            render(&OutputLine::new(OutputTag::Info, orchestrator.host_context().os_hint));
        }
        Err(e) => render(&OutputLine::new(OutputTag::Error, e.to_string())),
    }
}

async fn handle_utterance(orchestrator: &mut Orchestrator, input: &str) -> Result<()> {
    let mut turn = orchestrator.begin_turn(input).await;
    for line in resolution_lines(turn.resolution()) {
        render(&line);
    }

    if turn.is_finished() {
        return Ok(());
    }
    if !orchestrator.is_connected() {
        render(&OutputLine::new(OutputTag::Error, "Not connected. Use :connect <host> first."));
        return Ok(());
    }

    if turn.needs_confirmation() {
        print!("Run this dangerous command? [y/N] ");
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            turn.confirm()?;
        } else {
            turn.decline()?;
            println!("Cancelled.");
            return Ok(());
        }
    }

    let outcome = orchestrator.execute(&mut turn).await?;
    for line in execution_lines(&outcome) {
        render(&line);
    }
    if let Some(reading) = orchestrator.interpret(&turn, &outcome).await {
        render(&OutputLine::new(OutputTag::Advisory, reading));
    }
    Ok(())
}

fn use_provider(
    orchestrator: &mut Orchestrator,
    config: &AssistantConfig,
    name: &str,
    key: Option<&str>,
    model: Option<&str>,
) {
    let providers = orchestrator.providers_mut();
    let already = providers.get(name).map(|p| p.is_configured()).unwrap_or(false);

    if key.is_some() || model.is_some() || !already {
        let credential = key.map(str::to_string).or_else(|| credential_for(config, name)).unwrap_or_default();
        if !providers.configure(name, &credential, model) {
            render(&OutputLine::new(
                OutputTag::Error,
                format!("Could not configure {} (unknown name or missing API key)", name),
            ));
            return;
        }
    }

    if providers.select(name) {
        render(&OutputLine::new(OutputTag::Success, format!("Using {}", name)));
    } else {
        render(&OutputLine::new(OutputTag::Error, format!("{} is not configured", name)));
    }
}

fn list_providers(orchestrator: &Orchestrator) {
    let providers = orchestrator.providers();
    let current = providers.current().map(|p| p.name().to_string());
    for provider in providers.providers() {
        let marker = if current.as_deref() == Some(provider.name()) { "*" } else { " " };
        let status = if provider.is_configured() { "configured" } else { "not configured" };
        println!(
            " {} {:<10} {:<26} {}",
            marker,
            provider.name(),
            provider.config().model,
            status
        );
    }
}

fn show_history(orchestrator: &Orchestrator, keyword: &str) {
    let memory = orchestrator.memory();
    if memory.current_host().is_none() {
        println!("Not connected");
        return;
    }
    println!("{}", memory.summary());
    for record in memory.search(keyword) {
        let status = if record.success { "ok".green() } else { "failed".red() };
        println!(
            "  [{}] {} {} -> {}",
            status, record.timestamp, record.user_input, record.command
        );
    }
}

fn render(line: &OutputLine) {
    let text = line.text.as_str();
    match line.tag {
        OutputTag::Info => println!("{}", text.cyan()),
        OutputTag::Command => println!("  $ {}", text.bold()),
        OutputTag::Danger => println!("{} {}", "!!".red().bold(), text.red()),
        OutputTag::Explanation => println!("  {}", text),
        OutputTag::Advisory => println!("  {}", text.yellow()),
        OutputTag::Output => println!("{}", text),
        OutputTag::Error => println!("{}", text.red()),
        OutputTag::Success => println!("{}", text.green()),
    }
}
