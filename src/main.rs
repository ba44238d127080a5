#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::assigning_clones,
    clippy::bool_to_int_with_if,
    clippy::case_sensitive_file_extension_comparisons,
    clippy::cast_possible_wrap,
    clippy::doc_markdown,
    clippy::field_reassign_with_default,
    clippy::float_cmp,
    clippy::implicit_clone,
    clippy::items_after_statements,
    clippy::map_unwrap_or,
    clippy::manual_let_else,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::needless_raw_string_hashes,
    clippy::redundant_closure_for_method_calls,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::struct_field_names,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unused_self,
    clippy::cast_precision_loss,
    clippy::unnecessary_cast,
    clippy::unnecessary_lazy_evaluations,
    clippy::unnecessary_literal_bound,
    clippy::unnecessary_map_or,
    clippy::unnecessary_wraps,
    dead_code
)]

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use techdesk::agent::{self, AgentGate};
use techdesk::config::Config;
use techdesk::gateway::{self, AppState};
use techdesk::interactive::{self, InteractiveSession};
use techdesk::providers;
use techdesk::rag;
use techdesk::sessions;
use techdesk::tools::catalog::CATALOG;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// `techdesk` - IT support answers from your own documents.
#[derive(Parser, Debug)]
#[command(name = "techdesk")]
#[command(version)]
#[command(about = "IT support assistant over a fixed document set.", long_about = None)]
struct Cli {
    /// Directory holding config.toml (default: ~/.techdesk)
    #[arg(long, global = true)]
    config_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API
    #[command(long_about = "\
Start the HTTP API.

Serves the session and chat endpoints. Bind address defaults to the \
values in your config file (gateway.host / gateway.port).

Examples:
  techdesk serve                  # use config defaults
  techdesk serve -p 8080          # listen on port 8080
  techdesk serve --host 127.0.0.1 # loopback only")]
    Serve {
        /// Port to listen on; defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Chat in the terminal
    #[command(long_about = "\
Chat with the IT support agent in the terminal.

Keeps one conversation for the lifetime of the process. Use --message \
for a single question without entering the prompt loop.

Examples:
  techdesk chat
  techdesk chat -m \"How do I connect to the VPN?\"")]
    Chat {
        /// Single message mode (don't enter the prompt loop)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Show configuration and document status
    Status,

    /// List the document tools the agent can choose from
    Tools,

    /// List supported model providers
    Providers,

    /// Manage configuration
    #[command(long_about = "\
Manage techdesk configuration.

Use 'schema' to dump the full JSON Schema for the config file, which \
documents every available key, type, and default value.

Examples:
  techdesk config schema              # print JSON Schema to stdout
  techdesk config schema > schema.json")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `techdesk`.

The script is printed to stdout so it can be sourced directly:

Examples:
  source <(techdesk completions bash)
  techdesk completions zsh > ~/.zfunc/_techdesk
  techdesk completions fish > ~/.config/fish/completions/techdesk.fish")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Dump the full configuration JSON Schema to stdout
    Schema,
}

async fn build_gate(config: &Config) -> Result<Arc<AgentGate>> {
    let agent = agent::build_agent(config).await?;
    Ok(Arc::new(AgentGate::from_config(agent, &config.agent)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.trim().is_empty() {
            bail!("--config-dir cannot be empty");
        }
        std::env::set_var("TECHDESK_CONFIG_DIR", config_dir);
    }

    // Completions must remain stdout-only and should not load config or initialize logging.
    if let Commands::Completions { shell } = &cli.command {
        let mut stdout = std::io::stdout().lock();
        write_shell_completion(*shell, &mut stdout)?;
        return Ok(());
    }

    // A missing .env is fine; keys may come from the environment or config.toml.
    let _ = dotenvy::dotenv();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO.
    // Logs go to stderr so the terminal chat and JSON schema output stay clean.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = Config::load_or_init().await?;

    match cli.command {
        Commands::Completions { .. } => unreachable!(),

        Commands::Serve { port, host } => {
            let mut gateway_config = config.gateway.clone();
            if let Some(port) = port {
                gateway_config.port = port;
            }
            if let Some(host) = host {
                gateway_config.host = host;
            }
            info!(
                "🚀 Starting techdesk API on {}:{}",
                gateway_config.host, gateway_config.port
            );

            let gate = build_gate(&config).await?;
            let store = sessions::create_session_store(&config, gate.clone());
            info!(
                store = store.name(),
                agent = gate.agent_name(),
                max_sessions = config.sessions.max_sessions,
                "session store ready"
            );
            gateway::run_gateway(&gateway_config, AppState { store, gate }).await
        }

        Commands::Chat { message } => {
            let gate = build_gate(&config).await?;
            let mut session = InteractiveSession::from_config(gate, &config);
            match message {
                Some(message) => {
                    println!("{}", interactive::run_once(&mut session, &message).await);
                    Ok(())
                }
                None => {
                    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
                    let mut stdout = std::io::stdout();
                    interactive::run(&mut session, stdin, &mut stdout).await
                }
            }
        }

        Commands::Status => {
            println!("🛠️  techdesk status");
            println!();
            println!("Version:     {}", env!("CARGO_PKG_VERSION"));
            println!("Config:      {}", config.config_path.display());
            println!();
            println!("🤖 Provider:      {}", config.provider());
            println!("   Model:         {}", config.model());
            println!("   Temperature:   {}", config.default_temperature);
            println!(
                "   API key:       {}",
                if config.api_key.is_some() { "set" } else { "missing" }
            );
            println!("🔎 Embeddings:    {}", config.embedding.model);
            println!(
                "🧠 Agent:         max {} iterations, top {} tools, {} token memory",
                config.agent.max_iterations,
                config.agent.tool_top_k,
                config.agent.memory_token_limit
            );
            println!(
                "🌐 Gateway:       {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!();
            println!("Documents ({}):", config.documents.dir.display());
            for entry in &CATALOG {
                match rag::locate_document(&config.documents.dir, entry.key) {
                    Some(path) => println!("  ✅ {:<26} {}", entry.key, path.display()),
                    None => println!("  ❌ {:<26} (missing)", entry.key),
                }
            }
            Ok(())
        }

        Commands::Tools => {
            println!("Document tools ({} total):\n", CATALOG.len() * 2);
            for entry in &CATALOG {
                println!("  {}", entry.title);
                println!("    {:<38} {}", entry.summary_tool_name(), entry.summary_description);
                println!("    {:<38} {}", entry.lookup_tool_name(), entry.lookup_description);
            }
            println!(
                "\n  The agent is offered the {} tools closest to each question.",
                config.agent.tool_top_k
            );
            Ok(())
        }

        Commands::Providers => {
            let current = config.provider().trim().to_ascii_lowercase();
            let providers = providers::list_providers();
            println!("Supported providers ({} total):\n", providers.len());
            println!("  ID (use in config)  DESCRIPTION");
            println!("  ─────────────────── ───────────");
            for p in &providers {
                let marker = if p.name.eq_ignore_ascii_case(&current) {
                    " (active)"
                } else {
                    ""
                };
                println!("  {:<19} {}{}  {}", p.name, p.display_name, marker, p.base_url);
            }
            println!("\n  custom:<URL>   Any OpenAI-compatible endpoint");
            Ok(())
        }

        Commands::Config { config_command } => match config_command {
            ConfigCommands::Schema => {
                let schema = schemars::schema_for!(Config);
                let rendered = serde_json::to_string_pretty(&schema)
                    .context("failed to serialize JSON Schema")?;
                println!("{rendered}");
                Ok(())
            }
        },
    }
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
