//! Command-line interface definition and dispatch.
//!
//! Uses [`clap`] for argument parsing with derive macros. Each subcommand
//! is routed to its handler here.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::agents::AgentRegistry;
use crate::config::Config;
use crate::orchestrator::Orchestrator;
use crate::output::{format_message, TerminalSink};
use crate::provider;
use crate::tokens;

/// Top-level CLI structure.
#[derive(Parser)]
#[command(name = "tether", about = "A local-first LLM harness for the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands. The `///` doc comments on variants double as
/// `--help` text rendered by clap.
#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Provider to use (ollama, lmstudio)
        #[arg(long)]
        provider: Option<String>,
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Ask a one-shot question
    Ask {
        /// The question to ask
        prompt: Vec<String>,
        /// Provider to use (ollama, lmstudio)
        #[arg(short, long)]
        provider: Option<String>,
        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// List models served by the configured providers
    Models {
        /// Only query one provider
        #[arg(long)]
        provider: Option<String>,
    },
    /// Show the resolved configuration
    Config,
    /// List registered agents
    Agents,
}

/// Parses command-line arguments into a [`Cli`] struct.
pub fn parse() -> Cli {
    Cli::parse()
}

/// Dispatches the parsed CLI command to its handler.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Chat {
            provider: provider_name,
            model,
        } => {
            let config = Config::load()?;
            let selection =
                provider::resolve_model(provider_name.as_deref(), model.as_deref(), &config)?;
            crate::chat::run_chat(config, &selection).await
        }
        Commands::Ask {
            prompt,
            provider: provider_name,
            model,
        } => {
            let prompt = prompt.join(" ");
            if prompt.is_empty() {
                anyhow::bail!("No prompt provided. Usage: tether ask \"your question here\"");
            }

            let config = Config::load()?;
            let selection =
                provider::resolve_model(provider_name.as_deref(), model.as_deref(), &config)?;

            println!(
                "{} [model: {}]",
                "tether".bold().cyan(),
                selection.model.yellow(),
            );
            println!();
            println!("{} {}", ">".green().bold(), prompt);
            println!();

            let provider = provider::Provider::from_config(&config, &selection);
            let agents = match Config::agents_dir() {
                Ok(dir) => AgentRegistry::load(&dir),
                Err(_) => AgentRegistry::with_builtins(),
            };
            let workspace_root = std::env::current_dir()?;
            let mut orch = Orchestrator::new(
                config,
                provider,
                selection.model.clone(),
                workspace_root,
                agents,
            );
            let mut sink = TerminalSink::new();

            let rendered_from = orch.history().len();
            orch.run_turn(&prompt, &mut sink).await?;
            for msg in orch.history().iter().skip(rendered_from + 1) {
                if msg.role == crate::message::Role::Tool {
                    continue;
                }
                println!("{}", format_message(msg));
            }

            let (used, limit) = orch.token_usage();
            println!();
            println!(
                "{}",
                format!("Tokens: {}", tokens::format_token_usage(used, limit)).dimmed()
            );
            Ok(())
        }
        Commands::Models {
            provider: provider_name,
        } => {
            let config = Config::load()?;
            let kinds: Vec<provider::ProviderKind> = match provider_name {
                Some(name) => vec![provider::ProviderKind::parse(&name)?],
                None => provider::all_providers().map(|(kind, _)| kind).collect(),
            };
            for kind in kinds {
                let caps = provider::capabilities_for(kind);
                println!("{}", caps.display_name.bold().cyan());
                match provider::list_models(kind, &config).await {
                    Ok(models) if models.is_empty() => {
                        println!("  {}", "no models installed".dimmed())
                    }
                    Ok(models) => {
                        for model in models {
                            println!("  {}", model);
                        }
                    }
                    Err(e) => println!("  {}", format!("unreachable: {e}").dimmed()),
                }
                for warning in caps.config_warnings {
                    println!("  {}", format!("note: {warning}").yellow());
                }
            }
            Ok(())
        }
        Commands::Config => {
            let config = Config::load()?;
            let path = Config::config_path()?;
            println!("{} {}", "Config path:".bold(), path.display());
            println!();
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
        Commands::Agents => {
            let agents = match Config::agents_dir() {
                Ok(dir) => AgentRegistry::load(&dir),
                Err(_) => AgentRegistry::with_builtins(),
            };
            for agent in agents.all() {
                println!(
                    "{}: {} (tools: {})",
                    agent.name.cyan(),
                    agent.description,
                    if agent.capabilities.allowed_tools.is_empty() {
                        "none".to_string()
                    } else {
                        agent.capabilities.allowed_tools.join(", ")
                    },
                );
            }
            Ok(())
        }
    }
}
