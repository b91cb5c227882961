//! Interactive chat REPL.
//!
//! A multi-turn conversation loop using [`rustyline`] for readline support
//! (history, line editing). Each submitted line drives one orchestrator
//! turn; the new transcript slice is rendered when the turn settles.

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::agents::AgentRegistry;
use crate::config::Config;
use crate::message::Role;
use crate::orchestrator::Orchestrator;
use crate::output::{format_message, TerminalSink};
use crate::provider::{ModelSelection, Provider};
use crate::tokens;

/// Runs the interactive chat REPL.
///
/// # Readline behavior
///
/// - **Ctrl+C**: cancels current input, stays in REPL
/// - **Ctrl+D**: exits cleanly with "goodbye."
/// - Readline history is persisted to `~/.cache/tether/chat_history.txt`
pub async fn run_chat(config: Config, selection: &ModelSelection) -> Result<()> {
    let provider = Provider::from_config(&config, selection);
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

    println!(
        "{} [provider: {}] [model: {}] (Ctrl+D to exit, /help for commands)",
        "tether".bold().cyan(),
        selection.provider.to_string().yellow(),
        selection.model.yellow(),
    );
    println!();

    let mut rl = DefaultEditor::new()?;
    let history_path = Config::cache_dir()?.join(crate::constants::HISTORY_FILENAME);
    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    loop {
        let readline = rl.readline(&format!("{} ", ">".green().bold()));

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }

                if line.starts_with('/') {
                    if handle_slash_command(&line, &mut orch, &mut sink).await? {
                        continue;
                    }
                    break;
                }

                let _ = rl.add_history_entry(&line);

                let rendered_from = orch.history().len();
                println!();
                if let Err(e) = orch.run_turn(&line, &mut sink).await {
                    eprintln!("{} {}", "error:".red().bold(), e);
                    continue;
                }
                render_transcript(&orch, rendered_from + 1);

                let (used, limit) = orch.token_usage();
                println!(
                    "{}",
                    format!("Tokens: {}", tokens::format_token_usage(used, limit)).dimmed()
                );
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "goodbye.".dimmed());
                break;
            }
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                break;
            }
        }
    }

    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}

/// Print the transcript from `from` onward, skipping the raw tool payloads
/// (their display-only summaries already cover them).
fn render_transcript(orch: &Orchestrator, from: usize) {
    for msg in orch.history().iter().skip(from) {
        if msg.role == Role::Tool {
            continue;
        }
        println!("{}", format_message(msg));
    }
    println!();
}

/// Handle a slash command. Returns `false` to exit the REPL.
async fn handle_slash_command(
    line: &str,
    orch: &mut Orchestrator,
    sink: &mut TerminalSink,
) -> Result<bool> {
    let (command, rest) = match line.split_once(' ') {
        Some((c, r)) => (c, r.trim()),
        None => (line, ""),
    };

    match command {
        "/help" => {
            println!("  /tokens          show context usage");
            println!("  /todos           show the session todo list");
            println!("  /audit           show recent permission decisions");
            println!("  /agents          list registered agents");
            println!("  /compress        compress older history now");
            println!("  /recall <query>  search compressed-away context");
            println!("  /quit            exit");
        }
        "/quit" | "/exit" => return Ok(false),
        "/tokens" => {
            let (used, limit) = orch.token_usage();
            println!("Tokens: {}", tokens::format_token_usage(used, limit));
        }
        "/todos" => {
            let todos = orch.tracker().todos();
            if todos.is_empty() {
                println!("{}", "no todos".dimmed());
            }
            for todo in todos {
                println!("- [{}] {}", todo.status, todo.content);
            }
        }
        "/audit" => {
            for entry in orch.audit_entries().iter().rev().take(20) {
                println!(
                    "{} {} {} ({})",
                    entry.at.format("%H:%M:%S"),
                    entry.outcome.to_string().yellow(),
                    entry.tool,
                    entry.reason.dimmed(),
                );
            }
        }
        "/agents" => {
            for agent in orch.agents().all() {
                println!("{}: {}", agent.name.cyan(), agent.description);
            }
        }
        "/compress" => {
            orch.compress_now(sink).await;
        }
        "/recall" => {
            if rest.is_empty() {
                println!("usage: /recall <query>");
            } else {
                match orch.recall(rest, 5).await {
                    Ok(hits) if hits.is_empty() => {
                        println!("{}", "nothing recalled".dimmed())
                    }
                    Ok(hits) => {
                        for (text, score) in hits {
                            println!("{} {}", format!("{score:.2}").dimmed(), text);
                        }
                    }
                    Err(e) => eprintln!("{} {}", "error:".red().bold(), e),
                }
            }
        }
        other => {
            println!("{} Unknown command: {}", "?".yellow(), other);
        }
    }
    Ok(true)
}
