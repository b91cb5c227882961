//! Terminal rendering of session events.
//!
//! The core emits abstract [`UiEvent`]s; [`TerminalSink`] is the thin
//! front end that turns them into colored terminal output and answers
//! permission prompts from stdin. Transcript rendering happens after each
//! turn from the history itself (see [`format_message`]), so the sink only
//! handles the out-of-band events.

use std::io::{self, Write};

use colored::Colorize;

use crate::executor::PermissionMode;
use crate::message::{Message, Role};
use crate::orchestrator::{UiEvent, UiSink};

/// Renders events to the terminal and prompts on stderr/stdin.
pub struct TerminalSink;

impl TerminalSink {
    pub fn new() -> Self {
        Self
    }
}

impl UiSink for TerminalSink {
    fn event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Progress { kind, text } => {
                eprintln!("{}", format!("[{}] {}", kind, text).dimmed());
            }
            UiEvent::Error(text) => {
                eprintln!("{} {}", "error:".red().bold(), text);
            }
            UiEvent::PermissionPrompt { .. }
            | UiEvent::MessageAppended(_)
            | UiEvent::MessageUpdated(_)
            | UiEvent::RedrawRequested => {}
        }
    }

    fn request_permission(&mut self, tool_name: &str, args: &str, _reason: &str) -> PermissionMode {
        let display = if args.len() > 200 {
            let mut end = 200;
            while end > 0 && !args.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &args[..end])
        } else {
            args.to_string()
        };

        eprint!(
            "\nTool '{}' wants to execute:\n{}\n\nAllow? [y]es / [n]o / [s]ession / [a]lways: ",
            tool_name.yellow(),
            display.dimmed(),
        );
        let _ = io::stderr().flush();

        let mut response = String::new();
        if io::stdin().read_line(&mut response).is_err() {
            return PermissionMode::Deny;
        }

        match response.trim().to_lowercase().as_str() {
            "y" | "yes" => PermissionMode::AllowOnce,
            "s" | "session" => PermissionMode::AskEachTime,
            "a" | "always" => PermissionMode::AlwaysAllow,
            _ => PermissionMode::Deny,
        }
    }
}

/// Format one transcript message with a colored role label.
pub fn format_message(msg: &Message) -> String {
    if msg.display_only {
        return format!("{}", msg.content.dimmed());
    }
    match msg.role {
        Role::User => format!("{} {}", ">".green().bold(), msg.content),
        Role::Assistant => {
            if msg.compressed {
                format!("{}", msg.content.dimmed())
            } else {
                msg.content.clone()
            }
        }
        Role::Tool => {
            let preview = if msg.content.len() > 200 {
                let mut end = 200;
                while end > 0 && !msg.content.is_char_boundary(end) {
                    end -= 1;
                }
                format!("{}...", &msg.content[..end])
            } else {
                msg.content.clone()
            };
            format!("{} {}", "tool".yellow(), preview.dimmed())
        }
        Role::System => format!("{}", msg.content.dimmed()),
    }
}
