//! Token estimation for tether.
//!
//! Uses tiktoken-rs BPE tokenization. Local models ship their own
//! tokenizers, so cl100k_base serves as a deterministic approximation that
//! is close enough for context budgeting. The estimate is monotone in
//! content length and identical for identical input.

use tiktoken_rs::CoreBPE;

use crate::message::Message;

/// Per-message overhead for role markers and framing.
const MESSAGE_OVERHEAD: usize = 4;

/// Conversation-level framing overhead.
pub const CONVERSATION_OVERHEAD: usize = 2;

fn bpe() -> &'static CoreBPE {
    use std::sync::OnceLock;
    static BPE: OnceLock<CoreBPE> = OnceLock::new();
    BPE.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k_base tokenizer is embedded"))
}

/// Count tokens for a text string.
pub fn count_tokens(text: &str) -> usize {
    bpe().encode_ordinary(text).len()
}

/// Estimate the tokens one message contributes to a request.
///
/// Thinking text is counted too: providers that support it send it back as
/// part of the context on subsequent turns.
pub fn estimate_message(msg: &Message) -> usize {
    let mut total = MESSAGE_OVERHEAD + count_tokens(&msg.content);
    if let Some(ref thinking) = msg.thinking {
        total += count_tokens(thinking);
    }
    for call in &msg.tool_calls {
        total += count_tokens(&call.name) + count_tokens(&call.arguments);
    }
    total
}

/// Estimate tokens across a whole history, skipping display-only messages.
pub fn estimate_history(messages: &[Message]) -> usize {
    let body: usize = messages
        .iter()
        .filter(|m| !m.display_only)
        .map(estimate_message)
        .sum();
    body + CONVERSATION_OVERHEAD
}

/// Truncate `text` to approximately `budget` tokens.
///
/// Used for deterministic surrogate fallbacks. Cuts on a character boundary
/// and re-encodes to stay at or under the budget.
pub fn truncate_to_tokens(text: &str, budget: usize) -> String {
    let encoded = bpe().encode_ordinary(text);
    if encoded.len() <= budget {
        return text.to_string();
    }
    // 4 chars per token is a safe over-estimate for the first cut; tighten
    // by re-encoding until under budget.
    let mut cut = (budget * 4).min(text.len());
    loop {
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        let candidate = &text[..cut];
        if count_tokens(candidate) <= budget || cut == 0 {
            return candidate.to_string();
        }
        cut = cut.saturating_sub((cut / 8).max(1));
    }
}

/// Format a token count for display. Example: "1,234 / 128,000"
pub fn format_token_usage(used: usize, limit: usize) -> String {
    format!("{} / {}", format_number(used), format_number(limit))
}

pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_identical_input() {
        let msg = Message::user("estimate me twice");
        assert_eq!(estimate_message(&msg), estimate_message(&msg));
    }

    #[test]
    fn monotone_in_content_length() {
        let short = Message::user("hello");
        let long = Message::user("hello hello hello hello hello");
        assert!(estimate_message(&long) > estimate_message(&short));
    }

    #[test]
    fn display_only_excluded_from_history_estimate() {
        let visible = vec![Message::user("hi")];
        let mut with_display = visible.clone();
        with_display.push(Message::display_only("rendered locally"));
        assert_eq!(estimate_history(&visible), estimate_history(&with_display));
    }

    #[test]
    fn truncation_respects_budget() {
        let text = "word ".repeat(400);
        let cut = truncate_to_tokens(&text, 50);
        assert!(count_tokens(&cut) <= 50);
        assert!(!cut.is_empty());
    }

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(42), "42");
    }
}
