//! Workflow preamble construction.
//!
//! Before each outbound request the orchestrator asks the injector for a
//! synthetic system-style message summarizing the session's working state:
//! files read, files modified, todos, and a one-line hint derived from the
//! shape of the latest user message. The preamble is rebuilt per request
//! and never stored in history.

use std::fmt::Write as _;

use crate::message::Message;
use crate::tracker::ContextTracker;

/// Build the preamble for one request, or `None` when every section is
/// empty and there is no hint to give.
pub fn build_preamble(tracker: &ContextTracker, last_user_message: Option<&str>) -> Option<Message> {
    let mut sections: Vec<String> = Vec::new();

    let read: Vec<&str> = tracker.read_files().collect();
    if !read.is_empty() {
        let mut section = String::from("Files read this session:\n");
        for path in read {
            let _ = writeln!(section, "- {}", path);
        }
        sections.push(section.trim_end().to_string());
    }

    if !tracker.modifications().is_empty() {
        let mut section = String::from("Files modified this session:\n");
        for (path, ranges) in tracker.modifications() {
            let spans: Vec<String> = ranges
                .iter()
                .map(|(start, end)| {
                    if start == end {
                        format!("line {}", start)
                    } else {
                        format!("lines {}-{}", start, end)
                    }
                })
                .collect();
            let _ = writeln!(section, "- {} ({})", path, spans.join(", "));
        }
        sections.push(section.trim_end().to_string());
    }

    if !tracker.todos().is_empty() {
        let mut section = String::from("Current todos:\n");
        for todo in tracker.todos() {
            let _ = writeln!(section, "- [{}] {}", todo.status, todo.content);
        }
        sections.push(section.trim_end().to_string());
    }

    if let Some(hint) = workflow_hint(last_user_message) {
        sections.push(hint.to_string());
    }

    if sections.is_empty() {
        return None;
    }
    Some(Message::system(sections.join("\n\n")))
}

/// One-line hint matching the shape of the user's latest message.
fn workflow_hint(last_user_message: Option<&str>) -> Option<&'static str> {
    let text = last_user_message?.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    if text.ends_with('?') || text.starts_with("what") || text.starts_with("how") || text.starts_with("why") {
        Some("Workflow hint: the user is asking a question; prefer explaining over editing.")
    } else if text.starts_with("fix") || text.contains("bug") || text.contains("error") {
        Some("Workflow hint: debugging task; read the relevant code before changing it.")
    } else if text.starts_with("add") || text.starts_with("implement") || text.starts_with("write")
    {
        Some("Workflow hint: implementation task; check existing conventions first.")
    } else if text.starts_with("refactor") || text.starts_with("clean") {
        Some("Workflow hint: refactoring task; keep behavior identical and verify with searches.")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{TodoItem, TodoStatus};

    #[test]
    fn empty_tracker_and_no_hint_builds_nothing() {
        let tracker = ContextTracker::new();
        assert!(build_preamble(&tracker, Some("hello there")).is_none());
        assert!(build_preamble(&tracker, None).is_none());
    }

    #[test]
    fn sections_appear_in_order_and_empty_ones_are_elided() {
        let mut tracker = ContextTracker::new();
        tracker.record_read("src/main.rs".into());
        tracker.record_modification("src/lib.rs".into(), (3, 9));
        tracker.set_todos(vec![TodoItem {
            id: 1,
            content: "add tests".into(),
            status: TodoStatus::Pending,
        }]);

        let preamble = build_preamble(&tracker, Some("fix the crash")).unwrap();
        let text = &preamble.content;
        let read_at = text.find("Files read").unwrap();
        let modified_at = text.find("Files modified").unwrap();
        let todos_at = text.find("Current todos").unwrap();
        let hint_at = text.find("Workflow hint").unwrap();
        assert!(read_at < modified_at && modified_at < todos_at && todos_at < hint_at);
        assert!(text.contains("src/lib.rs (lines 3-9)"));
        assert!(text.contains("[pending] add tests"));
    }

    #[test]
    fn question_shape_produces_question_hint() {
        let tracker = ContextTracker::new();
        let preamble = build_preamble(&tracker, Some("what does the parser do?")).unwrap();
        assert!(preamble.content.contains("asking a question"));
    }
}
