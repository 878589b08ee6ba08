//! Rewrite history so it carries no structured tool traffic.
//!
//! Tool results are folded into the following user message (or a synthetic
//! one) as `<toolcall>` blocks, and assistant tool requests are flattened to
//! text. Providers that see tool structure without tools declared for the
//! current turn tend to reject the request or get confused.

use crate::types::{summarize, ChatMessage, ToolResultMessage};

/// Fold tool results into user messages and flatten assistant tool requests.
pub fn emulate_tool_results(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut out = Vec::with_capacity(messages.len());
    let mut pending: Vec<&ToolResultMessage> = Vec::new();

    for msg in messages {
        if let ChatMessage::ToolResult(result) = msg {
            pending.push(result);
            continue;
        }

        if !pending.is_empty() {
            let rendered = format_tool_results(&pending);
            pending.clear();
            if let ChatMessage::User { name, text } = msg {
                out.push(ChatMessage::User {
                    name: name.clone(),
                    text: format!("{rendered}\n{text}"),
                });
                continue;
            }
            out.push(ChatMessage::user(rendered));
        }

        match msg {
            ChatMessage::Assistant(ai) => out.push(ChatMessage::assistant(ai.repr())),
            other => out.push(other.clone()),
        }
    }

    // Results with no reply after them; keep them rather than drop them.
    if !pending.is_empty() {
        out.push(ChatMessage::user(format_tool_results(&pending)));
    }

    debug_assert!(
        is_emulation_safe(&out),
        "transcoding left tool structure behind: {}",
        summarize(&out)
    );
    out
}

/// No raw tool results and no assistant messages with structured tool requests.
pub fn is_emulation_safe(messages: &[ChatMessage]) -> bool {
    !messages
        .iter()
        .any(|m| m.is_tool_result() || m.has_tool_requests())
}

fn format_tool_results(results: &[&ToolResultMessage]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "<toolcall id=\"{}\" name=\"{}\">\n{}\n</toolcall>\n",
                r.id, r.tool_name, r.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolExecutionRequest;
    use crate::types::AssistantMessage;
    use pretty_assertions::assert_eq;

    fn calls(ids: &[&str]) -> ChatMessage {
        ChatMessage::Assistant(AssistantMessage {
            text: None,
            reasoning: None,
            tool_requests: ids
                .iter()
                .map(|id| ToolExecutionRequest::new(*id, "read", format!("{{\"file\":\"{id}.rs\"}}")))
                .collect(),
        })
    }

    #[test]
    fn three_results_fold_into_the_next_user_message() {
        let messages = vec![
            ChatMessage::user("read a, b and c"),
            calls(&["1", "2", "3"]),
            ChatMessage::tool_result("1", "read", "A"),
            ChatMessage::tool_result("2", "read", "B"),
            ChatMessage::tool_result("3", "read", "C"),
            ChatMessage::user("now summarize"),
        ];

        let out = emulate_tool_results(&messages);

        assert_eq!(out.len(), 3);
        assert_eq!(
            out[2].text(),
            "<toolcall id=\"1\" name=\"read\">\nA\n</toolcall>\n\n\
             <toolcall id=\"2\" name=\"read\">\nB\n</toolcall>\n\n\
             <toolcall id=\"3\" name=\"read\">\nC\n</toolcall>\n\n\
             now summarize"
        );
        assert!(is_emulation_safe(&out));
    }

    #[test]
    fn results_before_a_non_user_message_get_their_own_user_message() {
        let messages = vec![
            calls(&["1"]),
            ChatMessage::tool_result("1", "read", "A"),
            ChatMessage::assistant("done"),
        ];

        let out = emulate_tool_results(&messages);

        assert_eq!(out.len(), 3);
        assert!(matches!(out[1], ChatMessage::User { .. }));
        assert!(out[1].text().contains("<toolcall id=\"1\""));
        assert_eq!(out[2], ChatMessage::assistant("done"));
    }

    #[test]
    fn trailing_results_are_flushed() {
        let messages = vec![calls(&["9"]), ChatMessage::tool_result("9", "read", "tail")];

        let out = emulate_tool_results(&messages);

        assert_eq!(out.len(), 2);
        assert!(out[1].text().contains("tail"));
        assert!(is_emulation_safe(&out));
    }

    #[test]
    fn assistant_tool_requests_become_text() {
        let out = emulate_tool_results(&[calls(&["5"])]);
        assert_eq!(out[0], ChatMessage::assistant("Tool call: read({\"file\":\"5.rs\"})"));
    }

    #[test]
    fn user_name_survives_folding() {
        let messages = vec![
            ChatMessage::tool_result("1", "read", "A"),
            ChatMessage::User {
                name: Some("ops".into()),
                text: "go".into(),
            },
        ];
        let out = emulate_tool_results(&messages);
        assert!(matches!(&out[0], ChatMessage::User { name: Some(n), .. } if n == "ops"));
    }

    #[test]
    fn transcoding_is_idempotent() {
        let messages = vec![
            ChatMessage::system("rules"),
            calls(&["1"]),
            ChatMessage::tool_result("1", "read", "A"),
            ChatMessage::user("next"),
        ];
        let once = emulate_tool_results(&messages);
        let twice = emulate_tool_results(&once);
        assert_eq!(once, twice);
    }
}
