//! Collapsible markdown rendering, suited to CI job summaries.

use credence_core::{
    CheckResult, ConversationResult, InteractionKind, InteractionOutcome, InteractionResult,
    Message, Status,
};

use crate::text::seconds;

pub fn render_markdown(result: &ConversationResult, index: Option<usize>) -> String {
    let mut out = String::new();
    let prefix = if result.failed { "❌" } else { "✅" };
    let index = index.map(|i| format!("{i}. ")).unwrap_or_default();

    open_details(
        &mut out,
        &format!(
            "<h3><code>{prefix}</code> {index}{}</h3>",
            escape_html(&result.title)
        ),
    );
    out.push_str("### Conversation\n\n");
    render_results(&mut out, &result.interaction_results);
    out.push_str("\n---\n\n");

    let errors = result.error_messages();
    if !errors.is_empty() {
        open_details(&mut out, "Errors");
        for (position, error) in errors.iter().enumerate() {
            out.push_str(&format!(
                "{}. {}\n",
                position + 1,
                escape_html(error).replace('\n', "<br>\n   ")
            ));
        }
        out.push('\n');
        close_details(&mut out);
    }

    open_details(
        &mut out,
        &format!("Time taken - {}", seconds(result.total_time_ms())),
    );
    out.push_str("| Name | Time |\n| ---: | ---: |\n");
    out.push_str(&format!("| Total Time | {} |\n", seconds(result.total_time_ms())));
    out.push_str(&format!("| Chatbot Time | {} |\n", seconds(result.chatbot_time_ms)));
    out.push_str(&format!("| Testing Time | {} |\n", seconds(result.testing_time_ms)));
    out.push('\n');
    close_details(&mut out);

    close_details(&mut out);
    out
}

fn render_results(out: &mut String, results: &[InteractionResult]) {
    for result in results {
        match (&result.interaction.kind, &result.outcome) {
            (
                InteractionKind::NestedConversation { name, .. },
                InteractionOutcome::NestedConversation { result: nested },
            ) => {
                open_details(out, &format!("🧵 {}", escape_html(name)));
                render_results(out, &nested.interaction_results);
                close_details(out);
            }
            (InteractionKind::UserMessage { text, .. }, InteractionOutcome::UserMessage { sent, .. }) => {
                let body = match (sent, result.status) {
                    (Some(sent), _) => escape_html(sent),
                    (None, Status::Skipped) => format!("<i>skipped:</i> {}", escape_html(text)),
                    (None, _) => format!("<i>not sent:</i> {}", escape_html(text)),
                };
                open_details(out, &format!("<code>user:</code> {body}"));
                close_details(out);
            }
            (_, InteractionOutcome::ChatbotIgnoresMessage { .. }) => {
                open_details(out, "<code>asst:</code> ");
                close_details(out);
            }
            (
                _,
                InteractionOutcome::ChatbotResponds {
                    response,
                    check_results,
                    ..
                },
            ) => render_chatbot_turn(out, result.status, response.as_ref(), check_results),
            (InteractionKind::FunctionCall { name, .. }, _) => {
                open_details(
                    out,
                    &format!("<code>call:</code> {} {}", escape_html(name), mark(result.status)),
                );
                close_details(out);
            }
            _ => {}
        }
    }
}

fn render_chatbot_turn(
    out: &mut String,
    status: Status,
    response: Option<&Message>,
    check_results: &[CheckResult],
) {
    let name = if status.is_failed() { "asst ❌:" } else { "asst:" };
    let body = response
        .map(|message| escape_html(&message.body))
        .unwrap_or_else(|| "<i>no message</i>".to_string());
    open_details(out, &format!("<code>{name}</code>  {body}"));
    out.push_str("---\n\n");

    if !check_results.is_empty() {
        let marks: Vec<&str> = check_results.iter().map(|r| mark(r.status)).collect();
        open_details(out, &format!("Checks <code>{}</code>", marks.join(" ")));
        for result in check_results {
            out.push_str(&format!(
                "  * `{}` {}\n",
                mark(result.status),
                escape_html(&result.check.describe())
            ));
        }
        out.push('\n');
        close_details(out);
    }

    if let Some(message) = response {
        open_details(out, "Metadata");
        out.push_str("| Key | Value |\n| :--- | :--- |\n");
        for (key, value) in message.metadata() {
            out.push_str(&format!("| {} | {} |\n", escape_cell(key), escape_cell(value)));
        }
        out.push('\n');
        close_details(out);
    }

    close_details(out);
}

fn mark(status: Status) -> &'static str {
    match status {
        Status::Passed => "✅",
        Status::Failed => "❌",
        Status::Skipped => "⏭",
    }
}

fn open_details(out: &mut String, summary: &str) {
    out.push_str("<details>\n<summary>");
    out.push_str(summary);
    out.push_str("</summary>\n\n");
}

fn close_details(out: &mut String) {
    out.push_str("</details>\n\n");
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn escape_cell(text: &str) -> String {
    escape_html(text).replace('|', "\\|").replace('\n', "<br>")
}
