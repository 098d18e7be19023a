//! Terminal rendering of a conversation result.

use credence_core::{ConversationResult, Role};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const BLUE: &str = "\x1b[34m";

/// Wraps text in ANSI codes only when color is enabled.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Palette {
    colored: bool,
}

impl Palette {
    pub(crate) fn new(colored: bool) -> Self {
        Self { colored }
    }

    pub(crate) fn paint(&self, codes: &[&str], text: &str) -> String {
        if !self.colored || codes.is_empty() {
            return text.to_string();
        }
        format!("{}{text}{RESET}", codes.concat())
    }
}

pub(crate) fn seconds(ms: u64) -> String {
    format!("{:.3}s", ms as f64 / 1000.0)
}

pub fn render_text(result: &ConversationResult, colored: bool) -> String {
    let palette = Palette::new(colored);
    let rule = "------------------------------------";
    let mut out = String::new();

    out.push('\n');
    out.push_str(&palette.paint(&[BOLD], "------------ Result ------------"));
    out.push('\n');
    out.push_str(&result.title);
    out.push('\n');
    out.push_str(rule);
    out.push('\n');
    out.push_str(&format!("  Total Time:  {}\n", seconds(result.total_time_ms())));
    out.push_str(&format!("   Test Time:  {}\n", seconds(result.testing_time_ms)));
    out.push_str(&format!("Chatbot Time:  {}\n", seconds(result.chatbot_time_ms)));
    out.push_str(&palette.paint(&[BOLD], rule));
    out.push_str("\n\n");

    for message in &result.messages {
        let (name, color) = match message.role {
            Role::User => ("user: ", BLUE),
            Role::Chatbot => ("asst: ", GREEN),
        };
        out.push_str(&palette.paint(&[color, BOLD], name));
        out.push_str(&message.body);
        out.push('\n');
    }

    if result.failed {
        let errors = result.error_messages();
        if !errors.is_empty() {
            out.push_str(&palette.paint(&[RED, BOLD], "-------------- Errors --------------"));
            out.push('\n');
            for (index, error) in errors.iter().enumerate() {
                out.push_str(&palette.paint(&[RED], &format!("{}. {error}", index + 1)));
                out.push_str("\n\n");
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{failing_result, passing_result};

    #[test]
    fn plain_rendering_has_no_escape_codes() {
        let rendered = render_text(&passing_result(), false);
        assert!(!rendered.contains('\x1b'));
        assert!(rendered.contains("greeting\n"));
        assert!(rendered.contains("  Total Time:  0.042s\n"));
        assert!(rendered.contains("user: Hello\nasst: Hello there. My name is credence\n"));
        assert!(!rendered.contains("Errors"));
    }

    #[test]
    fn failed_results_list_numbered_errors() {
        let rendered = render_text(&failing_result(), true);
        assert!(rendered.contains("\x1b[34m\x1b[1muser: \x1b[0m"));
        assert!(rendered.contains("-------------- Errors --------------"));
        assert!(rendered.contains("1. Chatbot response did not meet requirement:\nshould contain `Goodbye`"));
    }
}
