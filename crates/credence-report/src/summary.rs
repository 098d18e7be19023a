use credence_core::ConversationResult;

use crate::text::{seconds, Palette};

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const GRAY: &str = "\x1b[90m";

/// One line per conversation, then totals.
pub fn render_suite_summary(results: &[ConversationResult], colored: bool) -> String {
    let palette = Palette::new(colored);
    let mut out = String::new();
    let mut failed = 0;

    for result in results {
        let summary = result.summary();
        if result.failed {
            failed += 1;
            out.push_str(&palette.paint(&[RED], "✗"));
        } else {
            out.push_str(&palette.paint(&[GREEN], "✓"));
        }
        out.push_str(&format!(" {} ", result.title));
        out.push_str(&palette.paint(
            &[GRAY],
            &format!(
                "({} passed, {} failed, {} skipped in {})",
                summary.passed,
                summary.failed,
                summary.skipped,
                seconds(result.total_time_ms())
            ),
        ));
        out.push('\n');
    }

    let passed = results.len() - failed;
    let totals = format!(
        "{} conversation(s): {passed} passed, {failed} failed",
        results.len()
    );
    if failed > 0 {
        out.push_str(&palette.paint(&[RED], &totals));
    } else {
        out.push_str(&palette.paint(&[GREEN], &totals));
    }
    out.push('\n');
    out
}
