use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use credence_core::{load_engine_config, ConversationResult, Validate, ValidationIssue};
use credence_report::{
    render_json, render_json_suite, render_markdown, render_suite_summary, render_text,
};
use credence_suite::load_suite;
use serde_json::Value;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Scripted conversation testing for chatbots.
#[derive(Parser, Debug)]
#[command(name = "credence", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a suite file and report validation issues.
    Validate {
        suite: PathBuf,
        /// Engine config to validate alongside the suite.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Render a saved conversation result, or an array of them.
    Report {
        result: PathBuf,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        #[arg(long)]
        no_color: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Markdown,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credence=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Validate { suite, config } => {
            validate(&suite, config.as_deref()).map(|report| {
                print!("{}", report.output);
                report.ok
            })
        }
        Command::Report {
            result,
            format,
            no_color,
        } => {
            let colored = !no_color && std::io::stdout().is_terminal();
            report(&result, format, colored).map(|output| {
                print!("{output}");
                true
            })
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("credence: {err:#}");
            ExitCode::FAILURE
        }
    }
}

// ──────────────────────────────────────────────
// validate
// ──────────────────────────────────────────────

#[derive(Debug)]
struct ValidationReport {
    output: String,
    ok: bool,
}

fn validate(suite_path: &Path, config_path: Option<&Path>) -> anyhow::Result<ValidationReport> {
    let mut issues = Vec::new();

    if let Some(path) = config_path {
        let config = load_engine_config(path)?;
        debug!(path = %path.display(), "loaded engine config");
        issues.extend(config.validate());
    }

    let suite = load_suite(suite_path)?;
    info!(
        path = %suite_path.display(),
        conversations = suite.len(),
        "decoded suite"
    );
    issues.extend(suite.as_slice().validate());

    Ok(render_issues(&issues, suite.len()))
}

fn render_issues(issues: &[ValidationIssue], conversations: usize) -> ValidationReport {
    let mut output = String::new();
    let mut errors = 0;
    for issue in issues {
        let level = if issue.is_error() {
            errors += 1;
            "error"
        } else {
            warn!(code = issue.code, "{}", issue.message);
            "warning"
        };
        output.push_str(&format!("{level}: {}: {}\n", issue.code, issue.message));
    }
    output.push_str(&format!(
        "{conversations} conversation(s), {errors} error(s), {} warning(s)\n",
        issues.len() - errors
    ));
    ValidationReport {
        output,
        ok: errors == 0,
    }
}

// ──────────────────────────────────────────────
// report
// ──────────────────────────────────────────────

fn report(path: &Path, format: Format, colored: bool) -> anyhow::Result<String> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read result file at {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse result json at {}", path.display()))?;

    match value {
        Value::Array(_) => {
            let results: Vec<ConversationResult> = serde_json::from_value(value)
                .with_context(|| format!("invalid result array in {}", path.display()))?;
            render_many(&results, format, colored)
        }
        Value::Object(_) => {
            let result: ConversationResult = serde_json::from_value(value)
                .with_context(|| format!("invalid result in {}", path.display()))?;
            render_one(&result, format, colored)
        }
        other => bail!(
            "expected a result object or array in {}, got {}",
            path.display(),
            json_kind(&other)
        ),
    }
}

fn render_one(result: &ConversationResult, format: Format, colored: bool) -> anyhow::Result<String> {
    Ok(match format {
        Format::Text => render_text(result, colored),
        Format::Markdown => render_markdown(result, None),
        Format::Json => render_json(result)? + "\n",
    })
}

fn render_many(
    results: &[ConversationResult],
    format: Format,
    colored: bool,
) -> anyhow::Result<String> {
    let mut out = String::new();
    match format {
        Format::Text => {
            for result in results {
                out.push_str(&render_text(result, colored));
            }
            out.push('\n');
            out.push_str(&render_suite_summary(results, colored));
        }
        Format::Markdown => {
            for (position, result) in results.iter().enumerate() {
                out.push_str(&render_markdown(result, Some(position + 1)));
            }
        }
        Format::Json => {
            out.push_str(&render_json_suite(results)?);
            out.push('\n');
        }
    }
    Ok(out)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
