//! Assertions attached to a chatbot turn.
//!
//! Message and metadata checks are pure functions of the chatbot reply and
//! the metadata snapshot recorded with it. AI checks delegate the judgment to
//! a [`RequirementEvaluator`] and may ask it again when the verdict is
//! "not met".

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{CheckError, EvaluationError};
use crate::message::{Message, MetadataSnapshot};
use crate::types::Status;

// ─────────────────────────────────────────────────────────────────────────────
// Pattern
// ─────────────────────────────────────────────────────────────────────────────

/// A regex compiled when the check is built. Serializes as its source text.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(source: &str) -> Result<Self, CheckError> {
        Regex::new(source)
            .map(Self)
            .map_err(|source_err| CheckError::InvalidRegex {
                pattern: source.to_string(),
                source: source_err,
            })
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Unanchored search.
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Check variants
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum ResponseOperation {
    Equals(String),
    NotEquals(String),
    Contains(String),
    NotContains(String),
    RegexMatch(Pattern),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum MetadataOperation {
    Equals(String),
    NotEquals(String),
    Contains(Value),
    NotContains(Value),
    RegexMatch(Pattern),
    OneOf(Vec<Value>),
}

/// Assertion over the text of the chatbot reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCheck {
    pub operation: ResponseOperation,
}

/// Assertion over one key of the metadata recorded with the chatbot reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataCheck {
    pub key: String,
    pub operation: MetadataOperation,
}

/// Natural-language requirement judged by an external evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiCheck {
    pub requirement: String,
    /// Additional evaluator calls allowed after a "not met" verdict.
    #[serde(default)]
    pub retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    Response(ResponseCheck),
    Metadata(MetadataCheck),
    Ai(AiCheck),
}

/// Why a check failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckFailure {
    /// The compared value did not satisfy the operation.
    Mismatch { actual: String },
    /// A contains/not-contains comparison value was not text.
    NotText { expected: String },
    /// The metadata snapshot had no entry for the key.
    MissingKey {
        key: String,
        available: Vec<String>,
    },
    UnmetRequirement { reason: String },
    GenerationError { trace: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: Check,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CheckFailure>,
}

impl CheckResult {
    fn passed(check: &Check) -> Self {
        Self {
            check: check.clone(),
            status: Status::Passed,
            failure: None,
        }
    }

    fn failed(check: &Check, failure: CheckFailure) -> Self {
        Self {
            check: check.clone(),
            status: Status::Failed,
            failure: Some(failure),
        }
    }

    fn skipped(check: &Check) -> Self {
        Self {
            check: check.clone(),
            status: Status::Skipped,
            failure: None,
        }
    }

    pub fn is_missing_key(&self) -> bool {
        matches!(self.failure, Some(CheckFailure::MissingKey { .. }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Evaluation
// ─────────────────────────────────────────────────────────────────────────────

/// Verdict returned by the natural-language evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementVerdict {
    pub requirement_met: bool,
    pub reason: String,
}

/// External capability that decides whether a transcript meets a requirement.
pub trait RequirementEvaluator {
    fn check_requirement(
        &self,
        transcript: &[Message],
        requirement: &str,
    ) -> Result<RequirementVerdict, EvaluationError>;
}

/// Everything a check may look at when it is evaluated.
#[derive(Clone, Copy)]
pub struct CheckContext<'a> {
    /// The chatbot turn being checked.
    pub response: &'a Message,
    /// Full history up to and including `response`.
    pub transcript: &'a [Message],
    pub evaluator: Option<&'a dyn RequirementEvaluator>,
}

impl Check {
    /// Evaluate against a chatbot turn. `skipped` short-circuits before the
    /// value is inspected.
    pub fn evaluate(&self, context: &CheckContext<'_>, skipped: bool) -> CheckResult {
        if skipped {
            return self.skip();
        }

        let outcome = match self {
            Check::Response(check) => check.evaluate(&context.response.body),
            Check::Metadata(check) => check.evaluate(context.response.metadata()),
            Check::Ai(check) => check.evaluate(context.transcript, context.evaluator),
        };

        match outcome {
            None => CheckResult::passed(self),
            Some(failure) => CheckResult::failed(self, failure),
        }
    }

    pub fn skip(&self) -> CheckResult {
        CheckResult::skipped(self)
    }

    pub fn is_ai(&self) -> bool {
        matches!(self, Check::Ai(_))
    }

    /// A sentence describing what the check expects.
    pub fn describe(&self) -> String {
        match self {
            Check::Response(check) => {
                let (verb, value) = check.operation.parts();
                format!("{verb} `{value}`")
            }
            Check::Metadata(check) => {
                let (verb, value) = check.operation.parts();
                format!("metadata[\"{}\"] {verb} `{value}`", check.key)
            }
            Check::Ai(check) => format!("should {}", check.requirement),
        }
    }

    /// The builder call that produces this check.
    pub fn to_script(&self) -> String {
        match self {
            Check::Response(check) => match &check.operation {
                ResponseOperation::Equals(v) => format!("Response.equals({v:?})"),
                ResponseOperation::NotEquals(v) => format!("Response.not_equals({v:?})"),
                ResponseOperation::Contains(v) => format!("Response.contains({v:?})"),
                ResponseOperation::NotContains(v) => format!("Response.not_contains({v:?})"),
                ResponseOperation::RegexMatch(p) => format!("Response.re_match({:?})", p.as_str()),
            },
            Check::Metadata(check) => {
                let key = &check.key;
                match &check.operation {
                    MetadataOperation::Equals(v) => format!("Metadata({key:?}).equals({v:?})"),
                    MetadataOperation::NotEquals(v) => {
                        format!("Metadata({key:?}).not_equals({v:?})")
                    }
                    MetadataOperation::Contains(v) => format!("Metadata({key:?}).contains({v})"),
                    MetadataOperation::NotContains(v) => {
                        format!("Metadata({key:?}).not_contains({v})")
                    }
                    MetadataOperation::RegexMatch(p) => {
                        format!("Metadata({key:?}).re_match({:?})", p.as_str())
                    }
                    MetadataOperation::OneOf(values) => {
                        format!("Metadata({key:?}).one_of({})", Value::from(values.clone()))
                    }
                }
            }
            Check::Ai(check) if check.retries > 0 => format!(
                "Response.ai_check(should={:?}, retries={})",
                check.requirement, check.retries
            ),
            Check::Ai(check) => format!("Response.ai_check(should={:?})", check.requirement),
        }
    }
}

impl ResponseOperation {
    fn parts(&self) -> (&'static str, String) {
        match self {
            ResponseOperation::Equals(v) => ("should equal", v.clone()),
            ResponseOperation::NotEquals(v) => ("should not equal", v.clone()),
            ResponseOperation::Contains(v) => ("should contain", v.clone()),
            ResponseOperation::NotContains(v) => ("should not contain", v.clone()),
            ResponseOperation::RegexMatch(p) => ("should match the regex", p.as_str().to_string()),
        }
    }
}

impl MetadataOperation {
    fn parts(&self) -> (&'static str, String) {
        match self {
            MetadataOperation::Equals(v) => ("should equal", v.clone()),
            MetadataOperation::NotEquals(v) => ("should not equal", v.clone()),
            MetadataOperation::Contains(v) => ("should contain", value_text(v)),
            MetadataOperation::NotContains(v) => ("should not contain", value_text(v)),
            MetadataOperation::RegexMatch(p) => ("should match the regex", p.as_str().to_string()),
            MetadataOperation::OneOf(values) => {
                ("should be one of", Value::from(values.clone()).to_string())
            }
        }
    }
}

impl ResponseCheck {
    pub fn evaluate(&self, response: &str) -> Option<CheckFailure> {
        let passed = match &self.operation {
            ResponseOperation::Equals(expected) => response == expected,
            ResponseOperation::NotEquals(expected) => response != expected,
            ResponseOperation::Contains(expected) => response.contains(expected.as_str()),
            ResponseOperation::NotContains(expected) => !response.contains(expected.as_str()),
            ResponseOperation::RegexMatch(pattern) => pattern.is_match(response),
        };

        if passed {
            None
        } else {
            Some(CheckFailure::Mismatch {
                actual: response.to_string(),
            })
        }
    }
}

impl MetadataCheck {
    pub fn evaluate(&self, metadata: &MetadataSnapshot) -> Option<CheckFailure> {
        let Some(value) = metadata.get(&self.key) else {
            return Some(CheckFailure::MissingKey {
                key: self.key.clone(),
                available: metadata.keys().cloned().collect(),
            });
        };

        let passed = match &self.operation {
            MetadataOperation::Equals(expected) => value == expected,
            MetadataOperation::NotEquals(expected) => value != expected,
            MetadataOperation::Contains(expected) | MetadataOperation::NotContains(expected) => {
                let Value::String(needle) = expected else {
                    return Some(CheckFailure::NotText {
                        expected: expected.to_string(),
                    });
                };
                let contains = value.contains(needle.as_str());
                if matches!(self.operation, MetadataOperation::Contains(_)) {
                    contains
                } else {
                    !contains
                }
            }
            MetadataOperation::RegexMatch(pattern) => pattern.is_match(value),
            MetadataOperation::OneOf(allowed) => is_one_of(value, allowed),
        };

        if passed {
            None
        } else {
            Some(CheckFailure::Mismatch {
                actual: value.clone(),
            })
        }
    }
}

impl AiCheck {
    pub fn evaluate(
        &self,
        transcript: &[Message],
        evaluator: Option<&dyn RequirementEvaluator>,
    ) -> Option<CheckFailure> {
        let Some(evaluator) = evaluator else {
            return Some(CheckFailure::GenerationError {
                trace: EvaluationError::NoClient {
                    purpose: "ai checks",
                }
                .trace(),
            });
        };

        let mut remaining = self.retries;
        loop {
            match evaluator.check_requirement(transcript, &self.requirement) {
                Ok(verdict) if verdict.requirement_met => return None,
                Ok(_) if remaining > 0 => remaining -= 1,
                Ok(verdict) => {
                    return Some(CheckFailure::UnmetRequirement {
                        reason: verdict.reason,
                    })
                }
                Err(err) => {
                    return Some(CheckFailure::GenerationError { trace: err.trace() });
                }
            }
        }
    }
}

/// Membership by raw value or by text representation.
fn is_one_of(value: &str, allowed: &[Value]) -> bool {
    allowed.iter().any(|candidate| match candidate {
        Value::String(text) => text == value,
        other => other.to_string() == value,
    })
}

/// Text representation used when comparing JSON values with metadata text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builders
// ─────────────────────────────────────────────────────────────────────────────

/// Builders for checks over the chatbot reply text.
pub struct Response;

impl Response {
    pub fn equals(text: impl Into<String>) -> Check {
        Self::check(ResponseOperation::Equals(text.into()))
    }

    pub fn not_equals(text: impl Into<String>) -> Check {
        Self::check(ResponseOperation::NotEquals(text.into()))
    }

    pub fn contains(text: impl Into<String>) -> Check {
        Self::check(ResponseOperation::Contains(text.into()))
    }

    pub fn not_contains(text: impl Into<String>) -> Check {
        Self::check(ResponseOperation::NotContains(text.into()))
    }

    pub fn re_match(pattern: &str) -> Result<Check, CheckError> {
        Ok(Self::check(ResponseOperation::RegexMatch(Pattern::new(
            pattern,
        )?)))
    }

    pub fn ai_check(should: impl Into<String>) -> Check {
        Self::ai_check_with_retries(should, 0)
    }

    pub fn ai_check_with_retries(should: impl Into<String>, retries: u32) -> Check {
        Check::Ai(AiCheck {
            requirement: should.into(),
            retries,
        })
    }

    fn check(operation: ResponseOperation) -> Check {
        Check::Response(ResponseCheck { operation })
    }
}

/// Builder for checks over one metadata key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    key: String,
}

impl Metadata {
    pub fn key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn equals(self, value: impl std::fmt::Display) -> Check {
        self.check(MetadataOperation::Equals(value.to_string()))
    }

    pub fn not_equals(self, value: impl std::fmt::Display) -> Check {
        self.check(MetadataOperation::NotEquals(value.to_string()))
    }

    pub fn contains(self, value: impl Into<Value>) -> Check {
        self.check(MetadataOperation::Contains(value.into()))
    }

    pub fn not_contains(self, value: impl Into<Value>) -> Check {
        self.check(MetadataOperation::NotContains(value.into()))
    }

    pub fn re_match(self, pattern: &str) -> Result<Check, CheckError> {
        let pattern = Pattern::new(pattern)?;
        Ok(self.check(MetadataOperation::RegexMatch(pattern)))
    }

    pub fn one_of<I, V>(self, values: I) -> Check
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.check(MetadataOperation::OneOf(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    fn check(self, operation: MetadataOperation) -> Check {
        Check::Metadata(MetadataCheck {
            key: self.key,
            operation,
        })
    }
}
