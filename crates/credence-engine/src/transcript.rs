//! Message log, pending-chatbot queue and metadata accumulator for one run.

use credence_core::{Message, MetadataSnapshot, Role};
use std::collections::VecDeque;
use std::fmt::Display;

/// Shared by every conversation nested under one top-level run, so turn
/// indices are global across nesting.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Indices into `messages` of chatbot turns not yet consumed by a script.
    pending: VecDeque<usize>,
    metadata: MetadataSnapshot,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn. Chatbot turns take the accumulated metadata, which is
    /// then cleared, and are queued for the script to consume.
    pub fn record(&mut self, role: Role, body: impl Into<String>) -> &Message {
        let index = self.messages.len();
        let message = match role {
            Role::User => Message::user(index, body),
            Role::Chatbot => {
                let snapshot = std::mem::take(&mut self.metadata);
                self.pending.push_back(index);
                Message::chatbot(index, body, snapshot)
            }
        };
        self.messages.push(message);
        &self.messages[index]
    }

    pub fn collect_metadata(&mut self, key: impl Into<String>, value: impl Display) {
        self.metadata.insert(key.into(), value.to_string());
    }

    /// Drop metadata nothing has claimed. Called before each message is
    /// handed to the chatbot.
    pub fn clear_metadata(&mut self) {
        self.metadata.clear();
    }

    /// Metadata collected since the last chatbot turn.
    pub fn pending_metadata(&self) -> &MetadataSnapshot {
        &self.metadata
    }

    pub fn take_next_chatbot_message(&mut self) -> Option<Message> {
        let index = self.pending.pop_front()?;
        self.messages.get(index).cloned()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Turns recorded so far, and the index the next one will take.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// History up to and including turn `index`.
    pub fn history_through(&self, index: usize) -> &[Message] {
        let end = (index + 1).min(self.messages.len());
        &self.messages[..end]
    }
}

/// Handle given to the adapter while it handles a message or runs a
/// registered function.
pub struct ChatbotContext<'a> {
    transcript: &'a mut Transcript,
}

impl<'a> ChatbotContext<'a> {
    pub fn new(transcript: &'a mut Transcript) -> Self {
        Self { transcript }
    }

    /// Push a reply produced out of band rather than returned from
    /// `handle_message`.
    pub fn record_chatbot_message(&mut self, text: impl Into<String>) {
        self.transcript.record(Role::Chatbot, text);
    }

    /// Tag the next chatbot turn with `key = value`.
    pub fn collect_metadata(&mut self, key: impl Into<String>, value: impl Display) {
        self.transcript.collect_metadata(key, value);
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }
}
