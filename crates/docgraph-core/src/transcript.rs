//! Append-only chat transcript fed by the answer stream.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SendRejected;
use crate::stream::StreamFrame;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// Supporting text attached to an answer, shown collapsed until toggled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAnnex {
    pub text: String,
    pub expanded: bool,
}

impl ContextAnnex {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            expanded: false,
        }
    }

    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
    pub context: Option<ContextAnnex>,
    /// True while answer fragments are still arriving
    pub streaming: bool,
}

impl ChatEntry {
    fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            context: None,
            streaming: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
    /// Index of the assistant entry receiving the stream
    open: Option<usize>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn is_busy(&self) -> bool {
        self.open.is_some()
    }

    /// Start a question/answer exchange.
    ///
    /// On success the user entry and an empty assistant entry are appended and
    /// the trimmed question is returned for sending.
    pub fn begin(&mut self, text: &str) -> Result<String, SendRejected> {
        let question = text.trim();
        if question.is_empty() {
            return Err(SendRejected::Empty);
        }
        if self.is_busy() {
            return Err(SendRejected::Busy);
        }

        self.entries.push(ChatEntry::new(ChatRole::User, question));
        let mut answer = ChatEntry::new(ChatRole::Assistant, "");
        answer.streaming = true;
        self.entries.push(answer);
        self.open = Some(self.entries.len() - 1);

        Ok(question.to_string())
    }

    /// Apply a decoded frame to the open answer. Returns false if no answer is open.
    pub fn apply(&mut self, frame: StreamFrame) -> bool {
        let Some(entry) = self.open.and_then(|i| self.entries.get_mut(i)) else {
            warn!("stream frame arrived with no open answer");
            return false;
        };

        match frame {
            StreamFrame::Chunk(text) => entry.content.push_str(&text),
            StreamFrame::Context(text) => {
                if entry.context.is_some() {
                    debug!("answer already has context, ignoring repeat");
                } else {
                    entry.context = Some(ContextAnnex::new(text));
                }
            }
        }
        true
    }

    /// The stream closed normally; the answer is final.
    pub fn complete(&mut self) {
        if let Some(entry) = self.open.take().and_then(|i| self.entries.get_mut(i)) {
            entry.streaming = false;
        }
    }

    /// The request or stream failed; drop the unfinished answer.
    pub fn fail(&mut self) -> Option<ChatEntry> {
        let index = self.open.take()?;
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn push_system(&mut self, text: impl Into<String>) {
        self.entries.push(ChatEntry::new(ChatRole::System, text));
    }

    /// Expand or collapse the context annex of an entry. Returns the new state.
    pub fn toggle_context(&mut self, index: usize) -> Option<bool> {
        let annex = self.entries.get_mut(index)?.context.as_mut()?;
        annex.toggle();
        Some(annex.expanded)
    }

    /// Index of the most recent entry that has a context annex.
    pub fn latest_with_context(&self) -> Option<usize> {
        self.entries.iter().rposition(|e| e.context.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(s: &str) -> StreamFrame {
        StreamFrame::Chunk(s.to_string())
    }

    #[test]
    fn test_begin_appends_question_and_placeholder() {
        let mut transcript = Transcript::new();
        let question = transcript.begin("  what is in the report?  ").unwrap();
        assert_eq!(question, "what is in the report?");

        let entries = transcript.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, ChatRole::User);
        assert_eq!(entries[0].content, "what is in the report?");
        assert_eq!(entries[1].role, ChatRole::Assistant);
        assert!(entries[1].content.is_empty());
        assert!(entries[1].streaming);
        assert!(transcript.is_busy());
    }

    #[test]
    fn test_whitespace_only_is_rejected() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.begin(" \n\t"), Err(SendRejected::Empty));
        assert!(transcript.entries().is_empty());
        assert!(!transcript.is_busy());
    }

    #[test]
    fn test_second_begin_while_streaming_is_rejected() {
        let mut transcript = Transcript::new();
        transcript.begin("first").unwrap();
        assert_eq!(transcript.begin("second"), Err(SendRejected::Busy));
        assert_eq!(transcript.entries().len(), 2);
    }

    #[test]
    fn test_chunks_accumulate_in_order() {
        let mut transcript = Transcript::new();
        transcript.begin("hi").unwrap();
        assert!(transcript.apply(chunk("Hel")));
        assert!(transcript.apply(chunk("lo")));
        transcript.complete();

        let answer = &transcript.entries()[1];
        assert_eq!(answer.content, "Hello");
        assert!(!answer.streaming);
        assert!(!transcript.is_busy());
    }

    #[test]
    fn test_context_attaches_once_collapsed() {
        let mut transcript = Transcript::new();
        transcript.begin("hi").unwrap();
        transcript.apply(chunk("a"));
        transcript.apply(chunk("b"));
        transcript.apply(StreamFrame::Context("source text".to_string()));
        transcript.apply(StreamFrame::Context("again".to_string()));
        transcript.complete();

        let annex = transcript.entries()[1].context.as_ref().unwrap();
        assert_eq!(annex.text, "source text");
        assert!(!annex.expanded);

        assert_eq!(transcript.toggle_context(1), Some(true));
        assert_eq!(transcript.toggle_context(1), Some(false));
        assert_eq!(transcript.toggle_context(0), None);
    }

    #[test]
    fn test_fail_removes_placeholder_even_with_later_entries() {
        let mut transcript = Transcript::new();
        transcript.begin("hi").unwrap();
        transcript.apply(chunk("partial"));
        transcript.push_system("Document uploaded");

        let removed = transcript.fail().unwrap();
        assert_eq!(removed.content, "partial");

        let roles: Vec<ChatRole> = transcript.entries().iter().map(|e| e.role).collect();
        assert_eq!(roles, vec![ChatRole::User, ChatRole::System]);
        assert!(!transcript.is_busy());
    }

    #[test]
    fn test_frames_after_completion_are_dropped() {
        let mut transcript = Transcript::new();
        transcript.begin("hi").unwrap();
        transcript.complete();
        assert!(!transcript.apply(chunk("late")));
        assert_eq!(transcript.entries()[1].content, "");
    }

    #[test]
    fn test_latest_with_context() {
        let mut transcript = Transcript::new();
        assert_eq!(transcript.latest_with_context(), None);
        transcript.begin("q").unwrap();
        transcript.apply(StreamFrame::Context("ctx".to_string()));
        transcript.complete();
        transcript.push_system("note");
        assert_eq!(transcript.latest_with_context(), Some(1));
    }
}
