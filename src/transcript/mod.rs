//! Transcript assembly for delta-streamed responses.
//!
//! Turns a stream of partial-text events, keyed by response identifier, into
//! a stable append-only chat log. Assistant entries grow in place while a
//! response is streaming and are sealed when the vendor signals the content
//! part is done; user entries arrive whole and are immutable from the start.

use std::collections::HashMap;

use serde::Serialize;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Speaker {
    #[serde(rename = "AI")]
    Assistant,
    #[serde(rename = "USER")]
    User,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::Assistant => write!(f, "AI"),
            Speaker::User => write!(f, "USER"),
        }
    }
}

/// One entry in the visible conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub text: String,
    /// Set for streamed assistant entries; `None` for whole utterances.
    pub response_id: Option<String>,
}

/// Stateful assembler from delta events to chat-log entries.
///
/// An entry stays "open" (receiving deltas) until [`seal`](Self::seal) is
/// called for its response id. A delta arriving for a sealed id starts a new
/// entry rather than reopening the old one.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    entries: Vec<TranscriptEntry>,
    open: HashMap<String, usize>,
    dirty: bool,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one streamed fragment for `response_id`.
    ///
    /// Duplicate redelivery is tolerated: a delta that is already a suffix of
    /// the accumulated text is dropped, and a delta that is a strict superset
    /// of the accumulated text replaces it instead of being appended (so
    /// `"Hel"` followed by `"Hello"` yields `"Hello"`, not `"HelHello"`).
    pub fn apply_delta(&mut self, response_id: &str, delta: &str) {
        if delta.is_empty() {
            return;
        }

        let index = match self.open.get(response_id) {
            Some(&index) => index,
            None => {
                self.entries.push(TranscriptEntry {
                    speaker: Speaker::Assistant,
                    text: String::new(),
                    response_id: Some(response_id.to_string()),
                });
                let index = self.entries.len() - 1;
                self.open.insert(response_id.to_string(), index);
                index
            }
        };

        let entry = &mut self.entries[index];
        if entry.text.ends_with(delta) {
            tracing::debug!(response_id, "dropping duplicate transcript delta");
            return;
        }
        if delta.len() > entry.text.len() && delta.starts_with(entry.text.as_str()) {
            entry.text = delta.to_string();
        } else {
            entry.text.push_str(delta);
        }
        self.dirty = true;
    }

    /// Finalize the open entry for `response_id`. Returns whether one was open.
    pub fn seal(&mut self, response_id: &str) -> bool {
        let sealed = self.open.remove(response_id).is_some();
        if sealed {
            self.dirty = true;
        }
        sealed
    }

    /// Finalize every open entry (used when the content-done signal carries
    /// no response id).
    pub fn seal_all(&mut self) {
        if !self.open.is_empty() {
            self.open.clear();
            self.dirty = true;
        }
    }

    /// Append a whole, immutable entry (user utterances, typed messages).
    pub fn apply_complete(&mut self, speaker: Speaker, text: &str) {
        self.entries.push(TranscriptEntry {
            speaker,
            text: text.to_string(),
            response_id: None,
        });
        self.dirty = true;
    }

    /// Current chat log.
    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.entries.clone()
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Whether anything changed since the last flush; clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deltas_concatenate_in_arrival_order() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_delta("r1", "Good ");
        aggregator.apply_delta("r1", "morning, ");
        aggregator.apply_delta("r1", "team.");

        let entries = aggregator.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "Good morning, team.");
        assert_eq!(entries[0].speaker, Speaker::Assistant);
        assert_eq!(entries[0].response_id.as_deref(), Some("r1"));
    }

    #[test]
    fn duplicate_suffix_redelivery_is_dropped() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_delta("r1", "Hello");
        aggregator.apply_delta("r1", "Hello");
        assert_eq!(aggregator.entries()[0].text, "Hello");
    }

    #[test]
    fn superset_delta_replaces_instead_of_appending() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_delta("r1", "Hel");
        aggregator.apply_delta("r1", "Hello");
        assert_eq!(aggregator.entries()[0].text, "Hello");
    }

    #[test]
    fn distinct_response_ids_get_distinct_entries() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_delta("r1", "first");
        aggregator.apply_delta("r2", "second");
        aggregator.apply_delta("r1", " response");

        let entries = aggregator.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "first response");
        assert_eq!(entries[1].text, "second");
    }

    #[test]
    fn delta_after_seal_starts_a_new_entry() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_delta("r1", "sealed text");
        assert!(aggregator.seal("r1"));

        aggregator.apply_delta("r1", "late delta");
        let entries = aggregator.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "sealed text");
        assert_eq!(entries[1].text, "late delta");
    }

    #[test]
    fn seal_unknown_id_is_a_no_op() {
        let mut aggregator = TranscriptAggregator::new();
        assert!(!aggregator.seal("r9"));
        assert!(!aggregator.is_dirty());
    }

    #[test]
    fn complete_entries_are_immutable_whole_utterances() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_complete(Speaker::User, "What did we decide last week?");
        aggregator.apply_delta("r1", "We agreed to ship on Friday.");

        let entries = aggregator.entries();
        assert_eq!(entries[0].speaker, Speaker::User);
        assert_eq!(entries[0].response_id, None);
        assert_eq!(entries[1].speaker, Speaker::Assistant);
    }

    #[test]
    fn dirty_flag_tracks_flush_bookkeeping() {
        let mut aggregator = TranscriptAggregator::new();
        assert!(!aggregator.take_dirty());

        aggregator.apply_delta("r1", "text");
        assert!(aggregator.take_dirty());
        assert!(!aggregator.take_dirty());

        aggregator.seal("r1");
        assert!(aggregator.take_dirty());
    }

    #[test]
    fn empty_delta_is_ignored() {
        let mut aggregator = TranscriptAggregator::new();
        aggregator.apply_delta("r1", "");
        assert!(aggregator.entries().is_empty());
        assert!(!aggregator.is_dirty());
    }

    #[test]
    fn speaker_renders_wire_labels() {
        assert_eq!(Speaker::Assistant.to_string(), "AI");
        assert_eq!(Speaker::User.to_string(), "USER");
    }
}
