//! Per-destination chunking of rendered lines.

use indexmap::IndexMap;
use tracing::warn;

use crate::common::Destination;

/// Appended to lines cut down to the size limit.
const TRUNCATION_MARK: char = '…';

/// One Discord message worth of relayed lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Set when the lines came from nsfw/nsfl messages.
    pub sensitive: bool,
    chars: usize,
}

impl Chunk {
    fn new(line: String, chars: usize, sensitive: bool) -> Self {
        Self {
            text: line,
            sensitive,
            chars,
        }
    }

    /// Length in characters, which is what Discord's limit counts.
    #[cfg(test)]
    pub fn char_len(&self) -> usize {
        self.chars
    }
}

/// Lines waiting to be sent during one relay cycle, grouped by destination.
///
/// Lines are joined with newlines into chunks no longer than `limit`
/// characters. Sensitive and regular lines never share a chunk, so withholding
/// a sensitive chunk never hides regular lines.
#[derive(Debug)]
pub struct PendingDeliveryQueue {
    limit: usize,
    pending: IndexMap<Destination, Vec<Chunk>>,
}

impl PendingDeliveryQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            pending: IndexMap::new(),
        }
    }

    /// Queue a rendered line for a destination.
    ///
    /// A line longer than the limit on its own is truncated, or dropped when
    /// sensitive since cutting it could break the spoiler markup.
    pub fn push(&mut self, destination: Destination, line: &str, sensitive: bool) {
        let mut line = line.to_string();
        let mut chars = line.chars().count();

        if chars > self.limit {
            if sensitive {
                warn!(
                    "Dropping sensitive line of {} chars for {} (limit {})",
                    chars, destination, self.limit
                );
                return;
            }
            line = line.chars().take(self.limit - 1).collect();
            line.push(TRUNCATION_MARK);
            chars = self.limit;
        }

        let chunks = self.pending.entry(destination).or_default();
        match chunks.last_mut() {
            Some(last) if last.sensitive == sensitive && last.chars + 1 + chars <= self.limit => {
                last.text.push('\n');
                last.text.push_str(&line);
                last.chars += 1 + chars;
            }
            _ => chunks.push(Chunk::new(line, chars, sensitive)),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Destinations in the order they first received a line.
    #[cfg(test)]
    pub fn destinations(&self) -> impl Iterator<Item = &Destination> {
        self.pending.keys()
    }

    #[cfg(test)]
    pub fn chunks_for(&self, destination: &Destination) -> &[Chunk] {
        self.pending.get(destination).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_inner(self) -> IndexMap<Destination, Vec<Chunk>> {
        self.pending
    }
}
