//! Message ID resolution
//!
//! Lets the CLI accept a unique prefix instead of a full UUID.

use super::QueuedMessage;

/// ID resolution for partial matches against the queue
pub struct IdResolver<'a> {
    messages: &'a [QueuedMessage],
}

impl<'a> IdResolver<'a> {
    pub fn new(messages: &'a [QueuedMessage]) -> Self {
        Self { messages }
    }

    /// Resolve a partial reference to a full ID
    ///
    /// Returns:
    /// - Ok(Some(id)) if exactly one match
    /// - Ok(None) if no matches
    /// - Err with candidates if ambiguous
    pub fn resolve(&self, reference: &str) -> Result<Option<String>, Vec<String>> {
        // An exact match always wins, even if it is also a prefix of another id
        if let Some(msg) = self.messages.iter().find(|m| m.id == reference) {
            return Ok(Some(msg.id.clone()));
        }

        let mut matches: Vec<String> = self
            .messages
            .iter()
            .filter(|m| m.id.starts_with(reference))
            .map(|m| m.id.clone())
            .collect();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(matches),
        }
    }
}
