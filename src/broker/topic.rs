//! Topic grammar: parsing and validation of dot-separated topic strings.
//!
//! ```text
//! topic    := segment ("." segment)*
//! segment  := literal | wildcard
//! wildcard := "*"            ; legal ONLY as the final segment
//! literal  := one or more characters, excluding "." and not equal to "*"
//! ```

use crate::error::BrokerError;

/// The wildcard segment token.
pub const WILDCARD: &str = "*";

/// A validated topic string.
///
/// Holds the literal segments in order plus whether the final segment was the
/// wildcard token. The wildcard token itself is not stored as a segment; a
/// wildcard topic's segments are the literal prefix to expand under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    raw: String,
    segments: Vec<String>,
    wildcard: bool,
}

impl Topic {
    /// Parse and validate a topic string.
    ///
    /// ## Example
    ///
    /// ```
    /// use topicbus::Topic;
    ///
    /// let topic = Topic::parse("player.scored").unwrap();
    /// assert_eq!(topic.segments(), ["player", "scored"]);
    /// assert!(!topic.is_wildcard());
    ///
    /// let all = Topic::parse("player.*").unwrap();
    /// assert_eq!(all.segments(), ["player"]);
    /// assert!(all.is_wildcard());
    ///
    /// assert!(Topic::parse("a.*.b").is_err());
    /// assert!(Topic::parse("").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, BrokerError> {
        if raw.is_empty() {
            return Err(BrokerError::InvalidTopic {
                topic: raw.to_string(),
                reason: "topic is empty",
            });
        }

        let parts: Vec<&str> = raw.split('.').collect();
        let last = parts.len() - 1;
        let mut segments = Vec::with_capacity(parts.len());
        let mut wildcard = false;

        for (i, part) in parts.iter().enumerate() {
            if *part == WILDCARD {
                if i != last {
                    return Err(BrokerError::InvalidTopic {
                        topic: raw.to_string(),
                        reason: "wildcard segment is only allowed in the final position",
                    });
                }
                wildcard = true;
            } else if part.is_empty() {
                return Err(BrokerError::InvalidTopic {
                    topic: raw.to_string(),
                    reason: "empty segment",
                });
            } else {
                segments.push((*part).to_string());
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
            wildcard,
        })
    }

    /// The exact string this topic was parsed from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The literal segments, in order. For a wildcard topic this is the
    /// prefix under which the wildcard expands.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether the final segment was the wildcard token.
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }
}
