//! Accumulator for independent failures collected while iterating over several attempts.

use crate::error::{Error, Result};
use std::fmt;

const PREFIX: &str = "ERROR: ";
const SEPARATOR: &str = "\n  ";

/// Zero or more failure messages collected during one logical operation.
///
/// An empty aggregate means "no error" and should never be surfaced to callers; use
/// [`AggregatingError::into_error`] to turn it into an optional [`Error`]. Merging another
/// aggregate appends its messages, so aggregates never nest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatingError {
    messages: Vec<String>,
}

impl AggregatingError {
    /// Creates an empty aggregate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Appends one message.
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Appends an error.
    ///
    /// Aggregates contribute each of their messages in order; any other error contributes its
    /// rendered text as a single message.
    pub fn add_error(&mut self, err: &Error) {
        match err.sub_messages() {
            Some(messages) => self.messages.extend_from_slice(messages),
            None => self.messages.push(err.to_string()),
        }
    }

    /// Appends every message of another aggregate.
    pub fn merge(&mut self, other: AggregatingError) {
        self.messages.extend(other.messages);
    }

    /// Records the error of a failed result and passes a successful value through.
    pub fn record<T>(&mut self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.add_error(&err);
                None
            }
        }
    }

    /// Returns true when no failure has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of recorded messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Recorded messages in insertion order.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Converts into an error, or `None` if nothing was recorded.
    #[must_use]
    pub fn into_error(self) -> Option<Error> {
        if self.is_empty() {
            None
        } else {
            Some(Error::Aggregate(self))
        }
    }

    /// Converts into `Ok(())` when empty, otherwise into the aggregate error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Aggregate`] if at least one failure was recorded.
    pub fn into_result(self) -> Result<()> {
        self.into_error().map_or(Ok(()), Err)
    }
}

impl fmt::Display for AggregatingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(PREFIX)?;
        match self.messages.as_slice() {
            [] => Ok(()),
            [only] => write!(f, ": {only}"),
            all => write!(f, "{SEPARATOR}{}", all.join(SEPARATOR)),
        }
    }
}

impl std::error::Error for AggregatingError {}
