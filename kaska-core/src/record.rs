//! Records delivered to consuming applications.

use bytes::Bytes;

use crate::Offset;

/// A single message as delivered to an application.
///
/// Records are materialized on the consumer side at poll or get time; the
/// broker itself stores only the raw payload sequence per topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The topic this message was read from.
    pub topic: String,
    /// The message's offset within the topic.
    pub offset: Offset,
    /// The opaque message payload.
    pub payload: Bytes,
}

impl Record {
    /// Creates a new record.
    #[must_use]
    pub fn new(topic: impl Into<String>, offset: Offset, payload: Bytes) -> Self {
        Self {
            topic: topic.into(),
            offset,
            payload,
        }
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_new() {
        let record = Record::new("orders", Offset::new(4), Bytes::from("payload"));
        assert_eq!(record.topic, "orders");
        assert_eq!(record.offset.get(), 4);
        assert_eq!(record.payload_len(), 7);
    }
}
