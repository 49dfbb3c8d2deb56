//! Wire format of messages exchanged on channels
//!
//! Each message is a flat UTF-8 string consisting of three colon separated fields:
//!
//! ```text
//! <TYPE>:<CORRELATION_ID>:<BODY>
//! ```
//!
//! Only the first two colons are structural, the body may contain further colons.
//! No escaping is performed.

use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const FIELD_SEPARATOR: char = ':';
const FIELD_COUNT: usize = 3;

/// Identifier linking a request to its response
pub type CorrelationId = Uuid;

/// Kind of message sent over a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Query which should be answered by a handler registered for the channel
    Request,
    /// Answer to a previously sent request
    Response,
}

impl MessageType {
    /// Textual representation used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Request => "REQUEST",
            MessageType::Response => "RESPONSE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUEST" => Ok(MessageType::Request),
            "RESPONSE" => Ok(MessageType::Response),
            _ => Err(()),
        }
    }
}

/// Decoded message as transmitted on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Whether this is a request or response
    pub message_type: MessageType,
    /// Identifier shared between a request and its response
    pub correlation_id: CorrelationId,
    /// Application payload
    pub body: String,
}

impl Message {
    /// Creates a new message from its parts
    pub fn new(
        message_type: MessageType,
        correlation_id: CorrelationId,
        body: impl Into<String>,
    ) -> Self {
        Self {
            message_type,
            correlation_id,
            body: body.into(),
        }
    }

    /// Serializes the message into its wire representation
    pub fn encode(&self) -> String {
        encode(self.message_type, &self.correlation_id, &self.body)
    }

    /// Parses a message from its wire representation
    ///
    /// Returns `None` if the input does not contain three fields, the type is unknown or the
    /// correlation id is not a valid UUID.
    pub fn decode(raw: &str) -> Option<Self> {
        let mut fields = raw.splitn(FIELD_COUNT, FIELD_SEPARATOR);

        let message_type = fields.next()?.parse::<MessageType>().ok()?;
        let correlation_id = Uuid::parse_str(fields.next()?).ok()?;
        let body = fields.next()?;

        Some(Self::new(message_type, correlation_id, body))
    }
}

/// Joins the fields of a message without allocating an intermediate [`Message`]
pub fn encode(message_type: MessageType, correlation_id: &CorrelationId, body: &str) -> String {
    format!(
        "{}{sep}{}{sep}{}",
        message_type,
        correlation_id.to_hyphenated(),
        body,
        sep = FIELD_SEPARATOR
    )
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    const ID: &str = "5f0c4a3e-1c2b-4d6e-9f8a-7b6c5d4e3f2a";

    #[test]
    fn encode_fields_in_order() {
        let id = Uuid::parse_str(ID).unwrap();
        let encoded = Message::new(MessageType::Request, id, "hello").encode();
        assert_eq!(encoded, format!("REQUEST:{}:hello", ID));
    }

    #[test]
    fn decode_valid_message() {
        let decoded = Message::decode(&format!("RESPONSE:{}:HELLO", ID)).unwrap();
        assert_eq!(decoded.message_type, MessageType::Response);
        assert_eq!(decoded.correlation_id.to_string(), ID);
        assert_eq!(decoded.body, "HELLO");
    }

    #[test]
    fn keep_colons_in_body() {
        let decoded = Message::decode(&format!("REQUEST:{}:a:b::c:", ID)).unwrap();
        assert_eq!(decoded.body, "a:b::c:");
    }

    #[test]
    fn accept_empty_body() {
        let decoded = Message::decode(&format!("REQUEST:{}:", ID)).unwrap();
        assert_eq!(decoded.body, "");
    }

    #[test]
    fn reject_missing_fields() {
        assert_eq!(Message::decode("REQUEST:notauuid"), None);
        assert_eq!(Message::decode(&format!("REQUEST:{}", ID)), None);
        assert_eq!(Message::decode("REQUEST"), None);
        assert_eq!(Message::decode(""), None);
    }

    #[test]
    fn reject_unknown_type() {
        assert_eq!(Message::decode("FOO:abc-123:body"), None);
        assert_eq!(Message::decode(&format!("request:{}:body", ID)), None);
        assert_eq!(Message::decode(&format!("FOO:{}:body", ID)), None);
    }

    #[test]
    fn reject_invalid_correlation_id() {
        assert_eq!(Message::decode("REQUEST:abc-123:body"), None);
        assert_eq!(Message::decode("RESPONSE::body"), None);
    }

    #[test]
    fn survive_a_trip_over_the_wire() {
        let original = Message::new(MessageType::Response, Uuid::new_v4(), "x:y");
        assert_eq!(Message::decode(&original.encode()), Some(original));
    }
}
