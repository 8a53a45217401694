//! Message-related models

use std::fmt;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};

use super::protocol::{
    DIRECT_MESSAGE_PATH, DIRECT_MESSAGE_SCHEMA, SECRET_MESSAGE_PATH, SECRET_MESSAGE_SCHEMA,
};
use crate::dwn::{Did, DwnError, Record};

/// Message variant
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Readable only by its author.
    #[default]
    Secret,
    /// Readable by its author and one recipient.
    Direct,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Secret => "Secret",
            MessageKind::Direct => "Direct",
        }
    }

    pub fn protocol_path(&self) -> &'static str {
        match self {
            MessageKind::Secret => SECRET_MESSAGE_PATH,
            MessageKind::Direct => DIRECT_MESSAGE_PATH,
        }
    }

    pub fn schema(&self) -> &'static str {
        match self {
            MessageKind::Secret => SECRET_MESSAGE_SCHEMA,
            MessageKind::Direct => DIRECT_MESSAGE_SCHEMA,
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            MessageKind::Secret => MessageKind::Direct,
            MessageKind::Direct => MessageKind::Secret,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composer input fields.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Draft {
    pub text: String,
    /// Empty means no image.
    pub image_url: String,
    pub kind: MessageKind,
    /// Only used for direct messages.
    pub recipient: String,
}

/// Burn book message. Everything but `record_id` is the stored JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub text: String,
    pub timestamp: String,
    pub sender: Did,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_did: Option<Did>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Assigned by the node after a successful write.
    #[serde(skip)]
    pub record_id: Option<String>,
}

impl Message {
    /// Build a secret message from the draft. The draft's recipient is ignored.
    pub fn secret<Tz: TimeZone>(draft: &Draft, sender: &Did, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self {
            text: draft.text.clone(),
            timestamp: format_timestamp(now),
            sender: sender.clone(),
            kind: MessageKind::Secret,
            recipient_did: None,
            image_url: image_url(&draft.image_url),
            record_id: None,
        }
    }

    /// Build a direct message to `recipient`. The recipient is not validated.
    pub fn direct<Tz: TimeZone>(
        draft: &Draft,
        recipient: Did,
        sender: &Did,
        now: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self {
            text: draft.text.clone(),
            timestamp: format_timestamp(now),
            sender: sender.clone(),
            kind: MessageKind::Direct,
            recipient_did: Some(recipient),
            image_url: image_url(&draft.image_url),
            record_id: None,
        }
    }

    /// Build whichever variant the draft selects.
    pub fn from_draft<Tz: TimeZone>(draft: &Draft, sender: &Did, now: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        match draft.kind {
            MessageKind::Secret => Self::secret(draft, sender, now),
            MessageKind::Direct => {
                Self::direct(draft, Did::new(draft.recipient.clone()), sender, now)
            }
        }
    }

    /// Decode and validate a record payload, attaching the record id.
    pub fn from_record(record: &Record) -> Result<Self, DwnError> {
        let mut message: Message = record.json()?;
        match (&message.kind, &message.recipient_did) {
            (MessageKind::Direct, None) => {
                return Err(DwnError::Decode(format!(
                    "direct message {} has no recipientDid",
                    record.id
                )));
            }
            (MessageKind::Secret, Some(_)) => {
                return Err(DwnError::Decode(format!(
                    "secret message {} carries a recipientDid",
                    record.id
                )));
            }
            _ => {}
        }
        message.image_url = message.image_url.filter(|u| !u.is_empty());
        message.record_id = Some(record.id.clone());
        Ok(message)
    }

    /// Identity the record is transmitted to: self for secrets, the recipient otherwise.
    pub fn target(&self, own: &Did) -> Did {
        match (&self.kind, &self.recipient_did) {
            (MessageKind::Direct, Some(recipient)) => recipient.clone(),
            (MessageKind::Direct, None) => Did::new(""),
            (MessageKind::Secret, _) => own.clone(),
        }
    }

    /// JSON payload as written to the node.
    pub fn payload(&self) -> Result<Vec<u8>, DwnError> {
        serde_json::to_vec(self).map_err(|e| DwnError::Encode(e.to_string()))
    }
}

/// Display timestamp: en-US date and time joined by a space (`3/7/2024 4:05:09 PM`).
pub fn format_timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    now.format("%-m/%-d/%Y %-I:%M:%S %p").to_string()
}

fn image_url(raw: &str) -> Option<String> {
    (!raw.is_empty()).then(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 16, 5, 9).unwrap()
    }

    fn draft(text: &str) -> Draft {
        Draft {
            text: text.to_string(),
            ..Draft::default()
        }
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(&at()), "3/7/2024 4:05:09 PM");
        let morning = Utc.with_ymd_and_hms(2023, 12, 25, 0, 30, 0).unwrap();
        assert_eq!(format_timestamp(&morning), "12/25/2023 12:30:00 AM");
    }

    #[test]
    fn test_secret_message() {
        let me = Did::from("did:example:me");
        let mut d = draft("hello");
        d.recipient = "did:example:ignored".to_string();
        let msg = Message::secret(&d, &me, &at());

        assert_eq!(msg.text, "hello");
        assert_eq!(msg.kind, MessageKind::Secret);
        assert_eq!(msg.sender, me);
        assert_eq!(msg.recipient_did, None);
        assert_eq!(msg.image_url, None);
        assert_eq!(msg.record_id, None);
        assert_eq!(msg.target(&me), me);
    }

    #[test]
    fn test_direct_message_passes_empty_recipient_through() {
        let me = Did::from("did:example:me");
        let mut d = draft("psst");
        d.kind = MessageKind::Direct;
        let msg = Message::from_draft(&d, &me, &at());

        assert_eq!(msg.kind, MessageKind::Direct);
        assert_eq!(msg.recipient_did, Some(Did::from("")));
        assert_eq!(msg.target(&me), Did::from(""));
    }

    #[test]
    fn test_payload_shape() {
        let me = Did::from("did:example:me");
        let mut d = draft("hi");
        d.kind = MessageKind::Direct;
        d.recipient = "did:example:you".to_string();
        d.image_url = "https://img.example/cat.png".to_string();
        let mut msg = Message::from_draft(&d, &me, &at());
        msg.record_id = Some("rec-1".to_string());

        let json: serde_json::Value = serde_json::from_slice(&msg.payload().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "text": "hi",
                "timestamp": "3/7/2024 4:05:09 PM",
                "sender": "did:example:me",
                "type": "Direct",
                "recipientDid": "did:example:you",
                "imageUrl": "https://img.example/cat.png",
            })
        );
    }

    fn record_with(data: &str) -> Record {
        Record {
            id: "rec-9".to_string(),
            author: Did::from("did:example:me"),
            recipient: Did::from("did:example:me"),
            protocol: "p".to_string(),
            protocol_path: "secretMessage".to_string(),
            schema: "s".to_string(),
            data: data.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_image_url_is_kept_as_typed() {
        let me = Did::from("did:example:me");
        let mut d = draft("look");
        d.image_url = " https://img.example/cat.png ".to_string();
        let msg = Message::secret(&d, &me, &at());
        assert_eq!(msg.image_url.as_deref(), Some(" https://img.example/cat.png "));
    }

    #[test]
    fn test_from_record_attaches_id_and_drops_empty_image() {
        let rec = record_with(
            r#"{"text":"t","timestamp":"ts","sender":"did:example:me","type":"Secret","imageUrl":""}"#,
        );
        let msg = Message::from_record(&rec).unwrap();
        assert_eq!(msg.record_id.as_deref(), Some("rec-9"));
        assert_eq!(msg.image_url, None);
    }

    #[test]
    fn test_from_record_rejects_invalid_payloads() {
        let missing_sender = record_with(r#"{"text":"t","timestamp":"ts","type":"Secret"}"#);
        assert!(matches!(
            Message::from_record(&missing_sender),
            Err(DwnError::Decode(_))
        ));

        let direct_without_recipient = record_with(
            r#"{"text":"t","timestamp":"ts","sender":"did:example:me","type":"Direct"}"#,
        );
        assert!(matches!(
            Message::from_record(&direct_without_recipient),
            Err(DwnError::Decode(_))
        ));

        let secret_with_recipient = record_with(
            r#"{"text":"t","timestamp":"ts","sender":"did:example:me","type":"Secret","recipientDid":"did:example:you"}"#,
        );
        assert!(matches!(
            Message::from_record(&secret_with_recipient),
            Err(DwnError::Decode(_))
        ));

        let unknown_type = record_with(
            r#"{"text":"t","timestamp":"ts","sender":"did:example:me","type":"Shout"}"#,
        );
        assert!(Message::from_record(&unknown_type).is_err());
    }
}
