//! The message-exchange protocol installed on every participating node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const PROTOCOL_URI: &str = "https://blackgirlbytes.dev/burn-book-finale";

pub const SECRET_MESSAGE_PATH: &str = "secretMessage";
pub const DIRECT_MESSAGE_PATH: &str = "directMessage";

pub const SECRET_MESSAGE_SCHEMA: &str = "https://example.com/secretMessageSchema";
pub const DIRECT_MESSAGE_SCHEMA: &str = "https://example.com/directMessageSchema";

const JSON_FORMAT: &str = "application/json";

/// Who an action rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    Anyone,
    Author,
    Recipient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
}

/// A single `$actions` entry: `who` (optionally `of` a record type) `can` do what.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRule {
    pub who: Actor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub of: Option<String>,
    pub can: Vec<Action>,
}

impl ActionRule {
    fn anyone(can: Vec<Action>) -> Self {
        Self {
            who: Actor::Anyone,
            of: None,
            can,
        }
    }

    fn of(who: Actor, of: &str, can: Vec<Action>) -> Self {
        Self {
            who,
            of: Some(of.to_string()),
            can,
        }
    }
}

/// Schema and accepted encodings of one message type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolType {
    pub schema: String,
    pub data_formats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolRules {
    #[serde(rename = "$actions")]
    pub actions: Vec<ActionRule>,
}

/// Protocol descriptor as understood by decentralized web nodes.
///
/// Maps are ordered so the serialized form is identical on every call; nodes
/// compare definitions structurally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDefinition {
    pub protocol: String,
    pub published: bool,
    pub types: BTreeMap<String, ProtocolType>,
    pub structure: BTreeMap<String, ProtocolRules>,
}

impl ProtocolDefinition {
    /// The burn book protocol: secret messages readable by their author only,
    /// direct messages readable by author and recipient. Anyone may create either.
    pub fn burn_book() -> Self {
        let json = vec![JSON_FORMAT.to_string()];

        let mut types = BTreeMap::new();
        types.insert(
            SECRET_MESSAGE_PATH.to_string(),
            ProtocolType {
                schema: SECRET_MESSAGE_SCHEMA.to_string(),
                data_formats: json.clone(),
            },
        );
        types.insert(
            DIRECT_MESSAGE_PATH.to_string(),
            ProtocolType {
                schema: DIRECT_MESSAGE_SCHEMA.to_string(),
                data_formats: json,
            },
        );

        let mut structure = BTreeMap::new();
        structure.insert(
            SECRET_MESSAGE_PATH.to_string(),
            ProtocolRules {
                actions: vec![
                    ActionRule::anyone(vec![Action::Create]),
                    ActionRule::of(Actor::Author, SECRET_MESSAGE_PATH, vec![Action::Read]),
                ],
            },
        );
        structure.insert(
            DIRECT_MESSAGE_PATH.to_string(),
            ProtocolRules {
                actions: vec![
                    ActionRule::of(Actor::Author, DIRECT_MESSAGE_PATH, vec![Action::Read]),
                    ActionRule::of(Actor::Recipient, DIRECT_MESSAGE_PATH, vec![Action::Read]),
                    ActionRule::anyone(vec![Action::Create]),
                ],
            },
        );

        Self {
            protocol: PROTOCOL_URI.to_string(),
            published: true,
            types,
            structure,
        }
    }

    /// Schema URI registered for a protocol path.
    pub fn schema_for(&self, protocol_path: &str) -> Option<&str> {
        self.types.get(protocol_path).map(|t| t.schema.as_str())
    }

    /// Whether `who` holds `action` on records at `protocol_path`.
    pub fn allows(&self, protocol_path: &str, who: Actor, action: Action) -> bool {
        self.structure.get(protocol_path).map_or(false, |rules| {
            rules
                .actions
                .iter()
                .any(|r| (r.who == who || r.who == Actor::Anyone) && r.can.contains(&action))
        })
    }
}
