//! Contact Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Delivery destination owned by a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub id: Uuid,
    #[serde(skip)]
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: ContactKind,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactKind { Phone, Email, #[default] Address }

impl Contact {
    pub fn new(user_id: Uuid, kind: ContactKind, value: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), user_id, kind, value: value.into(), created_at: Utc::now() }
    }
    pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.user_id == user_id }
}

impl ContactKind {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Phone => "phone", Self::Email => "email", Self::Address => "address" }
    }
}

impl FromStr for ContactKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "phone" => Ok(Self::Phone), "email" => Ok(Self::Email), "address" => Ok(Self::Address),
            other => Err(format!("unknown contact type '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_contact_ownership() {
        let owner = Uuid::now_v7();
        let c = Contact::new(owner, ContactKind::Address, "Moscow, Tverskaya 1");
        assert!(c.is_owned_by(owner));
        assert!(!c.is_owned_by(Uuid::now_v7()));
    }
    #[test]
    fn test_kind_text() {
        assert_eq!("phone".parse::<ContactKind>().unwrap(), ContactKind::Phone);
        assert!("fax".parse::<ContactKind>().is_err());
        assert_eq!(serde_json::to_value(ContactKind::Email).unwrap(), "email");
    }
}
