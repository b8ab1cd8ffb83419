//! Records persisted in the store: users, donations and notifications.
//!
//! Field names serialize in camelCase so the JSON layout matches what the
//! dashboards already read and write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Role a user signed up with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Restaurant,
    Ngo,
    Delivery,
    Admin,
}

impl Role {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "restaurant" | "donor" => Some(Self::Restaurant),
            "ngo" => Some(Self::Ngo),
            "delivery" | "agent" | "volunteer" => Some(Self::Delivery),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restaurant => "restaurant",
            Self::Ngo => "ngo",
            Self::Delivery => "delivery",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
}

impl User {
    /// Organization name when present, otherwise the person's name
    pub fn display_name(&self) -> &str {
        self.organization_name.as_deref().unwrap_or(&self.name)
    }
}

/// Donation status.
///
/// `InTransit` is part of the stored format but no transition produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DonationStatus {
    Available,
    Accepted,
    InTransit,
    Delivered,
}

impl DonationStatus {
    pub const ALL: [DonationStatus; 4] = [
        Self::Available,
        Self::Accepted,
        Self::InTransit,
        Self::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Accepted => "accepted",
            Self::InTransit => "in-transit",
            Self::Delivered => "delivered",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "available" => Some(Self::Available),
            "accepted" => Some(Self::Accepted),
            "in-transit" | "in_transit" | "intransit" => Some(Self::InTransit),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    pub id: String,
    pub restaurant_id: String,
    #[serde(default)]
    pub restaurant_name: String,
    pub food_type: String,
    /// Free text such as "50 servings"; older records may hold a bare number
    #[serde(deserialize_with = "quantity_text")]
    pub quantity: String,
    pub expiry_time: String,
    #[serde(default)]
    pub location: String,
    pub status: DonationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ngo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ngo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_agent_name: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    /// Bumped on every stored write; a stale copy cannot overwrite a newer one
    #[serde(default)]
    pub version: u64,
}

fn quantity_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    #[default]
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    #[serde(rename = "type", default)]
    pub kind: NotificationKind,
}

impl Notification {
    pub fn new(
        user_id: &str,
        message: impl Into<String>,
        kind: NotificationKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            message: message.into(),
            timestamp,
            read: false,
            kind,
        }
    }
}
