//! Backend records looked up for a scanned subscription token.
//!
//! Field names follow the admin API's camelCase JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Related-record counts the API attaches to a user as `_count`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    pub subscriptions: Option<u64>,
    pub payments: Option<u64>,
    pub usages: Option<u64>,
}

/// A member account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<Gender>,
    /// ISO 8601 timestamp string.
    pub created_at: String,
    /// ISO 8601 timestamp string.
    pub updated_at: String,
    #[serde(rename = "_count", default, skip_serializing_if = "Option::is_none")]
    pub counts: Option<UserCounts>,
}

/// The plan a subscription was bought under.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub duration_days: u32,
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A member's subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    /// ISO 8601 timestamp string.
    pub start_date: String,
    /// ISO 8601 timestamp string.
    pub end_date: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub plan: Option<SubscriptionPlan>,
}
