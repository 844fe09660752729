use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

// Rejection codes shells route on; string-matching messages is not an option
// for the mobile clients, so these are part of the wire contract.
pub const PREMIUM_REQUIRED: &str = "PREMIUM_REQUIRED";
pub const LIMIT_REACHED: &str = "LIMIT_REACHED";
pub const LOCATION_REQUIRED: &str = "LOCATION_REQUIRED";
pub const INVALID_LOCATION: &str = "INVALID_LOCATION";
pub const INVALID_QUANTITY: &str = "INVALID_QUANTITY";
pub const NAME_REQUIRED: &str = "NAME_REQUIRED";
pub const NOT_FOUND: &str = "NOT_FOUND";
pub const UNSUPPORTED_ACTION: &str = "UNSUPPORTED_ACTION";

/// Codes that make a queued action permanently rejected. Anything else is
/// treated as transient by the client transport.
pub const DOMAIN_REJECTION_CODES: &[&str] = &[
    PREMIUM_REQUIRED,
    LIMIT_REACHED,
    LOCATION_REQUIRED,
    INVALID_LOCATION,
    INVALID_QUANTITY,
    NAME_REQUIRED,
    NOT_FOUND,
    UNSUPPORTED_ACTION,
];

/// Per-collection item ceiling for non-premium households. Soft limit:
/// enforced by count-then-insert, never by a storage constraint.
pub const FREE_TIER_LIMIT: i64 = 25;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Household {
    pub id: String,
    pub name: String,
    pub is_premium: bool,
    pub premium_expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A household row plus its derived member count, loaded once per request and
/// passed into the gate and evaluator as plain data.
#[derive(Debug, Clone)]
pub struct HouseholdSnapshot {
    pub household: Household,
    pub member_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HouseholdMember {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub brand: Option<String>,
    pub upc: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: String,
    pub household_id: String,
    pub product_id: String,
    pub location_id: String,
    pub quantity: i64,
    pub expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct GroceryItem {
    pub id: String,
    pub household_id: String,
    pub name: String,
    pub normalized_name: String,
    pub brand: Option<String>,
    pub upc: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MutationLogEntry {
    pub seq: i64,
    pub household_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub op: String,
    pub payload: String,
    pub created_at: i64,
}

impl MutationLogEntry {
    pub fn payload_json(&self) -> crate::AppResult<serde_json::Value> {
        serde_json::from_str(&self.payload).map_err(crate::AppError::from)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Household,
    HouseholdMember,
    Product,
    Location,
    InventoryItem,
    GroceryItem,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Household => "household",
            EntityType::HouseholdMember => "household_member",
            EntityType::Product => "product",
            EntityType::Location => "location",
            EntityType::InventoryItem => "inventory_item",
            EntityType::GroceryItem => "grocery_item",
        }
    }

    pub fn parse(value: &str) -> Option<EntityType> {
        match value {
            "household" => Some(EntityType::Household),
            "household_member" => Some(EntityType::HouseholdMember),
            "product" => Some(EntityType::Product),
            "location" => Some(EntityType::Location),
            "inventory_item" => Some(EntityType::InventoryItem),
            "grocery_item" => Some(EntityType::GroceryItem),
            _ => None,
        }
    }
}

/// Operation recorded in the mutation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Create,
    Update,
    Delete,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Create => "create",
            Op::Update => "update",
            Op::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Op> {
        match value {
            "create" => Some(Op::Create),
            "update" => Some(Op::Update),
            "delete" => Some(Op::Delete),
            _ => None,
        }
    }
}

// Request payloads for the service surface. Ids are optional so a client can
// mint them while offline; replays of the same id are acknowledged as no-ops.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewInventoryItem {
    #[serde(default)]
    pub id: Option<String>,
    pub product_id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryItemPatch {
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantityAdjustment {
    pub delta: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewGroceryItem {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub upc: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProduct {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub upc: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewLocation {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

/// Case-fold and collapse whitespace so "  Whole  Milk " and "whole milk"
/// dedupe to the same grocery row. NFKC first so width/compatibility variants
/// fold too.
pub fn normalized_name(name: &str) -> String {
    name.nfkc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
