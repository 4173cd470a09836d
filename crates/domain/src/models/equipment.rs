//! Equipment stock domain models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Moderation status of a vendor's equipment listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EquipmentStatus::Pending => write!(f, "pending"),
            EquipmentStatus::Approved => write!(f, "approved"),
            EquipmentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for EquipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EquipmentStatus::Pending),
            "approved" => Ok(EquipmentStatus::Approved),
            "rejected" => Ok(EquipmentStatus::Rejected),
            other => Err(format!("Unknown equipment status: {}", other)),
        }
    }
}

/// Stock ledger for one equipment item.
///
/// `quantity` is the number of units available to reserve and `reserved_count`
/// the number currently allocated to events. Their sum is the total owned stock,
/// which reserve and release never change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EquipmentStock {
    pub id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub description: String,
    pub quantity: i32,
    pub reserved_count: i32,
    pub unit_price: Decimal,
    pub status: EquipmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EquipmentStock {
    /// Total units owned by the vendor (available plus reserved).
    pub fn total_owned(&self) -> i32 {
        self.quantity + self.reserved_count
    }

    /// Only approved equipment may be reserved.
    pub fn is_reservable(&self) -> bool {
        self.status == EquipmentStatus::Approved
    }
}

/// New equipment listing submitted by a vendor.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateEquipmentRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    #[serde(default)]
    pub description: String,

    #[validate(range(min = 0, max = 100000, message = "Quantity must be between 0 and 100000"))]
    pub quantity: i32,

    pub unit_price: Decimal,
}

/// Admin moderation decision.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct UpdateEquipmentStatusRequest {
    pub status: EquipmentStatus,
}

/// Vendor adds owned units to a listing.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct RestockRequest {
    #[validate(range(min = 1, max = 100000, message = "Units must be between 1 and 100000"))]
    pub units: i32,
}
