//! Buyer cart rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::common::format_price;

pub const MAX_LINE_QUANTITY: i32 = 99;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart row joined with the product it points at
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub name: String,
    pub price: i64,
    pub images: Vec<String>,
    pub is_active: bool,
    pub seller_id: Uuid,
}

impl CartLine {
    /// `None` if the multiplication overflows
    pub fn line_total(&self) -> Option<i64> {
        self.price.checked_mul(self.quantity as i64)
    }

    pub fn image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub lines: Vec<CartLine>,
    pub item_count: i64,
    pub total: i64,
    pub total_display: String,
    /// False when any line points at a deactivated listing
    pub can_checkout: bool,
}

impl CartSummary {
    pub fn from_lines(lines: Vec<CartLine>) -> Self {
        let item_count = lines.iter().map(|l| l.quantity as i64).sum();
        let total = lines
            .iter()
            .filter(|l| l.is_active)
            .filter_map(CartLine::line_total)
            .fold(0i64, |acc, t| acc.saturating_add(t));
        let can_checkout = !lines.is_empty() && lines.iter().all(|l| l.is_active);
        Self {
            lines,
            item_count,
            total,
            total_display: format_price(total),
            can_checkout,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartRequest {
    pub quantity: i32,
}
