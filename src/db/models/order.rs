//! Orders, order items, and checkout drafting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

use super::cart::CartLine;
use super::common::{format_price, text_enum};

text_enum! {
    pub enum OrderStatus {
        Pending => ("pending", "Pending"),
        Confirmed => ("confirmed", "Confirmed"),
        Cancelled => ("cancelled", "Cancelled"),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    /// Total in cents
    pub total: i64,
    pub status: String,
    pub shipping_address: String,
    pub contact_phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }

    pub fn is_cancellable(&self) -> bool {
        self.status() == Some(OrderStatus::Pending)
    }

    pub fn total_display(&self) -> String {
        format_price(self.total)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    /// Cleared if the listing is later deleted; the snapshot fields remain
    pub product_id: Option<Uuid>,
    pub seller_id: Uuid,
    pub product_name: String,
    pub price: i64,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    pub fn line_total(&self) -> i64 {
        self.price.saturating_mul(self.quantity as i64)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OrderSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub order: Order,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// An order item as seen by the seller of the product
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SaleLine {
    pub order_id: Uuid,
    pub order_status: String,
    pub ordered_at: DateTime<Utc>,
    pub buyer_name: String,
    pub product_name: String,
    pub price: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: String,
    pub contact_phone: String,
    /// Total in cents the buyer saw when confirming; checked against the cart
    #[serde(default)]
    pub expected_total: Option<i64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CheckoutError {
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("{0} is no longer available")]
    Unavailable(String),
    #[error("Order total is too large")]
    TotalOverflow,
    #[error("Your cart changed since you reviewed it, please check it again")]
    CartChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftLine {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub product_name: String,
    pub price: i64,
    pub quantity: i32,
}

/// Cart contents checked and priced, ready to be written as an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub total: i64,
    pub lines: Vec<DraftLine>,
}

impl OrderDraft {
    pub fn from_cart(lines: &[CartLine]) -> Result<Self, CheckoutError> {
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        if let Some(inactive) = lines.iter().find(|l| !l.is_active) {
            return Err(CheckoutError::Unavailable(inactive.name.clone()));
        }

        let mut total: i64 = 0;
        let mut draft_lines = Vec::with_capacity(lines.len());
        for line in lines {
            let line_total = line.line_total().ok_or(CheckoutError::TotalOverflow)?;
            total = total
                .checked_add(line_total)
                .ok_or(CheckoutError::TotalOverflow)?;
            draft_lines.push(DraftLine {
                product_id: line.product_id,
                seller_id: line.seller_id,
                product_name: line.name.clone(),
                price: line.price,
                quantity: line.quantity,
            });
        }

        Ok(Self {
            total,
            lines: draft_lines,
        })
    }

    /// Refuse when the cart no longer adds up to what the buyer confirmed,
    /// e.g. a listing was deleted and its line dropped out of the cart.
    pub fn confirm_total(&self, expected: Option<i64>) -> Result<(), CheckoutError> {
        match expected {
            Some(total) if total != self.total => Err(CheckoutError::CartChanged),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_line(name: &str, price: i64, quantity: i32, is_active: bool) -> CartLine {
        CartLine {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            name: name.to_string(),
            price,
            images: vec!["/uploads/products/a.jpg".to_string()],
            is_active,
            seller_id: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_draft_rejects_empty_cart() {
        assert_eq!(OrderDraft::from_cart(&[]), Err(CheckoutError::EmptyCart));
    }

    #[test]
    fn test_draft_rejects_deactivated_product() {
        let lines = vec![
            cart_line("Road bike", 25_000, 1, true),
            cart_line("Camping stove", 3_000, 1, false),
        ];
        let err = OrderDraft::from_cart(&lines).unwrap_err();
        assert_eq!(err, CheckoutError::Unavailable("Camping stove".to_string()));
        assert_eq!(err.to_string(), "Camping stove is no longer available");
    }

    #[test]
    fn test_draft_sums_line_totals_and_snapshots() {
        let lines = vec![
            cart_line("Bookshelf", 4_500, 2, true),
            cart_line("Desk chair", 7_999, 1, true),
        ];
        let draft = OrderDraft::from_cart(&lines).unwrap();
        assert_eq!(draft.total, 4_500 * 2 + 7_999);
        assert_eq!(draft.lines.len(), 2);
        assert_eq!(draft.lines[0].product_name, "Bookshelf");
        assert_eq!(draft.lines[0].price, 4_500);
        assert_eq!(draft.lines[0].quantity, 2);
        assert_eq!(draft.lines[1].product_id, lines[1].product_id);
    }

    #[test]
    fn test_confirm_total_catches_dropped_lines() {
        let lines = vec![
            cart_line("Bookshelf", 4_500, 1, true),
            cart_line("Desk chair", 7_999, 1, true),
        ];
        let reviewed = OrderDraft::from_cart(&lines).unwrap().total;

        // The chair's listing was deleted, so its cart line is gone
        let draft = OrderDraft::from_cart(&lines[..1]).unwrap();
        assert_eq!(
            draft.confirm_total(Some(reviewed)),
            Err(CheckoutError::CartChanged)
        );
        assert!(draft.confirm_total(Some(4_500)).is_ok());
        assert!(draft.confirm_total(None).is_ok());
    }

    #[test]
    fn test_draft_detects_overflow() {
        let lines = vec![
            cart_line("Gold bar", i64::MAX / 2, 1, true),
            cart_line("Another gold bar", i64::MAX / 2, 1, true),
            cart_line("One more", i64::MAX / 2, 1, true),
        ];
        assert_eq!(
            OrderDraft::from_cart(&lines),
            Err(CheckoutError::TotalOverflow)
        );
    }

    #[test]
    fn test_only_pending_orders_are_cancellable() {
        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            buyer_id: Uuid::new_v4(),
            total: 1000,
            status: "pending".to_string(),
            shipping_address: "12 Market Street".to_string(),
            contact_phone: "+1 555 0100".to_string(),
            created_at: now,
            updated_at: now,
        };
        assert!(order.is_cancellable());

        order.status = "cancelled".to_string();
        assert!(!order.is_cancellable());

        order.status = "confirmed".to_string();
        assert!(!order.is_cancellable());
    }
}
