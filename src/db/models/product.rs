//! Product listings and browse filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::common::{format_price, text_enum};

text_enum! {
    pub enum Category {
        Electronics => ("electronics", "Electronics"),
        Furniture => ("furniture", "Furniture"),
        Clothing => ("clothing", "Clothing"),
        Books => ("books", "Books"),
        Sports => ("sports", "Sports & Outdoors"),
        Home => ("home", "Home & Garden"),
        Vehicles => ("vehicles", "Vehicles"),
        Other => ("other", "Other"),
    }
}

text_enum! {
    /// How the seller wants to part with the item
    pub enum ProductType {
        Sell => ("sell", "For sale"),
        Rent => ("rent", "For rent"),
        Exchange => ("exchange", "For exchange"),
    }
}

text_enum! {
    pub enum Condition {
        New => ("new", "New"),
        LikeNew => ("like_new", "Like new"),
        Good => ("good", "Good"),
        Fair => ("fair", "Fair"),
        Poor => ("poor", "Poor"),
    }
}

text_enum! {
    pub enum SortOrder {
        Newest => ("newest", "Newest first"),
        PriceAsc => ("price_asc", "Price: low to high"),
        PriceDesc => ("price_desc", "Price: high to low"),
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Newest
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub product_type: String,
    pub condition: String,
    /// Price in cents
    pub price: i64,
    pub images: Vec<String>,
    pub location: String,
    pub contact_number: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }

    pub fn price_display(&self) -> String {
        format_price(self.price)
    }

    pub fn category_label(&self) -> &str {
        Category::parse(&self.category)
            .map(|c| c.label())
            .unwrap_or(self.category.as_str())
    }

    pub fn condition_label(&self) -> &str {
        Condition::parse(&self.condition)
            .map(|c| c.label())
            .unwrap_or(self.condition.as_str())
    }

    pub fn product_type_label(&self) -> &str {
        ProductType::parse(&self.product_type)
            .map(|t| t.label())
            .unwrap_or(self.product_type.as_str())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductWithSeller {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub product: Product,
    pub seller_name: String,
}

/// Listing fields after validation
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub product_type: ProductType,
    pub condition: Condition,
    pub price: i64,
    pub images: Vec<String>,
    pub location: String,
    pub contact_number: String,
}

/// Price as sent by clients: forms send text, JSON clients may send a number
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PriceField {
    Text(String),
    Number(serde_json::Number),
}

impl PriceField {
    pub fn as_text(&self) -> String {
        match self {
            PriceField::Text(s) => s.trim().to_string(),
            PriceField::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub description: String,
    pub category: String,
    pub product_type: String,
    pub condition: String,
    pub price: PriceField,
    #[serde(default)]
    pub images: Vec<String>,
    pub location: String,
    pub contact_number: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Raw browse parameters as they arrive in a query string.
///
/// HTML forms submit empty strings for untouched inputs, so every field is
/// text and blank values are treated as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub product_type: Option<String>,
    pub condition: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub location: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub per_page: Option<String>,
}

pub const DEFAULT_PER_PAGE: u32 = 12;
pub const MAX_PER_PAGE: u32 = 48;

/// Typed browse filter; every set field narrows the result with `AND`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category: Option<Category>,
    pub product_type: Option<ProductType>,
    pub condition: Option<Condition>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub location: Option<String>,
    pub sort: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl Default for ProductFilter {
    fn default() -> Self {
        Self {
            search: None,
            category: None,
            product_type: None,
            condition: None,
            min_price: None,
            max_price: None,
            location: None,
            sort: SortOrder::Newest,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl ProductFilter {
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }
}

#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct SellerStats {
    pub total_products: i64,
    pub active_products: i64,
    pub units_sold: i64,
    /// Revenue in cents from orders that were not cancelled
    pub revenue: i64,
}
