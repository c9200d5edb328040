// Askama template definitions and the view models they render

use askama::Template;

use crate::auth::SessionUser;
use crate::db::{
    cents_to_decimal, format_price, CartLine, Category, Condition, Order, OrderItem, OrderSummary,
    Product, ProductFilter, ProductType, SaleLine, SellerStats, SortOrder,
};

use super::flash::Flash;

mod filters {
    pub fn shorten(s: &str, len: usize) -> ::askama::Result<String> {
        if s.chars().count() <= len {
            Ok(s.to_string())
        } else {
            Ok(format!("{}...", s.chars().take(len).collect::<String>()))
        }
    }
}

fn date(ts: &chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%b %-d, %Y").to_string()
}

/// Header state shared by every page
#[derive(Debug, Clone, Default)]
pub struct Nav {
    pub user_name: Option<String>,
    pub is_buyer: bool,
    pub is_seller: bool,
    pub cart_count: i64,
    pub flash: Option<Flash>,
}

impl Nav {
    pub fn new(session: Option<&SessionUser>, cart_count: i64, flash: Option<Flash>) -> Self {
        Self {
            user_name: session.map(|s| s.name.clone()),
            is_buyer: session.is_some_and(SessionUser::is_buyer),
            is_seller: session.is_some_and(SessionUser::is_seller),
            cart_count,
            flash,
        }
    }
}

/// An `<option>` in a select input
#[derive(Debug, Clone)]
pub struct Choice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl Choice {
    fn list(items: impl Iterator<Item = (&'static str, &'static str)>, current: &str) -> Vec<Choice> {
        items
            .map(|(value, label)| Choice {
                value: value.to_string(),
                label: label.to_string(),
                selected: value == current,
            })
            .collect()
    }

    pub fn categories(current: &str) -> Vec<Choice> {
        Self::list(Category::ALL.iter().map(|c| (c.as_str(), c.label())), current)
    }

    pub fn product_types(current: &str) -> Vec<Choice> {
        Self::list(ProductType::ALL.iter().map(|t| (t.as_str(), t.label())), current)
    }

    pub fn conditions(current: &str) -> Vec<Choice> {
        Self::list(Condition::ALL.iter().map(|c| (c.as_str(), c.label())), current)
    }

    pub fn sort_orders(current: &str) -> Vec<Choice> {
        Self::list(SortOrder::ALL.iter().map(|s| (s.as_str(), s.label())), current)
    }
}

#[derive(Debug, Clone)]
pub struct ProductCard {
    pub id: String,
    pub name: String,
    pub price: String,
    pub image: String,
    pub location: String,
    pub condition: String,
    pub product_type: String,
}

impl From<&Product> for ProductCard {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            price: p.price_display(),
            image: p.primary_image().unwrap_or_default().to_string(),
            location: p.location.clone(),
            condition: p.condition_label().to_string(),
            product_type: p.product_type_label().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: String,
    pub images: Vec<String>,
    pub category: String,
    pub condition: String,
    pub product_type: String,
    pub location: String,
    pub contact_number: String,
    pub seller_name: String,
    pub is_active: bool,
    pub listed_on: String,
}

impl ProductView {
    pub fn new(p: &Product, seller_name: &str) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            description: p.description.clone(),
            price: p.price_display(),
            images: p.images.clone(),
            category: p.category_label().to_string(),
            condition: p.condition_label().to_string(),
            product_type: p.product_type_label().to_string(),
            location: p.location.clone(),
            contact_number: p.contact_number.clone(),
            seller_name: seller_name.to_string(),
            is_active: p.is_active,
            listed_on: date(&p.created_at),
        }
    }
}

/// Current browse filter values, echoed back into the form
#[derive(Debug, Clone, Default)]
pub struct FilterView {
    pub search: String,
    pub location: String,
    pub min_price: String,
    pub max_price: String,
}

impl From<&ProductFilter> for FilterView {
    fn from(f: &ProductFilter) -> Self {
        Self {
            search: f.search.clone().unwrap_or_default(),
            location: f.location.clone().unwrap_or_default(),
            min_price: f.min_price.map(cents_to_decimal).unwrap_or_default(),
            max_price: f.max_price.map(cents_to_decimal).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CartLineView {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub image: String,
    pub price: String,
    pub quantity: i32,
    pub line_total: String,
    pub is_active: bool,
}

impl From<&CartLine> for CartLineView {
    fn from(l: &CartLine) -> Self {
        Self {
            id: l.id.to_string(),
            product_id: l.product_id.to_string(),
            name: l.name.clone(),
            image: l.image().unwrap_or_default().to_string(),
            price: format_price(l.price),
            quantity: l.quantity,
            line_total: l.line_total().map(format_price).unwrap_or_default(),
            is_active: l.is_active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderRow {
    pub id: String,
    pub short_id: String,
    pub placed_on: String,
    pub status: String,
    pub status_label: String,
    pub total: String,
    pub item_count: i64,
}

impl OrderRow {
    pub fn new(order: &Order, item_count: i64) -> Self {
        let id = order.id.to_string();
        Self {
            short_id: id.chars().take(8).collect(),
            id,
            placed_on: date(&order.created_at),
            status: order.status.clone(),
            status_label: order
                .status()
                .map(|s| s.label().to_string())
                .unwrap_or_else(|| order.status.clone()),
            total: order.total_display(),
            item_count,
        }
    }
}

impl From<&OrderSummary> for OrderRow {
    fn from(s: &OrderSummary) -> Self {
        OrderRow::new(&s.order, s.item_count)
    }
}

#[derive(Debug, Clone)]
pub struct OrderItemRow {
    pub product_id: Option<String>,
    pub name: String,
    pub price: String,
    pub quantity: i32,
    pub line_total: String,
}

impl From<&OrderItem> for OrderItemRow {
    fn from(i: &OrderItem) -> Self {
        Self {
            product_id: i.product_id.map(|id| id.to_string()),
            name: i.product_name.clone(),
            price: format_price(i.price),
            quantity: i.quantity,
            line_total: format_price(i.line_total()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SellerProductRow {
    pub id: String,
    pub name: String,
    pub price: String,
    pub image: String,
    pub is_active: bool,
    pub listed_on: String,
}

impl From<&Product> for SellerProductRow {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            price: p.price_display(),
            image: p.primary_image().unwrap_or_default().to_string(),
            is_active: p.is_active,
            listed_on: date(&p.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatsView {
    pub total_products: i64,
    pub active_products: i64,
    pub units_sold: i64,
    pub revenue: String,
}

impl From<&SellerStats> for StatsView {
    fn from(s: &SellerStats) -> Self {
        Self {
            total_products: s.total_products,
            active_products: s.active_products,
            units_sold: s.units_sold,
            revenue: format_price(s.revenue),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaleRow {
    pub order_short_id: String,
    pub ordered_on: String,
    pub buyer_name: String,
    pub product_name: String,
    pub quantity: i32,
    pub amount: String,
    pub status: String,
    pub status_label: String,
}

impl From<&SaleLine> for SaleRow {
    fn from(s: &SaleLine) -> Self {
        Self {
            order_short_id: s.order_id.to_string().chars().take(8).collect(),
            ordered_on: date(&s.ordered_at),
            buyer_name: s.buyer_name.clone(),
            product_name: s.product_name.clone(),
            quantity: s.quantity,
            amount: format_price(s.price.saturating_mul(s.quantity as i64)),
            status: s.order_status.clone(),
            status_label: crate::db::OrderStatus::parse(&s.order_status)
                .map(|st| st.label().to_string())
                .unwrap_or_else(|| s.order_status.clone()),
        }
    }
}

/// Listing form values as text, for re-rendering after an error
#[derive(Debug, Clone, Default)]
pub struct ProductFormValues {
    pub name: String,
    pub description: String,
    pub category: String,
    pub product_type: String,
    pub condition: String,
    pub price: String,
    pub location: String,
    pub contact_number: String,
}

impl From<&Product> for ProductFormValues {
    fn from(p: &Product) -> Self {
        Self {
            name: p.name.clone(),
            description: p.description.clone(),
            category: p.category.clone(),
            product_type: p.product_type.clone(),
            condition: p.condition.clone(),
            price: cents_to_decimal(p.price),
            location: p.location.clone(),
            contact_number: p.contact_number.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub nav: Nav,
    pub products: Vec<ProductCard>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub nav: Nav,
    pub email: String,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub nav: Nav,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub user_type: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "browse.html")]
pub struct BrowseTemplate {
    pub nav: Nav,
    pub products: Vec<ProductCard>,
    pub filters: FilterView,
    pub categories: Vec<Choice>,
    pub product_types: Vec<Choice>,
    pub conditions: Vec<Choice>,
    pub sort_orders: Vec<Choice>,
    pub total: i64,
    pub page: u32,
    pub total_pages: u32,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "product.html")]
pub struct ProductTemplate {
    pub nav: Nav,
    pub product: ProductView,
    pub can_buy: bool,
    pub is_owner: bool,
}

#[derive(Template)]
#[template(path = "cart.html")]
pub struct CartTemplate {
    pub nav: Nav,
    pub lines: Vec<CartLineView>,
    pub item_count: i64,
    pub total: String,
    pub can_checkout: bool,
}

#[derive(Template)]
#[template(path = "checkout.html")]
pub struct CheckoutTemplate {
    pub nav: Nav,
    pub lines: Vec<CartLineView>,
    pub total: String,
    pub total_cents: i64,
    pub shipping_address: String,
    pub contact_phone: String,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "orders.html")]
pub struct OrdersTemplate {
    pub nav: Nav,
    pub orders: Vec<OrderRow>,
}

#[derive(Template)]
#[template(path = "order_detail.html")]
pub struct OrderDetailTemplate {
    pub nav: Nav,
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
    pub shipping_address: String,
    pub contact_phone: String,
    pub can_cancel: bool,
}

#[derive(Template)]
#[template(path = "seller_dashboard.html")]
pub struct SellerDashboardTemplate {
    pub nav: Nav,
    pub stats: StatsView,
    pub products: Vec<SellerProductRow>,
}

#[derive(Template)]
#[template(path = "product_form.html")]
pub struct ProductFormTemplate {
    pub nav: Nav,
    pub title: String,
    pub action: String,
    pub is_edit: bool,
    pub form: ProductFormValues,
    pub categories: Vec<Choice>,
    pub product_types: Vec<Choice>,
    pub conditions: Vec<Choice>,
    pub existing_images: Vec<String>,
    pub max_images: usize,
    pub errors: Vec<String>,
}

#[derive(Template)]
#[template(path = "sales.html")]
pub struct SalesTemplate {
    pub nav: Nav,
    pub sales: Vec<SaleRow>,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub nav: Nav,
    pub status: u16,
    pub message: String,
}
