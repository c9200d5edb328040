//! Input validation for actions and forms.
//!
//! Field checks return `Result<(), String>` so they can be collected with
//! [`ValidationErrorBuilder`]; request-level validators turn raw requests
//! into typed inputs.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::{
    Category, CheckoutRequest, Condition, NewUser, ProductFilter, ProductInput, ProductRequest,
    ProductType, RegisterRequest, SortOrder, UserType, BrowseQuery, DEFAULT_PER_PAGE,
    MAX_LINE_QUANTITY, MAX_PER_PAGE,
};
use crate::error::{ApiError, ValidationErrorBuilder};

lazy_static! {
    /// Pragmatic email check: something@something.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$"
    ).unwrap();

    /// Digits, spaces, and the usual phone punctuation
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9 ()\-]+$").unwrap();

    /// Decimal amount with at most two fractional digits
    static ref PRICE_REGEX: Regex = Regex::new(r"^[0-9]{1,9}(\.[0-9]{1,2})?$").unwrap();
}

/// Highest accepted listing price: 10,000,000.00
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

const MIN_PASSWORD_LEN: usize = 8;

const MIN_PHONE_LEN: usize = 7;
const MAX_PHONE_LEN: usize = 20;
const MIN_PHONE_DIGITS: usize = 7;

pub fn validate_name(name: &str) -> Result<(), String> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err("Name is required".to_string());
    }
    if len < 2 {
        return Err("Name is too short (min 2 characters)".to_string());
    }
    if len > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err("Phone number is required".to_string());
    }
    let len = phone.chars().count();
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !PHONE_REGEX.is_match(phone) || !(MIN_PHONE_LEN..=MAX_PHONE_LEN).contains(&len) {
        return Err("Invalid phone number".to_string());
    }
    if digits < MIN_PHONE_DIGITS {
        return Err(format!("Phone number needs at least {} digits", MIN_PHONE_DIGITS));
    }
    Ok(())
}

/// Parse a decimal price ("12", "12.5", "12.50") into cents.
pub fn parse_price(input: &str) -> Result<i64, String> {
    let input = input.trim().trim_start_matches('$');
    if input.is_empty() {
        return Err("Price is required".to_string());
    }
    if !PRICE_REGEX.is_match(input) {
        return Err("Price must be a number with at most two decimal places".to_string());
    }

    let (whole, fraction) = match input.split_once('.') {
        Some((w, f)) => (w, f),
        None => (input, ""),
    };
    let whole: i64 = whole
        .parse()
        .map_err(|_| "Price is not a valid number".to_string())?;
    let fraction: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| "Invalid price".to_string())? * 10,
        _ => fraction.parse::<i64>().map_err(|_| "Invalid price".to_string())?,
    };

    let cents = whole * 100 + fraction;
    if cents <= 0 {
        return Err("Price must be greater than 0".to_string());
    }
    if cents > MAX_PRICE_CENTS {
        return Err("Price is too high (max 10,000,000.00)".to_string());
    }
    Ok(cents)
}

fn validate_length(value: &str, label: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(format!("{} is required", label));
    }
    if len < min {
        return Err(format!("{} is too short (min {} characters)", label, min));
    }
    if len > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }
    Ok(())
}

pub fn validate_image_count(count: usize, max: usize) -> Result<(), String> {
    if count == 0 {
        return Err("At least one image is required".to_string());
    }
    if count > max {
        return Err(format!("At most {} images are allowed", max));
    }
    Ok(())
}

fn validate_image_url(url: &str) -> Result<(), String> {
    if url.starts_with("https://") || url.starts_with("http://") || url.starts_with("/uploads/") {
        Ok(())
    } else {
        Err(format!("Invalid image URL: {}", url))
    }
}

pub fn validate_quantity(quantity: i32) -> Result<(), String> {
    if quantity < 1 {
        return Err("Quantity must be at least 1".to_string());
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(format!("Quantity cannot exceed {}", MAX_LINE_QUANTITY));
    }
    Ok(())
}

/// Validate a registration request and normalize it into a [`NewUser`].
///
/// The password hash is filled in by the caller once validation passed.
pub fn validate_registration(req: &RegisterRequest) -> Result<(String, UserType), ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    errors.check("name", validate_name(&req.name));
    errors.check("email", validate_email(&req.email));
    errors.check("password", validate_password(&req.password));
    errors.check("phone", validate_phone(&req.phone));

    let user_type = UserType::parse(req.user_type.trim());
    if user_type.is_none() {
        errors.add("user_type", "Account type must be buyer or seller");
    }

    errors.finish()?;

    Ok((
        normalize_email(&req.email),
        user_type.unwrap_or(UserType::Buyer),
    ))
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn new_user(req: &RegisterRequest, email: String, user_type: UserType, password_hash: String) -> NewUser {
    NewUser {
        name: req.name.trim().to_string(),
        email,
        password_hash,
        phone: req.phone.trim().to_string(),
        user_type,
    }
}

/// Validate a listing request. `max_images` comes from storage config.
pub fn validate_product(req: &ProductRequest, max_images: usize) -> Result<ProductInput, ApiError> {
    let mut errors = ValidationErrorBuilder::new();

    errors.check("name", validate_length(&req.name, "Name", 3, 120));
    errors.check(
        "description",
        validate_length(&req.description, "Description", 10, 2000),
    );

    let category = Category::parse(req.category.trim());
    if category.is_none() {
        errors.add("category", "Select a valid category");
    }
    let product_type = ProductType::parse(req.product_type.trim());
    if product_type.is_none() {
        errors.add("product_type", "Select a valid listing type");
    }
    let condition = Condition::parse(req.condition.trim());
    if condition.is_none() {
        errors.add("condition", "Select a valid condition");
    }

    let price = match parse_price(&req.price.as_text()) {
        Ok(cents) => Some(cents),
        Err(e) => {
            errors.add("price", e);
            None
        }
    };

    errors.check("images", validate_image_count(req.images.len(), max_images));
    for url in &req.images {
        errors.check("images", validate_image_url(url));
    }

    errors.check("location", validate_length(&req.location, "Location", 2, 120));
    errors.check("contact_number", validate_phone(&req.contact_number));

    errors.finish()?;

    match (category, product_type, condition, price) {
        (Some(category), Some(product_type), Some(condition), Some(price)) => Ok(ProductInput {
            name: req.name.trim().to_string(),
            description: req.description.trim().to_string(),
            category,
            product_type,
            condition,
            price,
            images: req.images.clone(),
            location: req.location.trim().to_string(),
            contact_number: req.contact_number.trim().to_string(),
        }),
        _ => Err(ApiError::internal("Listing validation was inconsistent")),
    }
}

pub fn validate_checkout(req: &CheckoutRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.check(
        "shipping_address",
        validate_length(&req.shipping_address, "Shipping address", 5, 300),
    );
    errors.check("contact_phone", validate_phone(&req.contact_phone));
    errors.finish()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Turn raw browse parameters into a typed filter.
///
/// Unknown enumeration values and unparsable prices are validation errors;
/// page numbers are clamped instead of rejected.
pub fn parse_browse_query(query: &BrowseQuery) -> Result<ProductFilter, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    let mut filter = ProductFilter::default();

    filter.search = non_blank(&query.search).map(|s| s.chars().take(100).collect());
    filter.location = non_blank(&query.location).map(|s| s.chars().take(100).collect());

    if let Some(value) = non_blank(&query.category) {
        filter.category = Category::parse(value);
        if filter.category.is_none() {
            errors.add("category", "Unknown category");
        }
    }
    if let Some(value) = non_blank(&query.product_type) {
        filter.product_type = ProductType::parse(value);
        if filter.product_type.is_none() {
            errors.add("product_type", "Unknown listing type");
        }
    }
    if let Some(value) = non_blank(&query.condition) {
        filter.condition = Condition::parse(value);
        if filter.condition.is_none() {
            errors.add("condition", "Unknown condition");
        }
    }
    if let Some(value) = non_blank(&query.sort) {
        filter.sort = SortOrder::parse(value).unwrap_or_default();
    }

    if let Some(value) = non_blank(&query.min_price) {
        match parse_price(value) {
            Ok(cents) => filter.min_price = Some(cents),
            Err(e) => {
                errors.add("min_price", e);
            }
        }
    }
    if let Some(value) = non_blank(&query.max_price) {
        match parse_price(value) {
            Ok(cents) => filter.max_price = Some(cents),
            Err(e) => {
                errors.add("max_price", e);
            }
        }
    }
    if let (Some(min), Some(max)) = (filter.min_price, filter.max_price) {
        if min > max {
            errors.add("min_price", "Minimum price cannot exceed maximum price");
        }
    }

    filter.page = non_blank(&query.page)
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(1)
        .max(1);
    filter.per_page = non_blank(&query.per_page)
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);

    errors.finish()?;
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PriceField;

    fn product_request() -> ProductRequest {
        ProductRequest {
            name: "Oak dining table".to_string(),
            description: "Solid oak, seats six, minor scratches on one leg.".to_string(),
            category: "furniture".to_string(),
            product_type: "sell".to_string(),
            condition: "good".to_string(),
            price: PriceField::Text("149.99".to_string()),
            images: vec!["/uploads/products/table.jpg".to_string()],
            location: "Portland, OR".to_string(),
            contact_number: "+1 (503) 555-0142".to_string(),
        }
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("12"), Ok(1200));
        assert_eq!(parse_price("12.5"), Ok(1250));
        assert_eq!(parse_price("12.05"), Ok(1205));
        assert_eq!(parse_price(" $0.99 "), Ok(99));
        assert_eq!(parse_price("10000000"), Ok(MAX_PRICE_CENTS));
    }

    #[test]
    fn test_price_must_be_positive() {
        assert!(parse_price("0").is_err());
        assert!(parse_price("0.00").is_err());
        assert!(parse_price("-5").is_err());
        assert!(parse_price("").is_err());
    }

    #[test]
    fn test_price_rejects_bad_format() {
        assert!(parse_price("12.345").is_err());
        assert!(parse_price("abc").is_err());
        assert!(parse_price("1e5").is_err());
        assert!(parse_price("10000000.01").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ana@example.com").is_ok());
        assert!(validate_email("first.last+tag@sub.example.org").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("with space@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("secret12").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("allletters").is_err());
        assert!(validate_password("12345678").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+44 20 7946 0958").is_ok());
        assert!(validate_phone("(503) 555-0142").is_ok());
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("call me").is_err());
        // The leading plus counts toward the length limit
        assert!(validate_phone("+1234567890123456789").is_ok());
        assert!(validate_phone("+12345678901234567890").is_err());
        // Punctuation alone is not a number
        assert!(validate_phone("-------").is_err());
        assert!(validate_phone("(12) 34-5").is_err());
    }

    #[test]
    fn test_validate_registration_collects_errors() {
        let req = RegisterRequest {
            name: "A".to_string(),
            email: "bad".to_string(),
            password: "pw".to_string(),
            phone: "x".to_string(),
            user_type: "admin".to_string(),
        };
        let err = validate_registration(&req).unwrap_err();
        let fields = err.field_errors().unwrap();
        for field in ["name", "email", "password", "phone", "user_type"] {
            assert!(fields.contains_key(field), "missing error for {}", field);
        }
    }

    #[test]
    fn test_validate_registration_normalizes_email() {
        let req = RegisterRequest {
            name: "Ana Lima".to_string(),
            email: "  Ana@Example.COM ".to_string(),
            password: "market123".to_string(),
            phone: "+1 555 0100".to_string(),
            user_type: "seller".to_string(),
        };
        let (email, user_type) = validate_registration(&req).unwrap();
        assert_eq!(email, "ana@example.com");
        assert_eq!(user_type, UserType::Seller);
    }

    #[test]
    fn test_validate_product_ok() {
        let input = validate_product(&product_request(), 3).unwrap();
        assert_eq!(input.price, 14_999);
        assert_eq!(input.category, Category::Furniture);
        assert_eq!(input.condition, Condition::Good);
    }

    #[test]
    fn test_validate_product_requires_images() {
        let mut req = product_request();
        req.images.clear();
        let err = validate_product(&req, 3).unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("images"));

        req.images = (0..4).map(|i| format!("/uploads/products/{}.jpg", i)).collect();
        let err = validate_product(&req, 3).unwrap_err();
        assert_eq!(err.message(), "At most 3 images are allowed");
    }

    #[test]
    fn test_validate_product_rejects_zero_price() {
        let mut req = product_request();
        req.price = PriceField::Number(serde_json::Number::from(0));
        let err = validate_product(&req, 3).unwrap_err();
        assert_eq!(err.message(), "Price must be greater than 0");
    }

    #[test]
    fn test_validate_product_rejects_unknown_enums() {
        let mut req = product_request();
        req.category = "weapons".to_string();
        req.condition = "mint".to_string();
        let err = validate_product(&req, 3).unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("category"));
        assert!(fields.contains_key("condition"));
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(99).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(100).is_err());
    }

    #[test]
    fn test_browse_query_blank_fields_are_ignored() {
        let query = BrowseQuery {
            search: Some("  ".to_string()),
            category: Some(String::new()),
            min_price: Some(String::new()),
            ..Default::default()
        };
        let filter = parse_browse_query(&query).unwrap();
        assert_eq!(filter, ProductFilter::default());
    }

    #[test]
    fn test_browse_query_parses_filters() {
        let query = BrowseQuery {
            search: Some("bike".to_string()),
            category: Some("sports".to_string()),
            condition: Some("like_new".to_string()),
            min_price: Some("50".to_string()),
            max_price: Some("250.5".to_string()),
            sort: Some("price_desc".to_string()),
            page: Some("3".to_string()),
            per_page: Some("500".to_string()),
            ..Default::default()
        };
        let filter = parse_browse_query(&query).unwrap();
        assert_eq!(filter.search.as_deref(), Some("bike"));
        assert_eq!(filter.category, Some(Category::Sports));
        assert_eq!(filter.condition, Some(Condition::LikeNew));
        assert_eq!(filter.min_price, Some(5_000));
        assert_eq!(filter.max_price, Some(25_050));
        assert_eq!(filter.sort, SortOrder::PriceDesc);
        assert_eq!(filter.page, 3);
        assert_eq!(filter.per_page, MAX_PER_PAGE);
        assert_eq!(filter.offset(), 2 * MAX_PER_PAGE as i64);
    }

    #[test]
    fn test_browse_query_rejects_inverted_price_range() {
        let query = BrowseQuery {
            min_price: Some("100".to_string()),
            max_price: Some("10".to_string()),
            ..Default::default()
        };
        assert!(parse_browse_query(&query).is_err());
    }

    #[test]
    fn test_browse_query_clamps_page() {
        let query = BrowseQuery {
            page: Some("0".to_string()),
            per_page: Some("0".to_string()),
            ..Default::default()
        };
        let filter = parse_browse_query(&query).unwrap();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.per_page, 1);
    }

    #[test]
    fn test_validate_checkout() {
        let ok = CheckoutRequest {
            shipping_address: "221B Baker Street, London".to_string(),
            contact_phone: "+44 20 7946 0958".to_string(),
            expected_total: None,
        };
        assert!(validate_checkout(&ok).is_ok());

        let bad = CheckoutRequest {
            shipping_address: "x".to_string(),
            contact_phone: "".to_string(),
            expected_total: None,
        };
        let err = validate_checkout(&bad).unwrap_err();
        assert_eq!(err.field_errors().unwrap().len(), 2);
    }
}
