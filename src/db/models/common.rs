//! Common types and utilities shared across models.

use serde::Serialize;

/// Declares a closed set of lowercase text values stored in a TEXT column.
///
/// Generates `ALL`, `as_str`, `label`, `parse`, `Display` and serde impls
/// matching the stored representation.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => ($value:literal, $label:literal)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }

            /// Human-readable label for forms and listings
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                $name::parse(&value).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} '{}'",
                        stringify!($name),
                        value
                    ))
                })
            }
        }
    };
}

pub(crate) use text_enum;

/// One page of results from a `LIMIT`/`OFFSET` query
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, per_page: u32) -> Self {
        let total_pages = if total <= 0 {
            0
        } else {
            ((total as u64 + per_page as u64 - 1) / per_page as u64) as u32
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

/// Render an amount in cents as `$1,234.50`
pub fn format_price(cents: i64) -> String {
    let negative = cents < 0;
    let abs = cents.unsigned_abs();
    let whole = (abs / 100).to_string();
    let fraction = abs % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}.{:02}", if negative { "-" } else { "" }, grouped, fraction)
}

/// Render cents as a plain decimal (`1234.50`) for form inputs
pub fn cents_to_decimal(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        let page: Page<u8> = Page::new(vec![], 25, 1, 12);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(!page.has_previous());

        let last: Page<u8> = Page::new(vec![], 24, 2, 12);
        assert_eq!(last.total_pages, 2);
        assert!(!last.has_next());
        assert!(last.has_previous());

        let empty: Page<u8> = Page::new(vec![], 0, 1, 12);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next());
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(0), "$0.00");
        assert_eq!(format_price(5), "$0.05");
        assert_eq!(format_price(1250), "$12.50");
        assert_eq!(format_price(123_456_789), "$1,234,567.89");
        assert_eq!(format_price(100_000), "$1,000.00");
    }

    #[test]
    fn test_cents_to_decimal() {
        assert_eq!(cents_to_decimal(1999), "19.99");
        assert_eq!(cents_to_decimal(700), "7.00");
    }
}
