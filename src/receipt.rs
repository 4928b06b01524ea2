//! The validated receipt record and its closed enumerations.
//!
//! Field names serialise in camelCase because the record is consumed as-is
//! by the HTTP layer and the browser UI (`fileName`, `paymentMethod`, …).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor name used when the model reported none.
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// Currency used when the model reported none or an unrecognisable one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// One extracted receipt line-item.
///
/// Constructed exactly once, either by deserialising a schema-conformant
/// model response or by [`crate::pipeline::normalize::normalize`]; never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedReceipt {
    pub id: String,
    pub file_name: String,
    /// `YYYY-MM-DD` on the wire, in both directions.
    #[serde(with = "iso_date")]
    pub date: NaiveDate,
    pub vendor: String,
    pub category: Category,
    pub payment_method: PaymentMethod,
    /// Reported tax sub-amount. Whether it is included in `amount` is not
    /// known, so nothing in this crate adds or subtracts it.
    pub tax_amount: f64,
    /// Receipt total.
    pub amount: f64,
    /// ISO 4217 code the document was denominated in. Never converted.
    pub currency: String,
    pub thumbnail: String,
    pub base64: String,
    pub mime_type: String,
}

/// Parse a calendar date written exactly as `YYYY-MM-DD`.
///
/// Unpadded fields, signs, surrounding whitespace and trailing text are all
/// rejected, unlike `NaiveDate`'s own `FromStr`.
pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    let bytes = text.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { *b == b'-' } else { b.is_ascii_digit() });
    if !well_formed {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

mod iso_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format("%Y-%m-%d"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_iso_date(&text)
            .ok_or_else(|| de::Error::custom(format!("expected a YYYY-MM-DD date, got {text:?}")))
    }
}

/// Spending category. Closed set; anything unrecognised is [`Category::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Groceries,
    Dining,
    Gas,
    Healthcare,
    Shopping,
    Electronics,
    Home,
    Clothing,
    Utilities,
    Entertainment,
    Travel,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 12] = [
        Category::Groceries,
        Category::Dining,
        Category::Gas,
        Category::Healthcare,
        Category::Shopping,
        Category::Electronics,
        Category::Home,
        Category::Clothing,
        Category::Utilities,
        Category::Entertainment,
        Category::Travel,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Groceries => "groceries",
            Category::Dining => "dining",
            Category::Gas => "gas",
            Category::Healthcare => "healthcare",
            Category::Shopping => "shopping",
            Category::Electronics => "electronics",
            Category::Home => "home",
            Category::Clothing => "clothing",
            Category::Utilities => "utilities",
            Category::Entertainment => "entertainment",
            Category::Travel => "travel",
            Category::Other => "other",
        }
    }

    /// Case-insensitive lookup; `None` for anything outside the closed set.
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|c| c.as_str() == wanted)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the receipt was paid.
///
/// `Unknown` is a first-class member so that a repaired record still
/// belongs to the declared set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "cash")]
    Cash,
    #[serde(rename = "credit")]
    Credit,
    #[serde(rename = "debit")]
    Debit,
    #[serde(rename = "check")]
    Check,
    #[serde(rename = "gift card")]
    GiftCard,
    #[serde(rename = "digital wallet")]
    DigitalWallet,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 7] = [
        PaymentMethod::Cash,
        PaymentMethod::Credit,
        PaymentMethod::Debit,
        PaymentMethod::Check,
        PaymentMethod::GiftCard,
        PaymentMethod::DigitalWallet,
        PaymentMethod::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Debit => "debit",
            PaymentMethod::Check => "check",
            PaymentMethod::GiftCard => "gift card",
            PaymentMethod::DigitalWallet => "digital wallet",
            PaymentMethod::Unknown => "unknown",
        }
    }

    /// Lenient lookup accepting the canonical names plus the spellings
    /// models tend to produce ("credit card", "gift_card", "Apple Pay").
    pub fn parse(s: &str) -> Option<Self> {
        let folded = s
            .trim()
            .to_ascii_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let method = match folded.as_str() {
            "cash" => PaymentMethod::Cash,
            "credit" | "credit card" => PaymentMethod::Credit,
            "debit" | "debit card" => PaymentMethod::Debit,
            "check" | "cheque" => PaymentMethod::Check,
            "gift card" | "giftcard" => PaymentMethod::GiftCard,
            "digital wallet" | "apple pay" | "google pay" | "mobile wallet" => {
                PaymentMethod::DigitalWallet
            }
            "unknown" => PaymentMethod::Unknown,
            _ => return None,
        };
        Some(method)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ "receipts": [...] }` — the success body returned to the route layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptBatch {
    pub receipts: Vec<ProcessedReceipt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(Category::parse("Groceries"), Some(Category::Groceries));
        assert_eq!(Category::parse("  DINING "), Some(Category::Dining));
        assert_eq!(Category::parse("snacks"), None);
        assert_eq!(Category::parse(""), None);
    }

    #[test]
    fn iso_dates_must_be_exact() {
        assert_eq!(parse_iso_date("2024-02-29"), NaiveDate::from_ymd_opt(2024, 2, 29));
        for bad in ["2023-02-29", "2024-2-29", "+2024-02-29", "2024-02-29 ", " 2024-02-29", "2024/02/29", ""] {
            assert_eq!(parse_iso_date(bad), None, "{bad:?}");
        }
    }

    #[test]
    fn payment_aliases() {
        assert_eq!(PaymentMethod::parse("Credit Card"), Some(PaymentMethod::Credit));
        assert_eq!(PaymentMethod::parse("gift_card"), Some(PaymentMethod::GiftCard));
        assert_eq!(
            PaymentMethod::parse("Apple  Pay"),
            Some(PaymentMethod::DigitalWallet)
        );
        assert_eq!(PaymentMethod::parse("barter"), None);
    }

    #[test]
    fn serialises_camel_case_with_spaced_enum_names() {
        let receipt = ProcessedReceipt {
            id: "receipt-1".into(),
            file_name: "walmart.pdf".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            vendor: "Walmart".into(),
            category: Category::Groceries,
            payment_method: PaymentMethod::GiftCard,
            tax_amount: 5.5,
            amount: 75.5,
            currency: "USD".into(),
            thumbnail: String::new(),
            base64: String::new(),
            mime_type: "application/pdf".into(),
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["fileName"], "walmart.pdf");
        assert_eq!(json["date"], "2024-03-09");
        assert_eq!(json["paymentMethod"], "gift card");
        assert_eq!(json["taxAmount"], 5.5);
        assert_eq!(json["mimeType"], "application/pdf");
    }
}
