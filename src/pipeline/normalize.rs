//! Repair: total, failure-free coercion of raw model output into receipts.
//!
//! The model's answer is untrusted. Before any field is interpreted it is
//! lifted into a [`RawField`] tag so that every coercion rule is an explicit
//! match over the JSON type it actually received, never an assumption about
//! the shape of a dynamic object.
//!
//! [`normalize`] cannot fail. Whatever the candidate looks like, the result
//! satisfies every receipt invariant:
//!
//! | field | rule |
//! |-------|------|
//! | id | trimmed text or number, else `receipt-{stamp}-{n}` |
//! | fileName | trimmed text, else the source document name |
//! | date | ISO date, optionally followed by a time of day (`/` separators accepted), else the processing date |
//! | vendor | trimmed text, else `Unknown` |
//! | category | case-insensitive enum match, else `other` |
//! | paymentMethod | enum match or alias, else `unknown` |
//! | taxAmount, amount | finite magnitude of a number or numeric string (symbol or code allowed), else `0` |
//! | currency | 3 letters uppercased or a known symbol, else `USD` |
//! | thumbnail, base64 | empty |
//! | mimeType | the batch media type |

use crate::receipt::{
    parse_iso_date, Category, PaymentMethod, ProcessedReceipt, DEFAULT_CURRENCY, UNKNOWN_VENDOR,
};
use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Per-invocation values the normaliser falls back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchContext {
    /// Name of the source document.
    pub file_name: String,
    /// Media type of the source document; every receipt carries it.
    pub mime_type: String,
    /// Used when a receipt's date is missing or unparseable.
    pub processed_on: NaiveDate,
    /// Milliseconds since the Unix epoch at submission; seeds generated ids.
    pub batch_stamp: i64,
}

impl BatchContext {
    pub fn new(
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        processed_on: NaiveDate,
        batch_stamp: i64,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            processed_on,
            batch_stamp,
        }
    }

    /// Context stamped with the current UTC time.
    pub fn now(file_name: impl Into<String>, mime_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self::new(file_name, mime_type, now.date_naive(), now.timestamp_millis())
    }

    /// Identifier for the entry at `index` (0-based) when the model gave none.
    pub fn generated_id(&self, index: usize) -> String {
        format!("receipt-{}-{}", self.batch_stamp, index + 1)
    }
}

// ── Tagged raw input ─────────────────────────────────────────────────────

/// One field of a candidate record, tagged by the JSON type it arrived as.
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    Missing,
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    /// Arrays and objects; never coerced to anything.
    Nested(Value),
}

impl RawField {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            None => RawField::Missing,
            Some(Value::Null) => RawField::Null,
            Some(Value::Bool(b)) => RawField::Bool(*b),
            Some(Value::Number(n)) => n.as_f64().map_or(RawField::Null, RawField::Number),
            Some(Value::String(s)) => RawField::Text(s.clone()),
            Some(other) => RawField::Nested(other.clone()),
        }
    }

    /// First key present in `object`, so camelCase wins over snake_case.
    fn lookup(object: Option<&Map<String, Value>>, keys: &[&str]) -> Self {
        let value = object.and_then(|o| keys.iter().find_map(|k| o.get(*k)));
        Self::from_value(value)
    }

    /// Non-empty trimmed text; finite numbers are rendered as text.
    pub fn text(&self) -> Option<String> {
        match self {
            RawField::Text(s) => {
                let t = s.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            RawField::Number(n) if n.is_finite() => Some(n.to_string()),
            _ => None,
        }
    }
}

/// A model-produced receipt before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    pub id: RawField,
    pub file_name: RawField,
    pub date: RawField,
    pub vendor: RawField,
    pub category: RawField,
    pub payment_method: RawField,
    pub tax_amount: RawField,
    pub amount: RawField,
    pub currency: RawField,
}

impl RawCandidate {
    /// Lift one array entry. Non-objects produce a candidate with every field missing.
    pub fn from_value(value: &Value) -> Self {
        let object = value.as_object();
        Self {
            id: RawField::lookup(object, &["id"]),
            file_name: RawField::lookup(object, &["fileName", "file_name"]),
            date: RawField::lookup(object, &["date"]),
            vendor: RawField::lookup(object, &["vendor"]),
            category: RawField::lookup(object, &["category"]),
            payment_method: RawField::lookup(object, &["paymentMethod", "payment_method"]),
            tax_amount: RawField::lookup(object, &["taxAmount", "tax_amount"]),
            amount: RawField::lookup(object, &["amount"]),
            currency: RawField::lookup(object, &["currency"]),
        }
    }
}

// ── Normalisation ────────────────────────────────────────────────────────

/// Coerce one candidate into a receipt. Total and side-effect free.
///
/// `index` is the candidate's 0-based position in the model's array; it only
/// feeds the generated id.
pub fn normalize(candidate: &RawCandidate, ctx: &BatchContext, index: usize) -> ProcessedReceipt {
    ProcessedReceipt {
        id: candidate
            .id
            .text()
            .unwrap_or_else(|| ctx.generated_id(index)),
        file_name: candidate
            .file_name
            .text()
            .unwrap_or_else(|| ctx.file_name.clone()),
        date: coerce_date(&candidate.date).unwrap_or(ctx.processed_on),
        vendor: candidate
            .vendor
            .text()
            .unwrap_or_else(|| UNKNOWN_VENDOR.to_string()),
        category: candidate
            .category
            .text()
            .and_then(|s| Category::parse(&s))
            .unwrap_or_default(),
        payment_method: candidate
            .payment_method
            .text()
            .and_then(|s| PaymentMethod::parse(&s))
            .unwrap_or_default(),
        tax_amount: coerce_amount(&candidate.tax_amount),
        amount: coerce_amount(&candidate.amount),
        currency: coerce_currency(&candidate.currency),
        thumbnail: String::new(),
        base64: String::new(),
        mime_type: ctx.mime_type.clone(),
    }
}

/// Normalise every entry of the model's array, preserving order.
///
/// Ids repeated within the batch are replaced by the generated id for that
/// position so the result is unique.
pub fn repair(entries: &[Value], ctx: &BatchContext) -> Vec<ProcessedReceipt> {
    let mut seen = HashSet::with_capacity(entries.len());
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let mut receipt = normalize(&RawCandidate::from_value(entry), ctx, index);
            if seen.contains(&receipt.id) {
                let base = ctx.generated_id(index);
                let mut id = base.clone();
                let mut suffix = 1;
                while seen.contains(&id) {
                    suffix += 1;
                    id = format!("{base}-{suffix}");
                }
                receipt.id = id;
            }
            seen.insert(receipt.id.clone());
            receipt
        })
        .collect()
}

static RE_TIME_OF_DAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$").unwrap()
});

fn coerce_date(field: &RawField) -> Option<NaiveDate> {
    let text = field.text()?;
    // A timestamp may follow the date; anything else disqualifies it.
    let (head, rest) = text.split_at_checked(10)?;
    if !rest.is_empty() && !RE_TIME_OF_DAY.is_match(rest) {
        return None;
    }
    parse_iso_date(head).or_else(|| {
        if head.contains('-') {
            return None;
        }
        parse_iso_date(&head.replace('/', "-"))
    })
}

static RE_GROUPED_THOUSANDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(,\d{3})+(\.\d+)?$").unwrap());

static RE_CODE_AFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Z]{3}\s*)?(?P<amount>.*?)(?:\s*[A-Z]{3})?$").unwrap());

const CURRENCY_SYMBOLS: [(&str, &str); 5] = [
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("₺", "TRY"),
    ("د.إ", "AED"),
];

/// Finite magnitude of a number or fully numeric string; `0` otherwise.
pub fn coerce_amount(field: &RawField) -> f64 {
    let value = match field {
        RawField::Number(n) => Some(*n),
        RawField::Text(s) => parse_amount(s),
        _ => None,
    };
    value.filter(|v| v.is_finite()).map_or(0.0, f64::abs)
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s.strip_prefix('+').unwrap_or(s).trim_start()),
    }
}

fn parse_amount(raw: &str) -> Option<f64> {
    let (negative, s) = split_sign(raw.trim());
    let mut s = RE_CODE_AFFIX
        .captures(s)
        .and_then(|c| c.name("amount"))
        .map_or(s, |m| m.as_str());
    for (symbol, _) in CURRENCY_SYMBOLS {
        if let Some(rest) = s.strip_prefix(symbol) {
            s = rest.trim_start();
        } else if let Some(rest) = s.strip_suffix(symbol) {
            s = rest.trim_end();
        }
    }
    let (inner_negative, s) = split_sign(s);
    if s.is_empty() {
        return None;
    }
    let cleaned = if RE_GROUPED_THOUSANDS.is_match(s) {
        s.replace(',', "")
    } else {
        s.to_string()
    };
    // `f64::from_str` also accepts "inf" and "NaN"; the caller filters those.
    let value = cleaned.parse::<f64>().ok()?;
    Some(if negative != inner_negative { -value } else { value })
}

/// Three-letter code uppercased, a known symbol mapped, `USD` otherwise.
pub fn coerce_currency(field: &RawField) -> String {
    let Some(text) = field.text() else {
        return DEFAULT_CURRENCY.to_string();
    };
    if let Some((_, code)) = CURRENCY_SYMBOLS.iter().find(|(sym, _)| *sym == text) {
        return code.to_string();
    }
    if text.len() == 3 && text.chars().all(|c| c.is_ascii_alphabetic()) {
        return text.to_ascii_uppercase();
    }
    DEFAULT_CURRENCY.to_string()
}
