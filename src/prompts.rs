//! Prompts and the response schema for receipt extraction.
//!
//! Everything the model is told lives here so prompt changes never touch
//! the validation or repair logic. Callers can override the instructions via
//! [`crate::config::ExtractionConfig::instructions`]; the schema is fixed.

use crate::pipeline::normalize::BatchContext;
use crate::receipt::{Category, PaymentMethod};
use serde_json::{json, Value};

/// System prompt sent ahead of the per-document instructions.
pub const SYSTEM_PROMPT: &str = "You extract structured data from receipt images and PDFs. \
Reply with a single JSON object and nothing else: no prose, no Markdown fences.";

/// Vendor → category hints appended to the instructions.
pub const CATEGORY_HINTS: &str = "Walmart/Target/Costco=groceries, McDonald's/Starbucks=dining, \
Shell/BP=gas, CVS=healthcare, Best Buy=electronics";

/// Currency symbol → code hints appended to the instructions.
pub const CURRENCY_HINTS: &str = "$=USD, €=EUR, £=GBP, ₺=TRY, د.إ=AED";

/// Build the extraction instructions for one document.
///
/// The example record is filled with the values the pipeline would use as
/// defaults (id pattern, file name, media type) so a compliant answer needs
/// no repair. Ids are numbered per entry; one shared id fails validation.
pub fn extraction_instructions(ctx: &BatchContext) -> String {
    let categories = Category::ALL.map(Category::as_str).join("|");
    let payments = PaymentMethod::ALL
        .iter()
        .filter(|m| **m != PaymentMethod::Unknown)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("|");

    format!(
        r#"Extract receipt data from this document and return JSON.

Format:
{{
  "receipts": [{{
    "id": "{id_prefix}<n>",
    "fileName": "{file_name}",
    "date": "YYYY-MM-DD",
    "vendor": "store name",
    "category": "{categories}",
    "paymentMethod": "{payments}",
    "taxAmount": 5.50,
    "amount": 75.50,
    "currency": "USD",
    "thumbnail": "",
    "base64": "",
    "mimeType": "{mime_type}"
  }}]
}}

Return one entry per receipt found in the document, numbering ids from 1 ({first_id}, {second_id}, ...). Amounts are plain numbers without currency symbols.

Categories: {CATEGORY_HINTS}
Currency: {CURRENCY_HINTS}"#,
        id_prefix = format!("receipt-{}-", ctx.batch_stamp),
        first_id = ctx.generated_id(0),
        second_id = ctx.generated_id(1),
        file_name = ctx.file_name,
        mime_type = ctx.mime_type,
    )
}

/// JSON Schema of the expected response object.
pub fn receipt_schema() -> Value {
    let categories: Vec<&str> = Category::ALL.iter().map(|c| c.as_str()).collect();
    let payments: Vec<&str> = PaymentMethod::ALL.iter().map(|m| m.as_str()).collect();

    json!({
        "type": "object",
        "required": ["receipts"],
        "properties": {
            "receipts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": [
                        "id", "fileName", "date", "vendor", "category", "paymentMethod",
                        "taxAmount", "amount", "currency", "thumbnail", "base64", "mimeType"
                    ],
                    "properties": {
                        "id": { "type": "string", "minLength": 1 },
                        "fileName": { "type": "string", "minLength": 1 },
                        "date": { "type": "string", "format": "date" },
                        "vendor": { "type": "string", "minLength": 1 },
                        "category": { "type": "string", "enum": categories },
                        "paymentMethod": { "type": "string", "enum": payments },
                        "taxAmount": { "type": "number", "minimum": 0 },
                        "amount": { "type": "number", "minimum": 0 },
                        "currency": { "type": "string", "pattern": "^[A-Z]{3}$" },
                        "thumbnail": { "type": "string" },
                        "base64": { "type": "string" },
                        "mimeType": { "type": "string" }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ctx() -> BatchContext {
        BatchContext::new(
            "costco.pdf",
            "application/pdf",
            NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            1_700_000_000_000,
        )
    }

    #[test]
    fn instructions_embed_document_defaults() {
        let text = extraction_instructions(&ctx());
        assert!(text.contains(r#""fileName": "costco.pdf""#));
        assert!(text.contains(r#""mimeType": "application/pdf""#));
        assert!(text.contains(r#""id": "receipt-1700000000000-<n>""#));
        assert!(text.contains("(receipt-1700000000000-1, receipt-1700000000000-2, ...)"));
        assert!(text.contains("groceries|dining|gas"));
        assert!(text.contains("gift card|digital wallet"));
        assert!(!text.contains("|unknown"));
        assert!(text.contains("Best Buy=electronics"));
    }

    #[test]
    fn schema_lists_closed_enums() {
        let schema = receipt_schema();
        let item = &schema["properties"]["receipts"]["items"];
        assert_eq!(item["properties"]["category"]["enum"].as_array().unwrap().len(), 12);
        assert_eq!(item["required"].as_array().unwrap().len(), 12);
    }
}
