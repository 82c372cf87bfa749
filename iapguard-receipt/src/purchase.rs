//! In-app purchase records nested inside a receipt.
//!
//! Each in-app purchase attribute holds its own attribute set. A record that
//! cannot be decoded, or lacks a product identifier, purchase date or
//! positive quantity, is not an entitlement and is dropped without failing
//! the receipt.

use crate::asn1::{
    decode_attributes, decode_ia5_string, decode_signed_integer, decode_utf8_string,
    first_occurrences,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const IAP_QUANTITY: u64 = 1701;
pub const IAP_PRODUCT_ID: u64 = 1702;
pub const IAP_TRANSACTION_ID: u64 = 1703;
pub const IAP_PURCHASE_DATE: u64 = 1704;
pub const IAP_ORIGINAL_TRANSACTION_ID: u64 = 1705;
pub const IAP_ORIGINAL_PURCHASE_DATE: u64 = 1706;
pub const IAP_SUBSCRIPTION_EXPIRATION_DATE: u64 = 1708;
pub const IAP_CANCELLATION_DATE: u64 = 1712;

/// A valid in-app purchase record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InAppPurchaseRecord {
    pub product_id: String,
    pub quantity: u64,
    pub purchase_date: DateTime<Utc>,
    pub transaction_id: Option<String>,
    pub original_transaction_id: Option<String>,
    pub original_purchase_date: Option<DateTime<Utc>>,
    pub subscription_expiration_date: Option<DateTime<Utc>>,
    pub cancellation_date: Option<DateTime<Utc>>,
}

impl InAppPurchaseRecord {
    /// A cancelled purchase (refunded by the store) grants nothing.
    #[must_use]
    pub fn is_entitled(&self) -> bool {
        self.cancellation_date.is_none()
    }
}

/// Parses an RFC 3339 receipt date.
pub(crate) fn parse_receipt_date(value: &[u8]) -> Option<DateTime<Utc>> {
    let text = decode_ia5_string(value)?;
    DateTime::parse_from_rfc3339(&text)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// Parses the value of one in-app purchase attribute.
///
/// Returns `None` for anything that is not a valid purchase.
#[must_use]
pub fn parse_in_app_purchase(value: &[u8]) -> Option<InAppPurchaseRecord> {
    let records = match decode_attributes(value) {
        Ok(records) => records,
        Err(e) => {
            debug!("Discarding undecodable in-app purchase record: {e}");
            return None;
        }
    };

    let mut product_id = None;
    let mut quantity = None;
    let mut purchase_date = None;
    let mut transaction_id = None;
    let mut original_transaction_id = None;
    let mut original_purchase_date = None;
    let mut subscription_expiration_date = None;
    let mut cancellation_date = None;

    for record in first_occurrences(&records, &[]) {
        let value = record.value.as_slice();
        match record.attribute_type {
            IAP_QUANTITY => quantity = decode_signed_integer(value),
            IAP_PRODUCT_ID => product_id = decode_utf8_string(value),
            IAP_TRANSACTION_ID => transaction_id = decode_utf8_string(value),
            IAP_PURCHASE_DATE => purchase_date = parse_receipt_date(value),
            IAP_ORIGINAL_TRANSACTION_ID => original_transaction_id = decode_utf8_string(value),
            IAP_ORIGINAL_PURCHASE_DATE => original_purchase_date = parse_receipt_date(value),
            IAP_SUBSCRIPTION_EXPIRATION_DATE => {
                subscription_expiration_date = parse_receipt_date(value);
            }
            IAP_CANCELLATION_DATE => cancellation_date = parse_receipt_date(value),
            _ => {}
        }
    }

    let Some(product_id) = product_id else {
        debug!("Discarding in-app purchase without product identifier");
        return None;
    };
    let Some(purchase_date) = purchase_date else {
        debug!("Discarding in-app purchase of {product_id} without purchase date");
        return None;
    };
    let quantity = match quantity.and_then(|q| u64::try_from(q).ok()) {
        Some(q) if q > 0 => q,
        _ => {
            debug!("Discarding in-app purchase of {product_id} with non-positive quantity");
            return None;
        }
    };

    Some(InAppPurchaseRecord {
        product_id,
        quantity,
        purchase_date,
        transaction_id,
        original_transaction_id,
        original_purchase_date,
        subscription_expiration_date,
        cancellation_date,
    })
}
