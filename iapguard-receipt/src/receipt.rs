//! Receipt payload decoding and validation.
//!
//! Validation is fail-closed: the payload must name this bundle, and the
//! embedded device digest must match one recomputed from this machine's
//! identifier. In-app purchases are only granted once every check has
//! passed.

use crate::asn1::{decode_attributes, decode_utf8_string, first_occurrences};
use crate::config::{ExpectedIdentity, ValidationPolicy};
use crate::device::{DEVICE_DIGEST_LEN, device_digest};
use crate::error::{DecodeError, IdentityError, ReceiptError, ReceiptResult};
use crate::purchase::{InAppPurchaseRecord, parse_in_app_purchase, parse_receipt_date};
use chrono::{DateTime, Utc};
use iapguard_types::PurchasedProducts;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const ATTR_BUNDLE_ID: u64 = 2;
pub const ATTR_BUNDLE_VERSION: u64 = 3;
pub const ATTR_OPAQUE_VALUE: u64 = 4;
pub const ATTR_DIGEST: u64 = 5;
pub const ATTR_CREATION_DATE: u64 = 12;
pub const ATTR_IN_APP_PURCHASE: u64 = 17;
pub const ATTR_ORIGINAL_APPLICATION_VERSION: u64 = 19;
pub const ATTR_EXPIRATION_DATE: u64 = 21;

/// Everything a single scan over a payload extracts.
///
/// Unique attribute types take their first occurrence; in-app purchase
/// attributes may repeat and are each parsed independently.
#[derive(Debug, Clone, Default)]
pub struct ReceiptContents {
    pub bundle_id: Option<String>,
    /// The bundle identifier attribute value exactly as encoded: the whole
    /// UTF8String element, tag and length octets included
    /// (`0c 0f com.example.app`), not just the text. This is what the
    /// device digest covers.
    pub bundle_id_bytes: Option<Vec<u8>>,
    pub bundle_version: Option<String>,
    pub original_application_version: Option<String>,
    pub opaque_value: Option<Vec<u8>>,
    pub digest: Option<Vec<u8>>,
    pub creation_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub in_app_purchases: Vec<InAppPurchaseRecord>,
    /// In-app purchase attributes that did not yield a valid record.
    pub discarded_purchases: usize,
}

impl ReceiptContents {
    /// Decodes and scans a payload.
    ///
    /// # Errors
    ///
    /// Fails only if the outer attribute set is malformed.
    pub fn parse(payload: &[u8]) -> Result<Self, DecodeError> {
        let records = decode_attributes(payload)?;
        let mut contents = Self::default();

        for record in first_occurrences(&records, &[ATTR_IN_APP_PURCHASE]) {
            let value = record.value.as_slice();
            match record.attribute_type {
                ATTR_BUNDLE_ID => {
                    contents.bundle_id = decode_utf8_string(value);
                    contents.bundle_id_bytes = Some(value.to_vec());
                }
                ATTR_BUNDLE_VERSION => contents.bundle_version = decode_utf8_string(value),
                ATTR_OPAQUE_VALUE => contents.opaque_value = Some(value.to_vec()),
                ATTR_DIGEST => contents.digest = Some(value.to_vec()),
                ATTR_CREATION_DATE => contents.creation_date = parse_receipt_date(value),
                ATTR_EXPIRATION_DATE => contents.expiration_date = parse_receipt_date(value),
                ATTR_ORIGINAL_APPLICATION_VERSION => {
                    contents.original_application_version = decode_utf8_string(value);
                }
                ATTR_IN_APP_PURCHASE => match parse_in_app_purchase(value) {
                    Some(purchase) => contents.in_app_purchases.push(purchase),
                    None => contents.discarded_purchases += 1,
                },
                other => debug!("Skipping receipt attribute type {other}"),
            }
        }

        let duplicates = records.len()
            - first_occurrences(&records, &[ATTR_IN_APP_PURCHASE]).count();
        if duplicates > 0 {
            debug!("Ignored {duplicates} duplicate receipt attributes");
        }

        Ok(contents)
    }

    /// The fields the device-binding check needs.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiptError::MissingField`] naming the first absent field,
    /// or [`ReceiptError::HashMismatch`] if the digest has the wrong length.
    pub fn identity(&self) -> ReceiptResult<ReceiptIdentity<'_>> {
        let bundle_id = self
            .bundle_id
            .as_deref()
            .ok_or(ReceiptError::MissingField("bundle identifier"))?;
        let bundle_id_bytes = self
            .bundle_id_bytes
            .as_deref()
            .ok_or(ReceiptError::MissingField("bundle identifier"))?;
        let opaque_value = self
            .opaque_value
            .as_deref()
            .ok_or(ReceiptError::MissingField("opaque value"))?;
        let digest = self
            .digest
            .as_deref()
            .ok_or(ReceiptError::MissingField("digest"))?;
        let digest: &[u8; DEVICE_DIGEST_LEN] = digest.try_into().map_err(|_| {
            ReceiptError::HashMismatch(format!(
                "digest is {} bytes, expected {DEVICE_DIGEST_LEN}",
                digest.len()
            ))
        })?;

        Ok(ReceiptIdentity {
            bundle_id,
            bundle_id_bytes,
            bundle_version: self.bundle_version.as_deref(),
            opaque_value,
            digest,
        })
    }
}

/// Borrowed view of the identity fields of a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptIdentity<'a> {
    pub bundle_id: &'a str,
    pub bundle_id_bytes: &'a [u8],
    pub bundle_version: Option<&'a str>,
    pub opaque_value: &'a [u8],
    pub digest: &'a [u8; DEVICE_DIGEST_LEN],
}

impl ReceiptIdentity<'_> {
    /// Returns true if the embedded digest was issued for `device_id`.
    #[must_use]
    pub fn matches_device(&self, device_id: &[u8]) -> bool {
        device_digest(device_id, self.opaque_value, self.bundle_id_bytes) == *self.digest
    }
}

/// Summary of a receipt that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedReceipt {
    pub bundle_id: String,
    pub bundle_version: Option<String>,
    pub original_application_version: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    /// Every valid in-app purchase record, cancelled ones included.
    pub in_app_purchases: Vec<InAppPurchaseRecord>,
}

impl ValidatedReceipt {
    /// Product identifiers this receipt entitles.
    pub fn entitled_products(&self) -> impl Iterator<Item = &str> {
        self.in_app_purchases
            .iter()
            .filter(|p| p.is_entitled())
            .map(|p| p.product_id.as_str())
    }
}

/// Checks decoded payloads against this binary and this machine.
#[derive(Debug, Clone)]
pub struct ReceiptValidator {
    expected: ExpectedIdentity,
    policy: ValidationPolicy,
    products: PurchasedProducts,
}

impl ReceiptValidator {
    /// Creates a validator that grants purchases into `products`.
    pub fn new(
        expected: ExpectedIdentity,
        policy: ValidationPolicy,
        products: PurchasedProducts,
    ) -> Self {
        Self {
            expected,
            policy,
            products,
        }
    }

    /// Returns the expected identity.
    pub fn expected(&self) -> &ExpectedIdentity {
        &self.expected
    }

    /// Returns the policy.
    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    /// Validates an authenticated payload for `device_id`.
    ///
    /// On success every non-cancelled in-app purchase is inserted into the
    /// purchased-product set. On failure nothing is inserted.
    ///
    /// # Errors
    ///
    /// Any error means the receipt must not be trusted.
    pub fn validate(&self, payload: &[u8], device_id: &[u8]) -> ReceiptResult<ValidatedReceipt> {
        let contents = ReceiptContents::parse(payload)?;

        let bundle_id = contents
            .bundle_id
            .as_deref()
            .ok_or(ReceiptError::MissingField("bundle identifier"))?;
        if bundle_id != &*self.expected.bundle_id {
            return Err(IdentityError::BundleIdMismatch {
                expected: self.expected.bundle_id.to_string(),
                found: bundle_id.to_string(),
            }
            .into());
        }

        self.check_bundle_version(contents.bundle_version.as_deref())?;

        let identity = contents.identity()?;
        if !identity.matches_device(device_id) {
            return Err(ReceiptError::HashMismatch(
                "digest does not match this device".to_string(),
            ));
        }

        let receipt = ValidatedReceipt {
            bundle_id: bundle_id.to_string(),
            bundle_version: contents.bundle_version.clone(),
            original_application_version: contents.original_application_version.clone(),
            creation_date: contents.creation_date,
            in_app_purchases: contents.in_app_purchases,
        };

        for purchase in &receipt.in_app_purchases {
            if purchase.is_entitled() {
                self.products.insert(purchase.product_id.as_str());
            } else {
                info!("Ignoring cancelled purchase of {}", purchase.product_id);
            }
        }
        if contents.discarded_purchases > 0 {
            warn!(
                "Discarded {} invalid in-app purchase records",
                contents.discarded_purchases
            );
        }

        info!(
            "Receipt validated for {} ({} in-app purchases)",
            receipt.bundle_id,
            receipt.in_app_purchases.len()
        );
        Ok(receipt)
    }

    fn check_bundle_version(&self, found: Option<&str>) -> ReceiptResult<()> {
        let expected: &str = &self.expected.bundle_version;
        match found {
            Some(version) if version == expected => Ok(()),
            _ if !self.policy.enforce_bundle_version => {
                warn!(
                    "Receipt bundle version {} does not match {expected}; continuing",
                    found.unwrap_or("<missing>")
                );
                Ok(())
            }
            Some(version) => Err(IdentityError::BundleVersionMismatch {
                expected: expected.to_string(),
                found: version.to_string(),
            }
            .into()),
            None => Err(ReceiptError::MissingField("bundle version")),
        }
    }
}
