//! Report types and commands behind the `iapguard` binary.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use iapguard_receipt::asn1::encode_utf8_string;
use iapguard_receipt::{
    DeviceIdentityProvider, ExpectedIdentity, InAppPurchaseRecord, ReceiptContents,
    ReceiptValidator, ValidatedReceipt, ValidationPolicy, device_digest,
};
use iapguard_types::{EntitlementSnapshot, PurchasedProducts};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// What `inspect` prints for a payload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InspectReport {
    pub bundle_id: Option<String>,
    pub bundle_version: Option<String>,
    pub original_application_version: Option<String>,
    pub creation_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub has_opaque_value: bool,
    pub has_digest: bool,
    pub in_app_purchases: Vec<InAppPurchaseRecord>,
    pub discarded_purchases: usize,
}

impl From<ReceiptContents> for InspectReport {
    fn from(contents: ReceiptContents) -> Self {
        Self {
            bundle_id: contents.bundle_id,
            bundle_version: contents.bundle_version,
            original_application_version: contents.original_application_version,
            creation_date: contents.creation_date,
            expiration_date: contents.expiration_date,
            has_opaque_value: contents.opaque_value.is_some(),
            has_digest: contents.digest.is_some(),
            in_app_purchases: contents.in_app_purchases,
            discarded_purchases: contents.discarded_purchases,
        }
    }
}

impl InspectReport {
    /// Human-readable rendering, one field per line.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InspectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn or_missing(value: Option<&str>) -> &str {
            value.unwrap_or("<missing>")
        }

        writeln!(f, "bundle id:        {}", or_missing(self.bundle_id.as_deref()))?;
        writeln!(f, "bundle version:   {}", or_missing(self.bundle_version.as_deref()))?;
        writeln!(
            f,
            "original version: {}",
            or_missing(self.original_application_version.as_deref())
        )?;
        if let Some(date) = self.creation_date {
            writeln!(f, "created:          {}", date.to_rfc3339())?;
        }
        if let Some(date) = self.expiration_date {
            writeln!(f, "expires:          {}", date.to_rfc3339())?;
        }
        writeln!(f, "opaque value:     {}", present(self.has_opaque_value))?;
        writeln!(f, "digest:           {}", present(self.has_digest))?;
        writeln!(f, "in-app purchases: {}", self.in_app_purchases.len())?;
        for purchase in &self.in_app_purchases {
            write!(
                f,
                "  {} x{} on {}",
                purchase.product_id,
                purchase.quantity,
                purchase.purchase_date.to_rfc3339()
            )?;
            if let Some(cancelled) = purchase.cancellation_date {
                write!(f, " (cancelled {})", cancelled.to_rfc3339())?;
            }
            writeln!(f)?;
        }
        if self.discarded_purchases > 0 {
            writeln!(f, "discarded:        {}", self.discarded_purchases)?;
        }
        Ok(())
    }
}

fn present(flag: bool) -> &'static str {
    if flag { "present" } else { "<missing>" }
}

/// Decodes an unwrapped receipt payload file.
pub fn inspect_file(path: &Path) -> Result<InspectReport> {
    let payload =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    debug!("Read {} payload bytes", payload.len());
    let contents = ReceiptContents::parse(&payload).context("decoding receipt payload")?;
    Ok(contents.into())
}

/// Parses a hex argument, tolerating `:` separators.
pub fn parse_hex(arg: &str) -> Result<Vec<u8>> {
    let cleaned: String = arg.chars().filter(|c| *c != ':').collect();
    hex::decode(&cleaned).with_context(|| format!("invalid hex: {arg}"))
}

/// The device-binding digest, in hex.
///
/// `bundle_id` is encoded the way receipts carry it, as a UTF8String.
pub fn digest_hex(device_id: &[u8], opaque: &[u8], bundle_id: &str) -> String {
    let bundle_id_bytes = encode_utf8_string(bundle_id);
    hex::encode(device_digest(device_id, opaque, &bundle_id_bytes))
}

/// This machine's device identifier, in hex.
pub fn device_id_hex(provider: &dyn DeviceIdentityProvider) -> Result<String> {
    let id = provider.current_device_id()?;
    if id.is_empty() {
        bail!("device identifier is empty");
    }
    Ok(hex::encode(id))
}

/// Outcome of `check`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct CheckReport {
    pub receipt: ValidatedReceipt,
    pub entitlements: EntitlementSnapshot,
}

/// Runs full payload validation against an expected identity and device.
pub fn check_file(
    path: &Path,
    expected: ExpectedIdentity,
    device_id: &[u8],
) -> Result<CheckReport> {
    let payload =
        std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let products = PurchasedProducts::new();
    let validator = ReceiptValidator::new(expected, ValidationPolicy::strict(), products.clone());
    let receipt = validator.validate(&payload, device_id)?;
    Ok(CheckReport {
        receipt,
        entitlements: products.snapshot(),
    })
}
