//! Shared fixtures for receipt tests.

#![allow(dead_code)]

use iapguard_receipt::asn1::{
    encode_attributes, encode_ia5_string, encode_integer, encode_utf8_string,
};
use iapguard_receipt::purchase::{
    IAP_CANCELLATION_DATE, IAP_PRODUCT_ID, IAP_PURCHASE_DATE, IAP_QUANTITY, IAP_TRANSACTION_ID,
};
use iapguard_receipt::receipt::{
    ATTR_BUNDLE_ID, ATTR_BUNDLE_VERSION, ATTR_DIGEST, ATTR_IN_APP_PURCHASE, ATTR_OPAQUE_VALUE,
};
use iapguard_receipt::{AttributeRecord, ExpectedIdentity, device_digest};

pub const BUNDLE_ID: &str = "com.example.app";
pub const BUNDLE_VERSION: &str = "1.0";
pub const DEVICE_ID: [u8; 6] = [0x00, 0x1c, 0x42, 0x9a, 0x7e, 0x01];
pub const OPAQUE: [u8; 2] = [0x01, 0x02];
pub const PURCHASE_DATE: &str = "2014-03-01T12:00:00Z";

pub const IDENTITY: ExpectedIdentity = ExpectedIdentity::new(BUNDLE_ID, BUNDLE_VERSION);

/// How the digest attribute is produced.
#[derive(Debug, Clone)]
pub enum Digest {
    /// Computed over `DEVICE_ID`, the opaque value and the bundle id bytes.
    Computed,
    Explicit(Vec<u8>),
    Omitted,
}

/// Builds receipt payloads. Defaults describe a valid receipt for
/// `DEVICE_ID`.
#[derive(Debug, Clone)]
pub struct ReceiptBuilder {
    pub bundle_id: Option<String>,
    pub bundle_version: Option<String>,
    pub opaque: Option<Vec<u8>>,
    pub digest: Digest,
    pub extra: Vec<AttributeRecord>,
}

impl Default for ReceiptBuilder {
    fn default() -> Self {
        Self {
            bundle_id: Some(BUNDLE_ID.to_string()),
            bundle_version: Some(BUNDLE_VERSION.to_string()),
            opaque: Some(OPAQUE.to_vec()),
            digest: Digest::Computed,
            extra: Vec::new(),
        }
    }
}

impl ReceiptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundle_id(mut self, bundle_id: Option<&str>) -> Self {
        self.bundle_id = bundle_id.map(str::to_string);
        self
    }

    pub fn bundle_version(mut self, version: Option<&str>) -> Self {
        self.bundle_version = version.map(str::to_string);
        self
    }

    pub fn opaque(mut self, opaque: Option<&[u8]>) -> Self {
        self.opaque = opaque.map(<[u8]>::to_vec);
        self
    }

    pub fn digest(mut self, digest: Digest) -> Self {
        self.digest = digest;
        self
    }

    pub fn purchase(mut self, purchase: PurchaseFixture) -> Self {
        self.extra
            .push(AttributeRecord::new(ATTR_IN_APP_PURCHASE, 1, purchase.encode()));
        self
    }

    pub fn record(mut self, record: AttributeRecord) -> Self {
        self.extra.push(record);
        self
    }

    /// The encoded bundle id attribute value, as hashed.
    pub fn bundle_id_bytes(&self) -> Vec<u8> {
        self.bundle_id
            .as_deref()
            .map(encode_utf8_string)
            .unwrap_or_default()
    }

    /// The digest a genuine receipt for `DEVICE_ID` would carry.
    pub fn expected_digest(&self) -> [u8; 20] {
        device_digest(
            &DEVICE_ID,
            self.opaque.as_deref().unwrap_or_default(),
            &self.bundle_id_bytes(),
        )
    }

    pub fn records(&self) -> Vec<AttributeRecord> {
        let mut records = Vec::new();
        if self.bundle_id.is_some() {
            records.push(AttributeRecord::new(ATTR_BUNDLE_ID, 1, self.bundle_id_bytes()));
        }
        if let Some(version) = &self.bundle_version {
            records.push(AttributeRecord::new(
                ATTR_BUNDLE_VERSION,
                1,
                encode_utf8_string(version),
            ));
        }
        if let Some(opaque) = &self.opaque {
            records.push(AttributeRecord::new(ATTR_OPAQUE_VALUE, 1, opaque.clone()));
        }
        match &self.digest {
            Digest::Computed => records.push(AttributeRecord::new(
                ATTR_DIGEST,
                1,
                self.expected_digest().to_vec(),
            )),
            Digest::Explicit(bytes) => {
                records.push(AttributeRecord::new(ATTR_DIGEST, 1, bytes.clone()));
            }
            Digest::Omitted => {}
        }
        records.extend(self.extra.iter().cloned());
        records
    }

    pub fn build(&self) -> Vec<u8> {
        encode_attributes(&self.records())
    }
}

/// One nested in-app purchase.
#[derive(Debug, Clone)]
pub struct PurchaseFixture {
    pub product_id: Option<String>,
    pub quantity: Option<u64>,
    /// Encoded quantity value used instead of `quantity`.
    pub raw_quantity: Option<Vec<u8>>,
    pub purchase_date: Option<String>,
    pub cancellation_date: Option<String>,
    pub transaction_id: Option<String>,
}

impl PurchaseFixture {
    pub fn new(product_id: &str) -> Self {
        Self {
            product_id: Some(product_id.to_string()),
            quantity: Some(1),
            raw_quantity: None,
            purchase_date: Some(PURCHASE_DATE.to_string()),
            cancellation_date: None,
            transaction_id: Some("1000000101".to_string()),
        }
    }

    pub fn quantity(mut self, quantity: Option<u64>) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets the quantity attribute to an already-encoded INTEGER.
    pub fn raw_quantity(mut self, value: &[u8]) -> Self {
        self.raw_quantity = Some(value.to_vec());
        self
    }

    pub fn purchase_date(mut self, date: Option<&str>) -> Self {
        self.purchase_date = date.map(str::to_string);
        self
    }

    pub fn cancelled_at(mut self, date: &str) -> Self {
        self.cancellation_date = Some(date.to_string());
        self
    }

    pub fn without_product_id(mut self) -> Self {
        self.product_id = None;
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut records = Vec::new();
        if let Some(raw) = &self.raw_quantity {
            records.push(AttributeRecord::new(IAP_QUANTITY, 1, raw.clone()));
        } else if let Some(quantity) = self.quantity {
            records.push(AttributeRecord::new(IAP_QUANTITY, 1, encode_integer(quantity)));
        }
        if let Some(product_id) = &self.product_id {
            records.push(AttributeRecord::new(
                IAP_PRODUCT_ID,
                1,
                encode_utf8_string(product_id),
            ));
        }
        if let Some(transaction_id) = &self.transaction_id {
            records.push(AttributeRecord::new(
                IAP_TRANSACTION_ID,
                1,
                encode_utf8_string(transaction_id),
            ));
        }
        if let Some(date) = &self.purchase_date {
            records.push(AttributeRecord::new(
                IAP_PURCHASE_DATE,
                1,
                encode_ia5_string(date),
            ));
        }
        if let Some(date) = &self.cancellation_date {
            records.push(AttributeRecord::new(
                IAP_CANCELLATION_DATE,
                1,
                encode_ia5_string(date),
            ));
        }
        encode_attributes(&records)
    }
}
