//! Receipt validation for iapguard.
//!
//! This crate handles:
//! - Decoding the receipt's ASN.1 attribute set
//! - Binding the receipt to this machine with a SHA-1 device digest
//! - Checking the bundle identity the receipt was issued for
//! - Extracting in-app purchases and granting them as entitlements
//!
//! # Design Principles
//!
//! - **Fail closed**: any envelope, identity or digest failure rejects the
//!   receipt, and [`validate_or_exit`] terminates the process
//! - **Local recovery for purchases**: a malformed in-app purchase record is
//!   dropped, never fatal
//! - **Collaborators behind traits**: envelope signature checking, code
//!   signature checking and the device identifier are supplied by the host
//!
//! # Startup
//!
//! ```no_run
//! use iapguard_receipt::{
//!     CodeIdentityVerifier, ExpectedIdentity, IdentityError, InterfaceDeviceId,
//!     ReceiptValidator, SignatureError, SignatureVerifier, StartupValidator,
//!     ValidationPolicy, validate_or_exit,
//! };
//! use iapguard_types::PurchasedProducts;
//! use std::path::Path;
//!
//! struct PlatformSignature;
//! impl SignatureVerifier for PlatformSignature {
//!     fn verify(&self, signed: &[u8]) -> Result<Vec<u8>, SignatureError> {
//!         unimplemented!()
//!     }
//! }
//!
//! struct PlatformCodeIdentity;
//! impl CodeIdentityVerifier for PlatformCodeIdentity {
//!     fn check(&self, requirement: &str) -> Result<(), IdentityError> {
//!         unimplemented!()
//!     }
//! }
//!
//! const IDENTITY: ExpectedIdentity = ExpectedIdentity::new("com.example.app", "1.0");
//!
//! let products = PurchasedProducts::new();
//! let validator = ReceiptValidator::new(IDENTITY, ValidationPolicy::default(), products.clone());
//! let device = InterfaceDeviceId::new();
//! let startup = StartupValidator::new(validator, &PlatformCodeIdentity, &PlatformSignature, &device);
//! validate_or_exit(&startup, Path::new("Contents/_MASReceipt/receipt"));
//! ```

pub mod asn1;
mod config;
pub mod device;
mod error;
pub mod purchase;
pub mod receipt;
mod startup;
mod verify;

pub use asn1::AttributeRecord;
pub use config::{DEFAULT_CODE_REQUIREMENT, ExpectedIdentity, ValidationPolicy};
pub use device::{
    DEVICE_DIGEST_LEN, DeviceDigest, DeviceIdentityProvider, InterfaceDeviceId, StaticDeviceId,
    device_digest,
};
pub use error::{
    DecodeError, DeviceUnavailable, IdentityError, RECEIPT_INVALID_EXIT_CODE, ReceiptError,
    ReceiptResult, SignatureError,
};
pub use purchase::{InAppPurchaseRecord, parse_in_app_purchase};
pub use receipt::{ReceiptContents, ReceiptIdentity, ReceiptValidator, ValidatedReceipt};
pub use startup::{StartupValidator, validate_or_exit};
pub use verify::{CodeIdentityVerifier, SignatureVerifier};
