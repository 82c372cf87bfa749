//! Error types for receipt validation.

use thiserror::Error;

/// Exit status used when startup validation fails.
///
/// 173 is the status the platform recognises as "receipt missing or
/// invalid"; the launcher responds by fetching a fresh receipt.
pub const RECEIPT_INVALID_EXIT_CODE: i32 = 173;

/// Malformed ASN.1 structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before a complete element was read.
    #[error("truncated ASN.1 data")]
    Truncated,

    /// An element carried a different tag number than the schema requires.
    #[error("unexpected ASN.1 tag: expected {expected}, found {found}")]
    UnexpectedTag { expected: u32, found: u32 },

    /// An attribute SEQUENCE with the wrong number of fields.
    #[error("attribute has {found} fields, expected {expected}")]
    FieldCount { expected: usize, found: usize },

    /// Indefinite, oversized or zero-width length where one is not allowed.
    #[error("invalid ASN.1 length")]
    InvalidLength,

    /// INTEGER wider than 64 bits.
    #[error("ASN.1 integer does not fit in 64 bits")]
    IntegerOverflow,

    /// Extra bytes after a complete structure.
    #[error("{0} trailing bytes after ASN.1 structure")]
    TrailingBytes(usize),

    /// Any other DER violation reported by the parser.
    #[error("malformed DER: {0}")]
    Malformed(String),
}

/// The signed envelope could not be authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The envelope carries no signer.
    #[error("receipt envelope has no signers")]
    NoSigners,

    /// More than one signer; the chain is ambiguous.
    #[error("receipt envelope has {0} signers, expected exactly one")]
    AmbiguousSigners(usize),

    /// The signer does not chain to the trusted root.
    #[error("receipt signer is not trusted: {0}")]
    UntrustedChain(String),

    /// The envelope itself is not a valid signed container.
    #[error("malformed receipt envelope: {0}")]
    Malformed(String),
}

/// The running binary or the receipt is not the one we expect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The executable's code signature does not satisfy the requirement.
    #[error("code signature check failed: {0}")]
    CodeSignature(String),

    /// Receipt was issued for a different bundle.
    #[error("bundle identifier mismatch: expected {expected}, found {found}")]
    BundleIdMismatch { expected: String, found: String },

    /// Receipt was issued for a different version of this bundle.
    #[error("bundle version mismatch: expected {expected}, found {found}")]
    BundleVersionMismatch { expected: String, found: String },
}

/// The device identity provider could not produce an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("device identifier unavailable: {0}")]
pub struct DeviceUnavailable(pub String);

/// Receipt validation errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Payload is not a well-formed attribute set.
    #[error("receipt decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// Envelope signature verification failed.
    #[error("receipt signature invalid: {0}")]
    Signature(#[from] SignatureError),

    /// Code signature or bundle identity check failed.
    #[error("identity check failed: {0}")]
    Identity(#[from] IdentityError),

    /// Device-binding digest did not match.
    #[error("receipt hash check failed: {0}")]
    HashMismatch(String),

    /// A required top-level attribute is absent.
    #[error("receipt is missing required field: {0}")]
    MissingField(&'static str),

    /// The receipt file could not be read.
    #[error("receipt unreadable: {0}")]
    ReceiptUnreadable(String),

    /// The device identifier could not be obtained.
    #[error(transparent)]
    DeviceUnavailable(#[from] DeviceUnavailable),
}

impl ReceiptError {
    /// Process exit status for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        RECEIPT_INVALID_EXIT_CODE
    }
}

/// Result type for receipt operations.
pub type ReceiptResult<T> = Result<T, ReceiptError>;
