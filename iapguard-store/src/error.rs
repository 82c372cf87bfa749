//! Error types for the purchase flow.

use thiserror::Error;

/// Domain the platform uses for its payment errors.
pub const PAYMENT_ERROR_DOMAIN: &str = "SKErrorDomain";

/// Code the platform uses for "the user cancelled the payment".
pub const PAYMENT_CANCELLED_CODE: i64 = 2;

/// An error reported by the Commerce Service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{domain} error {code}: {message}")]
pub struct CommerceError {
    pub domain: String,
    pub code: i64,
    pub message: String,
}

impl CommerceError {
    pub fn new(domain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: message.into(),
        }
    }

    /// The error a failed transaction carries when the platform gave none.
    pub fn unknown() -> Self {
        Self::new("iapguard", -1, "unknown error")
    }

    /// Payment cancelled by the user.
    pub fn cancelled() -> Self {
        Self::new(PAYMENT_ERROR_DOMAIN, PAYMENT_CANCELLED_CODE, "payment cancelled")
    }

    /// Returns true if the user cancelled rather than the payment failing.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        self.domain == PAYMENT_ERROR_DOMAIN && self.code == PAYMENT_CANCELLED_CODE
    }
}

/// Errors surfaced by purchase and restore requests.
///
/// None of these are fatal: the store is always back to idle afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PurchaseFlowError {
    /// Another purchase or restore is in flight.
    #[error("a purchase or restore is already in progress")]
    Busy,

    #[error("the store is not reachable")]
    NetworkUnreachable,

    /// Payments are disabled on this device (parental controls etc).
    #[error("payments are disabled on this device")]
    PaymentsDisabled,

    /// Error reported by the platform while the flow was running.
    #[error("store error: {0}")]
    Platform(#[from] CommerceError),
}

/// Result type for purchase flow operations.
pub type PurchaseResult<T> = Result<T, PurchaseFlowError>;
