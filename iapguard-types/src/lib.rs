//! Shared types for iapguard.
//!
//! The only cross-component state in the system is the set of product
//! identifiers the current process considers purchased. It is written by
//! receipt validation at startup and by the purchase state machine at
//! runtime, and read synchronously by the host application.

mod entitlements;

pub use entitlements::{EntitlementSnapshot, PurchasedProducts};
