//! In-app purchase flow for iapguard.
//!
//! This crate handles:
//! - The Commerce Service interface and the events it delivers
//! - The purchase / restore state machine ([`InAppStore`])
//! - Observer notifications, delivered sequentially on one task
//!
//! Purchased and restored products are written into the same
//! [`PurchasedProducts`](iapguard_types::PurchasedProducts) set that startup
//! receipt validation fills.

pub mod commerce;
mod error;
mod observer;
mod session;
mod store;

pub use commerce::{
    CommerceEvent, CommerceEventReceiver, CommerceEventSender, CommerceService, Product,
    Transaction, TransactionState, commerce_channel,
};
pub use error::{
    CommerceError, PAYMENT_CANCELLED_CODE, PAYMENT_ERROR_DOMAIN, PurchaseFlowError,
    PurchaseResult,
};
pub use observer::{NotificationReceiver, StoreNotification, StoreObserver, dispatch_notifications};
pub use session::{PurchaseSession, SessionKind, StoreState};
pub use store::InAppStore;
