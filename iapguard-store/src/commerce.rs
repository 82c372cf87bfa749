//! Commerce Service abstraction.
//!
//! The platform store is driven through [`CommerceService`]. Requests return
//! immediately; their outcomes arrive later as [`CommerceEvent`]s on a
//! channel that the [`InAppStore`](crate::InAppStore) consumes.

use crate::error::CommerceError;
use std::collections::HashSet;
use tokio::sync::mpsc;

/// A product the store can sell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub identifier: String,
    /// Localized price, formatted for display.
    pub price: String,
    /// Locale the price is expressed in, e.g. `en_US@currency=USD`.
    pub currency_locale: String,
}

impl Product {
    pub fn new(
        identifier: impl Into<String>,
        price: impl Into<String>,
        currency_locale: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            price: price.into(),
            currency_locale: currency_locale.into(),
        }
    }
}

/// State of a payment transaction as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionState {
    /// Still being processed; will be delivered again.
    Purchasing,
    Purchased,
    Restored,
    Failed,
}

impl TransactionState {
    /// Terminal states must be finished; `Purchasing` must not be.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Purchasing)
    }
}

/// A payment transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub transaction_id: String,
    pub product_id: String,
    pub state: TransactionState,
    /// Set for `Failed` transactions.
    pub error: Option<CommerceError>,
}

impl Transaction {
    pub fn new(
        transaction_id: impl Into<String>,
        product_id: impl Into<String>,
        state: TransactionState,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            product_id: product_id.into(),
            state,
            error: None,
        }
    }

    /// A failed transaction carrying `error`.
    pub fn failed(
        transaction_id: impl Into<String>,
        product_id: impl Into<String>,
        error: CommerceError,
    ) -> Self {
        Self {
            error: Some(error),
            ..Self::new(transaction_id, product_id, TransactionState::Failed)
        }
    }
}

/// Asynchronous outcomes delivered by the Commerce Service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommerceEvent {
    /// A product lookup finished.
    ProductsResolved {
        found: Vec<Product>,
        not_found: Vec<String>,
    },
    /// A product lookup could not be performed at all.
    ProductLookupFailed(CommerceError),
    /// A batch of transaction updates. May include transactions left
    /// unfinished by a previous run.
    TransactionsUpdated(Vec<Transaction>),
    /// Every transaction of a restore has been delivered.
    RestoreCompleted,
    RestoreFailed(CommerceError),
}

pub type CommerceEventSender = mpsc::UnboundedSender<CommerceEvent>;
pub type CommerceEventReceiver = mpsc::UnboundedReceiver<CommerceEvent>;

/// Creates the channel a Commerce Service integration delivers events on.
pub fn commerce_channel() -> (CommerceEventSender, CommerceEventReceiver) {
    mpsc::unbounded_channel()
}

/// The platform store.
///
/// Implementations must not block; long-running work is reported back
/// through [`CommerceEvent`]s.
pub trait CommerceService: Send + Sync {
    /// Whether the store's servers are reachable right now.
    fn is_network_reachable(&self) -> bool;

    /// Whether this user may make payments.
    fn can_make_payments(&self) -> bool;

    /// Starts a lookup. Answered by `ProductsResolved` or
    /// `ProductLookupFailed`.
    fn lookup_products(&self, identifiers: HashSet<String>);

    /// Queues a payment. Progress arrives as `TransactionsUpdated`.
    fn submit_payment(&self, product: &Product);

    /// Redelivers every past purchase as `Restored` transactions, then
    /// `RestoreCompleted` or `RestoreFailed`.
    fn restore_all(&self);

    /// Acknowledges a transaction so it is not redelivered.
    fn finish_transaction(&self, transaction: &Transaction);
}

/// A recording Commerce Service for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// One call made against [`MockCommerceService`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CommerceCall {
        IsNetworkReachable,
        CanMakePayments,
        LookupProducts(HashSet<String>),
        SubmitPayment(String),
        RestoreAll,
        FinishTransaction(String),
    }

    /// Records every call; reachability and payment capability are
    /// switchable.
    #[derive(Debug)]
    pub struct MockCommerceService {
        reachable: AtomicBool,
        payments_allowed: AtomicBool,
        calls: Mutex<Vec<CommerceCall>>,
    }

    impl Default for MockCommerceService {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockCommerceService {
        /// A reachable store that accepts payments.
        pub fn new() -> Self {
            Self {
                reachable: AtomicBool::new(true),
                payments_allowed: AtomicBool::new(true),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn set_reachable(&self, reachable: bool) {
            self.reachable.store(reachable, Ordering::SeqCst);
        }

        pub fn set_payments_allowed(&self, allowed: bool) {
            self.payments_allowed.store(allowed, Ordering::SeqCst);
        }

        /// Every call so far, in order.
        pub fn calls(&self) -> Vec<CommerceCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        /// Identifiers of finished transactions, in order.
        pub fn finished_transactions(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|call| match call {
                    CommerceCall::FinishTransaction(id) => Some(id.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Identifiers of products a payment was submitted for.
        pub fn submitted_payments(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter_map(|call| match call {
                    CommerceCall::SubmitPayment(id) => Some(id.clone()),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: CommerceCall) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl CommerceService for MockCommerceService {
        fn is_network_reachable(&self) -> bool {
            self.record(CommerceCall::IsNetworkReachable);
            self.reachable.load(Ordering::SeqCst)
        }

        fn can_make_payments(&self) -> bool {
            self.record(CommerceCall::CanMakePayments);
            self.payments_allowed.load(Ordering::SeqCst)
        }

        fn lookup_products(&self, identifiers: HashSet<String>) {
            self.record(CommerceCall::LookupProducts(identifiers));
        }

        fn submit_payment(&self, product: &Product) {
            self.record(CommerceCall::SubmitPayment(product.identifier.clone()));
        }

        fn restore_all(&self) {
            self.record(CommerceCall::RestoreAll);
        }

        fn finish_transaction(&self, transaction: &Transaction) {
            self.record(CommerceCall::FinishTransaction(
                transaction.transaction_id.clone(),
            ));
        }
    }
}
