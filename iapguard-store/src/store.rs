//! The purchase transaction state machine.
//!
//! At most one purchase or restore runs at a time. Requests are accepted or
//! rejected synchronously; everything after that is driven by
//! [`CommerceEvent`]s, which [`InAppStore::run`] consumes one at a time.
//!
//! Transactions this process did not ask for (left over from an earlier run,
//! or bought elsewhere) still update the purchased-product set, but produce
//! no observer notification.

use crate::commerce::{
    CommerceEvent, CommerceEventReceiver, CommerceService, Product, Transaction, TransactionState,
};
use crate::error::{CommerceError, PurchaseFlowError, PurchaseResult};
use crate::observer::{NotificationReceiver, StoreNotification};
use crate::session::{PurchaseSession, StoreState};
use iapguard_types::PurchasedProducts;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct StoreInner {
    commerce: Arc<dyn CommerceService>,
    products: PurchasedProducts,
    state: Mutex<StoreState>,
    /// Transactions already acknowledged in this process.
    finished: Mutex<HashSet<String>>,
    notifications: mpsc::UnboundedSender<StoreNotification>,
}

/// Handle to the in-app store. Clones share state.
#[derive(Clone)]
pub struct InAppStore {
    inner: Arc<StoreInner>,
}

impl InAppStore {
    /// Creates a store that grants purchases into `products`.
    ///
    /// The returned receiver carries observer notifications; drain it with
    /// [`dispatch_notifications`](crate::dispatch_notifications) or your own
    /// loop.
    pub fn new(
        commerce: Arc<dyn CommerceService>,
        products: PurchasedProducts,
    ) -> (Self, NotificationReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Self {
            inner: Arc::new(StoreInner {
                commerce,
                products,
                state: Mutex::new(StoreState::Idle),
                finished: Mutex::new(HashSet::new()),
                notifications: tx,
            }),
        };
        (store, rx)
    }

    pub fn products(&self) -> &PurchasedProducts {
        &self.inner.products
    }

    pub fn has_purchased_product(&self, product_id: &str) -> bool {
        self.inner.products.contains(product_id)
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> StoreState {
        self.lock_state().clone()
    }

    pub fn is_busy(&self) -> bool {
        !self.lock_state().is_idle()
    }

    pub fn is_purchasing(&self) -> bool {
        self.lock_state().pending_purchase().is_some()
    }

    pub fn is_restoring(&self) -> bool {
        self.lock_state().is_restoring()
    }

    // ── Requests ─────────────────────────────────────────────────

    /// Starts purchasing `product_id`.
    ///
    /// # Errors
    ///
    /// Rejected without any side effect if a flow is already running, the
    /// store is unreachable, or payments are disabled. The busy check comes
    /// first and does not touch the Commerce Service.
    pub fn purchase_product(&self, product_id: &str) -> PurchaseResult<()> {
        {
            let mut state = self.lock_state();
            if !state.is_idle() {
                warn!("Rejecting purchase of {product_id}: store is busy");
                return Err(PurchaseFlowError::Busy);
            }
            if !self.inner.commerce.is_network_reachable() {
                warn!("Rejecting purchase of {product_id}: store unreachable");
                return Err(PurchaseFlowError::NetworkUnreachable);
            }
            if !self.inner.commerce.can_make_payments() {
                warn!("Rejecting purchase of {product_id}: payments disabled");
                return Err(PurchaseFlowError::PaymentsDisabled);
            }
            *state = StoreState::Busy(PurchaseSession::purchase(product_id));
            self.notify(StoreNotification::WillStartPurchasing);
        }

        info!("Purchasing {product_id}");
        self.inner
            .commerce
            .lookup_products(HashSet::from([product_id.to_string()]));
        Ok(())
    }

    /// Starts restoring every past purchase.
    ///
    /// # Errors
    ///
    /// Rejected without any side effect if a flow is already running or the
    /// store is unreachable.
    pub fn restore_purchases(&self) -> PurchaseResult<()> {
        {
            let mut state = self.lock_state();
            if !state.is_idle() {
                warn!("Rejecting restore: store is busy");
                return Err(PurchaseFlowError::Busy);
            }
            if !self.inner.commerce.is_network_reachable() {
                warn!("Rejecting restore: store unreachable");
                return Err(PurchaseFlowError::NetworkUnreachable);
            }
            *state = StoreState::Busy(PurchaseSession::restore());
            self.notify(StoreNotification::WillStartRestoring);
        }

        info!("Restoring purchases");
        self.inner.commerce.restore_all();
        Ok(())
    }

    // ── Event handling ───────────────────────────────────────────

    /// Consumes Commerce Service events until the channel closes.
    pub async fn run(self, mut events: CommerceEventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!("Commerce event channel closed");
    }

    /// Runs [`run`](Self::run) on a new task.
    pub fn spawn(&self, events: CommerceEventReceiver) -> JoinHandle<()> {
        tokio::spawn(self.clone().run(events))
    }

    /// Applies one Commerce Service event.
    ///
    /// Events must be handled by a single consumer, in delivery order.
    pub fn handle_event(&self, event: CommerceEvent) {
        match event {
            CommerceEvent::ProductsResolved { found, not_found } => {
                self.on_products_resolved(found, &not_found);
            }
            CommerceEvent::ProductLookupFailed(error) => self.on_lookup_failed(error),
            CommerceEvent::TransactionsUpdated(transactions) => {
                for transaction in &transactions {
                    self.on_transaction(transaction);
                }
            }
            CommerceEvent::RestoreCompleted => self.on_restore_completed(),
            CommerceEvent::RestoreFailed(error) => self.on_restore_failed(error),
        }
    }

    fn on_products_resolved(&self, found: Vec<Product>, not_found: &[String]) {
        let product = {
            let mut state = self.lock_state();
            let Some(pending) = state.pending_purchase().map(str::to_owned) else {
                debug!("Ignoring product lookup result: no purchase in progress");
                return;
            };
            if !not_found.is_empty() {
                debug!("Store does not know {} requested products", not_found.len());
            }

            match found.into_iter().find(|p| p.identifier == pending) {
                Some(product) => {
                    self.notify(StoreNotification::DidFindProduct {
                        product_id: product.identifier.clone(),
                        price: product.price.clone(),
                        currency_locale: product.currency_locale.clone(),
                    });
                    product
                }
                None => {
                    warn!("Product {pending} not found in store");
                    self.notify(StoreNotification::DidFailFindingProduct(pending));
                    self.notify(StoreNotification::DidEndPurchasing);
                    *state = StoreState::Idle;
                    return;
                }
            }
        };

        debug!("Submitting payment for {}", product.identifier);
        self.inner.commerce.submit_payment(&product);
    }

    fn on_lookup_failed(&self, error: CommerceError) {
        let mut state = self.lock_state();
        let Some(pending) = state.pending_purchase().map(str::to_owned) else {
            debug!("Ignoring product lookup failure: no purchase in progress");
            return;
        };
        warn!("Product lookup for {pending} failed: {error}");
        self.notify(StoreNotification::DidFailPurchasing {
            product_id: pending,
            error: PurchaseFlowError::Platform(error),
        });
        self.notify(StoreNotification::DidEndPurchasing);
        *state = StoreState::Idle;
    }

    fn on_transaction(&self, transaction: &Transaction) {
        let product_id = transaction.product_id.as_str();
        match transaction.state {
            TransactionState::Purchasing => {
                debug!("Transaction {} in progress", transaction.transaction_id);
                return;
            }
            TransactionState::Purchased => {
                self.inner.products.insert(product_id);
                let mut state = self.lock_state();
                if state.is_purchasing(product_id) {
                    info!("Purchased {product_id}");
                    self.notify(StoreNotification::DidPurchaseProduct(product_id.to_string()));
                    self.notify(StoreNotification::DidEndPurchasing);
                    *state = StoreState::Idle;
                } else {
                    info!("Reconciled purchase of {product_id} from outside this session");
                }
            }
            TransactionState::Restored => {
                self.inner.products.insert(product_id);
                let state = self.lock_state();
                if state.is_restoring() {
                    info!("Restored {product_id}");
                    self.notify(StoreNotification::DidRestoreProduct(product_id.to_string()));
                } else {
                    info!("Reconciled restored {product_id} outside a restore");
                }
            }
            TransactionState::Failed => {
                let error = transaction
                    .error
                    .clone()
                    .unwrap_or_else(CommerceError::unknown);
                let mut state = self.lock_state();
                if state.is_purchasing(product_id) {
                    if error.is_cancellation() {
                        info!("Purchase of {product_id} cancelled");
                        self.notify(StoreNotification::DidCancelPurchase(product_id.to_string()));
                    } else {
                        warn!("Purchase of {product_id} failed: {error}");
                        self.notify(StoreNotification::DidFailPurchasing {
                            product_id: product_id.to_string(),
                            error: PurchaseFlowError::Platform(error),
                        });
                    }
                    self.notify(StoreNotification::DidEndPurchasing);
                    *state = StoreState::Idle;
                } else {
                    warn!(
                        "Transaction {} for {product_id} failed outside a purchase: {error}",
                        transaction.transaction_id
                    );
                }
            }
        }

        self.finish(transaction);
    }

    fn on_restore_completed(&self) {
        let mut state = self.lock_state();
        if !state.is_restoring() {
            debug!("Ignoring restore completion: no restore in progress");
            return;
        }
        info!("Restore completed");
        self.notify(StoreNotification::DidEndRestoring);
        *state = StoreState::Idle;
    }

    fn on_restore_failed(&self, error: CommerceError) {
        let mut state = self.lock_state();
        if !state.is_restoring() {
            warn!("Restore failure outside a restore: {error}");
            return;
        }
        if error.is_cancellation() {
            info!("Restore cancelled");
            self.notify(StoreNotification::DidCancelRestore);
        } else {
            warn!("Restore failed: {error}");
            self.notify(StoreNotification::DidFailRestore(PurchaseFlowError::Platform(error)));
        }
        self.notify(StoreNotification::DidEndRestoring);
        *state = StoreState::Idle;
    }

    /// Acknowledges a terminal transaction once per process.
    fn finish(&self, transaction: &Transaction) {
        let first = self
            .inner
            .finished
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(transaction.transaction_id.clone());
        if first {
            self.inner.commerce.finish_transaction(transaction);
        } else {
            debug!("Transaction {} already finished", transaction.transaction_id);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: StoreNotification) {
        if self.inner.notifications.send(notification).is_err() {
            debug!("Notification receiver dropped");
        }
    }
}
