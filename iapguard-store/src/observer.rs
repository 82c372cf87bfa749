//! Observer interface and notification delivery.
//!
//! The store never calls an observer directly. It emits
//! [`StoreNotification`]s on a channel, and whoever owns the observer drains
//! that channel on one task, so the observer sees notifications one at a
//! time and in order.

use crate::error::PurchaseFlowError;
use tokio::sync::mpsc;
use tracing::debug;

/// Receives purchase and restore progress.
///
/// Every method has a no-op default; implement the ones you care about.
#[allow(unused_variables)]
pub trait StoreObserver {
    fn will_start_purchasing(&mut self) {}

    fn did_cancel_purchase(&mut self, product_id: &str) {}

    /// The product being purchased exists; `price` is display-formatted.
    fn did_find_product(&mut self, product_id: &str, price: &str, currency_locale: &str) {}

    fn did_fail_finding_product(&mut self, product_id: &str) {}

    fn did_fail_purchasing(&mut self, product_id: &str, error: &PurchaseFlowError) {}

    fn did_purchase_product(&mut self, product_id: &str) {}

    /// Always the last notification of a purchase flow.
    fn did_end_purchasing(&mut self) {}

    fn will_start_restoring(&mut self) {}

    fn did_cancel_restore(&mut self) {}

    fn did_fail_restore(&mut self, error: &PurchaseFlowError) {}

    fn did_restore_product(&mut self, product_id: &str) {}

    /// Always the last notification of a restore flow.
    fn did_end_restoring(&mut self) {}
}

/// One observer callback, as data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreNotification {
    WillStartPurchasing,
    DidCancelPurchase(String),
    DidFindProduct {
        product_id: String,
        price: String,
        currency_locale: String,
    },
    DidFailFindingProduct(String),
    DidFailPurchasing {
        product_id: String,
        error: PurchaseFlowError,
    },
    DidPurchaseProduct(String),
    DidEndPurchasing,
    WillStartRestoring,
    DidCancelRestore,
    DidFailRestore(PurchaseFlowError),
    DidRestoreProduct(String),
    DidEndRestoring,
}

impl StoreNotification {
    /// Invokes the matching observer method.
    pub fn deliver<O: StoreObserver + ?Sized>(&self, observer: &mut O) {
        match self {
            Self::WillStartPurchasing => observer.will_start_purchasing(),
            Self::DidCancelPurchase(id) => observer.did_cancel_purchase(id),
            Self::DidFindProduct {
                product_id,
                price,
                currency_locale,
            } => observer.did_find_product(product_id, price, currency_locale),
            Self::DidFailFindingProduct(id) => observer.did_fail_finding_product(id),
            Self::DidFailPurchasing { product_id, error } => {
                observer.did_fail_purchasing(product_id, error);
            }
            Self::DidPurchaseProduct(id) => observer.did_purchase_product(id),
            Self::DidEndPurchasing => observer.did_end_purchasing(),
            Self::WillStartRestoring => observer.will_start_restoring(),
            Self::DidCancelRestore => observer.did_cancel_restore(),
            Self::DidFailRestore(error) => observer.did_fail_restore(error),
            Self::DidRestoreProduct(id) => observer.did_restore_product(id),
            Self::DidEndRestoring => observer.did_end_restoring(),
        }
    }
}

pub type NotificationReceiver = mpsc::UnboundedReceiver<StoreNotification>;

/// Delivers notifications to `observer` until every store handle is gone,
/// then hands the observer back.
pub async fn dispatch_notifications<O: StoreObserver>(
    mut notifications: NotificationReceiver,
    mut observer: O,
) -> O {
    while let Some(notification) = notifications.recv().await {
        debug!("Delivering {notification:?}");
        notification.deliver(&mut observer);
    }
    observer
}
