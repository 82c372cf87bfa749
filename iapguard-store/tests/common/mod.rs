#![allow(dead_code)]

use iapguard_store::commerce::mock::MockCommerceService;
use iapguard_store::{
    CommerceError, InAppStore, NotificationReceiver, Product, PurchaseFlowError,
    StoreNotification, StoreObserver, Transaction, TransactionState,
};
use iapguard_types::PurchasedProducts;
use std::sync::Arc;

pub const PRO: &str = "pro_upgrade";
pub const THEMES: &str = "theme_pack";

pub struct Harness {
    pub store: InAppStore,
    pub commerce: Arc<MockCommerceService>,
    pub notifications: NotificationReceiver,
}

impl Harness {
    pub fn new() -> Self {
        let commerce = Arc::new(MockCommerceService::new());
        let (store, notifications) = InAppStore::new(commerce.clone(), PurchasedProducts::new());
        Self {
            store,
            commerce,
            notifications,
        }
    }

    /// Every notification emitted so far.
    pub fn drain(&mut self) -> Vec<StoreNotification> {
        let mut out = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            out.push(notification);
        }
        out
    }
}

pub fn product(id: &str) -> Product {
    Product::new(id, "$4.99", "en_US@currency=USD")
}

pub fn purchased(transaction_id: &str, product_id: &str) -> Transaction {
    Transaction::new(transaction_id, product_id, TransactionState::Purchased)
}

pub fn restored(transaction_id: &str, product_id: &str) -> Transaction {
    Transaction::new(transaction_id, product_id, TransactionState::Restored)
}

pub fn purchasing(transaction_id: &str, product_id: &str) -> Transaction {
    Transaction::new(transaction_id, product_id, TransactionState::Purchasing)
}

pub fn declined() -> CommerceError {
    CommerceError::new("SKErrorDomain", 4, "payment not allowed")
}

/// Observer that logs each callback as a line.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub calls: Vec<String>,
}

impl StoreObserver for RecordingObserver {
    fn will_start_purchasing(&mut self) {
        self.calls.push("will_start_purchasing".into());
    }

    fn did_cancel_purchase(&mut self, product_id: &str) {
        self.calls.push(format!("did_cancel_purchase {product_id}"));
    }

    fn did_find_product(&mut self, product_id: &str, price: &str, currency_locale: &str) {
        self.calls
            .push(format!("did_find_product {product_id} {price} {currency_locale}"));
    }

    fn did_fail_finding_product(&mut self, product_id: &str) {
        self.calls.push(format!("did_fail_finding_product {product_id}"));
    }

    fn did_fail_purchasing(&mut self, product_id: &str, error: &PurchaseFlowError) {
        self.calls
            .push(format!("did_fail_purchasing {product_id}: {error}"));
    }

    fn did_purchase_product(&mut self, product_id: &str) {
        self.calls.push(format!("did_purchase_product {product_id}"));
    }

    fn did_end_purchasing(&mut self) {
        self.calls.push("did_end_purchasing".into());
    }

    fn will_start_restoring(&mut self) {
        self.calls.push("will_start_restoring".into());
    }

    fn did_cancel_restore(&mut self) {
        self.calls.push("did_cancel_restore".into());
    }

    fn did_fail_restore(&mut self, error: &PurchaseFlowError) {
        self.calls.push(format!("did_fail_restore: {error}"));
    }

    fn did_restore_product(&mut self, product_id: &str) {
        self.calls.push(format!("did_restore_product {product_id}"));
    }

    fn did_end_restoring(&mut self) {
        self.calls.push("did_end_restoring".into());
    }
}
