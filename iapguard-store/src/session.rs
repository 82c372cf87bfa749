//! Purchase flow state.

/// What kind of flow is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    Purchase,
    Restore,
}

/// The flow this process started and is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseSession {
    pub kind: SessionKind,
    /// Product being purchased; `None` for a restore.
    pub product_id: Option<String>,
}

impl PurchaseSession {
    pub fn purchase(product_id: impl Into<String>) -> Self {
        Self {
            kind: SessionKind::Purchase,
            product_id: Some(product_id.into()),
        }
    }

    pub fn restore() -> Self {
        Self {
            kind: SessionKind::Restore,
            product_id: None,
        }
    }
}

/// The store is idle or running exactly one flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StoreState {
    #[default]
    Idle,
    Busy(PurchaseSession),
}

impl StoreState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Product of the purchase in flight, if one is.
    pub fn pending_purchase(&self) -> Option<&str> {
        match self {
            Self::Busy(PurchaseSession {
                kind: SessionKind::Purchase,
                product_id,
            }) => product_id.as_deref(),
            _ => None,
        }
    }

    /// Returns true if this process is purchasing `product_id`.
    pub fn is_purchasing(&self, product_id: &str) -> bool {
        self.pending_purchase() == Some(product_id)
    }

    pub fn is_restoring(&self) -> bool {
        matches!(
            self,
            Self::Busy(PurchaseSession {
                kind: SessionKind::Restore,
                ..
            })
        )
    }
}
