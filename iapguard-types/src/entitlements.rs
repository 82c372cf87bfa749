//! The process-wide purchased-product set.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Set of product identifiers the process considers entitled.
///
/// Cloning yields another handle onto the same set. Construct one at process
/// start and hand clones to the receipt validator and the store. Entries are
/// never removed: once granted, a product stays entitled until the process
/// exits.
#[derive(Debug, Clone, Default)]
pub struct PurchasedProducts {
    inner: Arc<RwLock<HashSet<String>>>,
}

impl PurchasedProducts {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `product_id` has been granted in this process.
    #[must_use]
    pub fn contains(&self, product_id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(product_id)
    }

    /// Grants `product_id`. Returns true if it was not already present.
    pub fn insert(&self, product_id: impl Into<String>) -> bool {
        let product_id = product_id.into();
        let mut set = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let added = set.insert(product_id.clone());
        if added {
            debug!("Entitlement granted: {product_id}");
        }
        added
    }

    /// Number of entitled products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing has been granted yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a sorted, point-in-time copy of the set.
    #[must_use]
    pub fn snapshot(&self) -> EntitlementSnapshot {
        let set = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        EntitlementSnapshot {
            product_ids: set.iter().cloned().collect(),
        }
    }
}

/// Immutable copy of the entitled product identifiers, in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
    pub product_ids: BTreeSet<String>,
}

impl EntitlementSnapshot {
    /// Returns true if the snapshot includes `product_id`.
    #[must_use]
    pub fn contains(&self, product_id: &str) -> bool {
        self.product_ids.contains(product_id)
    }
}
