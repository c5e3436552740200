//! Shared application state for request handlers.

use std::sync::Arc;

use crate::store::FruitStore;

/// Shared application state, cloneable across handlers.
///
/// Every endpoint reads through the same `store` handle; its lifecycle is
/// owned by `main`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn FruitStore>,
}

impl AppState {
    /// Creates a new application state around the given store.
    pub fn new(store: Arc<dyn FruitStore>) -> Self {
        Self { store }
    }
}
