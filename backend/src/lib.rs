pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod notify;
pub mod org_guard;
pub mod provision;
pub mod store;

use std::sync::Arc;

use clock::Clock;
use lifecycle::AssignmentService;
use notify::{RecipientPolicy, StoreNotifier};
use store::DynStore;

/// Shared application state available to all handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub assignments: Arc<AssignmentService>,
    pub clock: Arc<dyn Clock>,
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
}

impl AppState {
    /// Wires the lifecycle service and the store-backed notifier onto `store`.
    pub fn new(
        store: DynStore,
        clock: Arc<dyn Clock>,
        recipients: RecipientPolicy,
        jwt_secret: String,
        jwt_expiry_hours: u64,
    ) -> Self {
        let notifier = Arc::new(StoreNotifier::new(store.clone()));
        let assignments = Arc::new(AssignmentService::new(
            store.clone(),
            notifier,
            recipients,
            clock.clone(),
        ));
        Self {
            store,
            assignments,
            clock,
            jwt_secret,
            jwt_expiry_hours,
        }
    }
}
