pub mod approval;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod oplog;
pub mod policy;
pub mod services;
pub mod store;

#[cfg(test)]
pub mod testing;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::policy::PointsPolicy;
use crate::services::{ApprovalService, LedgerService, SyncService};
use crate::store::Store;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn policy(&self) -> PointsPolicy {
        PointsPolicy::new(self.config.points.clone())
    }

    pub fn approvals(&self) -> ApprovalService {
        ApprovalService::new(self.store.clone(), self.policy())
    }

    pub fn ledger(&self) -> LedgerService {
        LedgerService::new(self.store.clone(), self.policy())
    }

    pub fn sync(&self) -> SyncService {
        SyncService::new(self.store.clone(), self.config.sync.clone())
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        // Public
        .route("/", get(handlers::public::health::root))
        .route("/health", get(handlers::public::health::health))
        // Authenticates its own upgrade request
        .route("/ws", get(handlers::socket::upgrade))
        .merge(protected_routes(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(state.config.api.max_request_size_bytes)),
        );

    if state.config.security.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use handlers::protected::{bag_lifts, journeys, kyc, masons, redemptions, sync};

    Router::new()
        // Approval records
        .route("/bag-lifts", post(bag_lifts::create))
        .route("/bag-lifts/:id", get(bag_lifts::get).patch(bag_lifts::patch))
        .route("/kyc-submissions", post(kyc::create))
        .route("/kyc-submissions/:id", get(kyc::get).patch(kyc::patch))
        .route("/rewards-redemption", post(redemptions::create))
        .route("/rewards-redemption/:id", get(redemptions::get).patch(redemptions::patch))
        // Accounts
        .route("/masons/:id", get(masons::get))
        .route("/masons/:id/ledger", get(masons::ledger))
        .route("/masons/:id/reconcile", post(masons::reconcile))
        // Op log
        .route("/journey-ops", get(sync::pull))
        .route("/journey-ops/sync", post(sync::push))
        .route("/journeys/rebuild", post(journeys::rebuild))
        .route("/journeys/:id", get(journeys::get))
        .route_layer(from_fn_with_state(state, middleware::jwt_auth_middleware))
}
