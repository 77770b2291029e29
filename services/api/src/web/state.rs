//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use moazer_core::ports::{DatabaseService, Oracle};
use moazer_core::{ConsultationService, SessionWizard, WalletService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub wallet: WalletService,
    pub wizard: SessionWizard,
    pub consultations: ConsultationService,
}

impl AppState {
    /// Wires the core services onto the given ports.
    pub fn new(db: Arc<dyn DatabaseService>, oracle: Arc<dyn Oracle>, config: Arc<Config>) -> Self {
        Self {
            wallet: WalletService::new(db.clone()),
            wizard: SessionWizard::new(db.clone(), oracle, config.oracle_timeout),
            consultations: ConsultationService::new(db.clone()),
            db,
            config,
        }
    }
}
