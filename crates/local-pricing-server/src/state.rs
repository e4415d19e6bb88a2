//! Application State

use std::sync::Arc;

use local_pricing::{LocalPricingHooks, SessionStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Checkout hook callbacks
    pub hooks: Arc<LocalPricingHooks>,

    /// Visitor checkout sessions
    pub sessions: Arc<dyn SessionStore>,

    /// Whether the exchange-rate credential is set
    pub app_id_configured: bool,

    /// Public URL of the AJAX endpoint handed to the checkout script
    pub ajax_url: String,
}
