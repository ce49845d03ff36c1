use axum::Router;
pub use configuration::{
    FailurePolicy, MutatingWebhookBuilder, SideEffects, WebhookConfiguration,
    WebhookConfigurationBuilder, WebhookConfigurationExt,
};
pub use mutating_webhook::{MutatingWebhook, MutatingWebhookError, mutating_http_path};

mod configuration;
mod mutating_webhook;
mod patch;

/// A webhook (such as a mutating webhook) needs to implement this trait.
pub trait Webhook: Send + Sync {
    /// The webhook can add arbitrary routes to the passed [`Router`] and needs to return the
    /// resulting [`Router`].
    fn register_routes(&self, router: Router) -> Router;
}
