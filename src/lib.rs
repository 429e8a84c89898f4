pub mod actions;
pub mod churches;
pub mod churches_repo;
pub mod donations;
pub mod donations_repo;
pub mod donors;
pub mod donors_repo;
pub mod identity;
pub mod log_format;
pub mod metrics;
pub mod oauth_state;
pub mod schema;
pub mod stripe_client;
pub mod stripe_events;
pub mod stripe_webhooks;
pub mod stripe_webhooks_repo;
pub mod subscriptions;
pub mod subscriptions_repo;
pub mod users;
pub mod users_repo;
pub mod web;
