use anyhow::{Context, Result};
use stripe::Client;

/// Configuration for the Stripe integration
#[derive(Clone)]
pub struct StripeConfig {
    pub client: Client,
    /// Secret API key; also needed for the Connect OAuth token exchange,
    /// which async-stripe does not cover
    pub secret_key: String,
    pub webhook_secret: String,
    /// Publishable key handed to the donation frontend
    pub public_key: String,
    /// Connect OAuth application client id (ca_...)
    pub connect_client_id: String,
    /// Base URL of the donor-facing frontend (redirect targets)
    pub frontend_url: String,
    /// Base URL of this server (OAuth callback construction)
    pub server_url: String,
}

impl StripeConfig {
    /// Initialize Stripe configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key =
            std::env::var("STRIPE_SECRET_KEY").context("STRIPE_SECRET_KEY must be set")?;
        let webhook_secret =
            std::env::var("STRIPE_WEBHOOK_SECRET").context("STRIPE_WEBHOOK_SECRET must be set")?;
        let public_key =
            std::env::var("STRIPE_PUBLIC_KEY").context("STRIPE_PUBLIC_KEY must be set")?;
        let connect_client_id = std::env::var("STRIPE_CONNECT_CLIENT_ID")
            .context("STRIPE_CONNECT_CLIENT_ID must be set")?;
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let server_url =
            std::env::var("SERVER_URL").unwrap_or_else(|_| "http://localhost:8080".to_string());

        let client = Client::new(secret_key.clone());

        Ok(Self {
            client,
            secret_key,
            webhook_secret,
            public_key,
            connect_client_id,
            frontend_url,
            server_url,
        })
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("public_key", &self.public_key)
            .field("connect_client_id", &self.connect_client_id)
            .field("frontend_url", &self.frontend_url)
            .field("server_url", &self.server_url)
            .finish()
    }
}
