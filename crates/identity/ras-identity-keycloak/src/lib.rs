//! Keycloak OIDC client for the Resource Owner Password Credentials flow.
//!
//! This crate obtains access tokens with the `password` grant (optionally
//! with a TOTP second factor), introspects tokens and fetches a realm's
//! discovery document. Every operation is a single request/response exchange
//! through an injected [`HttpTransport`]; nothing is cached between calls.
//!
//! Each operation has a `KeycloakResult` form that says why a call failed and
//! an `Option` form that collapses every failure to `None`.
//!
//! ```no_run
//! use ras_identity_keycloak::{DEFAULT_HTTP_TIMEOUT, KeycloakClient, KeycloakConfig};
//!
//! # async fn run() -> ras_identity_keycloak::KeycloakResult<()> {
//! let config = KeycloakConfig::new("https://auth.example.com", "demo", "app", "s3cr3t");
//! let client = KeycloakClient::with_reqwest(config, DEFAULT_HTTP_TIMEOUT)?;
//!
//! if let Some(token) = client.acquire_token_password("alice", "pw").await {
//!     let introspection = client.introspect(&token).await?;
//!     println!("active: {}", introspection.active());
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod provider;
mod transport;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;


pub use client::KeycloakClient;
pub use config::{
    DEFAULT_HTTP_TIMEOUT, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_DOMAIN, ENV_REALM, KeycloakConfig,
};
pub use error::{KeycloakError, KeycloakResult, TransportError};
pub use provider::KeycloakPasswordProvider;
pub use transport::{
    FORM_CONTENT_TYPE, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
};
pub use types::{
    DiscoveryDocument, ErrorResponse, IntrospectionResult, PasswordCredentials, TokenResponse,
    VerifiedIdentity,
};
