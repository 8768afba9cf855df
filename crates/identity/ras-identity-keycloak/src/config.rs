//! Keycloak client configuration.

use crate::error::{KeycloakError, KeycloakResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Per-call deadline used when the embedding application does not pick one.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

pub const ENV_DOMAIN: &str = "KEYCLOAK_DOMAIN";
pub const ENV_REALM: &str = "KEYCLOAK_REALM";
pub const ENV_CLIENT_ID: &str = "KEYCLOAK_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "KEYCLOAK_CLIENT_SECRET";

/// Coordinates of a confidential client registered in a Keycloak realm.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeycloakConfig {
    /// Base URL of the identity provider, e.g. `https://auth.example.com`.
    pub idp_domain: String,
    pub realm: String,
    pub client_id: String,
    pub client_secret: String,
}

impl KeycloakConfig {
    pub fn new(
        idp_domain: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            idp_domain: idp_domain.into(),
            realm: realm.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Read the configuration from `KEYCLOAK_DOMAIN`, `KEYCLOAK_REALM`,
    /// `KEYCLOAK_CLIENT_ID` and `KEYCLOAK_CLIENT_SECRET`.
    pub fn from_env() -> KeycloakResult<Self> {
        Ok(Self {
            idp_domain: required_env(ENV_DOMAIN)?,
            realm: required_env(ENV_REALM)?,
            client_id: required_env(ENV_CLIENT_ID)?,
            client_secret: required_env(ENV_CLIENT_SECRET)?,
        })
    }

    /// Check that every field is set and that `idp_domain` is an absolute
    /// http(s) URL.
    pub fn validate(&self) -> KeycloakResult<()> {
        let fields = [
            ("idp_domain", &self.idp_domain),
            ("realm", &self.realm),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(KeycloakError::InvalidConfig(format!("{} must not be empty", name)));
            }
        }

        let base = Url::parse(&self.idp_domain)?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(KeycloakError::InvalidConfig(format!(
                "idp_domain must use http or https, got {}",
                base.scheme()
            )));
        }
        if base.cannot_be_a_base() {
            return Err(KeycloakError::InvalidConfig(
                "idp_domain must be a base URL".to_string(),
            ));
        }

        Ok(())
    }

    /// `{idp_domain}/realms/{realm}/protocol/openid-connect/token`
    pub fn token_endpoint(&self) -> KeycloakResult<Url> {
        self.realm_url(&["protocol", "openid-connect", "token"])
    }

    /// `{idp_domain}/realms/{realm}/protocol/openid-connect/token/introspect`
    pub fn introspection_endpoint(&self) -> KeycloakResult<Url> {
        self.realm_url(&["protocol", "openid-connect", "token", "introspect"])
    }

    /// `{idp_domain}/realms/{realm}/.well-known/openid-configuration`
    pub fn discovery_endpoint(&self) -> KeycloakResult<Url> {
        self.realm_url(&[".well-known", "openid-configuration"])
    }

    fn realm_url(&self, tail: &[&str]) -> KeycloakResult<Url> {
        let mut url = Url::parse(&self.idp_domain)?;
        url.set_query(None);
        url.set_fragment(None);

        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                KeycloakError::InvalidConfig("idp_domain must be a base URL".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("realms");
            segments.push(&self.realm);
            segments.extend(tail);
        }

        Ok(url)
    }
}

impl fmt::Debug for KeycloakConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakConfig")
            .field("idp_domain", &self.idp_domain)
            .field("realm", &self.realm)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

fn required_env(name: &str) -> KeycloakResult<String> {
    std::env::var(name)
        .map_err(|_| KeycloakError::InvalidConfig(format!("{} environment variable is required", name)))
}
