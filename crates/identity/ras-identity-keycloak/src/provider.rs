//! Username/password identity verification backed by a Keycloak realm.

use crate::client::KeycloakClient;
use crate::error::{KeycloakError, KeycloakResult};
use crate::types::{IntrospectionResult, PasswordCredentials, VerifiedIdentity};
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct KeycloakPasswordProvider {
    client: KeycloakClient,
    provider_id: String,
}

impl KeycloakPasswordProvider {
    pub fn new(client: KeycloakClient) -> Self {
        let provider_id = format!("keycloak:{}", client.config().realm);
        Self {
            client,
            provider_id,
        }
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn client(&self) -> &KeycloakClient {
        &self.client
    }

    /// Log in with `credentials` and confirm the issued token is active.
    pub async fn verify(&self, credentials: &PasswordCredentials) -> KeycloakResult<VerifiedIdentity> {
        let token = match &credentials.totp {
            Some(totp) => {
                self.client
                    .password_totp_grant(&credentials.username, &credentials.password, totp)
                    .await?
            }
            None => {
                self.client
                    .password_grant(&credentials.username, &credentials.password)
                    .await?
            }
        };

        let introspection = self.client.introspect(&token.access_token).await?;
        if !introspection.active() {
            debug!(username = %credentials.username, "Freshly issued token introspected as inactive");
            return Err(KeycloakError::InactiveToken);
        }

        let subject = introspection
            .subject()
            .or_else(|| introspection.username())
            .unwrap_or(credentials.username.as_str())
            .to_string();
        let username = introspection.username().map(str::to_string);
        let email = claim(&introspection, "email");
        let display_name = claim(&introspection, "name").or_else(|| username.clone());

        info!(provider = %self.provider_id, subject = %subject, "Verified Keycloak identity");

        Ok(VerifiedIdentity {
            provider_id: self.provider_id.clone(),
            subject,
            username,
            email,
            display_name,
            access_token: token.access_token,
            metadata: Some(Value::Object(introspection.into_inner())),
        })
    }
}

fn claim(introspection: &IntrospectionResult, key: &str) -> Option<String> {
    introspection
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}
