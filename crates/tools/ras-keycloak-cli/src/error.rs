use ras_identity_keycloak::KeycloakError;
use thiserror::Error;

/// Errors reported by the `ras-keycloak` tool
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Keycloak(#[from] KeycloakError),

    #[error("Token is not active")]
    TokenInactive,

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}
