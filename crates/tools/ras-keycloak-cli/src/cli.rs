use crate::error::CliError;
use clap::{Args as ClapArgs, Parser, Subcommand};
use ras_identity_keycloak::{
    KeycloakClient, KeycloakConfig, KeycloakPasswordProvider, PasswordCredentials,
};
use std::time::Duration;
use tracing::debug;

/// Request, introspect and inspect tokens from a Keycloak realm
#[derive(Parser, Debug, Clone)]
#[command(name = "ras-keycloak")]
#[command(about = "Request, introspect and inspect tokens from a Keycloak realm")]
#[command(version = "0.1.0")]
pub struct Args {
    /// Base URL of the Keycloak server (e.g., https://auth.example.com)
    #[arg(long, env = "KEYCLOAK_DOMAIN", value_name = "URL")]
    pub domain: String,

    /// Realm the client is registered in
    #[arg(long, env = "KEYCLOAK_REALM")]
    pub realm: String,

    /// Confidential client ID
    #[arg(long, env = "KEYCLOAK_CLIENT_ID")]
    pub client_id: String,

    /// Confidential client secret
    #[arg(long, env = "KEYCLOAK_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "KEYCLOAK_TIMEOUT_SECS", default_value_t = 300)]
    pub timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Obtain a token with the password grant
    Token {
        #[command(flatten)]
        login: LoginArgs,

        /// Print only the access token
        #[arg(long)]
        raw: bool,
    },

    /// Introspect a token
    Introspect {
        /// Token to introspect
        #[arg(long)]
        token: String,

        /// Fail when the token is not active
        #[arg(long)]
        require_active: bool,
    },

    /// Print the realm's OpenID Connect discovery document
    Discovery,

    /// Log in and introspect the issued token, printing the verified identity
    Verify {
        #[command(flatten)]
        login: LoginArgs,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Token { .. } => "token",
            Command::Introspect { .. } => "introspect",
            Command::Discovery => "discovery",
            Command::Verify { .. } => "verify",
        }
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct LoginArgs {
    #[arg(short, long, env = "KEYCLOAK_USERNAME")]
    pub username: String,

    #[arg(short, long, env = "KEYCLOAK_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// One-time passcode for realms that require a second factor
    #[arg(long, value_name = "CODE")]
    pub totp: Option<String>,
}

impl LoginArgs {
    fn credentials(&self) -> PasswordCredentials {
        let credentials = PasswordCredentials::new(&self.username, &self.password);
        match &self.totp {
            Some(totp) => credentials.with_totp(totp),
            None => credentials,
        }
    }
}

impl Args {
    pub fn keycloak_config(&self) -> KeycloakConfig {
        KeycloakConfig::new(
            &self.domain,
            &self.realm,
            &self.client_id,
            &self.client_secret,
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Run the selected command and return what should be printed.
    pub async fn run(&self) -> Result<String, CliError> {
        let client = KeycloakClient::with_reqwest(self.keycloak_config(), self.timeout())?;
        debug!(command = self.command.name(), realm = %self.realm, "Running command");
        self.execute(&client).await
    }

    pub async fn execute(&self, client: &KeycloakClient) -> Result<String, CliError> {
        match &self.command {
            Command::Token { login, raw } => {
                let token = match &login.totp {
                    Some(totp) => {
                        client
                            .password_totp_grant(&login.username, &login.password, totp)
                            .await?
                    }
                    None => client.password_grant(&login.username, &login.password).await?,
                };
                if *raw {
                    Ok(token.access_token)
                } else {
                    Ok(serde_json::to_string_pretty(&token)?)
                }
            }
            Command::Introspect {
                token,
                require_active,
            } => {
                let result = client.introspect(token).await?;
                if *require_active && !result.active() {
                    return Err(CliError::TokenInactive);
                }
                Ok(serde_json::to_string_pretty(&result)?)
            }
            Command::Discovery => {
                let document = client.well_known_configuration().await?;
                Ok(serde_json::to_string_pretty(&document)?)
            }
            Command::Verify { login } => {
                let provider = KeycloakPasswordProvider::new(client.clone());
                let identity = provider.verify(&login.credentials()).await?;
                Ok(serde_json::to_string_pretty(&identity)?)
            }
        }
    }
}
