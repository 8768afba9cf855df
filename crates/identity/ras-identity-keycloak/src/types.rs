//! OIDC response types.
//!
//! The identity provider's bodies are kept as opaque JSON maps; only the
//! fields this crate acts on get typed accessors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Successful token endpoint response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TokenResponse {
    /// Extract the token from a parsed body. Returns `None` unless the body is
    /// an object with a string `access_token`.
    pub fn from_json(body: Value) -> Option<Self> {
        let Value::Object(mut fields) = body else {
            return None;
        };
        match fields.remove("access_token") {
            Some(Value::String(access_token)) => Some(Self {
                access_token,
                fields,
            }),
            _ => None,
        }
    }

    pub fn into_access_token(self) -> String {
        self.access_token
    }

    pub fn token_type(&self) -> Option<&str> {
        self.fields.get("token_type").and_then(Value::as_str)
    }

    pub fn expires_in(&self) -> Option<u64> {
        self.fields.get("expires_in").and_then(as_seconds)
    }

    pub fn refresh_expires_in(&self) -> Option<u64> {
        self.fields.get("refresh_expires_in").and_then(as_seconds)
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.fields.get("refresh_token").and_then(Value::as_str)
    }

    pub fn id_token(&self) -> Option<&str> {
        self.fields.get("id_token").and_then(Value::as_str)
    }

    pub fn scope(&self) -> Option<&str> {
        self.fields.get("scope").and_then(Value::as_str)
    }
}

/// OAuth2 error body (`{"error": ..., "error_description": ...}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl ErrorResponse {
    pub fn from_json(body: &Value) -> Option<Self> {
        let error = body.get("error")?.as_str()?.to_string();
        let error_description = body
            .get("error_description")
            .and_then(Value::as_str)
            .map(str::to_string);
        Some(Self {
            error,
            error_description,
        })
    }
}

/// Body of a 200 introspection response.
///
/// A result with `active() == false` is a definitive answer from the
/// identity provider, not a failed lookup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntrospectionResult(Map<String, Value>);

impl IntrospectionResult {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// `false` when the field is missing or not a boolean.
    pub fn active(&self) -> bool {
        self.0.get("active").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn subject(&self) -> Option<&str> {
        self.str_claim("sub")
    }

    pub fn username(&self) -> Option<&str> {
        self.str_claim("username")
    }

    pub fn client_id(&self) -> Option<&str> {
        self.str_claim("client_id")
    }

    pub fn scope(&self) -> Option<&str> {
        self.str_claim("scope")
    }

    pub fn token_type(&self) -> Option<&str> {
        self.str_claim("token_type")
    }

    /// `exp` claim, seconds since the Unix epoch.
    pub fn expires_at(&self) -> Option<u64> {
        self.0.get("exp").and_then(as_seconds)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn claims(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn str_claim(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Realm metadata published at `.well-known/openid-configuration`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiscoveryDocument(Map<String, Value>);

impl DiscoveryDocument {
    pub fn new(metadata: Map<String, Value>) -> Self {
        Self(metadata)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.str_field("issuer")
    }

    pub fn authorization_endpoint(&self) -> Option<&str> {
        self.str_field("authorization_endpoint")
    }

    pub fn token_endpoint(&self) -> Option<&str> {
        self.str_field("token_endpoint")
    }

    pub fn introspection_endpoint(&self) -> Option<&str> {
        self.str_field("introspection_endpoint")
    }

    pub fn userinfo_endpoint(&self) -> Option<&str> {
        self.str_field("userinfo_endpoint")
    }

    pub fn end_session_endpoint(&self) -> Option<&str> {
        self.str_field("end_session_endpoint")
    }

    pub fn jwks_uri(&self) -> Option<&str> {
        self.str_field("jwks_uri")
    }

    pub fn grant_types_supported(&self) -> Vec<&str> {
        self.0
            .get("grant_types_supported")
            .and_then(Value::as_array)
            .map(|grants| grants.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn supports_grant_type(&self, grant_type: &str) -> bool {
        self.grant_types_supported().contains(&grant_type)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

/// Username/password login payload, optionally with a one-time passcode.
#[derive(Clone, Serialize, Deserialize)]
pub struct PasswordCredentials {
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp: Option<String>,
}

impl PasswordCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            totp: None,
        }
    }

    pub fn with_totp(mut self, totp: impl fmt::Display) -> Self {
        self.totp = Some(totp.to_string());
        self
    }
}

impl fmt::Debug for PasswordCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("totp", &self.totp.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// A user whose credentials were accepted by Keycloak and whose token
/// introspected as active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub provider_id: String,
    pub subject: String,
    pub username: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    pub metadata: Option<Value>,
}

// Keycloak serializes numeric claims as JSON numbers, some proxies turn them
// into strings.
fn as_seconds(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
