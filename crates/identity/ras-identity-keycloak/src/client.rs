//! Keycloak OIDC client for the password grant, introspection and discovery.

use crate::config::{DEFAULT_HTTP_TIMEOUT, KeycloakConfig};
use crate::error::{KeycloakError, KeycloakResult, TransportError};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::types::{DiscoveryDocument, ErrorResponse, IntrospectionResult, TokenResponse};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const INVALID_GRANT: &str = "invalid_grant";

/// Client for a single confidential client in a Keycloak realm.
///
/// Every operation is one request/response exchange. Each comes in two
/// forms: a `KeycloakResult` form that reports why a call failed, and an
/// `Option` form that collapses every failure to `None`.
///
/// Cloning is cheap; clones share the configuration and the transport.
/// Dropping an operation's future abandons the in-flight request.
#[derive(Clone)]
pub struct KeycloakClient {
    config: Arc<KeycloakConfig>,
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl KeycloakClient {
    /// Store the configuration as given. No validation, no network activity.
    pub fn new(config: KeycloakConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Like [`KeycloakClient::new`], but rejects an invalid configuration.
    pub fn try_new(config: KeycloakConfig, transport: Arc<dyn HttpTransport>) -> KeycloakResult<Self> {
        config.validate()?;
        Ok(Self::new(config, transport))
    }

    /// Build a client over a fresh [`ReqwestTransport`] using `timeout` for
    /// both the HTTP layer and the per-call deadline.
    pub fn with_reqwest(config: KeycloakConfig, timeout: Duration) -> KeycloakResult<Self> {
        let transport = ReqwestTransport::new(timeout)?;
        Ok(Self::new(config, Arc::new(transport)).with_timeout(timeout))
    }

    /// Deadline applied to every transport call, on top of whatever the
    /// transport enforces itself.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &KeycloakConfig {
        &self.config
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Exchange a username and password for tokens (`grant_type=password`).
    pub async fn password_grant(&self, username: &str, password: &str) -> KeycloakResult<TokenResponse> {
        let form = self.password_form(username, password);
        self.request_token(form).await
    }

    /// Password grant with a one-time passcode, sent as the `totp` form field.
    pub async fn password_totp_grant(
        &self,
        username: &str,
        password: &str,
        totp: impl fmt::Display,
    ) -> KeycloakResult<TokenResponse> {
        let mut form = self.password_form(username, password);
        form.push(("totp", totp.to_string()));
        self.request_token(form).await
    }

    /// Ask the realm whether `token` is active.
    ///
    /// Only a 200 response yields a result; check [`IntrospectionResult::active`]
    /// to tell an inactive token from a live one.
    pub async fn introspect(&self, token: &str) -> KeycloakResult<IntrospectionResult> {
        let url = self.config.introspection_endpoint()?;
        let request = HttpRequest::post_form(
            url,
            [
                ("token", token.to_string()),
                ("client_id", self.config.client_id.clone()),
                ("client_secret", self.config.client_secret.clone()),
            ],
        );

        let response = self.send(request).await?;
        let claims = expect_ok_object(response, "introspection")?;
        Ok(IntrospectionResult::new(claims))
    }

    /// Fetch the realm's OpenID Connect discovery document.
    pub async fn well_known_configuration(&self) -> KeycloakResult<DiscoveryDocument> {
        let url = self.config.discovery_endpoint()?;
        let response = self.send(HttpRequest::get(url)).await?;
        let metadata = expect_ok_object(response, "discovery")?;
        Ok(DiscoveryDocument::new(metadata))
    }

    /// Access token for `username`/`password`, or `None` on any failure.
    pub async fn acquire_token_password(&self, username: &str, password: &str) -> Option<String> {
        absent_on_error(
            "password grant",
            self.password_grant(username, password).await,
        )
        .map(TokenResponse::into_access_token)
    }

    /// Access token for `username`/`password`/`totp`, or `None` on any failure.
    pub async fn acquire_token_password_totp(
        &self,
        username: &str,
        password: &str,
        totp: impl fmt::Display,
    ) -> Option<String> {
        absent_on_error(
            "password+totp grant",
            self.password_totp_grant(username, password, totp).await,
        )
        .map(TokenResponse::into_access_token)
    }

    /// Introspection claims, or `None` when the lookup itself failed.
    pub async fn introspect_token(&self, token: &str) -> Option<IntrospectionResult> {
        absent_on_error("introspection", self.introspect(token).await)
    }

    /// Discovery document, or `None` on any failure.
    pub async fn get_well_known_configuration(&self) -> Option<DiscoveryDocument> {
        absent_on_error("discovery", self.well_known_configuration().await)
    }

    fn password_form(&self, username: &str, password: &str) -> Vec<(&'static str, String)> {
        vec![
            ("grant_type", "password".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("client_secret", self.config.client_secret.clone()),
            ("username", username.to_string()),
            ("password", password.to_string()),
        ]
    }

    async fn request_token(&self, form: Vec<(&'static str, String)>) -> KeycloakResult<TokenResponse> {
        let url = self.config.token_endpoint()?;
        let response = self.send(HttpRequest::post_form(url, form)).await?;
        let status = response.status;

        let body: Value = response.json().map_err(|e| {
            warn!(status, "Token endpoint returned a non-JSON body");
            KeycloakError::MalformedResponse(format!("token response is not JSON: {}", e))
        })?;

        // The body decides the outcome, whatever the status.
        if let Some(token) = TokenResponse::from_json(body.clone()) {
            debug!(status, "Password grant succeeded");
            return Ok(token);
        }

        match ErrorResponse::from_json(&body) {
            Some(err) if err.error == INVALID_GRANT => {
                warn!(status, error = %err.error, "Password grant rejected");
                Err(KeycloakError::InvalidCredentials {
                    description: err.error_description,
                })
            }
            Some(err) => {
                warn!(status, error = %err.error, "Token endpoint returned an error");
                Err(KeycloakError::IdpError {
                    status,
                    error: err.error,
                    description: err.error_description,
                })
            }
            None => Err(KeycloakError::MalformedResponse(
                "token response has neither access_token nor error".to_string(),
            )),
        }
    }

    async fn send(&self, request: HttpRequest) -> KeycloakResult<HttpResponse> {
        debug!(method = ?request.method, url = %request.url, "Sending request to identity provider");

        match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => {
                warn!(error = %err, "Identity provider request failed");
                Err(err.into())
            }
            Err(_) => {
                warn!(timeout = ?self.timeout, "Identity provider request timed out");
                Err(TransportError::Timeout(self.timeout).into())
            }
        }
    }
}

impl fmt::Debug for KeycloakClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeycloakClient")
            .field("config", &self.config)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn expect_ok_object(
    response: HttpResponse,
    what: &str,
) -> KeycloakResult<serde_json::Map<String, Value>> {
    if response.status != 200 {
        warn!(status = response.status, "Unexpected {} response status", what);
        return Err(KeycloakError::UnexpectedStatus {
            status: response.status,
            body: response.text(),
        });
    }

    match response.json::<Value>() {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(KeycloakError::MalformedResponse(format!(
            "{} response is not a JSON object",
            what
        ))),
        Err(e) => Err(KeycloakError::MalformedResponse(format!(
            "{} response is not JSON: {}",
            what, e
        ))),
    }
}

fn absent_on_error<T>(operation: &str, result: KeycloakResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(operation, error = %err, "Collapsing failure to None");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTransport;
    use crate::transport::HttpMethod;
    use serde_json::json;

    fn demo_config() -> KeycloakConfig {
        KeycloakConfig::new("https://kc.example", "demo", "app", "s3cr3t")
    }

    fn client_with(transport: &Arc<RecordingTransport>) -> KeycloakClient {
        KeycloakClient::new(demo_config(), transport.clone())
    }

    #[tokio::test]
    async fn test_password_grant_request_shape() {
        let transport = Arc::new(RecordingTransport::respond_json(
            200,
            json!({"access_token": "abc123", "expires_in": 300}),
        ));
        let client = client_with(&transport);

        let token = client.acquire_token_password("alice", "pw").await;
        assert_eq!(token.as_deref(), Some("abc123"));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.url.as_str(),
            "https://kc.example/realms/demo/protocol/openid-connect/token"
        );
        assert_eq!(
            request.form,
            Some(vec![
                ("grant_type".to_string(), "password".to_string()),
                ("client_id".to_string(), "app".to_string()),
                ("client_secret".to_string(), "s3cr3t".to_string()),
                ("username".to_string(), "alice".to_string()),
                ("password".to_string(), "pw".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn test_totp_sent_as_string_field() {
        let transport = Arc::new(RecordingTransport::respond_json(200, json!({"access_token": "abc123"})));
        let client = client_with(&transport);

        let token = client.acquire_token_password_totp("alice", "pw", 123456).await;
        assert_eq!(token.as_deref(), Some("abc123"));

        let request = transport.last_request().unwrap();
        assert_eq!(request.form_value("totp"), Some("123456"));
        assert_eq!(request.form_value("grant_type"), Some("password"));
        assert_eq!(request.form_value("username"), Some("alice"));
    }

    #[tokio::test]
    async fn test_totp_keeps_leading_zero_when_given_as_string() {
        let transport = Arc::new(RecordingTransport::respond_json(200, json!({"access_token": "abc123"})));
        let client = client_with(&transport);

        client.password_totp_grant("alice", "pw", "012345").await.unwrap();

        assert_eq!(transport.last_request().unwrap().form_value("totp"), Some("012345"));
    }

    #[tokio::test]
    async fn test_invalid_grant_is_invalid_credentials() {
        let transport = Arc::new(RecordingTransport::respond_json(
            400,
            json!({"error": "invalid_grant", "error_description": "bad creds"}),
        ));
        let client = client_with(&transport);

        match client.password_grant("alice", "wrong").await {
            Err(KeycloakError::InvalidCredentials { description }) => {
                assert_eq!(description.as_deref(), Some("bad creds"));
            }
            other => panic!("Expected InvalidCredentials, got: {:?}", other),
        }
        assert!(client.acquire_token_password("alice", "wrong").await.is_none());
    }

    #[tokio::test]
    async fn test_other_oauth_error_is_idp_error() {
        let transport = Arc::new(RecordingTransport::respond_json(
            401,
            json!({"error": "unauthorized_client", "error_description": "Invalid client secret"}),
        ));
        let client = client_with(&transport);

        let err = client.password_grant("alice", "pw").await.unwrap_err();
        assert_eq!(err.status(), Some(401));
        assert!(matches!(err, KeycloakError::IdpError { ref error, .. } if error == "unauthorized_client"));
    }

    #[tokio::test]
    async fn test_token_from_non_200_body_is_still_returned() {
        let transport = Arc::new(RecordingTransport::respond_json(201, json!({"access_token": "abc123"})));
        let client = client_with(&transport);

        assert_eq!(client.acquire_token_password("alice", "pw").await.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_non_json_token_body_is_malformed() {
        let transport = Arc::new(RecordingTransport::respond(HttpResponse::new(
            502,
            "<html>Bad Gateway</html>",
        )));
        let client = client_with(&transport);

        let err = client.password_grant("alice", "pw").await.unwrap_err();
        assert!(matches!(err, KeycloakError::MalformedResponse(_)));
        assert!(client.acquire_token_password("alice", "pw").await.is_none());
    }

    #[tokio::test]
    async fn test_json_without_token_or_error_is_malformed() {
        let transport = Arc::new(RecordingTransport::respond_json(200, json!({"token_type": "Bearer"})));
        let client = client_with(&transport);

        let err = client.password_grant("alice", "pw").await.unwrap_err();
        assert!(matches!(err, KeycloakError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_is_absent() {
        let transport = Arc::new(RecordingTransport::fail(TransportError::Connect(
            "connection refused".to_string(),
        )));
        let client = client_with(&transport);

        assert!(client.password_grant("alice", "pw").await.unwrap_err().is_transport());
        assert!(client.acquire_token_password("alice", "pw").await.is_none());
        assert!(client.acquire_token_password_totp("alice", "pw", 123456).await.is_none());
        assert!(client.introspect_token("abc123").await.is_none());
        assert!(client.get_well_known_configuration().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_transport_times_out() {
        let transport = Arc::new(RecordingTransport::hang());
        let client = client_with(&transport).with_timeout(Duration::from_secs(5));

        match client.password_grant("alice", "pw").await {
            Err(KeycloakError::Transport(TransportError::Timeout(after))) => {
                assert_eq!(after, Duration::from_secs(5));
            }
            other => panic!("Expected timeout, got: {:?}", other),
        }
        assert!(client.acquire_token_password("alice", "pw").await.is_none());
    }

    #[tokio::test]
    async fn test_introspection_request_shape() {
        let transport = Arc::new(RecordingTransport::respond_json(
            200,
            json!({"active": true, "sub": "0c1d", "username": "alice"}),
        ));
        let client = client_with(&transport);

        let result = client.introspect_token("abc123").await.unwrap();
        assert!(result.active());
        assert_eq!(result.username(), Some("alice"));

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.url.as_str(),
            "https://kc.example/realms/demo/protocol/openid-connect/token/introspect"
        );
        assert_eq!(
            request.form,
            Some(vec![
                ("token".to_string(), "abc123".to_string()),
                ("client_id".to_string(), "app".to_string()),
                ("client_secret".to_string(), "s3cr3t".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn test_inactive_token_is_a_result() {
        let transport = Arc::new(RecordingTransport::respond_json(200, json!({"active": false})));
        let client = client_with(&transport);

        let result = client.introspect_token("expired").await.unwrap();
        assert!(!result.active());
        assert_eq!(result.into_inner(), json!({"active": false}).as_object().unwrap().clone());
    }

    #[tokio::test]
    async fn test_introspection_non_200_is_absent() {
        for status in [401u16, 403, 500] {
            let transport = Arc::new(RecordingTransport::respond_json(status, json!({"active": true})));
            let client = client_with(&transport);

            match client.introspect("abc123").await {
                Err(KeycloakError::UnexpectedStatus { status: got, .. }) => assert_eq!(got, status),
                other => panic!("Expected UnexpectedStatus for {}, got: {:?}", status, other),
            }
            assert!(client.introspect_token("abc123").await.is_none());
        }
    }

    #[tokio::test]
    async fn test_introspection_malformed_body() {
        let transport = Arc::new(RecordingTransport::respond(HttpResponse::new(200, "not json")));
        let client = client_with(&transport);
        assert!(matches!(
            client.introspect("abc123").await,
            Err(KeycloakError::MalformedResponse(_))
        ));

        let transport = Arc::new(RecordingTransport::respond_json(200, json!([true])));
        let client = client_with(&transport);
        assert!(matches!(
            client.introspect("abc123").await,
            Err(KeycloakError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_discovery_request_shape_and_passthrough() {
        let document = json!({
            "issuer": "https://kc.example/realms/demo",
            "token_endpoint": "https://kc.example/realms/demo/protocol/openid-connect/token",
            "grant_types_supported": ["password", "refresh_token"],
            "mtls_endpoint_aliases": {"token_endpoint": "https://mtls.kc.example/token"}
        });
        let transport = Arc::new(RecordingTransport::respond_json(200, document.clone()));
        let client = client_with(&transport);

        let doc = client.get_well_known_configuration().await.unwrap();
        assert_eq!(doc.len(), 4);
        assert_eq!(serde_json::to_value(&doc).unwrap(), document);
        assert!(doc.supports_grant_type("password"));

        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Get);
        assert!(request.form.is_none());
        assert_eq!(
            request.url.as_str(),
            "https://kc.example/realms/demo/.well-known/openid-configuration"
        );
    }

    #[tokio::test]
    async fn test_discovery_non_200_is_absent() {
        let transport = Arc::new(RecordingTransport::respond_json(404, json!({"error": "Realm does not exist"})));
        let client = client_with(&transport);

        assert!(client.get_well_known_configuration().await.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_domain_fails_without_request() {
        let transport = Arc::new(RecordingTransport::respond_json(200, json!({"access_token": "abc123"})));
        let client = KeycloakClient::new(
            KeycloakConfig::new("not a url", "demo", "app", "s3cr3t"),
            transport.clone(),
        );

        assert!(matches!(
            client.password_grant("alice", "pw").await,
            Err(KeycloakError::Url(_))
        ));
        assert!(client.acquire_token_password("alice", "pw").await.is_none());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_try_new_validates() {
        let transport: Arc<dyn HttpTransport> = Arc::new(RecordingTransport::respond_json(200, json!({})));

        assert!(KeycloakClient::try_new(demo_config(), transport.clone()).is_ok());

        let empty_realm = KeycloakConfig::new("https://kc.example", "", "app", "s3cr3t");
        assert!(matches!(
            KeycloakClient::try_new(empty_realm, transport),
            Err(KeycloakError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_client_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<KeycloakClient>();
    }

    #[test]
    fn test_debug_hides_secret() {
        let transport = Arc::new(RecordingTransport::respond_json(200, json!({})));
        let client = client_with(&transport);
        assert!(!format!("{:?}", client).contains("s3cr3t"));
    }
}
