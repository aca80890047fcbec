use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use url::Url;

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/oauth2/callback";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// OAuth client registration, normally loaded from a Google installed-app
/// client secret file. Endpoint overrides in the file win over the defaults.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretSection>,
    web: Option<ClientSecretSection>,
}

#[derive(Debug, Deserialize)]
struct ClientSecretSection {
    client_id: Option<String>,
    client_secret: Option<String>,
    token_uri: Option<String>,
    auth_uri: Option<String>,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            scopes: vec![CALENDAR_SCOPE.to_string()],
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        }
    }

    /// Reads a Google client secret file (`installed` or `web` section).
    /// A missing or empty file is offline mode, never an error.
    pub fn from_client_secret_file(path: &Path) -> Result<Option<Self>, InfraError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        let file: ClientSecretFile = serde_json::from_str(&raw).map_err(|error| {
            InfraError::InvalidConfig(format!("client secret file is not valid JSON: {error}"))
        })?;
        let section = file.installed.or(file.web).ok_or_else(|| {
            InfraError::InvalidConfig(
                "client secret file must contain an 'installed' or 'web' section".to_string(),
            )
        })?;

        let client_id = trimmed(section.client_id).ok_or_else(|| {
            InfraError::InvalidConfig("client secret file is missing 'client_id'".to_string())
        })?;
        let client_secret = trimmed(section.client_secret).ok_or_else(|| {
            InfraError::InvalidConfig("client secret file is missing 'client_secret'".to_string())
        })?;

        let mut config = Self::new(client_id, client_secret);
        if let Some(redirect_uri) = section.redirect_uris.into_iter().find_map(|uri| trimmed(Some(uri))) {
            config.redirect_uri = redirect_uri;
        }
        if let Some(token_uri) = trimmed(section.token_uri) {
            config.token_endpoint = token_uri;
        }
        if let Some(auth_uri) = trimmed(section.auth_uri) {
            config.authorization_endpoint = auth_uri;
        }
        Ok(Some(config))
    }

    /// Consent-screen URL requesting offline access, so the grant carries a
    /// refresh token.
    pub fn authorization_url(&self, state: &str) -> Result<String, InfraError> {
        if state.trim().is_empty() {
            return Err(InfraError::Auth("state must not be empty".to_string()));
        }
        if self.scopes.is_empty() {
            return Err(InfraError::Auth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.authorization_endpoint)
            .map_err(|error| InfraError::Auth(format!("invalid authorization endpoint: {error}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);
        Ok(url.to_string())
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

/// Successful token-endpoint response, shared by the code-exchange and
/// refresh grants.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// The two grants this app performs against the token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(&self, config: &OAuthConfig, code: &str)
        -> Result<TokenGrant, InfraError>;

    async fn refresh(
        &self,
        config: &OAuthConfig,
        refresh_token: &str,
    ) -> Result<TokenGrant, InfraError>;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TokenEndpointReply {
    Grant(TokenGrant),
    Failure {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestTokenEndpoint {
    client: Client,
}

impl ReqwestTokenEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    async fn grant(&self, endpoint: &str, form: &[(&str, &str)]) -> Result<TokenGrant, InfraError> {
        let response = self
            .client
            .post(endpoint)
            .form(form)
            .send()
            .await
            .map_err(|error| InfraError::Auth(format!("token request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Auth(format!("failed reading token response: {error}")))?;

        match serde_json::from_str::<TokenEndpointReply>(&body) {
            Ok(TokenEndpointReply::Grant(grant)) if status.is_success() => Ok(grant),
            Ok(TokenEndpointReply::Grant(_)) => Err(InfraError::Auth(format!(
                "token endpoint error: http {}",
                status.as_u16()
            ))),
            Ok(TokenEndpointReply::Failure {
                error,
                error_description,
            }) => {
                let detail = error_description.map(|d| format!("; {d}")).unwrap_or_default();
                Err(InfraError::Auth(format!(
                    "token endpoint rejected the grant: {error}{detail}"
                )))
            }
            Err(parse_error) => Err(InfraError::Auth(format!(
                "unrecognized token response (http {}): {parse_error}",
                status.as_u16()
            ))),
        }
    }
}

#[async_trait]
impl TokenEndpoint for ReqwestTokenEndpoint {
    async fn exchange_code(
        &self,
        config: &OAuthConfig,
        code: &str,
    ) -> Result<TokenGrant, InfraError> {
        self.grant(
            &config.token_endpoint,
            &[
                ("grant_type", "authorization_code"),
                ("client_id", &config.client_id),
                ("client_secret", &config.client_secret),
                ("redirect_uri", &config.redirect_uri),
                ("code", code),
            ],
        )
        .await
    }

    async fn refresh(
        &self,
        config: &OAuthConfig,
        refresh_token: &str,
    ) -> Result<TokenGrant, InfraError> {
        self.grant(
            &config.token_endpoint,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &config.client_id),
                ("client_secret", &config.client_secret),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_FILE: AtomicUsize = AtomicUsize::new(0);

    struct TempSecretFile {
        path: PathBuf,
    }

    impl TempSecretFile {
        fn with_content(content: &str) -> Self {
            let sequence = NEXT_TEMP_FILE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "agenda-client-secret-{}-{}.json",
                std::process::id(),
                sequence
            ));
            fs::write(&path, content).expect("write client secret");
            Self { path }
        }
    }

    impl Drop for TempSecretFile {
        fn drop(&mut self) {
            let _ = fs::remove_file(&self.path);
        }
    }

    #[test]
    fn client_secret_installed_section_overrides_defaults() {
        let file = TempSecretFile::with_content(
            r#"{"installed":{"client_id":"id-1","client_secret":"secret-1","token_uri":"https://example.test/token","redirect_uris":["http://localhost:9004/"]}}"#,
        );
        let config = OAuthConfig::from_client_secret_file(&file.path)
            .expect("parse")
            .expect("config present");
        assert_eq!(config.client_id, "id-1");
        assert_eq!(config.redirect_uri, "http://localhost:9004/");
        assert_eq!(config.token_endpoint, "https://example.test/token");
        assert_eq!(config.authorization_endpoint, DEFAULT_AUTHORIZATION_ENDPOINT);
    }

    #[test]
    fn client_secret_web_section_keeps_defaults() {
        let file = TempSecretFile::with_content(
            r#"{"web":{"client_id":"id-2","client_secret":"secret-2"}}"#,
        );
        let config = OAuthConfig::from_client_secret_file(&file.path)
            .expect("parse")
            .expect("config present");
        assert_eq!(config.client_id, "id-2");
        assert_eq!(config.redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.scopes, vec![CALENDAR_SCOPE.to_string()]);
    }

    #[test]
    fn missing_client_secret_file_means_offline() {
        let path = std::env::temp_dir().join("agenda-client-secret-does-not-exist.json");
        assert!(OAuthConfig::from_client_secret_file(&path)
            .expect("parse")
            .is_none());
    }

    #[test]
    fn client_secret_without_known_section_is_rejected() {
        let file = TempSecretFile::with_content(r#"{"other":{}}"#);
        assert!(OAuthConfig::from_client_secret_file(&file.path).is_err());

        let file = TempSecretFile::with_content(r#"{"installed":{"client_id":"only-id"}}"#);
        assert!(OAuthConfig::from_client_secret_file(&file.path).is_err());
    }

    #[test]
    fn authorization_url_requests_offline_access() {
        let config = OAuthConfig::new("client-id", "client-secret");
        let url = config.authorization_url("state-1").expect("url");
        assert!(url.starts_with(DEFAULT_AUTHORIZATION_ENDPOINT));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("client_id=client-id"));
        assert!(config.authorization_url("  ").is_err());
    }

    #[test]
    fn token_endpoint_reply_distinguishes_grants_from_failures() {
        let reply: TokenEndpointReply = serde_json::from_str(
            r#"{"access_token":"at","expires_in":3600,"token_type":"Bearer"}"#,
        )
        .expect("grant reply");
        assert!(matches!(
            reply,
            TokenEndpointReply::Grant(TokenGrant { ref access_token, .. }) if access_token == "at"
        ));

        let reply: TokenEndpointReply = serde_json::from_str(
            r#"{"error":"invalid_grant","error_description":"Bad Request"}"#,
        )
        .expect("failure reply");
        assert!(matches!(reply, TokenEndpointReply::Failure { ref error, .. } if error == "invalid_grant"));
    }
}
