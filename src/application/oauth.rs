use crate::domain::models::OAuthToken;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{OAuthConfig, TokenEndpoint, TokenGrant};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

const TOKEN_LEEWAY_SECONDS: i64 = 60;

/// What the session can do with the stored token right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    Ready(OAuthToken),
    NeedsAuthorization,
}

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Owns the token lifecycle: code redemption, freshness checks, and
/// refresh-and-rewrite against the store. Callers serialize access so the
/// read-check-refresh-write cycle stays a single critical section.
pub struct TokenKeeper<S, C>
where
    S: CredentialStore,
    C: TokenEndpoint,
{
    config: OAuthConfig,
    store: Arc<S>,
    endpoint: Arc<C>,
    now: NowProvider,
}

impl<S, C> TokenKeeper<S, C>
where
    S: CredentialStore,
    C: TokenEndpoint,
{
    pub fn new(config: OAuthConfig, store: Arc<S>, endpoint: Arc<C>) -> Self {
        Self {
            config,
            store,
            endpoint,
            now: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now: NowProvider) -> Self {
        self.now = now;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Exchange an interactive authorization code and persist the token.
    pub async fn redeem_authorization_code(&self, code: &str) -> Result<OAuthToken, InfraError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(InfraError::Auth(
                "authorization code must not be empty".to_string(),
            ));
        }

        let grant = self.endpoint.exchange_code(&self.config, code).await?;
        let token = self.absorb_grant(grant, None);
        self.store.save_token(&token)?;
        Ok(token)
    }

    /// Loads the stored token, refreshing and rewriting it when stale. A
    /// refresh the endpoint rejects means the refresh token itself is dead,
    /// which demands interactive re-authorization rather than an error.
    pub async fn current_token(&self) -> Result<TokenState, InfraError> {
        let Some(stored) = self.store.load_token()? else {
            return Ok(TokenState::NeedsAuthorization);
        };
        if self.fresh(&stored) {
            return Ok(TokenState::Ready(stored));
        }
        let Some(refresh_token) = stored.refresh_token.clone() else {
            return Ok(TokenState::NeedsAuthorization);
        };

        match self.endpoint.refresh(&self.config, &refresh_token).await {
            Ok(grant) => {
                let token = self.absorb_grant(grant, Some(refresh_token));
                self.store.save_token(&token)?;
                Ok(TokenState::Ready(token))
            }
            Err(InfraError::Auth(_)) => Ok(TokenState::NeedsAuthorization),
            Err(error) => Err(error),
        }
    }

    pub fn forget_token(&self) -> Result<(), InfraError> {
        self.store.delete_token()
    }

    fn fresh(&self, token: &OAuthToken) -> bool {
        token.is_valid_at((self.now)(), TOKEN_LEEWAY_SECONDS)
    }

    /// A refresh grant may omit the refresh token; the previous one stays
    /// valid and is carried forward.
    fn absorb_grant(&self, grant: TokenGrant, previous_refresh: Option<String>) -> OAuthToken {
        OAuthToken {
            access_token: grant.access_token,
            refresh_token: grant.refresh_token.or(previous_refresh),
            expires_at: (self.now)() + Duration::seconds(grant.expires_in.unwrap_or(0).max(0)),
            token_type: grant.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: grant.scope,
        }
    }
}
