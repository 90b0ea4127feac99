//! OAuth 2.0 authorization-code flow for GitHub and Google

use dashmap::DashMap;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

use super::{AuthError, User};
use crate::config::{OAuthCredentials, SiteConfig};
use crate::helpers::full_url_for;

/// How long a sign-in attempt may take between redirect and callback
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    GitHub,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::GitHub, Provider::Google];

    /// Identifier used in routes
    pub fn id(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Google => "google",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::GitHub => "GitHub",
            Provider::Google => "Google",
        }
    }

    fn scope(&self) -> &'static str {
        match self {
            Provider::GitHub => "read:user user:email",
            Provider::Google => "openid email profile",
        }
    }

    pub fn default_endpoints(&self) -> ProviderEndpoints {
        match self {
            Provider::GitHub => ProviderEndpoints {
                authorize: "https://github.com/login/oauth/authorize".to_string(),
                token: "https://github.com/login/oauth/access_token".to_string(),
                profile: "https://api.github.com/user".to_string(),
            },
            Provider::Google => ProviderEndpoints {
                authorize: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token: "https://oauth2.googleapis.com/token".to_string(),
                profile: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
            },
        }
    }
}

impl FromStr for Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|p| p.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| AuthError::UnknownProvider(s.to_string()))
    }
}

/// URLs of one provider's OAuth endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize: String,
    pub token: String,
    pub profile: String,
}

/// A sign-in started but not yet completed
#[derive(Debug, Clone)]
struct PendingSignIn {
    provider: Provider,
    callback: Option<String>,
    started: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Deserialize)]
struct GitHubProfile {
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Deserialize)]
struct GoogleProfile {
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

/// Configured providers and in-flight sign-ins
pub struct OAuth {
    http: Client,
    base_url: String,
    credentials: HashMap<Provider, OAuthCredentials>,
    endpoints: HashMap<Provider, ProviderEndpoints>,
    pending: DashMap<String, PendingSignIn>,
}

impl OAuth {
    pub fn new(config: &SiteConfig) -> Result<Self, AuthError> {
        let http = Client::builder()
            .user_agent(concat!("gitpress/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| AuthError::Http {
                url: String::new(),
                source,
            })?;

        let mut credentials = HashMap::new();
        if let Some(github) = &config.auth.github {
            credentials.insert(Provider::GitHub, github.clone());
        }
        if let Some(google) = &config.auth.google {
            credentials.insert(Provider::Google, google.clone());
        }

        let endpoints = Provider::ALL
            .into_iter()
            .map(|p| (p, p.default_endpoints()))
            .collect();

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            credentials,
            endpoints,
            pending: DashMap::new(),
        })
    }

    /// Point a provider at other endpoints
    pub fn with_endpoints(mut self, provider: Provider, endpoints: ProviderEndpoints) -> Self {
        self.endpoints.insert(provider, endpoints);
        self
    }

    /// Providers with credentials, in display order
    pub fn enabled(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.credentials.contains_key(p))
            .collect()
    }

    fn credentials(&self, provider: Provider) -> Result<&OAuthCredentials, AuthError> {
        self.credentials
            .get(&provider)
            .ok_or(AuthError::ProviderDisabled(provider.display_name()))
    }

    fn endpoints(&self, provider: Provider) -> ProviderEndpoints {
        self.endpoints
            .get(&provider)
            .cloned()
            .unwrap_or_else(|| provider.default_endpoints())
    }

    pub fn redirect_uri(&self, provider: Provider) -> String {
        full_url_for(&self.base_url, &format!("/auth/callback/{}", provider.id()))
    }

    /// Start a sign-in: remember a fresh `state` and build the provider URL
    pub fn authorize_url(
        &self,
        provider: Provider,
        callback: Option<&str>,
    ) -> Result<String, AuthError> {
        let credentials = self.credentials(provider)?;
        self.purge_expired();

        let state = Uuid::new_v4().simple().to_string();
        self.pending.insert(
            state.clone(),
            PendingSignIn {
                provider,
                callback: callback.filter(|c| is_local_path(c)).map(str::to_string),
                started: Instant::now(),
            },
        );

        let endpoints = self.endpoints(provider);
        let mut url = Url::parse(&endpoints.authorize).map_err(|e| AuthError::TokenExchange {
            provider: provider.display_name(),
            reason: format!("invalid authorize endpoint: {}", e),
        })?;
        url.query_pairs_mut()
            .append_pair("client_id", &credentials.client_id)
            .append_pair("redirect_uri", &self.redirect_uri(provider))
            .append_pair("scope", provider.scope())
            .append_pair("state", &state)
            .append_pair("response_type", "code");
        Ok(url.to_string())
    }

    /// Consume a `state`; each is accepted once, within [`STATE_TTL`], for the
    /// provider that issued it. Returns the page to go back to.
    pub fn take_state(&self, provider: Provider, state: &str) -> Result<Option<String>, AuthError> {
        let (_, pending) = self.pending.remove(state).ok_or(AuthError::InvalidState)?;
        if pending.provider != provider || pending.started.elapsed() >= STATE_TTL {
            return Err(AuthError::InvalidState);
        }
        Ok(pending.callback)
    }

    fn purge_expired(&self) {
        self.pending
            .retain(|_, pending| pending.started.elapsed() < STATE_TTL);
    }

    /// Number of sign-ins awaiting their callback
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Trade an authorization code for an access token
    pub async fn exchange_code(&self, provider: Provider, code: &str) -> Result<String, AuthError> {
        let credentials = self.credentials(provider)?;
        let url = self.endpoints(provider).token;
        let redirect_uri = self.redirect_uri(provider);
        let form = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|source| AuthError::Http {
                url: url.clone(),
                source,
            })?;
        if !response.status().is_success() && response.status().as_u16() != 400 {
            return Err(AuthError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|source| AuthError::Http { url, source })?;
        match token.access_token {
            Some(access_token) if !access_token.is_empty() => Ok(access_token),
            _ => Err(AuthError::TokenExchange {
                provider: provider.display_name(),
                reason: token
                    .error_description
                    .or(token.error)
                    .unwrap_or_else(|| "no access token in response".to_string()),
            }),
        }
    }

    /// Profile of the user owning an access token
    pub async fn fetch_user(&self, provider: Provider, access_token: &str) -> Result<User, AuthError> {
        let url = self.endpoints(provider).profile;
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| AuthError::Http {
                url: url.clone(),
                source,
            })?;
        if !response.status().is_success() {
            return Err(AuthError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let user = match provider {
            Provider::GitHub => {
                let profile: GitHubProfile = response
                    .json()
                    .await
                    .map_err(|source| AuthError::Http { url, source })?;
                User {
                    name: profile
                        .name
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| profile.login.clone()),
                    login: Some(profile.login),
                    email: profile.email,
                    image: profile.avatar_url,
                }
            }
            Provider::Google => {
                let profile: GoogleProfile = response
                    .json()
                    .await
                    .map_err(|source| AuthError::Http { url, source })?;
                User {
                    name: profile
                        .name
                        .or_else(|| profile.email.clone())
                        .unwrap_or_else(|| "Google user".to_string()),
                    login: None,
                    email: profile.email,
                    image: profile.picture,
                }
            }
        };
        Ok(user)
    }

    /// Finish a sign-in from the provider's callback parameters
    pub async fn complete(
        &self,
        provider: Provider,
        code: &str,
        state: &str,
    ) -> Result<(User, Option<String>), AuthError> {
        let callback = self.take_state(provider, state)?;
        let token = self.exchange_code(provider, code).await?;
        let user = self.fetch_user(provider, &token).await?;
        tracing::debug!("{} sign-in completed for {}", provider.display_name(), user.name);
        Ok((user, callback))
    }
}

/// Only same-site paths are accepted as post-sign-in destinations
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use serde_json::{json, Value};

    fn config() -> SiteConfig {
        let mut config = SiteConfig::default();
        config.base_url = "https://blog.example.com".to_string();
        config.auth.github = Some(OAuthCredentials {
            client_id: "gh-id".to_string(),
            client_secret: "gh-secret".to_string(),
        });
        config
    }

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_provider_ids() {
        assert_eq!("github".parse::<Provider>().unwrap(), Provider::GitHub);
        assert_eq!("Google".parse::<Provider>().unwrap(), Provider::Google);
        assert!(matches!(
            "gitlab".parse::<Provider>(),
            Err(AuthError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_enabled_providers() {
        let oauth = OAuth::new(&config()).unwrap();
        assert_eq!(oauth.enabled(), vec![Provider::GitHub]);
        assert!(matches!(
            oauth.authorize_url(Provider::Google, None),
            Err(AuthError::ProviderDisabled("Google"))
        ));
    }

    #[test]
    fn test_authorize_url() {
        let oauth = OAuth::new(&config()).unwrap();
        let url = oauth.authorize_url(Provider::GitHub, Some("/editor")).unwrap();
        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));

        let params = query(&url);
        assert_eq!(params["client_id"], "gh-id");
        assert_eq!(
            params["redirect_uri"],
            "https://blog.example.com/auth/callback/github"
        );
        assert_eq!(params["scope"], "read:user user:email");
        assert_eq!(oauth.pending_len(), 1);

        let callback = oauth.take_state(Provider::GitHub, &params["state"]).unwrap();
        assert_eq!(callback.as_deref(), Some("/editor"));
    }

    #[test]
    fn test_state_is_single_use_and_provider_bound() {
        let oauth = OAuth::new(&config()).unwrap();
        let url = oauth.authorize_url(Provider::GitHub, None).unwrap();
        let state = query(&url)["state"].clone();

        assert!(oauth.take_state(Provider::GitHub, &state).is_ok());
        assert!(matches!(
            oauth.take_state(Provider::GitHub, &state),
            Err(AuthError::InvalidState)
        ));

        let url = oauth.authorize_url(Provider::GitHub, None).unwrap();
        let state = query(&url)["state"].clone();
        assert!(oauth.take_state(Provider::Google, &state).is_err());
    }

    #[test]
    fn test_offsite_callback_is_dropped() {
        let oauth = OAuth::new(&config()).unwrap();
        let url = oauth
            .authorize_url(Provider::GitHub, Some("https://evil.example.com/"))
            .unwrap();
        let state = query(&url)["state"].clone();
        assert_eq!(oauth.take_state(Provider::GitHub, &state).unwrap(), None);
        assert!(!is_local_path("//evil.example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_expires() {
        let oauth = OAuth::new(&config()).unwrap();
        let url = oauth.authorize_url(Provider::GitHub, None).unwrap();
        let state = query(&url)["state"].clone();

        tokio::time::advance(STATE_TTL + Duration::from_secs(1)).await;
        assert!(matches!(
            oauth.take_state(Provider::GitHub, &state),
            Err(AuthError::InvalidState)
        ));
    }

    async fn mock_provider() -> String {
        async fn token(Form(form): Form<HashMap<String, String>>) -> Json<Value> {
            if form.get("code").map(String::as_str) == Some("good")
                && form.get("client_secret").map(String::as_str) == Some("gh-secret")
            {
                Json(json!({ "access_token": "tok", "token_type": "bearer" }))
            } else {
                Json(json!({
                    "error": "bad_verification_code",
                    "error_description": "The code passed is incorrect or expired."
                }))
            }
        }

        async fn profile() -> Json<Value> {
            Json(json!({
                "login": "octocat",
                "name": null,
                "email": "octo@example.com",
                "avatar_url": "https://avatars.example.com/octo.png"
            }))
        }

        let app = Router::new()
            .route("/token", post(token))
            .route("/user", get(profile));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_complete_sign_in() {
        let base = mock_provider().await;
        let oauth = OAuth::new(&config()).unwrap().with_endpoints(
            Provider::GitHub,
            ProviderEndpoints {
                authorize: format!("{}/authorize", base),
                token: format!("{}/token", base),
                profile: format!("{}/user", base),
            },
        );

        let url = oauth.authorize_url(Provider::GitHub, Some("/editor")).unwrap();
        let state = query(&url)["state"].clone();

        let (user, callback) = oauth
            .complete(Provider::GitHub, "good", &state)
            .await
            .unwrap();
        assert_eq!(user.name, "octocat");
        assert_eq!(user.login.as_deref(), Some("octocat"));
        assert_eq!(user.email.as_deref(), Some("octo@example.com"));
        assert_eq!(callback.as_deref(), Some("/editor"));

        let err = oauth.exchange_code(Provider::GitHub, "bad").await.unwrap_err();
        assert!(err.to_string().contains("incorrect or expired"));
    }
}
