// src/api/mod.rs
// REST client for the course backend with bearer auth and token refresh

mod auth;
mod courses;
mod lectures;
mod progress;
pub mod retry;
pub mod routes;
mod types;

pub use retry::RetryPolicy;
pub use types::{
    ApiError, AuthResponse, CourseCreator, CourseSummary, LectureDto, ProgressUpdate,
    RemoteProgressEntry, VideoInfo,
};

use crate::auth::{is_expired, SessionContext, Tokens};
use chrono::Utc;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use types::{RefreshRequest, RefreshResponse};
use url::Url;

/// API client shared by the catalog loader, the remote progress tier and the
/// auth commands. Cloning is cheap and every clone shares the same tokens.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    session: SessionContext,
    refresh_lock: Arc<TokioMutex<()>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("user_id", &self.session.user_id())
            .finish()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, session: SessionContext) -> Result<Self, ApiError> {
        let base_url = parse_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::NetworkError(e.to_string()))?;

        tracing::info!("API client initialized: base_url={}", base_url);

        Ok(Self {
            client,
            base_url,
            session,
            refresh_lock: Arc::new(TokioMutex::new(())),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Same client and tokens, different identity. Used right after login.
    pub fn with_session(&self, session: SessionContext) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            session,
            refresh_lock: Arc::new(TokioMutex::new(())),
        }
    }

    pub fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send_authorized(Method::GET, path, None).await?;
        decode(response).await
    }

    pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let body = to_body(body)?;
        let response = self.send_authorized(Method::POST, path, Some(body)).await?;
        decode(response).await
    }

    pub(crate) async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let body = to_body(body)?;
        self.send_authorized(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    /// Unauthenticated POST for login, register and refresh.
    pub(crate) async fn post_public<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path)?;
        let response = self.client.post(url).json(body).send().await?;
        let response = check_status(response, path).await?;
        decode(response).await
    }

    /// Bearer-authenticated request with one refresh-and-replay on 401.
    ///
    /// An access token whose `exp` has passed is refreshed before the first
    /// attempt. A second 401 after the replay is final.
    async fn send_authorized(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response, ApiError> {
        let url = self.url(path)?;
        let mut token = self.session.tokens().access_token().await;

        if let Some(current) = token.clone() {
            if is_expired(&current, Utc::now()) && self.has_refresh_token().await {
                tracing::info!("Access token expired, refreshing before {} {}", method, path);
                match self.refresh_tokens(Some(&current)).await {
                    Ok(()) => token = self.session.tokens().access_token().await,
                    Err(e) => tracing::warn!("Proactive token refresh failed: {}", e),
                }
            }
        }

        let response = self
            .send_once(&method, &url, body.as_ref(), token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response, path).await;
        }

        tracing::info!("{} {} unauthorized, attempting token refresh", method, path);

        if let Err(e) = self.refresh_tokens(token.as_deref()).await {
            tracing::warn!("Token refresh failed: {}", e);
            return Err(ApiError::AuthenticationError);
        }

        let token = self.session.tokens().access_token().await;
        let retry = self
            .send_once(&method, &url, body.as_ref(), token.as_deref())
            .await?;

        if retry.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("{} {} still unauthorized after refresh", method, path);
            return Err(ApiError::AuthenticationError);
        }

        check_status(retry, path).await
    }

    async fn send_once(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let mut request = self.client.request(method.clone(), url.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn has_refresh_token(&self) -> bool {
        self.session
            .tokens()
            .get()
            .await
            .map_or(false, |tokens| tokens.refresh_token.is_some())
    }

    /// Exchange the refresh token for a new pair.
    ///
    /// `stale` is the access token the caller was rejected with. If another
    /// task swapped tokens while we waited on the lock, nothing is sent.
    async fn refresh_tokens(&self, stale: Option<&str>) -> Result<(), ApiError> {
        let _guard = self.refresh_lock.lock().await;
        let store = self.session.tokens();
        let current = store.get().await;

        if let Some(current) = current.as_ref() {
            if stale != Some(current.access_token.as_str()) {
                tracing::debug!("Tokens already refreshed by a concurrent request");
                return Ok(());
            }
        }

        let refresh_token = current
            .and_then(|tokens| tokens.refresh_token)
            .ok_or(ApiError::AuthenticationError)?;

        let request = RefreshRequest {
            refresh_token: refresh_token.clone(),
        };

        match self
            .post_public::<_, RefreshResponse>(routes::AUTH_REFRESH, &request)
            .await
        {
            Ok(refreshed) => {
                store
                    .set(Some(Tokens {
                        access_token: refreshed.access_token,
                        refresh_token: refreshed.refresh_token.or(Some(refresh_token)),
                    }))
                    .await;
                tracing::info!("Access token refreshed");
                Ok(())
            }
            Err(e) => {
                store.clear().await;
                Err(e)
            }
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiError> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };
    Url::parse(&normalized).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))
}

fn to_body<B: Serialize>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

async fn check_status(response: Response, what: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::AuthenticationError),
        StatusCode::NOT_FOUND => Err(ApiError::NotFound(what.to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(ApiError::RateLimitError),
        StatusCode::REQUEST_TIMEOUT => Err(ApiError::TimeoutError),
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::HttpError {
                status: status.as_u16(),
                body,
            })
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::InvalidResponse(e.to_string()))
}
