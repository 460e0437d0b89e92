use super::types::{AuthResponse, LoginRequest, RegisterRequest};
use super::{routes, ApiClient, ApiError};
use crate::auth::{SessionContext, Tokens};

impl AuthResponse {
    pub fn into_session(self) -> SessionContext {
        SessionContext::authenticated(
            self.user,
            Tokens {
                access_token: self.access_token,
                refresh_token: Some(self.refresh_token),
            },
        )
    }
}

impl ApiClient {
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        let response: AuthResponse = self.post_public(routes::AUTH_LOGIN, &request).await?;
        tracing::info!(
            "Logged in as {} (role={})",
            response.user.id,
            response.user.role
        );
        Ok(response)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse, ApiError> {
        let request = RegisterRequest {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        };

        let response: AuthResponse = self.post_public(routes::AUTH_REGISTER, &request).await?;
        tracing::info!("Registered account {}", response.user.id);
        Ok(response)
    }

    /// Exchange the stored refresh token for a new pair right away.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let current = self.session().tokens().access_token().await;
        self.refresh_tokens(current.as_deref()).await
    }

    /// Tell the backend to drop the session. Local tokens are cleared even if
    /// the call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self
            .post_unit(routes::AUTH_LOGOUT, &serde_json::json!({}))
            .await;
        self.session().tokens().clear().await;

        if let Err(e) = &result {
            tracing::warn!("Remote logout failed: {}", e);
        }
        result
    }
}
