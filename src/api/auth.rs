//! Request identity
//!
//! User names are asserted by the authenticating front end in a trusted header.
//! Admin endpoints additionally require the configured bearer token.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::AppState;

use super::ApiError;

/// User on whose behalf the request is made
#[derive(Debug, Clone)]
pub struct UserAuth {
    pub user_name: String,
}

/// Admin-only authentication
#[derive(Debug, Clone)]
pub struct AdminAuth;

#[async_trait]
impl FromRequestParts<Arc<AppState>> for UserAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_name = parts
            .headers
            .get(state.config.user_header.as_str())
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ApiError::Unauthorized)?;

        Ok(UserAuth {
            user_name: user_name.to_string(),
        })
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Without a configured token the admin API is closed
        let expected = state
            .config
            .admin_token
            .as_deref()
            .ok_or(ApiError::Forbidden)?;

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        if token != expected {
            tracing::debug!("Admin token rejected");
            return Err(ApiError::Forbidden);
        }

        Ok(AdminAuth)
    }
}
