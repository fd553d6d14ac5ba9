use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::auth::{decode_jwt, Claims, Role};
use crate::error::ApiError;
use crate::oplog::Caller;
use crate::AppState;

/// Authenticated user context extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            role: claims.role,
        }
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_approver(&self) -> Result<(), ApiError> {
        if self.role.can_approve() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Approver or admin role required"))
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Admin role required"))
        }
    }

    /// Masons may only act on their own account; staff roles act on any
    pub fn require_self_or_staff(&self, mason_id: Uuid) -> Result<(), ApiError> {
        if self.role == Role::Mason && self.user_id != mason_id {
            return Err(ApiError::forbidden("Masons may only access their own account"));
        }
        Ok(())
    }

    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.user_id,
            is_admin: self.is_admin(),
        }
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = match extract_jwt_from_headers(&headers)
        .and_then(|token| validate_jwt(&token, &state.config.security.jwt_secret))
    {
        Ok(claims) => claims,
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    request.extensions_mut().insert(AuthUser::from(claims));
    next.run(request).await
}

/// Extract JWT token from Authorization header
pub fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get("authorization")
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

/// Validate JWT token and extract claims
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    decode_jwt(token, secret).map_err(|e| e.to_string())
}
