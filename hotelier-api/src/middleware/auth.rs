use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use hotelier_core::identity::Identity;
use hotelier_shared::Masked;

use crate::error::AppError;
use crate::state::AuthConfig;

pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

pub const ROLE_USER: &str = "USER";
pub const ROLE_STAFF: &str = "STAFF";
pub const ROLE_ADMIN: &str = "ADMIN";

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: usize,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.sub.clone(),
            email: Masked(self.email.clone()),
            name: self.name.clone(),
        }
    }

    fn has_role(&self, allowed: &[&str]) -> bool {
        allowed.iter().any(|role| self.role.eq_ignore_ascii_case(role))
    }
}

fn bearer_claims(auth: &AuthConfig, headers: &HeaderMap) -> Result<Claims, AppError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationError("missing token".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::AuthenticationError("missing token".to_string()))?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthenticationError("invalid token".to_string()))?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(AppError::AuthenticationError("token has no subject".to_string()));
    }
    Ok(token_data.claims)
}

async fn authorize(auth: &AuthConfig, allowed: &[&str], mut req: Request, next: Next) -> Result<Response, AppError> {
    let claims = bearer_claims(auth, req.headers())?;
    if !claims.has_role(allowed) {
        return Err(AppError::AuthorizationError(format!("role {} not permitted", claims.role)));
    }
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Role Middleware
// ============================================================================

/// Any signed-in caller.
pub async fn require_user(State(auth): State<AuthConfig>, req: Request, next: Next) -> Result<Response, AppError> {
    authorize(&auth, &[ROLE_USER, ROLE_STAFF, ROLE_ADMIN], req, next).await
}

/// Front-desk operations such as check-in and refunds.
pub async fn require_staff(State(auth): State<AuthConfig>, req: Request, next: Next) -> Result<Response, AppError> {
    authorize(&auth, &[ROLE_STAFF, ROLE_ADMIN], req, next).await
}

pub async fn require_admin(State(auth): State<AuthConfig>, req: Request, next: Next) -> Result<Response, AppError> {
    authorize(&auth, &[ROLE_ADMIN], req, next).await
}

// ============================================================================
// Service-to-service guard
// ============================================================================

pub async fn require_internal(State(auth): State<AuthConfig>, req: Request, next: Next) -> Result<Response, AppError> {
    let presented = req
        .headers()
        .get(INTERNAL_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if auth.internal_token.is_empty() || !constant_time_eq(presented.as_bytes(), auth.internal_token.as_bytes()) {
        return Err(AppError::AuthenticationError("invalid internal token".to_string()));
    }
    Ok(next.run(req).await)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
