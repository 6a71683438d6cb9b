use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Claims of a verified bearer token.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub claims: AccessClaims,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    cancel: CancellationToken,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        email: body.email,
        password: body.password,
    };
    let login_result = auth_service
        .login(login_input, &cancel)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(login_result)))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    body: RefreshRequest,
    token_service: Arc<dyn TokenService>,
    cancel: CancellationToken,
) -> Result<impl warp::Reply, warp::Rejection> {
    let refreshed = token_service
        .refresh_access_token(&body.refresh_token, &cancel)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(refreshed)))
}

pub async fn rotate(
    body: RefreshRequest,
    token_service: Arc<dyn TokenService>,
    cancel: CancellationToken,
) -> Result<impl warp::Reply, warp::Rejection> {
    let tokens = token_service
        .rotate_refresh_token(&body.refresh_token, &cancel)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(tokens)))
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Takes the raw bearer string: an expired or unverifiable access token must
/// not keep the refresh token alive.
pub async fn logout(
    access_token: String,
    body: LogoutRequest,
    token_service: Arc<dyn TokenService>,
    cancel: CancellationToken,
) -> Result<impl warp::Reply, warp::Rejection> {
    let outcome = token_service
        .logout(&access_token, &body.refresh_token, &cancel)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(outcome)))
}

pub async fn me(auth: Authenticated) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(auth.claims)))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct RevokedResponse {
    pub revoked: u64,
}

pub async fn change_password(
    auth: Authenticated,
    body: ChangePasswordRequest,
    auth_service: Arc<dyn AuthService>,
    cancel: CancellationToken,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = ChangePasswordInput {
        user_id: auth.claims.subject,
        old_password: body.old_password,
        new_password: body.new_password,
    };
    let revoked = auth_service
        .change_password(input, &cancel)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(RevokedResponse { revoked })))
}

#[derive(Debug, Deserialize)]
pub struct RevokeAllRequest {
    pub user_id: UserId,
}

pub async fn revoke_all(
    auth: Authenticated,
    body: RevokeAllRequest,
    token_service: Arc<dyn TokenService>,
    cancel: CancellationToken,
) -> Result<impl warp::Reply, warp::Rejection> {
    if auth.claims.role != Role::Admin {
        return Err(reject::custom(ApiErrorCode::Forbidden));
    }

    let revoked = token_service
        .revoke_all_for_subject(body.user_id, &cancel)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(RevokedResponse { revoked })))
}
