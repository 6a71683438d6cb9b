use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<ApiErrorCode>() {
        *code
    } else if err.is_not_found() {
        let json = warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: None,
        });
        return Ok(warp::reply::with_status(json, StatusCode::NOT_FOUND));
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        ApiErrorCode::InvalidToken
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        ApiErrorCode::InvalidRequest
    } else {
        let json = warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(ApiError {
                code: ApiErrorCode::InternalError,
                message: format!("Unhandled error: {:?}", err),
            }),
        });
        return Ok(warp::reply::with_status(
            json,
            StatusCode::INTERNAL_SERVER_ERROR,
        ));
    };

    let json = warp::reply::json(&ApiResponse::<()>::err(code, code.to_string()));
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Request body is not valid")]
    InvalidRequest,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Token has been revoked")]
    TokenRevoked,
    #[error("Refresh token is not valid")]
    RefreshTokenInvalid,
    #[error("Refresh token has expired")]
    RefreshTokenExpired,
    #[error("Refresh token has been revoked")]
    RefreshTokenRevoked,
    #[error("Account is disabled")]
    AccountDisabled,
    #[error("Not allowed")]
    Forbidden,
    #[error("Service temporarily unavailable")]
    ServiceUnavailable,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn unavailable<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Dependency unavailable: {}", error);
        ApiErrorCode::ServiceUnavailable
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::InvalidToken
            | ApiErrorCode::TokenExpired
            | ApiErrorCode::TokenRevoked
            | ApiErrorCode::RefreshTokenInvalid
            | ApiErrorCode::RefreshTokenExpired
            | ApiErrorCode::RefreshTokenRevoked
            | ApiErrorCode::AccountDisabled => StatusCode::UNAUTHORIZED,
            ApiErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ApiErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

impl From<TokenError> for ApiErrorCode {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Malformed | TokenError::InvalidSignature => ApiErrorCode::InvalidToken,
            TokenError::Expired => ApiErrorCode::TokenExpired,
            TokenError::Revoked => ApiErrorCode::TokenRevoked,
            TokenError::InvalidRefreshToken | TokenError::UnknownRefreshToken => {
                ApiErrorCode::RefreshTokenInvalid
            }
            TokenError::RefreshTokenExpired => ApiErrorCode::RefreshTokenExpired,
            TokenError::RefreshTokenRevoked => ApiErrorCode::RefreshTokenRevoked,
            TokenError::SubjectUnavailable => ApiErrorCode::AccountDisabled,
            e @ (TokenError::StoreUnavailable(_)
            | TokenError::CacheUnavailable(_)
            | TokenError::IssuanceFailed(_)
            | TokenError::LogoutPartialFailure { .. }
            | TokenError::Cancelled) => ApiErrorCode::unavailable(e),
            TokenError::Signing(e) => ApiErrorCode::internal(e),
        }
    }
}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials | AuthError::UserNotFound => {
                ApiErrorCode::InvalidCredentials
            }
            AuthError::Token(e) => ApiErrorCode::from(e),
            AuthError::Store(e) => ApiErrorCode::unavailable(e),
            AuthError::InternalError(e) => ApiErrorCode::internal(e),
        }
    }
}
