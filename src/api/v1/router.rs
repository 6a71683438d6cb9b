use super::error::*;
use super::handler::{self, Authenticated};
use crate::application_port::TokenService;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warp::{Filter, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with_cancel(server.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.token_service.clone()))
        .and(with_cancel(server.clone()))
        .and_then(handler::refresh);

    let rotate = warp::post()
        .and(warp::path!("refresh" / "rotate"))
        .and(warp::body::json())
        .and(with(server.token_service.clone()))
        .and(with_cancel(server.clone()))
        .and_then(handler::rotate);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(with_bearer())
        .and(warp::body::json())
        .and(with(server.token_service.clone()))
        .and(with_cancel(server.clone()))
        .and_then(handler::logout);

    let me = warp::get()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(server.clone()))
        .and_then(handler::me);

    let change_password = warp::post()
        .and(warp::path("password"))
        .and(warp::path::end())
        .and(with_verification(server.clone()))
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and(with_cancel(server.clone()))
        .and_then(handler::change_password);

    let revoke_all = warp::post()
        .and(warp::path!("admin" / "revoke_all"))
        .and(with_verification(server.clone()))
        .and(warp::body::json())
        .and(with(server.token_service.clone()))
        .and(with_cancel(server.clone()))
        .and_then(handler::revoke_all);

    login
        .or(rotate)
        .or(refresh)
        .or(logout)
        .or(me)
        .or(change_password)
        .or(revoke_all)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_cancel(
    server: Arc<Server>,
) -> impl Filter<Extract = (CancellationToken,), Error = Infallible> + Clone {
    warp::any().map(move || server.request_cancel())
}

fn with_bearer() -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::header::<String>("authorization").and_then(|header: String| async move {
        match header.strip_prefix("Bearer ") {
            Some(token) => Ok(token.to_string()),
            None => Err(reject::custom(ApiErrorCode::InvalidToken)),
        }
    })
}

fn with_verification(
    server: Arc<Server>,
) -> impl Filter<Extract = (Authenticated,), Error = warp::Rejection> + Clone {
    warp::header::<String>("authorization").and_then(move |header: String| {
        let token_service: Arc<dyn TokenService> = server.token_service.clone();
        let cancel = server.request_cancel();
        async move {
            if let Some(token) = header.strip_prefix("Bearer ") {
                let claims = token_service
                    .verify_access(token, &cancel)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok(Authenticated { claims })
            } else {
                Err(reject::custom(ApiErrorCode::InvalidToken))
            }
        }
    })
}
