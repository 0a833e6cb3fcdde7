use std::sync::Arc;

use warp::{reject::Rejection, Filter};

use super::jwt::{verify_jwt_session, Identity, SessionData};
use crate::{constants::SESSION_COOKIE, error::CoreError};

/// Session token from the `session` cookie, or from an
/// `Authorization: Bearer` header when no cookie is sent.
fn session_token() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE)
        .and(warp::header::optional::<String>("authorization"))
        .map(|cookie: Option<String>, header: Option<String>| {
            cookie.or_else(|| {
                header.and_then(|value| value.strip_prefix("Bearer ").map(str::to_owned))
            })
        })
}

pub fn with_session(
    secret: Arc<String>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    session_token().and_then(move |token: Option<String>| {
        let secret = secret.clone();
        async move {
            let token = token.ok_or_else(|| {
                warp::reject::custom(CoreError::Unauthorized(String::from("Missing session")))
            })?;

            verify_jwt_session(&token, secret.as_bytes())
                .map(SessionData::from)
                .map_err(warp::reject::custom)
        }
    })
}

pub fn with_identity(
    secret: Arc<String>,
) -> impl Filter<Extract = (Identity,), Error = Rejection> + Clone {
    session_token().map(move |token: Option<String>| {
        match token.map(|token| verify_jwt_session(&token, secret.as_bytes())) {
            Some(Ok(session)) => Identity::Authenticated(session.into()),
            Some(Err(e)) => {
                log::debug!("Treating caller as anonymous: {e}");
                Identity::Anonymous
            }
            None => Identity::Anonymous,
        }
    })
}
