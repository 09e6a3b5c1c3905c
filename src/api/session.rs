//! Anonymous session id carried in a cookie

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponseParts, ResponseParts};
use std::convert::Infallible;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "videohq_session";
pub const SESSION_HEADER: &str = "x-session-id";

/// Session id of the caller. Minted when the request carries none; the
/// fresh id is then set as a cookie on the response.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    fresh: bool,
}

impl Session {
    fn from_parts(parts: &Parts) -> Option<String> {
        let from_cookie = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == SESSION_COOKIE)
            .map(|(_, value)| value.to_string());

        from_cookie
            .or_else(|| {
                parts
                    .headers
                    .get(SESSION_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string)
            })
            .filter(|id| is_valid_id(id))
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match Self::from_parts(parts) {
            Some(id) => Session { id, fresh: false },
            None => Session {
                id: Uuid::new_v4().to_string(),
                fresh: true,
            },
        })
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if self.fresh {
            let cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, self.id);
            if let Ok(value) = HeaderValue::from_str(&cookie) {
                res.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        Ok(res)
    }
}
