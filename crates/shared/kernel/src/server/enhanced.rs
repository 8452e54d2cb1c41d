//! Progressive enhancement at the HTTP boundary.
//!
//! Enhanced requests (sent by the enhancement library with `HX-Request: true`)
//! get `204 No Content` plus a header telling the client what to refresh or
//! where to go. Plain requests get a complete response: the JSON body, or a
//! `303 See Other` redirect.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use larp_domain::constants::{HX_REDIRECT, HX_REQUEST, HX_TRIGGER};
use larp_domain::refresh::RefreshTargets;
use serde::Serialize;
use std::convert::Infallible;

/// Whether the current request asked for a partial (enhanced) response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Enhanced(pub bool);

impl<S: Send + Sync> FromRequestParts<S> for Enhanced {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let flag = parts
            .headers
            .get(HX_REQUEST)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        Ok(Self(flag))
    }
}

impl Enhanced {
    #[must_use]
    pub const fn is_enhanced(self) -> bool {
        self.0
    }

    /// A successful mutation: refresh `targets` or return `body` in full.
    pub fn refresh<T>(self, targets: RefreshTargets, body: T) -> Outcome<T> {
        Outcome::Refresh { enhanced: self.0, targets, body }
    }

    /// Navigate to `location`.
    pub fn redirect<T>(self, location: impl Into<String>) -> Outcome<T> {
        Outcome::Redirect { enhanced: self.0, location: location.into() }
    }

    /// A new resource at `location`: enhanced clients navigate to it, plain
    /// clients receive `201 Created` with the body.
    pub fn created<T>(self, location: impl Into<String>, body: T) -> Outcome<T> {
        Outcome::Created { enhanced: self.0, location: location.into(), body }
    }
}

/// Response shape chosen by [`Enhanced`].
#[derive(Debug)]
pub enum Outcome<T> {
    Refresh { enhanced: bool, targets: RefreshTargets, body: T },
    Redirect { enhanced: bool, location: String },
    Created { enhanced: bool, location: String, body: T },
}

impl<T: Serialize> IntoResponse for Outcome<T> {
    fn into_response(self) -> Response {
        match self {
            Self::Refresh { enhanced: true, targets, .. } => {
                header_only(StatusCode::NO_CONTENT, HX_TRIGGER, &targets.header_value())
            }
            Self::Refresh { enhanced: false, body, .. } => (StatusCode::OK, Json(body)).into_response(),
            Self::Redirect { enhanced: true, location } | Self::Created { enhanced: true, location, .. } => {
                header_only(StatusCode::NO_CONTENT, HX_REDIRECT, &location)
            }
            Self::Redirect { enhanced: false, location } => {
                header_only(StatusCode::SEE_OTHER, header::LOCATION.as_str(), &location)
            }
            Self::Created { enhanced: false, location, body } => {
                let mut response = (StatusCode::CREATED, Json(body)).into_response();
                if let Ok(value) = HeaderValue::from_str(&location) {
                    response.headers_mut().insert(header::LOCATION, value);
                }
                response
            }
        }
    }
}

fn header_only(status: StatusCode, name: &'static str, value: &str) -> Response {
    match HeaderValue::from_str(value) {
        Ok(value) => (status, [(name, value)]).into_response(),
        Err(_) => {
            tracing::warn!(header = name, "dropping header with non-visible characters");
            status.into_response()
        }
    }
}
