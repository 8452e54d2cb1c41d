use larp_rules::{Decision, RulesError};
use std::borrow::Cow;

/// Errors surfaced by the character slice.
#[larp_derive::larp_error]
pub enum CharacterError {
    #[status(404)]
    #[error("Character not found: {id}")]
    NotFound { id: String },

    #[status(404)]
    #[error("Unknown feature {id}")]
    FeatureNotFound { id: String },

    #[status(404)]
    #[error("Unknown ruleset {id}")]
    UnknownRuleset { id: String },

    #[status(400)]
    #[error("Bad request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    /// The rules engine refused the change; the decision says why.
    #[status(422)]
    #[error("Rejected: {decision}")]
    Rejected { decision: Decision },

    #[status(409)]
    #[error("Conflict{}: {message}", format_context(.context))]
    Conflict { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[status(409)]
    #[error("Rules error{}: {source}", format_context(.context))]
    Rules { source: RulesError, context: Option<Cow<'static, str>> },

    #[error("Internal character error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

impl CharacterError {
    pub(crate) fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::BadRequest { message: message.into(), context: None }
    }

    pub(crate) fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Conflict { message: message.into(), context: None }
    }
}

impl From<Decision> for CharacterError {
    fn from(decision: Decision) -> Self {
        Self::Rejected { decision }
    }
}

#[cfg(feature = "server")]
impl axum::response::IntoResponse for CharacterError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Rejected { decision } => {
                (axum::http::StatusCode::UNPROCESSABLE_ENTITY, axum::Json(decision)).into_response()
            }
            other => larp_kernel::prelude::ErrorBody::respond(other.status_code(), other.kind(), &other),
        }
    }
}
