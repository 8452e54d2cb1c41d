use larp_kernel::prelude::IdError;
use larp_rules::RulesError;
use std::borrow::Cow;

#[larp_derive::larp_error]
pub enum CampaignError {
    #[status(404)]
    #[error("Campaign not found: {name}")]
    NotFound { name: String },

    #[status(404)]
    #[error("No awards recorded for {user} in {campaign}")]
    PlayerNotFound { campaign: String, user: String },

    #[status(409)]
    #[error("Campaign already exists: {name}")]
    AlreadyExists { name: String },

    #[status(400)]
    #[error("Bad request{}: {message}", format_context(.context))]
    BadRequest { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[status(400)]
    #[error("Invalid name{}: {source}", format_context(.context))]
    InvalidName { source: IdError, context: Option<Cow<'static, str>> },

    #[status(409)]
    #[error("Record error{}: {source}", format_context(.context))]
    Rules { source: RulesError, context: Option<Cow<'static, str>> },

    #[error("Internal campaign error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

#[cfg(feature = "server")]
impl axum::response::IntoResponse for CampaignError {
    fn into_response(self) -> axum::response::Response {
        larp_kernel::prelude::ErrorBody::respond(self.status_code(), self.kind(), &self)
    }
}
