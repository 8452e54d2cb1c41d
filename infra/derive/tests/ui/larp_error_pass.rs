use larp_derive::larp_error;
use std::borrow::Cow;

#[larp_error]
pub enum LedgerError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[status(404)]
    #[error("Player not found: {user}")]
    PlayerNotFound { user: String },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<(), LedgerError> {
    let failed: Result<(), std::io::Error> = Err(std::io::Error::other("disk"));
    failed.context("reading ledger")?;
    Ok(())
}

fn main() {
    let err = read().unwrap_err();
    assert_eq!(err.kind(), "io");
    assert_eq!(err.status_code(), 500);
    assert!(err.to_string().contains("(reading ledger)"));

    let missing = LedgerError::PlayerNotFound { user: "ana".to_owned() };
    assert_eq!(missing.kind(), "player-not-found");
    assert_eq!(missing.status_code(), 404);

    let internal: LedgerError = "boom".into();
    assert_eq!(internal.to_string(), "Internal error: boom");
}
