use larp_derive::larp_error;

#[larp_error]
pub enum LedgerError {
    #[status(200)]
    #[error("not an error")]
    Fine { detail: String },
}

fn main() {}
