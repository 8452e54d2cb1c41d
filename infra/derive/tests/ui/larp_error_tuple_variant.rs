use larp_derive::larp_error;

#[larp_error]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
}

fn main() {}
