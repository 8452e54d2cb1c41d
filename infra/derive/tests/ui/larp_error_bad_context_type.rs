use larp_derive::larp_error;

#[larp_error]
pub enum LedgerError {
    #[error("IO error: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<String>,
    },
}

fn main() {}
