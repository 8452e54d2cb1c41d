use crate::SAFE_ALPHABET;
use std::borrow::Cow;

const MAX_ID_LEN: usize = 64;

#[larp_derive::larp_error]
pub enum IdError {
    #[status(400)]
    #[error("Invalid id{}: {message}", format_context(.context))]
    Invalid { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

/// Accepts ids built from [`SAFE_ALPHABET`] plus `-` and `_`, as issued by
/// `safe_nanoid!` or picked by an operator.
pub fn validate_id(raw: &str) -> Result<&str, IdError> {
    let id = raw.trim();
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return Err(IdError::Invalid {
            message: format!("length must be 1..={MAX_ID_LEN}").into(),
            context: None,
        });
    }
    if let Some(bad) = id.chars().find(|c| !SAFE_ALPHABET.contains(c) && *c != '-' && *c != '_') {
        return Err(IdError::Invalid {
            message: format!("unexpected character '{bad}'").into(),
            context: Some(id.to_owned().into()),
        });
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_validate() {
        let id = crate::safe_nanoid!();
        assert_eq!(validate_id(&id).unwrap(), id);
    }

    #[test]
    fn ambiguous_or_empty_ids_fail() {
        assert!(validate_id("").is_err());
        assert!(validate_id("abc0").is_err());
        assert!(validate_id("x/y").is_err());
        assert_eq!(validate_id(" tempest_2 ").unwrap(), "tempest_2");
        assert_eq!(validate_id("../etc").unwrap_err().status_code(), 400);
    }
}
