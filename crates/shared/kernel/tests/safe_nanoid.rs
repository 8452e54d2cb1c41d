use larp_kernel::{SAFE_ALPHABET, safe_nanoid};

#[test]
fn default_length_and_charset() {
    let id = safe_nanoid!();
    assert_eq!(id.len(), 12);
    assert!(id.chars().all(|ch| SAFE_ALPHABET.contains(&ch)), "unexpected character in {id}");
}

#[test]
fn custom_length() {
    assert_eq!(safe_nanoid!(20).len(), 20);
}
