//! Kernel utilities shared across slices: config loading, id generation and,
//! behind the `server` feature, the API state plus enhanced-request helpers.
//!
//! ```rust
//! # use larp_kernel::safe_nanoid;
//! let id = safe_nanoid!();
//! assert_eq!(id.len(), 12);
//! ```

pub mod config;
pub mod ids;
pub mod prelude;
#[cfg(feature = "server")]
pub mod server;

/// Id alphabet without look-alike glyphs (I, O, l, 0, 1).
pub const SAFE_ALPHABET: &[char; 55] = &[
    '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L',
    'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'a', 'b', 'c', 'd', 'e', 'f',
    'g', 'h', 'j', 'k', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

pub use larp_domain as domain;
pub use nanoid::nanoid;

/// Generates an id from [`SAFE_ALPHABET`], 12 characters unless a size is given.
#[macro_export]
macro_rules! safe_nanoid {
    () => {
        $crate::nanoid!(12, $crate::SAFE_ALPHABET)
    };
    ($size:expr) => {
        $crate::nanoid!($size, $crate::SAFE_ALPHABET)
    };
}
