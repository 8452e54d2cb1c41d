#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Attribute macros shared by the workspace crates: error enums, HTTP models
//! and handlers, feature slices, and the runtime entry point.
//!
//! Examples below are `ignore`d because they need the consuming crates
//! (`larp-kernel`, `larp-runtime`, `thiserror`, `utoipa`) in scope.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, ItemFn, ItemStruct, parse_macro_input};

/// Bootstraps the tuned Tokio runtime around an `async fn main`.
///
/// # Arguments
///
/// * `high_performance` - multi-threaded, sized for the server.
/// * `memory_efficient` - two workers with smaller stacks.
/// * `default` (or no argument) - worker count from available parallelism.
///
/// # Examples
///
/// ```rust,ignore
/// #[larp_runtime::main(high_performance)]
/// async fn main() -> anyhow::Result<()> {
///     Ok(())
/// }
/// ```
#[proc_macro_attribute]
pub fn main(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::runtime::expand_main(args.into(), input).into()
}

/// Declares a request or response body.
///
/// Adds `Debug`, `Serialize` and `Deserialize` when missing, `utoipa::ToSchema`
/// under the `server` feature, `rename_all = "camelCase"` and
/// `deny_unknown_fields`.
///
/// # Arguments
///
/// * `rename_all = "..."` - another serde naming policy.
/// * `deny_unknown_fields = false` - accept unknown keys.
/// * `skip_none` - omit `None` fields when serializing (and default them when reading).
///
/// # Example
///
/// ```rust,ignore
/// #[api_model(skip_none)]
/// pub struct FeatureForm {
///     pub id: String,
///     pub option: Option<String>,
/// }
/// ```
#[proc_macro_attribute]
pub fn api_model(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemStruct);
    macros::api::expand_api_model(attr.into(), input).into()
}

/// Marks an axum handler for `OpenAPI` registration.
///
/// Arguments are forwarded verbatim to `utoipa::path`.
///
/// ```rust,ignore
/// #[api_handler(get, path = "/health", responses((status = OK, body = HealthResponse)), tag = "System")]
/// pub async fn health_handler() -> impl IntoResponse { /* ... */ }
/// ```
#[proc_macro_attribute]
pub fn api_handler(args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    macros::api::expand_api_handler(args.into(), input).into()
}

/// Turns an enum into a crate error type.
///
/// * Derives `Debug` and `thiserror::Error` unless already present.
/// * Generates `<Name>Ext` with `.context(..)` for `Result<T, Name>` and for
///   `Result<T, Source>` of every variant that wraps a `source` (or
///   `#[source]`/`#[from]`) field.
/// * Generates `From<Source>` for those variants, and `From<&'static str>` /
///   `From<String>` when an `Internal { message, context }` variant exists.
/// * Generates `kind()` (kebab-case variant name) and `status_code()`. The
///   status comes from an optional `#[status(404)]` on the variant and
///   defaults to 500.
///
/// Every variant must use named fields. A variant with a source must also have
/// `context: Option<Cow<'static, str>>`.
///
/// # Example
///
/// ```rust,ignore
/// #[larp_error]
/// pub enum LoadError {
///     #[error("IO error{}: {source}", format_context(.context))]
///     Io { source: std::io::Error, context: Option<Cow<'static, str>> },
///
///     #[status(404)]
///     #[error("Ruleset not found: {path}")]
///     NotFound { path: String },
///
///     #[error("Internal error{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
/// ```
#[proc_macro_attribute]
pub fn larp_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand_derive(input).into()
}

/// Defines a feature slice handle.
///
/// The struct body becomes `<Name>Inner`; `<Name>` wraps it in an `Arc`,
/// derefs to it and implements `FeatureSlice` so the kernel can register it.
///
/// ```rust,ignore
/// #[larp_derive::larp_slice]
/// pub struct Campaigns {
///     store: CampaignStore,
/// }
///
/// let slice = Campaigns::new(CampaignsInner { store: CampaignStore::default() });
/// ```
#[proc_macro_attribute]
pub fn larp_slice(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(item as ItemStruct);
    macros::slice::expand_slice(input).into()
}
