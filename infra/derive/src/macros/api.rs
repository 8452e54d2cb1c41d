use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::quote;
use syn::parse::Parser;
use syn::{Attribute, Fields, ItemFn, ItemStruct, LitBool, LitStr, Type};

#[derive(Default)]
struct ModelArgs {
    rename_all: Option<LitStr>,
    deny_unknown_fields: Option<bool>,
    skip_none: bool,
}

impl ModelArgs {
    fn parse(args: TokenStream) -> syn::Result<Self> {
        let mut out = Self::default();
        let parser = syn::meta::parser(|meta| {
            if meta.path.is_ident("rename_all") {
                if out.rename_all.is_some() {
                    return Err(meta.error("duplicate rename_all"));
                }
                out.rename_all = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("deny_unknown_fields") {
                if out.deny_unknown_fields.is_some() {
                    return Err(meta.error("duplicate deny_unknown_fields"));
                }
                let lit: LitBool = meta.value()?.parse()?;
                out.deny_unknown_fields = Some(lit.value);
            } else if meta.path.is_ident("skip_none") {
                // Bare `skip_none` or `skip_none = true|false`.
                out.skip_none = if meta.input.is_empty() || meta.input.peek(syn::Token![,]) {
                    true
                } else {
                    meta.value()?.parse::<LitBool>()?.value
                };
            } else {
                return Err(meta.error(
                    "unsupported argument; expected rename_all, deny_unknown_fields or skip_none",
                ));
            }
            Ok(())
        });
        parser.parse2(args)?;
        Ok(out)
    }
}

/// Expands `#[api_model]`: serde + schema derives and the JSON naming policy
/// shared by every request and response body.
pub fn expand_api_model(args: TokenStream, mut input: ItemStruct) -> TokenStream {
    let args = match ModelArgs::parse(args) {
        Ok(args) => args,
        Err(err) => return err.to_compile_error(),
    };
    let existing = SerdeContainer::read(&input.attrs);
    let derives = derive_names(&input.attrs);

    let mut header = Vec::new();
    let missing: Vec<TokenStream> = [
        ("Debug", quote!(Debug)),
        ("Serialize", quote!(::serde::Serialize)),
        ("Deserialize", quote!(::serde::Deserialize)),
    ]
    .into_iter()
    .filter(|(name, _)| !derives.contains(*name))
    .map(|(_, tokens)| tokens)
    .collect();
    if !missing.is_empty() {
        header.push(quote! { #[derive(#(#missing),*)] });
    }
    if !derives.contains("ToSchema") {
        header.push(quote! { #[cfg_attr(feature = "server", derive(::utoipa::ToSchema))] });
    }

    let rename = args
        .rename_all
        .unwrap_or_else(|| LitStr::new("camelCase", proc_macro2::Span::call_site()));
    match &existing.rename_all {
        Some(current) if current.value() != rename.value() => {
            return syn::Error::new_spanned(
                current,
                "conflicting serde rename_all; drop it or pass the same value to api_model",
            )
            .to_compile_error();
        }
        Some(_) => {}
        None => header.push(quote! { #[serde(rename_all = #rename)] }),
    }

    let deny = args.deny_unknown_fields.unwrap_or(true);
    if existing.deny_unknown_fields && !deny {
        return syn::Error::new_spanned(
            &input.ident,
            "deny_unknown_fields is already set via serde; remove it before disabling",
        )
        .to_compile_error();
    }
    if deny && !existing.deny_unknown_fields {
        header.push(quote! { #[serde(deny_unknown_fields)] });
    }

    if args.skip_none {
        mark_optional_fields(&mut input.fields);
    }

    quote! {
        #(#header)*
        #input
    }
}

/// Expands `#[api_handler]`: registers the handler with `utoipa` when the
/// `server` feature is enabled.
pub fn expand_api_handler(args: TokenStream, input: ItemFn) -> TokenStream {
    let ItemFn { attrs, vis, sig, block } = input;

    quote! {
        #(#attrs)*
        #[allow(clippy::unused_async)]
        #[cfg_attr(feature = "server", ::utoipa::path(#args))]
        #vis #sig #block
    }
}

fn mark_optional_fields(fields: &mut Fields) {
    let Fields::Named(named) = fields else { return };
    for field in &mut named.named {
        if is_option(&field.ty) && !has_serde_key(&field.attrs, "skip_serializing_if") {
            field
                .attrs
                .push(syn::parse_quote! { #[serde(default, skip_serializing_if = "Option::is_none")] });
        }
    }
}

fn is_option(ty: &Type) -> bool {
    matches!(ty, Type::Path(p) if p.path.segments.last().is_some_and(|s| s.ident == "Option"))
}

fn has_serde_key(attrs: &[Attribute], key: &str) -> bool {
    let mut found = false;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let _ = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident(key) {
                found = true;
            }
            if meta.input.peek(syn::Token![=]) {
                let _: syn::Expr = meta.value()?.parse()?;
            }
            Ok(())
        });
    }
    found
}

#[derive(Default)]
struct SerdeContainer {
    rename_all: Option<LitStr>,
    deny_unknown_fields: bool,
}

impl SerdeContainer {
    fn read(attrs: &[Attribute]) -> Self {
        let mut out = Self::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename_all") {
                    out.rename_all = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("deny_unknown_fields") {
                    out.deny_unknown_fields = true;
                } else if meta.input.peek(syn::Token![=]) {
                    let _: syn::Expr = meta.value()?.parse()?;
                }
                Ok(())
            });
        }
        out
    }
}

fn derive_names(attrs: &[Attribute]) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                names.insert(last.ident.to_string());
            }
            Ok(())
        });
    }
    names
}
