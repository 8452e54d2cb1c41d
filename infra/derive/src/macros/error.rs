use fxhash::FxHashSet;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, Ident, LitInt, Type, Variant};

const DEFAULT_STATUS: u16 = 500;

/// Everything the generators need to know about one variant.
struct VariantSpec {
    ident: Ident,
    kind: String,
    status: u16,
    source: Option<(Ident, Type)>,
    has_context: bool,
    cfg_attrs: Vec<Attribute>,
}

pub fn expand_derive(mut input: DeriveInput) -> TokenStream {
    let name = input.ident.clone();
    let ext_trait = format_ident!("{}Ext", name);

    let Data::Enum(data) = &mut input.data else {
        return quote! { compile_error!("larp_error can only be applied to enums"); };
    };

    let mut specs = Vec::with_capacity(data.variants.len());
    for variant in &mut data.variants {
        match VariantSpec::take(variant) {
            Ok(spec) => specs.push(spec),
            Err(err) => return err,
        }
    }

    if let Some(orphan) = specs.iter().find(|s| s.source.is_some() && !s.has_context) {
        return syn::Error::new_spanned(
            &orphan.ident,
            "larp_error requires `context: Option<Cow<'static, str>>` next to a source field",
        )
        .to_compile_error();
    }

    let derives = missing_derives(&input.attrs);
    let ext = expand_ext_trait(&name, &ext_trait, &specs);
    let conversions = specs.iter().filter_map(|s| expand_source_from(&name, &ext_trait, s));
    let internal = expand_internal_from(&name, &specs);
    let meta = expand_meta_methods(&name, &specs);

    quote! {
        #[allow(non_shorthand_field_patterns)]
        #derives
        #input

        #meta
        #ext
        #(#conversions)*
        #internal

        #[allow(dead_code)]
        fn format_context(context: &Option<std::borrow::Cow<'static, str>>) -> std::borrow::Cow<'static, str> {
            match context {
                Some(c) => std::borrow::Cow::Owned(format!(" ({c})")),
                None => std::borrow::Cow::Borrowed(""),
            }
        }
    }
}

impl VariantSpec {
    /// Reads the variant and strips the `#[status(..)]` marker so that only
    /// attributes understood by `thiserror` remain on the emitted enum.
    fn take(variant: &mut Variant) -> Result<Self, TokenStream> {
        let status = take_status(&mut variant.attrs)?;

        let Fields::Named(fields) = &variant.fields else {
            return Err(syn::Error::new_spanned(
                &*variant,
                "larp_error requires named fields for source/context handling",
            )
            .to_compile_error());
        };

        let mut has_context = false;
        let mut source = None;
        for field in &fields.named {
            let Some(ident) = &field.ident else { continue };
            if ident == "context" {
                if !is_context_type(&field.ty) {
                    return Err(syn::Error::new_spanned(
                        &field.ty,
                        "context field must be Option<Cow<'static, str>>",
                    )
                    .to_compile_error());
                }
                has_context = true;
            } else if source.is_none()
                && (ident == "source" || has_attr(&field.attrs, "source") || has_attr(&field.attrs, "from"))
            {
                source = Some((ident.clone(), field.ty.clone()));
            }
        }

        Ok(Self {
            kind: kebab_case(&variant.ident.to_string()),
            ident: variant.ident.clone(),
            status: status.unwrap_or(DEFAULT_STATUS),
            source,
            has_context,
            cfg_attrs: variant.attrs.iter().filter(|a| a.path().is_ident("cfg")).cloned().collect(),
        })
    }
}

fn take_status(attrs: &mut Vec<Attribute>) -> Result<Option<u16>, TokenStream> {
    let Some(pos) = attrs.iter().position(|a| a.path().is_ident("status")) else {
        return Ok(None);
    };
    let attr = attrs.remove(pos);
    let lit: LitInt = attr.parse_args().map_err(|err| err.to_compile_error())?;
    let code: u16 = lit.base10_parse().map_err(|err| err.to_compile_error())?;
    if !(400..600).contains(&code) {
        return Err(syn::Error::new_spanned(lit, "status must be an HTTP error code (400-599)")
            .to_compile_error());
    }
    Ok(Some(code))
}

fn expand_meta_methods(name: &Ident, specs: &[VariantSpec]) -> TokenStream {
    let kinds = specs.iter().map(|s| {
        let (ident, kind, cfg) = (&s.ident, &s.kind, &s.cfg_attrs);
        quote! { #(#cfg)* Self::#ident { .. } => #kind, }
    });
    let statuses = specs.iter().map(|s| {
        let (ident, status, cfg) = (&s.ident, s.status, &s.cfg_attrs);
        quote! { #(#cfg)* Self::#ident { .. } => #status, }
    });

    quote! {
        #[automatically_derived]
        impl #name {
            /// Stable kebab-case identifier of the variant.
            #[must_use]
            pub const fn kind(&self) -> &'static str {
                match self { #(#kinds)* }
            }

            /// HTTP status the variant maps to at the API boundary.
            #[must_use]
            pub const fn status_code(&self) -> u16 {
                match self { #(#statuses)* }
            }
        }
    }
}

fn expand_ext_trait(name: &Ident, ext_trait: &Ident, specs: &[VariantSpec]) -> TokenStream {
    let arms = specs.iter().filter(|s| s.has_context).map(|s| {
        let (ident, cfg) = (&s.ident, &s.cfg_attrs);
        quote! { #(#cfg)* #name::#ident { context: slot, .. } => *slot = Some(context.into()), }
    });

    quote! {
        pub trait #ext_trait<T> {
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Result<T, #name>;
        }

        #[automatically_derived]
        impl<T> #ext_trait<T> for Result<T, #name> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> Self {
                self.map_err(|mut err| {
                    #[allow(unreachable_patterns)]
                    match &mut err {
                        #(#arms)*
                        _ => {}
                    }
                    err
                })
            }
        }
    }
}

fn expand_source_from(name: &Ident, ext_trait: &Ident, spec: &VariantSpec) -> Option<TokenStream> {
    if spec.ident == "Internal" {
        return None;
    }
    let (field, ty) = spec.source.as_ref()?;
    let (ident, cfg) = (&spec.ident, &spec.cfg_attrs);

    Some(quote! {
        #(#cfg)*
        #[automatically_derived]
        impl From<#ty> for #name {
            #[inline]
            fn from(#field: #ty) -> Self { Self::#ident { #field, context: None } }
        }

        #(#cfg)*
        impl<T> #ext_trait<T> for std::result::Result<T, #ty> {
            #[inline]
            fn context(self, context: impl Into<std::borrow::Cow<'static, str>>) -> std::result::Result<T, #name> {
                self.map_err(|#field| #name::#ident { #field, context: Some(context.into()) })
            }
        }
    })
}

fn expand_internal_from(name: &Ident, specs: &[VariantSpec]) -> TokenStream {
    let Some(internal) = specs.iter().find(|s| s.ident == "Internal") else {
        return TokenStream::new();
    };
    let cfg = &internal.cfg_attrs;

    quote! {
        #(#cfg)*
        impl From<&'static str> for #name {
            #[inline]
            fn from(message: &'static str) -> Self {
                Self::Internal { message: std::borrow::Cow::Borrowed(message), context: None }
            }
        }
        #(#cfg)*
        impl From<String> for #name {
            #[inline]
            fn from(message: String) -> Self {
                Self::Internal { message: std::borrow::Cow::Owned(message), context: None }
            }
        }
    }
}

fn missing_derives(attrs: &[Attribute]) -> TokenStream {
    let mut present = FxHashSet::default();
    for attr in attrs.iter().filter(|a| a.path().is_ident("derive")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(last) = meta.path.segments.last() {
                present.insert(last.ident.to_string());
            }
            Ok(())
        });
    }

    let mut tokens = Vec::new();
    if !present.contains("Debug") {
        tokens.push(quote! { Debug });
    }
    if !present.contains("Error") {
        tokens.push(quote! { ::thiserror::Error });
    }
    if tokens.is_empty() { TokenStream::new() } else { quote! { #[derive(#(#tokens),*)] } }
}

fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}

fn kebab_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, ch) in ident.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Accepts `Option<Cow<'static, str>>` with any path prefix on `Option` and `Cow`.
fn is_context_type(ty: &Type) -> bool {
    fn segment<'a>(ty: &'a Type, name: &str) -> Option<&'a syn::PathSegment> {
        let Type::Path(path) = ty else { return None };
        path.path.segments.last().filter(|seg| seg.ident == name)
    }
    fn args(seg: &syn::PathSegment) -> Vec<&syn::GenericArgument> {
        match &seg.arguments {
            syn::PathArguments::AngleBracketed(args) => args.args.iter().collect(),
            _ => Vec::new(),
        }
    }

    let Some(option) = segment(ty, "Option") else { return false };
    let option_args = args(option);
    let [syn::GenericArgument::Type(cow_ty)] = option_args.as_slice() else { return false };
    let Some(cow) = segment(cow_ty, "Cow") else { return false };
    let cow_args = args(cow);
    let [syn::GenericArgument::Lifetime(lt), syn::GenericArgument::Type(str_ty)] = cow_args.as_slice()
    else {
        return false;
    };
    lt.ident == "static" && segment(str_ty, "str").is_some()
}
