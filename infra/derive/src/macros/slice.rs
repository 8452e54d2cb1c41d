use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::ItemStruct;

/// Splits the annotated struct into `<Name>Inner` (the state) and `<Name>`
/// (a cheap `Arc` handle registered with the kernel).
pub fn expand_slice(input: ItemStruct) -> TokenStream {
    let handle = &input.ident;
    let inner = format_ident!("{handle}Inner");
    let ItemStruct { attrs, vis, fields, semi_token, .. } = &input;
    let slice_name = handle.to_string().to_lowercase();

    quote! {
        #(#attrs)*
        #[derive(Debug)]
        #vis struct #inner #fields #semi_token

        #[derive(Debug, Clone)]
        #vis struct #handle {
            inner: std::sync::Arc<#inner>,
        }

        impl #handle {
            #[must_use]
            pub fn new(inner: #inner) -> Self {
                Self { inner: std::sync::Arc::new(inner) }
            }
        }

        impl std::ops::Deref for #handle {
            type Target = #inner;

            fn deref(&self) -> &Self::Target {
                &self.inner
            }
        }

        impl ::larp_kernel::domain::registry::FeatureSlice for #handle {
            fn name(&self) -> &'static str {
                #slice_name
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
        }
    }
}
