use proc_macro2::TokenStream;
use quote::quote;
use syn::{Error, Ident, ItemFn, ReturnType, Type};

/// Expands `#[larp_runtime::main]` into a sync `main` that owns the runtime.
#[must_use]
pub fn expand_main(args: TokenStream, input: ItemFn) -> TokenStream {
    if input.sig.asyncness.is_none() {
        return Error::new_spanned(
            input.sig.fn_token,
            "#[larp_runtime::main] can only be used on async functions",
        )
        .to_compile_error();
    }
    if !returns_result(&input.sig.output) {
        return Error::new_spanned(&input.sig, "#[larp_runtime::main] requires a Result return type")
            .to_compile_error();
    }

    let preset = match profile(args) {
        Ok(preset) => preset,
        Err(err) => return err.to_compile_error(),
    };

    let ItemFn { attrs, vis, sig, block } = input;
    let (ident, output) = (&sig.ident, &sig.output);

    quote! {
        #(#attrs)*
        #vis fn #ident() #output {
            let runtime = ::larp_runtime::build_runtime_with_config(
                &::larp_runtime::RuntimeConfig::#preset(),
            )?;
            runtime.block_on(async move #block)
        }
    }
}

fn profile(args: TokenStream) -> syn::Result<Ident> {
    if args.is_empty() {
        return Ok(Ident::new("default", proc_macro2::Span::call_site()));
    }
    let ident: Ident = syn::parse2(args)?;
    match ident.to_string().as_str() {
        "high_performance" | "memory_efficient" | "default" => Ok(ident),
        _ => Err(Error::new_spanned(
            ident,
            "unknown runtime profile; expected high_performance, memory_efficient or default",
        )),
    }
}

fn returns_result(output: &ReturnType) -> bool {
    let ReturnType::Type(_, ty) = output else { return false };
    matches!(&**ty, Type::Path(p) if p.path.segments.last().is_some_and(|s| s.ident == "Result"))
}
