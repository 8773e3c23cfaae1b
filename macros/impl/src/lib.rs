//! Implementation of the macros re-exported by `strata-macros`.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{parse_macro_input, AttributeArgs, Error, ItemFn, Lit, Meta, NestedMeta};

/// Levels accepted by `#[test_traced(level = "...")]`.
const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// Run a test with a `tracing` subscriber that writes to the test harness.
///
/// The subscriber is installed for the duration of the test only, so tests running in
/// parallel do not interleave their output. The level defaults to `DEBUG`.
///
/// # Example
///
/// ```ignore
/// use strata_macros::test_traced;
///
/// #[test_traced(level = "TRACE")]
/// fn test_suspends() {
///     tracing::trace!("visible");
/// }
/// ```
#[proc_macro_attribute]
pub fn test_traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as AttributeArgs);
    let input = parse_macro_input!(item as ItemFn);

    let level = match parse_level(&args) {
        Ok(level) => level,
        Err(err) => return err.to_compile_error().into(),
    };
    let level = syn::Ident::new(&level, Span::call_site());

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let body = &input.block;
    let expanded = quote! {
        #[test]
        #(#attrs)*
        #vis #sig {
            let subscriber = strata_macros::tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(strata_macros::tracing::Level::#level)
                .with_line_number(true)
                .with_span_events(strata_macros::tracing_subscriber::fmt::format::FmtSpan::CLOSE)
                .finish();
            let dispatcher = strata_macros::tracing::Dispatch::new(subscriber);
            strata_macros::tracing::dispatcher::with_default(&dispatcher, || #body)
        }
    };
    TokenStream::from(expanded)
}

fn parse_level(args: &[NestedMeta]) -> Result<String, Error> {
    let mut level = String::from("DEBUG");
    for arg in args {
        let NestedMeta::Meta(Meta::NameValue(pair)) = arg else {
            return Err(Error::new_spanned(arg, "expected `level = \"...\"`"));
        };
        if !pair.path.is_ident("level") {
            return Err(Error::new_spanned(&pair.path, "unknown argument"));
        }
        let Lit::Str(value) = &pair.lit else {
            return Err(Error::new_spanned(&pair.lit, "level must be a string"));
        };
        let value = value.value().to_uppercase();
        if !LEVELS.contains(&value.as_str()) {
            return Err(Error::new_spanned(&pair.lit, "unknown level"));
        }
        level = value;
    }
    Ok(level)
}
