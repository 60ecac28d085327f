use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject its
/// dependencies.
///
/// Injectable dependencies are a [`rocket::local::asynchronous::Client`]
/// for a freshly built server, and the `ManualClock` that server runs on,
/// starting at the example election start time.
///
/// `#[backend_test(ledger)]` additionally deploys ledger 0 at launch, owned
/// by the example owner address with a one hour voting window.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Decide whether to deploy a ledger at launch.
    let bootstrap = match parse_macro_input!(args as Option<Ident>) {
        None => false,
        Some(arg) if arg == "ledger" => true,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `ledger`")
                .into_compile_error()
                .into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup(clock: crate::model::clock::ManualClock) -> rocket::local::asynchronous::Client {
                crate::logging::init_test_logging();
                rocket::local::asynchronous::Client::tracked(crate::test_rocket(clock, #bootstrap))
                    .await
                    .unwrap()
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            let clock = crate::model::clock::ManualClock::new(
                crate::model::ledger::examples::example_start(),
            );
            #[allow(unused_variables)]
            let rocket_client = runtime.block_on(setup(clock.clone()));

            // Injected values move into the test, so they are dropped inside the runtime.
            runtime.block_on(#new_name(#(#test_args),*));
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_clock = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(_) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    // Valid as the last path segment for any type is itself
                    let type_ident = &type_path.path.segments.last().unwrap().ident;
                    if type_ident == "Client" {
                        if has_client {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `rocket::local::asynchronous::Client`",
                            ));
                        }
                        has_client = true;
                        args.push(quote! { rocket_client });
                        continue;
                    } else if type_ident == "ManualClock" {
                        if has_clock {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `ManualClock`",
                            ));
                        }
                        has_clock = true;
                        args.push(quote! { clock });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `clock_ident: ManualClock`",
        ));
    }

    Ok(args)
}
