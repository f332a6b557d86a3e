use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running against a
/// fresh in-memory store, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`] and
/// `crate::model::store::MemoryStore` (the same store the client's server
/// uses).
///
/// `#[backend_test(admin)]` and `#[backend_test(super_admin)]` create the
/// matching example admin and log the client in as them first.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract the arguments to inject and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Log in the client as an admin if needed.
    let maybe_login = match parse_macro_input!(args as Option<Ident>) {
        Some(arg) if arg == "admin" => login(quote! { example() }),
        Some(arg) if arg == "super_admin" => login(quote! { example_super() }),
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected `admin` or `super_admin`")
                .into_compile_error()
                .into();
        }
        None => TokenStream2::new(),
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::model::store::MemoryStore,
            ) {
                let store = crate::model::store::MemoryStore::new();
                let rocket = crate::rocket_for_store(
                    std::sync::Arc::new(store.clone()),
                    crate::Config::example(),
                );
                let rocket_client = rocket::local::asynchronous::Client::tracked(rocket)
                    .await
                    .unwrap();

                // Scoped so the login response's borrow of the client ends here.
                {
                    #maybe_login
                }

                (rocket_client, store)
            }

            /// The test itself.
            #item_fn

            log4rs_test_utils::test_logging::init_logging_once_for(
                ["votecode_backend"],
                None,
                None,
            );

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let (rocket_client, store) = setup().await;
                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Insert an example admin built by the given constructor, then log in as it.
fn login(constructor: TokenStream2) -> TokenStream2 {
    quote! {
        let admin = crate::model::db::admin::NewAdmin::#constructor;
        let email = admin.email.clone();
        crate::model::store::Store::insert_admin(&store, admin)
            .await
            .unwrap();

        let response = rocket_client
            .post("/auth/login")
            .header(rocket::http::ContentType::JSON)
            .body(
                rocket::serde::json::serde_json::json!(
                    crate::model::api::auth::LoginRequest::admin(
                        &email,
                        crate::model::db::admin::EXAMPLE_PASSWORD,
                    )
                )
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(rocket::http::Status::Ok, response.status(), "admin login failed");
    }
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut has_store = false;
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                if let Some(type_ident) = type_path.path.segments.last().map(|s| &s.ident) {
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
                    } else if type_ident == "MemoryStore" {
                        if has_store {
                            return Err(syn::Error::new(
                                input.span(),
                                "Test cannot accept more than one `MemoryStore`",
                            ));
                        }
                        has_store = true;
                        args.push(quote! { store });
                        continue;
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client` or `store_ident: MemoryStore`",
        ));
    }

    Ok(args)
}
