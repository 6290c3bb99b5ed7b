// This file is part of Astarte.
//
// Copyright 2023-2025 SECO Mind Srl
//
// SPDX-License-Identifier: Apache-2.0

//! Derive macro for [`AstarteAggregate`](https://docs.rs/astarte-device-sdk), letting a plain
//! struct be turned into the `HashMap<String, AstarteData>` an object-aggregated interface
//! expects, instead of building the map by hand.
//!
//! ```ignore
//! #[derive(AstarteAggregate)]
//! struct Sensor {
//!     temperature: f64,
//!     humidity: f64,
//! }
//! ```
//!
//! expands to an `impl AstarteAggregate for Sensor` that inserts one entry per field, keyed by
//! the field's name, converting each value with `Into<AstarteData>`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Derives `AstarteAggregate` for a struct with named fields, each convertible with
/// `Into<astarte_device_sdk::types::AstarteData>`.
#[proc_macro_derive(AstarteAggregate)]
pub fn astarte_aggregate_derive(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input,
                    "AstarteAggregate can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(
                &input,
                "AstarteAggregate can only be derived for structs",
            )
            .to_compile_error()
            .into();
        }
    };

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let inserts = fields.iter().map(|field| {
        let field_ident = field
            .ident
            .as_ref()
            .expect("named fields always have an identifier");
        let key = field_ident.to_string();

        quote! {
            map.insert(
                #key.to_string(),
                ::astarte_device_sdk::types::AstarteData::from(self.#field_ident),
            );
        }
    });

    let expanded = quote! {
        impl #impl_generics ::astarte_device_sdk::types::AstarteAggregate for #ident #ty_generics #where_clause {
            fn astarte_aggregate(
                self,
            ) -> ::std::result::Result<
                ::std::collections::HashMap<::std::string::String, ::astarte_device_sdk::types::AstarteData>,
                ::astarte_device_sdk::Error,
            > {
                let mut map = ::std::collections::HashMap::new();
                #(#inserts)*
                Ok(map)
            }
        }
    };

    expanded.into()
}
