//! Derive macro for chopin-bind.
//!
//! `#[derive(Bindable)]` describes a struct to the binding engine at compile
//! time: its name, every named field with the field's shape and whether the
//! field is public, and a setter that coerces a raw request string into a
//! public field.
//!
//! ```rust,ignore
//! use chopin_bind::Bindable;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize, Bindable)]
//! pub struct UpdateUser {
//!     pub id: i64,
//!     pub name: String,
//!     #[bind(skip)]
//!     pub audit: Option<chrono::DateTime<chrono::Utc>>,
//! }
//! ```
//!
//! Fields marked `#[bind(skip)]` are left out of the field table, so their
//! type does not need to implement `chopin_bind::Reflect`. They are still
//! filled by body binding.

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Visibility};

#[proc_macro_derive(Bindable, attributes(bind))]
pub fn derive_bindable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let name_str = name.to_string();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let named = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return syn::Error::new_spanned(
                    &input,
                    "Bindable can only be derived for structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(
                &input,
                "Bindable can only be derived for structs with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    let mut shapes: Vec<proc_macro2::TokenStream> = Vec::new();
    let mut setters: Vec<proc_macro2::TokenStream> = Vec::new();

    for field in named {
        let ident = match &field.ident {
            Some(ident) => ident,
            None => {
                return syn::Error::new_spanned(field, "All fields must have names")
                    .to_compile_error()
                    .into();
            }
        };

        let mut skip = false;
        for attr in &field.attrs {
            if attr.path().is_ident("bind") {
                let parsed = attr.parse_nested_meta(|meta| {
                    if meta.path.is_ident("skip") {
                        skip = true;
                        Ok(())
                    } else {
                        Err(meta.error("unsupported bind attribute, expected `skip`"))
                    }
                });
                if let Err(err) = parsed {
                    return err.to_compile_error().into();
                }
            }
        }
        if skip {
            continue;
        }

        let ty = &field.ty;
        let field_str = ident.to_string();
        let settable = matches!(field.vis, Visibility::Public(_));

        shapes.push(quote! {
            ::chopin_bind::FieldShape::new(
                #field_str,
                #settable,
                <#ty as ::chopin_bind::Reflect>::shape,
            )
        });

        // Private fields are reported as unsettable at registration, so they
        // never get a setter.
        if settable {
            setters.push(quote! {
                #field_str => {
                    self.#ident = ::chopin_bind::coerce::decode_field::<#ty>(#field_str, raw)?;
                    ::std::result::Result::Ok(())
                }
            });
        }
    }

    let expanded = quote! {
        impl #impl_generics ::chopin_bind::Reflect for #name #ty_generics #where_clause {
            fn shape() -> ::chopin_bind::TypeShape {
                ::chopin_bind::TypeShape::Struct(::chopin_bind::StructShape::of::<Self>())
            }
        }

        impl #impl_generics ::chopin_bind::BindStruct for #name #ty_generics #where_clause {
            fn struct_name() -> &'static str {
                #name_str
            }

            fn fields() -> ::std::vec::Vec<::chopin_bind::FieldShape> {
                ::std::vec![#(#shapes),*]
            }

            #[allow(unused_variables)]
            fn set_field(
                &mut self,
                name: &str,
                raw: &str,
            ) -> ::std::result::Result<(), ::chopin_bind::BindError> {
                match name {
                    #(#setters)*
                    _ => ::std::result::Result::Err(::chopin_bind::BindError::UnknownField {
                        ty: #name_str.to_string(),
                        field: name.to_string(),
                    }),
                }
            }
        }

        impl #impl_generics ::chopin_bind::Argument for #name #ty_generics #where_clause {
            fn from_arg(
                value: ::chopin_bind::ArgValue,
            ) -> ::std::result::Result<Self, ::chopin_bind::BindError> {
                value.into_struct::<Self>()
            }
        }
    };

    TokenStream::from(expanded)
}
