use proc_macro::TokenStream;
use quote::quote;
use syn::*;

use crate::{attr::FieldAttr, error};

pub fn from_row(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { ident, generics, data, .. } = input;
    let Data::Struct(data) = data else {
        error!(ident, "only struct are supported")
    };

    let body = match data.fields {
        Fields::Named(FieldsNamed { named, .. }) => {
            let fields = named
                .iter()
                .map(|field| {
                    let attr = FieldAttr::from_attrs(&field.attrs)?;
                    let Some(id) = field.ident.as_ref() else {
                        error!(field, "expected named field")
                    };
                    Ok(match attr.skip {
                        true => quote! { #id: ::core::default::Default::default(), },
                        false => {
                            let name = attr.column_name(id);
                            quote! { #id: row.try_get(#name)?, }
                        }
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            quote! { Self { #(#fields)* } }
        }
        Fields::Unnamed(FieldsUnnamed { unnamed, .. }) => {
            let fields = (0..unnamed.len()).map(|i| quote! { row.try_get(#i)?, });
            quote! { Self(#(#fields)*) }
        }
        Fields::Unit => quote! { Self },
    };

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #g1 ::myro::FromRow for #ident #g2 #g3 {
            fn from_row(row: ::myro::Row) -> ::core::result::Result<Self, ::myro::DecodeError> {
                ::core::result::Result::Ok(#body)
            }
        }
    }.into())
}
