use proc_macro::TokenStream;
use quote::quote;
use syn::*;

use crate::{
    attr::{FieldAttr, to_snake_case},
    error,
};

pub fn decode(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { ident, mut generics, data, .. } = input;

    let body = match data {
        Data::Struct(st) => match &st.fields {
            Fields::Unnamed(FieldsUnnamed { unnamed, .. }) => {
                if unnamed.len() != 1 {
                    error!(unnamed, "only one field struct is supported")
                }
                quote! { ::myro::Decode::decode(col).map(Self) }
            }
            Fields::Named(FieldsNamed { named, .. }) => {
                let (Some(field), 1) = (named.first(), named.len()) else {
                    error!(named, "only one field struct is supported")
                };
                let name = &field.ident;
                quote! { ::myro::Decode::decode(col).map(|#name| Self { #name }) }
            }
            Fields::Unit => quote! { ::core::result::Result::Ok(Self) },
        },
        Data::Enum(en) => {
            let arms = en
                .variants
                .iter()
                .map(|variant| {
                    if !matches!(variant.fields, Fields::Unit) {
                        error!(variant, "only unit variant is supported")
                    }
                    let attr = FieldAttr::from_attrs(&variant.attrs)?;
                    let id = &variant.ident;
                    let name = attr.rename.unwrap_or_else(|| to_snake_case(&id.to_string()));
                    Ok(quote! { #name => ::core::result::Result::Ok(Self::#id), })
                })
                .collect::<Result<Vec<_>>>()?;
            quote! {
                let text: ::std::string::String = ::myro::Decode::decode(col)?;
                match text.as_str() {
                    #(#arms)*
                    _ => ::core::result::Result::Err(::myro::DecodeError::TypeMismatch {
                        expected: ::core::any::type_name::<Self>(),
                        found: "unknown enum value",
                    }),
                }
            }
        }
        Data::Union(_) => error!(ident, "union is not supported"),
    };

    for ty in generics.type_params_mut() {
        ty.bounds.push(parse_quote!(::myro::Decode));
    }

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #g1 ::myro::Decode for #ident #g2 #g3 {
            fn decode(col: ::myro::row::Column) -> ::core::result::Result<Self, ::myro::DecodeError> {
                #body
            }
        }
    }.into())
}
