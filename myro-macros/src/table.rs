use proc_macro::TokenStream;
use quote::quote;
use syn::*;

use crate::{
    attr::{FieldAttr, to_snake_case},
    error,
};

pub fn table(input: DeriveInput) -> Result<TokenStream> {
    let DeriveInput { attrs, ident, generics, data, .. } = input;
    let Data::Struct(data) = data else {
        error!(ident, "only struct are supported")
    };

    let table = attrs
        .iter()
        .find(|e| e.path().is_ident("sql"))
        .map(|e| Ok::<_, Error>(e.parse_args::<LitStr>()?.value()))
        .unwrap_or_else(|| Ok(to_snake_case(&ident.to_string())))?;

    let Fields::Named(FieldsNamed { named, .. }) = data.fields else {
        error!(ident, "only named struct are supported")
    };

    let mut columns = vec![];

    for field in &named {
        let attr = FieldAttr::from_attrs(&field.attrs)?;
        if attr.skip {
            continue;
        }
        let Some(id) = field.ident.as_ref() else {
            error!(field, "expected named field")
        };
        let name = attr.column_name(id);

        let mut column = quote! { ::myro::sql::ColumnDef::new(#name) };
        if attr.id {
            column.extend(quote! { .primary_key().auto_increment() });
        }
        if let Some(kind) = &attr.kind {
            let kind = match kind.to_string().as_str() {
                "date" => quote! { Date },
                "time" => quote! { Time },
                _ => quote! { Timestamp },
            };
            column.extend(quote! { .kind(::myro::ColumnKind::#kind) });
        }
        columns.push(column);
    }

    let (g1, g2, g3) = generics.split_for_impl();

    Ok(quote! {
        #[automatically_derived]
        impl #g1 ::myro::sql::Entity for #ident #g2 #g3 {
            fn table() -> ::myro::sql::Table {
                ::myro::sql::Table::new(#table)
                    #(.column(#columns))*
            }
        }
    }.into())
}
