//! Derive macros for `myro`.
use proc_macro::TokenStream;
use syn::DeriveInput;

macro_rules! error {
    ($span:expr, $($tt:tt)*) => {
        return Err(syn::Error::new_spanned($span, format!($($tt)*)))
    };
}

pub(crate) use error;

mod attr;
mod decode;
mod from_row;
mod table;

/// Derive `FromRow`.
///
/// Named field is decoded from the column with the same name, or the one
/// given by `#[sql(rename = "...")]`. Tuple field is decoded by position.
#[proc_macro_derive(FromRow, attributes(sql))]
pub fn from_row(input: TokenStream) -> TokenStream {
    match from_row::from_row(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}

/// Derive `Decode`.
///
/// A single field struct decodes its field. An enum of unit variants decodes
/// from the text of an `ENUM` column, matched against the snake case variant
/// name, or the one given by `#[sql(rename = "...")]`.
#[proc_macro_derive(Decode, attributes(sql))]
pub fn decode(input: TokenStream) -> TokenStream {
    match decode::decode(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}

/// Derive `sql::Entity`.
///
/// Table name is the snake case struct name, or the one given by
/// `#[sql("name")]`. Field attributes:
///
/// - `#[sql(id)]`, auto increment primary key
/// - `#[sql(skip)]`, not a column
/// - `#[sql(date)]`, `#[sql(time)]`, `#[sql(timestamp)]`, declared column kind
/// - `#[sql(rename = "...")]`, column name
#[proc_macro_derive(Table, attributes(sql))]
pub fn table(input: TokenStream) -> TokenStream {
    match table::table(syn::parse_macro_input!(input as DeriveInput)) {
        Ok(ok) => ok,
        Err(err) => err.into_compile_error().into(),
    }
}
