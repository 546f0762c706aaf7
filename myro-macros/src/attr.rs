use syn::{ext::IdentExt, *};

use crate::error;

/// Parsed `#[sql(...)]` field attribute.
#[derive(Debug, Default)]
pub struct FieldAttr {
    pub rename: Option<String>,
    pub id: bool,
    pub skip: bool,
    /// `date`, `time` or `timestamp`
    pub kind: Option<Ident>,
}

impl FieldAttr {
    pub fn from_attrs(attrs: &[Attribute]) -> Result<Self> {
        let mut me = Self::default();
        for attr in attrs.iter().filter(|e| e.path().is_ident("sql")) {
            attr.parse_nested_meta(|meta| {
                let Some(ident) = meta.path.get_ident() else {
                    return Err(meta.error("expected identifier"));
                };
                match ident.to_string().as_str() {
                    "rename" => me.rename = Some(meta.value()?.parse::<LitStr>()?.value()),
                    "id" => me.id = true,
                    "skip" => me.skip = true,
                    "date" | "time" | "timestamp" => me.kind = Some(ident.clone()),
                    _ => error!(
                        ident,
                        "possible value are: `id`, `skip`, `date`, `time`, `timestamp` or `rename = \"name\"`"
                    ),
                }
                Ok(())
            })?;
        }
        Ok(me)
    }

    /// Column name of field `ident`.
    pub fn column_name(&self, ident: &Ident) -> String {
        match &self.rename {
            Some(name) => name.clone(),
            None => ident.unraw().to_string(),
        }
    }
}

pub fn to_snake_case(string: &str) -> String {
    let mut output = String::with_capacity(string.len());

    for (i, ch) in string.chars().enumerate() {
        if ch.is_uppercase() {
            if i != 0 {
                output.push('_');
            }
            output.extend(ch.to_lowercase());
        } else {
            output.push(ch);
        }
    }

    output
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn snake_case() {
        assert_eq!(to_snake_case("BlogPost"), "blog_post");
        assert_eq!(to_snake_case("post"), "post");
        assert_eq!(to_snake_case(""), "");
    }

    #[test]
    fn field_attr() {
        let field: Field = parse_quote! {
            #[sql(id, rename = "post_id")]
            id: i64
        };
        let attr = FieldAttr::from_attrs(&field.attrs).unwrap();
        assert!(attr.id);
        assert!(!attr.skip);
        assert_eq!(attr.column_name(field.ident.as_ref().unwrap()), "post_id");

        let field: Field = parse_quote! { #[sql(nope)] id: i64 };
        assert!(FieldAttr::from_attrs(&field.attrs).is_err());
    }
}
