// Panics surface as compile errors on the offending item.

use syn::{Attribute, LitStr};

/// The `#[ssz(...)]` annotations of one container field.
#[derive(Debug, Default)]
pub struct FieldAttrs {
    pub skip: bool,
    pub static_size: Option<String>,
    pub dynamic_size: Option<String>,
    pub max_size: Option<String>,
    pub dynamic_max: Option<String>,
}

impl FieldAttrs {
    pub fn parse(attrs: &[Attribute]) -> Self {
        let mut out = Self::default();
        for attr in attrs {
            if !attr.path().is_ident("ssz") {
                continue;
            }
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    out.skip = true;
                } else if meta.path.is_ident("static_size") {
                    set_once(&mut out.static_size, "static_size", string_value(&meta)?);
                } else if meta.path.is_ident("dynamic_size") {
                    set_once(&mut out.dynamic_size, "dynamic_size", string_value(&meta)?);
                } else if meta.path.is_ident("max_size") {
                    set_once(&mut out.max_size, "max_size", string_value(&meta)?);
                } else if meta.path.is_ident("dynamic_max") {
                    set_once(&mut out.dynamic_max, "dynamic_max", string_value(&meta)?);
                } else {
                    return Err(meta.error("unknown ssz attribute"));
                }
                Ok(())
            })
            .unwrap_or_else(|e| panic!("{e}"));
        }
        out
    }
}

fn string_value(meta: &syn::meta::ParseNestedMeta<'_>) -> syn::Result<String> {
    let lit: LitStr = meta.value()?.parse()?;
    Ok(lit.value())
}

fn set_once(slot: &mut Option<String>, name: &str, value: String) {
    if slot.replace(value).is_some() {
        panic!("duplicate ssz attribute: {name}");
    }
}

pub fn should_skip_field(attrs: &[Attribute]) -> bool {
    FieldAttrs::parse(attrs).skip
}

pub fn should_skip_field_binding(binding: &synstructure::BindingInfo<'_>) -> bool {
    should_skip_field(&binding.ast().attrs)
}
