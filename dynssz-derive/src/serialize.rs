use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

use crate::{
    attribute::should_skip_field_binding,
    helpers::{check_union_shape, struct_is_transparent},
};

fn serialize_transparent(s: &synstructure::Structure) -> TokenStream2 {
    s.gen_impl(quote! {
        gen impl dynssz::Serialize for @Self {
            fn encode(
                &self,
                desc: &dynssz::TypeDescriptor,
                out: &mut ::std::vec::Vec<u8>,
            ) -> dynssz::Result<()> {
                let Self(inner) = self;
                dynssz::ser::encode_value(inner, desc, out)
            }

            fn size(&self, desc: &dynssz::TypeDescriptor) -> dynssz::Result<usize> {
                let Self(inner) = self;
                dynssz::ser::value_size(inner, desc)
            }

            fn static_encode(&self, out: &mut ::std::vec::Vec<u8>) -> dynssz::Result<()> {
                let Self(inner) = self;
                dynssz::Serialize::static_encode(inner, out)
            }

            fn static_size(&self) -> dynssz::Result<usize> {
                let Self(inner) = self;
                dynssz::Serialize::static_size(inner)
            }
        }
    })
}

fn serialize_struct(s: &mut synstructure::Structure) -> TokenStream2 {
    if struct_is_transparent(s) {
        return serialize_transparent(s);
    }

    s.filter(|binding| !should_skip_field_binding(binding));

    let encode_body = s.each(|binding| quote!(enc.field(#binding)?;));
    let size_body = s.each(|binding| quote!(acc.field(#binding)?;));
    let static_encode_body =
        s.each(|binding| quote!(dynssz::Serialize::static_encode(#binding, out)?;));
    let static_size_body = s.each(|binding| {
        quote! {
            total = total
                .checked_add(dynssz::Serialize::static_size(#binding)?)
                .ok_or_else(|| dynssz::Error::new(dynssz::ErrorKind::Overflow))?;
        }
    });

    s.gen_impl(quote! {
        gen impl dynssz::Serialize for @Self {
            fn encode(
                &self,
                desc: &dynssz::TypeDescriptor,
                out: &mut ::std::vec::Vec<u8>,
            ) -> dynssz::Result<()> {
                let mut enc = dynssz::ser::ContainerEncoder::new(desc, out)?;
                match *self { #encode_body };
                enc.finish()
            }

            fn size(&self, desc: &dynssz::TypeDescriptor) -> dynssz::Result<usize> {
                if let ::core::option::Option::Some(size) = desc.fixed_size() {
                    return ::core::result::Result::Ok(size);
                }
                let mut acc = dynssz::ser::ContainerSizer::new(desc)?;
                match *self { #size_body };
                acc.finish()
            }

            fn static_encode(&self, out: &mut ::std::vec::Vec<u8>) -> dynssz::Result<()> {
                match *self { #static_encode_body };
                ::core::result::Result::Ok(())
            }

            fn static_size(&self) -> dynssz::Result<usize> {
                let mut total = 0usize;
                match *self { #static_size_body };
                ::core::result::Result::Ok(total)
            }
        }
    })
}

fn serialize_enum(s: &synstructure::Structure) -> TokenStream2 {
    check_union_shape(s);

    let encode_arms = s.variants().iter().enumerate().map(|(i, variant)| {
        let pat = variant.pat();
        let selector = i as u8;
        if variant.bindings().is_empty() {
            quote!(#pat => dynssz::ser::encode_union_null(desc, out),)
        } else {
            let binding = &variant.bindings()[0];
            quote!(#pat => dynssz::ser::encode_union_variant(#binding, desc, #selector, out),)
        }
    });
    let size_arms = s.variants().iter().enumerate().map(|(i, variant)| {
        let pat = variant.pat();
        let selector = i as u8;
        if variant.bindings().is_empty() {
            quote!(#pat => dynssz::ser::union_null_size(desc),)
        } else {
            let binding = &variant.bindings()[0];
            quote!(#pat => dynssz::ser::union_variant_size(#binding, desc, #selector),)
        }
    });

    s.gen_impl(quote! {
        gen impl dynssz::Serialize for @Self {
            fn encode(
                &self,
                desc: &dynssz::TypeDescriptor,
                out: &mut ::std::vec::Vec<u8>,
            ) -> dynssz::Result<()> {
                match *self {
                    #(#encode_arms)*
                }
            }

            fn size(&self, desc: &dynssz::TypeDescriptor) -> dynssz::Result<usize> {
                match *self {
                    #(#size_arms)*
                }
            }
        }
    })
}

/// Derives `Serialize` for the given container `struct` or union `enum`.
pub fn serialize_derive(mut s: synstructure::Structure) -> TokenStream2 {
    s.add_bounds(synstructure::AddBounds::Fields)
        .underscore_const(true);
    match s.ast().data {
        syn::Data::Struct(_) => serialize_struct(&mut s),
        syn::Data::Enum(_) => serialize_enum(&s),
        _ => panic!("Can't derive `Serialize` for `union`s"),
    }
}
