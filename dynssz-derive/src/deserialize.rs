use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

use crate::{
    attribute::{should_skip_field, should_skip_field_binding},
    helpers::{check_union_shape, struct_is_transparent},
};

fn deserialize_transparent(s: &synstructure::Structure) -> TokenStream2 {
    let inner = &s.variants()[0].bindings()[0].ast().ty;
    s.gen_impl(quote! {
        gen impl dynssz::Deserialize for @Self {
            fn decode(
                &mut self,
                desc: &dynssz::TypeDescriptor,
                data: &[u8],
            ) -> dynssz::Result<()> {
                let Self(inner) = self;
                dynssz::de::decode_value(inner, desc, data)
            }

            fn zeroed() -> Self {
                Self(<#inner as dynssz::Deserialize>::zeroed())
            }

            fn static_decode(&mut self, data: &mut &[u8]) -> dynssz::Result<()> {
                let Self(inner) = self;
                dynssz::Deserialize::static_decode(inner, data)
            }
        }
    })
}

fn deserialize_struct(s: &mut synstructure::Structure) -> TokenStream2 {
    if struct_is_transparent(s) {
        return deserialize_transparent(s);
    }

    s.bind_with(|_| synstructure::BindStyle::RefMut);

    let decode_body = s.each(|binding| {
        if should_skip_field_binding(binding) {
            quote!(*#binding = ::core::default::Default::default();)
        } else {
            quote!(dec.field(#binding)?;)
        }
    });
    let static_decode_body = s.each(|binding| {
        if should_skip_field_binding(binding) {
            quote!(*#binding = ::core::default::Default::default();)
        } else {
            quote!(dynssz::Deserialize::static_decode(#binding, data)?;)
        }
    });
    let zeroed_body = s.variants()[0].construct(|field, _| {
        if should_skip_field(&field.attrs) {
            quote!(::core::default::Default::default())
        } else {
            let ty = &field.ty;
            quote!(<#ty as dynssz::Deserialize>::zeroed())
        }
    });

    s.gen_impl(quote! {
        gen impl dynssz::Deserialize for @Self {
            fn decode(
                &mut self,
                desc: &dynssz::TypeDescriptor,
                data: &[u8],
            ) -> dynssz::Result<()> {
                let mut dec = dynssz::de::ContainerDecoder::new(desc, data)?;
                match *self { #decode_body };
                dec.finish()
            }

            fn zeroed() -> Self {
                #zeroed_body
            }

            fn static_decode(&mut self, data: &mut &[u8]) -> dynssz::Result<()> {
                match *self { #static_decode_body };
                ::core::result::Result::Ok(())
            }
        }
    })
}

fn deserialize_enum(s: &synstructure::Structure) -> TokenStream2 {
    check_union_shape(s);

    let arms = s.variants().iter().enumerate().map(|(i, variant)| {
        let selector = i as u8;
        if variant.bindings().is_empty() {
            let construct = variant.construct(|_, _| quote!());
            quote! {
                #selector => {
                    dynssz::de::check_null_payload(payload)?;
                    #construct
                }
            }
        } else {
            let ty = &variant.bindings()[0].ast().ty;
            let construct = variant.construct(|_, _| quote!(__payload_value));
            quote! {
                #selector => {
                    let mut __payload_value = <#ty as dynssz::Deserialize>::zeroed();
                    dynssz::de::decode_union_variant(
                        &mut __payload_value,
                        desc,
                        #selector,
                        payload,
                    )?;
                    #construct
                }
            }
        }
    });

    let zeroed_body = s.variants()[0].construct(|field, _| {
        let ty = &field.ty;
        quote!(<#ty as dynssz::Deserialize>::zeroed())
    });

    s.gen_impl(quote! {
        gen impl dynssz::Deserialize for @Self {
            fn decode(
                &mut self,
                desc: &dynssz::TypeDescriptor,
                data: &[u8],
            ) -> dynssz::Result<()> {
                let (selector, payload) = dynssz::de::split_union(desc, data)?;
                *self = match selector {
                    #(#arms)*
                    other => {
                        return ::core::result::Result::Err(dynssz::Error::new(
                            dynssz::ErrorKind::InvalidUnionSelector(other),
                        ))
                    }
                };
                ::core::result::Result::Ok(())
            }

            fn zeroed() -> Self {
                #zeroed_body
            }
        }
    })
}

/// Derives `Deserialize` for the given container `struct` or union `enum`.
pub fn deserialize_derive(mut s: synstructure::Structure) -> TokenStream2 {
    s.add_bounds(synstructure::AddBounds::Fields)
        .underscore_const(true);
    match s.ast().data {
        syn::Data::Struct(_) => deserialize_struct(&mut s),
        syn::Data::Enum(_) => deserialize_enum(&s),
        _ => panic!("Can't derive `Deserialize` for `union`s"),
    }
}
