use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

use crate::{
    attribute::FieldAttrs,
    helpers::{check_union_shape, struct_is_transparent},
};

fn opt_str(value: &Option<String>) -> TokenStream2 {
    match value {
        Some(value) => quote!(::core::option::Option::Some(#value)),
        None => quote!(::core::option::Option::None),
    }
}

fn describe_struct(s: &synstructure::Structure) -> TokenStream2 {
    let variant = &s.variants()[0];

    if struct_is_transparent(s) {
        let inner = &variant.bindings()[0].ast().ty;
        return s.gen_impl(quote! {
            gen impl dynssz::Describe for @Self {
                const STATIC_CODEC: bool = <#inner as dynssz::Describe>::STATIC_CODEC;

                fn describe(
                    cx: &dynssz::Describer<'_>,
                    dims: &[dynssz::DimHint],
                ) -> dynssz::Result<dynssz::TypeDescriptor> {
                    <#inner as dynssz::Describe>::describe(cx, dims)
                }
            }
        });
    }

    let mut static_codec = Vec::new();
    let mut field_calls = Vec::new();
    for binding in variant.bindings() {
        let field = binding.ast();
        let attrs = FieldAttrs::parse(&field.attrs);
        if attrs.skip {
            continue;
        }
        let ty = &field.ty;
        let name = field
            .ident
            .as_ref()
            .expect("SSZ containers need named fields")
            .to_string();
        let static_size = opt_str(&attrs.static_size);
        let dynamic_size = opt_str(&attrs.dynamic_size);
        let max_size = opt_str(&attrs.max_size);
        let dynamic_max = opt_str(&attrs.dynamic_max);
        static_codec.push(quote!(<#ty as dynssz::Describe>::STATIC_CODEC));
        field_calls.push(quote! {
            cx.field::<#ty>(&mut fields, #name, dynssz::FieldTags {
                static_size: #static_size,
                dynamic_size: #dynamic_size,
                max_size: #max_size,
                dynamic_max: #dynamic_max,
            })?;
        });
    }

    let field_count = field_calls.len();
    let static_codec = if static_codec.is_empty() {
        quote!(true)
    } else {
        quote!(#(#static_codec)&&*)
    };

    s.gen_impl(quote! {
        gen impl dynssz::Describe for @Self {
            const STATIC_CODEC: bool = #static_codec;

            fn describe(
                cx: &dynssz::Describer<'_>,
                dims: &[dynssz::DimHint],
            ) -> dynssz::Result<dynssz::TypeDescriptor> {
                let _ = dims;
                let mut fields = ::std::vec::Vec::with_capacity(#field_count);
                #(#field_calls)*
                cx.container::<Self>(fields)
            }
        }
    })
}

fn describe_enum(s: &synstructure::Structure) -> TokenStream2 {
    check_union_shape(s);

    let variant_count = s.variants().len();
    let pushes = s.variants().iter().map(|variant| {
        let name = variant.ast().ident.to_string();
        if variant.bindings().is_empty() {
            quote!(variants.push(dynssz::UnionVariant::null(#name));)
        } else {
            let ty = &variant.bindings()[0].ast().ty;
            quote!(variants.push(cx.variant::<#ty>(#name)?);)
        }
    });

    s.gen_impl(quote! {
        gen impl dynssz::Describe for @Self {
            fn describe(
                cx: &dynssz::Describer<'_>,
                dims: &[dynssz::DimHint],
            ) -> dynssz::Result<dynssz::TypeDescriptor> {
                let _ = dims;
                let mut variants = ::std::vec::Vec::with_capacity(#variant_count);
                #(#pushes)*
                cx.union::<Self>(variants)
            }
        }
    })
}

/// Derives `Describe` for the given container `struct` or union `enum`.
pub fn describe_derive(mut s: synstructure::Structure) -> TokenStream2 {
    s.add_bounds(synstructure::AddBounds::Fields)
        .underscore_const(true);
    match s.ast().data {
        syn::Data::Struct(_) => describe_struct(&s),
        syn::Data::Enum(_) => describe_enum(&s),
        _ => panic!("Can't derive `Describe` for `union`s"),
    }
}
