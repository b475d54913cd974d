/// A single-field tuple struct is transparent: it delegates wholesale to
/// its inner type. Multi-field tuple structs have no SSZ rendering.
pub fn struct_is_transparent(s: &synstructure::Structure) -> bool {
    match &s.ast().data {
        syn::Data::Struct(data) => match &data.fields {
            syn::Fields::Unnamed(fields) => {
                assert!(
                    fields.unnamed.len() == 1,
                    "SSZ containers need named fields; only single-field tuple structs are supported"
                );
                true
            }
            _ => false,
        },
        _ => false,
    }
}

/// Validates the shape restrictions of SSZ unions: at most 128 variants,
/// a unit (null) variant only at selector 0, exactly one payload field
/// everywhere else.
pub fn check_union_shape(s: &synstructure::Structure) {
    let variants = s.variants();
    assert!(!variants.is_empty(), "SSZ unions need at least one variant");
    assert!(
        variants.len() <= 128,
        "SSZ union selectors are limited to 0..=127"
    );
    for (i, variant) in variants.iter().enumerate() {
        match variant.bindings().len() {
            0 => assert!(
                i == 0,
                "a unit (null) variant is only permitted as variant 0"
            ),
            1 => {}
            _ => panic!("SSZ union variants carry exactly one payload field"),
        }
    }
}
