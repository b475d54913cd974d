//! Extraction of per-field size annotations.
//!
//! The derive macros forward annotation strings verbatim; this module parses
//! them and resolves dynamic entries against the spec registry at
//! descriptor-build time. Each annotation is a comma-separated list with one
//! entry per nested dimension, outermost first: `static_size = "8192,32"`
//! describes a vector of 8192 byte-vectors of 32 bytes.

use crate::{
    error::{Error, ErrorKind, Result},
    expr::{EvalError, SizeExpr},
    hint::{DimHint, SizeHint},
    spec::SpecRegistry,
};

/// The raw annotation strings of one container field, as captured by the
/// derive macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldTags {
    /// `static_size`: positive decimal or `?` per dimension.
    pub static_size: Option<&'static str>,
    /// `dynamic_size`: expression or `?` per dimension, aligned with
    /// `static_size`; trailing dimensions may be omitted.
    pub dynamic_size: Option<&'static str>,
    /// `max_size`: static list/bitlist cap per dimension.
    pub max_size: Option<&'static str>,
    /// `dynamic_max`: expression cap override, aligned with `max_size`.
    pub dynamic_max: Option<&'static str>,
}

impl From<EvalError> for Error {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::UnknownSpec(name) => Error::new(ErrorKind::UnknownSpec(name)),
            EvalError::Overflow => Error::new(ErrorKind::Overflow),
            other => Error::new(ErrorKind::Expression(other.to_string())),
        }
    }
}

/// Parses and resolves a field's annotations into per-dimension hints.
pub(crate) fn resolve(tags: &FieldTags, specs: &SpecRegistry) -> Result<Vec<DimHint>> {
    let sizes = merge(
        parse_static_entries(tags.static_size)?,
        parse_dynamic_entries(tags.dynamic_size, specs)?,
        Strictness::PositiveSizes,
    )?;
    let maxes = merge(
        parse_static_entries(tags.max_size)?,
        parse_dynamic_entries(tags.dynamic_max, specs)?,
        Strictness::CapsMayBeZero,
    )?;

    let dims = sizes.len().max(maxes.len());
    Ok((0..dims)
        .map(|i| DimHint {
            size: sizes.get(i).copied().flatten(),
            max: maxes.get(i).copied().flatten(),
        })
        .collect())
}

#[derive(Clone, Copy, PartialEq)]
enum Strictness {
    PositiveSizes,
    CapsMayBeZero,
}

/// `?` entries become `None`; anything else must be a decimal.
fn parse_static_entries(tag: Option<&str>) -> Result<Vec<Option<u64>>> {
    let Some(tag) = tag else {
        return Ok(Vec::new());
    };
    tag.split(',')
        .map(|entry| {
            let entry = entry.trim();
            if entry == "?" {
                return Ok(None);
            }
            entry
                .parse::<u64>()
                .map(Some)
                .map_err(|_| invalid_tag("static entries must be decimal integers or `?`"))
        })
        .collect()
}

/// `?` entries become `None`; anything else is parsed and evaluated.
fn parse_dynamic_entries(tag: Option<&str>, specs: &SpecRegistry) -> Result<Vec<Option<u64>>> {
    let Some(tag) = tag else {
        return Ok(Vec::new());
    };
    tag.split(',')
        .map(|entry| {
            let entry = entry.trim();
            if entry == "?" {
                return Ok(None);
            }
            Ok(Some(SizeExpr::resolve(entry, specs)?))
        })
        .collect()
}

/// Combines static defaults with resolved dynamic overrides, dimension by
/// dimension. A dynamic list longer than a present static list is a
/// declaration error; a shorter one leaves the trailing dimensions static.
fn merge(
    statics: Vec<Option<u64>>,
    dynamics: Vec<Option<u64>>,
    strictness: Strictness,
) -> Result<Vec<Option<SizeHint>>> {
    if !statics.is_empty() && dynamics.len() > statics.len() {
        return Err(invalid_tag(
            "dynamic annotation declares more dimensions than its static counterpart",
        ));
    }

    let dims = statics.len().max(dynamics.len());
    let mut out = Vec::with_capacity(dims);
    for i in 0..dims {
        let static_value = statics.get(i).copied().flatten();
        let dynamic_value = dynamics.get(i).copied().flatten();
        let hint = match (static_value, dynamic_value) {
            (Some(default), Some(resolved)) => Some(SizeHint {
                value: resolved,
                dynamic: resolved != default,
                spec_derived: true,
            }),
            (Some(default), None) => Some(SizeHint::fixed(default)),
            // No static baseline to match: the resolved value is
            // authoritative and always takes the dynamic path.
            (None, Some(resolved)) => Some(SizeHint {
                value: resolved,
                dynamic: true,
                spec_derived: true,
            }),
            (None, None) => None,
        };
        if strictness == Strictness::PositiveSizes {
            if let Some(hint) = hint {
                if hint.value == 0 {
                    return Err(invalid_tag("declared sizes must be positive"));
                }
            }
        }
        out.push(hint);
    }
    Ok(out)
}

fn invalid_tag(msg: &str) -> Error {
    Error::new(ErrorKind::Expression(msg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(pairs: &[(&str, u64)]) -> SpecRegistry {
        SpecRegistry::new(pairs.iter().map(|(k, v)| (k.to_string(), *v)))
    }

    fn tags(
        static_size: Option<&'static str>,
        dynamic_size: Option<&'static str>,
    ) -> FieldTags {
        FieldTags {
            static_size,
            dynamic_size,
            ..FieldTags::default()
        }
    }

    #[test]
    fn static_only_dimensions_are_not_dynamic() {
        let dims = resolve(&tags(Some("8192,32"), None), &specs(&[])).unwrap();
        assert_eq!(dims.len(), 2);
        assert_eq!(dims[0].size, Some(SizeHint::fixed(8192)));
        assert_eq!(dims[1].size, Some(SizeHint::fixed(32)));
        assert!(!dims[0].is_dynamic());
    }

    #[test]
    fn matching_dynamic_resolution_stays_static() {
        let specs = specs(&[("SLOTS_PER_HISTORICAL_ROOT", 8192)]);
        let dims = resolve(
            &tags(Some("8192,32"), Some("SLOTS_PER_HISTORICAL_ROOT,32")),
            &specs,
        )
        .unwrap();
        assert_eq!(dims[0].size.unwrap().value, 8192);
        assert!(!dims[0].size.unwrap().dynamic);
        assert!(dims[0].size.unwrap().spec_derived);
    }

    #[test]
    fn deviating_dynamic_resolution_is_dynamic() {
        let specs = specs(&[("SLOTS_PER_HISTORICAL_ROOT", 64)]);
        let dims = resolve(
            &tags(Some("8192,32"), Some("SLOTS_PER_HISTORICAL_ROOT,32")),
            &specs,
        )
        .unwrap();
        assert_eq!(dims[0].size.unwrap().value, 64);
        assert!(dims[0].size.unwrap().dynamic);
        assert!(!dims[1].size.unwrap().dynamic);
    }

    #[test]
    fn lone_dynamic_size_is_authoritative() {
        let specs = specs(&[("N", 48)]);
        let dims = resolve(&tags(None, Some("N")), &specs).unwrap();
        let hint = dims[0].size.unwrap();
        assert_eq!(hint.value, 48);
        assert!(hint.dynamic);
        assert!(hint.spec_derived);
    }

    #[test]
    fn question_marks_leave_dimensions_variable() {
        let dims = resolve(
            &FieldTags {
                static_size: Some("?,32"),
                max_size: Some("2048"),
                ..FieldTags::default()
            },
            &specs(&[]),
        )
        .unwrap();
        assert!(dims[0].size.is_none());
        assert_eq!(dims[0].max.unwrap().value, 2048);
        assert_eq!(dims[1].size.unwrap().value, 32);
    }

    #[test]
    fn trailing_dynamic_dimensions_may_be_omitted() {
        let specs = specs(&[("N", 16)]);
        let dims = resolve(&tags(Some("8192,32"), Some("N")), &specs).unwrap();
        assert!(dims[0].size.unwrap().dynamic);
        assert!(!dims[1].size.unwrap().dynamic);
    }

    #[test]
    fn extra_dynamic_dimensions_are_rejected() {
        let specs = specs(&[("N", 16)]);
        let err = resolve(&tags(Some("8192"), Some("N,32")), &specs).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Expression(_)));
    }

    #[test]
    fn unknown_spec_names_keep_their_kind() {
        let err = resolve(&tags(None, Some("MISSING")), &specs(&[])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnknownSpec(name) if name == "MISSING"));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let err = resolve(&tags(Some("0"), None), &specs(&[])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Expression(_)));
    }

    #[test]
    fn zero_caps_are_allowed() {
        let dims = resolve(
            &FieldTags {
                max_size: Some("0"),
                ..FieldTags::default()
            },
            &specs(&[]),
        )
        .unwrap();
        assert_eq!(dims[0].max.unwrap().value, 0);
    }
}
