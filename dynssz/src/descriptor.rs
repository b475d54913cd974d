//! Type descriptors and the per-instance descriptor cache.
//!
//! A [`TypeDescriptor`] is the codec's single source of truth for a type:
//! its SSZ kind, resolved sizes, fixed/variable classification and whether
//! any dimension deviates from its static default. Descriptors are built
//! once per [`DynSsz`](crate::DynSsz) instance, lazily on first use, and
//! shared through [`Arc`]s; the recursive marshalling paths consume
//! descriptors instead of inspecting types.

use crate::{
    bitfield::{BitList, BitVector},
    error::{Error, ErrorKind, Result},
    hint::{split_dims, DimHint},
    spec::SpecRegistry,
    tag::{self, FieldTags},
    uint::Uint256,
};
use std::{
    any::TypeId,
    collections::HashMap,
    sync::{Arc, RwLock},
};

/// The closed set of SSZ type kinds, with the per-kind layout data the
/// codec paths dispatch on.
#[derive(Debug, Clone)]
pub enum SszKind {
    /// One byte, 0 or 1.
    Bool,
    /// `uint8`.
    Uint8,
    /// `uint16`.
    Uint16,
    /// `uint32`.
    Uint32,
    /// `uint64`.
    Uint64,
    /// `uint128`.
    Uint128,
    /// `uint256`.
    Uint256,
    /// Fixed-length sequence of arbitrary elements.
    Vector {
        /// Element descriptor.
        elem: Arc<TypeDescriptor>,
        /// Declared element count.
        len: u64,
    },
    /// Variable-length sequence of arbitrary elements.
    List {
        /// Element descriptor.
        elem: Arc<TypeDescriptor>,
        /// Declared cap, when one was annotated.
        max: Option<u64>,
    },
    /// Fixed-length byte run (`Vector` of `uint8`, stored contiguously).
    ByteVector {
        /// Declared byte count.
        len: u64,
    },
    /// Variable-length byte run (`List` of `uint8`).
    ByteList {
        /// Declared cap, when one was annotated.
        max: Option<u64>,
    },
    /// Fixed-length bit run.
    BitVector {
        /// Declared bit count.
        bits: u64,
    },
    /// Variable-length bit run with a wire-level delimiter bit.
    BitList {
        /// Declared cap in bits, when one was annotated.
        max_bits: Option<u64>,
    },
    /// Heterogeneous record with named fields.
    Container {
        /// Field layout in declaration order.
        fields: Box<[FieldDescriptor]>,
    },
    /// Tagged alternative with a one-byte selector.
    Union {
        /// Variant layout in selector order.
        variants: Box<[UnionVariant]>,
    },
}

/// One field of a container.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name, as declared.
    pub name: &'static str,
    /// Descriptor of the field's type, built under the field's hints.
    pub desc: Arc<TypeDescriptor>,
    /// The resolved per-dimension hints of the field's annotations.
    pub dims: Box<[DimHint]>,
}

/// One variant of a union. A `None` payload is the declared Null variant
/// and is only legal at selector 0.
#[derive(Debug, Clone)]
pub struct UnionVariant {
    /// Variant name, as declared.
    pub name: &'static str,
    /// Payload descriptor; `None` for the Null variant.
    pub payload: Option<Arc<TypeDescriptor>>,
}

impl UnionVariant {
    /// Declares the Null variant.
    pub fn null(name: &'static str) -> Self {
        Self {
            name,
            payload: None,
        }
    }
}

/// Everything the codec knows about one type under one set of hints.
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    kind: SszKind,
    type_name: &'static str,
    fixed_size: Option<usize>,
    needs_dynamic: bool,
    fast_path: bool,
}

impl TypeDescriptor {
    fn primitive(kind: SszKind, type_name: &'static str, size: usize) -> Self {
        Self {
            kind,
            type_name,
            fixed_size: Some(size),
            needs_dynamic: false,
            fast_path: true,
        }
    }

    /// The kind this descriptor dispatches on.
    pub fn kind(&self) -> &SszKind {
        &self.kind
    }

    /// The short name of the described Rust type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The serialized size of a fixed type, with all hints applied.
    /// `None` for variable types.
    pub fn fixed_size(&self) -> Option<usize> {
        self.fixed_size
    }

    /// True when the serialized size depends only on the type.
    pub fn is_fixed(&self) -> bool {
        self.fixed_size.is_some()
    }

    /// True when any dimension of this type or a descendant deviates from
    /// its static default, forcing the dynamic codec path.
    pub fn needs_dynamic(&self) -> bool {
        self.needs_dynamic
    }

    /// True when the type advertises a static codec the dispatcher may
    /// delegate to.
    pub fn fast_path(&self) -> bool {
        self.fast_path
    }

    pub(crate) fn container_fields(&self) -> Result<&[FieldDescriptor]> {
        match &self.kind {
            SszKind::Container { fields } => Ok(fields),
            _ => Err(Error::new(ErrorKind::UnsupportedType(
                "expected a container descriptor",
            ))),
        }
    }

    pub(crate) fn union_variants(&self) -> Result<&[UnionVariant]> {
        match &self.kind {
            SszKind::Union { variants } => Ok(variants),
            _ => Err(Error::new(ErrorKind::UnsupportedType(
                "expected a union descriptor",
            ))),
        }
    }
}

/// Provides the codec with a descriptor for the implementing type.
///
/// Implementations for containers and unions come from
/// `#[derive(Describe)]`; primitives, sequences and the bitfield types are
/// built in. `describe` receives the dimension hints of the enclosing
/// field, outermost first; sequence types consume the first entry and pass
/// the rest on to their element type.
pub trait Describe {
    /// !INTERNAL USAGE ONLY!
    /// Marks the element type of contiguous byte runs.
    #[doc(hidden)]
    const IS_BYTE: bool = false;

    /// True when the type provides the static codec operations, making it
    /// eligible for fast-path dispatch.
    const STATIC_CODEC: bool = false;

    /// Builds the descriptor for this type under the given hints.
    fn describe(cx: &Describer<'_>, dims: &[DimHint]) -> Result<TypeDescriptor>;
}

type CacheKey = (TypeId, Box<[DimHint]>);

/// Bounded-write, unbounded-read descriptor store. Lookups take the read
/// lock only; construction runs unlocked and the insert keeps the first
/// published descriptor, so a racing duplicate build is discarded.
#[derive(Debug, Default)]
pub(crate) struct DescriptorCache {
    map: RwLock<HashMap<CacheKey, Arc<TypeDescriptor>>>,
}

impl DescriptorCache {
    fn get(&self, key: &CacheKey) -> Option<Arc<TypeDescriptor>> {
        self.map
            .read()
            .unwrap_or_else(|poison| poison.into_inner())
            .get(key)
            .cloned()
    }

    fn publish(&self, key: CacheKey, desc: Arc<TypeDescriptor>) -> Arc<TypeDescriptor> {
        self.map
            .write()
            .unwrap_or_else(|poison| poison.into_inner())
            .entry(key)
            .or_insert(desc)
            .clone()
    }
}

/// Descriptor-build context: the spec registry plus the instance cache.
#[derive(Debug, Clone, Copy)]
pub struct Describer<'a> {
    pub(crate) specs: &'a SpecRegistry,
    pub(crate) cache: &'a DescriptorCache,
}

impl Describer<'_> {
    /// The spec registry descriptors are resolved against.
    pub fn specs(&self) -> &SpecRegistry {
        self.specs
    }

    /// Returns the cached descriptor of `T` under `dims`, building and
    /// publishing it on first use.
    pub fn subtype<T: Describe + 'static>(&self, dims: &[DimHint]) -> Result<Arc<TypeDescriptor>> {
        let key = (TypeId::of::<T>(), dims.to_vec().into_boxed_slice());
        if let Some(found) = self.cache.get(&key) {
            return Ok(found);
        }
        tracing::trace!(ty = core::any::type_name::<T>(), "building type descriptor");
        let built = Arc::new(T::describe(self, dims)?);
        Ok(self.cache.publish(key, built))
    }

    /// Resolves a field's annotations, describes its type under them and
    /// appends the field descriptor. Used by generated `describe` bodies.
    pub fn field<T: Describe + 'static>(
        &self,
        out: &mut Vec<FieldDescriptor>,
        name: &'static str,
        tags: FieldTags,
    ) -> Result<()> {
        let dims = tag::resolve(&tags, self.specs).map_err(|e| e.at_field(name))?;
        let desc = self.subtype::<T>(&dims).map_err(|e| e.at_field(name))?;
        out.push(FieldDescriptor {
            name,
            desc,
            dims: dims.into_boxed_slice(),
        });
        Ok(())
    }

    /// Assembles a container descriptor from its field layout.
    pub fn container<T: Describe>(&self, fields: Vec<FieldDescriptor>) -> Result<TypeDescriptor> {
        let mut fixed_total = 0usize;
        let mut variable = false;
        let mut needs_dynamic = false;
        for fd in &fields {
            needs_dynamic |= fd.desc.needs_dynamic() || fd.dims.iter().any(|d| d.is_dynamic());
            match fd.desc.fixed_size() {
                Some(size) => {
                    fixed_total = fixed_total
                        .checked_add(size)
                        .ok_or_else(|| Error::new(ErrorKind::Overflow))?;
                }
                None => variable = true,
            }
        }
        Ok(TypeDescriptor {
            kind: SszKind::Container {
                fields: fields.into_boxed_slice(),
            },
            type_name: short_type_name::<T>(),
            fixed_size: (!variable).then_some(fixed_total),
            needs_dynamic,
            fast_path: T::STATIC_CODEC,
        })
    }

    /// Describes a union's payload variant. Used by generated `describe`
    /// bodies.
    pub fn variant<T: Describe + 'static>(&self, name: &'static str) -> Result<UnionVariant> {
        let payload = self.subtype::<T>(&[]).map_err(|e| e.at_variant(name))?;
        Ok(UnionVariant {
            name,
            payload: Some(payload),
        })
    }

    /// Assembles a union descriptor from its variant layout.
    pub fn union<T: Describe>(&self, variants: Vec<UnionVariant>) -> Result<TypeDescriptor> {
        if variants.is_empty() || variants.len() > 128 {
            return Err(Error::new(ErrorKind::UnsupportedType(
                "union selectors are limited to 0..=127",
            )));
        }
        if variants
            .iter()
            .skip(1)
            .any(|variant| variant.payload.is_none())
        {
            return Err(Error::new(ErrorKind::UnsupportedType(
                "only variant 0 of a union may be null",
            )));
        }
        let needs_dynamic = variants
            .iter()
            .flat_map(|variant| variant.payload.as_deref())
            .any(TypeDescriptor::needs_dynamic);
        Ok(TypeDescriptor {
            kind: SszKind::Union {
                variants: variants.into_boxed_slice(),
            },
            type_name: short_type_name::<T>(),
            fixed_size: None,
            needs_dynamic,
            fast_path: false,
        })
    }
}

/// Trims the module path off non-generic type names; generic names keep
/// their full rendering.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = core::any::type_name::<T>();
    match full.rfind("::") {
        Some(i) if !full.contains('<') => &full[i + 2..],
        _ => full,
    }
}

fn build_vector(
    type_name: &'static str,
    fast_path: bool,
    elem: Arc<TypeDescriptor>,
    len: u64,
    dynamic: bool,
) -> Result<TypeDescriptor> {
    let needs_dynamic = dynamic || elem.needs_dynamic();
    let fixed_size = match elem.fixed_size() {
        Some(elem_size) => Some(
            usize::try_from(len)
                .ok()
                .and_then(|len| elem_size.checked_mul(len))
                .ok_or_else(|| Error::new(ErrorKind::Overflow))?,
        ),
        None => None,
    };
    let kind = if matches!(elem.kind(), SszKind::Uint8) {
        SszKind::ByteVector { len }
    } else {
        SszKind::Vector { elem, len }
    };
    Ok(TypeDescriptor {
        kind,
        type_name,
        fixed_size,
        needs_dynamic,
        fast_path,
    })
}

fn build_list(
    type_name: &'static str,
    elem: Arc<TypeDescriptor>,
    max: Option<u64>,
    dynamic: bool,
) -> TypeDescriptor {
    let needs_dynamic = dynamic || elem.needs_dynamic();
    let kind = if matches!(elem.kind(), SszKind::Uint8) {
        SszKind::ByteList { max }
    } else {
        SszKind::List { elem, max }
    };
    TypeDescriptor {
        kind,
        type_name,
        fixed_size: None,
        needs_dynamic,
        fast_path: false,
    }
}

macro_rules! impl_describe_for_primitives {
    ($($t:ident => $kind:expr, $size:expr, $byte:literal;)*) => {
        $(
            impl Describe for $t {
                const IS_BYTE: bool = $byte;
                const STATIC_CODEC: bool = true;

                fn describe(_cx: &Describer<'_>, _dims: &[DimHint]) -> Result<TypeDescriptor> {
                    Ok(TypeDescriptor::primitive($kind, stringify!($t), $size))
                }
            }
        )*
    };
}

impl_describe_for_primitives! {
    bool => SszKind::Bool, 1, false;
    u8 => SszKind::Uint8, 1, true;
    u16 => SszKind::Uint16, 2, false;
    u32 => SszKind::Uint32, 4, false;
    u64 => SszKind::Uint64, 8, false;
    u128 => SszKind::Uint128, 16, false;
}

impl Describe for Uint256 {
    const STATIC_CODEC: bool = true;

    fn describe(_cx: &Describer<'_>, _dims: &[DimHint]) -> Result<TypeDescriptor> {
        Ok(TypeDescriptor::primitive(SszKind::Uint256, "Uint256", 32))
    }
}

impl<T: Describe + 'static, const N: usize> Describe for [T; N] {
    const STATIC_CODEC: bool = T::STATIC_CODEC;

    fn describe(cx: &Describer<'_>, dims: &[DimHint]) -> Result<TypeDescriptor> {
        let (head, rest) = split_dims(dims);
        if let Some(hint) = head.size {
            // A Rust array cannot change length at runtime, so a hint that
            // resolves to anything else is a declaration error.
            if hint.value != N as u64 {
                return Err(Error::new(ErrorKind::SizeMismatch {
                    expected: N,
                    actual: hint.value as usize,
                }));
            }
        }
        let elem = cx.subtype::<T>(rest)?;
        build_vector(
            short_type_name::<Self>(),
            Self::STATIC_CODEC,
            elem,
            N as u64,
            head.size.is_some_and(|hint| hint.dynamic),
        )
    }
}

impl<T: Describe + 'static> Describe for Vec<T> {
    fn describe(cx: &Describer<'_>, dims: &[DimHint]) -> Result<TypeDescriptor> {
        let (head, rest) = split_dims(dims);
        let elem = cx.subtype::<T>(rest)?;
        match head.size {
            Some(hint) => build_vector(
                short_type_name::<Self>(),
                Self::STATIC_CODEC,
                elem,
                hint.value,
                hint.dynamic,
            ),
            None => Ok(build_list(
                short_type_name::<Self>(),
                elem,
                head.max.map(|hint| hint.value),
                head.max.is_some_and(|hint| hint.dynamic),
            )),
        }
    }
}

impl Describe for BitVector {
    fn describe(_cx: &Describer<'_>, dims: &[DimHint]) -> Result<TypeDescriptor> {
        let (head, _) = split_dims(dims);
        let hint = head.size.ok_or_else(|| {
            Error::new(ErrorKind::UnsupportedType(
                "bit vectors need a declared bit length",
            ))
        })?;
        let bytes = usize::try_from(hint.value.div_ceil(8))
            .map_err(|_| Error::new(ErrorKind::Overflow))?;
        Ok(TypeDescriptor {
            kind: SszKind::BitVector { bits: hint.value },
            type_name: "BitVector",
            fixed_size: Some(bytes),
            needs_dynamic: hint.dynamic,
            fast_path: false,
        })
    }
}

impl Describe for BitList {
    fn describe(_cx: &Describer<'_>, dims: &[DimHint]) -> Result<TypeDescriptor> {
        let (head, _) = split_dims(dims);
        Ok(TypeDescriptor {
            kind: SszKind::BitList {
                max_bits: head.max.map(|hint| hint.value),
            },
            type_name: "BitList",
            fixed_size: None,
            needs_dynamic: head.max.is_some_and(|hint| hint.dynamic),
            fast_path: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hint::SizeHint;

    fn harness(pairs: &[(&str, u64)]) -> (SpecRegistry, DescriptorCache) {
        (
            SpecRegistry::new(pairs.iter().map(|(k, v)| (k.to_string(), *v))),
            DescriptorCache::default(),
        )
    }

    fn sized(value: u64, dynamic: bool) -> DimHint {
        DimHint {
            size: Some(SizeHint {
                value,
                dynamic,
                spec_derived: dynamic,
            }),
            max: None,
        }
    }

    #[test]
    fn primitives_are_fixed_and_fast() {
        let (specs, cache) = harness(&[]);
        let cx = Describer {
            specs: &specs,
            cache: &cache,
        };
        let desc = cx.subtype::<u64>(&[]).unwrap();
        assert_eq!(desc.fixed_size(), Some(8));
        assert!(desc.fast_path());
        assert!(!desc.needs_dynamic());
    }

    #[test]
    fn byte_vectors_collapse_to_contiguous_kind() {
        let (specs, cache) = harness(&[]);
        let cx = Describer {
            specs: &specs,
            cache: &cache,
        };
        let desc = cx.subtype::<[u8; 32]>(&[]).unwrap();
        assert!(matches!(desc.kind(), SszKind::ByteVector { len: 32 }));
        assert_eq!(desc.fixed_size(), Some(32));
    }

    #[test]
    fn hinted_vec_becomes_vector_with_resolved_size() {
        let (specs, cache) = harness(&[]);
        let cx = Describer {
            specs: &specs,
            cache: &cache,
        };
        let desc = cx
            .subtype::<Vec<[u8; 32]>>(&[sized(64, true)])
            .unwrap();
        assert!(matches!(desc.kind(), SszKind::Vector { len: 64, .. }));
        assert_eq!(desc.fixed_size(), Some(64 * 32));
        assert!(desc.needs_dynamic());
        assert!(!desc.fast_path());
    }

    #[test]
    fn unhinted_vec_is_a_list() {
        let (specs, cache) = harness(&[]);
        let cx = Describer {
            specs: &specs,
            cache: &cache,
        };
        let desc = cx.subtype::<Vec<u64>>(&[]).unwrap();
        assert!(matches!(desc.kind(), SszKind::List { max: None, .. }));
        assert_eq!(desc.fixed_size(), None);
    }

    #[test]
    fn array_hints_must_match_the_length() {
        let (specs, cache) = harness(&[]);
        let cx = Describer {
            specs: &specs,
            cache: &cache,
        };
        let err = cx.subtype::<[u8; 32]>(&[sized(48, true)]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::SizeMismatch { .. }));
    }

    #[test]
    fn descriptors_are_cached_per_type_and_hints() {
        let (specs, cache) = harness(&[]);
        let cx = Describer {
            specs: &specs,
            cache: &cache,
        };
        let first = cx.subtype::<Vec<u8>>(&[]).unwrap();
        let second = cx.subtype::<Vec<u8>>(&[]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let hinted = cx.subtype::<Vec<u8>>(&[sized(4, false)]).unwrap();
        assert!(!Arc::ptr_eq(&first, &hinted));
        assert!(matches!(hinted.kind(), SszKind::ByteVector { len: 4 }));
    }

    #[test]
    fn bit_vector_needs_a_length_hint() {
        let (specs, cache) = harness(&[]);
        let cx = Describer {
            specs: &specs,
            cache: &cache,
        };
        let err = cx.subtype::<BitVector>(&[]).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::UnsupportedType(_)));

        let desc = cx.subtype::<BitVector>(&[sized(9, false)]).unwrap();
        assert!(matches!(desc.kind(), SszKind::BitVector { bits: 9 }));
        assert_eq!(desc.fixed_size(), Some(2));
    }
}
