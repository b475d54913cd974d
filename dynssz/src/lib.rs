//! Dynamic SSZ (Simple Serialize) encoding and decoding for Ethereum
//! consensus types whose field sizes are not fixed by the mainnet preset.
//!
//! SSZ wire layouts depend on declared vector, byte-vector and bitvector
//! lengths. When those lengths come from a preset (minimal, a custom
//! testnet), a statically generated codec cannot serve every preset from
//! one binary. This crate resolves sizes at runtime instead: field
//! annotations carry a static default and an optional expression over
//! named spec values, a [`DynSsz`] instance is built with the concrete
//! spec, and per-type descriptors memoize the resolved layout. Types whose
//! layout ends up entirely static are still served by their static codec
//! through the fast-path dispatcher.
//!
//! ```
//! use dynssz::{Describe, Deserialize, DynSsz, Serialize};
//!
//! #[derive(Debug, PartialEq, Describe, Serialize, Deserialize)]
//! struct HistoricalSummaries {
//!     epoch: u64,
//!     #[ssz(static_size = "8192,32", dynamic_size = "SLOTS_PER_HISTORICAL_ROOT,32")]
//!     block_roots: Vec<[u8; 32]>,
//! }
//!
//! let minimal = DynSsz::new([("SLOTS_PER_HISTORICAL_ROOT".to_string(), 64)]);
//! let value = HistoricalSummaries {
//!     epoch: 3,
//!     block_roots: vec![[0u8; 32]; 64],
//! };
//!
//! let bytes = minimal.marshal(&value).unwrap();
//! assert_eq!(bytes.len(), 8 + 64 * 32);
//!
//! let mut decoded = HistoricalSummaries {
//!     epoch: 0,
//!     block_roots: Vec::new(),
//! };
//! minimal.unmarshal(&mut decoded, &bytes).unwrap();
//! assert_eq!(decoded, value);
//! ```

#![warn(missing_docs)]
#![deny(unused_must_use)]

pub mod bitfield;
pub mod de;
mod descriptor;
mod error;
mod expr;
mod hint;
pub mod ser;
mod spec;
mod tag;
mod uint;

pub use crate::{
    bitfield::{BitList, BitVector},
    de::Deserialize,
    descriptor::{
        Describe, Describer, FieldDescriptor, SszKind, TypeDescriptor, UnionVariant,
    },
    error::{Error, ErrorKind, Result},
    hint::{DimHint, SizeHint},
    ser::Serialize,
    spec::SpecRegistry,
    tag::FieldTags,
    uint::Uint256,
};
pub use dynssz_derive::{Describe, Deserialize, Serialize};

use crate::descriptor::DescriptorCache;
use std::sync::Arc;

/// The width of an SSZ offset on the wire.
pub const BYTES_PER_LENGTH_OFFSET: usize = 4;

/// A dynamic SSZ codec bound to one spec-value registry.
///
/// Construction fixes the registry; type descriptors are then built lazily
/// on first use and cached for the instance's lifetime. Concurrent
/// marshalling and unmarshalling on one instance is safe: the cache is the
/// only shared mutable state, and reads of published descriptors take no
/// exclusive lock.
#[derive(Debug, Default)]
pub struct DynSsz {
    specs: SpecRegistry,
    cache: DescriptorCache,
}

impl DynSsz {
    /// Builds a codec over the given spec values.
    pub fn new(specs: impl IntoIterator<Item = (String, u64)>) -> Self {
        Self::with_registry(SpecRegistry::new(specs))
    }

    /// Builds a codec over a prepared registry.
    pub fn with_registry(specs: SpecRegistry) -> Self {
        tracing::debug!(spec_values = specs.len(), "dynamic ssz codec created");
        Self {
            specs,
            cache: DescriptorCache::default(),
        }
    }

    /// The registry this codec resolves size expressions against.
    pub fn specs(&self) -> &SpecRegistry {
        &self.specs
    }

    /// The cached descriptor of `T`, built on first use.
    pub fn descriptor<T: Describe + 'static>(&self) -> Result<Arc<TypeDescriptor>> {
        let describer = Describer {
            specs: &self.specs,
            cache: &self.cache,
        };
        describer.subtype::<T>(&[])
    }

    /// Serializes `value` into a fresh buffer.
    pub fn marshal<T: Serialize + 'static>(&self, value: &T) -> Result<Vec<u8>> {
        let desc = self.descriptor::<T>()?;
        let size =
            ser::value_size(value, &desc).map_err(|e| e.at_type(desc.type_name()))?;
        let mut out = Vec::with_capacity(size);
        ser::encode_value(value, &desc, &mut out)
            .map_err(|e| e.at_type(desc.type_name()))?;
        debug_assert_eq!(out.len(), size);
        Ok(out)
    }

    /// Deserializes `data` into the caller-supplied `target` in place.
    ///
    /// The slice must hold exactly one value: trailing bytes fail with
    /// [`ErrorKind::ExtraData`]. After a failed decode the target is in an
    /// unspecified-but-safe state and must not be used.
    pub fn unmarshal<T: Deserialize + 'static>(&self, target: &mut T, data: &[u8]) -> Result<()> {
        let desc = self.descriptor::<T>()?;
        if let Some(expected) = desc.fixed_size() {
            if data.len() > expected {
                return Err(Error::new(ErrorKind::ExtraData(data.len() - expected))
                    .with_offset(expected)
                    .at_type(desc.type_name()));
            }
            if data.len() < expected {
                return Err(Error::new(ErrorKind::SizeMismatch {
                    expected,
                    actual: data.len(),
                })
                .at_type(desc.type_name()));
            }
        }
        de::decode_value(target, &desc, data).map_err(|e| e.at_type(desc.type_name()))
    }

    /// The serialized size of `value` under this codec's spec.
    pub fn size<T: Serialize + 'static>(&self, value: &T) -> Result<usize> {
        let desc = self.descriptor::<T>()?;
        ser::value_size(value, &desc).map_err(|e| e.at_type(desc.type_name()))
    }
}
