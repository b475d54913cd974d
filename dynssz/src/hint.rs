//! Resolved per-dimension size information.

/// A resolved size for one dimension of a field.
///
/// `dynamic` is set when the resolved value deviates from the co-located
/// static default, which forces the non-fast-path codec for the dimension.
/// `spec_derived` records that the value came from a dynamic size
/// annotation rather than a static one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SizeHint {
    /// The resolved length (vectors/bitvectors) or cap (lists/bitlists).
    pub value: u64,
    /// True when the value differs from the static default.
    pub dynamic: bool,
    /// True when the value was resolved from a dynamic annotation.
    pub spec_derived: bool,
}

impl SizeHint {
    /// A hint taken verbatim from a static annotation.
    pub fn fixed(value: u64) -> Self {
        Self {
            value,
            dynamic: false,
            spec_derived: false,
        }
    }
}

/// Size information for one nested dimension of a field, outermost first.
///
/// A present `size` declares the dimension as a vector of that length; an
/// absent one leaves it variable (a list), optionally capped by `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DimHint {
    /// Declared length of a vector/bitvector dimension.
    pub size: Option<SizeHint>,
    /// Declared cap of a list/bitlist dimension.
    pub max: Option<SizeHint>,
}

impl DimHint {
    /// True when any hint of this dimension was resolved to a value other
    /// than its static default.
    pub fn is_dynamic(&self) -> bool {
        self.size.is_some_and(|h| h.dynamic) || self.max.is_some_and(|h| h.dynamic)
    }
}

/// Splits the outermost dimension off a hint list, defaulting to an
/// unhinted dimension when the list is exhausted.
pub(crate) fn split_dims(dims: &[DimHint]) -> (DimHint, &[DimHint]) {
    match dims.split_first() {
        Some((head, rest)) => (*head, rest),
        None => (DimHint::default(), &[]),
    }
}
