//! Structured codec failures with path context.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// The failure classes of the codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A size expression referenced a spec value that was never registered.
    #[error("unknown spec value `{0}`")]
    UnknownSpec(String),
    /// A size annotation could not be parsed or evaluated.
    #[error("size expression error: {0}")]
    Expression(String),
    /// An encoded or declared length disagrees with the value.
    #[error("size mismatch: expected {expected} bytes/elements, got {actual}")]
    SizeMismatch {
        /// The length required by the type descriptor.
        expected: usize,
        /// The length actually present.
        actual: usize,
    },
    /// An offset in a variable container or list is out of range or
    /// non-monotonic.
    #[error("invalid offset {offset} (offset table entry {index})")]
    InvalidOffset {
        /// The offending offset value.
        offset: usize,
        /// The position of the offset within the offset table.
        index: usize,
    },
    /// A decoded list holds more elements than its declared maximum.
    #[error("list overflow: {len} elements exceed the maximum of {max}")]
    ListOverflow {
        /// The decoded element count.
        len: usize,
        /// The declared cap.
        max: usize,
    },
    /// A bitlist payload is missing its delimiter bit or carries nonzero
    /// padding.
    #[error("invalid bitlist: {0}")]
    InvalidBitlist(&'static str),
    /// A union selector byte is outside the declared variant range.
    #[error("invalid union selector {0}")]
    InvalidUnionSelector(u8),
    /// A decoded boolean byte was neither 0 nor 1.
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),
    /// Trailing bytes remained after the value was fully decoded.
    #[error("{0} trailing bytes after value")]
    ExtraData(usize),
    /// The codec has no rule for this type or type/descriptor pairing.
    #[error("unsupported type: {0}")]
    UnsupportedType(&'static str),
    /// A size computation exceeded the representable bound.
    #[error("size overflow")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Type(&'static str),
    Field(&'static str),
    Index(usize),
    Variant(&'static str),
}

/// A codec failure, carrying the kind, the path from the root value to the
/// failing element, and for decode failures the byte offset at which the
/// problem was detected.
///
/// Path segments are pushed innermost-first as the error bubbles up;
/// [`Error::path`] renders them root-first, e.g.
/// `Block.body.attestations[3].data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    path: Vec<PathSegment>,
    offset: Option<usize>,
}

impl Error {
    /// Creates an error with an empty path.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: Vec::new(),
            offset: None,
        }
    }

    /// The failure class.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The byte offset at which a decode failure was detected, relative to
    /// the start of the outermost decoded buffer.
    pub fn byte_offset(&self) -> Option<usize> {
        self.offset
    }

    /// Renders the accumulated path, root-first.
    pub fn path(&self) -> String {
        let mut out = String::new();
        for segment in self.path.iter().rev() {
            match segment {
                PathSegment::Type(name) => out.push_str(name),
                PathSegment::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSegment::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
                PathSegment::Variant(name) => {
                    if !out.is_empty() {
                        out.push_str("::");
                    }
                    out.push_str(name);
                }
            }
        }
        out
    }

    pub(crate) fn at_type(mut self, name: &'static str) -> Self {
        self.path.push(PathSegment::Type(name));
        self
    }

    pub(crate) fn at_field(mut self, name: &'static str) -> Self {
        self.path.push(PathSegment::Field(name));
        self
    }

    pub(crate) fn at_index(mut self, index: usize) -> Self {
        self.path.push(PathSegment::Index(index));
        self
    }

    pub(crate) fn at_variant(mut self, name: &'static str) -> Self {
        self.path.push(PathSegment::Variant(name));
        self
    }

    /// Stamps the local byte offset, keeping an already-recorded one.
    pub(crate) fn with_offset(mut self, offset: usize) -> Self {
        self.offset.get_or_insert(offset);
        self
    }

    /// Shifts a recorded byte offset into the enclosing frame.
    pub(crate) fn offset_by(mut self, base: usize) -> Self {
        if let Some(offset) = self.offset.as_mut() {
            *offset = offset.saturating_add(base);
        }
        self
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let path = self.path();
        if path.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            write!(f, "{path}: {}", self.kind)?;
        }
        if let Some(offset) = self.offset {
            write!(f, " at byte {offset}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_renders_root_first() {
        let err = Error::new(ErrorKind::Overflow)
            .at_index(3)
            .at_field("attestations")
            .at_field("body")
            .at_type("Block");
        assert_eq!(err.path(), "Block.body.attestations[3]");
    }

    #[test]
    fn offsets_shift_into_parent_frames() {
        let err = Error::new(ErrorKind::ExtraData(2))
            .with_offset(1)
            .offset_by(8)
            .offset_by(100);
        assert_eq!(err.byte_offset(), Some(109));
    }

    #[test]
    fn display_includes_path_and_offset() {
        let err = Error::new(ErrorKind::InvalidBool(7))
            .with_offset(4)
            .at_field("slashed")
            .at_type("Validator");
        assert_eq!(
            err.to_string(),
            "Validator.slashed: invalid boolean byte 0x07 at byte 4"
        );
    }
}
