//! Unmarshalling: SSZ byte streams into caller-supplied values.
//!
//! Every type boundary goes through [`decode_value`], which consults the
//! fast-path dispatcher before descending with the descriptor. Each value
//! receives exactly its own slice; offset tables are validated before any
//! payload is visited, and growable containers are resized exactly once to
//! the decoded length.

#![allow(unsafe_code)]

use crate::{
    bitfield::{BitList, BitVector},
    descriptor::{Describe, FieldDescriptor, SszKind, TypeDescriptor},
    error::{Error, ErrorKind, Result},
    uint::Uint256,
    BYTES_PER_LENGTH_OFFSET,
};

/// Populates the implementing type from its SSZ encoding.
///
/// Implementations for containers and unions come from
/// `#[derive(Deserialize)]`. Decoding is in place: the caller supplies the
/// target value, and a failed decode leaves it in an unspecified-but-safe
/// state.
pub trait Deserialize: Describe {
    /// Decodes `data`, which holds exactly this value's bytes, into `self`.
    fn decode(&mut self, desc: &TypeDescriptor, data: &[u8]) -> Result<()>;

    /// A blank value for freshly grown elements. Unlike `Default`, this is
    /// implemented for byte arrays of every length.
    fn zeroed() -> Self
    where
        Self: Sized;

    /// Static-codec delegate: consumes this value's bytes from the front
    /// of `data`. Only meaningful when [`Describe::STATIC_CODEC`] is true.
    fn static_decode(&mut self, _data: &mut &[u8]) -> Result<()> {
        Err(Error::new(ErrorKind::UnsupportedType(
            "no static codec for this type",
        )))
    }
}

/// Decodes one value, delegating to the static codec when the descriptor
/// carries no dynamic behavior and the type provides one.
pub fn decode_value<T: Deserialize>(
    target: &mut T,
    desc: &TypeDescriptor,
    data: &[u8],
) -> Result<()> {
    if T::STATIC_CODEC && desc.fast_path() && !desc.needs_dynamic() {
        let mut cursor = data;
        target.static_decode(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(Error::new(ErrorKind::ExtraData(cursor.len()))
                .with_offset(data.len() - cursor.len()));
        }
        return Ok(());
    }
    target.decode(desc, data)
}

/// Splits `n` bytes off the front of the cursor.
pub(crate) fn take<'a>(data: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if data.len() < n {
        return Err(Error::new(ErrorKind::SizeMismatch {
            expected: n,
            actual: data.len(),
        })
        .with_offset(0));
    }
    let (head, rest) = data.split_at(n);
    *data = rest;
    Ok(head)
}

fn read_offset(data: &[u8], at: usize) -> Result<usize> {
    let mut raw = [0u8; BYTES_PER_LENGTH_OFFSET];
    let end = at
        .checked_add(BYTES_PER_LENGTH_OFFSET)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| {
            Error::new(ErrorKind::SizeMismatch {
                expected: at + BYTES_PER_LENGTH_OFFSET,
                actual: data.len(),
            })
            .with_offset(at)
        })?;
    raw.copy_from_slice(&data[at..end]);
    Ok(u32::from_le_bytes(raw) as usize)
}

/// Validates an offset table per the SSZ rules: the first offset equals
/// the fixed-part length, offsets never decrease, and none passes the end
/// of the data. `positions` maps each table entry to its byte position for
/// error reporting.
fn validate_offsets(
    offsets: &[usize],
    positions: impl Fn(usize) -> usize,
    fixed_len: usize,
    total_len: usize,
) -> Result<()> {
    let mut prev = fixed_len;
    for (index, &offset) in offsets.iter().enumerate() {
        let bad = (index == 0 && offset != fixed_len) || offset < prev || offset > total_len;
        if bad {
            return Err(Error::new(ErrorKind::InvalidOffset { offset, index })
                .with_offset(positions(index)));
        }
        prev = offset;
    }
    Ok(())
}

/// Streaming decoder for container fields, used by generated `decode`
/// bodies. The offset table is read and validated up front; each `field`
/// call then hands the next field exactly its slice.
pub struct ContainerDecoder<'a> {
    data: &'a [u8],
    fields: core::slice::Iter<'a, FieldDescriptor>,
    ranges: std::vec::IntoIter<core::ops::Range<usize>>,
}

impl<'a> ContainerDecoder<'a> {
    /// Splits `data` into per-field slices, validating lengths and the
    /// offset table.
    pub fn new(desc: &'a TypeDescriptor, data: &'a [u8]) -> Result<Self> {
        let fields = desc.container_fields()?;

        let mut fixed_len = 0usize;
        let mut variable_fields = 0usize;
        for fd in fields {
            let slot = fd.desc.fixed_size().unwrap_or(BYTES_PER_LENGTH_OFFSET);
            fixed_len = fixed_len
                .checked_add(slot)
                .ok_or_else(|| Error::new(ErrorKind::Overflow))?;
            if !fd.desc.is_fixed() {
                variable_fields += 1;
            }
        }

        if data.len() < fixed_len {
            return Err(Error::new(ErrorKind::SizeMismatch {
                expected: fixed_len,
                actual: data.len(),
            })
            .with_offset(0));
        }
        if variable_fields == 0 && data.len() > fixed_len {
            return Err(Error::new(ErrorKind::ExtraData(data.len() - fixed_len))
                .with_offset(fixed_len));
        }

        let mut offsets: Vec<(usize, usize, &'static str)> =
            Vec::with_capacity(variable_fields);
        let mut pos = 0usize;
        for fd in fields {
            match fd.desc.fixed_size() {
                Some(size) => pos += size,
                None => {
                    let offset =
                        read_offset(data, pos).map_err(|e| e.at_field(fd.name))?;
                    offsets.push((offset, pos, fd.name));
                    pos += BYTES_PER_LENGTH_OFFSET;
                }
            }
        }
        let mut prev = fixed_len;
        for (index, &(offset, at, name)) in offsets.iter().enumerate() {
            let bad =
                (index == 0 && offset != fixed_len) || offset < prev || offset > data.len();
            if bad {
                return Err(Error::new(ErrorKind::InvalidOffset { offset, index })
                    .with_offset(at)
                    .at_field(name));
            }
            prev = offset;
        }

        let mut ranges = Vec::with_capacity(fields.len());
        let mut pos = 0usize;
        let mut variable_index = 0usize;
        for fd in fields {
            match fd.desc.fixed_size() {
                Some(size) => {
                    ranges.push(pos..pos + size);
                    pos += size;
                }
                None => {
                    let start = offsets[variable_index].0;
                    let end = offsets
                        .get(variable_index + 1)
                        .map(|entry| entry.0)
                        .unwrap_or(data.len());
                    ranges.push(start..end);
                    variable_index += 1;
                    pos += BYTES_PER_LENGTH_OFFSET;
                }
            }
        }

        Ok(Self {
            data,
            fields: fields.iter(),
            ranges: ranges.into_iter(),
        })
    }

    /// Decodes the next field in declaration order.
    pub fn field<T: Deserialize>(&mut self, target: &mut T) -> Result<()> {
        let fd = self.fields.next().ok_or_else(arity_mismatch)?;
        let range = self.ranges.next().ok_or_else(arity_mismatch)?;
        let start = range.start;
        decode_value(target, &fd.desc, &self.data[range])
            .map_err(|e| e.at_field(fd.name).offset_by(start))
    }

    /// Fails when fields were left unsupplied.
    pub fn finish(mut self) -> Result<()> {
        if self.fields.next().is_some() {
            return Err(arity_mismatch());
        }
        Ok(())
    }
}

fn arity_mismatch() -> Error {
    Error::new(ErrorKind::UnsupportedType(
        "container value and descriptor disagree on field count",
    ))
}

/// Splits a union payload into selector and payload bytes, validating the
/// selector against the declared variants. Used by generated `decode`
/// bodies.
pub fn split_union<'a>(desc: &TypeDescriptor, data: &'a [u8]) -> Result<(u8, &'a [u8])> {
    let variants = desc.union_variants()?;
    let Some((&selector, payload)) = data.split_first() else {
        return Err(Error::new(ErrorKind::SizeMismatch {
            expected: 1,
            actual: 0,
        })
        .with_offset(0));
    };
    if selector > 127 || usize::from(selector) >= variants.len() {
        return Err(Error::new(ErrorKind::InvalidUnionSelector(selector)).with_offset(0));
    }
    Ok((selector, payload))
}

/// A Null union selector must not be followed by payload bytes.
pub fn check_null_payload(payload: &[u8]) -> Result<()> {
    if !payload.is_empty() {
        return Err(Error::new(ErrorKind::ExtraData(payload.len())).with_offset(1));
    }
    Ok(())
}

/// Decodes a union variant's payload. Used by generated `decode` bodies.
pub fn decode_union_variant<T: Deserialize>(
    target: &mut T,
    desc: &TypeDescriptor,
    selector: u8,
    payload: &[u8],
) -> Result<()> {
    let variants = desc.union_variants()?;
    let variant = variants
        .get(usize::from(selector))
        .ok_or_else(|| Error::new(ErrorKind::InvalidUnionSelector(selector)))?;
    let payload_desc = variant.payload.as_deref().ok_or_else(|| {
        Error::new(ErrorKind::UnsupportedType(
            "null union variant carries no payload",
        ))
    })?;
    decode_value(target, payload_desc, payload)
        .map_err(|e| e.at_variant(variant.name).offset_by(1))
}

/// Replaces a byte run's contents verbatim.
fn fill_bytes<T: Deserialize>(target: &mut Vec<T>, data: &[u8]) -> Result<()> {
    if !T::IS_BYTE {
        return Err(unexpected_kind());
    }
    // SAFETY: `IS_BYTE` is only set for `u8`.
    let bytes = unsafe { core::mem::transmute::<&mut Vec<T>, &mut Vec<u8>>(target) };
    bytes.clear();
    bytes.extend_from_slice(data);
    Ok(())
}

/// Decodes a run of fixed-size elements into a cleared vector.
fn fill_fixed_elements<T: Deserialize>(
    target: &mut Vec<T>,
    elem: &TypeDescriptor,
    data: &[u8],
    elem_size: usize,
    count: usize,
) -> Result<()> {
    target.clear();
    target.reserve_exact(count);
    for i in 0..count {
        let start = i * elem_size;
        let mut value = T::zeroed();
        decode_value(&mut value, elem, &data[start..start + elem_size])
            .map_err(|e| e.at_index(i).offset_by(start))?;
        target.push(value);
    }
    Ok(())
}

/// Reads the offset table of a variable-element sequence. The element
/// count falls out of the first offset.
fn sequence_offsets(data: &[u8]) -> Result<Vec<usize>> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let first = read_offset(data, 0)?;
    if first == 0 || first % BYTES_PER_LENGTH_OFFSET != 0 || first > data.len() {
        return Err(Error::new(ErrorKind::InvalidOffset {
            offset: first,
            index: 0,
        })
        .with_offset(0));
    }
    let count = first / BYTES_PER_LENGTH_OFFSET;
    let mut offsets = Vec::with_capacity(count);
    offsets.push(first);
    for index in 1..count {
        offsets.push(read_offset(data, index * BYTES_PER_LENGTH_OFFSET)?);
    }
    validate_offsets(
        &offsets,
        |index| index * BYTES_PER_LENGTH_OFFSET,
        first,
        data.len(),
    )?;
    Ok(offsets)
}

/// Decodes variable-size elements into a cleared vector.
fn fill_variable_elements<T: Deserialize>(
    target: &mut Vec<T>,
    elem: &TypeDescriptor,
    data: &[u8],
    offsets: &[usize],
) -> Result<()> {
    target.clear();
    target.reserve_exact(offsets.len());
    for (i, &start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(data.len());
        let mut value = T::zeroed();
        decode_value(&mut value, elem, &data[start..end])
            .map_err(|e| e.at_index(i).offset_by(start))?;
        target.push(value);
    }
    Ok(())
}

/// Decodes variable-size elements into a mutable slice of exactly the
/// expected arity.
fn decode_variable_slice<T: Deserialize>(
    targets: &mut [T],
    elem: &TypeDescriptor,
    data: &[u8],
) -> Result<()> {
    let offsets = sequence_offsets(data)?;
    if offsets.len() != targets.len() {
        return Err(Error::new(ErrorKind::SizeMismatch {
            expected: targets.len(),
            actual: offsets.len(),
        })
        .with_offset(0));
    }
    for (i, (target, &start)) in targets.iter_mut().zip(offsets.iter()).enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(data.len());
        decode_value(target, elem, &data[start..end])
            .map_err(|e| e.at_index(i).offset_by(start))?;
    }
    Ok(())
}

fn exact_len(data: &[u8], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(Error::new(ErrorKind::SizeMismatch {
            expected,
            actual: data.len(),
        })
        .with_offset(0));
    }
    Ok(())
}

fn list_cap_check(len: usize, max: Option<u64>) -> Result<()> {
    if let Some(max) = max {
        if len as u64 > max {
            return Err(Error::new(ErrorKind::ListOverflow {
                len,
                max: max as usize,
            })
            .with_offset(0));
        }
    }
    Ok(())
}

fn nonzero_elem_size(elem: &TypeDescriptor) -> Result<usize> {
    match elem.fixed_size() {
        Some(0) => Err(Error::new(ErrorKind::UnsupportedType(
            "zero-sized sequence element",
        ))),
        Some(size) => Ok(size),
        None => Err(unexpected_kind()),
    }
}

fn unexpected_kind() -> Error {
    Error::new(ErrorKind::UnsupportedType(
        "descriptor kind does not match the value's type",
    ))
}

macro_rules! impl_deserialize_for_primitives {
    ($($t:ident, $size:expr;)*) => {
        $(
            impl Deserialize for $t {
                fn decode(&mut self, _desc: &TypeDescriptor, data: &[u8]) -> Result<()> {
                    exact_len(data, $size)?;
                    let mut raw = [0u8; $size];
                    raw.copy_from_slice(data);
                    *self = <$t>::from_le_bytes(raw);
                    Ok(())
                }

                fn zeroed() -> Self {
                    0
                }

                fn static_decode(&mut self, data: &mut &[u8]) -> Result<()> {
                    let mut raw = [0u8; $size];
                    raw.copy_from_slice(take(data, $size)?);
                    *self = <$t>::from_le_bytes(raw);
                    Ok(())
                }
            }
        )*
    };
}

impl_deserialize_for_primitives! {
    u8, 1;
    u16, 2;
    u32, 4;
    u64, 8;
    u128, 16;
}

fn decode_bool(byte: u8) -> Result<bool> {
    match byte {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::new(ErrorKind::InvalidBool(other)).with_offset(0)),
    }
}

impl Deserialize for bool {
    fn decode(&mut self, _desc: &TypeDescriptor, data: &[u8]) -> Result<()> {
        exact_len(data, 1)?;
        *self = decode_bool(data[0])?;
        Ok(())
    }

    fn zeroed() -> Self {
        false
    }

    fn static_decode(&mut self, data: &mut &[u8]) -> Result<()> {
        *self = decode_bool(take(data, 1)?[0])?;
        Ok(())
    }
}

impl Deserialize for Uint256 {
    fn decode(&mut self, _desc: &TypeDescriptor, data: &[u8]) -> Result<()> {
        exact_len(data, 32)?;
        let mut raw = [0u8; 32];
        raw.copy_from_slice(data);
        *self = Self::from_le_bytes(raw);
        Ok(())
    }

    fn zeroed() -> Self {
        Self::ZERO
    }

    fn static_decode(&mut self, data: &mut &[u8]) -> Result<()> {
        let mut raw = [0u8; 32];
        raw.copy_from_slice(take(data, 32)?);
        *self = Self::from_le_bytes(raw);
        Ok(())
    }
}

impl<T: Deserialize + 'static, const N: usize> Deserialize for [T; N] {
    fn decode(&mut self, desc: &TypeDescriptor, data: &[u8]) -> Result<()> {
        match desc.kind() {
            SszKind::ByteVector { .. } => {
                exact_len(data, N)?;
                if !T::IS_BYTE {
                    return Err(unexpected_kind());
                }
                // SAFETY: `IS_BYTE` is only set for `u8`.
                let bytes = unsafe { core::mem::transmute::<&mut [T; N], &mut [u8; N]>(self) };
                bytes.copy_from_slice(data);
                Ok(())
            }
            SszKind::Vector { elem, .. } => {
                if elem.is_fixed() {
                    let elem_size = nonzero_elem_size(elem)?;
                    exact_len(
                        data,
                        N.checked_mul(elem_size)
                            .ok_or_else(|| Error::new(ErrorKind::Overflow))?,
                    )?;
                    for (i, target) in self.iter_mut().enumerate() {
                        let start = i * elem_size;
                        decode_value(target, elem, &data[start..start + elem_size])
                            .map_err(|e| e.at_index(i).offset_by(start))?;
                    }
                    Ok(())
                } else {
                    decode_variable_slice(self.as_mut_slice(), elem, data)
                }
            }
            _ => Err(unexpected_kind()),
        }
    }

    fn zeroed() -> Self {
        core::array::from_fn(|_| T::zeroed())
    }

    fn static_decode(&mut self, data: &mut &[u8]) -> Result<()> {
        if T::IS_BYTE {
            let chunk = take(data, N)?;
            // SAFETY: `IS_BYTE` is only set for `u8`.
            let bytes = unsafe { core::mem::transmute::<&mut [T; N], &mut [u8; N]>(self) };
            bytes.copy_from_slice(chunk);
            return Ok(());
        }
        for target in self.iter_mut() {
            target.static_decode(data)?;
        }
        Ok(())
    }
}

impl<T: Deserialize + 'static> Deserialize for Vec<T> {
    fn decode(&mut self, desc: &TypeDescriptor, data: &[u8]) -> Result<()> {
        match desc.kind() {
            SszKind::ByteVector { len } => {
                exact_len(data, *len as usize)?;
                fill_bytes(self, data)
            }
            SszKind::ByteList { max } => {
                list_cap_check(data.len(), *max)?;
                fill_bytes(self, data)
            }
            SszKind::Vector { elem, len } => {
                let count = usize::try_from(*len).map_err(|_| Error::new(ErrorKind::Overflow))?;
                if elem.is_fixed() {
                    let elem_size = nonzero_elem_size(elem)?;
                    exact_len(
                        data,
                        count
                            .checked_mul(elem_size)
                            .ok_or_else(|| Error::new(ErrorKind::Overflow))?,
                    )?;
                    fill_fixed_elements(self, elem, data, elem_size, count)
                } else {
                    let offsets = sequence_offsets(data)?;
                    if offsets.len() != count {
                        return Err(Error::new(ErrorKind::SizeMismatch {
                            expected: count,
                            actual: offsets.len(),
                        })
                        .with_offset(0));
                    }
                    fill_variable_elements(self, elem, data, &offsets)
                }
            }
            SszKind::List { elem, max } => {
                if elem.is_fixed() {
                    let elem_size = nonzero_elem_size(elem)?;
                    if data.len() % elem_size != 0 {
                        return Err(Error::new(ErrorKind::SizeMismatch {
                            expected: data.len() / elem_size * elem_size,
                            actual: data.len(),
                        })
                        .with_offset(0));
                    }
                    let count = data.len() / elem_size;
                    list_cap_check(count, *max)?;
                    fill_fixed_elements(self, elem, data, elem_size, count)
                } else {
                    let offsets = sequence_offsets(data)?;
                    list_cap_check(offsets.len(), *max)?;
                    fill_variable_elements(self, elem, data, &offsets)
                }
            }
            _ => Err(unexpected_kind()),
        }
    }

    fn zeroed() -> Self {
        Vec::new()
    }
}

impl Deserialize for BitVector {
    fn decode(&mut self, desc: &TypeDescriptor, data: &[u8]) -> Result<()> {
        match desc.kind() {
            SszKind::BitVector { bits } => {
                let bits = usize::try_from(*bits).map_err(|_| Error::new(ErrorKind::Overflow))?;
                *self = Self::from_wire(data, bits)?;
                Ok(())
            }
            _ => Err(unexpected_kind()),
        }
    }

    fn zeroed() -> Self {
        Self::default()
    }
}

impl Deserialize for BitList {
    fn decode(&mut self, desc: &TypeDescriptor, data: &[u8]) -> Result<()> {
        match desc.kind() {
            SszKind::BitList { max_bits } => {
                let decoded = Self::from_wire(data)?;
                list_cap_check(decoded.len(), *max_bits)?;
                *self = decoded;
                Ok(())
            }
            _ => Err(unexpected_kind()),
        }
    }

    fn zeroed() -> Self {
        Self::default()
    }
}
