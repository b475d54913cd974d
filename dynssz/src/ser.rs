//! Marshalling: values to SSZ byte streams.
//!
//! Every type boundary goes through [`encode_value`], which consults the
//! fast-path dispatcher before descending with the descriptor. Variable
//! containers and sequences are emitted fixed-part first: fixed fields
//! inline, a 4-byte little-endian offset per variable field, then the
//! variable payloads in order.

#![allow(unsafe_code)]

use crate::{
    bitfield::{bytes_for_bits, BitList, BitVector},
    descriptor::{Describe, FieldDescriptor, SszKind, TypeDescriptor},
    error::{Error, ErrorKind, Result},
    uint::Uint256,
    BYTES_PER_LENGTH_OFFSET,
};

/// Produces the SSZ encoding of the implementing type.
///
/// Implementations for containers and unions come from
/// `#[derive(Serialize)]`. `encode` appends to the output buffer; offsets
/// inside a value are relative to the value's own first byte, so the buffer
/// may already hold enclosing data.
pub trait Serialize: Describe {
    /// Appends the encoding of `self` as described by `desc`.
    fn encode(&self, desc: &TypeDescriptor, out: &mut Vec<u8>) -> Result<()>;

    /// The serialized size of `self` as described by `desc`.
    fn size(&self, desc: &TypeDescriptor) -> Result<usize>;

    /// Static-codec delegate: encodes without descriptor input. Only
    /// meaningful when [`Describe::STATIC_CODEC`] is true.
    fn static_encode(&self, _out: &mut Vec<u8>) -> Result<()> {
        Err(Error::new(ErrorKind::UnsupportedType(
            "no static codec for this type",
        )))
    }

    /// Static-codec delegate: the serialized size without descriptor input.
    fn static_size(&self) -> Result<usize> {
        Err(Error::new(ErrorKind::UnsupportedType(
            "no static codec for this type",
        )))
    }
}

/// Encodes one value, delegating to the static codec when the descriptor
/// carries no dynamic behavior and the type provides one.
pub fn encode_value<T: Serialize>(
    value: &T,
    desc: &TypeDescriptor,
    out: &mut Vec<u8>,
) -> Result<()> {
    if T::STATIC_CODEC && desc.fast_path() && !desc.needs_dynamic() {
        return value.static_encode(out);
    }
    value.encode(desc, out)
}

/// The serialized size of one value. Fixed types answer from the
/// descriptor alone.
pub fn value_size<T: Serialize>(value: &T, desc: &TypeDescriptor) -> Result<usize> {
    if let Some(size) = desc.fixed_size() {
        return Ok(size);
    }
    value.size(desc)
}

fn checked_offset(offset: usize) -> Result<[u8; BYTES_PER_LENGTH_OFFSET]> {
    let raw = u32::try_from(offset).map_err(|_| Error::new(ErrorKind::Overflow))?;
    Ok(raw.to_le_bytes())
}

/// The fixed-part length of a container: fixed fields inline, one offset
/// slot per variable field.
fn container_fixed_len(fields: &[FieldDescriptor]) -> Result<usize> {
    let mut total = 0usize;
    for fd in fields {
        let slot = fd.desc.fixed_size().unwrap_or(BYTES_PER_LENGTH_OFFSET);
        total = total
            .checked_add(slot)
            .ok_or_else(|| Error::new(ErrorKind::Overflow))?;
    }
    Ok(total)
}

/// Streaming encoder for container fields, used by generated `encode`
/// bodies. Fields must be supplied in declaration order; `finish` appends
/// the buffered variable part.
pub struct ContainerEncoder<'a> {
    fields: core::slice::Iter<'a, FieldDescriptor>,
    out: &'a mut Vec<u8>,
    var: Vec<u8>,
    fixed_len: usize,
}

impl<'a> ContainerEncoder<'a> {
    /// Prepares encoding of one container value into `out`.
    pub fn new(desc: &'a TypeDescriptor, out: &'a mut Vec<u8>) -> Result<Self> {
        let fields = desc.container_fields()?;
        let fixed_len = container_fixed_len(fields)?;
        out.reserve(fixed_len);
        Ok(Self {
            fields: fields.iter(),
            out,
            var: Vec::new(),
            fixed_len,
        })
    }

    /// Encodes the next field in declaration order.
    pub fn field<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let fd = self.fields.next().ok_or_else(arity_mismatch)?;
        if fd.desc.is_fixed() {
            encode_value(value, &fd.desc, self.out).map_err(|e| e.at_field(fd.name))
        } else {
            let offset = self
                .fixed_len
                .checked_add(self.var.len())
                .ok_or_else(|| Error::new(ErrorKind::Overflow))?;
            let raw = checked_offset(offset).map_err(|e| e.at_field(fd.name))?;
            self.out.extend_from_slice(&raw);
            encode_value(value, &fd.desc, &mut self.var).map_err(|e| e.at_field(fd.name))
        }
    }

    /// Appends the variable part. Fails when fields were left unsupplied.
    pub fn finish(mut self) -> Result<()> {
        if self.fields.next().is_some() {
            return Err(arity_mismatch());
        }
        self.out.extend_from_slice(&self.var);
        Ok(())
    }
}

/// Size accumulator mirroring [`ContainerEncoder`], used by generated
/// `size` bodies of variable containers.
pub struct ContainerSizer<'a> {
    fields: core::slice::Iter<'a, FieldDescriptor>,
    total: usize,
}

impl<'a> ContainerSizer<'a> {
    /// Prepares size accumulation, starting from the fixed-part length.
    pub fn new(desc: &'a TypeDescriptor) -> Result<Self> {
        let fields = desc.container_fields()?;
        Ok(Self {
            fields: fields.iter(),
            total: container_fixed_len(fields)?,
        })
    }

    /// Accounts for the next field in declaration order.
    pub fn field<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let fd = self.fields.next().ok_or_else(arity_mismatch)?;
        if !fd.desc.is_fixed() {
            let payload = value_size(value, &fd.desc).map_err(|e| e.at_field(fd.name))?;
            self.total = self
                .total
                .checked_add(payload)
                .ok_or_else(|| Error::new(ErrorKind::Overflow))?;
        }
        Ok(())
    }

    /// The accumulated size.
    pub fn finish(mut self) -> Result<usize> {
        if self.fields.next().is_some() {
            return Err(arity_mismatch());
        }
        Ok(self.total)
    }
}

fn arity_mismatch() -> Error {
    Error::new(ErrorKind::UnsupportedType(
        "container value and descriptor disagree on field count",
    ))
}

/// Emits the selector of a declared Null variant. Used by generated union
/// `encode` bodies.
pub fn encode_union_null(desc: &TypeDescriptor, out: &mut Vec<u8>) -> Result<()> {
    let variants = desc.union_variants()?;
    match variants.first() {
        Some(variant) if variant.payload.is_none() => {
            out.push(0);
            Ok(())
        }
        _ => Err(Error::new(ErrorKind::UnsupportedType(
            "union does not declare a null variant 0",
        ))),
    }
}

/// Emits a selector byte followed by the variant payload. Used by
/// generated union `encode` bodies.
pub fn encode_union_variant<T: Serialize>(
    value: &T,
    desc: &TypeDescriptor,
    selector: u8,
    out: &mut Vec<u8>,
) -> Result<()> {
    let (name, payload) = union_payload(desc, selector)?;
    out.push(selector);
    encode_value(value, payload, out).map_err(|e| e.at_variant(name))
}

/// The serialized size of a Null union value.
pub fn union_null_size(desc: &TypeDescriptor) -> Result<usize> {
    desc.union_variants()?;
    Ok(1)
}

/// The serialized size of a union value with a payload.
pub fn union_variant_size<T: Serialize>(
    value: &T,
    desc: &TypeDescriptor,
    selector: u8,
) -> Result<usize> {
    let (name, payload) = union_payload(desc, selector)?;
    let payload_size = value_size(value, payload).map_err(|e| e.at_variant(name))?;
    payload_size
        .checked_add(1)
        .ok_or_else(|| Error::new(ErrorKind::Overflow))
}

fn union_payload(
    desc: &TypeDescriptor,
    selector: u8,
) -> Result<(&'static str, &TypeDescriptor)> {
    let variants = desc.union_variants()?;
    let variant = variants
        .get(usize::from(selector))
        .ok_or_else(|| Error::new(ErrorKind::InvalidUnionSelector(selector)))?;
    let payload = variant.payload.as_deref().ok_or_else(|| {
        Error::new(ErrorKind::UnsupportedType(
            "null union variant carries no payload",
        ))
    })?;
    Ok((variant.name, payload))
}

/// Concatenates fixed-element encodings, or emits an offset table plus
/// payloads for variable elements.
fn encode_elements<T: Serialize>(
    items: &[T],
    elem: &TypeDescriptor,
    out: &mut Vec<u8>,
) -> Result<()> {
    if elem.is_fixed() {
        for (i, item) in items.iter().enumerate() {
            encode_value(item, elem, out).map_err(|e| e.at_index(i))?;
        }
        return Ok(());
    }
    let fixed_len = items
        .len()
        .checked_mul(BYTES_PER_LENGTH_OFFSET)
        .ok_or_else(|| Error::new(ErrorKind::Overflow))?;
    let mut var = Vec::new();
    for (i, item) in items.iter().enumerate() {
        let offset = fixed_len
            .checked_add(var.len())
            .ok_or_else(|| Error::new(ErrorKind::Overflow))?;
        let raw = checked_offset(offset).map_err(|e| e.at_index(i))?;
        out.extend_from_slice(&raw);
        encode_value(item, elem, &mut var).map_err(|e| e.at_index(i))?;
    }
    out.extend_from_slice(&var);
    Ok(())
}

fn elements_size<T: Serialize>(items: &[T], elem: &TypeDescriptor) -> Result<usize> {
    let mut total = if elem.is_fixed() {
        0
    } else {
        items
            .len()
            .checked_mul(BYTES_PER_LENGTH_OFFSET)
            .ok_or_else(|| Error::new(ErrorKind::Overflow))?
    };
    for (i, item) in items.iter().enumerate() {
        let item_size = value_size(item, elem).map_err(|e| e.at_index(i))?;
        total = total
            .checked_add(item_size)
            .ok_or_else(|| Error::new(ErrorKind::Overflow))?;
    }
    Ok(total)
}

/// Copies a byte run verbatim.
fn extend_bytes<T: Serialize>(items: &Vec<T>, out: &mut Vec<u8>) -> Result<()> {
    if !T::IS_BYTE {
        return Err(Error::new(ErrorKind::UnsupportedType(
            "byte-run descriptor over non-byte elements",
        )));
    }
    // SAFETY: `IS_BYTE` is only set for `u8`.
    let bytes = unsafe { core::mem::transmute::<&Vec<T>, &Vec<u8>>(items) };
    out.extend_from_slice(bytes.as_slice());
    Ok(())
}

fn vector_len_check(actual: usize, len: u64) -> Result<()> {
    if actual as u64 != len {
        return Err(Error::new(ErrorKind::SizeMismatch {
            expected: len as usize,
            actual,
        }));
    }
    Ok(())
}

fn list_cap_check(actual: usize, max: Option<u64>) -> Result<()> {
    if let Some(max) = max {
        if actual as u64 > max {
            return Err(Error::new(ErrorKind::SizeMismatch {
                expected: max as usize,
                actual,
            }));
        }
    }
    Ok(())
}

fn unexpected_kind() -> Error {
    Error::new(ErrorKind::UnsupportedType(
        "descriptor kind does not match the value's type",
    ))
}

macro_rules! impl_serialize_for_primitives {
    ($($t:ident, $size:expr;)*) => {
        $(
            impl Serialize for $t {
                #[inline(always)]
                fn encode(&self, _desc: &TypeDescriptor, out: &mut Vec<u8>) -> Result<()> {
                    out.extend_from_slice(&self.to_le_bytes());
                    Ok(())
                }

                fn size(&self, _desc: &TypeDescriptor) -> Result<usize> {
                    Ok($size)
                }

                #[inline(always)]
                fn static_encode(&self, out: &mut Vec<u8>) -> Result<()> {
                    out.extend_from_slice(&self.to_le_bytes());
                    Ok(())
                }

                fn static_size(&self) -> Result<usize> {
                    Ok($size)
                }
            }
        )*
    };
}

impl_serialize_for_primitives! {
    u8, 1;
    u16, 2;
    u32, 4;
    u64, 8;
    u128, 16;
}

impl Serialize for bool {
    #[inline(always)]
    fn encode(&self, _desc: &TypeDescriptor, out: &mut Vec<u8>) -> Result<()> {
        out.push(u8::from(*self));
        Ok(())
    }

    fn size(&self, _desc: &TypeDescriptor) -> Result<usize> {
        Ok(1)
    }

    #[inline(always)]
    fn static_encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(u8::from(*self));
        Ok(())
    }

    fn static_size(&self) -> Result<usize> {
        Ok(1)
    }
}

impl Serialize for Uint256 {
    #[inline(always)]
    fn encode(&self, _desc: &TypeDescriptor, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(self.as_le_slice());
        Ok(())
    }

    fn size(&self, _desc: &TypeDescriptor) -> Result<usize> {
        Ok(32)
    }

    fn static_encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.extend_from_slice(self.as_le_slice());
        Ok(())
    }

    fn static_size(&self) -> Result<usize> {
        Ok(32)
    }
}

impl<T: Serialize + 'static, const N: usize> Serialize for [T; N] {
    fn encode(&self, desc: &TypeDescriptor, out: &mut Vec<u8>) -> Result<()> {
        match desc.kind() {
            SszKind::ByteVector { len } => {
                vector_len_check(N, *len)?;
                if !T::IS_BYTE {
                    return Err(unexpected_kind());
                }
                // SAFETY: `IS_BYTE` is only set for `u8`.
                let bytes = unsafe { core::mem::transmute::<&[T; N], &[u8; N]>(self) };
                out.extend_from_slice(bytes);
                Ok(())
            }
            SszKind::Vector { elem, len } => {
                vector_len_check(N, *len)?;
                encode_elements(self.as_slice(), elem, out)
            }
            _ => Err(unexpected_kind()),
        }
    }

    fn size(&self, desc: &TypeDescriptor) -> Result<usize> {
        match desc.kind() {
            SszKind::ByteVector { .. } => Ok(N),
            SszKind::Vector { elem, .. } => elements_size(self.as_slice(), elem),
            _ => Err(unexpected_kind()),
        }
    }

    fn static_encode(&self, out: &mut Vec<u8>) -> Result<()> {
        if T::IS_BYTE {
            // SAFETY: `IS_BYTE` is only set for `u8`.
            let bytes = unsafe { core::mem::transmute::<&[T; N], &[u8; N]>(self) };
            out.extend_from_slice(bytes);
            return Ok(());
        }
        for item in self.iter() {
            item.static_encode(out)?;
        }
        Ok(())
    }

    fn static_size(&self) -> Result<usize> {
        let mut total = 0usize;
        for item in self.iter() {
            total = total
                .checked_add(item.static_size()?)
                .ok_or_else(|| Error::new(ErrorKind::Overflow))?;
        }
        Ok(total)
    }
}

impl<T: Serialize + 'static> Serialize for Vec<T> {
    fn encode(&self, desc: &TypeDescriptor, out: &mut Vec<u8>) -> Result<()> {
        match desc.kind() {
            SszKind::ByteVector { len } => {
                vector_len_check(self.len(), *len)?;
                extend_bytes(self, out)
            }
            SszKind::ByteList { max } => {
                list_cap_check(self.len(), *max)?;
                extend_bytes(self, out)
            }
            SszKind::Vector { elem, len } => {
                vector_len_check(self.len(), *len)?;
                encode_elements(self.as_slice(), elem, out)
            }
            SszKind::List { elem, max } => {
                list_cap_check(self.len(), *max)?;
                encode_elements(self.as_slice(), elem, out)
            }
            _ => Err(unexpected_kind()),
        }
    }

    fn size(&self, desc: &TypeDescriptor) -> Result<usize> {
        match desc.kind() {
            SszKind::ByteVector { .. } | SszKind::ByteList { .. } => Ok(self.len()),
            SszKind::Vector { elem, .. } | SszKind::List { elem, .. } => {
                elements_size(self.as_slice(), elem)
            }
            _ => Err(unexpected_kind()),
        }
    }
}

impl Serialize for BitVector {
    fn encode(&self, desc: &TypeDescriptor, out: &mut Vec<u8>) -> Result<()> {
        match desc.kind() {
            SszKind::BitVector { bits } => {
                if self.len() as u64 != *bits {
                    return Err(Error::new(ErrorKind::SizeMismatch {
                        expected: *bits as usize,
                        actual: self.len(),
                    }));
                }
                out.extend_from_slice(self.as_raw_slice());
                Ok(())
            }
            _ => Err(unexpected_kind()),
        }
    }

    fn size(&self, _desc: &TypeDescriptor) -> Result<usize> {
        Ok(bytes_for_bits(self.len()))
    }
}

impl Serialize for BitList {
    fn encode(&self, desc: &TypeDescriptor, out: &mut Vec<u8>) -> Result<()> {
        match desc.kind() {
            SszKind::BitList { max_bits } => {
                list_cap_check(self.len(), *max_bits)?;
                self.write_delimited(out);
                Ok(())
            }
            _ => Err(unexpected_kind()),
        }
    }

    fn size(&self, _desc: &TypeDescriptor) -> Result<usize> {
        Ok(bytes_for_bits(self.len() + 1))
    }
}
