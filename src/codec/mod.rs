//! Wire format shared with the bulletin-board substrate.
//!
//! Group elements and scalars are untagged fixed-width canonical encodings
//! (48 and 32 bytes for BLS12-381). Composite values carry a self-describing
//! tag (`u16` length + ASCII name) before their fields. Sequences are a `u32`
//! big-endian length followed by the items.
//!
//! Decoders never panic: on failure they hand back the typed error, the field
//! path that failed and the unconsumed bytes, so callers can chain decoders
//! over one buffer.

mod error;
mod types;

pub use error::*;

use ark_ec::CurveGroup;
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::Zero;

pub type DecodeResult<'a, T> = Result<(T, &'a [u8]), DecodeFailure<'a>>;

pub trait WireEncode {
    fn encode_into(&self, out: &mut Vec<u8>);

    fn to_wire_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

pub trait WireDecode: Sized {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self>;

    /// Decode a value that must span the whole buffer.
    fn decode_exact(input: &[u8]) -> Result<Self, DecodeFailure<'_>> {
        let (value, rest) = Self::decode(input)?;
        if !rest.is_empty() {
            return Err(DecodeFailure::new(
                DecodeError::InvalidLength(rest.len() as u64),
                rest,
            ));
        }
        Ok(value)
    }
}

fn take(input: &[u8], needed: usize) -> DecodeResult<'_, &[u8]> {
    if input.len() < needed {
        return Err(DecodeFailure::new(
            DecodeError::InsufficientBytes {
                needed,
                available: input.len(),
            },
            input,
        ));
    }
    let (head, rest) = input.split_at(needed);
    Ok((head, rest))
}

pub fn encode_tag(tag: &'static str, out: &mut Vec<u8>) {
    out.extend_from_slice(&(tag.len() as u16).to_be_bytes());
    out.extend_from_slice(tag.as_bytes());
}

pub fn decode_tag<'a>(input: &'a [u8], expected: &'static str) -> DecodeResult<'a, ()> {
    let (len_bytes, rest) = take(input, 2)?;
    let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    let (tag, rest) = take(rest, len)?;
    if tag != expected.as_bytes() {
        return Err(DecodeFailure::new(
            DecodeError::InvalidTag { expected },
            input,
        ));
    }
    Ok(((), rest))
}

pub fn encode_element<C: CurveGroup>(element: &C, out: &mut Vec<u8>) {
    // Writing into a Vec cannot fail.
    let _ = element.serialize_compressed(out);
}

pub fn decode_element<C: CurveGroup>(input: &[u8]) -> DecodeResult<'_, C> {
    let width = C::zero().compressed_size();
    let (bytes, rest) = take(input, width)?;
    match C::deserialize_compressed(bytes) {
        Ok(element) => Ok((element, rest)),
        Err(_) => Err(DecodeFailure::new(DecodeError::InvalidElement, input)),
    }
}

pub fn encode_scalar<F: PrimeField>(scalar: &F, out: &mut Vec<u8>) {
    let _ = scalar.serialize_compressed(out);
}

pub fn decode_scalar<F: PrimeField>(input: &[u8]) -> DecodeResult<'_, F> {
    let width = F::zero().compressed_size();
    let (bytes, rest) = take(input, width)?;
    match F::deserialize_compressed(bytes) {
        Ok(scalar) => Ok((scalar, rest)),
        Err(_) => Err(DecodeFailure::new(DecodeError::InvalidScalar, input)),
    }
}

pub fn encode_seq<T, F>(items: &[T], out: &mut Vec<u8>, mut encode_item: F)
where
    F: FnMut(&T, &mut Vec<u8>),
{
    out.extend_from_slice(&(items.len() as u32).to_be_bytes());
    for item in items {
        encode_item(item, out);
    }
}

pub fn decode_seq<'a, T, F>(input: &'a [u8], mut decode_item: F) -> DecodeResult<'a, Vec<T>>
where
    F: FnMut(&'a [u8]) -> DecodeResult<'a, T>,
{
    let (len_bytes, mut rest) = take(input, 4)?;
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    // Every item takes at least one byte, which bounds the allocation.
    if len > rest.len() {
        return Err(DecodeFailure::new(DecodeError::InvalidLength(len as u64), input));
    }
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        let (item, next) = decode_item(rest)?;
        items.push(item);
        rest = next;
    }
    Ok((items, rest))
}

impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_seq(self, out, |item, out| item.encode_into(out));
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        decode_seq(input, T::decode)
    }
}
