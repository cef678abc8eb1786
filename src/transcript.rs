//! Fiat–Shamir transcripts: an append-only, domain-separated byte log that is
//! hashed into a scalar challenge.

use ark_ec::CurveGroup;
use ark_ff::PrimeField;
use ark_serialize::CanonicalSerialize;
use sha3::{Digest, Sha3_512};

const DOMAIN_TAG: &[u8] = b"threshold_poker/fiat_shamir/v1";
const LOG_TARGET: &str = "threshold_poker::transcript";

/// Builder for canonical proof transcripts.
#[derive(Clone, Debug)]
pub struct Transcript {
    buffer: Vec<u8>,
}

impl Transcript {
    pub fn new(kind: &'static str) -> Self {
        let mut buffer = Vec::with_capacity(256);
        buffer.extend_from_slice(DOMAIN_TAG);
        buffer.extend_from_slice(&(kind.len() as u16).to_be_bytes());
        buffer.extend_from_slice(kind.as_bytes());
        Self { buffer }
    }

    pub fn append_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn append_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buffer
            .extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        self.buffer.extend_from_slice(bytes);
    }

    pub fn append_element<C: CurveGroup>(&mut self, element: &C) {
        let mut buf = Vec::with_capacity(element.compressed_size());
        // Writing into a Vec cannot fail.
        let _ = element.serialize_compressed(&mut buf);
        self.append_bytes(&buf);
    }

    pub fn append_scalar<F: PrimeField>(&mut self, scalar: &F) {
        let mut buf = Vec::with_capacity(scalar.compressed_size());
        let _ = scalar.serialize_compressed(&mut buf);
        self.append_bytes(&buf);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Hash the transcript into a challenge scalar.
    ///
    /// A 512-bit digest is reduced modulo the field order, so the bias is negligible.
    pub fn challenge_scalar<F: PrimeField>(&self) -> F {
        let digest = Sha3_512::digest(&self.buffer);
        let challenge = F::from_le_bytes_mod_order(&digest);
        tracing::trace!(target: LOG_TARGET, transcript_len = self.buffer.len(), "derived challenge");
        challenge
    }
}
