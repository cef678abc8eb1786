//! Lifted ElGamal over a prime-order group with an explicit base point.

use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::Rng;
use ark_std::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ElGamalError {
    #[error("ciphertexts were produced under different base points")]
    BaseMismatch,
}

/// Public encryption key: `public_point = base·dk`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct EncKey<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::canonical")]
    pub base: C,
    #[serde(with = "crate::crypto_serde::canonical")]
    pub public_point: C,
}

/// Ciphertext `(c0, c1) = (base·r, m + public_point·r)`, remembering its base.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct Ciphertext<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::canonical")]
    pub base: C,
    #[serde(with = "crate::crypto_serde::canonical")]
    pub c0: C,
    #[serde(with = "crate::crypto_serde::canonical")]
    pub c1: C,
}

impl<C: CurveGroup> EncKey<C> {
    pub fn new(base: C, public_point: C) -> Self {
        Self { base, public_point }
    }

    /// Derive the encryption key for a private scalar under `base`.
    pub fn from_secret(base: C, dk: C::ScalarField) -> Self {
        Self::new(base, base * dk)
    }
}

/// Draw a fresh key pair under `base`. Returns `(dk, ek)`.
pub fn keygen<C: CurveGroup, R: Rng>(base: C, rng: &mut R) -> (C::ScalarField, EncKey<C>) {
    let dk = C::ScalarField::rand(rng);
    (dk, EncKey::from_secret(base, dk))
}

pub fn enc<C: CurveGroup>(ek: &EncKey<C>, r: C::ScalarField, m: C) -> Ciphertext<C> {
    Ciphertext {
        base: ek.base,
        c0: ek.base * r,
        c1: m + ek.public_point * r,
    }
}

pub fn dec<C: CurveGroup>(dk: C::ScalarField, ciphertext: &Ciphertext<C>) -> C {
    ciphertext.c1 - ciphertext.c0 * dk
}

impl<C: CurveGroup> Ciphertext<C> {
    pub fn new(base: C, c0: C, c1: C) -> Self {
        Self { base, c0, c1 }
    }

    /// A ciphertext of `m` with zero randomness; the shuffle's starting deck is built from these.
    pub fn trivial(base: C, m: C) -> Self {
        Self::new(base, C::zero(), m)
    }

    /// Homomorphic addition; both operands must share the same base.
    pub fn add(&self, other: &Self) -> Result<Self, ElGamalError> {
        if self.base != other.base {
            return Err(ElGamalError::BaseMismatch);
        }
        Ok(Self::new(self.base, self.c0 + other.c0, self.c1 + other.c1))
    }

    pub fn scale(&self, s: C::ScalarField) -> Self {
        Self::new(self.base, self.c0 * s, self.c1 * s)
    }

    /// Re-randomize by adding an encryption of the identity under `ek`.
    pub fn rerandomize(&self, ek: &EncKey<C>, r: C::ScalarField) -> Result<Self, ElGamalError> {
        if self.base != ek.base {
            return Err(ElGamalError::BaseMismatch);
        }
        self.add(&enc(ek, r, C::zero()))
    }

    pub fn unpack(&self) -> (C, C, C) {
        (self.base, self.c0, self.c1)
    }
}
