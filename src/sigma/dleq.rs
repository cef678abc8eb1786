use crate::transcript::Transcript;
use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const LOG_TARGET: &str = "threshold_poker::sigma::dleq";

/// Chaum-Pedersen proof for equality of discrete logarithms.
/// Proves that the same secret was used to compute `p1 = b1·x` and `p2 = b2·x`.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct DleqProof<C: CurveGroup> {
    /// First commitment: T1 = b1·w
    #[serde(with = "crate::crypto_serde::canonical")]
    pub t1: C,
    /// Second commitment: T2 = b2·w
    #[serde(with = "crate::crypto_serde::canonical")]
    pub t2: C,
    /// Response: z = w + c·x
    #[serde(with = "crate::crypto_serde::canonical")]
    pub z: C::ScalarField,
}

impl<C: CurveGroup> DleqProof<C> {
    /// Prove `log_{b1}(b1·secret) == log_{b2}(b2·secret)`.
    ///
    /// `domain` separates proofs produced by different sub-protocols; `context`
    /// binds the proof to its submitter.
    #[instrument(target = LOG_TARGET, skip(secret, rng), level = "trace")]
    pub fn prove<R: Rng>(
        domain: &'static str,
        context: &[u8],
        secret: C::ScalarField,
        b1: C,
        b2: C,
        rng: &mut R,
    ) -> Self {
        let w = C::ScalarField::rand(rng);
        let t1 = b1 * w;
        let t2 = b2 * w;
        let p1 = b1 * secret;
        let p2 = b2 * secret;

        let challenge = Self::challenge(domain, context, [&b1, &b2, &p1, &p2, &t1, &t2]);
        let z = w + challenge * secret;

        DleqProof { t1, t2, z }
    }

    /// Check the verification equations `b1·z = T1 + c·p1` and `b2·z = T2 + c·p2`.
    pub fn verify(&self, domain: &'static str, context: &[u8], b1: C, b2: C, p1: C, p2: C) -> bool {
        let challenge = Self::challenge(domain, context, [&b1, &b2, &p1, &p2, &self.t1, &self.t2]);

        let check1 = b1 * self.z == self.t1 + p1 * challenge;
        let check2 = b2 * self.z == self.t2 + p2 * challenge;
        tracing::debug!(target: LOG_TARGET, check1, check2, "dleq verification");

        check1 && check2
    }

    fn challenge(domain: &'static str, context: &[u8], points: [&C; 6]) -> C::ScalarField {
        let mut transcript = Transcript::new(domain);
        transcript.append_bytes(context);
        for point in points {
            transcript.append_element(point);
        }
        transcript.challenge_scalar()
    }
}
