use crate::transcript::Transcript;
use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const LOG_TARGET: &str = "threshold_poker::sigma::dlog";

/// Schnorr proof of knowledge of `x` such that `point = base·x`.
///
/// `context` binds the proof to the statement's surroundings (e.g. the
/// submitting player), so a proof cannot be replayed by someone else.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct DlogProof<C: CurveGroup> {
    /// Commitment: T = base·w
    #[serde(with = "crate::crypto_serde::canonical")]
    pub t: C,
    /// Response: z = w + c·x
    #[serde(with = "crate::crypto_serde::canonical")]
    pub z: C::ScalarField,
}

impl<C: CurveGroup> DlogProof<C> {
    #[instrument(target = LOG_TARGET, skip(secret, rng), level = "trace")]
    pub fn prove<R: Rng>(
        domain: &'static str,
        context: &[u8],
        secret: C::ScalarField,
        base: C,
        rng: &mut R,
    ) -> Self {
        let w = C::ScalarField::rand(rng);
        let t = base * w;
        let point = base * secret;
        let challenge = Self::challenge(domain, context, &base, &point, &t);
        DlogProof {
            t,
            z: w + challenge * secret,
        }
    }

    pub fn verify(&self, domain: &'static str, context: &[u8], base: C, point: C) -> bool {
        let challenge = Self::challenge(domain, context, &base, &point, &self.t);
        let ok = base * self.z == self.t + point * challenge;
        tracing::debug!(target: LOG_TARGET, ok, "dlog verification");
        ok
    }

    fn challenge(domain: &'static str, context: &[u8], base: &C, point: &C, t: &C) -> C::ScalarField {
        let mut transcript = Transcript::new(domain);
        transcript.append_bytes(context);
        transcript.append_element(base);
        transcript.append_element(point);
        transcript.append_element(t);
        transcript.challenge_scalar()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{random_element, random_scalar, Curve};
    use ark_std::test_rng;

    const DOMAIN: &str = "test/dlog";

    #[test]
    fn knowledge_proof_verifies_for_the_right_point() {
        let mut rng = test_rng();
        let base = random_element::<Curve, _>(&mut rng);
        let secret = random_scalar::<Curve, _>(&mut rng);

        let proof = DlogProof::prove(DOMAIN, b"alice", secret, base, &mut rng);
        assert!(proof.verify(DOMAIN, b"alice", base, base * secret));
        assert!(!proof.verify(DOMAIN, b"alice", base, base * (secret + secret)));
    }

    #[test]
    fn proof_is_bound_to_its_context() {
        let mut rng = test_rng();
        let base = random_element::<Curve, _>(&mut rng);
        let secret = random_scalar::<Curve, _>(&mut rng);

        let proof = DlogProof::prove(DOMAIN, b"alice", secret, base, &mut rng);
        assert!(!proof.verify(DOMAIN, b"mallory", base, base * secret));
    }

    #[test]
    fn proof_does_not_transfer_to_another_base() {
        let mut rng = test_rng();
        let base = random_element::<Curve, _>(&mut rng);
        let other_base = random_element::<Curve, _>(&mut rng);
        let secret = random_scalar::<Curve, _>(&mut rng);

        let proof = DlogProof::prove(DOMAIN, b"", secret, base, &mut rng);
        assert!(!proof.verify(DOMAIN, b"", other_base, other_base * secret));
    }
}
