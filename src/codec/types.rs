//! Wire encodings of the protocol's message types.

use super::{
    decode_element, decode_scalar, decode_tag, encode_element, encode_scalar, encode_tag, DecodeResult,
    WireDecode, WireEncode,
};
use crate::dkg::DkgContribution;
use crate::elgamal::{Ciphertext, EncKey};
use crate::group::{Curve, Scalar};
use crate::reencryption::VerifiableReencryption;
use crate::scalar_mul::VerifiableContribution;
use crate::sigma::{DleqProof, DlogProof};
use ark_ec::CurveGroup;

pub const CIPHERTEXT_TAG: &str = "Ciphertext";
pub const ENC_KEY_TAG: &str = "EncKey";
pub const DKG_CONTRIBUTION_TAG: &str = "DkgContribution";
pub const DLOG_PROOF_TAG: &str = "DlogProof";
pub const DLEQ_PROOF_TAG: &str = "DleqProof";
pub const VERIFIABLE_CONTRIBUTION_TAG: &str = "VerifiableContribution";
pub const VERIFIABLE_REENCRYPTION_TAG: &str = "VerifiableReencryption";

impl WireEncode for Curve {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_element(self, out);
    }
}

impl WireDecode for Curve {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        decode_element(input)
    }
}

impl WireEncode for Scalar {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_scalar(self, out);
    }
}

impl WireDecode for Scalar {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        decode_scalar(input)
    }
}

impl<C: CurveGroup> WireEncode for Ciphertext<C> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_tag(CIPHERTEXT_TAG, out);
        encode_element(&self.base, out);
        encode_element(&self.c0, out);
        encode_element(&self.c1, out);
    }
}

impl<C: CurveGroup> WireDecode for Ciphertext<C> {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        let ((), rest) = decode_tag(input, CIPHERTEXT_TAG)?;
        let (base, rest) = decode_element::<C>(rest).map_err(|e| e.in_field("base"))?;
        let (c0, rest) = decode_element::<C>(rest).map_err(|e| e.in_field("c0"))?;
        let (c1, rest) = decode_element::<C>(rest).map_err(|e| e.in_field("c1"))?;
        Ok((Ciphertext::new(base, c0, c1), rest))
    }
}

impl<C: CurveGroup> WireEncode for EncKey<C> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_tag(ENC_KEY_TAG, out);
        encode_element(&self.base, out);
        encode_element(&self.public_point, out);
    }
}

impl<C: CurveGroup> WireDecode for EncKey<C> {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        let ((), rest) = decode_tag(input, ENC_KEY_TAG)?;
        let (base, rest) = decode_element::<C>(rest).map_err(|e| e.in_field("base"))?;
        let (public_point, rest) =
            decode_element::<C>(rest).map_err(|e| e.in_field("public_point"))?;
        Ok((EncKey::new(base, public_point), rest))
    }
}

impl<C: CurveGroup> WireEncode for DlogProof<C> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_tag(DLOG_PROOF_TAG, out);
        encode_element(&self.t, out);
        encode_scalar(&self.z, out);
    }
}

impl<C: CurveGroup> WireDecode for DlogProof<C> {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        let ((), rest) = decode_tag(input, DLOG_PROOF_TAG)?;
        let (t, rest) = decode_element::<C>(rest).map_err(|e| e.in_field("t"))?;
        let (z, rest) = decode_scalar::<C::ScalarField>(rest).map_err(|e| e.in_field("z"))?;
        Ok((DlogProof { t, z }, rest))
    }
}

impl<C: CurveGroup> WireEncode for DleqProof<C> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_tag(DLEQ_PROOF_TAG, out);
        encode_element(&self.t1, out);
        encode_element(&self.t2, out);
        encode_scalar(&self.z, out);
    }
}

impl<C: CurveGroup> WireDecode for DleqProof<C> {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        let ((), rest) = decode_tag(input, DLEQ_PROOF_TAG)?;
        let (t1, rest) = decode_element::<C>(rest).map_err(|e| e.in_field("t1"))?;
        let (t2, rest) = decode_element::<C>(rest).map_err(|e| e.in_field("t2"))?;
        let (z, rest) = decode_scalar::<C::ScalarField>(rest).map_err(|e| e.in_field("z"))?;
        Ok((DleqProof { t1, t2, z }, rest))
    }
}

impl<C: CurveGroup> WireEncode for DkgContribution<C> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_tag(DKG_CONTRIBUTION_TAG, out);
        encode_element(&self.public_point, out);
        self.proof.encode_into(out);
    }
}

impl<C: CurveGroup> WireDecode for DkgContribution<C> {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        let ((), rest) = decode_tag(input, DKG_CONTRIBUTION_TAG)?;
        let (public_point, rest) =
            decode_element::<C>(rest).map_err(|e| e.in_field("public_point"))?;
        let (proof, rest) = DlogProof::decode(rest).map_err(|e| e.in_field("proof"))?;
        Ok((DkgContribution { public_point, proof }, rest))
    }
}

impl<C: CurveGroup> WireEncode for VerifiableContribution<C> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_tag(VERIFIABLE_CONTRIBUTION_TAG, out);
        encode_element(&self.payload, out);
        self.proof.encode_into(out);
    }
}

impl<C: CurveGroup> WireDecode for VerifiableContribution<C> {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        let ((), rest) = decode_tag(input, VERIFIABLE_CONTRIBUTION_TAG)?;
        let (payload, rest) = decode_element::<C>(rest).map_err(|e| e.in_field("payload"))?;
        let (proof, rest) = DleqProof::decode(rest).map_err(|e| e.in_field("proof"))?;
        Ok((VerifiableContribution { payload, proof }, rest))
    }
}

impl<C: CurveGroup> WireEncode for VerifiableReencryption<C> {
    fn encode_into(&self, out: &mut Vec<u8>) {
        encode_tag(VERIFIABLE_REENCRYPTION_TAG, out);
        self.new_ciph.encode_into(out);
        self.new_ek.encode_into(out);
        self.proof.encode_into(out);
    }
}

impl<C: CurveGroup> WireDecode for VerifiableReencryption<C> {
    fn decode(input: &[u8]) -> DecodeResult<'_, Self> {
        let ((), rest) = decode_tag(input, VERIFIABLE_REENCRYPTION_TAG)?;
        let (new_ciph, rest) = Ciphertext::decode(rest).map_err(|e| e.in_field("new_ciph"))?;
        let (new_ek, rest) = EncKey::decode(rest).map_err(|e| e.in_field("new_ek"))?;
        let (proof, rest) = DlogProof::decode(rest).map_err(|e| e.in_field("proof"))?;
        Ok((
            VerifiableReencryption {
                new_ciph,
                new_ek,
                proof,
            },
            rest,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DecodeError;
    use crate::elgamal::{enc, keygen};
    use crate::group::{random_element, random_scalar, ELEMENT_BYTES};
    use crate::test_utils::protocol::run_dkg;
    use ark_std::test_rng;

    #[test]
    fn reencryption_round_trips_and_chains_with_a_contribution() {
        let mut rng = test_rng();
        let dkg = run_dkg(&[1, 2], &mut rng);
        let card = enc(
            &dkg.info.agg_ek,
            random_scalar::<Curve, _>(&mut rng),
            random_element::<Curve, _>(&mut rng),
        );
        let (reenc, _) = VerifiableReencryption::generate(&card, &dkg.info, 1, &mut rng);
        let contribution = VerifiableContribution::generate(
            reenc.new_ciph.c0,
            &dkg.info.ek_shares[1],
            dkg.secrets[1],
            2,
            &mut rng,
        );

        let mut buf = reenc.to_wire_bytes();
        contribution.encode_into(&mut buf);

        let (decoded_reenc, rest) = VerifiableReencryption::<Curve>::decode(&buf).unwrap();
        let decoded_contribution = VerifiableContribution::<Curve>::decode_exact(rest).unwrap();
        assert_eq!(decoded_reenc, reenc);
        assert_eq!(decoded_contribution, contribution);
    }

    #[test]
    fn deck_round_trips_as_a_sequence() {
        let mut rng = test_rng();
        let base = random_element::<Curve, _>(&mut rng);
        let (_, ek) = keygen(base, &mut rng);
        let deck: Vec<Ciphertext<Curve>> = (0..4)
            .map(|_| enc(&ek, random_scalar::<Curve, _>(&mut rng), random_element::<Curve, _>(&mut rng)))
            .collect();
        let bytes = deck.to_wire_bytes();
        assert_eq!(&bytes[..4], &4u32.to_be_bytes());
        assert_eq!(Vec::<Ciphertext<Curve>>::decode_exact(&bytes).unwrap(), deck);
    }

    #[test]
    fn dkg_contribution_round_trips() {
        let mut rng = test_rng();
        let base = random_element::<Curve, _>(&mut rng);
        let (_, contribution) = DkgContribution::generate(base, 4, &mut rng);
        let bytes = contribution.to_wire_bytes();
        assert_eq!(DkgContribution::<Curve>::decode_exact(&bytes).unwrap(), contribution);
    }

    #[test]
    fn truncated_nested_field_reports_its_path() {
        let mut rng = test_rng();
        let base = random_element::<Curve, _>(&mut rng);
        let (_, contribution) = DkgContribution::generate(base, 4, &mut rng);
        let bytes = contribution.to_wire_bytes();
        let truncated = &bytes[..bytes.len() - 1];

        let failure = DkgContribution::<Curve>::decode(truncated).unwrap_err();
        assert_eq!(
            failure.error,
            DecodeError::InsufficientBytes {
                needed: 32,
                available: 31
            }
        );
        assert_eq!(failure.field_path(), "proof.z");
        assert_eq!(failure.remainder.len(), 31);
        assert_eq!(
            failure.to_string(),
            "decode failed at proof.z: need 32 bytes but only 31 remain (code 1)"
        );
    }

    #[test]
    fn wrong_tag_is_rejected() {
        let mut rng = test_rng();
        let ek = EncKey::<Curve>::new(
            random_element::<Curve, _>(&mut rng),
            random_element::<Curve, _>(&mut rng),
        );
        let bytes = ek.to_wire_bytes();
        let failure = Ciphertext::<Curve>::decode(&bytes).unwrap_err();
        assert_eq!(failure.error, DecodeError::InvalidTag { expected: CIPHERTEXT_TAG });
        assert_eq!(failure.code(), 2);
    }

    #[test]
    fn trailing_bytes_fail_exact_decoding() {
        let mut rng = test_rng();
        let element = random_element::<Curve, _>(&mut rng);
        let mut bytes = element.to_wire_bytes();
        assert_eq!(bytes.len(), ELEMENT_BYTES);
        bytes.push(0);
        let failure = Curve::decode_exact(&bytes).unwrap_err();
        assert_eq!(failure.error, DecodeError::InvalidLength(1));
    }
}
