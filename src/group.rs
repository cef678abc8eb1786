//! Prime-order group helpers.
//!
//! All protocol code is generic over `C: CurveGroup`; the production group is
//! BLS12-381 G1, whose compressed points are 48 bytes and scalars 32 bytes.

use ark_ec::{CurveGroup, PrimeGroup};
use ark_ff::UniformRand;
use ark_std::rand::Rng;
use ark_std::Zero;
use std::collections::HashSet;

pub type Curve = ark_bls12_381::G1Projective;
pub type Scalar = ark_bls12_381::Fr;

pub const ELEMENT_BYTES: usize = 48;
pub const SCALAR_BYTES: usize = 32;
pub const DECK_SIZE: usize = 52;

/// Sample a uniformly random scalar.
pub fn random_scalar<C: CurveGroup, R: Rng>(rng: &mut R) -> C::ScalarField {
    C::ScalarField::rand(rng)
}

/// Sample a uniformly random group element with unknown discrete log to the caller's peers.
pub fn random_element<C: CurveGroup, R: Rng>(rng: &mut R) -> C {
    C::generator() * random_scalar::<C, R>(rng)
}

pub fn identity<C: CurveGroup>() -> C {
    C::zero()
}

/// Build the public table of card plaintexts: `count` pairwise distinct random elements.
pub fn card_representations<C: CurveGroup, R: Rng>(rng: &mut R, count: usize) -> Vec<C> {
    let mut seen = HashSet::with_capacity(count);
    let mut table = Vec::with_capacity(count);
    while table.len() < count {
        let element = random_element::<C, R>(rng);
        if !element.is_zero() && seen.insert(element) {
            table.push(element);
        }
    }
    table
}

/// Position of `element` in the card table.
pub fn index_of<C: CurveGroup>(table: &[C], element: &C) -> Option<usize> {
    table.iter().position(|candidate| candidate == element)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_serialize::CanonicalSerialize;
    use ark_std::test_rng;

    #[test]
    fn encodings_have_the_documented_width() {
        let mut rng = test_rng();
        let element = random_element::<Curve, _>(&mut rng);
        let scalar = random_scalar::<Curve, _>(&mut rng);
        assert_eq!(element.compressed_size(), ELEMENT_BYTES);
        assert_eq!(scalar.compressed_size(), SCALAR_BYTES);
    }

    #[test]
    fn card_table_is_distinct_and_searchable() {
        let mut rng = test_rng();
        let table = card_representations::<Curve, _>(&mut rng, DECK_SIZE);
        assert_eq!(table.len(), DECK_SIZE);
        for (idx, card) in table.iter().enumerate() {
            assert_eq!(index_of(&table, card), Some(idx));
        }
        assert_eq!(index_of(&table, &identity::<Curve>()), None);
    }

    #[test]
    fn group_laws_hold_for_sampled_elements() {
        let mut rng = test_rng();
        let a = random_element::<Curve, _>(&mut rng);
        let b = random_element::<Curve, _>(&mut rng);
        let s = random_scalar::<Curve, _>(&mut rng);
        assert_eq!((a + b) - b, a);
        assert_eq!(a + identity::<Curve>(), a);
        assert_eq!((a + b) * s, a * s + b * s);
    }
}
