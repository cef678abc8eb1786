//! Client-side deck shuffling and the verification seam applied to submitted decks.

use super::ShuffleError;
use crate::elgamal::{Ciphertext, EncKey};
use crate::group::DECK_SIZE;
use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_std::rand::Rng;
use rand::seq::SliceRandom;

const LOG_TARGET: &str = "threshold_poker::shuffle::deck";

/// Output of a local shuffle. Only `deck` is published; the permutation and
/// re-randomizers stay with the shuffler.
#[derive(Clone, Debug)]
pub struct ShuffledDeck<C: CurveGroup> {
    pub deck: Vec<Ciphertext<C>>,
    /// `deck[i]` re-randomizes `input[permutation[i]]`.
    pub permutation: Vec<usize>,
    pub rerandomizers: Vec<C::ScalarField>,
}

/// Draw a uniformly random permutation and fresh randomness, then permute and re-randomize.
#[tracing::instrument(target = LOG_TARGET, skip_all, fields(cards = input.len()))]
pub fn shuffle_and_rerandomize<C, R>(
    ek: &EncKey<C>,
    input: &[Ciphertext<C>],
    rng: &mut R,
) -> Result<ShuffledDeck<C>, ShuffleError>
where
    C: CurveGroup,
    R: Rng,
{
    let mut permutation: Vec<usize> = (0..input.len()).collect();
    permutation.shuffle(rng);
    let rerandomizers: Vec<C::ScalarField> =
        (0..input.len()).map(|_| C::ScalarField::rand(rng)).collect();
    let deck = apply_shuffle(ek, input, &permutation, &rerandomizers)?;
    Ok(ShuffledDeck {
        deck,
        permutation,
        rerandomizers,
    })
}

/// Deterministic core of a shuffle: `output[i] = rerandomize(input[permutation[i]], r[i])`.
pub fn apply_shuffle<C: CurveGroup>(
    ek: &EncKey<C>,
    input: &[Ciphertext<C>],
    permutation: &[usize],
    rerandomizers: &[C::ScalarField],
) -> Result<Vec<Ciphertext<C>>, ShuffleError> {
    if permutation.len() != input.len() || rerandomizers.len() != input.len() {
        return Err(ShuffleError::InvalidDeckSize(permutation.len()));
    }
    if !is_permutation(permutation) {
        return Err(ShuffleError::NotAPermutation);
    }
    permutation
        .iter()
        .zip(rerandomizers)
        .map(|(&src, r)| {
            input[src]
                .rerandomize(ek, *r)
                .map_err(|_| ShuffleError::WrongBase)
        })
        .collect()
}

fn is_permutation(permutation: &[usize]) -> bool {
    let mut seen = vec![false; permutation.len()];
    for &idx in permutation {
        match seen.get_mut(idx) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

/// Check applied to every submitted deck before it is accepted.
pub trait ShuffleVerifier<C: CurveGroup> {
    fn verify(
        &self,
        ek: &EncKey<C>,
        previous: &[Ciphertext<C>],
        next: &[Ciphertext<C>],
    ) -> Result<(), ShuffleError>;
}

/// Structural validation only: deck size and base point.
///
/// This does NOT prove that `next` is a permutation of a re-randomization of
/// `previous`; a permutation argument has not been specified for this
/// protocol yet, so a malicious shuffler can currently replace cards.
#[derive(Clone, Copy, Debug, Default)]
pub struct WellFormedOnly;

impl<C: CurveGroup> ShuffleVerifier<C> for WellFormedOnly {
    fn verify(
        &self,
        ek: &EncKey<C>,
        previous: &[Ciphertext<C>],
        next: &[Ciphertext<C>],
    ) -> Result<(), ShuffleError> {
        if next.len() != DECK_SIZE || next.len() != previous.len() {
            return Err(ShuffleError::InvalidDeckSize(next.len()));
        }
        if next.iter().any(|c| c.base != ek.base) {
            return Err(ShuffleError::WrongBase);
        }
        tracing::trace!(target: LOG_TARGET, "deck is well formed; permutation argument not checked");
        Ok(())
    }
}
