//! Sequential deck shuffle. Contributors take strict turns; each one
//! permutes and re-randomizes the previous deck under the aggregate key.

mod deck;

pub use deck::{apply_shuffle, shuffle_and_rerandomize, ShuffleVerifier, ShuffledDeck, WellFormedOnly};

use crate::elgamal::{Ciphertext, EncKey};
use crate::group::DECK_SIZE;
use crate::session::{PlayerId, Timestamp};
use ark_ec::CurveGroup;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

const LOG_TARGET: &str = "threshold_poker::shuffle";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShuffleError {
    #[error("a shuffle needs at least two contributors, got {0}")]
    TooFewContributors(usize),
    #[error("expected one deadline per contributor ({contributors}), got {deadlines}")]
    DeadlineCountMismatch { contributors: usize, deadlines: usize },
    #[error("deadlines must be strictly increasing and in the future")]
    InvalidDeadlines,
    #[error("deck must hold 52 ciphertexts, got {0}")]
    InvalidDeckSize(usize),
    #[error("ciphertext was not produced under the session key's base")]
    WrongBase,
    #[error("indices do not form a permutation")]
    NotAPermutation,
    #[error("session is no longer accepting contributions")]
    NotAccepting,
    #[error("player {0} is not the contributor whose turn it is")]
    NotYourTurn(PlayerId),
    #[error("deadline {0} for this turn has passed")]
    DeadlinePassed(Timestamp),
    #[error("session has not succeeded")]
    NotSucceeded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShuffleState {
    Accepting,
    Succeeded,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct ShuffleSession<C: CurveGroup> {
    enc_key: EncKey<C>,
    initial_ciphertexts: Vec<Ciphertext<C>>,
    allowed_contributors: Vec<PlayerId>,
    deadlines: Vec<Timestamp>,
    contributions: Vec<Vec<Ciphertext<C>>>,
    state: ShuffleState,
    expected_contributor_idx: usize,
    culprit: Option<PlayerId>,
}

impl<C: CurveGroup> ShuffleSession<C> {
    #[instrument(target = LOG_TARGET, skip(enc_key, initial_ciphertexts))]
    pub fn new(
        enc_key: EncKey<C>,
        initial_ciphertexts: Vec<Ciphertext<C>>,
        allowed_contributors: Vec<PlayerId>,
        deadlines: Vec<Timestamp>,
        now: Timestamp,
    ) -> Result<Self, ShuffleError> {
        let n = allowed_contributors.len();
        if n < 2 {
            return Err(ShuffleError::TooFewContributors(n));
        }
        if deadlines.len() != n {
            return Err(ShuffleError::DeadlineCountMismatch {
                contributors: n,
                deadlines: deadlines.len(),
            });
        }
        let increasing = deadlines.windows(2).all(|w| w[0] < w[1]);
        if !increasing || deadlines[0] <= now {
            return Err(ShuffleError::InvalidDeadlines);
        }
        if initial_ciphertexts.len() != DECK_SIZE {
            return Err(ShuffleError::InvalidDeckSize(initial_ciphertexts.len()));
        }
        if initial_ciphertexts.iter().any(|c| c.base != enc_key.base) {
            return Err(ShuffleError::WrongBase);
        }

        info!(target: LOG_TARGET, contributors = n, "shuffle session created");
        Ok(Self {
            enc_key,
            initial_ciphertexts,
            allowed_contributors,
            deadlines,
            contributions: Vec::with_capacity(n),
            state: ShuffleState::Accepting,
            expected_contributor_idx: 0,
            culprit: None,
        })
    }

    pub fn enc_key(&self) -> &EncKey<C> {
        &self.enc_key
    }

    pub fn state(&self) -> ShuffleState {
        self.state
    }

    pub fn succeeded(&self) -> bool {
        self.state == ShuffleState::Succeeded
    }

    pub fn failed(&self) -> bool {
        self.state == ShuffleState::Failed
    }

    pub fn culprit(&self) -> Option<PlayerId> {
        self.culprit
    }

    pub fn expected_contributor_idx(&self) -> usize {
        self.expected_contributor_idx
    }

    pub fn allowed_contributors(&self) -> &[PlayerId] {
        &self.allowed_contributors
    }

    pub fn num_contributions(&self) -> usize {
        self.contributions.len()
    }

    /// The deck the next contributor must shuffle.
    pub fn latest_deck(&self) -> &[Ciphertext<C>] {
        self.contributions
            .last()
            .map(Vec::as_slice)
            .unwrap_or(&self.initial_ciphertexts)
    }

    pub fn submit_contribution(
        &mut self,
        sender: PlayerId,
        new_deck: Vec<Ciphertext<C>>,
        now: Timestamp,
    ) -> Result<(), ShuffleError> {
        self.submit_contribution_with(&WellFormedOnly, sender, new_deck, now)
    }

    /// Accept a deck from the contributor whose turn it is, checked by `verifier`.
    pub fn submit_contribution_with<V: ShuffleVerifier<C>>(
        &mut self,
        verifier: &V,
        sender: PlayerId,
        new_deck: Vec<Ciphertext<C>>,
        now: Timestamp,
    ) -> Result<(), ShuffleError> {
        if self.state != ShuffleState::Accepting {
            return Err(ShuffleError::NotAccepting);
        }
        let turn = self.contributions.len();
        if self.allowed_contributors.get(turn) != Some(&sender) {
            warn!(target: LOG_TARGET, sender, turn, "out-of-turn shuffle rejected");
            return Err(ShuffleError::NotYourTurn(sender));
        }
        if now >= self.deadlines[turn] {
            warn!(target: LOG_TARGET, sender, turn, "late shuffle rejected");
            return Err(ShuffleError::DeadlinePassed(self.deadlines[turn]));
        }
        verifier.verify(&self.enc_key, self.latest_deck(), &new_deck)?;

        self.contributions.push(new_deck);
        tracing::debug!(target: LOG_TARGET, sender, turn, "shuffle accepted");
        Ok(())
    }

    /// Advance past every submitted turn; fail if the current contributor's deadline passed.
    pub fn tick(&mut self, now: Timestamp) -> ShuffleState {
        if self.state != ShuffleState::Accepting {
            return self.state;
        }

        self.expected_contributor_idx = self.contributions.len();

        if self.expected_contributor_idx == self.allowed_contributors.len() {
            self.state = ShuffleState::Succeeded;
            info!(target: LOG_TARGET, "shuffle succeeded");
        } else if now >= self.deadlines[self.expected_contributor_idx] {
            let culprit = self.allowed_contributors[self.expected_contributor_idx];
            self.culprit = Some(culprit);
            self.state = ShuffleState::Failed;
            warn!(target: LOG_TARGET, culprit, "shuffle timed out");
        }
        self.state
    }

    /// The final shuffled deck.
    pub fn result(&self) -> Result<&[Ciphertext<C>], ShuffleError> {
        if !self.succeeded() {
            return Err(ShuffleError::NotSucceeded);
        }
        Ok(self.latest_deck())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::{dec, keygen};
    use crate::group::{card_representations, random_element, Curve, Scalar};
    use ark_std::test_rng;
    use std::collections::HashSet;

    struct Fixture {
        dk: Scalar,
        ek: EncKey<Curve>,
        cards: Vec<Curve>,
        initial: Vec<Ciphertext<Curve>>,
    }

    fn fixture() -> Fixture {
        let mut rng = test_rng();
        let base = random_element::<Curve, _>(&mut rng);
        let (dk, ek) = keygen(base, &mut rng);
        let cards = card_representations::<Curve, _>(&mut rng, DECK_SIZE);
        let initial = cards.iter().map(|m| Ciphertext::trivial(base, *m)).collect();
        Fixture {
            dk,
            ek,
            cards,
            initial,
        }
    }

    #[test]
    fn constructor_validates_roster_and_deadlines() {
        let f = fixture();
        let new = |players: Vec<PlayerId>, deadlines: Vec<Timestamp>| {
            ShuffleSession::new(f.ek, f.initial.clone(), players, deadlines, 10)
        };
        assert_eq!(new(vec![1], vec![20]).unwrap_err(), ShuffleError::TooFewContributors(1));
        assert_eq!(
            new(vec![1, 2], vec![20]).unwrap_err(),
            ShuffleError::DeadlineCountMismatch {
                contributors: 2,
                deadlines: 1
            }
        );
        assert_eq!(new(vec![1, 2], vec![20, 20]).unwrap_err(), ShuffleError::InvalidDeadlines);
        assert_eq!(new(vec![1, 2], vec![10, 20]).unwrap_err(), ShuffleError::InvalidDeadlines);
        assert!(new(vec![1, 2], vec![11, 20]).is_ok());

        let short = ShuffleSession::new(f.ek, f.initial[..51].to_vec(), vec![1, 2], vec![20, 30], 0);
        assert_eq!(short.unwrap_err(), ShuffleError::InvalidDeckSize(51));
    }

    #[test]
    fn every_contributor_shuffles_in_turn() {
        let mut rng = test_rng();
        let f = fixture();
        let mut session =
            ShuffleSession::new(f.ek, f.initial.clone(), vec![7, 8, 9], vec![10, 20, 30], 0).unwrap();

        for (turn, player) in [7u64, 8, 9].into_iter().enumerate() {
            let shuffled = shuffle_and_rerandomize(&f.ek, session.latest_deck(), &mut rng).unwrap();
            session.submit_contribution(player, shuffled.deck, turn as u64).unwrap();
            let expected = if turn == 2 {
                ShuffleState::Succeeded
            } else {
                ShuffleState::Accepting
            };
            assert_eq!(session.tick(turn as u64), expected);
        }

        let result = session.result().unwrap();
        assert_eq!(result.len(), DECK_SIZE);
        let decrypted: HashSet<_> = result.iter().map(|c| dec(f.dk, c)).collect();
        let original: HashSet<_> = f.cards.iter().copied().collect();
        assert_eq!(decrypted, original);
    }

    #[test]
    fn out_of_turn_and_malformed_submissions_are_rejected() {
        let mut rng = test_rng();
        let f = fixture();
        let mut session =
            ShuffleSession::new(f.ek, f.initial.clone(), vec![1, 2], vec![10, 20], 0).unwrap();

        let shuffled = shuffle_and_rerandomize(&f.ek, session.latest_deck(), &mut rng).unwrap();
        assert_eq!(
            session.submit_contribution(2, shuffled.deck.clone(), 0),
            Err(ShuffleError::NotYourTurn(2))
        );
        assert_eq!(
            session.submit_contribution(1, shuffled.deck[..40].to_vec(), 0),
            Err(ShuffleError::InvalidDeckSize(40))
        );
        assert_eq!(session.num_contributions(), 0);

        session.submit_contribution(1, shuffled.deck.clone(), 0).unwrap();
        assert_eq!(
            session.submit_contribution(1, shuffled.deck, 0),
            Err(ShuffleError::NotYourTurn(1))
        );
    }

    #[test]
    fn silent_contributor_is_the_sole_culprit_and_later_turns_are_closed() {
        let mut rng = test_rng();
        let f = fixture();
        let mut session =
            ShuffleSession::new(f.ek, f.initial.clone(), vec![1, 2, 3], vec![10, 20, 30], 0).unwrap();

        let first = shuffle_and_rerandomize(&f.ek, session.latest_deck(), &mut rng).unwrap();
        session.submit_contribution(1, first.deck, 0).unwrap();
        assert_eq!(session.tick(5), ShuffleState::Accepting);
        assert_eq!(session.tick(19), ShuffleState::Accepting);
        assert_eq!(session.tick(20), ShuffleState::Failed);
        assert_eq!(session.culprit(), Some(2));

        let late = shuffle_and_rerandomize(&f.ek, session.latest_deck(), &mut rng).unwrap();
        assert_eq!(
            session.submit_contribution(2, late.deck, 21),
            Err(ShuffleError::NotAccepting)
        );
        assert_eq!(session.result(), Err(ShuffleError::NotSucceeded));
    }

    #[test]
    fn late_turn_is_rejected_even_without_a_tick() {
        let mut rng = test_rng();
        let f = fixture();
        let mut session =
            ShuffleSession::new(f.ek, f.initial.clone(), vec![1, 2], vec![10, 20], 0).unwrap();
        let first = shuffle_and_rerandomize(&f.ek, session.latest_deck(), &mut rng).unwrap();
        session.submit_contribution(1, first.deck, 9).unwrap();

        let late = shuffle_and_rerandomize(&f.ek, session.latest_deck(), &mut rng).unwrap();
        assert_eq!(
            session.submit_contribution(2, late.deck, 20),
            Err(ShuffleError::DeadlinePassed(20))
        );
        assert_eq!(session.num_contributions(), 1);
        assert_eq!(session.tick(20), ShuffleState::Failed);
        assert_eq!(session.culprit(), Some(2));
    }

    #[test]
    fn tick_is_idempotent() {
        let mut rng = test_rng();
        let f = fixture();
        let mut session =
            ShuffleSession::new(f.ek, f.initial.clone(), vec![1, 2], vec![10, 20], 0).unwrap();
        let first = shuffle_and_rerandomize(&f.ek, session.latest_deck(), &mut rng).unwrap();
        session.submit_contribution(1, first.deck, 0).unwrap();

        session.tick(3);
        let before = serde_json::to_string(&session).unwrap();
        session.tick(3);
        assert_eq!(serde_json::to_string(&session).unwrap(), before);
        assert_eq!(session.expected_contributor_idx(), 1);
    }
}
