//! Arena of top-level sessions addressed by id.
//!
//! The registry is the only writer of the sessions it holds. Participants
//! reach a session through `submit`, anyone may `tick` it, and nested
//! sub-sessions (dealings, openings) are only reachable through their hand.

use crate::dkg::{DkgContribution, DkgError, DkgSession, DkgState};
use crate::elgamal::Ciphertext;
use crate::hand::{HandConfig, HandError, HandSession, HandState};
use crate::reencryption::VerifiableReencryption;
use crate::scalar_mul::VerifiableContribution;
use crate::session::{PlayerId, Timestamp};
use crate::shuffle::{ShuffleError, ShuffleSession, ShuffleState};
use ark_ec::CurveGroup;
use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

const LOG_TARGET: &str = "threshold_poker::registry";

pub type SessionId = u64;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no session with id {0}")]
    UnknownSession(SessionId),
    #[error("session {id} is a {actual} session, expected {expected}")]
    WrongKind {
        id: SessionId,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("dkg session {0} has not succeeded")]
    DkgNotSucceeded(SessionId),
    #[error(transparent)]
    Dkg(#[from] DkgError),
    #[error(transparent)]
    Shuffle(#[from] ShuffleError),
    #[error(transparent)]
    Hand(#[from] HandError),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", bound(serialize = "", deserialize = ""))]
pub enum Session<C: CurveGroup> {
    Dkg(DkgSession<C>),
    Shuffle(ShuffleSession<C>),
    Hand(Box<HandSession<C>>),
}

impl<C: CurveGroup> Session<C> {
    pub fn kind(&self) -> &'static str {
        match self {
            Session::Dkg(_) => "dkg",
            Session::Shuffle(_) => "shuffle",
            Session::Hand(_) => "hand",
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self {
            Session::Dkg(s) => SessionStatus::Dkg(s.state()),
            Session::Shuffle(s) => SessionStatus::Shuffle(s.state()),
            Session::Hand(s) => SessionStatus::Hand(s.state()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Dkg(DkgState),
    Shuffle(ShuffleState),
    Hand(HandState),
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            SessionStatus::Dkg(state) => state != DkgState::InProgress,
            SessionStatus::Shuffle(state) => state != ShuffleState::Accepting,
            SessionStatus::Hand(state) => state.is_terminal(),
        }
    }
}

/// A participant's message to a session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case", bound(serialize = "", deserialize = ""))]
pub enum Action<C: CurveGroup> {
    DkgContribution {
        contribution: DkgContribution<C>,
    },
    Shuffle {
        deck: Vec<Ciphertext<C>>,
    },
    Reencryption {
        dealing_idx: usize,
        reenc: VerifiableReencryption<C>,
    },
    DealingContribution {
        dealing_idx: usize,
        contribution: VerifiableContribution<C>,
    },
    OpeningContribution {
        community_idx: usize,
        contribution: VerifiableContribution<C>,
    },
    Bet {
        amount: u64,
    },
    ShowdownReveal {
        dealing_idx: usize,
        #[serde(with = "crate::crypto_serde::canonical")]
        blinding: C::ScalarField,
    },
}

impl<C: CurveGroup> Action<C> {
    fn target_kind(&self) -> &'static str {
        match self {
            Action::DkgContribution { .. } => "dkg",
            Action::Shuffle { .. } => "shuffle",
            _ => "hand",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct SessionRegistry<C: CurveGroup> {
    next_id: SessionId,
    sessions: BTreeMap<SessionId, Session<C>>,
}

impl<C: CurveGroup> Default for SessionRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: CurveGroup> SessionRegistry<C> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            sessions: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, id: SessionId) -> Option<&Session<C>> {
        self.sessions.get(&id)
    }

    pub fn status(&self, id: SessionId) -> Result<SessionStatus, RegistryError> {
        self.session(id).map(Session::status)
    }

    /// Drop a session, typically once it is terminal and its outcome has been consumed.
    pub fn remove(&mut self, id: SessionId) -> Option<Session<C>> {
        self.sessions.remove(&id)
    }

    pub fn dkg(&self, id: SessionId) -> Result<&DkgSession<C>, RegistryError> {
        match self.session(id)? {
            Session::Dkg(s) => Ok(s),
            other => Err(wrong_kind(id, "dkg", other)),
        }
    }

    pub fn shuffle(&self, id: SessionId) -> Result<&ShuffleSession<C>, RegistryError> {
        match self.session(id)? {
            Session::Shuffle(s) => Ok(s),
            other => Err(wrong_kind(id, "shuffle", other)),
        }
    }

    pub fn hand(&self, id: SessionId) -> Result<&HandSession<C>, RegistryError> {
        match self.session(id)? {
            Session::Hand(s) => Ok(s.as_ref()),
            other => Err(wrong_kind(id, "hand", other)),
        }
    }

    pub fn create_dkg<R: Rng>(
        &mut self,
        contributors: Vec<PlayerId>,
        deadline: Timestamp,
        rng: &mut R,
    ) -> Result<SessionId, RegistryError> {
        let session = DkgSession::new(contributors, deadline, rng)?;
        Ok(self.insert(Session::Dkg(session)))
    }

    /// Start a shuffle of `card_reprs` under the aggregate key of a finished DKG.
    pub fn create_shuffle(
        &mut self,
        dkg_id: SessionId,
        card_reprs: &[C],
        contributors: Vec<PlayerId>,
        deadlines: Vec<Timestamp>,
        now: Timestamp,
    ) -> Result<SessionId, RegistryError> {
        let info = self
            .dkg(dkg_id)?
            .get_shared_secret_info()
            .map_err(|_| RegistryError::DkgNotSucceeded(dkg_id))?;
        let initial = card_reprs
            .iter()
            .map(|m| Ciphertext::trivial(info.base(), *m))
            .collect();
        let session = ShuffleSession::new(info.agg_ek, initial, contributors, deadlines, now)?;
        Ok(self.insert(Session::Shuffle(session)))
    }

    /// Start a hand on the deck of a finished shuffle; the DKG's contributors are the seats.
    pub fn create_hand(
        &mut self,
        dkg_id: SessionId,
        shuffle_id: SessionId,
        card_reprs: Vec<C>,
        stacks: Vec<u64>,
        config: HandConfig,
        now: Timestamp,
    ) -> Result<SessionId, RegistryError> {
        let dkg = self.dkg(dkg_id)?;
        let info = dkg
            .get_shared_secret_info()
            .map_err(|_| RegistryError::DkgNotSucceeded(dkg_id))?;
        let players = dkg.expected_contributors().to_vec();
        let deck = self.shuffle(shuffle_id)?.result()?.to_vec();
        let hand = HandSession::new(players, stacks, card_reprs, deck, info, config, now)?;
        Ok(self.insert(Session::Hand(Box::new(hand))))
    }

    /// Dispatch a participant action to the session it addresses.
    pub fn submit(
        &mut self,
        id: SessionId,
        sender: PlayerId,
        action: Action<C>,
        now: Timestamp,
    ) -> Result<(), RegistryError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSession(id))?;
        let expected = action.target_kind();
        debug!(target: LOG_TARGET, id, sender, kind = expected, "submission");

        match (session, action) {
            (Session::Dkg(s), Action::DkgContribution { contribution }) => {
                s.submit_contribution(sender, contribution, now)?
            }
            (Session::Shuffle(s), Action::Shuffle { deck }) => s.submit_contribution(sender, deck, now)?,
            (Session::Hand(h), Action::Reencryption { dealing_idx, reenc }) => {
                h.submit_reencryption(sender, dealing_idx, reenc, now)?
            }
            (
                Session::Hand(h),
                Action::DealingContribution {
                    dealing_idx,
                    contribution,
                },
            ) => h.submit_dealing_contribution(sender, dealing_idx, contribution, now)?,
            (
                Session::Hand(h),
                Action::OpeningContribution {
                    community_idx,
                    contribution,
                },
            ) => h.submit_opening_contribution(sender, community_idx, contribution, now)?,
            (Session::Hand(h), Action::Bet { amount }) => {
                h.process_bet_action(sender, amount, now)?;
            }
            (
                Session::Hand(h),
                Action::ShowdownReveal {
                    dealing_idx,
                    blinding,
                },
            ) => {
                h.process_showdown_reveal(sender, dealing_idx, blinding, now)?;
            }
            (other, _) => return Err(wrong_kind(id, expected, other)),
        }
        Ok(())
    }

    /// Advance a session's deadlines and sub-protocols. Callable by anyone; idempotent.
    pub fn tick(&mut self, id: SessionId, now: Timestamp) -> Result<SessionStatus, RegistryError> {
        let session = self
            .sessions
            .get_mut(&id)
            .ok_or(RegistryError::UnknownSession(id))?;
        let before = session.status();
        let after = match session {
            Session::Dkg(s) => SessionStatus::Dkg(s.tick(now)),
            Session::Shuffle(s) => SessionStatus::Shuffle(s.tick(now)),
            Session::Hand(s) => SessionStatus::Hand(s.tick(now)),
        };
        if before != after {
            info!(target: LOG_TARGET, id, ?before, ?after, "session advanced");
        }
        Ok(after)
    }

    fn session(&self, id: SessionId) -> Result<&Session<C>, RegistryError> {
        self.sessions.get(&id).ok_or(RegistryError::UnknownSession(id))
    }

    fn insert(&mut self, session: Session<C>) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        info!(target: LOG_TARGET, id, kind = session.kind(), "session registered");
        self.sessions.insert(id, session);
        id
    }
}

fn wrong_kind<C: CurveGroup>(id: SessionId, expected: &'static str, actual: &Session<C>) -> RegistryError {
    RegistryError::WrongKind {
        id,
        expected,
        actual: actual.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{card_representations, Curve, DECK_SIZE};
    use crate::shuffle::shuffle_and_rerandomize;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const PLAYERS: [PlayerId; 3] = [10, 20, 30];

    #[test]
    fn dkg_shuffle_and_hand_run_through_the_registry() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut registry = SessionRegistry::<Curve>::new();

        let dkg_id = registry.create_dkg(PLAYERS.to_vec(), 10, &mut rng).unwrap();
        let base = registry.dkg(dkg_id).unwrap().base_point();
        let mut secrets = Vec::new();
        for player in PLAYERS {
            let (secret, contribution) = DkgContribution::generate(base, player, &mut rng);
            secrets.push(secret);
            registry
                .submit(dkg_id, player, Action::DkgContribution { contribution }, 1)
                .unwrap();
        }
        assert_eq!(registry.tick(dkg_id, 1).unwrap(), SessionStatus::Dkg(DkgState::Succeeded));

        let cards = card_representations::<Curve, _>(&mut rng, DECK_SIZE);
        let shuffle_id = registry
            .create_shuffle(dkg_id, &cards, PLAYERS.to_vec(), vec![20, 30, 40], 2)
            .unwrap();
        let key = *registry.shuffle(shuffle_id).unwrap().enc_key();
        for player in PLAYERS {
            let deck = shuffle_and_rerandomize(&key, registry.shuffle(shuffle_id).unwrap().latest_deck(), &mut rng)
                .unwrap()
                .deck;
            registry
                .submit(shuffle_id, player, Action::Shuffle { deck }, 3)
                .unwrap();
            registry.tick(shuffle_id, 3).unwrap();
        }
        assert_eq!(
            registry.status(shuffle_id).unwrap(),
            SessionStatus::Shuffle(ShuffleState::Succeeded)
        );

        let hand_id = registry
            .create_hand(dkg_id, shuffle_id, cards, vec![25_000; 3], HandConfig::default(), 4)
            .unwrap();
        assert_eq!(registry.len(), 3);
        let info = registry.dkg(dkg_id).unwrap().get_shared_secret_info().unwrap();

        for dealing_idx in 0..6 {
            let dealing = registry.hand(hand_id).unwrap().dealing(dealing_idx).unwrap();
            let recipient = dealing.deal_target();
            let (reenc, _) = VerifiableReencryption::generate(dealing.card(), &info, recipient, &mut rng);
            registry
                .submit(hand_id, recipient, Action::Reencryption { dealing_idx, reenc }, 5)
                .unwrap();
        }
        registry.tick(hand_id, 5).unwrap();
        for dealing_idx in 0..6 {
            let target = registry
                .hand(hand_id)
                .unwrap()
                .dealing(dealing_idx)
                .unwrap()
                .scalar_mul_target()
                .unwrap();
            for (i, player) in PLAYERS.iter().enumerate() {
                let contribution =
                    VerifiableContribution::generate(target, &info.ek_shares[i], secrets[i], *player, &mut rng);
                registry
                    .submit(
                        hand_id,
                        *player,
                        Action::DealingContribution {
                            dealing_idx,
                            contribution,
                        },
                        6,
                    )
                    .unwrap();
            }
        }
        assert_eq!(
            registry.tick(hand_id, 6).unwrap(),
            SessionStatus::Hand(HandState::PlayerBetting)
        );

        registry.submit(hand_id, 10, Action::Bet { amount: 0 }, 7).unwrap();
        registry.submit(hand_id, 20, Action::Bet { amount: 125 }, 7).unwrap();
        assert_eq!(registry.status(hand_id).unwrap(), SessionStatus::Hand(HandState::Succeeded));
        assert_eq!(
            registry.hand(hand_id).unwrap().ending_chips().unwrap(),
            &[25_000, 24_875, 25_125]
        );
        assert!(registry.remove(hand_id).is_some());
    }

    #[test]
    fn mismatched_actions_and_unknown_ids_are_rejected() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut registry = SessionRegistry::<Curve>::new();
        let dkg_id = registry.create_dkg(PLAYERS.to_vec(), 10, &mut rng).unwrap();

        assert!(matches!(
            registry.submit(dkg_id, 10, Action::Bet { amount: 5 }, 0),
            Err(RegistryError::WrongKind {
                expected: "hand",
                actual: "dkg",
                ..
            })
        ));
        assert!(matches!(registry.tick(99, 0), Err(RegistryError::UnknownSession(99))));
        assert!(matches!(registry.hand(dkg_id), Err(RegistryError::WrongKind { .. })));
        assert!(matches!(
            registry.create_shuffle(dkg_id, &[], PLAYERS.to_vec(), vec![1, 2, 3], 0),
            Err(RegistryError::DkgNotSucceeded(_))
        ));
    }

    #[test]
    fn late_submission_is_refused_and_the_timeout_still_names_the_sender() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut registry = SessionRegistry::<Curve>::new();
        let dkg_id = registry.create_dkg(PLAYERS.to_vec(), 10, &mut rng).unwrap();
        let base = registry.dkg(dkg_id).unwrap().base_point();
        for player in [10, 20] {
            let (_, contribution) = DkgContribution::generate(base, player, &mut rng);
            registry
                .submit(dkg_id, player, Action::DkgContribution { contribution }, 9)
                .unwrap();
        }

        let (_, late) = DkgContribution::generate(base, 30, &mut rng);
        assert!(matches!(
            registry.submit(dkg_id, 30, Action::DkgContribution { contribution: late }, 10),
            Err(RegistryError::Dkg(DkgError::DeadlinePassed(10)))
        ));
        assert_eq!(registry.tick(dkg_id, 10).unwrap(), SessionStatus::Dkg(DkgState::TimedOut));
        assert_eq!(registry.dkg(dkg_id).unwrap().culprits(), &[30]);
    }

    #[test]
    fn tick_is_idempotent_and_reports_timeouts() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut registry = SessionRegistry::<Curve>::new();
        let dkg_id = registry.create_dkg(PLAYERS.to_vec(), 10, &mut rng).unwrap();
        assert_eq!(registry.tick(dkg_id, 10).unwrap(), SessionStatus::Dkg(DkgState::TimedOut));
        let before = serde_json::to_string(&registry).unwrap();
        registry.tick(dkg_id, 11).unwrap();
        assert_eq!(serde_json::to_string(&registry).unwrap(), before);
        assert_eq!(registry.dkg(dkg_id).unwrap().culprits(), &PLAYERS);
        assert!(registry.status(dkg_id).unwrap().is_terminal());
    }
}
