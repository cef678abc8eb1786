//! No-limit hand state machine driving the card sub-protocols.
//!
//! A hand owns its dealing and opening sessions by value and only talks to
//! them through their public operations:
//!
//! 1. `DealingPrivateCards`: one re-encryption per hole card, card `i` to seat `i / 2`.
//! 2. `PlayerBetting`: blinds are posted automatically, then players act in turn.
//! 3. `OpeningCommunityCards`: threshold scalar multiplications reveal flop, turn and river.
//! 4. `Showdown`: remaining players reveal their hole cards, then chips are paid out.
//!
//! Chip conservation, `Σ chips_in_hand + Σ invested`, holds in every state.

mod betting;
mod errors;
mod settlement;
mod types;


pub use errors::HandError;
pub use settlement::{placeholder_power, recompute_pots};
pub use types::*;

use crate::config::{ProtocolConfig, Timeouts};
use crate::dkg::SharedSecretPublicInfo;
use crate::elgamal::Ciphertext;
use crate::group::{index_of, DECK_SIZE};
use crate::reencryption::{ReencryptionSession, VerifiableReencryption};
use crate::scalar_mul::{ThresholdScalarMulSession, VerifiableContribution};
use crate::session::{position_of, PlayerId, Timestamp};
use ark_ec::CurveGroup;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use tracing::{error, info, instrument, warn};

const LOG_TARGET: &str = "threshold_poker::hand";

/// Seats at a table: two hole cards each plus five community cards must fit in the deck.
pub const MAX_PLAYERS: usize = (DECK_SIZE - 5) / 2;

/// Parameters fixed for one hand.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandConfig {
    pub stakes: TableStakes,
    pub timeouts: Timeouts,
}

impl From<&ProtocolConfig> for HandConfig {
    fn from(config: &ProtocolConfig) -> Self {
        Self {
            stakes: config.stakes.clone(),
            timeouts: config.timeouts.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct HandSession<C: CurveGroup> {
    players: Vec<PlayerId>,
    chips_in_hand: Vec<Chips>,
    invested: Vec<Chips>,
    action_states: Vec<ActionState>,
    #[serde(with = "crate::crypto_serde::canonical_vec")]
    card_reprs: Vec<C>,
    shuffled_deck: Vec<Ciphertext<C>>,
    secret_info: SharedSecretPublicInfo<C>,
    config: HandConfig,
    private_dealings: Vec<ReencryptionSession<C>>,
    /// Index `k` opens community card `k`; entries past `community_cards.len()` are pending.
    public_openings: Vec<ThresholdScalarMulSession<C>>,
    revealed_hole_cards: Vec<Option<usize>>,
    community_cards: Vec<usize>,
    street: Street,
    call_target: Chips,
    last_raise: Chips,
    next_raise_threshold: Chips,
    bet_this_street: bool,
    expected_action_from: Option<Seat>,
    action_deadline: Timestamp,
    showdown_deadline: Timestamp,
    state: HandState,
    culprits: Vec<PlayerId>,
}

impl<C: CurveGroup> HandSession<C> {
    /// Start a hand. `players` must be the DKG contributors in the same order
    /// as `secret_info.ek_shares`; seat 0 holds the button.
    #[instrument(target = LOG_TARGET, skip(card_reprs, shuffled_deck, secret_info, config))]
    pub fn new(
        players: Vec<PlayerId>,
        stacks: Vec<Chips>,
        card_reprs: Vec<C>,
        shuffled_deck: Vec<Ciphertext<C>>,
        secret_info: SharedSecretPublicInfo<C>,
        config: HandConfig,
        now: Timestamp,
    ) -> Result<Self, HandError> {
        let n = players.len();
        if !(2..=MAX_PLAYERS).contains(&n) {
            return Err(HandError::InvalidPlayerCount {
                got: n,
                max: MAX_PLAYERS,
            });
        }
        let mut seen = HashSet::new();
        if let Some(dup) = players.iter().find(|p| !seen.insert(**p)) {
            return Err(HandError::DuplicatePlayer(*dup));
        }
        if stacks.len() != n {
            return Err(HandError::StackCountMismatch {
                expected: n,
                got: stacks.len(),
            });
        }
        if let Some(seat) = stacks.iter().position(|chips| *chips == 0) {
            return Err(HandError::EmptyStack(players[seat]));
        }
        if card_reprs.len() != DECK_SIZE || shuffled_deck.len() != DECK_SIZE {
            return Err(HandError::InvalidDeck);
        }
        if secret_info.num_shares() != n {
            return Err(HandError::KeyShareMismatch {
                shares: secret_info.num_shares(),
                players: n,
            });
        }

        let reenc_deadline = config.timeouts.reencryption_deadline(now);
        let scalar_mul_deadline = config.timeouts.dealing_scalar_mul_deadline(now);
        let private_dealings = shuffled_deck[..2 * n]
            .iter()
            .enumerate()
            .map(|(card_idx, card)| {
                ReencryptionSession::new(
                    *card,
                    players[card_idx / 2],
                    players.clone(),
                    secret_info.clone(),
                    reenc_deadline,
                    scalar_mul_deadline,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(target: LOG_TARGET, players = n, "hand created; dealing hole cards");
        Ok(Self {
            chips_in_hand: stacks,
            invested: vec![0; n],
            action_states: vec![ActionState::Active; n],
            card_reprs,
            shuffled_deck,
            secret_info,
            config,
            private_dealings,
            public_openings: Vec::new(),
            revealed_hole_cards: vec![None; 2 * n],
            community_cards: Vec::new(),
            street: Street::Preflop,
            call_target: 0,
            last_raise: 0,
            next_raise_threshold: 0,
            bet_this_street: false,
            expected_action_from: None,
            action_deadline: 0,
            showdown_deadline: 0,
            state: HandState::DealingPrivateCards,
            culprits: Vec::new(),
            players,
        })
    }

    pub fn state(&self) -> HandState {
        self.state
    }

    pub fn street(&self) -> Street {
        self.street
    }

    pub fn players(&self) -> &[PlayerId] {
        &self.players
    }

    pub fn chips_in_hand(&self) -> &[Chips] {
        &self.chips_in_hand
    }

    pub fn invested(&self) -> &[Chips] {
        &self.invested
    }

    pub fn action_states(&self) -> &[ActionState] {
        &self.action_states
    }

    pub fn community_cards(&self) -> &[usize] {
        &self.community_cards
    }

    pub fn call_target(&self) -> Chips {
        self.call_target
    }

    pub fn last_raise(&self) -> Chips {
        self.last_raise
    }

    pub fn next_raise_threshold(&self) -> Chips {
        self.next_raise_threshold
    }

    pub fn culprits(&self) -> &[PlayerId] {
        &self.culprits
    }

    pub fn card_reprs(&self) -> &[C] {
        &self.card_reprs
    }

    /// The player whose action the hand is waiting for.
    pub fn expected_action_from(&self) -> Option<PlayerId> {
        self.expected_action_from.map(|seat| self.players[seat])
    }

    pub fn action_deadline(&self) -> Option<Timestamp> {
        self.expected_action_from.map(|_| self.action_deadline)
    }

    pub fn total_chips(&self) -> Chips {
        self.chips_in_hand.iter().sum::<Chips>() + self.invested.iter().sum::<Chips>()
    }

    pub fn num_dealings(&self) -> usize {
        self.private_dealings.len()
    }

    pub fn dealing(&self, dealing_idx: usize) -> Option<&ReencryptionSession<C>> {
        self.private_dealings.get(dealing_idx)
    }

    /// Community card indices whose opening is in progress.
    pub fn pending_openings(&self) -> Range<usize> {
        self.community_cards.len()..self.public_openings.len()
    }

    /// The point the table must multiply to open community card `community_idx`.
    pub fn opening_target(&self, community_idx: usize) -> Option<C> {
        self.pending_openings()
            .contains(&community_idx)
            .then(|| self.public_openings[community_idx].to_be_scaled())
    }

    /// Final stacks, once the hand has been settled.
    pub fn ending_chips(&self) -> Result<&[Chips], HandError> {
        if self.state != HandState::Succeeded {
            return Err(HandError::NotFinished);
        }
        Ok(&self.chips_in_hand)
    }

    pub fn snapshot(&self) -> HandSnapshot {
        HandSnapshot {
            state: self.state,
            street: self.street,
            players: self.players.clone(),
            chips_in_hand: self.chips_in_hand.clone(),
            invested: self.invested.clone(),
            action_states: self.action_states.clone(),
            community_cards: self.community_cards.clone(),
            revealed_hole_cards: self.revealed_hole_cards.clone(),
            call_target: self.call_target,
            next_raise_threshold: self.next_raise_threshold,
            expected_action_from: self.expected_action_from(),
            pots: recompute_pots(&self.invested, &self.action_states),
            culprits: self.culprits.clone(),
        }
    }

    pub fn submit_reencryption(
        &mut self,
        sender: PlayerId,
        dealing_idx: usize,
        reenc: VerifiableReencryption<C>,
        now: Timestamp,
    ) -> Result<(), HandError> {
        self.expect_state(HandState::DealingPrivateCards)?;
        let dealing = self
            .private_dealings
            .get_mut(dealing_idx)
            .ok_or(HandError::NoSuchDealing(dealing_idx))?;
        Ok(dealing.submit_reencryption(sender, reenc, now)?)
    }

    pub fn submit_dealing_contribution(
        &mut self,
        sender: PlayerId,
        dealing_idx: usize,
        contribution: VerifiableContribution<C>,
        now: Timestamp,
    ) -> Result<(), HandError> {
        self.expect_state(HandState::DealingPrivateCards)?;
        let dealing = self
            .private_dealings
            .get_mut(dealing_idx)
            .ok_or(HandError::NoSuchDealing(dealing_idx))?;
        Ok(dealing.submit_scalar_mul_contribution(sender, contribution, now)?)
    }

    pub fn submit_opening_contribution(
        &mut self,
        sender: PlayerId,
        community_idx: usize,
        contribution: VerifiableContribution<C>,
        now: Timestamp,
    ) -> Result<(), HandError> {
        self.expect_state(HandState::OpeningCommunityCards)?;
        if !self.pending_openings().contains(&community_idx) {
            return Err(HandError::NoSuchOpening(community_idx));
        }
        Ok(self.public_openings[community_idx].submit_contribution(sender, contribution, now)?)
    }

    /// Reveal one hole card before the showdown grace period ends. `blinding`
    /// must open the dealing's re-encryption key.
    pub fn process_showdown_reveal(
        &mut self,
        sender: PlayerId,
        dealing_idx: usize,
        blinding: C::ScalarField,
        now: Timestamp,
    ) -> Result<usize, HandError> {
        self.expect_state(HandState::Showdown)?;
        if now >= self.showdown_deadline {
            return Err(HandError::DeadlinePassed(self.showdown_deadline));
        }
        let seat = position_of(&self.players, sender).ok_or(HandError::NotAPlayer(sender))?;
        if dealing_idx >= self.private_dealings.len() {
            return Err(HandError::NoSuchDealing(dealing_idx));
        }
        let owner = dealing_idx / 2;
        if owner != seat {
            return Err(HandError::NotYourCard { dealing_idx, owner });
        }
        if self.action_states[seat].is_folded() {
            return Err(HandError::CannotAct(sender));
        }
        if self.revealed_hole_cards[dealing_idx].is_some() {
            return Err(HandError::AlreadyRevealed(dealing_idx));
        }

        let card = self.reveal_hole_card(dealing_idx, blinding)?;
        self.revealed_hole_cards[dealing_idx] = Some(card);
        info!(target: LOG_TARGET, sender, dealing_idx, card, "hole card revealed");
        Ok(card)
    }

    /// Read-only: the card index a recipient holds, given their blinding scalar.
    pub fn reveal_hole_card(
        &self,
        dealing_idx: usize,
        blinding: C::ScalarField,
    ) -> Result<usize, HandError> {
        let dealing = self
            .private_dealings
            .get(dealing_idx)
            .ok_or(HandError::NoSuchDealing(dealing_idx))?;
        if !dealing.verify_blinding(blinding) {
            return Err(HandError::InvalidBlinding(dealing_idx));
        }
        let element = dealing.reveal(blinding)?;
        index_of(&self.card_reprs, &element).ok_or_else(|| {
            error!(
                target: LOG_TARGET,
                dealing_idx,
                "hole card is not in the card table; the shuffle permutation argument is not verified"
            );
            HandError::CardNotInTable
        })
    }

    /// Advance every pending sub-protocol and apply deadlines.
    pub fn tick(&mut self, now: Timestamp) -> HandState {
        match self.state {
            HandState::DealingPrivateCards => self.tick_dealing(now),
            HandState::PlayerBetting => self.tick_betting(now),
            HandState::OpeningCommunityCards => self.tick_opening(now),
            HandState::Showdown => self.tick_showdown(now),
            HandState::Succeeded | HandState::Failed => {}
        }
        self.state
    }

    fn expect_state(&self, expected: HandState) -> Result<(), HandError> {
        if self.state != expected {
            return Err(HandError::WrongState(self.state));
        }
        Ok(())
    }

    fn tick_dealing(&mut self, now: Timestamp) {
        for dealing in &mut self.private_dealings {
            dealing.tick(now);
        }
        if self.private_dealings.iter().all(ReencryptionSession::succeeded) {
            info!(target: LOG_TARGET, "hole cards dealt");
            self.post_blinds(now);
        } else if self.private_dealings.iter().all(ReencryptionSession::is_terminal) {
            let culprits = collect_culprits(
                self.private_dealings
                    .iter()
                    .filter(|d| d.failed())
                    .map(ReencryptionSession::culprits),
            );
            self.fail(culprits);
        }
    }

    fn tick_betting(&mut self, now: Timestamp) {
        let Some(seat) = self.expected_action_from else {
            return;
        };
        if now >= self.action_deadline {
            warn!(target: LOG_TARGET, player = self.players[seat], "action timed out; folding");
            self.action_states[seat] = ActionState::Folded;
            self.after_action(seat, now);
        }
    }

    fn tick_opening(&mut self, now: Timestamp) {
        let pending = self.pending_openings();
        for opening in &mut self.public_openings[pending.clone()] {
            opening.tick(now);
        }

        let openings = &self.public_openings[pending.clone()];
        if openings.iter().any(ThresholdScalarMulSession::failed) {
            let culprits = collect_culprits(
                openings
                    .iter()
                    .filter(|o| o.failed())
                    .map(ThresholdScalarMulSession::culprits),
            );
            self.fail(culprits);
            return;
        }
        if !openings.iter().all(ThresholdScalarMulSession::succeeded) {
            return;
        }

        let opened: Option<Vec<usize>> = pending
            .clone()
            .map(|community_idx| {
                let ciphertext = self.shuffled_deck[self.community_deck_index(community_idx)];
                let result = self.public_openings[community_idx].result().ok()?;
                index_of(&self.card_reprs, &(ciphertext.c1 - result))
            })
            .collect();
        match opened {
            Some(cards) => {
                self.community_cards.extend(cards);
                info!(target: LOG_TARGET, cards = ?self.community_cards, "community cards opened");
                self.start_street(now);
            }
            None => {
                error!(
                    target: LOG_TARGET,
                    "community card is not in the card table; the shuffle permutation argument is not verified"
                );
                self.fail(Vec::new());
            }
        }
    }

    fn tick_showdown(&mut self, now: Timestamp) {
        if self.all_contenders_revealed() {
            info!(target: LOG_TARGET, "all hole cards revealed");
            self.calc_powers_and_distribute_chips(true);
        } else if now >= self.showdown_deadline {
            warn!(target: LOG_TARGET, "showdown grace period over; non-revealers forfeit");
            self.calc_powers_and_distribute_chips(true);
        }
    }

    /// Deck position of community card `community_idx`; hole cards occupy the first `2n`.
    fn community_deck_index(&self, community_idx: usize) -> usize {
        2 * self.players.len() + community_idx
    }

    fn open_community_cards(&mut self, count: usize, now: Timestamp) {
        let deadline = self.config.timeouts.scalar_mul_deadline(now);
        let first = self.public_openings.len();
        for community_idx in first..first + count {
            let target = self.shuffled_deck[self.community_deck_index(community_idx)].c0;
            match ThresholdScalarMulSession::new(
                target,
                self.secret_info.clone(),
                self.players.clone(),
                deadline,
            ) {
                Ok(session) => self.public_openings.push(session),
                Err(err) => {
                    error!(target: LOG_TARGET, %err, "could not start community card opening");
                    self.fail(Vec::new());
                    return;
                }
            }
        }
        self.expected_action_from = None;
        self.state = HandState::OpeningCommunityCards;
        info!(target: LOG_TARGET, count, "opening community cards");
    }

    fn enter_showdown(&mut self, now: Timestamp) {
        self.expected_action_from = None;
        self.showdown_deadline = self.config.timeouts.showdown_deadline(now);
        self.state = HandState::Showdown;
        info!(target: LOG_TARGET, deadline = self.showdown_deadline, "showdown");
    }

    fn all_contenders_revealed(&self) -> bool {
        (0..self.players.len())
            .filter(|seat| !self.action_states[*seat].is_folded())
            .all(|seat| self.has_revealed(seat))
    }

    fn has_revealed(&self, seat: Seat) -> bool {
        self.revealed_hole_cards[2 * seat].is_some() && self.revealed_hole_cards[2 * seat + 1].is_some()
    }

    fn fail(&mut self, culprits: Vec<PlayerId>) {
        self.culprits = culprits;
        self.expected_action_from = None;
        self.state = HandState::Failed;
        warn!(target: LOG_TARGET, culprits = ?self.culprits, "hand failed");
    }
}

/// Union of culprit lists, keeping first-seen order.
fn collect_culprits<'a>(lists: impl Iterator<Item = &'a [PlayerId]>) -> Vec<PlayerId> {
    let mut seen = HashSet::new();
    lists
        .flatten()
        .copied()
        .filter(|player| seen.insert(*player))
        .collect()
}
