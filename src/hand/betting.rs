//! Blinds, action validation and betting-round flow.

use super::{ActionState, BetOutcome, Chips, HandError, HandSession, HandState, Seat, Street, LOG_TARGET};
use crate::session::{position_of, PlayerId, Timestamp};
use ark_ec::CurveGroup;
use tracing::{debug, info, instrument};

impl<C: CurveGroup> HandSession<C> {
    /// Act on the hand. `amount` is the sender's total investment in the hand after the action.
    /// Actions at or after the action deadline are rejected; the next `tick` folds the player.
    ///
    /// All-in when `amount` equals everything the player has; a raise or bet when it reaches
    /// `next_raise_threshold`; a check or call when it equals `call_target`; a fold otherwise.
    #[instrument(target = LOG_TARGET, skip(self))]
    pub fn process_bet_action(
        &mut self,
        sender: PlayerId,
        amount: Chips,
        now: Timestamp,
    ) -> Result<BetOutcome, HandError> {
        self.expect_state(HandState::PlayerBetting)?;
        let seat = position_of(&self.players, sender).ok_or(HandError::NotAPlayer(sender))?;
        if self.expected_action_from != Some(seat) {
            return Err(HandError::NotYourTurn(sender));
        }
        if now >= self.action_deadline {
            return Err(HandError::DeadlinePassed(self.action_deadline));
        }
        if !self.action_states[seat].can_act() {
            return Err(HandError::CannotAct(sender));
        }
        let available = self.invested[seat] + self.chips_in_hand[seat];
        if amount > available {
            return Err(HandError::InsufficientChips {
                player: sender,
                amount,
                available,
            });
        }

        let outcome = self.classify(seat, amount, available);
        self.apply(seat, amount, outcome);
        debug!(
            target: LOG_TARGET,
            sender,
            amount,
            ?outcome,
            call_target = self.call_target,
            next_raise_threshold = self.next_raise_threshold,
            "bet action"
        );
        self.after_action(seat, now);
        Ok(outcome)
    }

    fn classify(&self, seat: Seat, amount: Chips, available: Chips) -> BetOutcome {
        if amount == available {
            BetOutcome::AllIn
        } else if amount >= self.next_raise_threshold {
            if self.bet_this_street {
                BetOutcome::Raise
            } else {
                BetOutcome::Bet
            }
        } else if amount == self.call_target {
            if amount == self.invested[seat] {
                BetOutcome::Check
            } else {
                BetOutcome::Call
            }
        } else {
            BetOutcome::Fold
        }
    }

    fn apply(&mut self, seat: Seat, amount: Chips, outcome: BetOutcome) {
        match outcome {
            BetOutcome::Fold => {
                self.action_states[seat] = ActionState::Folded;
                return;
            }
            BetOutcome::Check => {
                self.action_states[seat] = ActionState::Checked;
                return;
            }
            _ => {}
        }

        self.move_to_pot(seat, amount);
        match outcome {
            BetOutcome::Call => self.action_states[seat] = ActionState::Called,
            BetOutcome::Bet | BetOutcome::Raise => {
                self.action_states[seat] = if outcome == BetOutcome::Bet {
                    ActionState::Bet
                } else {
                    ActionState::Raised
                };
                self.full_raise(seat, amount);
            }
            BetOutcome::AllIn => {
                self.action_states[seat] = ActionState::AllIn;
                if amount >= self.next_raise_threshold {
                    self.full_raise(seat, amount);
                } else if amount > self.call_target {
                    // Short all-in: others must match it but the raise size is unchanged.
                    self.call_target = amount;
                }
            }
            BetOutcome::Fold | BetOutcome::Check => {}
        }
    }

    fn full_raise(&mut self, raiser: Seat, amount: Chips) {
        for (seat, state) in self.action_states.iter_mut().enumerate() {
            if seat != raiser && state.can_act() {
                *state = ActionState::Active;
            }
        }
        self.call_target = amount;
        self.next_raise_threshold = amount.saturating_mul(2).saturating_sub(self.last_raise);
        self.last_raise = amount;
        self.bet_this_street = true;
    }

    /// Raise `seat`'s total investment to `amount`.
    fn move_to_pot(&mut self, seat: Seat, amount: Chips) {
        let delta = amount.saturating_sub(self.invested[seat]);
        self.chips_in_hand[seat] -= delta;
        self.invested[seat] += delta;
    }

    fn post_blind(&mut self, seat: Seat, blind: Chips) {
        let paid = blind.min(self.chips_in_hand[seat]);
        self.move_to_pot(seat, self.invested[seat] + paid);
        if self.chips_in_hand[seat] == 0 {
            self.action_states[seat] = ActionState::AllIn;
        }
    }

    /// Seat 0 holds the button, so the blinds sit at seats 1 and 2 (mod n). Heads-up
    /// this puts the small blind on seat 1 and the big blind on the button.
    pub(super) fn post_blinds(&mut self, now: Timestamp) {
        let n = self.players.len();
        let (small_blind_seat, big_blind_seat) = (1 % n, 2 % n);
        let stakes = self.config.stakes.clone();
        self.post_blind(small_blind_seat, stakes.small_blind);
        self.post_blind(big_blind_seat, stakes.big_blind);

        self.street = Street::Preflop;
        self.call_target = stakes.big_blind;
        self.last_raise = stakes.big_blind;
        self.next_raise_threshold = stakes.big_blind.saturating_mul(2);
        self.bet_this_street = true;
        self.state = HandState::PlayerBetting;
        info!(
            target: LOG_TARGET,
            small_blind = self.players[small_blind_seat],
            big_blind = self.players[big_blind_seat],
            "blinds posted"
        );

        self.continue_round(big_blind_seat + 1, now);
    }

    /// Reset per-street betting state after community cards were opened.
    pub(super) fn start_street(&mut self, now: Timestamp) {
        self.street = match self.community_cards.len() {
            0 => Street::Preflop,
            3 => Street::Flop,
            4 => Street::Turn,
            _ => Street::River,
        };
        for state in &mut self.action_states {
            if state.can_act() {
                *state = ActionState::Active;
            }
        }
        self.last_raise = self.call_target;
        self.next_raise_threshold = self.call_target.saturating_add(self.config.stakes.big_blind);
        self.bet_this_street = false;

        let can_act = self.action_states.iter().filter(|s| s.can_act()).count();
        if can_act < 2 {
            debug!(target: LOG_TARGET, street = ?self.street, "nobody left to bet against; skipping round");
            self.close_betting_round(now);
            return;
        }
        self.state = HandState::PlayerBetting;
        info!(target: LOG_TARGET, street = ?self.street, "betting round opened");
        // The button sits at seat 0, so post-flop action starts at seat 1.
        self.continue_round(1, now);
    }

    pub(super) fn after_action(&mut self, seat: Seat, now: Timestamp) {
        let unfolded = self.action_states.iter().filter(|s| !s.is_folded()).count();
        if unfolded <= 1 {
            info!(target: LOG_TARGET, "everyone else folded");
            self.calc_powers_and_distribute_chips(false);
            return;
        }
        self.continue_round(seat + 1, now);
    }

    fn continue_round(&mut self, from: Seat, now: Timestamp) {
        match self.next_to_act(from) {
            Some(next) => {
                self.expected_action_from = Some(next);
                self.action_deadline = self.config.timeouts.action_deadline(now);
            }
            None => self.close_betting_round(now),
        }
    }

    fn needs_to_act(&self, seat: Seat) -> bool {
        let state = self.action_states[seat];
        state.can_act() && (state == ActionState::Active || self.invested[seat] < self.call_target)
    }

    /// First seat at or after `from`, in seating order, that still owes an action.
    fn next_to_act(&self, from: Seat) -> Option<Seat> {
        let n = self.players.len();
        (0..n).map(|k| (from + k) % n).find(|seat| self.needs_to_act(*seat))
    }

    fn close_betting_round(&mut self, now: Timestamp) {
        self.expected_action_from = None;
        match self.street.next() {
            Some(next) => self.open_community_cards(next.open_cards() - self.community_cards.len(), now),
            None => self.enter_showdown(now),
        }
    }
}
