//! Pot construction and payout.

use super::{ActionState, Chips, HandSession, HandState, Pot, Seat, LOG_TARGET};
use ark_ec::CurveGroup;
use tracing::info;

/// Split total investments into a main pot and side pots.
///
/// Each distinct investment level opens a pot funded by every seat that
/// reached it; folded seats fund pots but are never eligible to win them.
pub fn recompute_pots(invested: &[Chips], states: &[ActionState]) -> Vec<Pot> {
    let mut levels: Vec<Chips> = invested.iter().copied().filter(|c| *c > 0).collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots = Vec::with_capacity(levels.len());
    let mut prev = 0;
    for level in levels {
        let contributors: Vec<Seat> = (0..invested.len())
            .filter(|seat| invested[*seat] >= level)
            .collect();
        let eligible = contributors
            .iter()
            .copied()
            .filter(|seat| !states[*seat].is_folded())
            .collect();
        pots.push(Pot {
            amount: (level - prev) * contributors.len() as Chips,
            eligible,
            contributors,
        });
        prev = level;
    }
    pots
}

/// Stand-in hand strength: earlier seats beat later ones.
///
/// Real hand ranking is not implemented; this only has to be a total order so
/// that payouts are deterministic.
pub fn placeholder_power(seat: Seat, num_players: usize) -> u64 {
    (num_players - seat) as u64
}

impl<C: CurveGroup> HandSession<C> {
    /// Pay out every pot and finish the hand.
    ///
    /// At showdown only players who revealed both hole cards can win; a pot
    /// nobody can win is returned to the seats that funded it.
    pub(super) fn calc_powers_and_distribute_chips(&mut self, at_showdown: bool) {
        let n = self.players.len();
        let contenders: Vec<bool> = (0..n)
            .map(|seat| !self.action_states[seat].is_folded() && (!at_showdown || self.has_revealed(seat)))
            .collect();

        for pot in recompute_pots(&self.invested, &self.action_states) {
            let winner = pot
                .eligible
                .iter()
                .copied()
                .filter(|seat| contenders[*seat])
                .max_by_key(|seat| placeholder_power(*seat, n));
            match winner {
                Some(seat) => self.chips_in_hand[seat] += pot.amount,
                None => {
                    let share = pot.amount / pot.contributors.len() as Chips;
                    for seat in &pot.contributors {
                        self.chips_in_hand[*seat] += share;
                    }
                }
            }
        }
        self.invested.iter_mut().for_each(|c| *c = 0);

        self.expected_action_from = None;
        self.state = HandState::Succeeded;
        info!(target: LOG_TARGET, ending_chips = ?self.chips_in_hand, "hand settled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_pots_follow_investment_levels() {
        use ActionState::*;
        let pots = recompute_pots(&[100, 300, 300, 50], &[AllIn, Called, Raised, Folded]);
        assert_eq!(
            pots,
            vec![
                Pot {
                    amount: 200,
                    eligible: vec![0, 1, 2],
                    contributors: vec![0, 1, 2, 3],
                },
                Pot {
                    amount: 150,
                    eligible: vec![0, 1, 2],
                    contributors: vec![0, 1, 2],
                },
                Pot {
                    amount: 400,
                    eligible: vec![1, 2],
                    contributors: vec![1, 2],
                },
            ]
        );
        let total: Chips = pots.iter().map(|p| p.amount).sum();
        assert_eq!(total, 750);
    }

    #[test]
    fn no_investment_means_no_pots() {
        assert!(recompute_pots(&[0, 0], &[ActionState::Active, ActionState::Active]).is_empty());
    }

    #[test]
    fn placeholder_power_prefers_earlier_seats() {
        assert!(placeholder_power(0, 3) > placeholder_power(2, 3));
    }
}
