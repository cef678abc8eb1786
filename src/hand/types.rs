use crate::session::PlayerId;
use serde::{Deserialize, Serialize};

pub type Chips = u64;

/// Index of a player in the hand's seating order.
pub type Seat = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Street {
    /// Community cards that must be open before betting on this street.
    pub fn open_cards(self) -> usize {
        match self {
            Street::Preflop => 0,
            Street::Flop => 3,
            Street::Turn => 4,
            Street::River => 5,
        }
    }

    pub fn next(self) -> Option<Street> {
        match self {
            Street::Preflop => Some(Street::Flop),
            Street::Flop => Some(Street::Turn),
            Street::Turn => Some(Street::River),
            Street::River => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Active,
    Folded,
    Checked,
    Called,
    Bet,
    Raised,
    AllIn,
}

impl ActionState {
    /// Can this player still put chips in?
    pub fn can_act(self) -> bool {
        !matches!(self, ActionState::Folded | ActionState::AllIn)
    }

    pub fn is_folded(self) -> bool {
        self == ActionState::Folded
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandState {
    DealingPrivateCards,
    PlayerBetting,
    OpeningCommunityCards,
    Showdown,
    Succeeded,
    Failed,
}

impl HandState {
    pub fn is_terminal(self) -> bool {
        matches!(self, HandState::Succeeded | HandState::Failed)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStakes {
    pub small_blind: Chips,
    pub big_blind: Chips,
}

impl Default for TableStakes {
    fn default() -> Self {
        Self {
            small_blind: 125,
            big_blind: 250,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub amount: Chips,
    /// Seats that can win this pot.
    pub eligible: Vec<Seat>,
    /// Seats that paid into it, for refunds when nobody is eligible.
    pub contributors: Vec<Seat>,
}

/// How a betting action was interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetOutcome {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
    AllIn,
}

/// Serializable public view of a hand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandSnapshot {
    pub state: HandState,
    pub street: Street,
    pub players: Vec<PlayerId>,
    pub chips_in_hand: Vec<Chips>,
    pub invested: Vec<Chips>,
    pub action_states: Vec<ActionState>,
    pub community_cards: Vec<usize>,
    pub revealed_hole_cards: Vec<Option<usize>>,
    pub call_target: Chips,
    pub next_raise_threshold: Chips,
    pub expected_action_from: Option<PlayerId>,
    pub pots: Vec<Pot>,
    pub culprits: Vec<PlayerId>,
}
