use super::types::Seat;
use crate::reencryption::ReencryptionError;
use crate::scalar_mul::ScalarMulError;
use crate::session::{PlayerId, Timestamp};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandError {
    #[error("a hand needs between 2 and {max} players, got {got}")]
    InvalidPlayerCount { got: usize, max: usize },
    #[error("player {0} is seated twice")]
    DuplicatePlayer(PlayerId),
    #[error("expected {expected} stacks, got {got}")]
    StackCountMismatch { expected: usize, got: usize },
    #[error("player {0} has no chips to play with")]
    EmptyStack(PlayerId),
    #[error("card table and deck must both hold 52 entries")]
    InvalidDeck,
    #[error("shared key has {shares} shares for {players} players")]
    KeyShareMismatch { shares: usize, players: usize },
    #[error("player {0} is not seated at this hand")]
    NotAPlayer(PlayerId),
    #[error("operation not allowed while the hand is {0:?}")]
    WrongState(super::types::HandState),
    #[error("it is not player {0}'s turn")]
    NotYourTurn(PlayerId),
    #[error("deadline {0} has passed")]
    DeadlinePassed(Timestamp),
    #[error("player {0} has folded or is all-in")]
    CannotAct(PlayerId),
    #[error("player {player} cannot invest {amount}, has {available} available")]
    InsufficientChips {
        player: PlayerId,
        amount: u64,
        available: u64,
    },
    #[error("no private dealing with index {0}")]
    NoSuchDealing(usize),
    #[error("community card {0} is not being opened")]
    NoSuchOpening(usize),
    #[error("dealing {dealing_idx} belongs to seat {owner}")]
    NotYourCard { dealing_idx: usize, owner: Seat },
    #[error("dealing {0} was already revealed")]
    AlreadyRevealed(usize),
    #[error("blinding scalar does not open dealing {0}")]
    InvalidBlinding(usize),
    #[error("decrypted card is not in the card table")]
    CardNotInTable,
    #[error("hand has not finished")]
    NotFinished,
    #[error(transparent)]
    Dealing(#[from] ReencryptionError),
    #[error(transparent)]
    Opening(#[from] ScalarMulError),
}
