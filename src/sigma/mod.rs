//! Sigma protocols made non-interactive with a Fiat–Shamir [`Transcript`](crate::transcript::Transcript).

pub mod dleq;
pub mod dlog;

pub use dleq::DleqProof;
pub use dlog::DlogProof;
