pub mod codec;
pub mod config;
pub mod crypto_serde;
pub mod dkg;
pub mod elgamal;
pub mod group;
pub mod hand;
pub mod reencryption;
pub mod registry;
pub mod scalar_mul;
pub mod session;
pub mod shuffle;
pub mod sigma;
pub mod transcript;

#[cfg(test)]
pub mod test_utils;

pub use config::ProtocolConfig;
pub use group::{Curve, Scalar};
pub use session::{PlayerId, Slot, Timestamp};
