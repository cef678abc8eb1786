//! Threshold scalar multiplication: compute `secret·target` for the DKG's
//! shared secret without anyone reconstructing it.
//!
//! Each contributor posts `share_i·target` with a Chaum-Pedersen proof that the
//! same `share_i` sits behind their public key share. With n-of-n additive
//! sharing the combination is the plain sum of payloads.

use crate::dkg::SharedSecretPublicInfo;
use crate::elgamal::EncKey;
use crate::session::{position_of, PlayerId, Slot, Timestamp};
use crate::sigma::DleqProof;
use ark_ec::CurveGroup;
use ark_std::rand::Rng;
use ark_std::Zero;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument, warn};

const LOG_TARGET: &str = "threshold_poker::scalar_mul";
pub(crate) const CONTRIBUTION_DOMAIN: &str = "scalar_mul/contribution_v1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScalarMulError {
    #[error("contributor roster does not match the {0} key shares")]
    RosterMismatch(usize),
    #[error("player {0} is not an allowed contributor")]
    NotAllowedContributor(PlayerId),
    #[error("player {0} already contributed")]
    AlreadyContributed(PlayerId),
    #[error("session is no longer accepting contributions")]
    NotAccepting,
    #[error("contribution deadline {0} has passed")]
    DeadlinePassed(Timestamp),
    #[error("DLEQ proof from player {0} does not verify")]
    InvalidProof(PlayerId),
    #[error("session has not succeeded")]
    NotSucceeded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarMulState {
    Accepting,
    Succeeded,
    Failed,
}

/// `payload = share·target`, with a proof tying `share` to the contributor's key share.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct VerifiableContribution<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::canonical")]
    pub payload: C,
    pub proof: DleqProof<C>,
}

impl<C: CurveGroup> VerifiableContribution<C> {
    /// Client side. `share_key` must be `EncKey::from_secret(base, secret)`.
    #[instrument(target = LOG_TARGET, skip_all, level = "trace")]
    pub fn generate<R: Rng>(
        target: C,
        share_key: &EncKey<C>,
        secret: C::ScalarField,
        contributor: PlayerId,
        rng: &mut R,
    ) -> Self {
        let proof = DleqProof::prove(
            CONTRIBUTION_DOMAIN,
            &contributor.to_be_bytes(),
            secret,
            share_key.base,
            target,
            rng,
        );
        Self {
            payload: target * secret,
            proof,
        }
    }

    pub fn verify(&self, target: C, share_key: &EncKey<C>, contributor: PlayerId) -> bool {
        self.proof.verify(
            CONTRIBUTION_DOMAIN,
            &contributor.to_be_bytes(),
            share_key.base,
            target,
            share_key.public_point,
            self.payload,
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct ThresholdScalarMulSession<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::canonical")]
    to_be_scaled: C,
    secret_info: SharedSecretPublicInfo<C>,
    allowed_contributors: Vec<PlayerId>,
    contributions: Vec<Slot<VerifiableContribution<C>>>,
    deadline: Timestamp,
    state: ScalarMulState,
    #[serde(with = "crate::crypto_serde::canonical")]
    result: C,
    culprits: Vec<PlayerId>,
}

impl<C: CurveGroup> ThresholdScalarMulSession<C> {
    /// `allowed_contributors[i]` holds the secret behind `secret_info.ek_shares[i]`.
    #[instrument(target = LOG_TARGET, skip(to_be_scaled, secret_info))]
    pub fn new(
        to_be_scaled: C,
        secret_info: SharedSecretPublicInfo<C>,
        allowed_contributors: Vec<PlayerId>,
        deadline: Timestamp,
    ) -> Result<Self, ScalarMulError> {
        if allowed_contributors.is_empty() || allowed_contributors.len() != secret_info.num_shares() {
            return Err(ScalarMulError::RosterMismatch(secret_info.num_shares()));
        }
        let n = allowed_contributors.len();
        tracing::debug!(target: LOG_TARGET, contributors = n, deadline, "scalar mul session created");
        Ok(Self {
            to_be_scaled,
            secret_info,
            allowed_contributors,
            contributions: vec![Slot::Empty; n],
            deadline,
            state: ScalarMulState::Accepting,
            result: C::zero(),
            culprits: Vec::new(),
        })
    }

    pub fn to_be_scaled(&self) -> C {
        self.to_be_scaled
    }

    pub fn state(&self) -> ScalarMulState {
        self.state
    }

    pub fn succeeded(&self) -> bool {
        self.state == ScalarMulState::Succeeded
    }

    pub fn failed(&self) -> bool {
        self.state == ScalarMulState::Failed
    }

    pub fn culprits(&self) -> &[PlayerId] {
        &self.culprits
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    pub fn allowed_contributors(&self) -> &[PlayerId] {
        &self.allowed_contributors
    }

    pub fn has_contributed(&self, player: PlayerId) -> bool {
        position_of(&self.allowed_contributors, player)
            .is_some_and(|idx| self.contributions[idx].is_filled())
    }

    /// `secret·to_be_scaled`; valid only once the session has succeeded.
    pub fn result(&self) -> Result<C, ScalarMulError> {
        if !self.succeeded() {
            return Err(ScalarMulError::NotSucceeded);
        }
        Ok(self.result)
    }

    pub fn submit_contribution(
        &mut self,
        sender: PlayerId,
        contribution: VerifiableContribution<C>,
        now: Timestamp,
    ) -> Result<(), ScalarMulError> {
        if self.state != ScalarMulState::Accepting {
            return Err(ScalarMulError::NotAccepting);
        }
        if now >= self.deadline {
            return Err(ScalarMulError::DeadlinePassed(self.deadline));
        }
        let idx = position_of(&self.allowed_contributors, sender)
            .ok_or(ScalarMulError::NotAllowedContributor(sender))?;
        if self.contributions[idx].is_filled() {
            return Err(ScalarMulError::AlreadyContributed(sender));
        }
        let share_key = &self.secret_info.ek_shares[idx];
        if !contribution.verify(self.to_be_scaled, share_key, sender) {
            warn!(target: LOG_TARGET, sender, "rejecting scalar mul contribution with bad proof");
            return Err(ScalarMulError::InvalidProof(sender));
        }

        self.contributions[idx]
            .fill(contribution)
            .map_err(|_| ScalarMulError::AlreadyContributed(sender))?;
        tracing::debug!(target: LOG_TARGET, sender, "scalar mul contribution accepted");
        Ok(())
    }

    pub fn tick(&mut self, now: Timestamp) -> ScalarMulState {
        if self.state != ScalarMulState::Accepting {
            return self.state;
        }

        if self.contributions.iter().all(Slot::is_filled) {
            self.result = self
                .contributions
                .iter()
                .filter_map(Slot::get)
                .fold(C::zero(), |acc, c| acc + c.payload);
            self.state = ScalarMulState::Succeeded;
            tracing::debug!(target: LOG_TARGET, "scalar mul succeeded");
        } else if now >= self.deadline {
            self.culprits = self
                .allowed_contributors
                .iter()
                .zip(&self.contributions)
                .filter(|(_, slot)| !slot.is_filled())
                .map(|(player, _)| *player)
                .collect();
            self.state = ScalarMulState::Failed;
            info!(target: LOG_TARGET, culprits = ?self.culprits, "scalar mul timed out");
        }
        self.state
    }
}
