//! n-of-n distributed key generation.
//!
//! Every expected contributor independently draws a secret `x_i` and posts
//! `base·x_i` with a proof of possession. The aggregate key is
//! `Σ base·x_i = base·Σx_i`; nobody ever learns `Σx_i`.

use crate::elgamal::EncKey;
use crate::group::random_element;
use crate::session::{position_of, PlayerId, Slot, Timestamp};
use crate::sigma::DlogProof;
use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_std::rand::Rng;
use ark_std::Zero;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, instrument, warn};

const LOG_TARGET: &str = "threshold_poker::dkg";
pub(crate) const POSSESSION_DOMAIN: &str = "dkg/proof_of_possession_v1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DkgError {
    #[error("a DKG needs at least one contributor")]
    NoContributors,
    #[error("contributor {0} appears more than once")]
    DuplicateContributor(PlayerId),
    #[error("player {0} is not an expected contributor")]
    NotExpectedContributor(PlayerId),
    #[error("player {0} already contributed")]
    AlreadyContributed(PlayerId),
    #[error("session is no longer accepting contributions")]
    NotInProgress,
    #[error("contribution deadline {0} has passed")]
    DeadlinePassed(Timestamp),
    #[error("proof of possession from player {0} does not verify")]
    InvalidProof(PlayerId),
    #[error("session has not succeeded")]
    NotSucceeded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DkgState {
    InProgress,
    Succeeded,
    TimedOut,
}

/// One contributor's public share plus a Schnorr proof that they know its secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct DkgContribution<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::canonical")]
    pub public_point: C,
    pub proof: DlogProof<C>,
}

impl<C: CurveGroup> DkgContribution<C> {
    /// Client side: draw a secret share and build the matching contribution.
    pub fn generate<R: Rng>(base: C, contributor: PlayerId, rng: &mut R) -> (C::ScalarField, Self) {
        let secret = C::ScalarField::rand(rng);
        let proof = DlogProof::prove(POSSESSION_DOMAIN, &contributor.to_be_bytes(), secret, base, rng);
        (
            secret,
            Self {
                public_point: base * secret,
                proof,
            },
        )
    }

    pub fn verify(&self, base: C, contributor: PlayerId) -> bool {
        self.proof.verify(
            POSSESSION_DOMAIN,
            &contributor.to_be_bytes(),
            base,
            self.public_point,
        )
    }
}

/// Public output of a successful DKG: the aggregate key and one key per contributor,
/// all sharing the same base point and ordered like the DKG's contributors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct SharedSecretPublicInfo<C: CurveGroup> {
    pub agg_ek: EncKey<C>,
    pub ek_shares: Vec<EncKey<C>>,
}

impl<C: CurveGroup> SharedSecretPublicInfo<C> {
    pub fn base(&self) -> C {
        self.agg_ek.base
    }

    pub fn num_shares(&self) -> usize {
        self.ek_shares.len()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct DkgSession<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::canonical")]
    base_point: C,
    expected_contributors: Vec<PlayerId>,
    contributions: Vec<Slot<DkgContribution<C>>>,
    num_remaining: usize,
    deadline: Timestamp,
    state: DkgState,
    #[serde(with = "crate::crypto_serde::canonical")]
    aggregate_public_point: C,
    culprits: Vec<PlayerId>,
}

impl<C: CurveGroup> DkgSession<C> {
    #[instrument(target = LOG_TARGET, skip(rng))]
    pub fn new<R: Rng>(
        expected_contributors: Vec<PlayerId>,
        deadline: Timestamp,
        rng: &mut R,
    ) -> Result<Self, DkgError> {
        if expected_contributors.is_empty() {
            return Err(DkgError::NoContributors);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = expected_contributors.iter().find(|p| !seen.insert(**p)) {
            return Err(DkgError::DuplicateContributor(*dup));
        }

        let n = expected_contributors.len();
        info!(target: LOG_TARGET, contributors = n, deadline, "dkg session created");
        Ok(Self {
            base_point: random_element::<C, R>(rng),
            expected_contributors,
            contributions: vec![Slot::Empty; n],
            num_remaining: n,
            deadline,
            state: DkgState::InProgress,
            aggregate_public_point: C::zero(),
            culprits: Vec::new(),
        })
    }

    pub fn base_point(&self) -> C {
        self.base_point
    }

    pub fn expected_contributors(&self) -> &[PlayerId] {
        &self.expected_contributors
    }

    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    pub fn state(&self) -> DkgState {
        self.state
    }

    pub fn succeeded(&self) -> bool {
        self.state == DkgState::Succeeded
    }

    pub fn failed(&self) -> bool {
        self.state == DkgState::TimedOut
    }

    pub fn culprits(&self) -> &[PlayerId] {
        &self.culprits
    }

    pub fn contribution(&self, contributor_idx: usize) -> Option<&DkgContribution<C>> {
        self.contributions.get(contributor_idx).and_then(Slot::get)
    }

    /// Valid only once the session has succeeded.
    pub fn aggregate_public_point(&self) -> Option<C> {
        self.succeeded().then_some(self.aggregate_public_point)
    }

    pub fn submit_contribution(
        &mut self,
        sender: PlayerId,
        contribution: DkgContribution<C>,
        now: Timestamp,
    ) -> Result<(), DkgError> {
        if self.state != DkgState::InProgress {
            return Err(DkgError::NotInProgress);
        }
        if now >= self.deadline {
            return Err(DkgError::DeadlinePassed(self.deadline));
        }
        let idx = position_of(&self.expected_contributors, sender)
            .ok_or(DkgError::NotExpectedContributor(sender))?;
        if self.contributions[idx].is_filled() {
            return Err(DkgError::AlreadyContributed(sender));
        }
        if !contribution.verify(self.base_point, sender) {
            warn!(target: LOG_TARGET, sender, "rejecting dkg contribution with bad proof");
            return Err(DkgError::InvalidProof(sender));
        }

        self.contributions[idx]
            .fill(contribution)
            .map_err(|_| DkgError::AlreadyContributed(sender))?;
        self.num_remaining -= 1;
        tracing::debug!(target: LOG_TARGET, sender, remaining = self.num_remaining, "dkg contribution accepted");
        Ok(())
    }

    /// Advance the session: aggregate once every slot is filled, or time out.
    pub fn tick(&mut self, now: Timestamp) -> DkgState {
        if self.state != DkgState::InProgress {
            return self.state;
        }

        if self.num_remaining == 0 {
            self.aggregate_public_point = self
                .contributions
                .iter()
                .filter_map(Slot::get)
                .fold(C::zero(), |acc, c| acc + c.public_point);
            self.state = DkgState::Succeeded;
            info!(target: LOG_TARGET, "dkg succeeded");
        } else if now >= self.deadline {
            self.culprits = self
                .expected_contributors
                .iter()
                .zip(&self.contributions)
                .filter(|(_, slot)| !slot.is_filled())
                .map(|(player, _)| *player)
                .collect();
            self.state = DkgState::TimedOut;
            warn!(target: LOG_TARGET, culprits = ?self.culprits, "dkg timed out");
        }
        self.state
    }

    pub fn get_shared_secret_info(&self) -> Result<SharedSecretPublicInfo<C>, DkgError> {
        if !self.succeeded() {
            return Err(DkgError::NotSucceeded);
        }
        let ek_shares = self
            .contributions
            .iter()
            .filter_map(Slot::get)
            .map(|c| EncKey::new(self.base_point, c.public_point))
            .collect();
        Ok(SharedSecretPublicInfo {
            agg_ek: EncKey::new(self.base_point, self.aggregate_public_point),
            ek_shares,
        })
    }
}

/// Sum additive secret shares. Only used by tests and by parties that legitimately hold every share.
pub fn reconstruct_secret<F: ark_ff::PrimeField>(shares: &[F]) -> F {
    shares.iter().fold(F::zero(), |acc, s| acc + s)
}
