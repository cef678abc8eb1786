//! Private dealing of one card to one recipient.
//!
//! The recipient picks a blinding scalar `u` and publishes
//! `new_ek = (B, u·B)` together with `new_ciph = (B, c0 + u·B, c1)`. The table
//! then runs a threshold scalar multiplication on `new_ciph.c0`, giving
//! `s·(r + u)·B`. Only the holder of `u` can strip `u·(s·B)` from that and
//! recover the card; everyone else would have to solve CDH.

use crate::dkg::SharedSecretPublicInfo;
use crate::elgamal::{Ciphertext, EncKey};
use crate::scalar_mul::{ScalarMulError, ScalarMulState, ThresholdScalarMulSession, VerifiableContribution};
use crate::session::{PlayerId, Timestamp};
use crate::sigma::DlogProof;
use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

const LOG_TARGET: &str = "threshold_poker::reencryption";
pub(crate) const BLINDING_DOMAIN: &str = "reencryption/blinding_v1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReencryptionError {
    #[error("re-encryption deadline must come strictly before the scalar-mul deadline")]
    DeadlinesOutOfOrder,
    #[error("card and shared key use different base points")]
    WrongBase,
    #[error("scalar-mul party does not match the {0} key shares")]
    PartyMismatch(usize),
    #[error("player {0} is not the recipient of this card")]
    NotRecipient(PlayerId),
    #[error("re-encryption was already submitted")]
    AlreadySubmitted,
    #[error("session is not accepting a re-encryption")]
    NotAcceptingReencryption,
    #[error("re-encryption deadline {0} has passed")]
    DeadlinePassed(Timestamp),
    #[error("re-encrypted ciphertext is not derived from the dealt card")]
    InvalidReencryption,
    #[error("proof of knowledge of the blinding scalar does not verify")]
    InvalidProof,
    #[error("scalar multiplication has not started")]
    NotInScalarMul,
    #[error(transparent)]
    ScalarMul(#[from] ScalarMulError),
    #[error("session has not succeeded")]
    NotSucceeded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReencryptionState {
    AcceptingReenc,
    ScalarMulInProgress,
    Succeeded,
    Failed,
}

/// The recipient's re-encryption of a dealt card, with a proof that it knows the blinding scalar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct VerifiableReencryption<C: CurveGroup> {
    pub new_ciph: Ciphertext<C>,
    pub new_ek: EncKey<C>,
    pub proof: DlogProof<C>,
}

impl<C: CurveGroup> VerifiableReencryption<C> {
    /// Client side: blind `card` for `recipient`. Returns the submission and the blinding scalar.
    #[instrument(target = LOG_TARGET, skip_all, fields(recipient = recipient), level = "trace")]
    pub fn generate<R: Rng>(
        card: &Ciphertext<C>,
        secret_info: &SharedSecretPublicInfo<C>,
        recipient: PlayerId,
        rng: &mut R,
    ) -> (Self, C::ScalarField) {
        let base = secret_info.base();
        let blinding = C::ScalarField::rand(rng);
        let new_ek = EncKey::from_secret(base, blinding);
        let new_ciph = Ciphertext::new(base, card.c0 + new_ek.public_point, card.c1);
        let proof = DlogProof::prove(BLINDING_DOMAIN, &recipient.to_be_bytes(), blinding, base, rng);
        (
            Self {
                new_ciph,
                new_ek,
                proof,
            },
            blinding,
        )
    }

    pub fn verify(&self, card: &Ciphertext<C>, recipient: PlayerId) -> Result<(), ReencryptionError> {
        let base = card.base;
        let derived = self.new_ciph.base == base
            && self.new_ek.base == base
            && self.new_ciph.c1 == card.c1
            && self.new_ciph.c0 - card.c0 == self.new_ek.public_point;
        if !derived {
            return Err(ReencryptionError::InvalidReencryption);
        }
        if !self
            .proof
            .verify(BLINDING_DOMAIN, &recipient.to_be_bytes(), base, self.new_ek.public_point)
        {
            return Err(ReencryptionError::InvalidProof);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct ReencryptionSession<C: CurveGroup> {
    card: Ciphertext<C>,
    deal_target: PlayerId,
    scalar_mul_party: Vec<PlayerId>,
    secret_info: SharedSecretPublicInfo<C>,
    reenc_deadline: Timestamp,
    scalar_mul_deadline: Timestamp,
    state: ReencryptionState,
    reenc: Option<VerifiableReencryption<C>>,
    scalar_mul: Option<ThresholdScalarMulSession<C>>,
    culprits: Vec<PlayerId>,
}

impl<C: CurveGroup> ReencryptionSession<C> {
    #[instrument(target = LOG_TARGET, skip(card, secret_info))]
    pub fn new(
        card: Ciphertext<C>,
        deal_target: PlayerId,
        scalar_mul_party: Vec<PlayerId>,
        secret_info: SharedSecretPublicInfo<C>,
        reenc_deadline: Timestamp,
        scalar_mul_deadline: Timestamp,
    ) -> Result<Self, ReencryptionError> {
        if reenc_deadline >= scalar_mul_deadline {
            return Err(ReencryptionError::DeadlinesOutOfOrder);
        }
        if card.base != secret_info.base() {
            return Err(ReencryptionError::WrongBase);
        }
        if scalar_mul_party.is_empty() || scalar_mul_party.len() != secret_info.num_shares() {
            return Err(ReencryptionError::PartyMismatch(secret_info.num_shares()));
        }
        Ok(Self {
            card,
            deal_target,
            scalar_mul_party,
            secret_info,
            reenc_deadline,
            scalar_mul_deadline,
            state: ReencryptionState::AcceptingReenc,
            reenc: None,
            scalar_mul: None,
            culprits: Vec::new(),
        })
    }

    pub fn card(&self) -> &Ciphertext<C> {
        &self.card
    }

    pub fn deal_target(&self) -> PlayerId {
        self.deal_target
    }

    pub fn state(&self) -> ReencryptionState {
        self.state
    }

    pub fn succeeded(&self) -> bool {
        self.state == ReencryptionState::Succeeded
    }

    pub fn failed(&self) -> bool {
        self.state == ReencryptionState::Failed
    }

    pub fn is_terminal(&self) -> bool {
        self.succeeded() || self.failed()
    }

    pub fn culprits(&self) -> &[PlayerId] {
        &self.culprits
    }

    pub fn reencryption(&self) -> Option<&VerifiableReencryption<C>> {
        self.reenc.as_ref()
    }

    pub fn scalar_mul(&self) -> Option<&ThresholdScalarMulSession<C>> {
        self.scalar_mul.as_ref()
    }

    /// The point the scalar-mul party must multiply, once the recipient has re-encrypted.
    pub fn scalar_mul_target(&self) -> Option<C> {
        self.reenc.as_ref().map(|r| r.new_ciph.c0)
    }

    pub fn submit_reencryption(
        &mut self,
        sender: PlayerId,
        reenc: VerifiableReencryption<C>,
        now: Timestamp,
    ) -> Result<(), ReencryptionError> {
        if self.state != ReencryptionState::AcceptingReenc {
            return Err(ReencryptionError::NotAcceptingReencryption);
        }
        if sender != self.deal_target {
            return Err(ReencryptionError::NotRecipient(sender));
        }
        if self.reenc.is_some() {
            return Err(ReencryptionError::AlreadySubmitted);
        }
        if now >= self.reenc_deadline {
            warn!(target: LOG_TARGET, sender, deadline = self.reenc_deadline, "late re-encryption rejected");
            return Err(ReencryptionError::DeadlinePassed(self.reenc_deadline));
        }
        if let Err(err) = reenc.verify(&self.card, sender) {
            warn!(target: LOG_TARGET, sender, %err, "rejecting re-encryption");
            return Err(err);
        }
        self.reenc = Some(reenc);
        tracing::debug!(target: LOG_TARGET, sender, "re-encryption accepted");
        Ok(())
    }

    /// Forward a contribution to the nested scalar multiplication.
    pub fn submit_scalar_mul_contribution(
        &mut self,
        sender: PlayerId,
        contribution: VerifiableContribution<C>,
        now: Timestamp,
    ) -> Result<(), ReencryptionError> {
        let session = self
            .scalar_mul
            .as_mut()
            .ok_or(ReencryptionError::NotInScalarMul)?;
        Ok(session.submit_contribution(sender, contribution, now)?)
    }

    pub fn tick(&mut self, now: Timestamp) -> ReencryptionState {
        if self.state == ReencryptionState::AcceptingReenc {
            match &self.reenc {
                Some(reenc) => {
                    match ThresholdScalarMulSession::new(
                        reenc.new_ciph.c0,
                        self.secret_info.clone(),
                        self.scalar_mul_party.clone(),
                        self.scalar_mul_deadline,
                    ) {
                        Ok(session) => {
                            self.scalar_mul = Some(session);
                            self.state = ReencryptionState::ScalarMulInProgress;
                            tracing::debug!(target: LOG_TARGET, recipient = self.deal_target, "scalar mul started");
                        }
                        Err(err) => {
                            error!(target: LOG_TARGET, %err, "could not start scalar mul");
                            self.state = ReencryptionState::Failed;
                            return self.state;
                        }
                    }
                }
                None if now >= self.reenc_deadline => {
                    self.culprits = vec![self.deal_target];
                    self.state = ReencryptionState::Failed;
                    warn!(target: LOG_TARGET, culprit = self.deal_target, "recipient never re-encrypted");
                    return self.state;
                }
                None => return self.state,
            }
        }

        if self.state == ReencryptionState::ScalarMulInProgress {
            if let Some(session) = self.scalar_mul.as_mut() {
                match session.tick(now) {
                    ScalarMulState::Succeeded => {
                        self.state = ReencryptionState::Succeeded;
                        info!(target: LOG_TARGET, recipient = self.deal_target, "card dealt");
                    }
                    ScalarMulState::Failed => {
                        self.culprits = session.culprits().to_vec();
                        self.state = ReencryptionState::Failed;
                        warn!(target: LOG_TARGET, culprits = ?self.culprits, "dealing failed");
                    }
                    ScalarMulState::Accepting => {}
                }
            }
        }
        self.state
    }

    /// Does `blinding` open this session's published `new_ek`?
    pub fn verify_blinding(&self, blinding: C::ScalarField) -> bool {
        self.reenc
            .as_ref()
            .is_some_and(|r| r.new_ek.base * blinding == r.new_ek.public_point)
    }

    /// Recover the dealt card's plaintext element: `c1 − (result − u·agg_pk)`.
    pub fn reveal(&self, blinding: C::ScalarField) -> Result<C, ReencryptionError> {
        if !self.succeeded() {
            return Err(ReencryptionError::NotSucceeded);
        }
        let session = self.scalar_mul.as_ref().ok_or(ReencryptionError::NotSucceeded)?;
        let reenc = self.reenc.as_ref().ok_or(ReencryptionError::NotSucceeded)?;
        let result = session.result()?;
        let unblinded = result - self.secret_info.agg_ek.public_point * blinding;
        Ok(reenc.new_ciph.c1 - unblinded)
    }
}
