//! Common test utilities: serde assertions and honest-party protocol drivers.

/// Helpers shared across test modules.
pub mod serde {
    use std::fmt::Debug;

    /// Assert that a value survives a serde_json round-trip using structural equality.
    pub fn assert_round_trip_eq<T>(value: &T)
    where
        T: ::serde::Serialize + ::serde::de::DeserializeOwned + PartialEq + Debug,
    {
        let json = serde_json::to_string(value)
            .expect("serialization should succeed during round-trip testing");
        let restored: T = serde_json::from_str(&json)
            .expect("deserialization should succeed during round-trip testing");
        assert_eq!(restored, *value, "serde_json round-trip altered the value");
    }
}

/// Drive sub-protocols with every party behaving honestly.
pub mod protocol {
    use crate::dkg::{DkgContribution, DkgSession, DkgState, SharedSecretPublicInfo};
    use crate::elgamal::Ciphertext;
    use crate::group::{card_representations, Curve, Scalar, DECK_SIZE};
    use crate::hand::{HandConfig, HandSession};
    use crate::reencryption::VerifiableReencryption;
    use crate::scalar_mul::VerifiableContribution;
    use crate::session::{PlayerId, Timestamp};
    use crate::shuffle::{shuffle_and_rerandomize, ShuffleSession, ShuffleState};
    use ark_std::rand::Rng;

    pub struct DkgOutput {
        pub players: Vec<PlayerId>,
        pub info: SharedSecretPublicInfo<Curve>,
        /// `secrets[i]` is the share behind `info.ek_shares[i]`.
        pub secrets: Vec<Scalar>,
    }

    pub fn run_dkg<R: Rng>(players: &[PlayerId], rng: &mut R) -> DkgOutput {
        let mut session = DkgSession::<Curve>::new(players.to_vec(), 100, rng).expect("valid roster");
        let base = session.base_point();
        let secrets = players
            .iter()
            .map(|player| {
                let (secret, contribution) = DkgContribution::generate(base, *player, rng);
                session
                    .submit_contribution(*player, contribution, 0)
                    .expect("honest contribution");
                secret
            })
            .collect();
        assert_eq!(session.tick(0), DkgState::Succeeded);
        DkgOutput {
            players: players.to_vec(),
            info: session.get_shared_secret_info().expect("dkg succeeded"),
            secrets,
        }
    }

    /// Card table plus a deck shuffled once by every player.
    pub struct Table {
        pub dkg: DkgOutput,
        pub card_reprs: Vec<Curve>,
        pub deck: Vec<Ciphertext<Curve>>,
    }

    pub fn shuffled_table<R: Rng>(players: &[PlayerId], rng: &mut R) -> Table {
        let dkg = run_dkg(players, rng);
        let card_reprs = card_representations::<Curve, _>(rng, DECK_SIZE);
        let base = dkg.info.base();
        let initial = card_reprs.iter().map(|m| Ciphertext::trivial(base, *m)).collect();
        let deadlines = (1..=players.len() as u64).map(|k| 10 * k).collect();
        let mut session =
            ShuffleSession::new(dkg.info.agg_ek, initial, players.to_vec(), deadlines, 0).expect("valid shuffle");
        for player in players {
            let shuffled =
                shuffle_and_rerandomize(&dkg.info.agg_ek, session.latest_deck(), rng).expect("well-formed deck");
            session
                .submit_contribution(*player, shuffled.deck, 0)
                .expect("in-turn shuffle");
            session.tick(0);
        }
        assert_eq!(session.state(), ShuffleState::Succeeded);
        let deck = session.result().expect("shuffle succeeded").to_vec();
        Table {
            dkg,
            card_reprs,
            deck,
        }
    }

    pub fn new_hand(table: &Table, stacks: Vec<u64>, config: HandConfig, now: Timestamp) -> HandSession<Curve> {
        HandSession::new(
            table.dkg.players.clone(),
            stacks,
            table.card_reprs.clone(),
            table.deck.clone(),
            table.dkg.info.clone(),
            config,
            now,
        )
        .expect("valid hand")
    }

    /// Re-encrypt every hole card for its recipient and run the nested
    /// scalar multiplications. Returns the blinding scalar per dealing index.
    pub fn deal_hole_cards<R: Rng>(
        hand: &mut HandSession<Curve>,
        dkg: &DkgOutput,
        now: Timestamp,
        rng: &mut R,
    ) -> Vec<Scalar> {
        let blindings: Vec<Scalar> = (0..hand.num_dealings())
            .map(|dealing_idx| {
                let dealing = hand.dealing(dealing_idx).expect("dealing exists");
                let recipient = dealing.deal_target();
                let (reenc, blinding) =
                    VerifiableReencryption::generate(dealing.card(), &dkg.info, recipient, rng);
                hand.submit_reencryption(recipient, dealing_idx, reenc, now)
                    .expect("honest re-encryption");
                blinding
            })
            .collect();
        hand.tick(now);

        for dealing_idx in 0..hand.num_dealings() {
            let target = hand
                .dealing(dealing_idx)
                .and_then(|d| d.scalar_mul_target())
                .expect("re-encryption accepted");
            for (i, player) in dkg.players.iter().enumerate() {
                let contribution =
                    VerifiableContribution::generate(target, &dkg.info.ek_shares[i], dkg.secrets[i], *player, rng);
                hand.submit_dealing_contribution(*player, dealing_idx, contribution, now)
                    .expect("honest contribution");
            }
        }
        hand.tick(now);
        blindings
    }

    /// Every player contributes to every pending community card opening, then the hand is ticked.
    pub fn open_pending_cards<R: Rng>(
        hand: &mut HandSession<Curve>,
        dkg: &DkgOutput,
        now: Timestamp,
        rng: &mut R,
    ) {
        for community_idx in hand.pending_openings() {
            let target = hand.opening_target(community_idx).expect("opening pending");
            for (i, player) in dkg.players.iter().enumerate() {
                let contribution =
                    VerifiableContribution::generate(target, &dkg.info.ek_shares[i], dkg.secrets[i], *player, rng);
                hand.submit_opening_contribution(*player, community_idx, contribution, now)
                    .expect("honest contribution");
            }
        }
        hand.tick(now);
    }
}
