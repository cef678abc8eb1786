//! Play one hand end to end with simulated honest clients: DKG, shuffle,
//! private dealing, betting, community cards and showdown.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use threshold_poker::config::ProtocolConfig;
use threshold_poker::dkg::{DkgContribution, SharedSecretPublicInfo};
use threshold_poker::group::{card_representations, Curve, Scalar, DECK_SIZE};
use threshold_poker::hand::{HandConfig, HandSession, HandState, Street};
use threshold_poker::reencryption::VerifiableReencryption;
use threshold_poker::registry::{Action, SessionId, SessionRegistry};
use threshold_poker::scalar_mul::VerifiableContribution;
use threshold_poker::session::{PlayerId, Timestamp};
use threshold_poker::shuffle::shuffle_and_rerandomize;

const LOG_TARGET: &str = "bin::hand_demo";
const MAX_STEPS: usize = 256;

#[derive(Debug, Parser)]
#[command(name = "hand_demo")]
#[command(about = "Simulate one threshold mental poker hand", long_about = None)]
struct Args {
    /// Number of seated players
    #[arg(long, env = "HAND_DEMO_PLAYERS", default_value_t = 3)]
    players: usize,

    /// Optional RNG seed for a reproducible run
    #[arg(long, env = "HAND_DEMO_RNG_SEED")]
    rng_seed: Option<u64>,

    /// Optional JSON file with a protocol config
    #[arg(long, env = "HAND_DEMO_CONFIG")]
    config: Option<PathBuf>,

    /// Override the small blind
    #[arg(long, env = "HAND_DEMO_SMALL_BLIND")]
    small_blind: Option<u64>,

    /// Override the big blind
    #[arg(long, env = "HAND_DEMO_BIG_BLIND")]
    big_blind: Option<u64>,

    /// Override every player's starting stack
    #[arg(long, env = "HAND_DEMO_STARTING_CHIPS")]
    starting_chips: Option<u64>,

    /// Toggle structured (JSON) logs
    #[arg(long, env = "HAND_DEMO_LOG_JSON", default_value_t = false)]
    json: bool,
}

fn main() -> Result<()> {
    load_dotenv();
    let args = Args::parse();
    init_tracing(args.json)?;
    let config = build_config(&args).context("failed to build protocol config")?;
    let mut rng = args
        .rng_seed
        .map(StdRng::seed_from_u64)
        .unwrap_or_else(StdRng::from_entropy);
    let ids: Vec<PlayerId> = (1..=args.players as u64).collect();

    let mut demo = Demo::new(config, &ids);
    demo.run(&mut rng)
}

fn load_dotenv() {
    let manifest_env = env!("CARGO_MANIFEST_DIR");
    let manifest_env_path = PathBuf::from(manifest_env).join(".env");
    dotenv::from_filename(manifest_env_path).ok();
    dotenv::dotenv().ok();
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().flatten_event(true).init();
    } else {
        builder.compact().init();
    }

    Ok(())
}

fn build_config(args: &Args) -> Result<ProtocolConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ProtocolConfig::from_json_str(&raw)?
        }
        None => ProtocolConfig::default(),
    };
    if let Some(small_blind) = args.small_blind {
        config.stakes.small_blind = small_blind;
    }
    if let Some(big_blind) = args.big_blind {
        config.stakes.big_blind = big_blind;
    }
    if let Some(chips) = args.starting_chips {
        config.starting_chips = chips;
    }
    config.validate()?;
    Ok(config)
}

/// A simulated honest player and the secrets it never publishes.
struct Client {
    id: PlayerId,
    share: Scalar,
    blindings: BTreeMap<usize, Scalar>,
}

struct Demo {
    config: ProtocolConfig,
    registry: SessionRegistry<Curve>,
    clients: Vec<Client>,
    now: Timestamp,
}

impl Demo {
    fn new(config: ProtocolConfig, ids: &[PlayerId]) -> Self {
        let clients = ids
            .iter()
            .map(|id| Client {
                id: *id,
                share: Scalar::from(0u64),
                blindings: BTreeMap::new(),
            })
            .collect();
        Self {
            config,
            registry: SessionRegistry::new(),
            clients,
            now: 0,
        }
    }

    fn ids(&self) -> Vec<PlayerId> {
        self.clients.iter().map(|c| c.id).collect()
    }

    fn advance(&mut self) -> Timestamp {
        self.now += 1;
        self.now
    }

    fn run(&mut self, rng: &mut StdRng) -> Result<()> {
        let dkg_id = self.run_dkg(rng)?;
        let info = self.registry.dkg(dkg_id)?.get_shared_secret_info()?;
        let card_reprs = card_representations::<Curve, _>(rng, DECK_SIZE);
        let shuffle_id = self.run_shuffle(dkg_id, &card_reprs, rng)?;

        let stacks = vec![self.config.starting_chips; self.clients.len()];
        let now = self.advance();
        let hand_id = self.registry.create_hand(
            dkg_id,
            shuffle_id,
            card_reprs,
            stacks,
            HandConfig::from(&self.config),
            now,
        )?;
        self.deal(hand_id, &info, rng)?;
        self.play(hand_id, &info, rng)?;

        let hand = self.registry.hand(hand_id)?;
        let snapshot = serde_json::to_string_pretty(&hand.snapshot())?;
        println!("{snapshot}");
        Ok(())
    }

    fn run_dkg(&mut self, rng: &mut StdRng) -> Result<SessionId> {
        let deadline = self.now + self.config.timeouts.scalar_mul_secs;
        let dkg_id = self.registry.create_dkg(self.ids(), deadline, rng)?;
        let base = self.registry.dkg(dkg_id)?.base_point();
        let now = self.advance();
        for client in &mut self.clients {
            let (share, contribution) = DkgContribution::generate(base, client.id, rng);
            client.share = share;
            self.registry
                .submit(dkg_id, client.id, Action::DkgContribution { contribution }, now)?;
        }
        let status = self.registry.tick(dkg_id, now)?;
        info!(target: LOG_TARGET, ?status, "key generation finished");
        Ok(dkg_id)
    }

    fn run_shuffle(&mut self, dkg_id: SessionId, card_reprs: &[Curve], rng: &mut StdRng) -> Result<SessionId> {
        let start = self.now;
        let deadlines = (1..=self.clients.len() as u64)
            .map(|k| start + k * self.config.timeouts.reencryption_secs)
            .collect();
        let shuffle_id = self
            .registry
            .create_shuffle(dkg_id, card_reprs, self.ids(), deadlines, start)?;
        for id in self.ids() {
            let now = self.advance();
            let session = self.registry.shuffle(shuffle_id)?;
            let shuffled = shuffle_and_rerandomize(session.enc_key(), session.latest_deck(), rng)?;
            self.registry
                .submit(shuffle_id, id, Action::Shuffle { deck: shuffled.deck }, now)?;
            self.registry.tick(shuffle_id, now)?;
        }
        let status = self.registry.status(shuffle_id)?;
        info!(target: LOG_TARGET, ?status, "deck shuffled by every player");
        Ok(shuffle_id)
    }

    fn deal(&mut self, hand_id: SessionId, info: &SharedSecretPublicInfo<Curve>, rng: &mut StdRng) -> Result<()> {
        let now = self.advance();
        let num_dealings = self.registry.hand(hand_id)?.num_dealings();
        for dealing_idx in 0..num_dealings {
            let dealing = self
                .registry
                .hand(hand_id)?
                .dealing(dealing_idx)
                .ok_or_else(|| anyhow!("missing dealing {dealing_idx}"))?;
            let recipient = dealing.deal_target();
            let (reenc, blinding) = VerifiableReencryption::generate(dealing.card(), info, recipient, rng);
            self.client_mut(recipient)?.blindings.insert(dealing_idx, blinding);
            self.registry
                .submit(hand_id, recipient, Action::Reencryption { dealing_idx, reenc }, now)?;
        }
        self.registry.tick(hand_id, now)?;

        let now = self.advance();
        for dealing_idx in 0..num_dealings {
            let target = self
                .registry
                .hand(hand_id)?
                .dealing(dealing_idx)
                .and_then(|d| d.scalar_mul_target())
                .ok_or_else(|| anyhow!("dealing {dealing_idx} has no scalar-mul target"))?;
            for contribution in self.contributions(target, info, rng) {
                let (sender, contribution) = contribution;
                self.registry.submit(
                    hand_id,
                    sender,
                    Action::DealingContribution {
                        dealing_idx,
                        contribution,
                    },
                    now,
                )?;
            }
        }
        let status = self.registry.tick(hand_id, now)?;
        info!(target: LOG_TARGET, ?status, "hole cards dealt");

        let hand = self.registry.hand(hand_id)?;
        for client in &self.clients {
            let cards = client
                .blindings
                .iter()
                .map(|(idx, blinding)| hand.reveal_hole_card(*idx, *blinding))
                .collect::<Result<Vec<_>, _>>()?;
            info!(target: LOG_TARGET, player = client.id, ?cards, "private hole cards");
        }
        Ok(())
    }

    fn play(&mut self, hand_id: SessionId, info: &SharedSecretPublicInfo<Curve>, rng: &mut StdRng) -> Result<()> {
        for _ in 0..MAX_STEPS {
            let now = self.advance();
            let hand = self.registry.hand(hand_id)?;
            let total = hand.total_chips();
            match hand.state() {
                HandState::PlayerBetting => {
                    let (player, amount) = scripted_action(hand, &self.config)?;
                    self.registry.submit(hand_id, player, Action::Bet { amount }, now)?;
                    let hand = self.registry.hand(hand_id)?;
                    info!(
                        target: LOG_TARGET,
                        player,
                        amount,
                        invested = ?hand.invested(),
                        "action"
                    );
                }
                HandState::OpeningCommunityCards => {
                    let targets = hand
                        .pending_openings()
                        .map(|idx| {
                            hand.opening_target(idx)
                                .map(|target| (idx, target))
                                .ok_or_else(|| anyhow!("community card {idx} is not pending"))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    for (community_idx, target) in targets {
                        for (sender, contribution) in self.contributions(target, info, rng) {
                            self.registry.submit(
                                hand_id,
                                sender,
                                Action::OpeningContribution {
                                    community_idx,
                                    contribution,
                                },
                                now,
                            )?;
                        }
                    }
                    self.registry.tick(hand_id, now)?;
                    let hand = self.registry.hand(hand_id)?;
                    info!(target: LOG_TARGET, board = ?hand.community_cards(), "community cards");
                }
                HandState::Showdown => {
                    let reveals: Vec<(PlayerId, usize, Scalar)> = self
                        .clients
                        .iter()
                        .flat_map(|c| c.blindings.iter().map(move |(idx, b)| (c.id, *idx, *b)))
                        .collect();
                    for (sender, dealing_idx, blinding) in reveals {
                        let action = Action::ShowdownReveal {
                            dealing_idx,
                            blinding,
                        };
                        if let Err(err) = self.registry.submit(hand_id, sender, action, now) {
                            warn!(target: LOG_TARGET, sender, %err, "reveal skipped");
                        }
                    }
                    self.registry.tick(hand_id, now)?;
                }
                HandState::DealingPrivateCards => {
                    self.registry.tick(hand_id, now)?;
                }
                HandState::Succeeded => {
                    let ending_chips = hand.ending_chips()?;
                    info!(target: LOG_TARGET, ?ending_chips, "hand finished");
                    return Ok(());
                }
                HandState::Failed => bail!("hand failed; culprits {:?}", hand.culprits()),
            }
            let after = self.registry.hand(hand_id)?.total_chips();
            if after != total {
                bail!("chip conservation violated: {total} before, {after} after");
            }
        }
        bail!("hand did not finish within {MAX_STEPS} steps")
    }

    /// Every client's contribution toward `share·target`.
    fn contributions(
        &self,
        target: Curve,
        info: &SharedSecretPublicInfo<Curve>,
        rng: &mut StdRng,
    ) -> Vec<(PlayerId, VerifiableContribution<Curve>)> {
        self.clients
            .iter()
            .zip(&info.ek_shares)
            .map(|(client, share_key)| {
                let contribution = VerifiableContribution::generate(target, share_key, client.share, client.id, rng);
                (client.id, contribution)
            })
            .collect()
    }

    fn client_mut(&mut self, id: PlayerId) -> Result<&mut Client> {
        self.clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| anyhow!("unknown player {id}"))
    }
}

/// Seat 0 folds preflop, seat 1 min-raises, everyone else calls or checks.
fn scripted_action(hand: &HandSession<Curve>, config: &ProtocolConfig) -> Result<(PlayerId, u64)> {
    let player = hand
        .expected_action_from()
        .ok_or_else(|| anyhow!("betting without an expected player"))?;
    let seat = hand
        .players()
        .iter()
        .position(|p| *p == player)
        .ok_or_else(|| anyhow!("unknown player {player}"))?;
    let available = hand.invested()[seat] + hand.chips_in_hand()[seat];
    let preflop = hand.street() == Street::Preflop;

    let amount = if preflop && seat == 0 {
        0
    } else if preflop && seat == 1 && hand.call_target() == config.stakes.big_blind {
        hand.next_raise_threshold()
    } else {
        hand.call_target()
    };
    Ok((player, amount.min(available)))
}
