//! Peg Casino headless runner
//!
//! Plays seeded sessions of Plinko, Crash or Mines against an in-memory
//! balance and reports the return to player.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rand::seq::SliceRandom;
use serde::Serialize;

use peg_casino::consts::*;
use peg_casino::driver::Driver;
use peg_casino::games::mines::GRID_SIZE;
use peg_casino::games::{CrashGame, MinesGame, Reveal};
use peg_casino::sim::RngState;
use peg_casino::{
    GameConfig, GameError, GameSession, InMemoryBalance, Multiplier, PayoutLedger, RiskLevel,
    RoundId, format_amount, parse_amount,
};

/// Hard stop for a Plinko run, in ticks (about 4.6 hours of game time)
const MAX_RUN_TICKS: u64 = 1_000_000;

#[derive(Parser)]
#[command(name = "peg-casino")]
#[command(about = "Headless Plinko, Crash and Mines simulator", long_about = None)]
struct Cli {
    /// RNG seed
    #[arg(short, long, default_value_t = 1, global = true)]
    seed: u64,

    /// Starting balance
    #[arg(short, long, default_value_t = 1_000.0, global = true)]
    balance: f64,

    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON lines instead of a text summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop balls on a Plinko board
    Plinko {
        /// Balls to drop
        #[arg(short = 'n', long, default_value_t = 100)]
        balls: u32,

        /// Wager per ball
        #[arg(short, long, default_value_t = 1.0)]
        wager: f64,

        /// Risk level (low, medium, high)
        #[arg(short, long)]
        risk: Option<RiskLevel>,

        /// Pocket count
        #[arg(short, long)]
        pockets: Option<usize>,

        /// Ticks between drops
        #[arg(short, long, default_value_t = 6)]
        interval: u64,
    },

    /// Play Crash rounds
    Crash {
        #[arg(short = 'n', long, default_value_t = 100)]
        rounds: u32,

        #[arg(short, long, default_value_t = 1.0)]
        wager: f64,

        /// Auto cash-out multiplier
        #[arg(short, long, default_value_t = 2.0)]
        auto: f64,
    },

    /// Play Mines rounds, revealing random tiles
    Mines {
        #[arg(short = 'n', long, default_value_t = 100)]
        rounds: u32,

        #[arg(short, long, default_value_t = 1.0)]
        wager: f64,

        /// Mines on the board
        #[arg(short, long, default_value_t = 3)]
        mines: usize,

        /// Safe reveals to attempt before cashing out
        #[arg(short = 'k', long, default_value_t = 2)]
        picks: usize,
    },
}

/// End-of-run report
#[derive(Debug, Serialize)]
struct Summary {
    game: &'static str,
    rounds: u64,
    wagered: u64,
    paid: u64,
    rtp: f64,
    balance: u64,
    /// Plinko only: landings per pocket
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pockets: Vec<u64>,
    best: Option<Multiplier>,
}

impl Summary {
    fn print(&self, json: bool) {
        if json {
            match serde_json::to_string(self) {
                Ok(line) => println!("{line}"),
                Err(e) => log::error!("Failed to encode summary: {}", e),
            }
            return;
        }
        println!("{} summary", self.game);
        println!("  rounds:   {}", self.rounds);
        println!("  wagered:  {}", format_amount(self.wagered));
        println!("  paid:     {}", format_amount(self.paid));
        println!("  RTP:      {:.2}%", self.rtp * 100.0);
        println!("  balance:  {}", format_amount(self.balance));
        if let Some(best) = self.best {
            println!("  best win: {best}");
        }
        if !self.pockets.is_empty() {
            let max = self.pockets.iter().copied().max().unwrap_or(1).max(1);
            for (i, count) in self.pockets.iter().enumerate() {
                let bar = "#".repeat((count * 40 / max) as usize);
                println!("  {i:>2} {count:>6} {bar}");
            }
        }
    }
}

fn rtp(wagered: u64, paid: u64) -> f64 {
    if wagered == 0 {
        0.0
    } else {
        paid as f64 / wagered as f64
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<GameConfig, GameError> {
    Ok(match path {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    })
}

fn run_plinko(
    cli: &Cli,
    balls: u32,
    wager: f64,
    risk: Option<RiskLevel>,
    pockets: Option<usize>,
    interval: u64,
) -> Result<Summary, GameError> {
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(risk) = risk {
        config.risk = risk;
    }
    if let Some(pockets) = pockets {
        config.pockets = pockets;
    }
    let wager = parse_amount(wager)?;
    let balance = parse_amount(cli.balance)?;
    let session = GameSession::new(config, InMemoryBalance::new(balance), cli.seed)?;
    log::info!(
        "Plinko: {} balls of {} on {}/{} pockets, table {}",
        balls,
        format_amount(wager),
        session.risk(),
        session.board().pocket_count,
        session
            .table()
            .as_slice()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    );

    let mut driver = Driver::new(session);
    let mut histogram = vec![0u64; driver.session.board().pocket_count];
    let mut remaining = balls;
    let mut settled = 0u64;
    let interval = interval.max(1);

    while remaining > 0 || driver.session.any_in_flight() {
        let tick = driver.session.tick_count();
        if tick >= MAX_RUN_TICKS {
            log::warn!("Stopping after {} ticks with balls still in flight", tick);
            break;
        }
        if remaining > 0 && tick % interval == 0 {
            driver.queue_drop(wager);
            remaining -= 1;
        }
        for report in driver.frame(SIM_DT) {
            for result in &report.dropped {
                if let Err(e) = result {
                    log::warn!("Drop rejected ({}), ending run", e);
                    remaining = 0;
                }
            }
            for result in &report.settled {
                if let Some(slot) = histogram.get_mut(result.pocket) {
                    *slot += 1;
                }
                settled += 1;
            }
            if cli.json {
                for event in &report.events {
                    match serde_json::to_string(event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => log::error!("Failed to encode event: {}", e),
                    }
                }
            }
        }
    }

    driver.session.close();
    let ledger = driver.session.ledger();
    Ok(Summary {
        game: "plinko",
        rounds: settled,
        wagered: ledger.total_debited(),
        paid: ledger.total_credited(),
        rtp: rtp(ledger.total_debited(), ledger.total_credited()),
        balance: ledger.balance(),
        pockets: histogram,
        best: driver.session.history().best(),
    })
}

fn run_crash(cli: &Cli, rounds: u32, wager: f64, auto: f64) -> Result<Summary, GameError> {
    let config = load_config(cli.config.as_ref())?;
    let wager = parse_amount(wager)?;
    let auto = Multiplier((auto * 100.0).floor().max(0.0) as u32);
    let mut ledger = PayoutLedger::with_journal_len(
        InMemoryBalance::new(parse_amount(cli.balance)?),
        config.journal_len,
    );
    let mut rng = RngState::new(cli.seed).to_rng();
    let mut game = CrashGame::new(config.crash, RoundId(1));
    let mut played = 0u64;
    let mut best: Option<Multiplier> = None;

    for _ in 0..rounds {
        match game.start(wager, Some(auto), &mut ledger, &mut rng) {
            Ok(_) => {}
            Err(e @ GameError::InsufficientFunds { .. }) => {
                log::warn!("Bet rejected ({}), ending run", e);
                break;
            }
            Err(e) => return Err(e),
        }
        // Crash points are capped, so every round ends
        while game.tick(SIM_DT, &mut ledger)?.is_none() {}
        if let Some(outcome) = game.round().outcome() {
            if outcome.payout > 0 {
                best = best.max(outcome.multiplier);
            }
        }
        log::debug!("crash at {:?}, current {}", game.crash_point(), game.current());
        game.reset()?;
        played += 1;
    }

    Ok(Summary {
        game: "crash",
        rounds: played,
        wagered: ledger.total_debited(),
        paid: ledger.total_credited(),
        rtp: rtp(ledger.total_debited(), ledger.total_credited()),
        balance: ledger.balance(),
        pockets: Vec::new(),
        best,
    })
}

fn run_mines(cli: &Cli, rounds: u32, wager: f64, mines: usize, picks: usize) -> Result<Summary, GameError> {
    let config = load_config(cli.config.as_ref())?;
    let wager = parse_amount(wager)?;
    let mut ledger = PayoutLedger::with_journal_len(
        InMemoryBalance::new(parse_amount(cli.balance)?),
        config.journal_len,
    );
    let mut rng = RngState::new(cli.seed).to_rng();
    let mut game = MinesGame::new(config.mines, RoundId(1));
    let mut tiles: Vec<usize> = (0..GRID_SIZE).collect();
    let mut played = 0u64;
    let mut best: Option<Multiplier> = None;

    for _ in 0..rounds {
        match game.start(wager, mines, &mut ledger, &mut rng) {
            Ok(_) => {}
            Err(e @ GameError::InsufficientFunds { .. }) => {
                log::warn!("Bet rejected ({}), ending run", e);
                break;
            }
            Err(e) => return Err(e),
        }
        tiles.shuffle(&mut rng);
        let mut finished = false;
        for &tile in tiles.iter().take(picks.max(1)) {
            match game.reveal(tile, &mut ledger)? {
                Reveal::Safe { .. } => {}
                Reveal::Mine(_) | Reveal::Cleared(_) => {
                    finished = true;
                    break;
                }
            }
        }
        if !finished {
            game.cash_out(&mut ledger)?;
        }
        if let Some(outcome) = game.round().outcome() {
            if outcome.payout > 0 {
                best = best.max(outcome.multiplier);
            }
        }
        game.reset()?;
        played += 1;
    }

    Ok(Summary {
        game: "mines",
        rounds: played,
        wagered: ledger.total_debited(),
        paid: ledger.total_credited(),
        rtp: rtp(ledger.total_debited(), ledger.total_credited()),
        balance: ledger.balance(),
        pockets: Vec::new(),
        best,
    })
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();
    log::info!("Peg Casino (native) starting, seed {}", cli.seed);

    let result = match &cli.command {
        Commands::Plinko {
            balls,
            wager,
            risk,
            pockets,
            interval,
        } => run_plinko(&cli, *balls, *wager, *risk, *pockets, *interval),
        Commands::Crash { rounds, wager, auto } => run_crash(&cli, *rounds, *wager, *auto),
        Commands::Mines {
            rounds,
            wager,
            mines,
            picks,
        } => run_mines(&cli, *rounds, *wager, *mines, *picks),
    };

    match result {
        Ok(summary) => {
            summary.print(cli.json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Library-only on the web; hosts drive `GameSession` directly
}
