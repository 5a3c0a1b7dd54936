//! crime-runner: headless, seeded crime simulation.
//!
//! Usage:
//!   crime-runner --seed 12345 --rounds 50 --actors 8 --db run.db
//!   crime-runner --seed 12345 --config engine.json --data-dir ./data
//!   crime-runner --seed 12345 --ipc-mode        (JSON lines on stdin/stdout)

use anyhow::Result;
use crime_core::{
    clock::{Clock, ManualClock},
    collaborator::{Presenter, ReleaseNotifier},
    command::AdminCommand,
    config::{EngineConfig, RANDOM_CRIME_KEY},
    engine::{CrimeEngine, EngineDeps},
    error::{CrimeError, CrimeResult, ErrorKind},
    leaderboard::LeaderboardSection,
    outcome::{BailQuote, CrimeChoice, JailbreakAttempt, JailbreakOutcome, JailbreakResolution, ResolutionResult},
    resolution_subsystem::AttemptRequest,
    rng::{RandomSource, StreamRng},
    scenario_registry::ScenarioRegistry,
    scheduler::{ManualScheduler, Scheduler},
    store::SqliteStore,
    types::{ActorId, ChannelRef, GroupId, MemberKey},
};
use std::{
    env,
    io::{self, BufRead, Write},
    path::Path,
    sync::Arc,
};

const GROUP: GroupId = 1;
const CHANNEL: ChannelRef = 7;
const START_TIME: i64 = 1_700_000_000;
const STARTING_BALANCE: i64 = 2_000;
const ROUND_SECS: i64 = 600;
/// Stream index for the runner's own choices, clear of the engine's slots.
const RUNNER_STREAM: u64 = 0x5155;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Attempt {
        actor:  ActorId,
        crime:  String,
        target: Option<ActorId>,
    },
    Random {
        actor: ActorId,
    },
    Bail {
        actor: ActorId,
    },
    Jailbreak {
        actor: ActorId,
    },
    Status {
        actor: ActorId,
    },
    Notify {
        actor:   ActorId,
        enabled: bool,
    },
    Admin {
        command: AdminCommand,
    },
    Advance {
        secs: i64,
    },
    Leaderboard,
    Quit,
}

// ── Console collaborators ──────────────────────────────────────────

struct ConsolePresenter {
    quiet: bool,
}

fn render(template: &str, actor: ActorId, amount: i64, fine: i64, currency: &str) -> String {
    template
        .replace("{user}", &format!("actor {actor}"))
        .replace("{amount}", &amount.to_string())
        .replace("{fine}", &fine.to_string())
        .replace("{currency}", currency)
}

impl Presenter for ConsolePresenter {
    fn resolution(&self, member: MemberKey, r: &ResolutionResult) {
        if self.quiet {
            return;
        }
        for event in &r.events {
            println!("    · {}", event.text);
        }
        match &r.scenario {
            Some(s) => {
                let template = if r.success { &s.success_text } else { &s.fail_text };
                println!("  {}", render(template, member.actor, r.amount, r.fine, &r.currency_name));
            }
            None if r.success => println!(
                "  actor {} pulled off {} for {} {} (streak {})",
                member.actor, r.crime, r.amount, r.currency_name, r.streak
            ),
            None => println!(
                "  actor {} failed {}: fined {} {}, jailed {}s",
                member.actor, r.crime, r.fine, r.currency_name, r.jail_time
            ),
        }
    }

    fn jailbreak_attempt(&self, member: MemberKey, attempt: &JailbreakAttempt) {
        if self.quiet {
            return;
        }
        println!("  {}", render(&attempt.scenario.attempt_text, member.actor, 0, 0, &attempt.currency_name));
        for event in &attempt.events {
            println!("    · {}", event.text);
        }
    }

    fn jailbreak_outcome(&self, member: MemberKey, outcome: &JailbreakOutcome) {
        if self.quiet {
            return;
        }
        match outcome.resolution {
            JailbreakResolution::Escaped => println!("  actor {} escaped", member.actor),
            JailbreakResolution::Extended { added_secs, new_remaining } => println!(
                "  actor {} caught: +{added_secs}s, {new_remaining}s left",
                member.actor
            ),
            JailbreakResolution::AlreadyFree => {
                println!("  actor {} was already free", member.actor)
            }
        }
    }

    fn bail_quote(&self, member: MemberKey, quote: &BailQuote) {
        if self.quiet {
            return;
        }
        println!(
            "  actor {} bail: {} {} for {}s (balance {})",
            member.actor, quote.cost, quote.currency_name, quote.remaining_secs, quote.balance
        );
    }
}

struct ConsoleNotifier;

impl ReleaseNotifier for ConsoleNotifier {
    fn notify_release(&self, member: MemberKey, channel: Option<ChannelRef>) -> CrimeResult<()> {
        match channel {
            Some(channel) => println!("  [#{channel}] actor {} is free", member.actor),
            None => println!("  [dm] actor {} is free", member.actor),
        }
        Ok(())
    }
}

// ── Main ───────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let rounds = parse_arg(&args, "--rounds", 30u64);
    let actors = parse_arg(&args, "--actors", 6u64).max(2);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let quiet = args.iter().any(|a| a == "--quiet");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");

    let config = match string_arg(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let registry = match string_arg(&args, "--data-dir") {
        Some(dir) => ScenarioRegistry::load(Path::new(dir))?,
        None => ScenarioRegistry::builtin()?,
    };

    if !ipc_mode {
        println!("Crime desk — crime-runner");
        println!("  seed:      {seed}");
        println!("  rounds:    {rounds}");
        println!("  actors:    {actors}");
        println!("  db:        {db}");
        println!();
    }

    let store = Arc::new(if db == ":memory:" {
        SqliteStore::in_memory()?
    } else {
        SqliteStore::open(db)?
    });
    let clock = Arc::new(ManualClock::new(START_TIME));
    let scheduler = Arc::new(ManualScheduler::new(clock.clone()));
    let deps = EngineDeps::with_sqlite(
        store.clone(),
        Arc::new(ConsolePresenter { quiet: quiet || ipc_mode }),
        Arc::new(ConsoleNotifier),
        scheduler.clone() as Arc<dyn Scheduler>,
        clock.clone(),
    );
    let engine = CrimeEngine::new(config, registry, seed, deps)?;

    for actor in 1..=actors {
        store.set_balance(MemberKey::new(GROUP, actor), STARTING_BALANCE)?;
    }

    let sim = Sim { engine, clock, scheduler };
    if ipc_mode {
        run_ipc_loop(&sim)?;
    } else {
        let tally = sim.run(seed, rounds, actors)?;
        print_summary(&sim, &tally, actors)?;
    }
    Ok(())
}

struct Sim {
    engine:    CrimeEngine,
    clock:     Arc<ManualClock>,
    scheduler: Arc<ManualScheduler>,
}

#[derive(Default)]
struct Tally {
    attempts:    u64,
    successes:   u64,
    bails:       u64,
    jailbreaks:  u64,
    escapes:     u64,
    rejected:    u64,
    notified:    usize,
}

impl Sim {
    fn advance(&self, secs: i64) -> usize {
        self.clock.advance(secs);
        self.scheduler.run_due()
    }

    fn run(&self, seed: u64, rounds: u64, actors: u64) -> Result<Tally> {
        let mut rng = StreamRng::new(seed, RUNNER_STREAM).with_name("runner");
        let mut tally = Tally::default();

        for round in 1..=rounds {
            log::debug!("round {round} at {}", self.clock.now());
            for actor in 1..=actors {
                let member = MemberKey::new(GROUP, actor);
                if let Err(e) = self.act(member, actors, &mut rng, &mut tally) {
                    match e.kind() {
                        ErrorKind::Internal => return Err(e.into()),
                        _ => {
                            log::debug!("actor {actor}: {e}");
                            tally.rejected += 1;
                        }
                    }
                }
            }
            tally.notified += self.advance(ROUND_SECS);
        }
        Ok(tally)
    }

    fn act(
        &self,
        member: MemberKey,
        actors: u64,
        rng: &mut StreamRng,
        tally: &mut Tally,
    ) -> CrimeResult<()> {
        let status = self.engine.status(member)?;
        if status.jailed {
            let quote = self.engine.quote_bail(member)?;
            if quote.can_afford && rng.chance(0.5) {
                self.engine.pay_bail(member)?;
                tally.bails += 1;
            } else if !status.attempted_jailbreak {
                tally.jailbreaks += 1;
                if self.engine.attempt_jailbreak(member)?.escaped() {
                    tally.escapes += 1;
                }
            }
            return Ok(());
        }

        let settings = self.engine.settings(member.group)?;
        let mut choices: Vec<&str> = settings
            .crime_options
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(name, _)| name.as_str())
            .collect();
        if settings.random_enabled {
            choices.push(RANDOM_CRIME_KEY);
        }
        if choices.is_empty() {
            return Ok(());
        }

        let pick = choices[rng.pick_index(choices.len())];
        let (choice, target) = if pick == RANDOM_CRIME_KEY {
            (CrimeChoice::Random, None)
        } else {
            let needs_target = settings
                .crime_options
                .get(pick)
                .map(|c| c.target_required)
                .unwrap_or(false);
            let target = needs_target.then(|| {
                let offset = 1 + rng.next_u64_below(actors - 1);
                (member.actor - 1 + offset) % actors + 1
            });
            (CrimeChoice::named(pick), target)
        };

        tally.attempts += 1;
        let result = self.engine.attempt_crime(AttemptRequest {
            member,
            choice,
            target,
            channel: Some(CHANNEL),
        })?;
        if result.success {
            tally.successes += 1;
        }
        Ok(())
    }
}

fn run_ipc_loop(sim: &Sim) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut buffer = String::new();
    let mut handle = stdin.lock();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let reply = match handle_command(sim, cmd) {
            Ok(value) => value,
            Err(e) if e.kind() != ErrorKind::Internal => {
                serde_json::json!({ "error": e.to_string(), "kind": format!("{:?}", e.kind()) })
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(sim: &Sim, cmd: IpcCommand) -> CrimeResult<serde_json::Value> {
    let engine = &sim.engine;
    let member = |actor| MemberKey::new(GROUP, actor);
    let value = match cmd {
        IpcCommand::Attempt { actor, crime, target } => {
            let result = engine.attempt_crime(AttemptRequest {
                member:  member(actor),
                choice:  CrimeChoice::Named(crime),
                target,
                channel: Some(CHANNEL),
            })?;
            serde_json::to_value(result)?
        }
        IpcCommand::Random { actor } => {
            let result = engine.attempt_crime(AttemptRequest {
                member:  member(actor),
                choice:  CrimeChoice::Random,
                target:  None,
                channel: Some(CHANNEL),
            })?;
            serde_json::to_value(result)?
        }
        IpcCommand::Bail { actor } => {
            serde_json::json!({ "paid": engine.pay_bail(member(actor))? })
        }
        IpcCommand::Jailbreak { actor } => serde_json::to_value(engine.attempt_jailbreak(member(actor))?)?,
        IpcCommand::Status { actor } => serde_json::to_value(engine.status(member(actor))?)?,
        IpcCommand::Notify { actor, enabled } => {
            engine.set_notify_on_release(member(actor), enabled)?;
            serde_json::json!({ "notify_on_release": enabled })
        }
        IpcCommand::Admin { command } => {
            engine.apply_admin(GROUP, &command)?;
            serde_json::json!({ "applied": command.name() })
        }
        IpcCommand::Advance { secs } => {
            let fired = sim.advance(secs);
            serde_json::json!({ "now": sim.clock.now(), "notifications": fired })
        }
        IpcCommand::Leaderboard => serde_json::to_value(engine.leaderboard(GROUP)?)?,
        IpcCommand::Quit => {
            return Err(CrimeError::Other(anyhow::anyhow!("quit is handled by the loop")))
        }
    };
    Ok(value)
}

fn print_summary(sim: &Sim, tally: &Tally, actors: u64) -> Result<()> {
    let currency = "credits";
    println!();
    println!("=== RUN SUMMARY ===");
    println!("  simulated secs: {}", sim.clock.now() - START_TIME);
    println!("  attempts:       {}", tally.attempts);
    println!("  successes:      {}", tally.successes);
    println!("  rejected:       {}", tally.rejected);
    println!("  bails paid:     {}", tally.bails);
    println!("  jailbreaks:     {} ({} escaped)", tally.jailbreaks, tally.escapes);
    println!("  notifications:  {}", tally.notified);

    println!();
    println!("=== BALANCES ===");
    for actor in 1..=actors {
        let member = MemberKey::new(GROUP, actor);
        let status = sim.engine.status(member)?;
        println!(
            "  actor {actor:>3}: {:>7} {currency} | streak {:>2} | {}",
            sim.engine.balance(member)?,
            status.current_streak,
            if status.jailed { format!("jailed {}s", status.remaining_secs) } else { "free".to_string() }
        );
    }

    println!();
    println!("=== LEADERBOARD ===");
    for section in sim.engine.leaderboard(GROUP)? {
        print_section(&section);
    }
    Ok(())
}

fn print_section(section: &LeaderboardSection) {
    println!("  {}:", section.category.as_str());
    if section.entries.is_empty() {
        println!("    (nobody yet)");
    }
    for (rank, entry) in section.entries.iter().enumerate() {
        let parts: Vec<String> = entry.parts.iter().map(|p| p.to_string()).collect();
        println!("    {}. actor {} • {}", rank + 1, entry.actor, parts.join(" / "));
    }
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
