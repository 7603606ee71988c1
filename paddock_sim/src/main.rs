//! Paddock race simulator CLI
//!
//! Runs races under fault-injection scenarios and reports the results.

use clap::Parser;
use paddock_core::{RaceAnalysis, RaceConfig};
use paddock_sim::{ScenarioId, ScenarioResult, ScenarioRunner};
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Paddock multi-agent race simulator
#[derive(Parser, Debug)]
#[command(name = "paddock-sim")]
#[command(about = "Run multi-agent race simulations under fault-injection scenarios", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of participants
    #[arg(short, long, default_value = "8")]
    participants: u32,

    /// Laps per participant
    #[arg(short, long, default_value = "20")]
    laps: u32,

    /// Participants per team
    #[arg(long, default_value = "2")]
    team_size: u32,

    /// Wall-clock length of one protocol time unit, in milliseconds
    #[arg(long, default_value = "1000")]
    time_unit_ms: u64,

    /// Scenario to run (nominal, strategy_blackout, rank_blackout, flaky_ranks, all)
    #[arg(short = 'S', long, default_value = "nominal")]
    scenario: String,

    /// Number of consecutive seeds to run (for CI mode)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    seeds: u64,

    /// Give up on a race after this many time units
    #[arg(short, long, default_value = "600")]
    deadline: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

impl Args {
    fn log_level(&self) -> Level {
        if self.json {
            Level::WARN
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        }
    }

    fn race_config(&self, seed: u64) -> RaceConfig {
        RaceConfig {
            seed,
            num_participants: self.participants,
            num_laps: self.laps,
            team_size: self.team_size,
            time_unit: Duration::from_millis(self.time_unit_ms),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the flag-derived level
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level().as_str())),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Paddock race simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!("Available scenarios: nominal, strategy_blackout, rank_blackout, flaky_ranks, all");
                std::process::exit(2);
            }
        }
    };

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
            .max(1)
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();

    for seed_offset in 0..args.seeds {
        // Seed 0 would mean OS entropy inside the race
        let seed = base_seed.wrapping_add(seed_offset).max(1);
        let config = args.race_config(seed);
        let deadline = config.duration(args.deadline);
        let runner = ScenarioRunner::new(config).with_deadline(deadline);

        for scenario in &scenarios {
            let result = runner.run(*scenario).await;

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                    print_race(&result);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(result_json).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

/// Leaderboard top 5, equipment breakdown and correlations.
fn print_race(result: &ScenarioResult) {
    let Some(outcome) = &result.outcome else {
        return;
    };

    info!("  Final standings:");
    for row in outcome.leaderboard.iter().take(5) {
        let report = &row.record.report;
        info!(
            "    P{:<2} participant_{:<3} {:>9.3}s  {:<6}  {} overtakes",
            row.position,
            report.id,
            report.elapsed_time,
            report.equipment_class.name(),
            report.overtakes
        );
    }

    print_analysis(&outcome.analysis);

    let m = &result.metrics;
    info!(
        "  Race time {:.1}s, {} envelopes ({} dropped), {} wear alerts",
        m.race_time_secs, m.envelopes_sent, m.envelopes_dropped, m.wear_alerts
    );
}

fn print_analysis(analysis: &RaceAnalysis) {
    info!("  By equipment:");
    for class in &analysis.classes {
        info!(
            "    {:<6} n={} mean {:.3}s ± {}  overtakes {:.2}  best P{}",
            class.equipment_class.name(),
            class.participants,
            class.mean_elapsed_time,
            class
                .elapsed_time_stddev
                .map(|s| format!("{:.3}s", s))
                .unwrap_or_else(|| "n/a".to_string()),
            class.mean_overtakes,
            class.best_position
        );
    }

    let fmt = |r: Option<f64>| r.map(|v| format!("{:+.3}", v)).unwrap_or_else(|| "n/a".to_string());
    let c = &analysis.correlations;
    info!("  Correlations:");
    info!("    aggression vs overtakes:       {}", fmt(c.aggression_vs_overtakes));
    info!("    skill vs elapsed time:         {}", fmt(c.skill_vs_elapsed_time));
    info!("    consistency vs lap-time stdev: {}", fmt(c.consistency_vs_lap_stddev));
}

fn result_json(result: &ScenarioResult) -> serde_json::Value {
    let leaderboard: Vec<serde_json::Value> = result
        .outcome
        .iter()
        .flat_map(|o| o.leaderboard.iter())
        .map(|row| {
            let report = &row.record.report;
            serde_json::json!({
                "position": row.position,
                "id": report.id,
                "elapsed_time": report.elapsed_time,
                "equipment_class": report.equipment_class,
                "overtakes": report.overtakes,
                "stamped_rank": row.record.stamped_rank,
                "rank_source": row.record.rank_source,
            })
        })
        .collect();

    serde_json::json!({
        "scenario": result.scenario.name(),
        "seed": result.seed,
        "passed": result.passed,
        "failure_reason": result.failure_reason,
        "metrics": result.metrics,
        "started_at_ms": result.outcome.as_ref().and_then(|o| {
            o.started_at
                .duration_since(std::time::UNIX_EPOCH)
                .ok()
                .map(|d| d.as_millis() as u64)
        }),
        "leaderboard": leaderboard,
        "analysis": result.outcome.as_ref().map(|o| &o.analysis),
    })
}
