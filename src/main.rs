//! Engine entry point: CLI wiring, scenario loading, and the tick loop.

use std::path::Path;
use std::process;
use std::sync::Arc;

use econome::config::EngineConfig;
use econome::ports::{CommandSink, HomeDataSource, SavingsSink};
use econome::runtime::{Runtime, TickSummary};
use econome::savings::{SavingsReport, export_csv};
use econome::scenario::{ScenarioBackend, ScenarioSpec};

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    scenario_path: Option<String>,
    preset: Option<String>,
    ticks: u64,
    seed_override: Option<u64>,
    savings_out: Option<String>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("econome — Home energy load arbitration and scheduling engine");
    eprintln!();
    eprintln!("Usage: econome [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>       Load engine config from TOML file");
    eprintln!("  --scenario <path>     Load scenario from TOML file");
    eprintln!("  --preset <name>       Use a built-in scenario preset (demo)");
    eprintln!("  --ticks <u64>         Number of ticks to run (default: 240)");
    eprintln!("  --seed <u64>          Override scenario random seed");
    eprintln!("  --savings-out <path>  Export the savings ledger to CSV");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve               Start REST API server after the run");
        eprintln!("  --port <u16>          API server port (default: 3000)");
    }
    eprintln!("  --help                Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the demo preset is used.");
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        scenario_path: None,
        preset: None,
        ticks: 240,
        seed_override: None,
        savings_out: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --config requires a path argument");
                    process::exit(1);
                }
                cli.config_path = Some(args[i].clone());
            }
            "--scenario" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --scenario requires a path argument");
                    process::exit(1);
                }
                cli.scenario_path = Some(args[i].clone());
            }
            "--preset" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --preset requires a name argument");
                    process::exit(1);
                }
                cli.preset = Some(args[i].clone());
            }
            "--ticks" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --ticks requires a u64 argument");
                    process::exit(1);
                }
                if let Ok(n) = args[i].parse::<u64>() {
                    cli.ticks = n;
                } else {
                    eprintln!("error: --ticks value \"{}\" is not a valid u64", args[i]);
                    process::exit(1);
                }
            }
            "--seed" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --seed requires a u64 argument");
                    process::exit(1);
                }
                if let Ok(s) = args[i].parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{}\" is not a valid u64", args[i]);
                    process::exit(1);
                }
            }
            "--savings-out" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --savings-out requires a path argument");
                    process::exit(1);
                }
                cli.savings_out = Some(args[i].clone());
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --port requires a u16 argument");
                    process::exit(1);
                }
                if let Ok(p) = args[i].parse::<u16>() {
                    cli.port = p;
                } else {
                    eprintln!("error: --port value \"{}\" is not a valid u16", args[i]);
                    process::exit(1);
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = parse_args();

    // Engine config: --config or built-in defaults.
    let config = if let Some(ref path) = cli.config_path {
        match EngineConfig::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        EngineConfig::default()
    };
    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    // Scenario: --scenario takes priority, then --preset, then demo.
    let mut spec = if let Some(ref path) = cli.scenario_path {
        match ScenarioSpec::from_toml_file(Path::new(path)) {
            Ok(spec) => spec,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioSpec::from_preset(name) {
            Ok(spec) => spec,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioSpec::demo()
    };
    if let Some(seed) = cli.seed_override {
        spec.seed = seed;
    }

    let backend = Arc::new(ScenarioBackend::from_spec(&spec));
    let runtime = Arc::new(Runtime::new(
        &config,
        Arc::clone(&backend) as Arc<dyn HomeDataSource>,
        Arc::clone(&backend) as Arc<dyn CommandSink>,
        Arc::clone(&backend) as Arc<dyn SavingsSink>,
    ));

    // Accelerated run: scenario time advances tick_seconds per iteration.
    let step = chrono::Duration::seconds(runtime.tick_seconds() as i64);
    let mut now = backend.start();
    let mut total = TickSummary::default();
    for _ in 0..cli.ticks {
        match runtime.tick_once(now).await {
            Ok(summary) => {
                total.homes_evaluated += summary.homes_evaluated;
                total.homes_skipped += summary.homes_skipped;
                total.economy_activations += summary.economy_activations;
                total.commands_sent += summary.commands_sent;
                total.delivery_failures += summary.delivery_failures;
                total.deferrals += summary.deferrals;
                total.savings_records += summary.savings_records;
            }
            Err(e) => {
                eprintln!("error: tick failed: {e}");
                process::exit(1);
            }
        }
        backend.advance_tick(now);
        now += step;
    }

    println!(
        "Ran {} ticks: {} commands, {} deferrals, {} economy activations",
        cli.ticks, total.commands_sent, total.deferrals, total.economy_activations
    );

    let records = backend.ledger().snapshot();
    println!("\n{}", SavingsReport::from_records(&records));

    if let Some(ref path) = cli.savings_out {
        if let Err(e) = export_csv(&records, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Savings ledger written to {path}");
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;

        let state = Arc::new(econome::api::AppState::new(
            Arc::clone(&backend),
            Arc::clone(&runtime),
        ));
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        econome::api::serve(state, addr).await;
    }
}
