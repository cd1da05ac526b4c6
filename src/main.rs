//! Lintel CLI binary entry point.
//! Installs logging, resolves configuration and delegates to lint/watch.

use clap::Parser;
use lintel::cli::{Cli, Commands};
use lintel::config::{self, CliOverrides, Effective};
use lintel::error::LintelError;
use lintel::{lint, output, watch};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let fallback = if verbose { "lintel=debug" } else { "lintel=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    // stdout stays machine readable for --output json
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn fail(err: &LintelError) -> ! {
    eprintln!("{} {}", output::error_prefix(), err);
    let code = match err {
        LintelError::ConfigIo { .. }
        | LintelError::ConfigParse { .. }
        | LintelError::Pattern { .. }
        | LintelError::RuleConfig { .. }
        | LintelError::DuplicateRule(_) => 2,
        _ => 1,
    };
    std::process::exit(code);
}

fn resolve(cli: CliOverrides) -> Effective {
    let eff = config::resolve_effective(&cli).unwrap_or_else(|e| fail(&e));
    // Friendly note if no lintel config was found
    if matches!(config::load_config(&eff.repo_root), Ok(None)) && eff.output != "json" {
        eprintln!(
            "{} No lintel.toml found in {}; using defaults.",
            output::note_prefix(),
            eff.repo_root.display()
        );
    }
    eff
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Lint {
            repo_root,
            output: out,
            tick_budget_ms,
            fix,
        } => {
            let eff = resolve(CliOverrides {
                repo_root,
                output: out,
                debounce_ms: None,
                tick_budget_ms,
            });
            let result = if fix {
                let (res, report) = lint::run_lint_with_fixes(&eff).unwrap_or_else(|e| fail(&e));
                if eff.output == "json" {
                    let json = output::compose_fixed_json(&res, &report);
                    println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
                } else {
                    output::print_lint(&res, &eff.output);
                    output::print_fix_report(&report, &eff.output);
                }
                res
            } else {
                let res = lint::run_lint(&eff).unwrap_or_else(|e| fail(&e));
                output::print_lint(&res, &eff.output);
                res
            };
            if result.summary.errors > 0 {
                std::process::exit(1);
            }
        }
        Commands::Watch {
            repo_root,
            output: out,
            debounce_ms,
            tick_budget_ms,
            exit_after,
        } => {
            let eff = resolve(CliOverrides {
                repo_root,
                output: out,
                debounce_ms,
                tick_budget_ms,
            });
            let limit = exit_after.map(Duration::from_secs);
            if let Err(e) = watch::run_watch(&eff, limit) {
                fail(&e);
            }
        }
    }
}
