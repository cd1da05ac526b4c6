//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "lintel",
    version,
    about = "Lintel: incremental asset linter",
    long_about = "Lintel tracks an asset tree, re-checks only what changed and reports issue deltas.\n\nConfiguration precedence: CLI > lintel.toml > defaults.",
    after_help = "Examples:\n  lintel lint\n  lintel lint --output json --fix\n  lintel watch --debounce-ms 250\n  lintel watch --exit-after 60",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[arg(long, short, global = true, action = clap::ArgAction::SetTrue, help = "Debug logging (RUST_LOG overrides)")]
    pub verbose: bool,
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current lintel version.")]
    Version,
    /// One-shot lint of the whole scope
    #[command(
        about = "Run lint checks",
        long_about = "Enumerate every in-scope file, evaluate all enabled rules and print issues grouped by severity. Exits 1 when any error-severity issue is found.",
        after_help = "Examples:\n  lintel lint\n  lintel lint --repo-root game --output json\n  lintel lint --fix"
    )]
    Lint {
        #[arg(long, help = "Project root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Time budget per scheduler tick in milliseconds")]
        tick_budget_ms: Option<u64>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Apply available fixes, then lint again")]
        fix: bool,
    },
    /// Watch the tree and report issue deltas live
    #[command(
        about = "Watch for changes",
        long_about = "Lint once, then keep watching the project root. Changes are debounced, only affected files are re-checked, and added/removed issues are printed as they settle.",
        after_help = "Examples:\n  lintel watch\n  lintel watch --output json --exit-after 30"
    )]
    Watch {
        #[arg(long, help = "Project root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Quiet period before a burst of changes is applied")]
        debounce_ms: Option<u64>,
        #[arg(long, help = "Time budget per scheduler tick in milliseconds")]
        tick_budget_ms: Option<u64>,
        #[arg(long, help = "Stop after this many seconds")]
        exit_after: Option<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lint_flags() {
        let cli = Cli::parse_from(["lintel", "lint", "--output", "json", "--fix", "-v"]);
        assert!(cli.verbose);
        match cli.cmd {
            Commands::Lint { output, fix, .. } => {
                assert_eq!(output.as_deref(), Some("json"));
                assert!(fix);
            }
            _ => panic!("expected lint"),
        }
    }

    #[test]
    fn parses_watch_flags() {
        let cli = Cli::parse_from(["lintel", "watch", "--debounce-ms", "250", "--exit-after", "5"]);
        match cli.cmd {
            Commands::Watch {
                debounce_ms,
                exit_after,
                ..
            } => {
                assert_eq!(debounce_ms, Some(250));
                assert_eq!(exit_after, Some(5));
            }
            _ => panic!("expected watch"),
        }
    }
}
