//! Binary entry point for the `sym` CLI.
//!
//! All output is JSON on stdout; logs go to stderr.
//!
//! ## Usage
//!
//! ```bash
//! # Where is a symbol declared?
//! sym resolve Storage
//!
//! # Unused unexported declarations
//! sym dead --max-results 20
//!
//! # Preview a rename as unified diffs
//! sym rename Foo MyFoo --dry-run
//!
//! # Structural rewrite
//! sym rewrite 'strings.Index(s, x) >= 0' 'strings.Contains(s, x)'
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use symtool::cli::{Engine, Operation};
use symtool::config::CliOverrides;
use symtool::error::SymtoolError;
use symtool::output::{emit_response, ErrorResponse};
use symtool::snapshot::DeclKind;
use tracing::{debug, warn};

// ============================================================================
// CLI Structure
// ============================================================================

/// Semantic symbol queries and refactoring over a Go workspace snapshot.
#[derive(Parser, Debug)]
#[command(name = "sym", version, about = "Semantic symbol index and refactoring engine")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Workspace root directory (default: current directory).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Analysis mode: `default` includes test files, `production` excludes them.
    #[arg(long, global = true)]
    mode: Option<String>,

    /// Snapshot cache TTL in seconds.
    #[arg(long, global = true)]
    cache_ttl: Option<u64>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    /// Log line format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Pagination flags.
#[derive(clap::Args, Debug, Clone, Copy)]
struct PageArgs {
    /// Page size (default: configured default limit).
    #[arg(long)]
    limit: Option<usize>,
    /// Items to skip.
    #[arg(long, default_value_t = 0)]
    offset: usize,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a name (or `Owner.Member`) to its declaration.
    Resolve {
        name: String,
        /// Restrict to one declaration kind.
        #[arg(long, value_parser = parse_kind)]
        kind: Option<DeclKind>,
    },
    /// List references to a symbol, grouped by file.
    References {
        name: String,
        #[arg(long, value_parser = parse_kind)]
        kind: Option<DeclKind>,
        /// Only files matching this path or glob.
        #[arg(long)]
        file: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Find unused declarations.
    Dead {
        /// Also report exported declarations.
        #[arg(long)]
        include_exported: bool,
        /// Cap on listed symbols (default: configured).
        #[arg(long)]
        max_results: Option<usize>,
    },
    /// Find types implementing an interface and interfaces extending it.
    Implementations { interface: String },
    /// Per-function complexity metrics.
    Complexity {
        /// Only functions at or above this cyclomatic complexity.
        #[arg(long, default_value_t = 1)]
        min_cyclomatic: u32,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Definition, key usages, and dependencies of a symbol.
    Context {
        name: String,
        #[arg(long, value_parser = parse_kind)]
        kind: Option<DeclKind>,
    },
    /// Rename a symbol and all of its references.
    Rename {
        /// Current name, or `Owner.Member`.
        target: String,
        new_name: String,
        #[arg(long, value_parser = parse_kind)]
        kind: Option<DeclKind>,
        /// Print diffs instead of writing files.
        #[arg(long)]
        dry_run: bool,
    },
    /// Replace every expression matching a pattern.
    Rewrite {
        find: String,
        replace: String,
        /// Print diffs instead of writing files.
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_kind(s: &str) -> Result<DeclKind, String> {
    s.parse::<DeclKind>().map_err(|e| e.to_string())
}

impl Command {
    fn into_operation(self) -> Operation {
        match self {
            Command::Resolve { name, kind } => Operation::Resolve { name, kind },
            Command::References {
                name,
                kind,
                file,
                page,
            } => Operation::References {
                name,
                kind,
                file,
                limit: page.limit,
                offset: page.offset,
            },
            Command::Dead {
                include_exported,
                max_results,
            } => Operation::Dead {
                include_exported,
                max_results,
            },
            Command::Implementations { interface } => Operation::Implementations { interface },
            Command::Complexity {
                min_cyclomatic,
                page,
            } => Operation::Complexity {
                min_cyclomatic,
                limit: page.limit,
                offset: page.offset,
            },
            Command::Context { name, kind } => Operation::Context { name, kind },
            Command::Rename {
                target,
                new_name,
                kind,
                dry_run,
            } => Operation::Rename {
                target,
                new_name,
                kind,
                dry_run,
            },
            Command::Rewrite {
                find,
                replace,
                dry_run,
            } => Operation::Rewrite {
                find,
                replace,
                dry_run,
            },
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.global.log_level, cli.global.log_format);

    let exit = match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(response) => {
            // Errors go to stdout as JSON, like results.
            let _ = emit_response(&response, &mut io::stdout());
            ExitCode::from(response.error.code)
        }
    };
    let _ = io::stdout().flush();
    exit
}

/// Initialize tracing subscriber on stderr. `RUST_LOG` overrides the level.
fn init_tracing(level: LogLevel, format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn execute(cli: Cli) -> Result<(), ErrorResponse> {
    let root = match cli.global.root {
        Some(root) => root,
        None => std::env::current_dir()
            .map_err(|e| ErrorResponse::from_error(&SymtoolError::from(e), None))?,
    };
    let overrides = CliOverrides {
        mode: cli.global.mode,
        default_limit: None,
        cache_ttl_secs: cli.global.cache_ttl,
    };
    let engine = Engine::open(&root, &overrides).map_err(|e| ErrorResponse::from_error(&e, None))?;
    let engine = Arc::new(engine);

    let shutdown = engine.token().child_token();
    let sweeper = engine
        .cache()
        .spawn_sweeper(engine.config().sweep_interval.value, shutdown.clone());

    // Ctrl-C cancels in-flight traversals.
    let interrupt = {
        let token = engine.token().clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; cancelling");
                token.cancel();
            }
        })
    };

    let op = cli.command.into_operation();
    let worker = Arc::clone(&engine);
    let outcome = tokio::task::spawn_blocking(move || worker.run(&op)).await;

    interrupt.abort();
    shutdown.cancel();
    if let Err(e) = sweeper.await {
        debug!(error = %e, "sweeper task ended abnormally");
    }

    let response = outcome.map_err(|e| {
        ErrorResponse::from_error(&SymtoolError::internal(format!("worker failed: {}", e)), None)
    })??;
    emit_response(&response, &mut io::stdout())
        .map_err(|e| ErrorResponse::from_error(&SymtoolError::from(e), response.snapshot_id.clone()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_parsing {
        use super::*;

        #[test]
        fn rename_with_dry_run_and_kind() {
            let cli = Cli::try_parse_from(["sym", "rename", "Foo", "MyFoo", "--dry-run", "--kind", "type"]).unwrap();
            match cli.command.into_operation() {
                Operation::Rename {
                    target,
                    new_name,
                    kind,
                    dry_run,
                } => {
                    assert_eq!(target, "Foo");
                    assert_eq!(new_name, "MyFoo");
                    assert_eq!(kind, Some(DeclKind::Type));
                    assert!(dry_run);
                }
                other => panic!("expected rename, got {:?}", other),
            }
        }

        #[test]
        fn references_pagination_defaults() {
            let cli = Cli::try_parse_from(["sym", "references", "Helper", "--file", "*_test.go"]).unwrap();
            assert_eq!(
                cli.command.into_operation(),
                Operation::References {
                    name: "Helper".to_string(),
                    kind: None,
                    file: Some("*_test.go".to_string()),
                    limit: None,
                    offset: 0,
                }
            );
        }

        #[test]
        fn global_flags_anywhere() {
            let cli = Cli::try_parse_from([
                "sym",
                "dead",
                "--root",
                "/work",
                "--mode",
                "production",
                "--log-format",
                "json",
            ])
            .unwrap();
            assert_eq!(cli.global.root, Some(PathBuf::from("/work")));
            assert_eq!(cli.global.mode.as_deref(), Some("production"));
            assert_eq!(cli.global.log_format, LogFormat::Json);
        }

        #[test]
        fn unknown_kind_is_rejected() {
            assert!(Cli::try_parse_from(["sym", "resolve", "x", "--kind", "widget"]).is_err());
        }
    }
}
