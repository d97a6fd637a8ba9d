//! Request layer behind the `sym` binary.
//!
//! An [`Engine`] owns the resolved configuration, the snapshot cache, and the
//! cancellation token for one root. [`Engine::run`] loads (or reuses) the
//! snapshot for the configured mode, dispatches an [`Operation`] to its
//! engine, and wraps the outcome in the JSON envelope.
//!
//! Argument parsing lives in `main.rs`; everything here is callable from
//! tests without a process boundary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use symtool_core::error::{SymtoolError, SymtoolResult};
use symtool_core::output::{ErrorResponse, Response};
use symtool_core::snapshot::{DeclKind, Snapshot};
use tracing::debug;

use crate::cache::SnapshotCache;
use crate::cancel::{check, CancellationToken};
use crate::complexity::complexity_report;
use crate::config::{CliOverrides, ResolvedConfig};
use crate::context::best_context;
use crate::implementations::find_implementations;
use crate::index::{same_declaration, SymbolIndex, SymbolInfo};
use crate::liveness::find_dead;
use crate::loader::{AutoLoader, SnapshotLoader};
use crate::rename::{rename, RenameRequest};
use crate::rewrite::rewrite;
use crate::usages::{references, FileFilter};

/// One request against a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Resolve {
        name: String,
        kind: Option<DeclKind>,
    },
    References {
        name: String,
        kind: Option<DeclKind>,
        file: Option<String>,
        limit: Option<usize>,
        offset: usize,
    },
    Dead {
        include_exported: bool,
        max_results: Option<usize>,
    },
    Implementations {
        interface: String,
    },
    Complexity {
        min_cyclomatic: u32,
        limit: Option<usize>,
        offset: usize,
    },
    Context {
        name: String,
        kind: Option<DeclKind>,
    },
    Rename {
        target: String,
        new_name: String,
        kind: Option<DeclKind>,
        dry_run: bool,
    },
    Rewrite {
        find: String,
        replace: String,
        dry_run: bool,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Resolve { .. } => "resolve",
            Operation::References { .. } => "references",
            Operation::Dead { .. } => "dead",
            Operation::Implementations { .. } => "implementations",
            Operation::Complexity { .. } => "complexity",
            Operation::Context { .. } => "context",
            Operation::Rename { .. } => "rename",
            Operation::Rewrite { .. } => "rewrite",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub symbol: SymbolInfo,
    /// Other declarations with the same name.
    pub alternatives: Vec<SymbolInfo>,
}

/// Resolve a plain or qualified name, listing same-named alternatives.
pub fn resolve_symbol(snapshot: &Snapshot, name: &str, kind: Option<DeclKind>) -> SymtoolResult<Resolution> {
    let index = SymbolIndex::new(snapshot);
    let primary = index.resolve_target(name, kind)?;
    let alternatives = if name.contains('.') {
        Vec::new()
    } else {
        index
            .resolve_all(name, kind)
            .into_iter()
            .filter(|decl| !same_declaration(decl, primary))
            .map(|decl| SymbolInfo::new(snapshot, decl))
            .collect()
    };
    Ok(Resolution {
        symbol: SymbolInfo::new(snapshot, primary),
        alternatives,
    })
}

/// Configuration, cache, and cancellation for one root.
#[derive(Debug)]
pub struct Engine {
    root: PathBuf,
    config: ResolvedConfig,
    cache: Arc<SnapshotCache>,
    token: CancellationToken,
}

impl Engine {
    /// Resolve configuration for `root` and load snapshots with
    /// [`AutoLoader`].
    pub fn open(root: &Path, overrides: &CliOverrides) -> SymtoolResult<Self> {
        let config = ResolvedConfig::resolve(root, overrides)?;
        Ok(Self::with_loader(root, config, AutoLoader))
    }

    pub fn with_loader(root: &Path, config: ResolvedConfig, loader: impl SnapshotLoader + 'static) -> Self {
        let cache = Arc::new(SnapshotCache::new(loader, config.cache_ttl.value));
        Engine {
            root: root.to_path_buf(),
            config,
            cache,
            token: CancellationToken::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// Token observed by every traversal this engine runs.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Snapshot for the configured mode.
    pub fn snapshot(&self) -> SymtoolResult<Arc<Snapshot>> {
        self.cache.get_or_load(&self.root, &self.config.mode.value)
    }

    /// Run `op` and wrap the outcome in a response envelope.
    pub fn run(&self, op: &Operation) -> Result<Response<Value>, ErrorResponse> {
        let snapshot = self
            .snapshot()
            .map_err(|err| ErrorResponse::from_error(&err, None))?;
        let snapshot_id = Some(snapshot.id.to_string());
        debug!(op = op.name(), snapshot = %snapshot.id, "running operation");
        match self.dispatch(&snapshot, op) {
            Ok(result) => Ok(Response::ok(snapshot_id, result)),
            Err(err) => Err(ErrorResponse::from_error(&err, snapshot_id)),
        }
    }

    fn dispatch(&self, snapshot: &Snapshot, op: &Operation) -> SymtoolResult<Value> {
        check(&self.token)?;
        let token = &self.token;
        let default_limit = self.config.default_limit.value;
        let value = match op {
            Operation::Resolve { name, kind } => to_value(resolve_symbol(snapshot, name, *kind)?)?,
            Operation::References {
                name,
                kind,
                file,
                limit,
                offset,
            } => {
                let filter = FileFilter::parse(file.as_deref())?;
                let limit = limit.unwrap_or(default_limit);
                to_value(references(snapshot, name, *kind, &filter, limit, *offset, token)?)?
            }
            Operation::Dead {
                include_exported,
                max_results,
            } => {
                let max = max_results.unwrap_or(self.config.max_dead_results.value);
                to_value(find_dead(snapshot, *include_exported, max, token)?)?
            }
            Operation::Implementations { interface } => {
                to_value(find_implementations(snapshot, interface, token)?)?
            }
            Operation::Complexity {
                min_cyclomatic,
                limit,
                offset,
            } => {
                let limit = limit.unwrap_or(default_limit);
                to_value(complexity_report(snapshot, *min_cyclomatic, limit, *offset, token)?)?
            }
            Operation::Context { name, kind } => {
                let limits = self.config.context_limits.value;
                to_value(best_context(snapshot, name, *kind, limits, token)?)?
            }
            Operation::Rename {
                target,
                new_name,
                kind,
                dry_run,
            } => {
                let request = RenameRequest {
                    target,
                    new_name,
                    kind: *kind,
                    dry_run: *dry_run,
                };
                to_value(rename(snapshot, &request, token)?)?
            }
            Operation::Rewrite {
                find,
                replace,
                dry_run,
            } => to_value(rewrite(snapshot, find, replace, *dry_run, token)?)?,
        };
        Ok(value)
    }
}

fn to_value(result: impl Serialize) -> SymtoolResult<Value> {
    serde_json::to_value(result).map_err(SymtoolError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SourceLoader;
    use std::fs;
    use tempfile::TempDir;

    const APP: &str = "package app\n\nfunc Run() int {\n\treturn helper()\n}\n\nfunc helper() int {\n\treturn 1\n}\n\nfunc unused() {}\n";

    fn engine() -> (TempDir, Engine) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.go"), APP).unwrap();
        let engine = Engine::with_loader(dir.path(), ResolvedConfig::default(), SourceLoader);
        (dir, engine)
    }

    #[test]
    fn resolve_reports_snapshot_id() {
        let (_dir, engine) = engine();
        let response = engine
            .run(&Operation::Resolve {
                name: "helper".to_string(),
                kind: None,
            })
            .unwrap();
        assert_eq!(response.status, "ok");
        assert!(response.snapshot_id.as_deref().unwrap().starts_with("snap_"));
        assert_eq!(response.result["symbol"]["name"], "helper");
        assert_eq!(response.result["symbol"]["kind"], "function");
    }

    #[test]
    fn dead_uses_configured_cap() {
        let (_dir, engine) = engine();
        let response = engine
            .run(&Operation::Dead {
                include_exported: false,
                max_results: None,
            })
            .unwrap();
        assert_eq!(response.result["total"], 1);
        assert_eq!(response.result["has_more"], false);
    }

    #[test]
    fn errors_carry_codes_and_snapshot() {
        let (_dir, engine) = engine();
        let err = engine
            .run(&Operation::Resolve {
                name: "missing".to_string(),
                kind: None,
            })
            .unwrap_err();
        assert_eq!(err.status, "error");
        assert_eq!(err.error.code, 3);
        assert!(err.snapshot_id.is_some());

        let err = engine
            .run(&Operation::References {
                name: "helper".to_string(),
                kind: None,
                file: None,
                limit: Some(0),
                offset: 0,
            })
            .unwrap_err();
        assert_eq!(err.error.code, 2);
    }

    #[test]
    fn load_failures_have_no_snapshot() {
        let dir = TempDir::new().unwrap();
        let engine = Engine::with_loader(&dir.path().join("gone"), ResolvedConfig::default(), SourceLoader);
        let err = engine
            .run(&Operation::Implementations {
                interface: "Storage".to_string(),
            })
            .unwrap_err();
        assert_eq!(err.error.code, 6);
        assert!(err.snapshot_id.is_none());
    }

    #[test]
    fn cancelled_engine_refuses_work() {
        let (_dir, engine) = engine();
        engine.token().cancel();
        let err = engine
            .run(&Operation::Complexity {
                min_cyclomatic: 1,
                limit: None,
                offset: 0,
            })
            .unwrap_err();
        assert_eq!(err.error.code, 7);
    }

    #[test]
    fn snapshot_is_reused_across_operations() {
        let (_dir, engine) = engine();
        let first = engine.snapshot().unwrap();
        engine
            .run(&Operation::Context {
                name: "helper".to_string(),
                kind: None,
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &engine.snapshot().unwrap()));
        assert_eq!(engine.cache().stats().misses, 1);
    }
}
