//! # runvisor
//!
//! **Runvisor** runs a list of configured cleanup rules as one
//! single-flight run and keeps the rules' state in write-back stores that are
//! flushed only when the whole run succeeds.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  Config { rules, run_frequency, dry_run, state_file_path }
//!        │
//!        ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  RunLoop (one-shot or every `run_frequency`, stops on OS signal)  │
//! └──────────────────────────────┬────────────────────────────────────┘
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  RunCoordinator                                                   │
//! │  - RunLock (single flight, 10s busy timeout)                      │
//! │  - RuleRegistry (RawRuleSpec ─► RuleProvider ─► Rule)             │
//! │  - executes rules strictly in configuration order                 │
//! └──────┬─────────────────────────────────────────────┬──────────────┘
//!        │ Rule::execute(client, options, ctx)         │ all rules ok
//!        ▼                                             ▼
//! ┌──────────────┐  get / set / remove        ┌──────────────────────┐
//! │     Rule     │ ─────────────────────────► │    CompletionBus     │
//! │ (StateHandle)│              │             │ publish(dry_run)     │
//! └──────────────┘              │             │ publish_aborted()    │
//!                               ▼             └──────────┬───────────┘
//!                   ┌────────────────────────┐           │ on_run_finished()
//!                   │   dyn StateStore       │ ◄─────────┘ on_run_aborted()
//!                   ├────────────────────────┤
//!                   │ FileStateStore         │  one JSON file, lazy load, dirty flag
//!                   │ RemoteStateStore       │  overlay + 25-op batches to a KvTable
//!                   └────────────────────────┘
//! ```
//!
//! ### Run lifecycle
//! ```text
//! run(options, ctx)
//!   ├─► no rules                    ─► Err(Config(NoRules))
//!   ├─► acquire RunLock (10s)       ─► Err(AlreadyRunning) / Err(Cancelled)
//!   ├─► activate rules              ─► Err(Config(..))
//!   ├─► for rule in rules:
//!   │       └─ Err ─► publish_aborted (stores discard), Err(Rule { .. })
//!   ├─► publish(dry_run)            ─► stores flush (dry run: discard)
//!   └─► release RunLock (always)
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types / traits                              |
//! |-------------------|-----------------------------------------------------------|-------------------------------------------------|
//! | **Coordination**  | Single-flight runs, sequential rules, periodic loop.      | [`RunCoordinator`], [`RunLoop`], [`RunLock`]    |
//! | **Rules**         | Rule contract, activation from configuration.             | [`Rule`], [`RuleFn`], [`RuleProvider`]          |
//! | **State**         | Scoped key/value state with file or remote backing.       | [`StateStore`], [`FileStateStore`], [`RemoteStateStore`] |
//! | **Notifications** | Completion fan-out to stores.                             | [`CompletionBus`], [`RunListener`]              |
//! | **Policies**      | Retry with backoff and jitter for table calls.            | [`RetryPolicy`], [`BackoffPolicy`]              |
//! | **Errors**        | Typed errors with stable log labels.                      | [`RunError`], [`StateError`], [`ConfigError`]   |
//! | **Configuration** | JSON configuration and global run options.                | [`Config`], [`GlobalOptions`]                   |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::{Value, json};
//! use tokio_util::sync::CancellationToken;
//! use async_trait::async_trait;
//! use runvisor::{
//!     ClientRef, Config, ConfigError, DocumentClient, GlobalOptions, RuleError, RuleFn,
//!     RuleProvider, RuleRef, RuleRegistry, RuleSpec, RunCoordinator, StateHandle,
//! };
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl DocumentClient for Offline {
//!     async fn query_database(&self, _: &str, _: &Value, _: &CancellationToken) -> Result<Value, RuleError> {
//!         Ok(json!({ "results": [] }))
//!     }
//!     async fn archive_page(&self, _: &str, _: &CancellationToken) -> Result<(), RuleError> {
//!         Ok(())
//!     }
//! }
//!
//! struct Heartbeat;
//!
//! impl RuleProvider for Heartbeat {
//!     fn name(&self) -> &str { "Heartbeat" }
//!
//!     fn build(&self, spec: &RuleSpec, state: StateHandle) -> Result<RuleRef, ConfigError> {
//!         Ok(RuleFn::arc(spec.rule.clone(), spec.label.clone(),
//!             move |_client: ClientRef, _opts: GlobalOptions, ctx: CancellationToken| {
//!                 let state = state.clone();
//!                 async move {
//!                     state.set("beat", "1", &ctx).await?;
//!                     Ok::<_, RuleError>(())
//!                 }
//!             }))
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config::from_json_str(r#"{ "rules": [{ "rule": "Heartbeat", "label": "main" }] }"#)?;
//!     let registry = RuleRegistry::new().with_provider(Arc::new(Heartbeat));
//!
//!     let coordinator = RunCoordinator::from_config(&cfg, registry, Arc::new(Offline));
//!     coordinator.run(&cfg.global_options(), &CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
mod core;
mod error;
mod notify;
pub mod observability;
mod policies;
mod rules;
pub mod state;
mod sync;

// ---- Public re-exports ----

pub use config::{Config, GlobalOptions};
pub use crate::core::{CoordinatorBuilder, RUN_LOCK_TIMEOUT, RunCoordinator, RunLoop, RunPhase, shutdown};
pub use error::{
    ConfigError, LockError, PublishError, RuleError, RunError, StateError, TableError,
};
pub use notify::{CompletionBus, ListenerId, RunListener};
pub use policies::{BackoffPolicy, Growth, JitterPolicy, RetryPolicy};
pub use rules::{
    ClientRef, DocumentClient, LABEL_KEY, RULE_KEY, RawRuleSpec, Rule, RuleFn, RuleOptions,
    RuleProvider, RuleRef, RuleRegistry, RuleSpec,
};
pub use state::{
    FileStateStore, KvTable, MemoryTable, PendingEntry, RemoteStateStore, Scope, StateHandle,
    StateKey, StateStore,
};
pub use sync::{LockGuard, RunLock};
