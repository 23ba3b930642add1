//! # RunCoordinator: one cleanup run, start to finish.
//!
//! ```text
//! run(options, ctx)
//!   ├─ no rules configured            ─► Err(Config(NoRules))        (lock untouched)
//!   ├─ RunLock::acquire(10s, ctx)
//!   │     ├─ timed out                ─► Err(AlreadyRunning)
//!   │     └─ cancelled                ─► Err(Cancelled)
//!   ├─ activate every rule, in order  ─► Err(Config(..)) before any rule runs
//!   ├─ execute rules one by one
//!   │     └─ rule fails               ─► bus.publish_aborted(), Err(Rule { .. })
//!   ├─ bus.publish(dry_run, ctx)      ─► Err(Publish(..)) if a store failed to flush
//!   └─ Ok(())
//! ```
//!
//! ## Phases
//! ```text
//! Idle ─► LockAcquiring ─► Executing ─► Publishing ─► Idle
//!                              └──────────┴──► Failed ─► Idle
//! ```
//! The phase belongs to the caller holding the run lock. A caller that is
//! still waiting for the lock, or gives up on it, leaves a busy coordinator's
//! phase alone.
//!
//! ## Rules
//! - At most one run executes rules at a time per [`RunLock`].
//! - Rules execute strictly sequentially in configuration order.
//! - The lock is released on every exit path, including cancellation of the
//!   `run` future itself.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{Config, GlobalOptions};
use crate::error::{ConfigError, RunError};
use crate::notify::CompletionBus;
use crate::rules::{ClientRef, RawRuleSpec, RuleRegistry};
use crate::state::{FileStateStore, KvTable, RemoteStateStore, StateStore};
use crate::sync::RunLock;

/// How long a run waits for another run to finish before giving up.
pub const RUN_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a coordinator currently is in its run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RunPhase {
    /// No run holds the lock.
    Idle = 0,
    /// A run is waiting for the lock.
    LockAcquiring = 1,
    /// Rules are executing.
    Executing = 2,
    /// Listeners are flushing state.
    Publishing = 3,
    /// The run failed and is releasing the lock.
    Failed = 4,
}

impl RunPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => RunPhase::LockAcquiring,
            2 => RunPhase::Executing,
            3 => RunPhase::Publishing,
            4 => RunPhase::Failed,
            _ => RunPhase::Idle,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::LockAcquiring => "lock_acquiring",
            RunPhase::Executing => "executing",
            RunPhase::Publishing => "publishing",
            RunPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs the configured rules under the run lock and publishes completion.
pub struct RunCoordinator {
    rules: Vec<RawRuleSpec>,
    registry: RuleRegistry,
    store: Arc<dyn StateStore>,
    client: ClientRef,
    bus: CompletionBus,
    lock: RunLock,
    phase: AtomicU8,
}

impl RunCoordinator {
    /// Starts building a coordinator.
    ///
    /// `store` must be registered on `bus`, which is what the store
    /// constructors do.
    pub fn builder(
        registry: RuleRegistry,
        client: ClientRef,
        store: Arc<dyn StateStore>,
        bus: CompletionBus,
    ) -> CoordinatorBuilder {
        CoordinatorBuilder {
            rules: Vec::new(),
            registry,
            store,
            client,
            bus,
            lock: None,
        }
    }

    /// Builds a coordinator for `cfg` with a [`FileStateStore`] at
    /// `cfg.state_file_path` (in memory if unset).
    pub fn from_config(cfg: &Config, registry: RuleRegistry, client: ClientRef) -> Arc<Self> {
        let bus = CompletionBus::new();
        let store: Arc<dyn StateStore> =
            FileStateStore::from_optional_path(cfg.state_file_path.clone(), &bus);
        Self::builder(registry, client, store, bus)
            .with_rules(cfg.rules.clone())
            .build()
    }

    /// Like [`RunCoordinator::from_config`], but keeps state in `table` when
    /// `cfg.table_name` is set.
    pub fn from_config_with_table(
        cfg: &Config,
        registry: RuleRegistry,
        client: ClientRef,
        table: Arc<dyn KvTable>,
    ) -> Arc<Self> {
        let Some(table_name) = cfg.table_name.as_deref() else {
            return Self::from_config(cfg, registry, client);
        };
        info!(table = table_name, "keeping state in remote table");
        let bus = CompletionBus::new();
        let store: Arc<dyn StateStore> = RemoteStateStore::new(table, &bus);
        Self::builder(registry, client, store, bus)
            .with_rules(cfg.rules.clone())
            .build()
    }

    /// The current phase.
    pub fn phase(&self) -> RunPhase {
        RunPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// The run lock; clones share it.
    pub fn lock(&self) -> &RunLock {
        &self.lock
    }

    /// The state store rules are activated with.
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Executes one run.
    pub async fn run(&self, options: &GlobalOptions, ctx: &CancellationToken) -> Result<(), RunError> {
        if self.rules.is_empty() {
            let err = RunError::from(ConfigError::NoRules);
            error!(error = %err, label = err.as_label(), "cannot start cleanup");
            return Err(err);
        }

        let acquiring = self.swap_phase(RunPhase::Idle, RunPhase::LockAcquiring);
        let _guard = match self.lock.acquire(RUN_LOCK_TIMEOUT, ctx).await {
            Ok(guard) => guard,
            Err(e) => {
                if acquiring {
                    self.swap_phase(RunPhase::LockAcquiring, RunPhase::Idle);
                }
                let err = RunError::from(e);
                error!(error = %err, label = err.as_label(), "cannot start cleanup");
                return Err(err);
            }
        };

        // Dropped before `_guard`, so the phase is idle again before the lock frees up.
        let _idle = PhaseReset(&self.phase);

        let res = self.run_locked(options, ctx).await;
        if let Err(err) = &res {
            self.set_phase(RunPhase::Failed);
            error!(error = %err, label = err.as_label(), "cleanup failed");
        }
        res
    }

    async fn run_locked(&self, options: &GlobalOptions, ctx: &CancellationToken) -> Result<(), RunError> {
        let rules = self.registry.activate_all(&self.rules, &self.store)?;

        self.set_phase(RunPhase::Executing);
        info!(rules = rules.len(), dry_run = options.dry_run, "cleanup started");
        let started = Instant::now();

        for rule in &rules {
            info!(rule = rule.name(), label = rule.label(), "running rule");
            let rule_started = Instant::now();

            if let Err(source) = rule.execute(Arc::clone(&self.client), options, ctx.clone()).await {
                self.bus.publish_aborted().await;
                return Err(RunError::Rule {
                    rule: rule.name().to_string(),
                    label: rule.label().to_string(),
                    source,
                });
            }

            info!(
                rule = rule.name(),
                label = rule.label(),
                elapsed_ms = rule_started.elapsed().as_millis() as u64,
                "rule finished"
            );
        }

        self.set_phase(RunPhase::Publishing);
        debug!(dry_run = options.dry_run, "publishing completion");
        self.bus.publish(options.dry_run, ctx).await?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cleanup finished"
        );
        Ok(())
    }

    fn set_phase(&self, phase: RunPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    fn swap_phase(&self, from: RunPhase, to: RunPhase) -> bool {
        self.phase
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

struct PhaseReset<'a>(&'a AtomicU8);

impl Drop for PhaseReset<'_> {
    fn drop(&mut self) {
        self.0.store(RunPhase::Idle as u8, Ordering::Release);
    }
}

/// Builder for [`RunCoordinator`].
pub struct CoordinatorBuilder {
    rules: Vec<RawRuleSpec>,
    registry: RuleRegistry,
    store: Arc<dyn StateStore>,
    client: ClientRef,
    bus: CompletionBus,
    lock: Option<RunLock>,
}

impl CoordinatorBuilder {
    /// Sets the rule entries, in execution order.
    pub fn with_rules(mut self, rules: Vec<RawRuleSpec>) -> Self {
        self.rules = rules;
        self
    }

    /// Shares an existing run lock, so several coordinators exclude each other.
    pub fn with_lock(mut self, lock: RunLock) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Builds the coordinator.
    pub fn build(self) -> Arc<RunCoordinator> {
        Arc::new(RunCoordinator {
            rules: self.rules,
            registry: self.registry,
            store: self.store,
            client: self.client,
            bus: self.bus,
            lock: self.lock.unwrap_or_default(),
            phase: AtomicU8::new(RunPhase::Idle as u8),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PublishError, RuleError, StateError};
    use crate::notify::RunListener;
    use crate::rules::{DocumentClient, Rule, RuleFn, RuleProvider, RuleRef, RuleSpec};
    use crate::state::StateHandle;
    use crate::state::remote::{MemoryTable, TableKey};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    struct NullClient;

    #[async_trait]
    impl DocumentClient for NullClient {
        async fn query_database(
            &self,
            _: &str,
            _: &Value,
            _: &CancellationToken,
        ) -> Result<Value, RuleError> {
            Ok(json!({ "results": [] }))
        }

        async fn archive_page(&self, _: &str, _: &CancellationToken) -> Result<(), RuleError> {
            Ok(())
        }
    }

    /// Records execution order and overlap; options: `key`, `fail`, `sleepSecs`.
    #[derive(Default)]
    struct Probe {
        order: Mutex<Vec<String>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    struct ProbeProvider(Arc<Probe>);

    impl RuleProvider for ProbeProvider {
        fn name(&self) -> &str {
            "Probe"
        }

        fn build(&self, spec: &RuleSpec, state: StateHandle) -> Result<RuleRef, ConfigError> {
            let probe = Arc::clone(&self.0);
            let label = spec.label.clone();
            let fail = spec.options.optional_bool("fail")?.unwrap_or(false);
            let sleep = spec.options.optional_integer("sleepSecs")?.unwrap_or(0) as u64;
            let key = spec.options.optional_string("key")?;

            Ok(RuleFn::arc(
                spec.rule.clone(),
                spec.label.clone(),
                move |_client: ClientRef, _opts: GlobalOptions, ctx: CancellationToken| {
                    let probe = Arc::clone(&probe);
                    let label = label.clone();
                    let key = key.clone();
                    let state = state.clone();
                    async move {
                        let now = probe.active.fetch_add(1, Ordering::SeqCst) + 1;
                        probe.max_active.fetch_max(now, Ordering::SeqCst);
                        if sleep > 0 {
                            tokio::time::sleep(Duration::from_secs(sleep)).await;
                        }
                        if let Some(key) = key {
                            state.set(&key, label.clone(), &ctx).await?;
                        }
                        probe.order.lock().unwrap().push(label);
                        probe.active.fetch_sub(1, Ordering::SeqCst);
                        if fail {
                            return Err(RuleError::Fail {
                                error: "boom".into(),
                            });
                        }
                        Ok(())
                    }
                },
            ))
        }
    }

    #[derive(Default)]
    struct Flushes {
        finished: AtomicUsize,
        aborted: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RunListener for Flushes {
        async fn on_run_finished(&self, _: bool, _: &CancellationToken) -> Result<(), StateError> {
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StateError::Cancelled);
            }
            Ok(())
        }

        async fn on_run_aborted(&self) {
            self.aborted.fetch_add(1, Ordering::SeqCst);
        }

        fn name(&self) -> &'static str {
            "flushes"
        }
    }

    fn entry(label: &str, extra: Value) -> RawRuleSpec {
        let mut map = extra.as_object().cloned().unwrap_or_default();
        map.insert("rule".into(), json!("Probe"));
        map.insert("label".into(), json!(label));
        map
    }

    struct Harness {
        coordinator: Arc<RunCoordinator>,
        probe: Arc<Probe>,
        flushes: Arc<Flushes>,
        store: Arc<FileStateStore>,
    }

    fn harness(rules: Vec<RawRuleSpec>, flush_fails: bool) -> Harness {
        let bus = CompletionBus::new();
        let store = FileStateStore::in_memory(&bus);
        let flushes = Arc::new(Flushes {
            fail: flush_fails,
            ..Default::default()
        });
        let listener: Arc<dyn RunListener> = flushes.clone();
        bus.register(&listener);

        let probe = Arc::new(Probe::default());
        let registry = RuleRegistry::new().with_provider(Arc::new(ProbeProvider(probe.clone())));
        let store_dyn: Arc<dyn StateStore> = store.clone();
        let coordinator = RunCoordinator::builder(registry, Arc::new(NullClient), store_dyn, bus)
            .with_rules(rules)
            .build();

        Harness {
            coordinator,
            probe,
            flushes,
            store,
        }
    }

    fn options() -> GlobalOptions {
        GlobalOptions::default()
    }

    #[tokio::test]
    async fn test_rules_run_in_configuration_order() {
        let h = harness(
            vec![entry("c", json!({})), entry("a", json!({})), entry("b", json!({}))],
            false,
        );
        h.coordinator
            .run(&options(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*h.probe.order.lock().unwrap(), vec!["c", "a", "b"]);
        assert_eq!(h.flushes.finished.load(Ordering::SeqCst), 1);
        assert_eq!(h.coordinator.phase(), RunPhase::Idle);
        assert!(!h.coordinator.lock().is_held());
    }

    #[tokio::test]
    async fn test_no_rules_fails_before_locking() {
        let h = harness(vec![], false);
        let _held = h.coordinator.lock().try_acquire().unwrap();

        let err = h
            .coordinator
            .run(&options(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::NoRules)));
    }

    #[tokio::test]
    async fn test_unknown_rule_aborts_before_execution() {
        let mut unknown = entry("x", json!({}));
        unknown.insert("rule".into(), json!("Missing"));
        let h = harness(vec![entry("a", json!({})), unknown], false);

        let err = h
            .coordinator
            .run(&options(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Config(ConfigError::UnknownRule { .. })
        ));
        assert!(h.probe.order.lock().unwrap().is_empty());
        assert_eq!(h.flushes.finished.load(Ordering::SeqCst), 0);
        assert!(!h.coordinator.lock().is_held());
    }

    #[tokio::test]
    async fn test_failing_rule_skips_rest_and_publish() {
        let h = harness(
            vec![
                entry("a", json!({ "key": "seen" })),
                entry("b", json!({ "fail": true })),
                entry("c", json!({})),
            ],
            false,
        );
        let ctx = CancellationToken::new();

        let err = h.coordinator.run(&options(), &ctx).await.unwrap_err();

        match err {
            RunError::Rule { rule, label, source } => {
                assert_eq!(rule, "Probe");
                assert_eq!(label, "b");
                assert!(matches!(source, RuleError::Fail { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*h.probe.order.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(h.flushes.finished.load(Ordering::SeqCst), 0);
        assert_eq!(h.flushes.aborted.load(Ordering::SeqCst), 1);
        assert_eq!(h.coordinator.phase(), RunPhase::Idle);
        assert!(!h.coordinator.lock().is_held());

        let value = h
            .store
            .get_string(&crate::state::Scope::new("Probe", "a"), "seen", &ctx)
            .await
            .unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_flush_failure_surfaces_as_publish_error() {
        let h = harness(vec![entry("a", json!({}))], true);
        let err = h
            .coordinator
            .run(&options(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RunError::Publish(PublishError::Listener {
                listener: "flushes",
                ..
            })
        ));
        assert!(!h.coordinator.lock().is_held());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_waits_for_first() {
        let h = harness(vec![entry("slow", json!({ "sleepSecs": 5 }))], false);
        let ctx = CancellationToken::new();
        let opts = options();

        let (a, b) = tokio::join!(
            h.coordinator.run(&opts, &ctx),
            h.coordinator.run(&opts, &ctx)
        );

        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(h.probe.order.lock().unwrap().len(), 2);
        assert_eq!(h.probe.max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_lock_times_out_as_already_running() {
        let h = harness(vec![entry("slow", json!({ "sleepSecs": 30 }))], false);
        let ctx = CancellationToken::new();
        let opts = options();

        let (a, b) = tokio::join!(
            h.coordinator.run(&opts, &ctx),
            h.coordinator.run(&opts, &ctx)
        );

        assert!(a.is_ok());
        let err = b.unwrap_err();
        assert!(matches!(err, RunError::AlreadyRunning));
        assert!(err.is_transient());
        assert_eq!(h.probe.order.lock().unwrap().len(), 1);
        assert_eq!(h.coordinator.phase(), RunPhase::Idle);
    }

    #[tokio::test]
    async fn test_cancelled_while_waiting_for_lock() {
        let h = harness(vec![entry("a", json!({}))], false);
        let _held = h.coordinator.lock().try_acquire().unwrap();
        let ctx = CancellationToken::new();
        ctx.cancel();

        let err = h.coordinator.run(&options(), &ctx).await.unwrap_err();
        assert!(matches!(err, RunError::Cancelled));
        assert_eq!(h.coordinator.phase(), RunPhase::Idle);
    }

    #[tokio::test]
    async fn test_shared_lock_excludes_other_coordinator() {
        let h = harness(vec![entry("a", json!({}))], false);
        let bus = CompletionBus::new();
        let store: Arc<dyn StateStore> = FileStateStore::in_memory(&bus);
        let other = RunCoordinator::builder(RuleRegistry::new(), Arc::new(NullClient), store, bus)
            .with_lock(h.coordinator.lock().clone())
            .build();

        let _guard = other.lock().try_acquire().unwrap();
        assert!(h.coordinator.lock().is_held());
    }

    #[tokio::test]
    async fn test_from_config_uses_file_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let cfg = Config {
            state_file_path: Some(path.clone()),
            rules: vec![entry("a", json!({ "key": "cursor" }))],
            ..Default::default()
        };
        let probe = Arc::new(Probe::default());
        let registry = RuleRegistry::new().with_provider(Arc::new(ProbeProvider(probe)));

        let coordinator = RunCoordinator::from_config(&cfg, registry, Arc::new(NullClient));
        coordinator
            .run(&cfg.global_options(), &CancellationToken::new())
            .await
            .unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("cursor"));
    }

    #[tokio::test]
    async fn test_from_config_with_table_name_uses_remote_store() {
        let cfg = Config {
            table_name: Some("cleanup-state".into()),
            rules: vec![entry("a", json!({ "key": "cursor" }))],
            ..Default::default()
        };
        let probe = Arc::new(Probe::default());
        let registry = RuleRegistry::new().with_provider(Arc::new(ProbeProvider(probe)));
        let table = Arc::new(MemoryTable::new());

        let coordinator =
            RunCoordinator::from_config_with_table(&cfg, registry, Arc::new(NullClient), table.clone());
        coordinator
            .run(&cfg.global_options(), &CancellationToken::new())
            .await
            .unwrap();

        let key = TableKey::from(&crate::state::Scope::new("Probe", "a").key("cursor"));
        assert_eq!(table.get(&key), Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_from_config_without_table_name_keeps_table_untouched() {
        let cfg = Config {
            rules: vec![entry("a", json!({ "key": "cursor" }))],
            ..Default::default()
        };
        let probe = Arc::new(Probe::default());
        let registry = RuleRegistry::new().with_provider(Arc::new(ProbeProvider(probe)));
        let table = Arc::new(MemoryTable::new());

        let coordinator =
            RunCoordinator::from_config_with_table(&cfg, registry, Arc::new(NullClient), table.clone());
        coordinator
            .run(&cfg.global_options(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_rule_trait_object_exposes_identity() {
        let rule: RuleRef = RuleFn::arc(
            "Probe",
            "x",
            |_c: ClientRef, _o: GlobalOptions, _ctx: CancellationToken| async {
                Ok::<_, RuleError>(())
            },
        );
        assert_eq!((rule.name(), rule.label()), ("Probe", "x"));
    }
}
