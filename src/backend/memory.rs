//! In-memory backing store
//!
//! A complete implementation of the backing store contract held in process
//! memory. Used by the CLI simulation and by tests that need real phase
//! bookkeeping, change feeds and report ingestion rather than stubs.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::{Backend, ModelMigration, StoreError};
use crate::migration::{MinionReports, Phase, TargetInfo};
use crate::model::Model;
use crate::names::Tag;
use crate::watcher::{change_feed, ChangeFeed, FeedSender};

#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    model_uuid: String,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    model: Option<Model>,
    migrations: Vec<MigrationDoc>,
    migration_watchers: Vec<FeedSender>,
}

#[derive(Debug)]
struct MigrationDoc {
    id: String,
    attempt: u32,
    phase: Phase,
    phase_changed_time: DateTime<Utc>,
    status_message: String,
    target: TargetInfo,
    agents: BTreeSet<Tag>,
    reports: HashMap<Phase, HashMap<Tag, bool>>,
    report_watchers: Vec<FeedSender>,
}

impl MigrationDoc {
    fn reports_for(&self, phase: Phase) -> MinionReports {
        let recorded = self.reports.get(&phase);
        let mut out = MinionReports::default();
        for agent in &self.agents {
            match recorded.and_then(|r| r.get(agent)) {
                Some(true) => out.succeeded.push(agent.clone()),
                Some(false) => out.failed.push(agent.clone()),
                None => out.unknown.push(agent.clone()),
            }
        }
        out
    }
}

fn notify_all(senders: &mut Vec<FeedSender>) {
    senders.retain(FeedSender::notify);
}

fn new_feed(senders: &mut Vec<FeedSender>) -> ChangeFeed {
    senders.retain(|tx| !tx.is_closed());
    let (tx, feed) = change_feed();
    // The initial event stands for the state at subscription time.
    tx.notify();
    senders.push(tx);
    feed
}

impl InMemoryBackend {
    pub fn new(model: Model) -> Self {
        Self {
            inner: Arc::new(Inner {
                model_uuid: model.uuid.clone(),
                state: Mutex::new(State {
                    model: Some(model),
                    migrations: Vec::new(),
                    migration_watchers: Vec::new(),
                }),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner.lock_state()
    }

    /// Creates a new migration attempt in QUIESCE. Only one attempt may be
    /// in progress at a time; `agents` is the set expected to report each phase.
    pub fn start_migration(
        &self,
        target: TargetInfo,
        agents: impl IntoIterator<Item = Tag>,
    ) -> Result<String, StoreError> {
        target.validate().map_err(|e| anyhow!("invalid target: {e}"))?;
        let mut state = self.state();
        if state.model.is_none() {
            return Err(StoreError::NotFound("model".to_string()));
        }
        if let Some(active) = state.migrations.last().filter(|m| !m.phase.is_terminal()) {
            return Err(anyhow!("model already migrating (migration {})", active.id).into());
        }

        let attempt = state.migrations.len() as u32;
        let id = format!("{}:{}", self.inner.model_uuid, attempt);
        state.migrations.push(MigrationDoc {
            id: id.clone(),
            attempt,
            phase: Phase::Quiesce,
            phase_changed_time: Utc::now(),
            status_message: String::new(),
            target,
            agents: agents.into_iter().collect(),
            reports: HashMap::new(),
            report_watchers: Vec::new(),
        });
        notify_all(&mut state.migration_watchers);
        info!(migration_id = %id, attempt, "migration started");
        Ok(id)
    }

    /// Records one agent's outcome for a phase. A repeated report for the
    /// same agent and phase is ignored.
    pub fn report_minion(
        &self,
        migration_id: &str,
        agent: &Tag,
        phase: Phase,
        success: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state();
        let doc = state
            .migrations
            .iter_mut()
            .find(|m| m.id == migration_id)
            .ok_or_else(|| StoreError::NotFound(format!("migration {migration_id}")))?;
        if !doc.agents.contains(agent) {
            return Err(anyhow!("{agent} is not part of migration {migration_id}").into());
        }

        let recorded = doc.reports.entry(phase).or_default();
        if recorded.contains_key(agent) {
            debug!(%agent, %phase, "duplicate minion report ignored");
            return Ok(());
        }
        recorded.insert(agent.clone(), success);
        if phase == doc.phase {
            notify_all(&mut doc.report_watchers);
        }
        debug!(%agent, %phase, success, "minion report recorded");
        Ok(())
    }

    /// Whether the exported model's documents are still present.
    pub fn has_model_docs(&self) -> bool {
        self.state().model.is_some()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn latest_migration(&self) -> Result<Box<dyn ModelMigration>, StoreError> {
        let state = self.state();
        let doc = state
            .migrations
            .last()
            .ok_or_else(|| StoreError::NotFound(format!("migration for model {}", self.inner.model_uuid)))?;
        Ok(Box::new(MemoryMigration {
            inner: Arc::clone(&self.inner),
            id: doc.id.clone(),
            attempt: doc.attempt,
            phase: doc.phase,
            phase_changed_time: doc.phase_changed_time,
            status_message: doc.status_message.clone(),
        }))
    }

    fn watch_for_migration(&self) -> ChangeFeed {
        new_feed(&mut self.state().migration_watchers)
    }

    async fn remove_exporting_model_docs(&self) -> Result<(), StoreError> {
        let mut state = self.state();
        let phase = state
            .migrations
            .last()
            .map(|m| m.phase)
            .ok_or_else(|| StoreError::NotFound("migration".to_string()))?;
        if !matches!(phase, Phase::Reap | Phase::Done) {
            return Err(anyhow!("cannot remove model documents in phase {phase}").into());
        }
        if state.model.take().is_some() {
            info!(model_uuid = %self.inner.model_uuid, "removed exported model documents");
        }
        Ok(())
    }

    async fn export(&self) -> Result<Model, StoreError> {
        self.state()
            .model
            .clone()
            .ok_or_else(|| StoreError::NotFound("model".to_string()))
    }
}

/// Snapshot of one migration document taken when the handle was loaded.
#[derive(Debug)]
struct MemoryMigration {
    inner: Arc<Inner>,
    id: String,
    attempt: u32,
    phase: Phase,
    phase_changed_time: DateTime<Utc>,
    status_message: String,
}

impl MemoryMigration {
    fn with_doc<T>(
        &self,
        f: impl FnOnce(&mut MigrationDoc, &mut Vec<FeedSender>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.inner.lock_state();
        let state = &mut *guard;
        let doc = state
            .migrations
            .iter_mut()
            .find(|m| m.id == self.id)
            .ok_or_else(|| StoreError::NotFound(format!("migration {}", self.id)))?;
        f(doc, &mut state.migration_watchers)
    }
}

#[async_trait]
impl ModelMigration for MemoryMigration {
    fn id(&self) -> &str {
        &self.id
    }

    fn model_uuid(&self) -> &str {
        &self.inner.model_uuid
    }

    fn phase_changed_time(&self) -> DateTime<Utc> {
        self.phase_changed_time
    }

    fn status_message(&self) -> &str {
        &self.status_message
    }

    async fn attempt(&self) -> Result<u32, StoreError> {
        Ok(self.attempt)
    }

    async fn phase(&self) -> Result<Phase, StoreError> {
        Ok(self.phase)
    }

    async fn target_info(&self) -> Result<TargetInfo, StoreError> {
        self.with_doc(|doc, _| Ok(doc.target.clone()))
    }

    async fn set_phase(&self, phase: Phase) -> Result<(), StoreError> {
        let expected = self.phase;
        self.with_doc(|doc, migration_watchers| {
            if doc.phase != expected {
                return Err(StoreError::PhaseConflict {
                    expected,
                    actual: doc.phase,
                });
            }
            if !doc.phase.can_transition_to(phase) {
                return Err(StoreError::IllegalTransition {
                    from: doc.phase,
                    to: phase,
                });
            }
            doc.phase = phase;
            doc.phase_changed_time = Utc::now().max(doc.phase_changed_time);
            notify_all(migration_watchers);
            // The current phase selects which reports are visible.
            notify_all(&mut doc.report_watchers);
            info!(migration_id = %doc.id, from = %expected, to = %phase, "migration phase changed");
            Ok(())
        })
    }

    async fn set_status_message(&self, message: &str) -> Result<(), StoreError> {
        self.with_doc(|doc, migration_watchers| {
            doc.status_message = message.to_string();
            notify_all(migration_watchers);
            Ok(())
        })
    }

    async fn watch_minion_reports(&self) -> Result<ChangeFeed, StoreError> {
        self.with_doc(|doc, _| Ok(new_feed(&mut doc.report_watchers)))
    }

    async fn minion_reports(&self) -> Result<MinionReports, StoreError> {
        self.with_doc(|doc, _| Ok(doc.reports_for(doc.phase)))
    }
}
