//! Stub backing store for migration master tests - records calls, no side effects
#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

use migration_master::backend::{Backend, ModelMigration, StoreError};
use migration_master::migration::{MinionReports, Phase, TargetInfo};
use migration_master::model::Model;
use migration_master::watcher::{change_feed, ChangeFeed, FeedSender};
use migration_master::Tag;

pub static MODEL_UUID: Lazy<String> = Lazy::new(|| uuid::Uuid::new_v4().to_string());
pub static CONTROLLER_UUID: Lazy<String> = Lazy::new(|| uuid::Uuid::new_v4().to_string());

pub fn phase_changed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 6, 22, 16, 38, 0).unwrap()
}

pub fn target_info() -> TargetInfo {
    TargetInfo {
        controller_tag: Tag::controller(&CONTROLLER_UUID).unwrap(),
        addrs: vec!["1.1.1.1:1".to_string(), "2.2.2.2:2".to_string()],
        ca_cert: "trust me".to_string(),
        auth_tag: Tag::user("admin").unwrap(),
        password: "secret".to_string(),
    }
}

fn store_err(message: &Mutex<Option<String>>) -> Result<(), StoreError> {
    match message.lock().unwrap().clone() {
        Some(text) => Err(anyhow!(text).into()),
        None => Ok(()),
    }
}

/// Shared record of backend calls, in order.
#[derive(Debug, Default)]
pub struct CallLog {
    calls: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn add_call(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// Keeps feed senders alive so feeds stay open after their initial event.
#[derive(Debug, Default)]
pub struct FakeFeeds {
    senders: Mutex<Vec<FeedSender>>,
}

impl FakeFeeds {
    pub fn new_feed(&self) -> ChangeFeed {
        let (tx, feed) = change_feed();
        tx.notify();
        self.senders.lock().unwrap().push(tx);
        feed
    }

    /// Signals a change on every open feed.
    pub fn fire(&self) {
        for tx in self.senders.lock().unwrap().iter() {
            tx.notify();
        }
    }

    pub fn all_closed(&self) -> bool {
        self.senders.lock().unwrap().iter().all(FeedSender::is_closed)
    }
}

#[derive(Debug, Default)]
pub struct MigrationState {
    set_phase_err: Mutex<Option<String>>,
    phase_set: Mutex<Option<Phase>>,
    set_message_err: Mutex<Option<String>>,
    message_set: Mutex<Option<String>>,
    minion_reports: Mutex<MinionReports>,
    pub report_feeds: FakeFeeds,
}

#[derive(Debug, Clone)]
pub struct StubMigration {
    calls: Arc<CallLog>,
    state: Arc<MigrationState>,
}

impl StubMigration {
    pub fn fail_set_phase(&self, message: &str) {
        *self.state.set_phase_err.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_set_message(&self, message: &str) {
        *self.state.set_message_err.lock().unwrap() = Some(message.to_string());
    }

    pub fn phase_set(&self) -> Option<Phase> {
        *self.state.phase_set.lock().unwrap()
    }

    pub fn message_set(&self) -> Option<String> {
        self.state.message_set.lock().unwrap().clone()
    }

    pub fn set_minion_reports(&self, reports: MinionReports) {
        *self.state.minion_reports.lock().unwrap() = reports;
    }

    pub fn report_feeds(&self) -> &FakeFeeds {
        &self.state.report_feeds
    }
}

#[async_trait]
impl ModelMigration for StubMigration {
    fn id(&self) -> &str {
        "id"
    }

    fn model_uuid(&self) -> &str {
        &MODEL_UUID
    }

    fn phase_changed_time(&self) -> DateTime<Utc> {
        phase_changed_time()
    }

    fn status_message(&self) -> &str {
        "waiting for agents"
    }

    async fn attempt(&self) -> Result<u32, StoreError> {
        Ok(1)
    }

    async fn phase(&self) -> Result<Phase, StoreError> {
        Ok(Phase::Precheck)
    }

    async fn target_info(&self) -> Result<TargetInfo, StoreError> {
        Ok(target_info())
    }

    async fn set_phase(&self, phase: Phase) -> Result<(), StoreError> {
        store_err(&self.state.set_phase_err)?;
        *self.state.phase_set.lock().unwrap() = Some(phase);
        Ok(())
    }

    async fn set_status_message(&self, message: &str) -> Result<(), StoreError> {
        store_err(&self.state.set_message_err)?;
        *self.state.message_set.lock().unwrap() = Some(message.to_string());
        Ok(())
    }

    async fn watch_minion_reports(&self) -> Result<ChangeFeed, StoreError> {
        self.calls.add_call("ModelMigration.WatchMinionReports");
        Ok(self.state.report_feeds.new_feed())
    }

    async fn minion_reports(&self) -> Result<MinionReports, StoreError> {
        Ok(self.state.minion_reports.lock().unwrap().clone())
    }
}

#[derive(Debug)]
pub struct StubBackend {
    pub calls: Arc<CallLog>,
    pub migration: StubMigration,
    pub migration_feeds: FakeFeeds,
    get_err: Mutex<Option<String>>,
    remove_err: Mutex<Option<String>>,
    export_err: Mutex<Option<String>>,
    model: Mutex<Model>,
}

impl StubBackend {
    pub fn new() -> Self {
        let calls = Arc::new(CallLog::default());
        let mut model = Model::new(&MODEL_UUID, "default", "admin");
        model.latest_tools_version = Some("2.0.1".to_string());
        Self {
            migration: StubMigration {
                calls: Arc::clone(&calls),
                state: Arc::new(MigrationState::default()),
            },
            calls,
            migration_feeds: FakeFeeds::default(),
            get_err: Mutex::new(None),
            remove_err: Mutex::new(None),
            export_err: Mutex::new(None),
            model: Mutex::new(model),
        }
    }

    pub fn fail_get(&self, message: &str) {
        *self.get_err.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_remove(&self, message: &str) {
        *self.remove_err.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_export(&self, message: &str) {
        *self.export_err.lock().unwrap() = Some(message.to_string());
    }

    pub fn with_model<T>(&self, f: impl FnOnce(&mut Model) -> T) -> T {
        f(&mut self.model.lock().unwrap())
    }
}

#[async_trait]
impl Backend for StubBackend {
    async fn latest_migration(&self) -> Result<Box<dyn ModelMigration>, StoreError> {
        self.calls.add_call("LatestModelMigration");
        store_err(&self.get_err)?;
        Ok(Box::new(self.migration.clone()))
    }

    fn watch_for_migration(&self) -> ChangeFeed {
        self.calls.add_call("WatchForModelMigration");
        self.migration_feeds.new_feed()
    }

    async fn remove_exporting_model_docs(&self) -> Result<(), StoreError> {
        self.calls.add_call("RemoveExportingModelDocs");
        store_err(&self.remove_err)
    }

    async fn export(&self) -> Result<Model, StoreError> {
        self.calls.add_call("Export");
        store_err(&self.export_err)?;
        Ok(self.model.lock().unwrap().clone())
    }
}
