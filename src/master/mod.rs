// Migration Master - controller-side facade driving one model's migration
//
// Every call resolves the latest migration afresh; the facade holds no lock
// of its own and leaves serialization of phase writes to the backing store.

pub mod auth;
pub mod params;

pub use auth::{Authorizer, StaticAuthorizer};
pub use params::{
    MasterMigrationStatus, MigrationTargetInfo, ModelMigrationSpec, NotifyWatchResult,
    SetMigrationPhaseArgs, SetMigrationStatusMessageArgs,
};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Instrument, Span};

use crate::backend::{Backend, ModelMigration};
use crate::error::MigrationError;
use crate::migration::{MinionReportsSummary, Phase};
use crate::model::ExportBundle;
use crate::names::Tag;
use crate::telemetry::{create_migration_span, generate_correlation_id};
use crate::watcher::{ChangeFeed, NotifyWatcher, Resources};

pub struct MigrationMaster {
    backend: Arc<dyn Backend>,
    resources: Arc<Resources>,
    watch_timeout: Option<Duration>,
}

impl MigrationMaster {
    /// Fails with `PermissionDenied` unless the caller manages the model.
    pub fn new(
        backend: Arc<dyn Backend>,
        resources: Arc<Resources>,
        authorizer: &dyn Authorizer,
    ) -> Result<Self, MigrationError> {
        if !authorizer.auth_model_manager() {
            return Err(MigrationError::PermissionDenied);
        }
        Ok(Self {
            backend,
            resources,
            watch_timeout: None,
        })
    }

    /// Bounds how long a new watcher may wait for its feed's initial event.
    pub fn with_watch_timeout(mut self, limit: Duration) -> Self {
        self.watch_timeout = Some(limit);
        self
    }

    pub fn resources(&self) -> &Arc<Resources> {
        &self.resources
    }

    async fn migration(&self) -> Result<Box<dyn ModelMigration>, MigrationError> {
        let mig = self
            .backend
            .latest_migration()
            .await
            .map_err(MigrationError::NoMigration)?;
        Span::current().record("migration.id", mig.id());
        Ok(mig)
    }

    async fn register_watcher(&self, feed: ChangeFeed) -> Result<NotifyWatchResult, MigrationError> {
        let watcher = match self.watch_timeout {
            Some(limit) => NotifyWatcher::start_with_timeout(feed, limit).await?,
            None => NotifyWatcher::start(feed).await?,
        };
        let notify_watcher_id = self.resources.register(watcher);
        debug!(resource_id = %notify_watcher_id, "watcher registered");
        Ok(NotifyWatchResult { notify_watcher_id })
    }

    /// Watches for changes to the model's migration records.
    pub async fn watch(&self) -> Result<NotifyWatchResult, MigrationError> {
        let span = create_migration_span("watch", &generate_correlation_id());
        async {
            let feed = self.backend.watch_for_migration();
            self.register_watcher(feed).await
        }
        .instrument(span)
        .await
    }

    pub async fn get_migration_status(&self) -> Result<MasterMigrationStatus, MigrationError> {
        let span = create_migration_span("get_migration_status", &generate_correlation_id());
        async {
            let mig = self.migration().await?;
            let phase = mig
                .phase()
                .await
                .map_err(MigrationError::persistence("read migration phase"))?;
            let attempt = mig
                .attempt()
                .await
                .map_err(MigrationError::persistence("read migration attempt"))?;
            let target = mig
                .target_info()
                .await
                .map_err(MigrationError::persistence("read target info"))?;
            let model_tag = Tag::Model(mig.model_uuid().to_string());

            debug!(%phase, attempt, "migration status read");
            Ok(MasterMigrationStatus {
                spec: ModelMigrationSpec {
                    model_tag: model_tag.to_string(),
                    target_info: MigrationTargetInfo {
                        controller_tag: target.controller_tag.to_string(),
                        addrs: target.addrs,
                        ca_cert: target.ca_cert,
                        auth_tag: target.auth_tag.to_string(),
                        password: target.password,
                    },
                },
                migration_id: mig.id().to_string(),
                attempt,
                phase: phase.to_string(),
                phase_changed_time: mig.phase_changed_time(),
                status_message: mig.status_message().to_string(),
            })
        }
        .instrument(span)
        .await
    }

    /// Moves the migration to the named phase. Only the name is checked
    /// here; whether the transition is allowed is up to the backing store.
    pub async fn set_phase(&self, args: SetMigrationPhaseArgs) -> Result<(), MigrationError> {
        let span = create_migration_span("set_phase", &generate_correlation_id());
        async {
            let mig = self.migration().await?;
            let phase: Phase = args
                .phase
                .parse()
                .map_err(|_| MigrationError::InvalidPhase(args.phase.clone()))?;
            mig.set_phase(phase)
                .await
                .map_err(MigrationError::persistence("set phase"))?;
            info!(%phase, "migration phase set");
            Ok(())
        }
        .instrument(span)
        .await
    }

    pub async fn set_status_message(
        &self,
        args: SetMigrationStatusMessageArgs,
    ) -> Result<(), MigrationError> {
        let span = create_migration_span("set_status_message", &generate_correlation_id());
        async {
            let mig = self.migration().await?;
            mig.set_status_message(&args.message)
                .await
                .map_err(MigrationError::persistence("set status message"))?;
            info!(message = %args.message, "migration status message set");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Serializes the model along with the charms and tools it references.
    pub async fn export(&self) -> Result<ExportBundle, MigrationError> {
        let span = create_migration_span("export", &generate_correlation_id());
        async {
            let model = self.backend.export().await?;
            let bundle = ExportBundle::from_model(&model)?;
            info!(
                bytes = bundle.bytes.len(),
                charms = bundle.charms.len(),
                tools = bundle.tools.len(),
                "model exported"
            );
            Ok(bundle)
        }
        .instrument(span)
        .await
    }

    /// Removes the exported model's documents from the source controller.
    pub async fn reap(&self) -> Result<(), MigrationError> {
        let span = create_migration_span("reap", &generate_correlation_id());
        async {
            self.backend.remove_exporting_model_docs().await?;
            info!("exported model documents removed");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Watches agent reports for the current migration.
    pub async fn watch_minion_reports(&self) -> Result<NotifyWatchResult, MigrationError> {
        let span = create_migration_span("watch_minion_reports", &generate_correlation_id());
        async {
            let mig = self.migration().await?;
            let feed = mig
                .watch_minion_reports()
                .await
                .map_err(MigrationError::persistence("watch minion reports"))?;
            self.register_watcher(feed).await
        }
        .instrument(span)
        .await
    }

    /// Summarizes agent reports for whatever phase is current when called.
    pub async fn get_minion_reports(&self) -> Result<MinionReportsSummary, MigrationError> {
        let span = create_migration_span("get_minion_reports", &generate_correlation_id());
        async {
            let mig = self.migration().await?;
            let phase = mig
                .phase()
                .await
                .map_err(MigrationError::persistence("read migration phase"))?;
            let reports = mig
                .minion_reports()
                .await
                .map_err(MigrationError::persistence("get minion reports"))?;
            let summary = reports.summarize(mig.id(), phase);
            debug!(
                %phase,
                succeeded = summary.success_count,
                failed = summary.failed.len(),
                unknown = summary.unknown_count,
                "minion reports summarized"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}
