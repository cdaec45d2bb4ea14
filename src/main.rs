use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use migration_master::master::{SetMigrationPhaseArgs, SetMigrationStatusMessageArgs};
use migration_master::{
    config, init_telemetry, ExportBundle, InMemoryBackend, MigrationMaster, MinionReports,
    MinionReportsSummary, Model, NotifyWatcher, Phase, Resources, StaticAuthorizer, Tag,
};

#[derive(Parser)]
#[command(name = "migration-master")]
#[command(about = "Controller-side coordination of live model migrations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List migration phases and the phases each may move to
    Phases,
    /// Build the export manifest for a model description (JSON)
    Export {
        /// Path to the model description
        model: PathBuf,
    },
    /// Summarize a minion report set (JSON)
    Reports {
        /// Path to the report set
        reports: PathBuf,
        /// Phase the reports belong to
        #[arg(long, default_value = "QUIESCE")]
        phase: String,
        /// Migration id to annotate the summary with
        #[arg(long, default_value = "local")]
        migration_id: String,
    },
    /// Drive a complete migration against an in-memory controller
    Simulate {
        /// Number of machine agents in the model
        #[arg(long, default_value = "16")]
        agents: usize,
        /// Machine id of an agent that fails its QUIESCE report
        #[arg(long)]
        fail_agent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config()?;
    init_telemetry(&cfg.observability.log_level, cfg.observability.json_logs)?;

    match cli.command {
        Commands::Phases => {
            list_phases();
            Ok(())
        }
        Commands::Export { model } => export_model(&model),
        Commands::Reports {
            reports,
            phase,
            migration_id,
        } => summarize_reports(&reports, &phase, &migration_id),
        Commands::Simulate { agents, fail_agent } => simulate(agents, fail_agent).await,
    }
}

fn list_phases() {
    for phase in Phase::ALL {
        let next: Vec<&str> = phase.successors().iter().map(Phase::as_str).collect();
        let marker = if phase.is_terminal() { " (terminal)" } else { "" };
        println!("{:<12} -> [{}]{}", phase.as_str(), next.join(", "), marker);
    }
}

fn export_model(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading model description {}", path.display()))?;
    let model: Model = serde_json::from_str(&text).context("parsing model description")?;
    let bundle = ExportBundle::from_model(&model)?;
    let manifest = serde_json::json!({
        "bytes": bundle.bytes.len(),
        "charms": bundle.charms,
        "tools": bundle.tools,
    });
    println!("{}", serde_json::to_string_pretty(&manifest)?);
    Ok(())
}

fn summarize_reports(path: &Path, phase: &str, migration_id: &str) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading report set {}", path.display()))?;
    let reports: MinionReports = serde_json::from_str(&text).context("parsing report set")?;
    let phase: Phase = phase.parse()?;
    let summary = reports.summarize(migration_id, phase);
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Phases in which every agent must report before the migration moves on.
fn needs_minion_reports(phase: Phase) -> bool {
    matches!(phase, Phase::Quiesce | Phase::Validation | Phase::Success)
}

async fn simulate(agent_count: usize, fail_agent: Option<String>) -> Result<()> {
    let cfg = config()?;

    let mut model = Model::new(&Uuid::new_v4().to_string(), "simulated", "admin");
    model.latest_tools_version = Some("2.0.0".to_string());
    model.add_application("ubuntu", "cs:ubuntu-10");
    let mut agents = Vec::with_capacity(agent_count);
    for i in 0..agent_count {
        let id = i.to_string();
        model.add_machine(&id).set_tools("2.0.0-xenial-amd64".parse()?);
        agents.push(Tag::machine(&id)?);
    }
    let failing = fail_agent.map(|id| Tag::machine(&id)).transpose()?;

    let backend = Arc::new(InMemoryBackend::new(model));
    let resources = Arc::new(Resources::new());
    let master = MigrationMaster::new(
        backend.clone(),
        resources.clone(),
        &StaticAuthorizer::model_manager(),
    )?
    .with_watch_timeout(Duration::from_millis(cfg.watcher.initial_event_timeout_ms));

    let watch = master.watch().await?;
    let migration_watcher = resources
        .get(&watch.notify_watcher_id)
        .ok_or_else(|| anyhow!("migration watcher {} not registered", watch.notify_watcher_id))?;

    let migration_id = backend.start_migration(cfg.target.to_target_info()?, agents.clone())?;
    next_change(&migration_watcher, "migration").await?;
    let status = master.get_migration_status().await?;
    println!("migration {} started in {}", status.migration_id, status.phase);

    let mut phase = Phase::Quiesce;
    while !phase.is_terminal() {
        if needs_minion_reports(phase) {
            let summary = collect_reports(
                &master,
                &resources,
                &backend,
                &migration_id,
                &agents,
                phase,
                failing.as_ref(),
            )
            .await?;
            println!(
                "{}: {} succeeded, {} failed, {} pending",
                summary.phase,
                summary.success_count,
                summary.failed.len(),
                summary.unknown_count
            );
            if !summary.failed.is_empty() && phase.can_transition_to(Phase::Abort) {
                warn!(failed = ?summary.failed, "agents failed, aborting migration");
                advance(&master, Phase::Abort, "aborting: agents failed").await?;
                phase = Phase::Abort;
                continue;
            }
        }

        match phase {
            Phase::Import => {
                let bundle = master.export().await?;
                println!(
                    "exported {} bytes, charms {:?}, {} tools artifacts",
                    bundle.bytes.len(),
                    bundle.charms,
                    bundle.tools.len()
                );
            }
            Phase::Reap => master.reap().await?,
            _ => {}
        }

        let next = phase
            .successors()
            .first()
            .copied()
            .ok_or_else(|| anyhow!("no phase follows {phase}"))?;
        advance(&master, next, &format!("moving to {next}")).await?;
        next_change(&migration_watcher, "migration").await?;
        info!(from = %phase, to = %next, "migration change observed");
        phase = next;
    }

    let status = master.get_migration_status().await?;
    println!("migration {} finished in {}", status.migration_id, status.phase);
    resources.stop_all().await;
    Ok(())
}

/// Waits for a change, failing if the watcher was stopped instead.
async fn next_change(watcher: &NotifyWatcher, what: &str) -> Result<()> {
    watcher
        .next()
        .await
        .ok_or_else(|| anyhow!("{what} watcher stopped"))
}

async fn advance(master: &MigrationMaster, phase: Phase, message: &str) -> Result<()> {
    master
        .set_status_message(SetMigrationStatusMessageArgs {
            message: message.to_string(),
        })
        .await?;
    master
        .set_phase(SetMigrationPhaseArgs {
            phase: phase.to_string(),
        })
        .await?;
    Ok(())
}

/// Has every agent report for `phase` and waits, through a minion report
/// watcher, until none are pending.
async fn collect_reports(
    master: &MigrationMaster,
    resources: &Resources,
    backend: &Arc<InMemoryBackend>,
    migration_id: &str,
    agents: &[Tag],
    phase: Phase,
    failing: Option<&Tag>,
) -> Result<MinionReportsSummary> {
    let watch = master.watch_minion_reports().await?;
    let watcher = resources
        .get(&watch.notify_watcher_id)
        .ok_or_else(|| anyhow!("report watcher {} not registered", watch.notify_watcher_id))?;

    for (i, agent) in agents.iter().enumerate() {
        let backend = Arc::clone(backend);
        let agent = agent.clone();
        let migration_id = migration_id.to_string();
        let success = failing != Some(&agent) || phase != Phase::Quiesce;
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis((i % 7) as u64)).await;
            if let Err(e) = backend.report_minion(&migration_id, &agent, phase, success) {
                warn!(%agent, error = %e, "minion report rejected");
            }
        });
    }

    let summary = loop {
        let summary = master.get_minion_reports().await?;
        if summary.unknown_count == 0 {
            break summary;
        }
        next_change(&watcher, "minion report").await?;
    };
    resources.stop(&watch.notify_watcher_id).await;
    Ok(summary)
}
