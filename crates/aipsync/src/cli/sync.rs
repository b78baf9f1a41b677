use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use aipsync_codec::PdfCodec;
use aipsync_core::{Catalog, Pipeline, RunReport, SyncOutcome, SyncRequest, publish};
use aipsync_fetch::{DirectoryUploader, ReqwestClient};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tabled::Tabled;
use tracing::info;

use crate::config::Config;
use crate::utils::ui::table::{FormatConfig, Formatter};
use crate::utils::ui::tracker::{ProgressTrackerBuilder, Tracker, TrackerBuilder};

#[derive(Args, Clone, Debug)]
pub struct SyncArg {
    #[arg(long, help = "Run even when the recorded cycle is still current")]
    pub force:      bool,
    #[arg(long, help = "Download every part again")]
    pub refetch:    bool,
    #[arg(long, help = "Do not copy merged artifacts to the publish root")]
    pub no_publish: bool,
    #[arg(long, help = "Show a progress bar, logging only warnings")]
    pub progress:   bool,
    #[arg(long, help = "Catalog file, overrides the config")]
    pub catalog:    Option<PathBuf>,
    #[arg(long, help = "Download workers, overrides the config")]
    pub workers:    Option<usize>,
}

#[derive(Tabled)]
struct UnitRow {
    unit:      String,
    passes:    u32,
    retries:   u32,
    syncs:     u32,
    artifacts: String,
}

#[derive(Tabled)]
struct FailureRow {
    unit:   String,
    reason: String,
}

pub async fn sync(arg: SyncArg, mut config: Config) -> Result<ExitCode> {
    if let Some(catalog) = arg.catalog {
        config.catalog = catalog;
    }
    if let Some(workers) = arg.workers {
        config.sync.workers = workers;
    }

    let catalog = Catalog::load(&config.catalog)?;
    let client = ReqwestClient::new(Duration::from_secs(config.connect_timeout_secs))
        .context("Failed to build HTTP client")?;

    let tracker = ProgressTrackerBuilder::default()
        .with_prefix("sync")
        .with_finish("done")
        .hidden(!arg.progress)
        .build();
    let pipeline = Pipeline::new(config.sync.clone(), client, PdfCodec)?.with_events(tracker.events());

    let request = SyncRequest {
        force:   arg.force,
        refetch: arg.refetch,
        now:     Utc::now(),
    };
    let outcome = pipeline.sync(catalog, request).await;
    tracker.finish();

    let (cycle, report) = match outcome? {
        SyncOutcome::NotDue { next } => {
            match next {
                Some(next) => println!("Archive is current until {}", next.date_naive()),
                None => println!("Archive is current"),
            }
            return Ok(ExitCode::SUCCESS);
        }
        SyncOutcome::Completed { cycle, report } => (cycle, report),
    };

    println!("{}", report_table(&report, &cycle.effective_date.date_naive().to_string()));

    if !report.is_success() {
        return Ok(ExitCode::FAILURE);
    }

    if let Some(root) = config.publish_root.filter(|_| !arg.no_publish) {
        let published = publish(&DirectoryUploader::new(&root), &cycle, &pipeline.layout(&cycle)).await;
        info!(root = %root.display(), uploaded = published.uploaded, "published merged artifacts");
        for (path, reason) in &published.failed {
            eprintln!("not published {}: {reason}", path.display());
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn report_table(report: &RunReport, effective: &str) -> String {
    let rows = report.units.iter().map(|u| UnitRow {
        unit:      u.code.clone(),
        passes:    u.passes,
        retries:   u.retries,
        syncs:     u.syncs,
        artifacts: format!(
            "{}/{}",
            u.artifacts.iter().filter(|a| a.written).count(),
            u.artifacts.len()
        ),
    });
    let mut out = Formatter::default(
        rows,
        FormatConfig {
            header: Some(format!("cycle {effective}")),
            footer: Some(format!(
                "{} parts fetched, {} artifacts written",
                report.fetched_parts,
                report.written_artifacts()
            )),
            ..FormatConfig::default()
        },
    )
    .to_string();

    if !report.failures.is_empty() {
        let failures = report.failures.iter().map(|f| FailureRow {
            unit:   f.unit.clone(),
            reason: f.reason.clone(),
        });
        let table = Formatter::default(
            failures,
            FormatConfig {
                header: Some("failed".into()),
                ..FormatConfig::default()
            },
        );
        out.push_str(&format!("\n\n{table}"));
    }
    out
}
