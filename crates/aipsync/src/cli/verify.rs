use std::process::ExitCode;
use std::time::Duration;

use aipsync_codec::PdfCodec;
use aipsync_core::{ArtifactCheck, Catalog, Pipeline, Verdict};
use aipsync_fetch::ReqwestClient;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use tabled::Tabled;

use crate::config::Config;
use crate::utils::ui::table::{FormatConfig, Formatter};

#[derive(Args, Clone, Debug)]
pub struct VerifyArg {
    #[arg(help = "Unit code, as listed in the catalog")]
    pub unit: String,
}

#[derive(Tabled)]
struct CheckRow {
    artifact: String,
    verdict:  String,
    update:   bool,
}

/// Exits with failure when any artifact would be rewritten by the next sync.
pub async fn verify(arg: VerifyArg, config: Config) -> Result<ExitCode> {
    let catalog = Catalog::load(&config.catalog)?;
    let cycle = catalog.activate(Utc::now())?;

    let client = ReqwestClient::new(Duration::from_secs(config.connect_timeout_secs))
        .context("Failed to build HTTP client")?;
    let pipeline = Pipeline::new(config.sync, client, PdfCodec)?;
    let checks = pipeline.verify_unit(&cycle, &arg.unit).await?;

    if checks.is_empty() {
        println!("{} has fewer than two parts, nothing is merged", arg.unit);
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", checks_table(&arg.unit, &checks));
    let stale = checks.iter().any(|c| c.verdict.needs_update());
    Ok(if stale { ExitCode::FAILURE } else { ExitCode::SUCCESS })
}

fn describe(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Missing => "missing".into(),
        Verdict::Unknown => "metadata unreadable".into(),
        Verdict::Stale { modified } => format!("stale, modified {}", modified.date_naive()),
        Verdict::Unreadable { reason } => format!("unreadable: {reason}"),
        Verdict::PageCountMismatch {
            existing,
            candidate,
        } => format!("{existing} pages, expected {candidate}"),
        Verdict::SizeMismatch {
            existing,
            candidate,
        } => format!("{existing} bytes, rebuilt {candidate}"),
        Verdict::CandidateUnrenderable { reason } => format!("rebuild failed: {reason}"),
        Verdict::UpToDate => "up to date".into(),
    }
}

fn checks_table(unit: &str, checks: &[ArtifactCheck]) -> String {
    let rows = checks.iter().map(|c| CheckRow {
        artifact: c
            .path
            .file_name()
            .map_or_else(|| c.path.display().to_string(), |n| n.to_string_lossy().into_owned()),
        verdict:  describe(&c.verdict),
        update:   c.verdict.needs_update(),
    });
    Formatter::default(
        rows,
        FormatConfig {
            header: Some(unit.to_string()),
            ..FormatConfig::default()
        },
    )
    .to_string()
}
