use std::process::ExitCode;

use aipsync_core::{PublicationCycle, RunState, snapshot::read_snapshot};
use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use tabled::Tabled;

use crate::config::Config;
use crate::utils::ui::table::{FormatConfig, Formatter};

#[derive(Args, Clone, Debug)]
pub struct StatusArg {
    #[arg(long, help = "Only show the run state")]
    pub brief: bool,
}

#[derive(Tabled)]
struct StateRow {
    field: &'static str,
    value: String,
}

#[derive(Tabled)]
struct UnitRow {
    unit:      String,
    parts:     usize,
    retries:   u32,
    artifacts: String,
}

pub fn status(arg: StatusArg, config: &Config) -> Result<ExitCode> {
    let state = RunState::load(&config.sync.state_file)?;
    println!("{}", state_table(&state, Utc::now()));

    if !arg.brief {
        match read_snapshot(&config.sync.snapshot_file) {
            Ok(cycle) => println!("\n{}", units_table(&cycle)),
            Err(e) => eprintln!("no cycle snapshot: {e}"),
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn date(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M").to_string())
}

fn state_table(state: &RunState, now: DateTime<Utc>) -> String {
    let rows = [
        StateRow {
            field: "effective",
            value: date(state.effective_date),
        },
        StateRow {
            field: "next",
            value: date(state.next_effective_date),
        },
        StateRow {
            field: "last run",
            value: date(state.last_run),
        },
        StateRow {
            field: "due",
            value: state.is_due(now).to_string(),
        },
    ];
    Formatter::default(
        rows,
        FormatConfig {
            header: Some("run state".into()),
            hide_titles: true,
            ..FormatConfig::default()
        },
    )
    .to_string()
}

fn units_table(cycle: &PublicationCycle) -> String {
    let rows = cycle.units.iter().map(|u| UnitRow {
        unit:      u.code.clone(),
        parts:     u.parts.len(),
        retries:   u.download_count,
        artifacts: u
            .artifacts
            .iter()
            .map(|a| a.file_name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    });
    Formatter::default(
        rows,
        FormatConfig {
            header: Some(format!("cycle {}", cycle.effective_date.date_naive())),
            footer: Some(cycle.source_root.clone()),
            ..FormatConfig::default()
        },
    )
    .to_string()
}
