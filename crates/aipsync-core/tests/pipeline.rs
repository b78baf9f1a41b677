use std::path::Path;
use std::sync::{Arc, Mutex};

use aipsync_codec::{DocumentCodec, LineCodec, PagedDocument};
use aipsync_core::{
    ArtifactKind, Catalog, ContentKind, Events, Part, Pipeline, PublicationCycle, SyncConfig,
    SyncError, SyncEvent, SyncOutcome, SyncRequest, Unit, Verdict,
};
use aipsync_fetch::MockHttpClient;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

const ROOT: &str = "https://aip.example/20261001";

fn config(dir: &TempDir) -> SyncConfig {
    SyncConfig {
        local_root: dir.path().join("aip"),
        retry_backoff_ms: 0,
        fetch_timeout_secs: 5,
        state_file: dir.path().join("state.json"),
        snapshot_file: dir.path().join("info.json"),
        ..SyncConfig::default()
    }
}

fn effective(now: DateTime<Utc>) -> DateTime<Utc> { now - Duration::days(1) }

fn cycle(now: DateTime<Utc>, units: Vec<Unit>) -> PublicationCycle {
    let mut cycle = PublicationCycle::new(effective(now), now - Duration::days(40), ROOT);
    cycle.next_effective_date = Some(now + Duration::days(30));
    cycle.units = units;
    cycle
}

fn file_name(code: &str, i: usize) -> String { format!("{code}-{i}.txt") }

fn url(code: &str, i: usize) -> String { format!("{ROOT}/pdf/{}", file_name(code, i)) }

fn body(code: &str, i: usize) -> String { LineCodec::encode([format!("{code} page {i}").as_str()]) }

fn unit(code: &str, parts: usize) -> Unit {
    Unit::new(
        code,
        (1..=parts)
            .map(|i| {
                let kind = if i == 1 { ContentKind::Text } else { ContentKind::Chart };
                Part::new(format!("pdf/{}", file_name(code, i)), file_name(code, i), kind)
            })
            .collect(),
    )
}

/// Serve every part of `units`.
fn serve(units: &[Unit]) -> MockHttpClient {
    units.iter().fold(MockHttpClient::new(), |client, u| {
        (1..=u.parts.len()).fold(client, |client, i| client.route(url(&u.code, i), body(&u.code, i)))
    })
}

fn pages(path: &Path) -> Vec<String> {
    let doc = LineCodec.open(path).unwrap();
    doc.pages().unwrap().iter().map(|p| p.text().to_string()).collect()
}

#[tokio::test]
async fn test_fresh_unit_is_fetched_merged_and_written() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("AAAA", 3)];
    let pipeline = Pipeline::new(config(&dir), serve(&units), LineCodec).unwrap();
    let mut cycle = cycle(now, units);

    let report = pipeline.run(&mut cycle, false).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.fetched_parts, 3);
    let summary = report.unit("AAAA").unwrap();
    assert_eq!((summary.passes, summary.retries, summary.syncs), (1, 0, 1));
    assert_eq!(summary.artifacts.len(), 2);
    assert!(summary.artifacts.iter().all(|a| a.written));

    let layout = pipeline.layout(&cycle);
    assert_eq!(
        pages(&layout.artifact_path("AAAA", ArtifactKind::Full)),
        ["AAAA page 1", "AAAA page 2", "AAAA page 3"]
    );
    assert_eq!(
        pages(&layout.artifact_path("AAAA", ArtifactKind::Chart)),
        ["AAAA page 2", "AAAA page 3"]
    );

    assert_eq!(cycle.units[0].download_count, 0);
    assert_eq!(cycle.units[0].artifacts.len(), 2);
}

#[tokio::test]
async fn test_single_downloaded_part_is_copied() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("BBBB", 1)];
    let pipeline = Pipeline::new(config(&dir), MockHttpClient::new(), LineCodec).unwrap();
    let mut cycle = cycle(now, units);

    let layout = pipeline.layout(&cycle);
    let part = layout.part_path("BBBB", &file_name("BBBB", 1));
    std::fs::create_dir_all(part.parent().unwrap()).unwrap();
    std::fs::write(&part, body("BBBB", 1)).unwrap();

    let report = pipeline.run(&mut cycle, false).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.fetched_parts, 0);
    assert_eq!(pipeline.fetcher().client().total_requests(), 0);

    let artifacts = &report.unit("BBBB").unwrap().artifacts;
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].kind, ArtifactKind::Full);
    assert_eq!(
        std::fs::read_to_string(layout.artifact_path("BBBB", ArtifactKind::Full)).unwrap(),
        body("BBBB", 1)
    );
    assert!(!layout.artifact_path("BBBB", ArtifactKind::Chart).exists());
}

#[tokio::test]
async fn test_failed_part_forces_whole_unit_refetch() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("CCCC", 3)];
    let client = serve(&units).fail_times(url("CCCC", 2), 1);

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let pipeline = Pipeline::new(config(&dir), client, LineCodec)
        .unwrap()
        .with_events(Events::new(move |e| sink.lock().unwrap().push(e.clone())));
    let mut cycle = cycle(now, units);

    let report = pipeline.run(&mut cycle, false).await.unwrap();

    assert!(report.is_success());
    let summary = report.unit("CCCC").unwrap();
    assert_eq!(summary.retries, 1);
    assert_eq!(summary.passes, 2);
    assert_eq!(summary.syncs, 1);

    // The retry re-fetches every part, not only the one that failed.
    let client = pipeline.fetcher().client();
    for i in 1..=3 {
        assert_eq!(client.requests(&url("CCCC", i)), 2, "part {i}");
    }
    assert_eq!(report.fetched_parts, 6);

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        SyncEvent::UnitRetry { unit, retries: 1, .. } if unit == "CCCC"
    )));
    assert!(events.iter().any(|e| matches!(e, SyncEvent::UnitMerged { unit, .. } if unit == "CCCC")));
}

#[tokio::test]
async fn test_second_run_fetches_and_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("AAAA", 3), unit("BBBB", 1), unit("DDDD", 2)];
    let pipeline = Pipeline::new(config(&dir), serve(&units), LineCodec).unwrap();

    let mut first = cycle(now, units.clone());
    let report = pipeline.run(&mut first, false).await.unwrap();
    assert!(report.is_success());
    let requests = pipeline.fetcher().client().total_requests();

    let mut second = cycle(now, units);
    let report = pipeline.run(&mut second, false).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.fetched_parts, 0);
    assert_eq!(pipeline.fetcher().client().total_requests(), requests);
    // The single-part unit is copied on every run; merged units are kept.
    assert_eq!(report.written_artifacts(), 1);
    assert_eq!(report.unit("AAAA").unwrap().artifacts.len(), 2);
    assert!(report.unit("AAAA").unwrap().artifacts.iter().all(|a| !a.written));
}

#[tokio::test]
async fn test_unit_that_never_merges_fails_after_three_passes() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("AAAA", 2), unit("EEEE", 2)];
    // EEEE's chart is an error page that cannot be opened as a document.
    let client = serve(&units).route(url("EEEE", 2), "<html>Service Unavailable</html>");
    let pipeline = Pipeline::new(config(&dir), client, LineCodec).unwrap();
    let mut cycle = cycle(now, units);

    let report = pipeline.run(&mut cycle, false).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failures.len(), 1);
    let failure = report.failure("EEEE").unwrap();
    assert!(failure.reason.contains("3 download passes"), "{}", failure.reason);
    assert_eq!(pipeline.fetcher().client().requests(&url("EEEE", 1)), 3);

    // The other unit is unaffected.
    assert_eq!(report.unit("AAAA").unwrap().artifacts.len(), 2);
    assert!(cycle.units[1].artifacts.is_empty());
}

#[tokio::test]
async fn test_recorded_download_count_stays_within_ceiling() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("HHHH", 2)];
    // Two passes get an error page for the chart, the third the real one.
    let client = serve(&units)
        .route(url("HHHH", 2), "<html>Service Unavailable</html>")
        .switch_after(url("HHHH", 2), 2, body("HHHH", 2));
    let config = config(&dir);
    let ceiling = config.retry_ceiling;
    let pipeline = Pipeline::new(config, client, LineCodec).unwrap();
    let mut cycle = cycle(now, units);

    let report = pipeline.run(&mut cycle, false).await.unwrap();

    assert!(report.is_success(), "{:?}", report.failures);
    let summary = report.unit("HHHH").unwrap();
    assert_eq!((summary.passes, summary.retries, summary.syncs), (3, 2, 3));
    assert_eq!(cycle.units[0].download_count, 2);
    assert!(cycle.units[0].download_count <= ceiling);
    assert_eq!(
        pages(&pipeline.layout(&cycle).artifact_path("HHHH", ArtifactKind::Full)),
        ["HHHH page 1", "HHHH page 2"]
    );
}

#[tokio::test]
async fn test_unreachable_part_exhausts_retries() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("GGGG", 2)];
    let client = serve(&units).fail(url("GGGG", 2));
    let pipeline = Pipeline::new(config(&dir), client, LineCodec).unwrap();
    let mut cycle = cycle(now, units);

    let report = pipeline.run(&mut cycle, false).await.unwrap();

    assert!(report.failure("GGGG").is_some());
    assert_eq!(pipeline.fetcher().client().requests(&url("GGGG", 2)), 3);
    assert!(!pipeline.layout(&cycle).merge_dir("GGGG").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn test_filesystem_error_fails_only_its_unit() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("FFFF", 2), unit("AAAA", 2)];
    let pipeline = Pipeline::new(config(&dir), serve(&units), LineCodec).unwrap();
    let mut cycle = cycle(now, units);

    // FFFF's directory is a regular file, so stat on its parts fails with
    // something other than not-found.
    let blocked = pipeline.layout(&cycle).unit_dir("FFFF");
    std::fs::create_dir_all(blocked.parent().unwrap()).unwrap();
    std::fs::write(&blocked, "not a directory").unwrap();

    let report = pipeline.run(&mut cycle, false).await.unwrap();

    let failure = report.failure("FFFF").unwrap();
    assert!(failure.reason.contains("filesystem error"), "{}", failure.reason);
    assert_eq!(pipeline.fetcher().client().requests(&url("FFFF", 1)), 0);

    let sibling = report.unit("AAAA").unwrap();
    assert_eq!(sibling.artifacts.len(), 2);
    assert!(sibling.artifacts.iter().all(|a| a.written));
    assert!(cycle.units[0].artifacts.is_empty());
}

#[tokio::test]
async fn test_merge_follows_declaration_not_file_names() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let names = ["zulu.txt", "alpha.txt", "mike.txt", "bravo.txt"];
    let parts = names
        .iter()
        .map(|n| Part::new(format!("pdf/{n}"), *n, ContentKind::Chart))
        .collect();
    let client = names.iter().fold(MockHttpClient::new(), |c, n| {
        c.route(format!("{ROOT}/pdf/{n}"), LineCodec::encode([*n]))
    });
    let pipeline = Pipeline::new(config(&dir), client, LineCodec).unwrap();
    let mut cycle = cycle(now, vec![Unit::new("HHHH", parts)]);

    pipeline.run(&mut cycle, false).await.unwrap();

    let layout = pipeline.layout(&cycle);
    assert_eq!(pages(&layout.artifact_path("HHHH", ArtifactKind::Full)), names);
    assert_eq!(pages(&layout.artifact_path("HHHH", ArtifactKind::Chart)), names[1..]);
}

#[tokio::test]
async fn test_unit_page_is_mirrored_best_effort() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let mut with_page = unit("JJJJ", 1);
    with_page.link = Some("html/JJJJ.html".into());
    let mut broken_page = unit("KKKK", 1);
    broken_page.link = Some("html/KKKK.html".into());
    let units = vec![with_page, broken_page];

    let client = serve(&units).route(format!("{ROOT}/html/JJJJ.html"), "<html>JJJJ</html>");
    let pipeline = Pipeline::new(config(&dir), client, LineCodec).unwrap();
    let mut cycle = cycle(now, units);

    let report = pipeline.run(&mut cycle, false).await.unwrap();

    assert!(report.is_success());
    let layout = pipeline.layout(&cycle);
    assert_eq!(
        std::fs::read_to_string(layout.page_path("JJJJ")).unwrap(),
        "<html>JJJJ</html>"
    );
    assert!(!layout.page_path("KKKK").exists());
}

#[tokio::test]
async fn test_verify_unit_reports_without_writing() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("AAAA", 3)];
    let pipeline = Pipeline::new(config(&dir), serve(&units), LineCodec).unwrap();
    let mut cycle = cycle(now, units);

    let before = pipeline.verify_unit(&cycle, "AAAA").await;
    assert!(matches!(before, Err(SyncError::Merge { .. })));

    pipeline.run(&mut cycle, false).await.unwrap();
    let checks = pipeline.verify_unit(&cycle, "AAAA").await.unwrap();
    assert_eq!(checks.len(), 2);
    assert!(checks.iter().all(|c| c.verdict == Verdict::UpToDate));

    assert!(matches!(
        pipeline.verify_unit(&cycle, "ZZZZ").await,
        Err(SyncError::UnknownUnit(_))
    ));
}

#[tokio::test]
async fn test_sync_records_state_and_skips_until_next_cycle() {
    let dir = TempDir::new().unwrap();
    let now = Utc::now();
    let units = vec![unit("AAAA", 2)];
    let config = config(&dir);
    let pipeline = Pipeline::new(config.clone(), serve(&units), LineCodec).unwrap();

    let current = cycle(now, Vec::new());
    let mut upcoming = PublicationCycle::new(now + Duration::days(30), now, ROOT);
    upcoming.source_root = format!("{ROOT}-next");
    let catalog = Catalog {
        cycles: vec![upcoming, current],
        units,
    };

    match pipeline
        .sync(catalog.clone(), SyncRequest::at(now))
        .await
        .unwrap()
    {
        SyncOutcome::Completed { cycle, report } => {
            assert!(report.is_success());
            assert_eq!(cycle.source_root, ROOT);
            assert_eq!(cycle.next_effective_date, Some(now + Duration::days(30)));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(config.snapshot_file.exists());

    let outcome = pipeline
        .sync(catalog.clone(), SyncRequest::at(now + Duration::days(1)))
        .await
        .unwrap();
    assert!(matches!(outcome, SyncOutcome::NotDue { next: Some(_) }));

    let forced = SyncRequest {
        force: true,
        ..SyncRequest::at(now + Duration::days(1))
    };
    match pipeline.sync(catalog, forced).await.unwrap() {
        SyncOutcome::Completed { report, .. } => assert_eq!(report.fetched_parts, 0),
        other => panic!("unexpected {other:?}"),
    }
}
