//! End-to-end tests of the download engine against a mock HTTP server
//!
//! The engine is blocking, so each scenario runs it inside
//! `spawn_blocking` while wiremock serves requests on the test runtime.

use super::*;
use crate::catalog::Catalog;
use crate::downloader::core::validation::md5_file;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{TempDir, tempdir};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

/// Helper struct to capture progress events during testing
#[derive(Default)]
struct ProgressCapture {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl ProgressCapture {
    fn new() -> Self {
        Self::default()
    }

    fn get_callback(&self) -> ProgressCallback {
        let events = self.events.clone();
        Arc::new(move |event| {
            events.lock().unwrap().push(event);
        })
    }

    fn count(&self, predicate: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(*e)).count()
    }
}

fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

fn patterned(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

fn resource(dest: &str, data: &[u8]) -> Resource {
    Resource::new(dest, md5_hex(data))
}

fn catalog_of(resources: Vec<Resource>) -> Catalog {
    Catalog::new("catalog.json", resources).unwrap()
}

/// Serve `data` at `route` for plain GET requests
async fn mount_single(server: &MockServer, route: &str, data: &[u8], expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(data.to_vec()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Serve `data` at `route` as HEAD plus one 206 mock per range of the partition
async fn mount_chunked(server: &MockServer, route: &str, data: &[u8], connections: usize) {
    Mock::given(method("HEAD"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200).insert_header("content-length", data.len().to_string()),
        )
        .mount(server)
        .await;

    for range in partition(data.len() as u64, connections).unwrap() {
        let body = data[range.start as usize..=range.end as usize].to_vec();
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("range", range.header_value().as_str()))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(body))
            .mount(server)
            .await;
    }
}

async fn run_blocking<T, F>(f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.expect("blocking task panicked")
}

async fn run_catalog(root: PathBuf, catalog: Catalog, run: RunConfig) -> BatchReport {
    run_blocking(move || {
        let scheduler = BatchScheduler::new(DownloadConfig::default(), DownloadLayout::new(root))
            .expect("scheduler");
        scheduler.run(&catalog, &run).expect("batch run")
    })
    .await
}

fn read_report(path: &Path) -> Vec<String> {
    let contents = std::fs::read_to_string(path).unwrap();
    let report: FailureReport = serde_json::from_str(&contents).unwrap();
    report.resource.into_iter().map(|r| r.dest).collect()
}

fn workspace() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let root = dir.path().to_path_buf();
    (dir, root)
}

#[cfg(test)]
mod chunked_download_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_two_connections_complete_file() {
        let server = MockServer::start().await;
        let data = vec![0x41u8; 10];
        mount_chunked(&server, "/a.bin", &data, 2).await;

        let (_dir, root) = workspace();
        let run = RunConfig::new(server.uri(), "1.0").with_multi_connection(2);
        let report = run_catalog(root.clone(), catalog_of(vec![resource("a.bin", &data)]), run).await;

        assert!(matches!(report.outcomes[0].1, DownloadOutcome::Succeeded { size: 10 }));
        assert!(report.all_succeeded());
        assert!(report.report_path.is_none());
        assert!(!root.join("failed/1.0").exists());
        assert_eq!(std::fs::read(root.join("download/1.0/a.bin")).unwrap(), data);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_short_range_fails_resource() {
        let server = MockServer::start().await;
        let data = vec![0x41u8; 10];
        Mock::given(method("HEAD"))
            .and(path("/a.bin"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "10"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a.bin"))
            .and(header("range", "bytes=0-4"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![0x41u8; 5]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a.bin"))
            .and(header("range", "bytes=5-9"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![0x41u8; 4]))
            .mount(&server)
            .await;

        let (_dir, root) = workspace();
        let run = RunConfig::new(server.uri(), "1.0").with_multi_connection(2);
        let report = run_catalog(root.clone(), catalog_of(vec![resource("a.bin", &data)]), run).await;

        match &report.outcomes[0].1 {
            DownloadOutcome::Failed(DownloadError::ShortRead { range, expected, actual, .. }) => {
                assert_eq!(*range, ByteRange::new(5, 9));
                assert_eq!((*expected, *actual), (5, 4));
            }
            other => panic!("expected short read, got {:?}", other),
        }
        let report_path = report.report_path.expect("failure report");
        assert_eq!(report_path, root.join("failed/1.0/catalog.json"));
        assert_eq!(read_report(&report_path), vec!["a.bin"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_long_range_fails_resource() {
        let server = MockServer::start().await;
        let data = vec![0x42u8; 10];
        Mock::given(method("HEAD"))
            .and(path("/a.bin"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "10"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a.bin"))
            .and(header("range", "bytes=0-4"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![0x42u8; 5]))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a.bin"))
            .and(header("range", "bytes=5-9"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![0x42u8; 6]))
            .mount(&server)
            .await;

        let (_dir, root) = workspace();
        let run = RunConfig::new(server.uri(), "1.0").with_multi_connection(2);
        let report = run_catalog(root, catalog_of(vec![resource("a.bin", &data)]), run).await;

        match &report.outcomes[0].1 {
            DownloadOutcome::Failed(DownloadError::ShortRead { range, expected, actual, .. }) => {
                assert_eq!(*range, ByteRange::new(5, 9));
                assert_eq!((*expected, *actual), (5, 6));
            }
            other => panic!("expected over-long range to fail, got {:?}", other),
        }
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_range_ignored_by_server_fails() {
        let server = MockServer::start().await;
        let data = patterned(64);
        Mock::given(method("HEAD"))
            .and(path("/a.bin"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "64"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(data.clone()))
            .mount(&server)
            .await;

        let (_dir, root) = workspace();
        let run = RunConfig::new(server.uri(), "1.0").with_multi_connection(2);
        let report = run_catalog(root, catalog_of(vec![resource("a.bin", &data)]), run).await;

        assert!(matches!(
            report.outcomes[0].1,
            DownloadOutcome::Failed(DownloadError::HttpStatus { .. })
        ));
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_content_length_fails_resource() {
        let server = MockServer::start().await;
        let data = patterned(32);
        Mock::given(method("HEAD"))
            .and(path("/a.bin"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (_dir, root) = workspace();
        let run = RunConfig::new(server.uri(), "1.0").with_multi_connection(4);
        let report = run_catalog(root, catalog_of(vec![resource("a.bin", &data)]), run).await;

        assert!(matches!(
            report.outcomes[0].1,
            DownloadOutcome::Failed(DownloadError::MissingContentLength { .. })
        ));
        assert!(report.report_path.is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_chunked_digest_matches_single_stream() {
        let data = patterned(1000);
        let target = resource("nested/data.bin", &data);

        let single_server = MockServer::start().await;
        mount_single(&single_server, "/nested/data.bin", &data, 1).await;
        let chunked_server = MockServer::start().await;
        mount_chunked(&chunked_server, "/nested/data.bin", &data, 3).await;

        let (_dir, root) = workspace();
        let single_uri = single_server.uri();
        let chunked_uri = chunked_server.uri();
        let (single_digest, chunked_digest) = run_blocking(move || {
            let client = HttpClient::from_config(&DownloadConfig::default()).unwrap();
            let failures = Arc::new(FailureSet::new());

            let single = FileOrchestrator::new(
                client.clone(),
                RunConfig::new(single_uri, "single"),
                root.join("single"),
                failures.clone(),
            );
            assert!(single.process(&target).is_success());

            let chunked = FileOrchestrator::new(
                client,
                RunConfig::new(chunked_uri, "chunked").with_multi_connection(3),
                root.join("chunked"),
                failures.clone(),
            );
            assert!(chunked.process(&target).is_success());
            assert!(failures.is_empty());

            (
                md5_file(&root.join("single/nested/data.bin"), 4096).unwrap(),
                md5_file(&root.join("chunked/nested/data.bin"), 4096).unwrap(),
            )
        })
        .await;

        assert_eq!(single_digest, chunked_digest);
        assert_eq!(single_digest, md5_hex(&data));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_chunk_progress_events() {
        let server = MockServer::start().await;
        let data = patterned(100);
        mount_chunked(&server, "/a.bin", &data, 4).await;

        let (_dir, root) = workspace();
        let capture = ProgressCapture::new();
        let callback = capture.get_callback();
        let uri = server.uri();
        let catalog = catalog_of(vec![resource("a.bin", &data)]);
        let report = run_blocking(move || {
            let scheduler = BatchScheduler::new(DownloadConfig::default(), DownloadLayout::new(root))
                .unwrap()
                .with_progress_callback(callback);
            scheduler
                .run(&catalog, &RunConfig::new(uri, "1.0").with_multi_connection(4))
                .unwrap()
        })
        .await;

        assert!(report.all_succeeded());
        assert_eq!(capture.count(|e| matches!(e, ProgressEvent::ChunkComplete { .. })), 4);
        assert_eq!(
            capture.count(|e| matches!(e, ProgressEvent::ValidationComplete { valid: true, .. })),
            1
        );
        assert_eq!(
            capture.count(|e| matches!(e, ProgressEvent::BatchProgress { completed: 1, total: 1 })),
            1
        );
    }
}

#[cfg(test)]
mod batch_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_existing_valid_file_is_skipped() {
        let server = MockServer::start().await;
        let first = b"already here".to_vec();
        let second = patterned(256);
        mount_single(&server, "/one.bin", &first, 0).await;
        mount_single(&server, "/two.bin", &second, 1).await;

        let (_dir, root) = workspace();
        let existing = root.join("download/1.0/one.bin");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, &first).unwrap();

        let catalog = catalog_of(vec![resource("one.bin", &first), resource("two.bin", &second)]);
        let report = run_catalog(root.clone(), catalog, RunConfig::new(server.uri(), "1.0")).await;

        assert!(report.outcomes[0].1.is_skipped());
        assert!(matches!(report.outcomes[1].1, DownloadOutcome::Succeeded { size: 256 }));
        assert_eq!((report.skipped(), report.succeeded(), report.failed_count()), (1, 1, 0));
        assert!(report.report_path.is_none());
        assert_eq!(std::fs::read(root.join("download/1.0/two.bin")).unwrap(), second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_corrupt_existing_file_is_replaced() {
        let server = MockServer::start().await;
        let data = patterned(128);
        mount_single(&server, "/a.bin", &data, 1).await;

        let (_dir, root) = workspace();
        let existing = root.join("download/1.0/a.bin");
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"stale contents that are much longer than nothing").unwrap();

        let report = run_catalog(
            root,
            catalog_of(vec![resource("a.bin", &data)]),
            RunConfig::new(server.uri(), "1.0"),
        )
        .await;

        assert!(matches!(report.outcomes[0].1, DownloadOutcome::Succeeded { .. }));
        assert_eq!(std::fs::read(&existing).unwrap(), data);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_second_run_fetches_nothing() {
        let server = MockServer::start().await;
        let files: Vec<(String, Vec<u8>)> = (0..5)
            .map(|i| (format!("dir{}/file{}.bin", i % 2, i), patterned(100 + i * 37)))
            .collect();
        for (dest, data) in &files {
            // Exactly one fetch per file across both runs
            mount_single(&server, &format!("/{}", dest), data, 1).await;
        }
        let catalog = catalog_of(files.iter().map(|(dest, data)| resource(dest, data)).collect());

        let (_dir, root) = workspace();
        let run = RunConfig::new(server.uri(), "2.0").with_max_concurrent_files(3);
        let first = run_catalog(root.clone(), catalog.clone(), run.clone()).await;
        assert_eq!(first.succeeded(), 5);

        let second = run_catalog(root, catalog, run).await;
        assert_eq!(second.skipped(), 5);
        assert_eq!(second.metrics.bytes_downloaded, 0);
        assert!(second.report_path.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_chunked_second_run_fetches_nothing() {
        let data = patterned(300);
        let catalog = catalog_of(vec![resource("a.bin", &data), resource("d/b.bin", &data[..77])]);
        let (_dir, root) = workspace();

        let first_server = MockServer::start().await;
        mount_chunked(&first_server, "/a.bin", &data, 3).await;
        mount_chunked(&first_server, "/d/b.bin", &data[..77], 3).await;
        let run = RunConfig::new(first_server.uri(), "1.0").with_multi_connection(3);
        let first = run_catalog(root.clone(), catalog.clone(), run).await;
        assert_eq!(first.succeeded(), 2);

        // Neither the HEAD size request nor any range request may reach the server
        let second_server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-length", "300"))
            .expect(0)
            .mount(&second_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(206))
            .expect(0)
            .mount(&second_server)
            .await;
        let run = RunConfig::new(second_server.uri(), "1.0").with_multi_connection(3);
        let second = run_catalog(root.clone(), catalog, run).await;

        assert_eq!(second.skipped(), 2);
        assert_eq!(second.metrics.bytes_downloaded, 0);
        assert!(second.report_path.is_none());
        assert_eq!(std::fs::read(root.join("download/1.0/d/b.bin")).unwrap(), &data[..77]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failure_isolation_and_report_contents() {
        let server = MockServer::start().await;
        let good_a = patterned(50);
        let good_b = patterned(70);
        let served_bad = b"what the server has".to_vec();
        mount_single(&server, "/good_a.bin", &good_a, 1).await;
        mount_single(&server, "/good_b.bin", &good_b, 1).await;
        mount_single(&server, "/bad.bin", &served_bad, 1).await;
        Mock::given(method("GET"))
            .and(path("/missing.bin"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let catalog = catalog_of(vec![
            resource("good_a.bin", &good_a),
            resource("bad.bin", b"what the catalog expects"),
            resource("missing.bin", b"anything"),
            resource("good_b.bin", &good_b),
        ]);

        let (_dir, root) = workspace();
        let run = RunConfig::new(server.uri(), "1.0").with_max_concurrent_files(2);
        let report = run_catalog(root.clone(), catalog, run).await;

        assert_eq!(report.outcomes.len(), 4);
        assert!(matches!(
            report.outcomes[1].1,
            DownloadOutcome::Failed(DownloadError::ChecksumMismatch { .. })
        ));
        assert!(matches!(
            report.outcomes[2].1,
            DownloadOutcome::Failed(DownloadError::HttpStatus { .. })
        ));
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.metrics.failed_files, 2);
        assert_eq!(report.metrics.completed(), 4);

        let mut failed = read_report(report.report_path.as_ref().unwrap());
        failed.sort();
        assert_eq!(failed, vec!["bad.bin", "missing.bin"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_report_reproduces_catalog_entries() {
        let server = MockServer::start().await;
        mount_single(&server, "/a.bin", b"served", 1).await;
        mount_single(&server, "/b.bin", b"matching", 1).await;

        let bad_md5 = md5_hex(b"expected").to_uppercase();
        let good_md5 = md5_hex(b"matching").to_uppercase();
        let json = format!(
            r#"{{"resource":[{{"dest":"/a.bin","md5":"{}","label":"core assets"}},{{"dest":"b.bin","md5":"{}"}}]}}"#,
            bad_md5, good_md5
        );
        let catalog = Catalog::from_json_str("assets.json", &json).unwrap();

        let (_dir, root) = workspace();
        let report = run_catalog(root, catalog, RunConfig::new(server.uri(), "1.0")).await;

        // Uppercase digests still verify
        assert!(matches!(report.outcomes[1].1, DownloadOutcome::Succeeded { .. }));

        let contents = std::fs::read_to_string(report.report_path.unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["resource"].as_array().unwrap().len(), 1);
        assert_eq!(value["resource"][0]["dest"], "/a.bin");
        assert_eq!(value["resource"][0]["md5"], bad_md5.as_str());
        assert_eq!(value["resource"][0]["label"], "core assets");
    }

    #[test]
    fn test_invalid_run_config_is_fatal() {
        let dir = tempdir().unwrap();
        let scheduler =
            BatchScheduler::new(DownloadConfig::default(), DownloadLayout::new(dir.path())).unwrap();
        let catalog = catalog_of(vec![resource("a.bin", b"x")]);

        let err = scheduler
            .run(&catalog, &RunConfig::new("http://127.0.0.1:9", "1.0").with_multi_connection(0))
            .unwrap_err();
        assert!(err.is_fatal());

        let err = scheduler
            .run(&catalog, &RunConfig::new("http://127.0.0.1:9", "1.0").with_max_concurrent_files(0))
            .unwrap_err();
        assert!(matches!(err, DownloadError::Configuration { .. }));
        assert!(!dir.path().join("download").exists());
    }

    #[test]
    fn test_invalid_destination_fails_only_that_resource() {
        let dir = tempdir().unwrap();
        let failures = Arc::new(FailureSet::new());
        let client = HttpClient::from_config(&DownloadConfig::default()).unwrap();
        let orchestrator = FileOrchestrator::new(
            client,
            RunConfig::new("http://127.0.0.1:9", "1.0"),
            dir.path().join("download/1.0"),
            failures.clone(),
        );

        let outcome = orchestrator.process(&Resource::new("../escape.bin", md5_hex(b"x")));
        assert!(!outcome.is_success());
        assert!(matches!(outcome.error(), Some(DownloadError::InvalidDestination { .. })));
        assert_eq!(failures.len(), 1);
    }
}
