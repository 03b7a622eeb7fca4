mod common;

use std::time::Duration;

use taxondb_core::config::IngestConfig;
use taxondb_core::ingest::{
    fetcher_for, load_dump, read_taxdump, FileFetcher, Fetcher, HttpFetcher, IngestError,
    Ingestor, META_SHA256, META_SOURCE,
};
use taxondb_core::{Levels, Resolver, SqliteStore, TaxonStore, TaxonTable};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves one canned HTTP response per connection, in order.
async fn serve(responses: Vec<(u16, Vec<u8>)>) -> String {
    serve_declared(
        responses
            .into_iter()
            .map(|(status, body)| {
                let length = body.len() as u64;
                (status, body, length)
            })
            .collect(),
    )
    .await
}

/// Like `serve`, but each response announces the given Content-Length
/// regardless of the body actually sent.
async fn serve_declared(responses: Vec<(u16, Vec<u8>, u64)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for (status, body, length) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status, length
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        }
    });

    format!("http://{}/taxdump.tar.gz", addr)
}

fn quick_config() -> IngestConfig {
    IngestConfig {
        fetch_timeout_secs: 5,
        retry_delay_ms: 10,
        batch_size: 5,
        ..IngestConfig::default()
    }
}

#[test]
fn test_load_dump_in_batches() {
    let archive = common::taxdump_tar_gz(common::HUMAN_LINEAGE);
    let dump = read_taxdump(&archive, &IngestConfig::default()).unwrap();
    assert_eq!(dump.nodes.len(), common::HUMAN_LINEAGE.len());
    // Synonyms are filtered out.
    assert_eq!(dump.names.len(), common::HUMAN_LINEAGE.len());

    let store = SqliteStore::open_memory().unwrap();
    let counts = load_dump(&store, &dump, 4).unwrap();

    assert_eq!(counts.nodes, common::HUMAN_LINEAGE.len());
    assert_eq!(store.row_count(TaxonTable::Names).unwrap(), counts.names);
    let node = store.node_records().unwrap().into_iter().find(|n| n.id == 9606).unwrap();
    assert_eq!(node.genetic_code_id, Some(1));
    assert_eq!(node.mito_genetic_code_id, Some(1));
}

#[tokio::test]
async fn test_ingest_from_file_end_to_end() {
    let temp = TempDir::new().unwrap();
    let archive_path = temp.path().join("taxdump.tar.gz");
    std::fs::write(&archive_path, common::taxdump_tar_gz(common::HUMAN_LINEAGE)).unwrap();

    let config = IngestConfig {
        archive_url: format!("file://{}", archive_path.display()),
        ..quick_config()
    };
    let store = SqliteStore::open(temp.path().join("taxonomy.sqlite")).unwrap();
    let stats = Ingestor::new(config).unwrap().run(&store).await.unwrap();

    assert_eq!(stats.nodes, common::HUMAN_LINEAGE.len());
    assert_eq!(stats.sha256.len(), 64);
    assert_eq!(store.meta(META_SHA256).unwrap(), Some(stats.sha256.clone()));
    assert_eq!(
        store.meta(META_SOURCE).unwrap().as_deref(),
        Some(archive_path.to_str().unwrap())
    );

    let lineage = Resolver::direct(&store)
        .find_ancestors(9606, &Levels::default())
        .unwrap()
        .unwrap();
    assert_eq!(lineage.name_at("kingdom"), Some("Metazoa"));
}

#[tokio::test]
async fn test_ingest_replaces_previous_load() {
    let temp = TempDir::new().unwrap();
    let archive_path = temp.path().join("taxdump.tar.gz");
    std::fs::write(&archive_path, common::taxdump_tar_gz(&common::HUMAN_LINEAGE[..5])).unwrap();

    let store = common::human_store();
    let ingestor = Ingestor::with_fetcher(quick_config(), Box::new(FileFetcher::new(&archive_path)));
    ingestor.run(&store).await.unwrap();

    assert_eq!(store.node_count().unwrap(), 5);
    assert_eq!(store.node(9606).unwrap(), None);
}

#[tokio::test]
async fn test_http_fetch_with_retry() {
    let archive = common::taxdump_tar_gz(common::HUMAN_LINEAGE);
    let url = serve(vec![(503, b"busy".to_vec()), (200, archive.clone())]).await;

    let fetcher = HttpFetcher::new(&url, &quick_config())
        .unwrap()
        .with_retries(1);
    assert_eq!(fetcher.source(), url);
    assert_eq!(fetcher.fetch().await.unwrap(), archive);
}

#[tokio::test]
async fn test_http_ingest() {
    let archive = common::taxdump_tar_gz(common::HUMAN_LINEAGE);
    let url = serve(vec![(200, archive)]).await;

    let config = IngestConfig {
        archive_url: url,
        ..quick_config()
    };
    let store = SqliteStore::open_memory().unwrap();
    let stats = Ingestor::new(config).unwrap().run(&store).await.unwrap();
    assert_eq!(stats.names, common::HUMAN_LINEAGE.len());
}

#[tokio::test]
async fn test_fetch_retries_exhausted() {
    let url = serve(vec![(500, Vec::new()), (500, Vec::new()), (500, Vec::new())]).await;

    let fetcher = HttpFetcher::new(&url, &quick_config())
        .unwrap()
        .with_retries(2)
        .with_retry_delay(Duration::from_millis(5));

    match fetcher.fetch().await {
        Err(IngestError::Fetch { url: failed, attempts, message }) => {
            assert_eq!(failed, url);
            assert_eq!(attempts, 3);
            assert!(message.contains("500"));
        }
        other => panic!("expected fetch failure, got {:?}", other.map(|b| b.len())),
    }
}

#[tokio::test]
async fn test_oversized_content_length_is_a_fetch_error() {
    let url = serve_declared(vec![(200, b"abc".to_vec(), 1_000_000_000_000_000_000)]).await;

    let fetcher = HttpFetcher::new(&url, &quick_config()).unwrap();
    let err = fetcher.fetch().await.unwrap_err();

    match err {
        IngestError::Fetch { url: failed, attempts, .. } => {
            assert_eq!(failed, url);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected fetch error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_failure_leaves_store_untouched() {
    let store = common::human_store();
    let fetcher = fetcher_for("/nonexistent/taxdump.tar.gz", &quick_config()).unwrap();
    let ingestor = Ingestor::with_fetcher(quick_config(), fetcher);

    assert!(matches!(
        ingestor.run(&store).await,
        Err(IngestError::Fetch { .. })
    ));
    assert_eq!(store.node_count().unwrap(), common::HUMAN_LINEAGE.len());
}

#[tokio::test]
async fn test_corrupt_archive_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxdump.tar.gz");
    std::fs::write(&path, b"definitely not a tarball").unwrap();

    let store = common::human_store();
    let ingestor = Ingestor::with_fetcher(quick_config(), Box::new(FileFetcher::new(&path)));
    assert!(ingestor.run(&store).await.is_err());
    assert_eq!(store.node_count().unwrap(), common::HUMAN_LINEAGE.len());
}
