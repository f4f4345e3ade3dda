use sha2::{Digest, Sha256};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use vmforge::cache::FileCache;
use vmforge::fetch::{Checksum, DownloadJob, FetchError, FetchOutcome, Fetcher, HashKind};
use vmforge::pipeline::CancelToken;
use vmforge::ui::MemoryUi;

#[derive(Default)]
struct ServerStats {
    active: AtomicUsize,
    max_active: AtomicUsize,
    served: AtomicUsize,
}

/// Serves `body` to every request in `chunks` pieces with `delay` between them.
fn serve_slowly(body: Vec<u8>, chunks: usize, delay: Duration) -> (String, Arc<ServerStats>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let stats = Arc::new(ServerStats::default());
    let server_stats = Arc::clone(&stats);
    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { continue };
            let body = body.clone();
            let stats = Arc::clone(&server_stats);
            thread::spawn(move || {
                let now = stats.active.fetch_add(1, Ordering::SeqCst) + 1;
                stats.max_active.fetch_max(now, Ordering::SeqCst);
                let mut reader = BufReader::new(stream.try_clone().expect("clone"));
                let mut line = String::new();
                while reader.read_line(&mut line).map(|n| n > 2).unwrap_or(false) {
                    line.clear();
                }
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(header.as_bytes());
                let size = body.len().div_ceil(chunks.max(1)).max(1);
                let pieces: Vec<&[u8]> = body.chunks(size).collect();
                let last = pieces.len().saturating_sub(1);
                for (index, piece) in pieces.into_iter().enumerate() {
                    if index == last {
                        // The client cannot finish before this point.
                        stats.active.fetch_sub(1, Ordering::SeqCst);
                        stats.served.fetch_add(1, Ordering::SeqCst);
                    }
                    if stream.write_all(piece).is_err() {
                        break;
                    }
                    let _ = stream.flush();
                    if index != last {
                        thread::sleep(delay);
                    }
                }
            });
        }
    });
    (format!("http://{addr}/rescue.iso"), stats)
}

fn sha256_of(body: &[u8]) -> Checksum {
    let digest = Sha256::digest(body);
    Checksum::from_hex(HashKind::Sha256, &hex::encode(digest)).expect("checksum")
}

fn fast_fetcher() -> Fetcher {
    Fetcher::new(Duration::from_millis(20), Duration::from_millis(20))
}

#[test]
fn http_fetch_verifies_and_promotes_into_cache() {
    let dir = tempdir().expect("tempdir");
    let body = b"rescue media bytes".repeat(64);
    let (url, _) = serve_slowly(body.clone(), 4, Duration::from_millis(10));
    let cache = FileCache::new(dir.path().join("cache"));
    let job = DownloadJob::new(&url, cache.resolve(&url))
        .expect("job")
        .with_checksum(Some(sha256_of(&body)));

    let outcome = fast_fetcher()
        .fetch(&cache, &job, &CancelToken::new(), &MemoryUi::new())
        .expect("fetch");

    let FetchOutcome::Completed(path) = outcome else {
        panic!("fetch was cancelled");
    };
    assert_eq!(path, cache.resolve(&url));
    assert_eq!(std::fs::read(&path).expect("read"), body);
    assert!(path.to_string_lossy().ends_with(".iso"));
}

#[test]
fn checksum_mismatch_is_a_verification_error_and_nothing_is_promoted() {
    let dir = tempdir().expect("tempdir");
    let (url, _) = serve_slowly(b"tampered".to_vec(), 1, Duration::ZERO);
    let cache = FileCache::new(dir.path().join("cache"));
    let target = cache.resolve(&url);
    let job = DownloadJob::new(&url, &target)
        .expect("job")
        .with_checksum(Some(sha256_of(b"original")));

    let err = fast_fetcher()
        .fetch(&cache, &job, &CancelToken::new(), &MemoryUi::new())
        .expect_err("mismatch");

    assert!(err.is_verification(), "unexpected error: {err}");
    assert!(!target.exists());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("cache"))
        .expect("cache dir")
        .collect();
    assert!(leftovers.is_empty(), "partial files left behind");
}

#[test]
fn cancelling_mid_transfer_returns_within_one_poll_interval() {
    let dir = tempdir().expect("tempdir");
    let (url, _) = serve_slowly(vec![7u8; 64 * 1024], 64, Duration::from_millis(100));
    let cache = FileCache::new(dir.path().join("cache"));
    let target = cache.resolve(&url);
    let job = DownloadJob::new(&url, &target).expect("job");
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        trigger.cancel();
        Instant::now()
    });
    let ui = MemoryUi::new();

    let fetcher = Fetcher::new(Duration::from_secs(5), Duration::from_millis(100));
    let outcome = fetcher.fetch(&cache, &job, &cancel, &ui).expect("fetch");
    let returned_at = Instant::now();
    let cancelled_at = canceller.join().expect("canceller");

    assert_eq!(outcome, FetchOutcome::Cancelled);
    assert!(returned_at.duration_since(cancelled_at) < Duration::from_millis(500));
    assert!(!target.exists());
    assert!(ui.contains("Interrupt received. Cancelling download..."));
    assert!(!cache.is_locked(&url));
}

#[test]
fn http_error_status_is_a_transfer_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut line = String::new();
            while reader.read_line(&mut line).map(|n| n > 2).unwrap_or(false) {
                line.clear();
            }
            let _ = stream.write_all(
                b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            );
        }
    });
    let dir = tempdir().expect("tempdir");
    let url = format!("http://{addr}/missing.iso");
    let cache = FileCache::new(dir.path());
    let job = DownloadJob::new(&url, cache.resolve(&url)).expect("job");

    let err = fast_fetcher()
        .fetch(&cache, &job, &CancelToken::new(), &MemoryUi::new())
        .expect_err("404");

    assert!(matches!(err, FetchError::HttpStatus { status: 404, .. }));
    assert!(!err.is_verification());
}

#[test]
fn concurrent_fetches_of_one_source_never_overlap_transfers() {
    let dir = tempdir().expect("tempdir");
    let body = vec![1u8; 8 * 1024];
    let (url, stats) = serve_slowly(body, 8, Duration::from_millis(20));
    let cache = Arc::new(FileCache::new(dir.path().join("cache")));

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let url = url.clone();
            thread::spawn(move || {
                let job = DownloadJob::new(&url, cache.resolve(&url)).expect("job");
                fast_fetcher()
                    .fetch(&cache, &job, &CancelToken::new(), &MemoryUi::new())
                    .expect("fetch")
            })
        })
        .collect();
    for worker in workers {
        assert!(matches!(
            worker.join().expect("join"),
            FetchOutcome::Completed(_)
        ));
    }

    assert_eq!(stats.served.load(Ordering::SeqCst), 3);
    assert_eq!(stats.max_active.load(Ordering::SeqCst), 1);
}
