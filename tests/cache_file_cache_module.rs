use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use vmforge::cache::FileCache;
use vmforge::pipeline::CancelToken;

#[test]
fn same_key_waits_for_the_holder_to_release() {
    let cache = Arc::new(FileCache::new("cache"));
    let lease = cache.lock("rescue");
    let (tx, rx) = mpsc::channel();

    let waiter = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            let _lease = cache.lock("rescue");
            tx.send(()).expect("send");
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    drop(lease);
    rx.recv_timeout(Duration::from_secs(2))
        .expect("waiter acquires after release");
    waiter.join().expect("join");
    assert!(!cache.is_locked("rescue"));
}

#[test]
fn distinct_keys_do_not_contend() {
    let cache = FileCache::new("cache");
    let _first = cache.lock("a");
    assert!(cache.try_lock("b").is_some());
    assert!(cache.try_lock("a").is_none());
}

#[test]
fn waiting_for_a_lock_gives_up_on_cancel() {
    let cache = Arc::new(FileCache::new("cache"));
    let _held = cache.lock("rescue");
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        trigger.cancel();
    });

    assert!(cache.lock_or_cancel("rescue", &cancel).is_none());
    assert!(cache.is_locked("rescue"));
}
