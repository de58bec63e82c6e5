use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use rtxconf::cache::ConfigCache;
use rtxconf::config::{PoolConfig, RetryPolicy};
use rtxconf::entity::{EntityKind, Registry};
use rtxconf::error::ConnectError;
use rtxconf::executor::SessionExecutor;
use rtxconf::parser::WrapConfig;
use rtxconf::pool::ConnectionPool;
use rtxconf::session::{CommandSession, Output, SessionFactory};
use rtxconf::source::SessionConfigSource;

const RTX1210: &str = include_str!("fixtures/rtx1210_config.txt");

#[derive(Default)]
struct Counters {
    dialed: AtomicUsize,
    live: AtomicUsize,
    peak: AtomicUsize,
    escalations: AtomicUsize,
}

/// In-memory router: `show config` needs administrator mode, `hangup`
/// breaks the transport.
struct FakeRouter {
    counters: Arc<Counters>,
    admin: bool,
}

impl CommandSession for FakeRouter {
    async fn execute(&mut self, command: &str) -> Result<Output, ConnectError> {
        let (success, content) = match command {
            "hangup" => return Err(ConnectError::ConnectClosedError),
            "show config" if self.admin => (true, RTX1210.to_string()),
            "show config" => (false, "Error: Permission denied".to_string()),
            "slow" => {
                tokio::time::sleep(Duration::from_millis(50)).await;
                (true, String::new())
            }
            _ => (true, String::new()),
        };
        Ok(Output {
            success,
            content,
            all: String::new(),
            prompt: Some(if self.admin { "# " } else { "> " }.to_string()),
        })
    }

    async fn escalate(&mut self, _password: &str) -> Result<(), ConnectError> {
        self.counters.escalations.fetch_add(1, Ordering::SeqCst);
        self.admin = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ConnectError> {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}

struct FakeDialer {
    counters: Arc<Counters>,
}

impl SessionFactory for FakeDialer {
    type Session = FakeRouter;

    async fn connect(&self) -> Result<FakeRouter, ConnectError> {
        self.counters.dialed.fetch_add(1, Ordering::SeqCst);
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(live, Ordering::SeqCst);
        Ok(FakeRouter {
            counters: self.counters.clone(),
            admin: false,
        })
    }
}

fn pool(max_connections: usize) -> (ConnectionPool<FakeDialer>, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let pool = ConnectionPool::new(
        FakeDialer {
            counters: counters.clone(),
        },
        PoolConfig {
            max_connections,
            acquire_timeout_secs: 5,
            cleanup_interval_secs: 0,
            ..PoolConfig::default()
        },
    )
    .expect("pool");
    (pool, counters)
}

#[tokio::test]
async fn third_caller_waits_for_a_release() {
    let (pool, counters) = pool(2);
    let first = pool.acquire().await.expect("first");
    let second = pool.acquire().await.expect("second");

    let waiter = tokio::spawn({
        let pool = pool.clone();
        async move {
            let conn = pool.acquire().await.expect("third");
            let id = conn.id();
            pool.release(conn).await;
            id
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    assert_eq!(pool.stats().in_use, 2);

    let released = first.id();
    pool.release(first).await;
    assert_eq!(waiter.await.expect("join"), released);

    pool.release(second).await;
    let stats = pool.stats();
    assert_eq!(stats.total_created, 2);
    assert_eq!(stats.wait_count, 1);
    assert_eq!(counters.dialed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_batches_never_exceed_the_bound() {
    let (pool, counters) = pool(2);
    let executor = Arc::new(SessionExecutor::new(pool, Some("admin".to_string())));

    let mut tasks = Vec::new();
    for _ in 0..6 {
        let executor = executor.clone();
        tasks.push(tokio::spawn(async move {
            executor.run(&["slow"], false).await
        }));
    }
    for task in tasks {
        task.await.expect("join").expect("run");
    }

    assert_eq!(counters.peak.load(Ordering::SeqCst), 2);
    assert_eq!(executor.pool().stats().total_acquisitions, 6);
}

#[tokio::test]
async fn privilege_persists_until_the_connection_is_replaced() {
    let (pool, counters) = pool(1);
    let executor = SessionExecutor::new(pool, Some("admin".to_string())).with_retry_policy(
        RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        },
    );

    executor.run(&["show config"], true).await.expect("first");
    executor.run(&["show config"], true).await.expect("second");
    assert_eq!(counters.escalations.load(Ordering::SeqCst), 1);

    let err = match executor.run(&["hangup"], true).await {
        Ok(_) => panic!("transport closes"),
        Err(err) => err,
    };
    assert!(err.is_retryable());

    // The replacement connection starts unprivileged and escalates again.
    executor.run(&["show config"], true).await.expect("after reconnect");
    assert_eq!(counters.escalations.load(Ordering::SeqCst), 2);
    assert_eq!(counters.dialed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cached_dump_feeds_the_registry() {
    let (pool, counters) = pool(2);
    let executor = Arc::new(SessionExecutor::new(pool, Some("admin".to_string())));
    let source = SessionConfigSource::new(executor.clone(), "admin@192.168.100.1:22");
    let cache = ConfigCache::new(Duration::from_secs(300), WrapConfig::default());

    let dump = cache.get_or_fetch(&source).await.expect("fetch");
    let tunnels = Registry::builtin()
        .extract(EntityKind::Tunnel, dump.parsed())
        .expect("extract");
    assert_eq!(tunnels.len(), 2);

    cache.get_or_fetch(&source).await.expect("cached");
    assert_eq!(counters.dialed.load(Ordering::SeqCst), 1);
    assert_eq!(counters.escalations.load(Ordering::SeqCst), 1);

    executor.close().await;
    assert!(executor.pool().is_closed());
}
