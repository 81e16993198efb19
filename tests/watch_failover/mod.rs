use std::sync::Arc;
use std::time::Duration;

use kvwatch::CacheConfig;
use kvwatch::CacheIdentity;
use kvwatch::CacheState;
use kvwatch::DelayScheduler;
use kvwatch::FailoverConfig;
use kvwatch::FailoverRouter;
use kvwatch::FailoverStrategyKind;
use kvwatch::HttpConfig;
use kvwatch::HttpPoller;
use kvwatch::ListenerRef;
use kvwatch::ReadTimeoutAdjuster;
use kvwatch::Snapshot;
use kvwatch::TimeoutTransport;
use kvwatch::WatchCache;
use parking_lot::Mutex;

use crate::commons::Answer;
use crate::commons::CatalogNode;
use crate::commons::FakeCluster;
use crate::enable_logger;

type NodeSnapshot = Arc<Snapshot<String, CatalogNode>>;

fn build_cache(
    cluster: &FakeCluster,
    strategy: FailoverStrategyKind,
) -> WatchCache<String, CatalogNode> {
    let failover = FailoverConfig {
        hosts: vec!["node-a:8500".into(), "node-b:8500".into()],
        strategy,
        ..Default::default()
    };
    let cache_config = CacheConfig {
        watch_duration_ms: 5_000,
        ..Default::default()
    };

    let transport = TimeoutTransport::new(
        FailoverRouter::from_config(cluster.clone(), &failover).unwrap(),
        ReadTimeoutAdjuster::from_config(&cache_config, &HttpConfig::default()),
    );
    let poller = HttpPoller::<CatalogNode>::new(transport, "http://node-a:8500", "/v1/catalog/nodes").unwrap();

    WatchCache::builder(CacheIdentity::new("catalog.nodes", "all"), poller, |n: &CatalogNode| {
        Some(n.node.clone())
    })
    .config(cache_config)
    .scheduler(DelayScheduler::current().unwrap())
    .build()
    .unwrap()
}

fn collect(cache: &WatchCache<String, CatalogNode>) -> Arc<Mutex<Vec<NodeSnapshot>>> {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let listener: ListenerRef<String, CatalogNode> = Arc::new(move |s: NodeSnapshot| sink.lock().push(s));
    cache.add_listener(listener);
    received
}

async fn wait_for_snapshots(
    received: &Mutex<Vec<NodeSnapshot>>,
    n: usize,
) {
    for _ in 0..100 {
        if received.lock().len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("expected {n} snapshots, got {}", received.lock().len());
}

#[tokio::test(start_paused = true)]
async fn test_watch_survives_dead_node() {
    enable_logger();
    let cluster = FakeCluster::new(vec!["node-a"], Duration::from_secs(5));
    cluster.script(
        "node-b",
        vec![
            Answer {
                index: 5,
                body: r#"[{"Node":"n1","Address":"10.0.0.1"},{"Node":"n2","Address":"10.0.0.2"}]"#,
            },
            Answer {
                index: 6,
                body: r#"[{"Node":"n1","Address":"10.0.0.1"},{"Node":"n2","Address":"10.0.0.2"},{"Node":"n3","Address":"10.0.0.3"}]"#,
            },
        ],
    );

    let cache = build_cache(&cluster, FailoverStrategyKind::Blacklisting);
    let received = collect(&cache);

    cache.start().unwrap();
    assert!(cache.initialized(Duration::from_secs(5)).await);
    wait_for_snapshots(&received, 2).await;

    assert_eq!(cache.state(), CacheState::Started);
    assert_eq!(cache.snapshot().len(), 3);
    assert_eq!(cache.snapshot()["n3"].address, "10.0.0.3");
    assert_eq!(cache.last_index(), Some(6));

    // node-a is blacklisted after the first refusal
    assert_eq!(cluster.requests_to("node-a"), 1);

    let to_b: Vec<_> = cluster
        .requests()
        .into_iter()
        .filter(|uri| uri.host() == Some("node-b"))
        .collect();
    assert_eq!(to_b[0].query(), Some("wait=5s"));
    assert_eq!(to_b[1].query(), Some("wait=5s&index=5"));

    cache.stop();
}

#[tokio::test(start_paused = true)]
async fn test_idle_backend_does_not_renotify() {
    let cluster = FakeCluster::new(vec!["node-a"], Duration::from_secs(5));
    cluster.script(
        "node-b",
        vec![Answer {
            index: 9,
            body: r#"[{"Node":"n1","Address":"10.0.0.1"}]"#,
        }],
    );

    let cache = build_cache(&cluster, FailoverStrategyKind::RoundRobin);
    let received = collect(&cache);

    cache.start().unwrap();
    assert!(cache.initialized(Duration::from_secs(5)).await);

    // Several idle blocking rounds
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(received.lock().len(), 1);
    assert!(cluster.requests_to("node-b") >= 4);
    assert_eq!(cache.last_index(), Some(9));

    cache.stop();
    let seen = cluster.requests().len();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(cluster.requests().len(), seen);
}
