use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use tokio::time::Instant;

use super::*;
use crate::test_utils::enable_logger;
use crate::Error;
use crate::FailoverConfig;
use crate::FailoverError;
use crate::FailoverStrategyKind;
use crate::HttpRequest;
use crate::HttpResponse;
use crate::MockTransport;
use crate::Transport;
use crate::TransportError;

fn pool(n: usize) -> Vec<HostAndPort> {
    ["node-a", "node-b", "node-c", "node-d"][..n]
        .iter()
        .map(|h| HostAndPort::new(*h, 8500))
        .collect()
}

fn request() -> HttpRequest {
    http::Request::get("http://node-a:8500/v1/health/service/web?wait=10s&index=3")
        .body(Bytes::new())
        .unwrap()
}

fn ok(status: StatusCode) -> HttpResponse {
    http::Response::builder()
        .status(status)
        .body(Bytes::from_static(b"[]"))
        .unwrap()
}

fn refused(req: &HttpRequest) -> TransportError {
    TransportError::Connect {
        address: req.uri().authority().unwrap().to_string(),
        message: "connection refused".into(),
    }
}

fn failover_error(result: std::result::Result<HttpResponse, TransportError>) -> FailoverError {
    match result {
        Err(TransportError::Failover(e)) => *e,
        other => panic!("expected failover error, got {other:?}"),
    }
}

fn targets(host: &'static str) -> impl Fn(&HttpRequest) -> bool + Send + 'static {
    move |req| req.uri().host() == Some(host)
}

#[tokio::test]
async fn test_fails_over_to_next_host() {
    enable_logger();
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(targets("node-a"))
        .times(1)
        .returning(|req| Err(refused(&req)));
    transport
        .expect_send()
        .withf(targets("node-b"))
        .times(1)
        .returning(|_| Ok(ok(StatusCode::OK)));

    let strategy = Arc::new(BlacklistingStrategy::new(pool(2), Duration::from_secs(60)).unwrap());
    let router = FailoverRouter::new(transport, strategy, 3).unwrap();

    let response = router.send(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_error_status_is_returned_as_is() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(1)
        .returning(|_| Ok(ok(StatusCode::SERVICE_UNAVAILABLE)));

    let strategy = Arc::new(BlacklistingStrategy::new(pool(2), Duration::from_secs(60)).unwrap());
    let router = FailoverRouter::new(transport, strategy.clone(), 3).unwrap();

    let response = router.send(request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(!strategy.is_blacklisted(&HostAndPort::new("node-a", 8500)));
}

#[tokio::test]
async fn test_no_viable_host_skips_transport() {
    let mut transport = MockTransport::new();
    transport.expect_send().times(0);

    let strategy = Arc::new(BlacklistingStrategy::new(pool(2), Duration::from_secs(60)).unwrap());
    let dead_a = request();
    strategy.mark_request_failed(&dead_a);
    strategy.mark_request_failed(&rewrite_target(&dead_a, &HostAndPort::new("node-b", 8500)).unwrap());
    let router = FailoverRouter::new(transport, strategy, 3).unwrap();

    let err = failover_error(router.send(request()).await);

    assert!(matches!(err, FailoverError::NoViableHost { .. }));
}

#[tokio::test]
async fn test_pool_exhausted() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(2)
        .returning(|req| Err(refused(&req)));

    let strategy = Arc::new(BlacklistingStrategy::new(pool(2), Duration::from_secs(60)).unwrap());
    let router = FailoverRouter::new(transport, strategy, 10).unwrap();

    let err = failover_error(router.send(request()).await);

    assert!(matches!(err, FailoverError::NoViableHostRemaining { attempts: 2 }));
}

#[tokio::test]
async fn test_max_attempts_exceeded() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .times(3)
        .returning(|req| Err(refused(&req)));

    let strategy = Arc::new(RoundRobinStrategy::new(pool(4), Duration::ZERO).unwrap());
    let router = FailoverRouter::new(transport, strategy, 2).unwrap();

    let err = failover_error(router.send(request()).await);

    match err {
        FailoverError::MaxAttemptsExceeded { max, source } => {
            assert_eq!(max, 2);
            assert!(matches!(source, TransportError::Connect { .. }));
        }
        other => panic!("expected max attempts, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failover_error_surfaces_as_crate_error() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .returning(|req| Err(refused(&req)));

    let strategy = Arc::new(BlacklistingStrategy::new(pool(1), Duration::from_secs(60)).unwrap());
    let router = FailoverRouter::new(transport, strategy, 5).unwrap();

    let err: Error = router.send(request()).await.unwrap_err().into();

    assert!(matches!(
        err,
        Error::Failover(FailoverError::NoViableHostRemaining { attempts: 1 })
    ));
}

#[tokio::test]
async fn test_sequence_restarts_on_every_call() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(targets("node-a"))
        .times(2)
        .returning(|req| Err(refused(&req)));
    transport
        .expect_send()
        .withf(targets("node-b"))
        .times(2)
        .returning(|_| Ok(ok(StatusCode::OK)));

    let strategy = Arc::new(RoundRobinStrategy::new(pool(3), Duration::ZERO).unwrap());
    let router = FailoverRouter::new(transport, strategy, 5).unwrap();

    assert!(router.send(request()).await.is_ok());
    assert!(router.send(request()).await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_round_robin_delay_is_slept() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(targets("node-a"))
        .returning(|req| Err(refused(&req)));
    transport
        .expect_send()
        .withf(targets("node-b"))
        .returning(|_| Ok(ok(StatusCode::OK)));

    let strategy = Arc::new(RoundRobinStrategy::new(pool(2), Duration::from_millis(500)).unwrap());
    let router = FailoverRouter::new(transport, strategy, 5).unwrap();

    let started = Instant::now();
    router.send(request()).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(500));
}

#[test]
fn test_construction_errors() {
    let strategy = Arc::new(RoundRobinStrategy::new(pool(2), Duration::ZERO).unwrap());
    assert!(matches!(
        FailoverRouter::new(MockTransport::new(), strategy, 0),
        Err(Error::InvalidArgument(_))
    ));

    let empty = FailoverConfig::default();
    assert!(matches!(
        FailoverRouter::from_config(MockTransport::new(), &empty),
        Err(Error::Config(_))
    ));

    let bad_host = FailoverConfig {
        hosts: vec!["node-a".into()],
        ..Default::default()
    };
    assert!(matches!(
        FailoverRouter::from_config(MockTransport::new(), &bad_host),
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_from_config_builds_round_robin() {
    let mut transport = MockTransport::new();
    transport
        .expect_send()
        .withf(targets("node-a"))
        .returning(|req| Err(refused(&req)));
    transport
        .expect_send()
        .withf(targets("node-b"))
        .returning(|_| Ok(ok(StatusCode::OK)));

    let config = FailoverConfig {
        hosts: vec!["node-a:8500".into(), "node-b:8500".into()],
        strategy: FailoverStrategyKind::RoundRobin,
        max_attempts: 4,
        ..Default::default()
    };
    let router = FailoverRouter::from_config(transport, &config).unwrap();

    assert_eq!(router.max_attempts(), 4);
    assert_eq!(router.send(request()).await.unwrap().status(), StatusCode::OK);
}

#[test]
fn test_empty_pool_rejected() {
    assert!(matches!(
        BlacklistingStrategy::new(Vec::new(), Duration::from_secs(60)),
        Err(Error::InvalidArgument(_))
    ));
    assert!(matches!(
        RoundRobinStrategy::new(Vec::new(), Duration::ZERO),
        Err(Error::InvalidArgument(_))
    ));
}

/// Accepts the request and never answers
struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn send(
        &self,
        _request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_calls_release_cursors() {
    let strategy = Arc::new(RoundRobinStrategy::new(pool(2), Duration::ZERO).unwrap());
    let router = Arc::new(FailoverRouter::new(HangingTransport, strategy.clone(), 3).unwrap());

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move {
                tokio::time::timeout(Duration::from_secs(2), router.send(request()))
                    .await
                    .is_err()
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await.unwrap(), "call should have timed out");
    }

    assert_eq!(strategy.active_callers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_aborted_call_releases_cursor() {
    let strategy = Arc::new(RoundRobinStrategy::new(pool(2), Duration::ZERO).unwrap());
    let router = Arc::new(FailoverRouter::new(HangingTransport, strategy.clone(), 3).unwrap());

    let task = {
        let router = router.clone();
        tokio::spawn(async move { router.send(request()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(strategy.active_callers(), 1);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert_eq!(strategy.active_callers(), 0);
}
