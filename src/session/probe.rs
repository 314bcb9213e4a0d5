//! Readiness probing for freshly started containers

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Retry budget for one readiness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    pub max_attempts: u32,
    /// Pause after each failed attempt
    pub interval: Duration,
    /// Upper bound for a single request
    pub request_timeout: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(2),
        }
    }
}

impl ProbePolicy {
    /// Worst-case time spent sleeping between attempts
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Poll `target` until it answers or the policy runs out.
    ///
    /// Blocks the calling task for at most the policy's budget plus request time.
    /// Returns false early if `cancel` fires.
    async fn probe(&self, target: &Url, policy: &ProbePolicy, cancel: &CancellationToken) -> bool;
}

/// Probe issuing plain HTTP GETs, ready on any 2xx
#[derive(Debug, Clone, Default)]
pub struct HttpProber {
    client: Client,
}

impl HttpProber {
    pub fn new() -> Self {
        Self::default()
    }

    async fn attempt(&self, target: &Url, timeout: Duration) -> bool {
        match self.client.get(target.clone()).timeout(timeout).send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                debug!(%target, status = %response.status(), "Container not ready");
                false
            }
            Err(e) => {
                debug!(%target, error = %e, "Container not reachable");
                false
            }
        }
    }
}

#[async_trait]
impl ReadinessProbe for HttpProber {
    async fn probe(&self, target: &Url, policy: &ProbePolicy, cancel: &CancellationToken) -> bool {
        for attempt in 1..=policy.max_attempts {
            if cancel.is_cancelled() {
                return false;
            }

            if self.attempt(target, policy.request_timeout).await {
                debug!(%target, attempt, "Container ready");
                return true;
            }

            if attempt < policy.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(%target, attempt, "Readiness probe cancelled");
                        return false;
                    }
                    _ = tokio::time::sleep(policy.interval) => {}
                }
            }
        }

        warn!(%target, attempts = policy.max_attempts, "Container did not become ready");
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, routing::get, Router};

    use super::*;

    fn fast_policy(max_attempts: u32) -> ProbePolicy {
        ProbePolicy {
            max_attempts,
            interval: Duration::from_millis(10),
            request_timeout: Duration::from_millis(500),
        }
    }

    /// Serve a handler that fails until `ready_after` requests have been made
    async fn serve(ready_after: u32) -> (Url, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));

        async fn handler(State((hits, ready_after)): State<(Arc<AtomicU32>, u32)>) -> StatusCode {
            let seen = hits.fetch_add(1, Ordering::SeqCst) + 1;
            if seen >= ready_after {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }

        let app = Router::new()
            .route("/", get(handler))
            .with_state((hits.clone(), ready_after));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (Url::parse(&format!("http://{}", addr)).unwrap(), hits)
    }

    /// A port nothing listens on
    async fn closed_port() -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    #[tokio::test]
    async fn test_ready_on_first_success() {
        let (target, hits) = serve(1).await;
        let prober = HttpProber::new();

        assert!(prober.probe(&target, &fast_policy(5), &CancellationToken::new()).await);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_retried() {
        let (target, hits) = serve(3).await;
        let prober = HttpProber::new();

        assert!(prober.probe(&target, &fast_policy(5), &CancellationToken::new()).await);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let (target, hits) = serve(10).await;
        let prober = HttpProber::new();

        assert!(!prober.probe(&target, &fast_policy(4), &CancellationToken::new()).await);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_unreachable_target() {
        let target = closed_port().await;
        let prober = HttpProber::new();

        assert!(!prober.probe(&target, &fast_policy(3), &CancellationToken::new()).await);
    }

    #[tokio::test]
    async fn test_cancellation_stops_probe() {
        let target = closed_port().await;
        let prober = HttpProber::new();
        let cancel = CancellationToken::new();
        let policy = ProbePolicy {
            max_attempts: 1000,
            interval: Duration::from_secs(1),
            request_timeout: Duration::from_millis(200),
        };

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        assert!(!prober.probe(&target, &policy, &cancel).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_default_budget() {
        assert_eq!(ProbePolicy::default().budget(), Duration::from_secs(10));
    }
}
