//! Route announcements to the proxy layer

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use reqwest::Url;
use tokio::sync::RwLock;
use tracing::{error, warn};

/// Observer of published routes, implemented by the reverse-proxy layer
#[async_trait]
pub trait MappingListener: Send + Sync {
    async fn on_mapping_added(&self, route_name: &str, target: &Url) -> anyhow::Result<()>;

    async fn on_mapping_removed(&self, route_name: &str) -> anyhow::Result<()>;
}

/// Ordered set of mapping listeners
#[derive(Default)]
pub struct ListenerHub {
    listeners: RwLock<Vec<Arc<dyn MappingListener>>>,
}

impl ListenerHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, listener: Arc<dyn MappingListener>) {
        self.listeners.write().await.push(listener);
    }

    /// Remove a listener by identity; false if it was not subscribed
    pub async fn unsubscribe(&self, listener: &Arc<dyn MappingListener>) -> bool {
        let mut listeners = self.listeners.write().await;
        let before = listeners.len();
        listeners.retain(|existing| !Arc::ptr_eq(existing, listener));
        listeners.len() != before
    }

    /// Announce a new route to every listener in subscription order
    ///
    /// A listener that errors or panics is logged and skipped.
    pub async fn publish(&self, route_name: &str, target: &Url) {
        for listener in self.listeners.read().await.iter() {
            match AssertUnwindSafe(listener.on_mapping_added(route_name, target))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(route = %route_name, %target, error = %e, "Mapping listener failed on add")
                }
                Err(panic) => error!(
                    route = %route_name,
                    %target,
                    panic = panic_message(panic.as_ref()),
                    "Mapping listener panicked on add"
                ),
            }
        }
    }

    /// Announce a route's removal to every listener in subscription order
    pub async fn withdraw(&self, route_name: &str) {
        for listener in self.listeners.read().await.iter() {
            match AssertUnwindSafe(listener.on_mapping_removed(route_name))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(route = %route_name, error = %e, "Mapping listener failed on remove"),
                Err(panic) => error!(
                    route = %route_name,
                    panic = panic_message(panic.as_ref()),
                    "Mapping listener panicked on remove"
                ),
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.listeners.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.listeners.read().await.is_empty()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Appends "<name>:+route" / "<name>:-route" to a shared journal
    struct Recorder {
        name: &'static str,
        journal: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl MappingListener for Recorder {
        async fn on_mapping_added(&self, route_name: &str, _target: &Url) -> anyhow::Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:+{}", self.name, route_name));
            if self.fail {
                anyhow::bail!("{} refused", self.name);
            }
            Ok(())
        }

        async fn on_mapping_removed(&self, route_name: &str) -> anyhow::Result<()> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("{}:-{}", self.name, route_name));
            if self.fail {
                anyhow::bail!("{} refused", self.name);
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, journal: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<dyn MappingListener> {
        Arc::new(Recorder {
            name,
            journal: journal.clone(),
            fail,
        })
    }

    #[tokio::test]
    async fn test_notifies_in_subscription_order() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let hub = ListenerHub::new();
        hub.subscribe(recorder("a", &journal, false)).await;
        hub.subscribe(recorder("b", &journal, false)).await;

        let target = Url::parse("http://localhost:20000").unwrap();
        hub.publish("eager_turing", &target).await;
        hub.withdraw("eager_turing").await;

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["a:+eager_turing", "b:+eager_turing", "a:-eager_turing", "b:-eager_turing"]
        );
    }

    #[tokio::test]
    async fn test_failing_listener_is_isolated() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let hub = ListenerHub::new();
        hub.subscribe(recorder("bad", &journal, true)).await;
        hub.subscribe(recorder("good", &journal, false)).await;

        let target = Url::parse("http://localhost:20000").unwrap();
        hub.publish("r1", &target).await;
        hub.withdraw("r1").await;

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["bad:+r1", "good:+r1", "bad:-r1", "good:-r1"]
        );
    }

    struct Panicker;

    #[async_trait]
    impl MappingListener for Panicker {
        async fn on_mapping_added(&self, route_name: &str, _target: &Url) -> anyhow::Result<()> {
            panic!("cannot add {}", route_name);
        }

        async fn on_mapping_removed(&self, _route_name: &str) -> anyhow::Result<()> {
            panic!("cannot remove");
        }
    }

    #[tokio::test]
    async fn test_panicking_listener_is_isolated() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let hub = ListenerHub::new();
        hub.subscribe(Arc::new(Panicker)).await;
        hub.subscribe(recorder("good", &journal, false)).await;

        let target = Url::parse("http://localhost:20000").unwrap();
        hub.publish("r1", &target).await;
        hub.withdraw("r1").await;

        assert_eq!(*journal.lock().unwrap(), vec!["good:+r1", "good:-r1"]);
    }

    #[test]
    fn test_panic_message() {
        let owned: Box<dyn Any + Send> = Box::new(format!("cannot add {}", "r1"));
        let fixed: Box<dyn Any + Send> = Box::new("cannot remove");
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(owned.as_ref()), "cannot add r1");
        assert_eq!(panic_message(fixed.as_ref()), "cannot remove");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let hub = ListenerHub::new();
        let a = recorder("a", &journal, false);
        let b = recorder("b", &journal, false);
        hub.subscribe(a.clone()).await;
        hub.subscribe(b.clone()).await;

        assert!(hub.unsubscribe(&a).await);
        assert!(!hub.unsubscribe(&a).await);
        assert_eq!(hub.len().await, 1);

        hub.withdraw("r1").await;
        assert_eq!(*journal.lock().unwrap(), vec!["b:-r1"]);
    }
}
