//! In-process route table fed by mapping announcements

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Url;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::RouteEntry;
use crate::session::MappingListener;

/// Current route name to target address mapping
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: RwLock<BTreeMap<String, Url>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(&self, route_name: &str) -> Option<Url> {
        self.routes.read().await.get(route_name).cloned()
    }

    /// Entries ordered by route name
    pub async fn entries(&self) -> Vec<RouteEntry> {
        self.routes
            .read()
            .await
            .iter()
            .map(|(route_name, target)| RouteEntry {
                route_name: route_name.clone(),
                target: target.to_string(),
            })
            .collect()
    }
}

#[async_trait]
impl MappingListener for RouteTable {
    async fn on_mapping_added(&self, route_name: &str, target: &Url) -> anyhow::Result<()> {
        debug!(route = %route_name, %target, "Route added");
        self.routes
            .write()
            .await
            .insert(route_name.to_string(), target.clone());
        Ok(())
    }

    async fn on_mapping_removed(&self, route_name: &str) -> anyhow::Result<()> {
        if self.routes.write().await.remove(route_name).is_none() {
            anyhow::bail!("Route {} was not registered", route_name);
        }
        debug!(route = %route_name, "Route removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_remove() {
        let table = RouteTable::new();
        let target = Url::parse("http://localhost:20000").unwrap();

        table.on_mapping_added("eager_turing", &target).await.unwrap();
        assert_eq!(table.resolve("eager_turing").await, Some(target));
        assert_eq!(table.entries().await[0].target, "http://localhost:20000/");

        table.on_mapping_removed("eager_turing").await.unwrap();
        assert!(table.resolve("eager_turing").await.is_none());
        assert!(table.on_mapping_removed("eager_turing").await.is_err());
    }
}
