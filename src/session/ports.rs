//! Host port allocation for session containers

use std::collections::BTreeSet;

use tokio::sync::Mutex;

use super::SessionError;

/// Hands out the lowest free port at or above a fixed start
pub struct PortAllocator {
    start: u16,
    occupied: Mutex<BTreeSet<u16>>,
}

impl PortAllocator {
    pub fn new(start: u16) -> Self {
        Self {
            start,
            occupied: Mutex::new(BTreeSet::new()),
        }
    }

    /// First port of the range
    pub fn start(&self) -> u16 {
        self.start
    }

    /// Reserve the lowest free port
    pub async fn allocate(&self) -> Result<u16, SessionError> {
        let mut occupied = self.occupied.lock().await;

        let port = (self.start..=u16::MAX)
            .find(|port| !occupied.contains(port))
            .ok_or(SessionError::PortsExhausted(self.start))?;

        occupied.insert(port);
        Ok(port)
    }

    /// Return a port to the pool; releasing a free port does nothing
    pub async fn release(&self, port: u16) {
        self.occupied.lock().await.remove(&port);
    }

    pub async fn is_occupied(&self, port: u16) -> bool {
        self.occupied.lock().await.contains(&port)
    }

    /// Occupied ports in ascending order
    pub async fn occupied(&self) -> Vec<u16> {
        self.occupied.lock().await.iter().copied().collect()
    }
}
