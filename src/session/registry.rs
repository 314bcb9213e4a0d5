//! Registry of sessions, one per user

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{Session, SessionError, SessionState};

#[derive(Debug)]
enum Slot {
    /// A start is in flight for the user
    Pending(SessionState),
    Active(Session),
}

/// Active sessions keyed by user name
///
/// A user's slot is claimed with [`reserve`](Self::reserve) before any container work
/// starts, so the uniqueness check and the claim happen under one write lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    slots: RwLock<HashMap<String, Slot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active session for a user
    pub async fn find(&self, user_name: &str) -> Option<Session> {
        match self.slots.read().await.get(user_name) {
            Some(Slot::Active(session)) => Some(session.clone()),
            _ => None,
        }
    }

    /// Claim the user's slot for a new start
    pub async fn reserve(&self, user_name: &str) -> Result<(), SessionError> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(user_name) {
            return Err(SessionError::DuplicateSession(user_name.to_string()));
        }
        slots.insert(user_name.to_string(), Slot::Pending(SessionState::Starting));
        Ok(())
    }

    /// Advance a pending start
    pub async fn mark(&self, user_name: &str, state: SessionState) {
        if let Some(Slot::Pending(current)) = self.slots.write().await.get_mut(user_name) {
            *current = state;
        }
    }

    /// Turn the user's reservation into an active session
    pub async fn activate(&self, session: Session) {
        self.slots
            .write()
            .await
            .insert(session.user_name.clone(), Slot::Active(session));
    }

    /// Drop a reservation after a failed start
    pub async fn cancel(&self, user_name: &str) {
        let mut slots = self.slots.write().await;
        if matches!(slots.get(user_name), Some(Slot::Pending(_))) {
            slots.remove(user_name);
        }
    }

    /// Remove exactly this session; returns false if it was already gone
    pub async fn remove(&self, session: &Session) -> bool {
        let mut slots = self.slots.write().await;
        match slots.get(&session.user_name) {
            Some(Slot::Active(current)) if current.session_id == session.session_id => {
                slots.remove(&session.user_name);
                true
            }
            _ => false,
        }
    }

    /// Replace this active session with a `Releasing` reservation.
    ///
    /// Used when the user switches application: the old session disappears from
    /// lookups at once, while the slot stays claimed for the replacement start.
    pub async fn hand_over(&self, session: &Session) -> bool {
        let mut slots = self.slots.write().await;
        let current = matches!(
            slots.get(&session.user_name),
            Some(Slot::Active(active)) if active.session_id == session.session_id
        );
        if current {
            slots.insert(
                session.user_name.clone(),
                Slot::Pending(SessionState::Releasing),
            );
        }
        current
    }

    /// Copies of all active sessions, ordered by user name
    pub async fn snapshot(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .slots
            .read()
            .await
            .values()
            .filter_map(|slot| match slot {
                Slot::Active(session) => Some(session.clone()),
                Slot::Pending(_) => None,
            })
            .collect();
        sessions.sort_by(|a, b| a.user_name.cmp(&b.user_name));
        sessions
    }

    /// Users with a start in flight
    pub async fn pending(&self) -> Vec<(String, SessionState)> {
        let mut pending: Vec<_> = self
            .slots
            .read()
            .await
            .iter()
            .filter_map(|(user, slot)| match slot {
                Slot::Pending(state) => Some((user.clone(), *state)),
                Slot::Active(_) => None,
            })
            .collect();
        pending.sort_by(|a, b| a.0.cmp(&b.0));
        pending
    }

    /// Number of active sessions
    pub async fn len(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .filter(|slot| matches!(slot, Slot::Active(_)))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
