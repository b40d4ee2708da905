//! Iqub list state behind the collector and member screens.
//!
//! SYSTEM CONTEXT
//! ==============
//! `MyIqubs`, `JoinedIqubs` and `IqubDetail` render from this store. The list
//! is fetched with the session's bearer credential; a 401 goes through the
//! same unauthorized hook as every other session call, and the composition
//! root clears this store along with the session.
//!
//! CONCURRENCY
//! ===========
//! Fetches are single flight. `clear` bumps an epoch so a fetch that was in
//! flight when the session ended does not repopulate the list.

#[cfg(test)]
#[path = "iqubs_test.rs"]
mod iqubs_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::api::IqubApi;
use crate::types::Iqub;

pub const FETCH_IQUBS_FAILED_MESSAGE: &str = "Failed to fetch iqubs";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IqubError {
    /// The list could not be fetched; carries the user-facing message.
    #[error("{message}")]
    Fetch { message: String },
    #[error("no iqub with id {0}")]
    NotFound(String),
    /// The store was cleared while the fetch was in flight.
    #[error("superseded by a newer session change")]
    Superseded,
}

/// Point-in-time copy of the iqub state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IqubSnapshot {
    pub iqubs: Vec<Iqub>,
    pub selected: Option<Iqub>,
    pub loading: bool,
    pub error: Option<String>,
    /// Reported by background sync; never set by `fetch_iqubs`.
    pub sync_error: Option<String>,
}

struct Inner {
    state: IqubSnapshot,
    epoch: u64,
}

pub struct IqubStore {
    inner: Mutex<Inner>,
    api: Arc<dyn IqubApi>,
    flight: tokio::sync::Mutex<()>,
}

impl IqubStore {
    pub fn new(api: Arc<dyn IqubApi>) -> Self {
        Self {
            inner: Mutex::new(Inner { state: IqubSnapshot::default(), epoch: 0 }),
            api,
            flight: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> IqubSnapshot {
        self.lock().state.clone()
    }

    #[must_use]
    pub fn iqubs(&self) -> Vec<Iqub> {
        self.lock().state.iqubs.clone()
    }

    #[must_use]
    pub fn selected(&self) -> Option<Iqub> {
        self.lock().state.selected.clone()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock().state.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.lock().state.error.clone()
    }

    #[must_use]
    pub fn sync_error(&self) -> Option<String> {
        self.lock().state.sync_error.clone()
    }

    /// Replace the list. A selection that is still listed is refreshed from
    /// the new copy; one that is gone is dropped.
    pub fn set_iqubs(&self, iqubs: Vec<Iqub>) {
        let mut inner = self.lock();
        replace_list(&mut inner.state, iqubs);
    }

    pub fn set_selected(&self, iqub: Option<&Iqub>) {
        self.lock().state.selected = iqub.cloned();
    }

    pub fn set_error(&self, message: Option<&str>) {
        self.lock().state.error = message.map(str::to_owned);
    }

    pub fn set_sync_error(&self, message: Option<&str>) {
        self.lock().state.sync_error = message.map(str::to_owned);
    }

    /// Select a listed iqub by id.
    ///
    /// # Errors
    ///
    /// Returns `IqubError::NotFound` when no loaded iqub has that id; the
    /// current selection is left alone.
    pub fn select(&self, id: &str) -> Result<Iqub, IqubError> {
        let mut inner = self.lock();
        let found = inner
            .state
            .iqubs
            .iter()
            .find(|iqub| iqub.id == id)
            .cloned()
            .ok_or_else(|| IqubError::NotFound(id.to_owned()))?;
        inner.state.selected = Some(found.clone());
        Ok(found)
    }

    /// Forget everything. Called when the session ends.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.state = IqubSnapshot::default();
    }

    /// Load the iqub list for the current session.
    ///
    /// # Errors
    ///
    /// Returns `IqubError::Fetch` with the server's message (or a generic
    /// fallback) and `IqubError::Superseded` when `clear` lands first. The
    /// previous list is kept on failure.
    pub async fn fetch_iqubs(&self) -> Result<Vec<Iqub>, IqubError> {
        let _flight = self.flight.lock().await;
        let epoch = {
            let mut inner = self.lock();
            inner.state.loading = true;
            inner.state.error = None;
            inner.epoch
        };

        let result = self.api.list_iqubs().await;

        let mut inner = self.lock();
        if inner.epoch != epoch {
            tracing::debug!("iqub fetch superseded; dropping result");
            return Err(IqubError::Superseded);
        }
        inner.state.loading = false;
        match result {
            Ok(iqubs) => {
                tracing::info!(count = iqubs.len(), "iqubs loaded");
                replace_list(&mut inner.state, iqubs.clone());
                Ok(iqubs)
            }
            Err(e) => {
                tracing::warn!(error = %e, "iqub fetch failed");
                let message = e.message().unwrap_or(FETCH_IQUBS_FAILED_MESSAGE).to_owned();
                inner.state.error = Some(message.clone());
                Err(IqubError::Fetch { message })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn replace_list(state: &mut IqubSnapshot, iqubs: Vec<Iqub>) {
    state.selected = state
        .selected
        .as_ref()
        .and_then(|current| iqubs.iter().find(|iqub| iqub.id == current.id).cloned());
    state.iqubs = iqubs;
}
