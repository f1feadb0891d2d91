//! In-memory identity and state stores

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tidewater_core::{IdentityStore, StateStore};
use tidewater_domain::{AgentError, DeviceIdentity, Result};

#[derive(Default)]
pub struct MemoryIdentityStore {
    identity: Mutex<Option<DeviceIdentity>>,
    saves: AtomicUsize,
}

impl MemoryIdentityStore {
    pub fn with_identity(identity: DeviceIdentity) -> Self {
        Self { identity: Mutex::new(Some(identity)), saves: AtomicUsize::new(0) }
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Option<DeviceIdentity> {
        self.identity.lock().clone()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn exists(&self) -> Result<bool> {
        Ok(self.identity.lock().is_some())
    }

    async fn load(&self) -> Result<Option<DeviceIdentity>> {
        Ok(self.identity.lock().clone())
    }

    async fn save(&self, identity: &DeviceIdentity) -> Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.identity.lock() = Some(identity.clone());
        Ok(())
    }
}

/// State store backed by raw JSON values so tests can plant invalid markers.
#[derive(Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, Value>>,
    reads: AtomicUsize,
}

impl MemoryStateStore {
    pub fn with_marker(self, stable_id: &str, marker: &str) -> Self {
        self.values.lock().insert(stable_id.to_string(), Value::String(marker.to_string()));
        self
    }

    pub fn with_value(self, stable_id: &str, value: Value) -> Self {
        self.values.lock().insert(stable_id.to_string(), value);
        self
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, stable_id: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        match self.values.lock().get(stable_id) {
            None => Ok(None),
            Some(Value::String(marker)) => Ok(Some(marker.clone())),
            Some(_) => {
                Err(AgentError::StateStore(format!("value for {stable_id} is not a string")))
            }
        }
    }
}
