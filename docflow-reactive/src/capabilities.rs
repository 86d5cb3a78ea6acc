//! Injected platform capabilities.

use crate::{ReactiveError, ReactiveResult};
use docflow_broadcast::BroadcastPrimitive;
use docflow_crypto::FieldCipher;
use docflow_query::QueryPlanner;
use std::sync::Arc;

pub const CIPHER_FEATURE: &str = "cipher";
pub const PLANNER_FEATURE: &str = "query-planner";
pub const BROADCAST_FEATURE: &str = "broadcast";

/// The collaborators a database is opened with.
///
/// Nothing is configured by default. Every accessor fails with
/// [`ReactiveError::FeatureNotConfigured`] naming the missing capability.
#[derive(Clone, Default)]
pub struct Capabilities {
    cipher: Option<Arc<dyn FieldCipher>>,
    planner: Option<Arc<dyn QueryPlanner>>,
    broadcast: Option<Arc<dyn BroadcastPrimitive>>,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn FieldCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn with_planner(mut self, planner: Arc<dyn QueryPlanner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_broadcast(mut self, broadcast: Arc<dyn BroadcastPrimitive>) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    pub fn cipher(&self) -> ReactiveResult<Arc<dyn FieldCipher>> {
        self.cipher.clone().ok_or(ReactiveError::FeatureNotConfigured {
            feature: CIPHER_FEATURE,
        })
    }

    pub fn planner(&self) -> ReactiveResult<Arc<dyn QueryPlanner>> {
        self.planner.clone().ok_or(ReactiveError::FeatureNotConfigured {
            feature: PLANNER_FEATURE,
        })
    }

    pub fn broadcast(&self) -> ReactiveResult<Arc<dyn BroadcastPrimitive>> {
        self.broadcast.clone().ok_or(ReactiveError::FeatureNotConfigured {
            feature: BROADCAST_FEATURE,
        })
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("cipher", &self.cipher.is_some())
            .field("planner", &self.planner.is_some())
            .field(
                "broadcast",
                &self.broadcast.as_ref().map(|primitive| primitive.kind().to_string()),
            )
            .finish()
    }
}
