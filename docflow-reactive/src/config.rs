/// Default number of change events kept per collection.
pub const DEFAULT_EVENT_BUFFER_LIMIT: usize = 100;

/// Default capacity of the in-process event hub.
pub const HUB_CAPACITY: usize = 1024;

/// Revisions and inbound event hashes remembered for deduplication.
pub const DEDUP_WINDOW: usize = 1024;

/// Configuration for opening a database.
#[derive(Clone)]
pub struct DatabaseConfig {
    /// Logical database name, shared by every instance of the database.
    pub name: String,
    /// Fan events out to sibling instances over the broadcast capability.
    pub multi_instance: bool,
    /// Password for field-level encryption. `None` disables encryption.
    pub password: Option<String>,
    /// Change events kept per collection for catching up.
    pub event_buffer_limit: usize,
    /// Events a [`changes`](crate::DatabaseHandle::changes) subscriber may
    /// fall behind before it skips the oldest ones.
    pub hub_capacity: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            name: "docflow".to_string(),
            multi_instance: true,
            password: None,
            event_buffer_limit: DEFAULT_EVENT_BUFFER_LIMIT,
            hub_capacity: HUB_CAPACITY,
        }
    }
}

impl DatabaseConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("name", &self.name)
            .field("multi_instance", &self.multi_instance)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("event_buffer_limit", &self.event_buffer_limit)
            .field("hub_capacity", &self.hub_capacity)
            .finish()
    }
}
