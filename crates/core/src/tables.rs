//! Replicated table identities, derived from bus topic names.

/// Topic prefix carrying the table identity.
pub const TOPIC_PREFIX: &str = "sync.";

/// Tables participating in cross-region sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncTable {
    Users,
    Products,
    Sales,
}

impl SyncTable {
    pub const ALL: [SyncTable; 3] = [SyncTable::Users, SyncTable::Products, SyncTable::Sales];

    /// Parse a table from its bus topic, e.g. `sync.products`.
    pub fn from_topic(topic: &str) -> Option<Self> {
        Self::from_name(topic.strip_prefix(TOPIC_PREFIX)?)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "users" => Some(SyncTable::Users),
            "products" => Some(SyncTable::Products),
            "sales" => Some(SyncTable::Sales),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTable::Users => "users",
            SyncTable::Products => "products",
            SyncTable::Sales => "sales",
        }
    }

    pub fn topic(&self) -> String {
        format!("{TOPIC_PREFIX}{}", self.as_str())
    }
}

impl std::fmt::Display for SyncTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
