//! Notifications raised by connectors and the metadata that describes them.

use crate::entity::EntityValue;
use chrono::{DateTime, Utc};

/// One emitted event
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Category the event belongs to
    pub category: String,
    /// Subscription list it was fired through
    pub list_id: String,
    /// Resource that emitted it
    pub source: String,
    /// Per-list sequence number, starting at 1
    pub sequence: u64,
    /// Emission time
    pub timestamp: DateTime<Utc>,
    /// Human readable message
    pub message: String,
    /// Optional typed payload
    pub user_data: Option<EntityValue>,
}

impl Notification {
    /// A notification stamped with the current time and no payload
    pub fn new(category: impl Into<String>, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            list_id: String::new(),
            source: source.into(),
            sequence: 0,
            timestamp: Utc::now(),
            message: message.into(),
            user_data: None,
        }
    }

    /// Attach a payload
    #[must_use]
    pub fn with_user_data(mut self, user_data: EntityValue) -> Self {
        self.user_data = Some(user_data);
        self
    }
}
