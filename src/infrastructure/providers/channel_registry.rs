use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::entities::TicketSource;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::messenger_channel::MessengerChannelAdapter;

/// Source -> adapter lookup. Sources without an adapter are rejected as unsupported.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    adapters: HashMap<TicketSource, Arc<dyn MessengerChannelAdapter>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn MessengerChannelAdapter>) -> Self {
        self.adapters.insert(adapter.source(), adapter);
        self
    }

    pub fn adapter(&self, source: TicketSource) -> DomainResult<Arc<dyn MessengerChannelAdapter>> {
        self.adapters.get(&source).cloned().ok_or_else(|| {
            DomainError::ValidationError(format!("Source '{}' is not supported", source))
        })
    }

    pub fn sources(&self) -> Vec<TicketSource> {
        self.adapters.keys().copied().collect()
    }
}
