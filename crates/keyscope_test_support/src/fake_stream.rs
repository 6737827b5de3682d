use keyscope_core::{
    ClaimOutcome, ClaimRequest, Consumer, ConsumerGroup, DbError, PendingMessage, PendingRequest,
    StreamApi,
};
use std::sync::{Arc, Mutex, RwLock};

use crate::{mutex_lock, rwlock_read, rwlock_write};

#[derive(Default)]
struct FakeStreamState {
    groups: RwLock<Vec<ConsumerGroup>>,
    consumers: RwLock<Vec<(String, Consumer)>>,
    pending: RwLock<Vec<(String, PendingMessage)>>,
    claims: Mutex<Vec<ClaimRequest>>,
    pending_requests: Mutex<Vec<PendingRequest>>,
    error: RwLock<Option<String>>,
}

/// Consumer groups of a single stream, with XCLAIM's min-idle rule.
#[derive(Clone, Default)]
pub struct FakeStreamApi {
    state: Arc<FakeStreamState>,
}

impl FakeStreamApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, name: impl Into<String>) -> Self {
        rwlock_write(&self.state.groups).push(ConsumerGroup {
            name: name.into(),
            consumers: 0,
            pending: 0,
            last_delivered_id: "0-0".to_string(),
        });
        self
    }

    pub fn with_consumer(self, group: impl Into<String>, name: impl Into<String>) -> Self {
        let group = group.into();
        rwlock_write(&self.state.consumers).push((
            group.clone(),
            Consumer {
                name: name.into(),
                pending: 0,
                idle_ms: 0,
            },
        ));
        if let Some(entry) = rwlock_write(&self.state.groups)
            .iter_mut()
            .find(|g| g.name == group)
        {
            entry.consumers += 1;
        }
        self
    }

    pub fn with_pending(self, group: impl Into<String>, message: PendingMessage) -> Self {
        let group = group.into();
        if let Some(entry) = rwlock_write(&self.state.groups)
            .iter_mut()
            .find(|g| g.name == group)
        {
            entry.pending += 1;
        }
        rwlock_write(&self.state.pending).push((group, message));
        self
    }

    pub fn with_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.state.error) = Some(message.into());
        self
    }

    pub fn claims(&self) -> Vec<ClaimRequest> {
        mutex_lock(&self.state.claims).clone()
    }

    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        mutex_lock(&self.state.pending_requests).clone()
    }

    fn check(&self) -> Result<(), DbError> {
        match rwlock_read(&self.state.error).clone() {
            Some(message) => Err(DbError::query_failed(message)),
            None => Ok(()),
        }
    }
}

impl StreamApi for FakeStreamApi {
    fn groups(&self, _key_name: &str) -> Result<Vec<ConsumerGroup>, DbError> {
        self.check()?;
        Ok(rwlock_read(&self.state.groups).clone())
    }

    fn consumers(&self, _key_name: &str, group_name: &str) -> Result<Vec<Consumer>, DbError> {
        self.check()?;
        let pending = rwlock_read(&self.state.pending);

        Ok(rwlock_read(&self.state.consumers)
            .iter()
            .filter(|(group, _)| group == group_name)
            .map(|(_, consumer)| {
                let mut consumer = consumer.clone();
                consumer.pending = pending
                    .iter()
                    .filter(|(group, m)| group == group_name && m.consumer == consumer.name)
                    .count() as u64;
                consumer
            })
            .collect())
    }

    fn pending(&self, request: &PendingRequest) -> Result<Vec<PendingMessage>, DbError> {
        mutex_lock(&self.state.pending_requests).push(request.clone());
        self.check()?;

        Ok(rwlock_read(&self.state.pending)
            .iter()
            .filter(|(group, m)| group == &request.group_name && m.consumer == request.consumer_name)
            .map(|(_, m)| m.clone())
            .take(request.count as usize)
            .collect())
    }

    fn claim(&self, request: &ClaimRequest) -> Result<ClaimOutcome, DbError> {
        mutex_lock(&self.state.claims).push(request.clone());
        self.check()?;

        let mut affected = Vec::new();
        for (group, message) in rwlock_write(&self.state.pending).iter_mut() {
            if group != &request.group_name
                || !request.entries.contains(&message.id)
                || message.idle_ms < request.min_idle_time
            {
                continue;
            }

            message.consumer = request.consumer_name.clone();
            message.idle_ms = request.idle.unwrap_or(0);
            if let Some(retry_count) = request.retry_count {
                message.delivered_count = retry_count;
            }
            affected.push(message.id);
        }

        Ok(ClaimOutcome { affected })
    }
}
