use keyscope_core::{
    CollectionMember, DbError, DeleteMembersRequest, HashField, MemberSource, PageRequest,
    PagedSlice, PaginationKind, ScanCursor, SearchRequest, SortDirection, UpdateMembersRequest,
    ZSetMember, is_glob_pattern, unescape_glob,
};
use std::sync::{Arc, Mutex, RwLock};

use crate::fixtures::glob_match;
use crate::{mutex_lock, rwlock_read, rwlock_write};

/// A backend call observed by a fake source.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    FetchPage(PageRequest),
    FetchSearch(SearchRequest),
    Update {
        key_name: String,
        member_keys: Vec<String>,
    },
    Delete(DeleteMembersRequest),
}

#[derive(Debug, Clone, Default)]
pub struct FakeSourceStats {
    pub calls: Vec<FakeCall>,
}

impl FakeSourceStats {
    pub fn page_requests(&self) -> Vec<&PageRequest> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                FakeCall::FetchPage(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn search_requests(&self) -> Vec<&SearchRequest> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                FakeCall::FetchSearch(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn update_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, FakeCall::Update { .. }))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, FakeCall::Delete(_)))
            .count()
    }
}

struct FakeSourceState<M> {
    members: RwLock<Vec<M>>,
    calls: Mutex<Vec<FakeCall>>,
    fetch_error: RwLock<Option<String>>,
    update_error: RwLock<Option<String>>,
    delete_error: RwLock<Option<String>>,
}

impl<M> FakeSourceState<M> {
    fn new(members: Vec<M>) -> Self {
        Self {
            members: RwLock::new(members),
            calls: Mutex::new(Vec::new()),
            fetch_error: RwLock::new(None),
            update_error: RwLock::new(None),
            delete_error: RwLock::new(None),
        }
    }
}

/// In-memory collection shared by the fake sources.
struct FakeCollection<M> {
    state: Arc<FakeSourceState<M>>,
}

impl<M> Clone for FakeCollection<M> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<M: CollectionMember> FakeCollection<M> {
    fn new(members: Vec<M>) -> Self {
        Self {
            state: Arc::new(FakeSourceState::new(members)),
        }
    }

    fn record(&self, call: FakeCall) {
        mutex_lock(&self.state.calls).push(call);
    }

    fn check(&self, error: &RwLock<Option<String>>) -> Result<(), DbError> {
        match rwlock_read(error).clone() {
            Some(message) => Err(DbError::query_failed(message)),
            None => Ok(()),
        }
    }

    fn stats(&self) -> FakeSourceStats {
        FakeSourceStats {
            calls: mutex_lock(&self.state.calls).clone(),
        }
    }

    fn snapshot(&self) -> Vec<M> {
        rwlock_read(&self.state.members).clone()
    }

    /// SCAN emulation: the cursor is a position in insertion order.
    fn scan(&self, request: &SearchRequest) -> Result<PagedSlice<M>, DbError> {
        self.record(FakeCall::FetchSearch(request.clone()));
        self.check(&self.state.fetch_error)?;

        let members = rwlock_read(&self.state.members);
        let total = members.len() as u64;

        if !is_glob_pattern(&request.pattern) {
            let name = unescape_glob(&request.pattern);
            let found = members
                .iter()
                .filter(|m| m.member_key() == name)
                .cloned()
                .collect();
            return Ok(PagedSlice::new(total, ScanCursor::START, found));
        }

        // One SCAN step covers `limit` slots; steps repeat until `limit`
        // members matched or the cursor wrapped around.
        let step = request.limit.max(1) as usize;
        let wanted = request.limit as usize;
        let mut start = usize::try_from(request.cursor.0)
            .unwrap_or(usize::MAX)
            .min(members.len());
        let mut matched = Vec::new();

        loop {
            let end = start.saturating_add(step).min(members.len());
            matched.extend(
                members[start..end]
                    .iter()
                    .filter(|m| glob_match(&request.pattern, m.member_key()))
                    .cloned(),
            );
            start = end;

            if start >= members.len() || matched.len() >= wanted {
                break;
            }
        }

        let next = if start >= members.len() { 0 } else { start as u64 };
        Ok(PagedSlice::new(total, ScanCursor(next), matched))
    }

    fn update(&self, request: &UpdateMembersRequest<M>) -> Result<(), DbError> {
        self.record(FakeCall::Update {
            key_name: request.key_name.clone(),
            member_keys: request
                .members
                .iter()
                .map(|m| m.member_key().to_string())
                .collect(),
        });
        self.check(&self.state.update_error)?;

        let mut members = rwlock_write(&self.state.members);
        for updated in &request.members {
            match members
                .iter_mut()
                .find(|m| m.member_key() == updated.member_key())
            {
                Some(existing) => *existing = updated.clone(),
                None => members.push(updated.clone()),
            }
        }
        Ok(())
    }

    fn delete(&self, request: &DeleteMembersRequest) -> Result<u64, DbError> {
        self.record(FakeCall::Delete(request.clone()));
        self.check(&self.state.delete_error)?;

        let mut members = rwlock_write(&self.state.members);
        let before = members.len();
        members.retain(|m| !request.member_keys.iter().any(|k| k == m.member_key()));
        Ok((before - members.len()) as u64)
    }
}

// --- Sorted set ---

/// Sorted set held in memory; pages are ordered by score, then name.
#[derive(Clone)]
pub struct FakeZSetSource {
    inner: FakeCollection<ZSetMember>,
}

impl FakeZSetSource {
    pub fn new(members: Vec<ZSetMember>) -> Self {
        Self {
            inner: FakeCollection::new(members),
        }
    }

    pub fn with_fetch_error(self, message: impl Into<String>) -> Self {
        self.set_fetch_error(Some(message.into()));
        self
    }

    pub fn with_update_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.inner.state.update_error) = Some(message.into());
        self
    }

    pub fn with_delete_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.inner.state.delete_error) = Some(message.into());
        self
    }

    pub fn set_fetch_error(&self, message: Option<String>) {
        *rwlock_write(&self.inner.state.fetch_error) = message;
    }

    pub fn stats(&self) -> FakeSourceStats {
        self.inner.stats()
    }

    pub fn members(&self) -> Vec<ZSetMember> {
        self.inner.snapshot()
    }
}

impl MemberSource for FakeZSetSource {
    type Member = ZSetMember;

    fn fetch_page(&self, request: &PageRequest) -> Result<PagedSlice<ZSetMember>, DbError> {
        self.inner.record(FakeCall::FetchPage(request.clone()));
        self.inner.check(&self.inner.state.fetch_error)?;

        let mut sorted = self.inner.snapshot();
        sorted.sort_by(|a, b| a.score.total_cmp(&b.score).then_with(|| a.name.cmp(&b.name)));
        if request.sort.order == SortDirection::Descending {
            sorted.reverse();
        }

        let total = sorted.len() as u64;
        let members = sorted
            .into_iter()
            .skip(usize::try_from(request.offset).unwrap_or(usize::MAX))
            .take(request.limit as usize)
            .collect();

        Ok(PagedSlice::new(total, ScanCursor::START, members))
    }

    fn fetch_search_page(&self, request: &SearchRequest) -> Result<PagedSlice<ZSetMember>, DbError> {
        self.inner.scan(request)
    }

    fn update_members(&self, request: &UpdateMembersRequest<ZSetMember>) -> Result<(), DbError> {
        self.inner.update(request)
    }

    fn delete_members(&self, request: &DeleteMembersRequest) -> Result<u64, DbError> {
        self.inner.delete(request)
    }
}

// --- Hash ---

/// Hash held in memory; only reachable through SCAN-style cursors.
#[derive(Clone)]
pub struct FakeHashSource {
    inner: FakeCollection<HashField>,
}

impl FakeHashSource {
    pub fn new(fields: Vec<HashField>) -> Self {
        Self {
            inner: FakeCollection::new(fields),
        }
    }

    pub fn with_fetch_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.inner.state.fetch_error) = Some(message.into());
        self
    }

    pub fn stats(&self) -> FakeSourceStats {
        self.inner.stats()
    }

    pub fn fields(&self) -> Vec<HashField> {
        self.inner.snapshot()
    }
}

impl MemberSource for FakeHashSource {
    type Member = HashField;

    fn pagination(&self) -> PaginationKind {
        PaginationKind::Cursor
    }

    fn fetch_page(&self, request: &PageRequest) -> Result<PagedSlice<HashField>, DbError> {
        self.inner.record(FakeCall::FetchPage(request.clone()));
        Err(DbError::NotSupported(
            "hash fields are only reachable by cursor".to_string(),
        ))
    }

    fn fetch_search_page(&self, request: &SearchRequest) -> Result<PagedSlice<HashField>, DbError> {
        self.inner.scan(request)
    }

    fn update_members(&self, request: &UpdateMembersRequest<HashField>) -> Result<(), DbError> {
        self.inner.update(request)
    }

    fn delete_members(&self, request: &DeleteMembersRequest) -> Result<u64, DbError> {
        self.inner.delete(request)
    }
}
