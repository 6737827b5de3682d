use crate::member::CollectionMember;
use crate::paging::{FetchTicket, FetchWindow, PagedSlice, PaginationKind, ScanCursor, SortSpec};
use crate::DbError;

/// Offset page of a collection key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub key_name: String,
    pub offset: u64,
    pub limit: u32,
    pub sort: SortSpec,
}

/// One SCAN step over a collection key, filtered by a glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub key_name: String,
    pub cursor: ScanCursor,
    pub limit: u32,
    pub pattern: String,
}

/// Backend call a fetch ticket stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchRequest {
    Page(PageRequest),
    Search(SearchRequest),
}

impl FetchRequest {
    pub fn for_ticket(key_name: &str, ticket: &FetchTicket) -> Self {
        match &ticket.window {
            FetchWindow::Offset { offset, limit } => FetchRequest::Page(PageRequest {
                key_name: key_name.to_string(),
                offset: *offset,
                limit: *limit,
                sort: ticket.sort.clone(),
            }),
            FetchWindow::Cursor {
                cursor,
                limit,
                pattern,
            } => FetchRequest::Search(SearchRequest {
                key_name: key_name.to_string(),
                cursor: *cursor,
                limit: *limit,
                pattern: pattern.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateMembersRequest<M> {
    pub key_name: String,
    pub members: Vec<M>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteMembersRequest {
    pub key_name: String,
    pub member_keys: Vec<String>,
}

/// Fetch and mutation layer for one collection type.
///
/// Implementations talk to the server and nothing else; merging results into
/// view state is the caller's job.
pub trait MemberSource: Send + Sync {
    type Member: CollectionMember;

    fn pagination(&self) -> PaginationKind {
        PaginationKind::Offset
    }

    fn fetch_page(&self, request: &PageRequest) -> Result<PagedSlice<Self::Member>, DbError>;

    fn fetch_search_page(
        &self,
        request: &SearchRequest,
    ) -> Result<PagedSlice<Self::Member>, DbError>;

    fn update_members(&self, request: &UpdateMembersRequest<Self::Member>) -> Result<(), DbError>;

    /// Returns how many members the server actually removed.
    fn delete_members(&self, request: &DeleteMembersRequest) -> Result<u64, DbError>;

    /// Runs whichever call `request` describes.
    fn fetch(&self, request: &FetchRequest) -> Result<PagedSlice<Self::Member>, DbError> {
        match request {
            FetchRequest::Page(page) => self.fetch_page(page),
            FetchRequest::Search(search) => self.fetch_search_page(search),
        }
    }
}
