// src/store.rs
//
// Trait abstraction for the remote mail store.
// Lets the pipeline run against the Gmail API or against test mocks.

use crate::error::RemoteError;
use crate::message::{MessageId, RawMessage};

/// Gmail system label ids used by the pipeline.
pub mod labels {
    pub const UNREAD: &str = "UNREAD";
}

/// Largest page `messages.list` will return.
pub const MAX_PAGE_SIZE: usize = 500;

/// One page of search results.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SearchPage {
    pub ids: Vec<MessageId>,
    pub next_page_token: Option<String>,
}

/// Remote mail store operations the pipeline depends on.
pub trait MailStore {
    /// Up to `page_size` ids matching `query`, starting at `page_token`.
    fn search_page(
        &mut self,
        account: &str,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<SearchPage, RemoteError>;

    /// Headers and metadata for one message. Never the body.
    fn fetch_metadata(&mut self, account: &str, id: &str) -> Result<RawMessage, RemoteError>;

    /// Remove `label` from every message in `ids` as one batch.
    fn batch_remove_label(&mut self, account: &str, ids: &[MessageId], label: &str) -> Result<(), RemoteError>;

    /// Permanently delete every message in `ids` as one batch.
    fn batch_delete(&mut self, account: &str, ids: &[MessageId]) -> Result<(), RemoteError>;

    /// Ids of every message matching `query`, in store order, across all pages.
    fn search(&mut self, account: &str, query: &str) -> Result<Vec<MessageId>, RemoteError> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.search_page(account, query, MAX_PAGE_SIZE, page_token.as_deref())?;
            ids.extend(page.ids);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => return Ok(ids),
            }
        }
    }
}
