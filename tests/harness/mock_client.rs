// tests/harness/mock_client.rs
//
// Mock mail store for testing.
// Records every remote call for verification and operates against a VirtualMailbox.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use gmail_headline::{MailStore, MessageId, RawMessage, RemoteError, SearchPage};

use crate::harness::virtual_mailbox::VirtualMailbox;

/// Recorded remote calls, in the order they were made.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Search { account: String, query: String },
    Fetch { id: String },
    BatchRemoveLabel { ids: Vec<String>, label: String },
    BatchDelete { ids: Vec<String> },
}

impl RecordedCall {
    pub fn is_fetch(&self) -> bool {
        matches!(self, RecordedCall::Fetch { .. })
    }

    pub fn is_search_for(&self, q: &str) -> bool {
        matches!(self, RecordedCall::Search { query, .. } if query == q)
    }
}

/// Failures to inject into the next calls.
#[derive(Debug, Default)]
struct Faults {
    fetch_ids: HashSet<String>,
    search_queries: HashSet<String>,
    mark_read: bool,
    delete: bool,
}

/// Mock Gmail client. Clones share the same mailbox, call log and faults.
#[derive(Clone)]
pub struct MockMailClient {
    mailbox: Arc<RwLock<VirtualMailbox>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    faults: Arc<RwLock<Faults>>,
}

impl MockMailClient {
    pub fn new(mailbox: Arc<RwLock<VirtualMailbox>>) -> Self {
        Self {
            mailbox,
            calls: Arc::new(RwLock::new(Vec::new())),
            faults: Arc::new(RwLock::new(Faults::default())),
        }
    }

    // ===== Fault injection =====

    pub fn fail_fetch(&self, id: &str) {
        self.faults.write().unwrap().fetch_ids.insert(id.to_string());
    }

    pub fn fail_search(&self, query: &str) {
        self.faults.write().unwrap().search_queries.insert(query.to_string());
    }

    pub fn fail_mark_read(&self, fail: bool) {
        self.faults.write().unwrap().mark_read = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.faults.write().unwrap().delete = fail;
    }

    // ===== Call recording =====

    pub fn get_recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().unwrap().clone()
    }

    pub fn clear_recorded_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    /// Number of search pages requested for `query`.
    pub fn search_count(&self, query: &str) -> usize {
        self.calls.read().unwrap().iter().filter(|c| c.is_search_for(query)).count()
    }

    pub fn fetch_count(&self) -> usize {
        self.calls.read().unwrap().iter().filter(|c| c.is_fetch()).count()
    }

    /// Id lists of every batchModify call.
    pub fn mark_read_batches(&self) -> Vec<Vec<String>> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                RecordedCall::BatchRemoveLabel { ids, .. } => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    /// Id lists of every batchDelete call.
    pub fn delete_batches(&self) -> Vec<Vec<String>> {
        self.calls
            .read()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                RecordedCall::BatchDelete { ids } => Some(ids.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.write().unwrap().push(call);
    }

    fn injected(what: &str) -> RemoteError {
        RemoteError::Status {
            status: 500,
            url: format!("mock://{}", what),
            body: "injected failure".to_string(),
        }
    }
}

impl MailStore for MockMailClient {
    /// Page tokens are offsets into the full result list.
    fn search_page(
        &mut self,
        account: &str,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<SearchPage, RemoteError> {
        self.record(RecordedCall::Search {
            account: account.to_string(),
            query: query.to_string(),
        });
        if self.faults.read().unwrap().search_queries.contains(query) {
            return Err(Self::injected("search"));
        }

        let all = self.mailbox.read().unwrap().search(query);
        let start = page_token.map(|t| t.parse::<usize>().unwrap()).unwrap_or(0);
        let end = (start + page_size.max(1)).min(all.len());
        Ok(SearchPage {
            ids: all[start.min(end)..end].to_vec(),
            next_page_token: (end < all.len()).then(|| end.to_string()),
        })
    }

    fn fetch_metadata(&mut self, _account: &str, id: &str) -> Result<RawMessage, RemoteError> {
        self.record(RecordedCall::Fetch { id: id.to_string() });
        if self.faults.read().unwrap().fetch_ids.contains(id) {
            return Err(Self::injected("fetch"));
        }
        self.mailbox
            .read()
            .unwrap()
            .get_message(id)
            .map(|m| m.to_raw())
            .ok_or_else(|| RemoteError::Status {
                status: 404,
                url: format!("mock://messages/{}", id),
                body: "Requested entity was not found.".to_string(),
            })
    }

    fn batch_remove_label(&mut self, _account: &str, ids: &[MessageId], label: &str) -> Result<(), RemoteError> {
        self.record(RecordedCall::BatchRemoveLabel {
            ids: ids.to_vec(),
            label: label.to_string(),
        });
        if self.faults.read().unwrap().mark_read {
            return Err(Self::injected("batchModify"));
        }
        let mut mailbox = self.mailbox.write().unwrap();
        for id in ids {
            mailbox.remove_label(id, label);
        }
        Ok(())
    }

    fn batch_delete(&mut self, _account: &str, ids: &[MessageId]) -> Result<(), RemoteError> {
        self.record(RecordedCall::BatchDelete { ids: ids.to_vec() });
        if self.faults.read().unwrap().delete {
            return Err(Self::injected("batchDelete"));
        }
        let mut mailbox = self.mailbox.write().unwrap();
        for id in ids {
            mailbox.delete_message(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::virtual_mailbox::MailboxMessage;

    fn setup() -> (MockMailClient, Arc<RwLock<VirtualMailbox>>) {
        let mailbox = Arc::new(RwLock::new(VirtualMailbox::new()));
        mailbox
            .write()
            .unwrap()
            .add_message(MailboxMessage::new("a", "Hello", "alice@example.com"));
        (MockMailClient::new(Arc::clone(&mailbox)), mailbox)
    }

    #[test]
    fn test_mock_records_calls_in_order() {
        let (mut client, _) = setup();
        client.search("me", "is:unread").unwrap();
        client.fetch_metadata("me", "a").unwrap();

        let calls = client.get_recorded_calls();
        assert!(calls[0].is_search_for("is:unread"));
        assert_eq!(calls[1], RecordedCall::Fetch { id: "a".to_string() });
    }

    #[test]
    fn test_mock_mutations_change_mailbox() {
        let (mut client, mailbox) = setup();
        client.batch_remove_label("me", &["a".to_string()], "UNREAD").unwrap();
        assert!(mailbox.read().unwrap().unread_ids().is_empty());

        client.batch_delete("me", &["a".to_string()]).unwrap();
        assert_eq!(mailbox.read().unwrap().message_count(), 0);
    }

    #[test]
    fn test_mock_search_pages() {
        let (mut client, mailbox) = setup();
        for id in ["b", "c"] {
            mailbox.write().unwrap().add_message(MailboxMessage::new(id, "More", "bob@example.com"));
        }

        let first = client.search_page("me", "is:unread", 2, None).unwrap();
        assert_eq!(first.ids, vec!["a", "b"]);
        let second = client
            .search_page("me", "is:unread", 2, first.next_page_token.as_deref())
            .unwrap();
        assert_eq!(second.ids, vec!["c"]);
        assert!(second.next_page_token.is_none());

        assert_eq!(client.search("me", "is:unread").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_mock_fault_injection() {
        let (mut client, _) = setup();
        client.fail_fetch("a");
        assert!(client.fetch_metadata("me", "a").is_err());
        assert!(client.fetch_metadata("me", "missing").is_err());
    }
}
