// src/gmail.rs
//
// Gmail REST API client backing the MailStore trait.
// Uses synchronous HTTP (ureq); a run is a short sequential batch job.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::error::RemoteError;
use crate::message::{MessageId, RawMessage};
use crate::oauth2::Session;
use crate::store::{MailStore, SearchPage, MAX_PAGE_SIZE};

/// Response from listing messages
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

/// Reference to a message (just ID and thread ID)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRef {
    id: String,
    #[allow(dead_code)]
    thread_id: Option<String>,
}

pub struct GmailClient {
    session: Session,
    agent: ureq::Agent,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl GmailClient {
    /// Gmail API base URL
    pub const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Gmail rejects batchModify/batchDelete with more ids than this.
    pub const MAX_BATCH: usize = 1000;

    pub fn new(session: Session, timeout: Duration, max_retries: u32) -> Self {
        Self {
            session,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: Self::BASE_URL.to_string(),
            max_retries,
            retry_delay: Duration::from_millis(200),
        }
    }

    /// Point the client at another endpoint (local fakes in tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    fn messages_url(&self, account: &str) -> String {
        format!("{}/users/{}/messages", self.base_url, urlencoding::encode(account))
    }

    /// GET with bounded exponential backoff on transient failures.
    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, RemoteError> {
        let mut delay = self.retry_delay;
        let mut attempt = 0;
        loop {
            match self.get_json_once(url, query) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!("GET {} failed ({}); retry {}/{} in {:?}", url, e, attempt, self.max_retries, delay);
                    std::thread::sleep(delay);
                    delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn get_json_once<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T, RemoteError> {
        let mut request = self.agent.get(url).set("Authorization", &self.session.bearer());
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(|e| remote_error(url, e))?;
        response.into_json().map_err(|e| RemoteError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// Mutations are not retried.
    fn post_json(&self, url: &str, body: serde_json::Value) -> Result<(), RemoteError> {
        self.agent
            .post(url)
            .set("Authorization", &self.session.bearer())
            .send_json(body)
            .map(|_| ())
            .map_err(|e| remote_error(url, e))
    }
}

fn remote_error(url: &str, e: ureq::Error) -> RemoteError {
    match e {
        ureq::Error::Status(status, response) => RemoteError::Status {
            status,
            url: url.to_string(),
            body: response.into_string().unwrap_or_default(),
        },
        ureq::Error::Transport(transport) => RemoteError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

impl MailStore for GmailClient {
    fn search_page(
        &mut self,
        account: &str,
        query: &str,
        page_size: usize,
        page_token: Option<&str>,
    ) -> Result<SearchPage, RemoteError> {
        let url = self.messages_url(account);
        let max_results = page_size.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut params = vec![("q", query), ("maxResults", max_results.as_str())];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let page: ListMessagesResponse = self.get_json(&url, &params)?;
        debug!(
            "search '{}' page returned {} messages (more: {})",
            query,
            page.messages.len(),
            page.next_page_token.is_some()
        );
        Ok(SearchPage {
            ids: page.messages.into_iter().map(|m| m.id).collect(),
            next_page_token: page.next_page_token,
        })
    }

    fn fetch_metadata(&mut self, account: &str, id: &str) -> Result<RawMessage, RemoteError> {
        let url = format!("{}/{}", self.messages_url(account), urlencoding::encode(id));
        self.get_json(&url, &[("format", "metadata")])
    }

    fn batch_remove_label(&mut self, account: &str, ids: &[MessageId], label: &str) -> Result<(), RemoteError> {
        let url = format!("{}/batchModify", self.messages_url(account));
        for chunk in ids.chunks(Self::MAX_BATCH) {
            debug!("batchModify: removing {} from {} messages", label, chunk.len());
            self.post_json(&url, json!({ "ids": chunk, "removeLabelIds": [label] }))?;
        }
        Ok(())
    }

    fn batch_delete(&mut self, account: &str, ids: &[MessageId]) -> Result<(), RemoteError> {
        let url = format!("{}/batchDelete", self.messages_url(account));
        for chunk in ids.chunks(Self::MAX_BATCH) {
            debug!("batchDelete: {} messages", chunk.len());
            self.post_json(&url, json!({ "ids": chunk }))?;
        }
        Ok(())
    }
}
