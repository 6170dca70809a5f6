// src/triage.rs

use log::{debug, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::cfg::Config;
use crate::error::{Error, Result, Stage};
use crate::export::{DurableWrite, ExportWriter};
use crate::gmail::GmailClient;
use crate::message::{MessageExcerpt, MessageId};
use crate::oauth2;
use crate::store::{labels, MailStore, MAX_PAGE_SIZE};

/// Outcome of the retrieval stage.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Retrieval {
    /// Exported ids in export order; the mark-read batch.
    pub accumulator: Vec<MessageId>,
    /// Messages left alone because of a skip label.
    pub skipped: usize,
    /// Messages whose fetch failed and were skipped.
    pub failed: usize,
}

/// Counts for one run, logged when it finishes.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunSummary {
    pub exported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub marked_read: usize,
    pub deleted: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exported={} skipped={} failed={} marked_read={} deleted={}",
            self.exported, self.skipped, self.failed, self.marked_read, self.deleted
        )
    }
}

pub struct Triage<'a, S: MailStore> {
    pub store: S,
    config: &'a Config,
}

impl<'a, S: MailStore> Triage<'a, S> {
    pub fn new(store: S, config: &'a Config) -> Self {
        debug!(
            "Initializing Triage for '{}' with {} retrieve queries, {} delete queries, limit {}",
            config.account,
            config.retrieve_queries.len(),
            config.delete_queries.len(),
            config.limit,
        );
        Triage { store, config }
    }

    /// Retrieve, then mark read, then delete. Stops at the first fatal error.
    pub fn execute<W: DurableWrite>(&mut self, writer: &mut ExportWriter<W>) -> Result<RunSummary> {
        debug!("Entering Triage.execute");

        let retrieval = self.retrieve(writer)?;
        let marked_read = self.mark_read(&retrieval.accumulator)?;
        let deleted = self.delete_matching()?;

        let summary = RunSummary {
            exported: retrieval.accumulator.len(),
            skipped: retrieval.skipped,
            failed: retrieval.failed,
            marked_read,
            deleted,
        };
        info!("✅ Run complete: {}", summary);
        Ok(summary)
    }

    /// Export up to `limit` messages across all retrieve queries, in order.
    ///
    /// Result pages are requested lazily, sized to what is left of the limit.
    /// The sink is synced before returning, so every id in the accumulator
    /// has its excerpt on disk before anything is marked read.
    pub fn retrieve<W: DurableWrite>(&mut self, writer: &mut ExportWriter<W>) -> Result<Retrieval> {
        let config = self.config;
        let limit = config.limit;
        info!(
            "→ Phase 1: retrieving up to {} messages for {} queries",
            limit,
            config.retrieve_queries.len()
        );

        let mut out = Retrieval::default();
        let mut seen: HashSet<MessageId> = HashSet::new();

        for query in &config.retrieve_queries {
            if out.accumulator.len() >= limit {
                info!("Retrieve limit of {} reached; skipping remaining queries", limit);
                break;
            }

            info!("Retrieve q: {}", query);
            let mut page_token: Option<String> = None;
            loop {
                let page_size = (limit - out.accumulator.len()).min(MAX_PAGE_SIZE);
                let page = self
                    .store
                    .search_page(&config.account, query, page_size, page_token.as_deref())
                    .map_err(|e| Error::remote(Stage::Retrieve, e))?;
                debug!("Search page returned {} messages", page.ids.len());

                self.export_page(page.ids, writer, &mut seen, &mut out)?;

                if out.accumulator.len() >= limit {
                    info!("Exceeded retrieve limit per execution.");
                    break;
                }
                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
            info!("Retrieved {} mails.", out.accumulator.len());
        }

        if !out.accumulator.is_empty() {
            writer.sync()?;
        }
        Ok(out)
    }

    fn export_page<W: DurableWrite>(
        &mut self,
        ids: Vec<MessageId>,
        writer: &mut ExportWriter<W>,
        seen: &mut HashSet<MessageId>,
        out: &mut Retrieval,
    ) -> Result<()> {
        let account = self.config.account.as_str();
        for id in ids {
            if out.accumulator.len() >= self.config.limit {
                break;
            }
            if seen.contains(&id) {
                debug!("{} already exported in this run", id);
                continue;
            }

            let msg = match self.store.fetch_metadata(account, &id) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Skipping {}: fetch failed: {}", id, e);
                    out.failed += 1;
                    continue;
                }
            };

            if let Some(label) = self.config.skip_labels.matched(&msg.label_ids) {
                debug!("Skipping {}: has skip label {}", id, label);
                out.skipped += 1;
                continue;
            }

            writer.append(&MessageExcerpt::extract(msg))?;

            // only after the excerpt is written
            seen.insert(id.clone());
            out.accumulator.push(id);
        }
        Ok(())
    }

    /// One batched UNREAD removal for every exported id. Empty input sends nothing.
    pub fn mark_read(&mut self, ids: &[MessageId]) -> Result<usize> {
        info!("→ Phase 2: marking {} messages as read", ids.len());
        if ids.is_empty() {
            debug!("Nothing to mark as read");
            return Ok(0);
        }
        if self.config.dry_run {
            info!("DRY-RUN would change {} mails to READ: {:?}", ids.len(), ids);
            return Ok(0);
        }

        self.store
            .batch_remove_label(&self.config.account, ids, labels::UNREAD)
            .map_err(|e| Error::remote(Stage::MarkRead, e))?;
        info!("Change {} mails to READ.", ids.len());
        Ok(ids.len())
    }

    /// One batched delete per delete query that matches anything.
    pub fn delete_matching(&mut self) -> Result<usize> {
        let account = self.config.account.as_str();
        info!("→ Phase 3: applying {} delete queries", self.config.delete_queries.len());

        let mut deleted = 0;
        for query in &self.config.delete_queries {
            info!("Delete q: {}", query);
            let ids = self
                .store
                .search(account, query)
                .map_err(|e| Error::remote(Stage::Delete, e))?;

            if ids.is_empty() {
                info!("No mail found for q: {}", query);
                continue;
            }
            if self.config.dry_run {
                info!("DRY-RUN would delete {} mails for q: {}", ids.len(), query);
                continue;
            }

            self.store
                .batch_delete(account, &ids)
                .map_err(|e| Error::remote(Stage::Delete, e))?;
            info!("🗑 Deleted {} mails for q: {}", ids.len(), query);
            deleted += ids.len();
        }

        Ok(deleted)
    }
}

/// Acquire a session, open the sink, and run the pipeline against Gmail.
pub fn run(config: &Config) -> Result<RunSummary> {
    let timeout = Duration::from_secs(config.timeout_secs);
    let session = oauth2::get_session(&config.credentials_path()?, &config.token_path()?, timeout)?;
    let client = GmailClient::new(session, timeout, config.max_retries);
    let mut writer = ExportWriter::open(&config.output_file)?;

    Triage::new(client, config).execute(&mut writer)
}
