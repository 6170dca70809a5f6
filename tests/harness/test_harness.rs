// tests/harness/test_harness.rs
//
// High-level test harness combining all components.
// Provides a convenient API for writing pipeline tests.

use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use gmail_headline::error::Result;
use gmail_headline::{Config, ExportWriter, MessageExcerpt, RunSummary, SkipLabels, Triage};
use tempfile::TempDir;

use crate::harness::fixtures::FixtureLoader;
use crate::harness::mock_client::MockMailClient;
use crate::harness::virtual_mailbox::{MailboxMessage, VirtualMailbox};

/// High-level test harness: a virtual mailbox, a mock client over it,
/// and a temporary output sink.
pub struct TestHarness {
    pub mailbox: Arc<RwLock<VirtualMailbox>>,
    pub client: MockMailClient,
    pub loader: FixtureLoader,
    dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let mailbox = Arc::new(RwLock::new(VirtualMailbox::new()));
        let client = MockMailClient::new(Arc::clone(&mailbox));

        Self {
            mailbox,
            client,
            loader: FixtureLoader::new(),
            dir: TempDir::new().expect("tempdir"),
        }
    }

    // ===== Message Management =====

    pub fn add_message(&mut self, message: MailboxMessage) -> String {
        self.mailbox.write().unwrap().add_message(message)
    }

    /// Add `count` unread messages with ids `prefix0..`.
    pub fn add_unread(&mut self, prefix: &str, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                let id = format!("{}{}", prefix, i);
                self.add_message(MailboxMessage::new(&id, &format!("Message {}", id), "sender@example.com"))
            })
            .collect()
    }

    pub fn add_fixture(&mut self, name: &str) -> String {
        let msg = self.loader.load_message(name).expect("fixture");
        self.add_message(msg)
    }

    // ===== Configuration =====

    pub fn config(&self, retrieve: &[&str], delete: &[&str], limit: usize) -> Config {
        Config {
            retrieve_queries: retrieve.iter().map(|q| q.to_string()).collect(),
            delete_queries: delete.iter().map(|q| q.to_string()).collect(),
            limit,
            output_file: self.sink_path(),
            ..Config::default()
        }
    }

    pub fn with_skip_labels(mut config: Config, labels: &[&str]) -> Config {
        config.skip_labels = SkipLabels::new(labels).expect("skip labels");
        config
    }

    // ===== Execution =====

    /// Run the whole pipeline against the mock client and the temp sink.
    pub fn run(&self, config: &Config) -> Result<RunSummary> {
        let mut writer = ExportWriter::open(&config.output_file)?;
        Triage::new(self.client.clone(), config).execute(&mut writer)
    }

    /// Writer on the harness sink, for driving single stages.
    pub fn writer(&self) -> ExportWriter<File> {
        ExportWriter::open(&self.sink_path()).expect("sink")
    }

    // ===== Verification =====

    pub fn sink_path(&self) -> PathBuf {
        self.dir.path().join("headline.jsonl")
    }

    /// Every excerpt in the sink, in file order.
    pub fn exported(&self) -> Vec<MessageExcerpt> {
        match std::fs::read_to_string(self.sink_path()) {
            Ok(content) => content
                .lines()
                .map(|l| serde_json::from_str(l).expect("excerpt line"))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn exported_ids(&self) -> Vec<String> {
        self.exported().into_iter().map(|e| e.metadata.id).collect()
    }

    pub fn unread_ids(&self) -> Vec<String> {
        self.mailbox.read().unwrap().unread_ids()
    }

    pub fn message_count(&self) -> usize {
        self.mailbox.read().unwrap().message_count()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
