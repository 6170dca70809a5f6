// src/lib.rs
//
// Library entry point for gmail-headline.
// Re-exports modules needed by the binary and the integration tests.

pub mod cfg;
pub mod cli;
pub mod error;
pub mod export;
pub mod gmail;
pub mod message;
pub mod oauth2;
pub mod store;
pub mod triage;

pub use cfg::{Config, SkipLabels};
pub use error::{Error, RemoteError, Stage};
pub use export::{DurableWrite, ExportWriter};
pub use message::{Header, MessageExcerpt, MessageId, RawMessage};
pub use oauth2::{Clock, RealClock};
pub use store::{MailStore, SearchPage};
pub use triage::{Retrieval, RunSummary, Triage};
