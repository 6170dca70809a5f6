// tests/harness/mod.rs
//
// Integration testing harness for gmail-headline.
// Provides an in-memory Gmail mailbox and a recording mock client.

pub mod mock_client;
pub mod test_harness;

pub use fixtures::FixtureLoader;
pub use mock_client::{MockMailClient, RecordedCall};
pub use test_harness::TestHarness;
pub use virtual_mailbox::{MailboxMessage, VirtualMailbox};
