//! RecordSource trait - Ingestion input interface
//!
//! A source yields raw lines from one tracked input. Formatting into a
//! `Record` happens in ingestion, so implementations only deal with bytes.

use bytes::Bytes;

use crate::ContractError;

#[trait_variant::make(RecordSource: Send)]
pub trait LocalRecordSource {
    /// Registration name
    fn name(&self) -> &str;

    /// Wait for the next complete line, without its terminator.
    ///
    /// `Ok(None)` means the source is exhausted and will never yield again.
    /// A live file tail never returns it.
    ///
    /// # Errors
    /// A read failure is fatal to the source.
    async fn next_line(&mut self) -> Result<Option<Bytes>, ContractError>;
}
