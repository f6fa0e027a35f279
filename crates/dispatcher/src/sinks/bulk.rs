//! BulkSink - feeds the batch assembler

use contracts::{ContractError, Record, RecordSink};
use tokio::sync::mpsc;

/// Forwards records into the bulk pipeline's input queue.
///
/// A full assembler queue suspends this sink's worker only; the dispatcher
/// keeps feeding the other sinks while this sink's own queue absorbs the
/// backlog.
pub struct BulkSink {
    name: String,
    tx: Option<mpsc::Sender<Record>>,
}

impl BulkSink {
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<Record>) -> Self {
        Self {
            name: name.into(),
            tx: Some(tx),
        }
    }
}

impl RecordSink for BulkSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, record: &Record) -> Result<(), ContractError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ContractError::sink_closed(&self.name))?;
        tx.send(record.clone())
            .await
            .map_err(|_| ContractError::sink_closed(&self.name))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    /// Dropping the sender lets the assembler see end of input.
    async fn close(&mut self) -> Result<(), ContractError> {
        self.tx.take();
        Ok(())
    }
}
