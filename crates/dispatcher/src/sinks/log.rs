//! LogSink - echoes records through tracing

use contracts::{ContractError, Record, RecordSink};
use tracing::{debug, info};

pub struct LogSink {
    name: String,
    seen: u64,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            seen: 0,
        }
    }
}

impl RecordSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, record: &Record) -> Result<(), ContractError> {
        self.seen += 1;
        debug!(
            sink = %self.name,
            source = %record.source,
            id = %record.id,
            bytes = record.len(),
            payload = %String::from_utf8_lossy(&record.payload),
            "record"
        );
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, records = self.seen, "log sink closed");
        Ok(())
    }
}
