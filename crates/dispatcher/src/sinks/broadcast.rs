//! BroadcastSink - publishes to the live broker

use broker::{BrokerError, BrokerHandle};
use contracts::{ContractError, Record, RecordSink};

pub struct BroadcastSink {
    name: String,
    broker: BrokerHandle,
}

impl BroadcastSink {
    pub fn new(name: impl Into<String>, broker: BrokerHandle) -> Self {
        Self {
            name: name.into(),
            broker,
        }
    }
}

impl RecordSink for BroadcastSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, record: &Record) -> Result<(), ContractError> {
        self.broker.publish(record.clone()).map_err(|e| match e {
            BrokerError::Backlogged => ContractError::sink_write(&self.name, e.to_string()),
            BrokerError::Stopped => ContractError::sink_closed(&self.name),
        })
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    // The broker outlives the dispatcher and is stopped by its owner.
    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}
