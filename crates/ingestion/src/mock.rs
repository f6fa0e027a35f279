//! Mock record source
//!
//! Replays a fixed list of lines, for tests and dry runs without a real file.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, RecordSource};

/// In-memory source that yields preset lines, then ends.
pub struct MockRecordSource {
    name: String,
    lines: VecDeque<Bytes>,
    interval: Option<Duration>,
    fail_after: Option<usize>,
    yielded: usize,
}

impl MockRecordSource {
    pub fn new<I, L>(name: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Bytes>,
    {
        Self {
            name: name.into(),
            lines: lines.into_iter().map(Into::into).collect(),
            interval: None,
            fail_after: None,
            yielded: 0,
        }
    }

    /// `count` lines of the form `<prefix> <n>`
    pub fn numbered(name: impl Into<String>, prefix: &str, count: usize) -> Self {
        Self::new(name, (0..count).map(|n| format!("{prefix} {n}")))
    }

    /// Sleep between lines
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Report a read error after `n` lines instead of ending
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }
}

impl RecordSource for MockRecordSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_line(&mut self) -> Result<Option<Bytes>, ContractError> {
        if self.fail_after == Some(self.yielded) {
            return Err(ContractError::source_read(&self.name, "simulated read failure"));
        }
        if let Some(interval) = self.interval {
            tokio::time::sleep(interval).await;
        }
        let line = self.lines.pop_front();
        if line.is_some() {
            self.yielded += 1;
        }
        Ok(line)
    }
}
