//! Batch buffer
//!
//! A growing byte buffer of bulk frames plus the offset where each frame
//! ends, so a batch can be cut into datagrams at record boundaries.
//! Two of these exist per pipeline; they alternate between the assembler
//! and the committer and are cleared, never reallocated, between uses.

use contracts::Record;
use tokio::time::Instant;

use crate::error::BulkError;
use crate::framing;

#[derive(Debug)]
pub struct Batch {
    slot: usize,
    buf: Vec<u8>,
    ends: Vec<usize>,
    started_at: Option<Instant>,
}

impl Batch {
    pub fn with_capacity(slot: usize, capacity: usize) -> Self {
        Self {
            slot,
            buf: Vec::with_capacity(capacity),
            ends: Vec::new(),
            started_at: None,
        }
    }

    /// Which of the pipeline's buffers this is
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn record_count(&self) -> usize {
        self.ends.len()
    }

    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Arrival time of the first record since the last clear
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append one framed record; returns the frame size.
    ///
    /// # Errors
    /// `FrameTooLarge` if the frame alone exceeds `max_frame`, or a framing
    /// error. The batch is unchanged on error.
    pub fn append(&mut self, record: &Record, now: Instant, max_frame: usize) -> Result<usize, BulkError> {
        let start = self.buf.len();
        framing::write_frame(&mut self.buf, record)?;

        let len = self.buf.len() - start;
        if len > max_frame {
            self.buf.truncate(start);
            return Err(BulkError::FrameTooLarge { len, max: max_frame });
        }

        self.ends.push(self.buf.len());
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        Ok(len)
    }

    /// Empty the batch, keeping its allocation.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.ends.clear();
        self.started_at = None;
    }

    /// Split into datagrams of at most `max` bytes, cutting only between frames.
    pub fn datagrams(&self, max: usize) -> Datagrams<'_> {
        Datagrams {
            buf: &self.buf,
            ends: &self.ends,
            start: 0,
            idx: 0,
            max,
        }
    }
}

/// Iterator over datagram-sized runs of whole frames
pub struct Datagrams<'a> {
    buf: &'a [u8],
    ends: &'a [usize],
    start: usize,
    idx: usize,
    max: usize,
}

impl<'a> Iterator for Datagrams<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.ends.len() {
            return None;
        }

        let start = self.start;
        // A run always holds at least one frame.
        let mut end = self.ends[self.idx];
        self.idx += 1;
        while self.idx < self.ends.len() && self.ends[self.idx] - start <= self.max {
            end = self.ends[self.idx];
            self.idx += 1;
        }

        self.start = end;
        Some(&self.buf[start..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(payload: String) -> Record {
        Record::new("t", "h", payload)
    }

    #[test]
    fn test_append_tracks_count_and_start() {
        let mut batch = Batch::with_capacity(0, 1024);
        let t0 = Instant::now();

        let len = batch.append(&record("a".repeat(10)), t0, 65_000).unwrap();
        assert_eq!(batch.byte_len(), len);
        batch
            .append(&record("b".repeat(10)), t0 + std::time::Duration::from_secs(1), 65_000)
            .unwrap();

        assert_eq!(batch.record_count(), 2);
        assert_eq!(batch.started_at(), Some(t0));
    }

    #[test]
    fn test_oversized_frame_leaves_batch_untouched() {
        let mut batch = Batch::with_capacity(0, 1024);
        batch.append(&record("ok".to_string()), Instant::now(), 200).unwrap();
        let before = batch.byte_len();

        let err = batch
            .append(&record("x".repeat(500)), Instant::now(), 200)
            .unwrap_err();
        assert!(matches!(err, BulkError::FrameTooLarge { max: 200, .. }));
        assert_eq!(batch.byte_len(), before);
        assert_eq!(batch.record_count(), 1);
    }

    #[test]
    fn test_clear_keeps_allocation() {
        let mut batch = Batch::with_capacity(1, 4096);
        batch.append(&record("x".repeat(100)), Instant::now(), 65_000).unwrap();
        let capacity = batch.capacity();

        batch.clear();
        assert!(batch.is_empty());
        assert_eq!(batch.byte_len(), 0);
        assert_eq!(batch.started_at(), None);
        assert_eq!(batch.capacity(), capacity);
        assert_eq!(batch.slot(), 1);
    }

    #[test]
    fn test_datagrams_cut_on_frame_boundaries() {
        let mut batch = Batch::with_capacity(0, 4096);
        let mut frame_lens = Vec::new();
        for n in 0..5 {
            let len = batch
                .append(&record(format!("{{\"n\":{n}}}")), Instant::now(), 65_000)
                .unwrap();
            frame_lens.push(len);
        }
        let frame = frame_lens[0];

        // Room for two frames per datagram
        let parts: Vec<&[u8]> = batch.datagrams(frame * 2 + 1).collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), frame * 2);
        assert_eq!(parts[2].len(), frame);
        for part in &parts {
            assert!(part.ends_with(b"\n"));
            assert_eq!(part.iter().filter(|b| **b == b'\n').count() % 2, 0);
        }
        assert_eq!(parts.concat(), batch.as_bytes());
    }

    #[test]
    fn test_single_datagram_when_under_limit() {
        let mut batch = Batch::with_capacity(0, 4096);
        for n in 0..3 {
            batch.append(&record(format!("{n}")), Instant::now(), 65_000).unwrap();
        }
        let parts: Vec<&[u8]> = batch.datagrams(65_000).collect();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0], batch.as_bytes());
        assert_eq!(Batch::with_capacity(0, 0).datagrams(100).count(), 0);
    }
}
