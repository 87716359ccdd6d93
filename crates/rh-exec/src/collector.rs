//! Stream-tagged output buffering

use bytes::Bytes;

use rh_core::{HarnessError, OutputChunk, StreamKind, Transcript};

/// Buffers output chunks for one command until it finishes
///
/// Chunks are kept in arrival order. Within a stream, sequences must be
/// strictly increasing; nothing is ever dropped or capped.
#[derive(Debug, Default)]
pub struct OutputCollector {
    chunks: Vec<OutputChunk>,
    next_stdout: u64,
    next_stderr: u64,
    finalized: bool,
}

impl OutputCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a chunk produced elsewhere.
    ///
    /// Rejected after [`finalize`](Self::finalize), or when its sequence does
    /// not advance its stream.
    pub fn append(&mut self, chunk: OutputChunk) -> Result<(), HarnessError> {
        if self.finalized {
            return Err(HarnessError::invalid_state(
                "output chunk arrived after transcript was finalized",
            ));
        }

        let next = self.next_sequence(chunk.stream);
        if chunk.sequence < *next {
            return Err(HarnessError::invalid_state(format!(
                "{:?} chunk sequence {} is behind {}",
                chunk.stream, chunk.sequence, *next
            )));
        }
        *next = chunk.sequence + 1;
        self.chunks.push(chunk);
        Ok(())
    }

    /// Record freshly received bytes, assigning the next sequence for the stream
    pub fn record(&mut self, stream: StreamKind, bytes: Bytes) -> Result<(), HarnessError> {
        let sequence = *self.next_sequence(stream);
        self.append(OutputChunk {
            stream,
            bytes,
            sequence,
        })
    }

    /// Hand out the transcript. Callable once.
    pub fn finalize(&mut self) -> Result<Transcript, HarnessError> {
        if self.finalized {
            return Err(HarnessError::invalid_state("transcript already finalized"));
        }
        self.finalized = true;
        Ok(Transcript::from_chunks(std::mem::take(&mut self.chunks)))
    }

    /// Number of chunks buffered so far
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn next_sequence(&mut self, stream: StreamKind) -> &mut u64 {
        match stream {
            StreamKind::Stdout => &mut self.next_stdout,
            StreamKind::Stderr => &mut self.next_stderr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rh_core::ErrorKind;

    #[test]
    fn test_record_assigns_per_stream_sequences() {
        let mut collector = OutputCollector::new();
        collector.record(StreamKind::Stdout, Bytes::from_static(b"a")).unwrap();
        collector.record(StreamKind::Stderr, Bytes::from_static(b"x")).unwrap();
        collector.record(StreamKind::Stdout, Bytes::from_static(b"b")).unwrap();

        let transcript = collector.finalize().unwrap();
        let seqs: Vec<_> = transcript
            .chunks()
            .iter()
            .map(|c| (c.stream, c.sequence))
            .collect();
        assert_eq!(
            seqs,
            vec![
                (StreamKind::Stdout, 0),
                (StreamKind::Stderr, 0),
                (StreamKind::Stdout, 1)
            ]
        );
        assert_eq!(transcript.stdout_lossy(), "ab");
    }

    #[test]
    fn test_append_after_finalize_is_rejected() {
        let mut collector = OutputCollector::new();
        collector.record(StreamKind::Stdout, Bytes::from_static(b"done")).unwrap();
        collector.finalize().unwrap();

        let err = collector
            .record(StreamKind::Stderr, Bytes::from_static(b"late"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_finalize_twice_is_rejected() {
        let mut collector = OutputCollector::new();
        assert!(collector.finalize().unwrap().is_empty());
        assert_eq!(collector.finalize().unwrap_err().kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_append_rejects_sequence_going_back() {
        let mut collector = OutputCollector::new();
        let chunk = |sequence| OutputChunk {
            stream: StreamKind::Stdout,
            bytes: Bytes::from_static(b"."),
            sequence,
        };
        collector.append(chunk(3)).unwrap();
        assert!(collector.append(chunk(2)).is_err());
        assert!(collector.append(chunk(4)).is_ok());
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn test_large_output_is_kept_whole() {
        let mut collector = OutputCollector::new();
        for _ in 0..10_000 {
            collector
                .record(StreamKind::Stdout, Bytes::from_static(b"0123456789"))
                .unwrap();
        }
        let transcript = collector.finalize().unwrap();
        assert_eq!(transcript.bytes(StreamKind::Stdout).len(), 100_000);
    }
}
