//! Chunked binary assembly for streamed WebSocket payloads. Chunks arrive
//! base64-encoded with 1-based sequence numbers and may be reordered; the
//! assembler only yields a payload when the `complete` frame's chunk count
//! matches the set of received sequence numbers exactly.

use std::collections::BTreeMap;

use base64::Engine;

use crate::domain::error::{AdtError, Result};

#[derive(Debug, Default)]
pub struct StreamAssembler {
    chunks: BTreeMap<u64, String>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        StreamAssembler::default()
    }

    pub fn insert(&mut self, seq: u64, data: String) {
        self.chunks.insert(seq, data);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Concatenate chunks 1..=total in sequence order, decoding each chunk's
    /// base64 independently. Any missing sequence number fails the stream.
    pub fn assemble(self, total_chunks: u64) -> Result<Vec<u8>> {
        let missing: Vec<u64> = (1..=total_chunks)
            .filter(|seq| !self.chunks.contains_key(seq))
            .collect();
        if !missing.is_empty() {
            return Err(AdtError::StreamIncomplete(format!(
                "received {} of {} chunks; missing seq {:?}",
                self.chunks.len(),
                total_chunks,
                missing
            )));
        }
        if self.chunks.len() as u64 != total_chunks {
            return Err(AdtError::StreamIncomplete(format!(
                "received {} chunks but server reported {}",
                self.chunks.len(),
                total_chunks
            )));
        }

        let mut payload = Vec::new();
        for (seq, data) in self.chunks {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data.as_bytes())
                .map_err(|err| {
                    AdtError::StreamIncomplete(format!("chunk {seq} is not valid base64: {err}"))
                })?;
            payload.extend_from_slice(&bytes);
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(data: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(data)
    }

    #[test]
    fn reordered_chunks_assemble_in_seq_order() {
        let mut assembler = StreamAssembler::new();
        assembler.insert(3, encode(b"CC"));
        assembler.insert(1, encode(b"AA"));
        assembler.insert(2, encode(b"BB"));
        assert_eq!(assembler.assemble(3).unwrap(), b"AABBCC");
    }

    #[test]
    fn missing_seq_fails() {
        let mut assembler = StreamAssembler::new();
        assembler.insert(1, encode(b"AA"));
        assembler.insert(3, encode(b"CC"));
        let err = assembler.assemble(3).unwrap_err();
        assert_eq!(err.code(), "stream-incomplete");
        assert!(err.to_string().contains("[2]"));
    }

    #[test]
    fn surplus_chunks_fail() {
        let mut assembler = StreamAssembler::new();
        assembler.insert(1, encode(b"AA"));
        assembler.insert(2, encode(b"BB"));
        let err = assembler.assemble(1).unwrap_err();
        assert_eq!(err.code(), "stream-incomplete");
    }

    #[test]
    fn invalid_base64_fails() {
        let mut assembler = StreamAssembler::new();
        assembler.insert(1, "!!not base64!!".into());
        assert_eq!(assembler.assemble(1).unwrap_err().code(), "stream-incomplete");
    }

    #[test]
    fn zero_chunks_is_an_empty_payload() {
        let assembler = StreamAssembler::new();
        assert!(assembler.assemble(0).unwrap().is_empty());
    }
}
