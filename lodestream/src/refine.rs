use bytes::Bytes;

use crate::error::DecodeError;

/// One decoded refinement operation. The payload encoding belongs to the
/// rendering collaborator; the scheduler only counts and forwards ops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementOp(pub Bytes);

/// Parse state carried from one refinement chunk to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkCarry {
    /// Bytes at the tail of the previous chunk that did not form a whole
    /// operation yet.
    pub leftover: Bytes,
    /// Operations decoded so far across the whole stream.
    pub ops_read: u64,
    /// Total operation count, once the stream header revealed it.
    pub ops_total: Option<u64>,
}

/// Result of decoding one chunk's worth of data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChunk {
    pub ops: Vec<RefinementOp>,
    pub carry: ChunkCarry,
}

/// Incremental decoder for the refinement stream's binary format.
///
/// `data` is the previous carry's leftover followed by the freshly fetched
/// chunk. Calls run on the execution backend's workers.
pub trait RefinementDecoder: Send + Sync {
    fn decode(&self, data: Bytes, carry: &ChunkCarry) -> Result<DecodedChunk, DecodeError>;
}

/// Decoder treating the stream as fixed-width records, for demos and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedWidthDecoder {
    pub op_size: usize,
}

impl RefinementDecoder for FixedWidthDecoder {
    fn decode(&self, data: Bytes, carry: &ChunkCarry) -> Result<DecodedChunk, DecodeError> {
        if self.op_size == 0 {
            return Err(DecodeError("op size must be non-zero".into()));
        }
        let whole = data.len() / self.op_size * self.op_size;
        let ops: Vec<RefinementOp> = (0..whole)
            .step_by(self.op_size)
            .map(|start| RefinementOp(data.slice(start..start + self.op_size)))
            .collect();
        Ok(DecodedChunk {
            carry: ChunkCarry {
                leftover: data.slice(whole..),
                ops_read: carry.ops_read + ops.len() as u64,
                ops_total: carry.ops_total,
            },
            ops,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_decoder_carries_partial_op() {
        let decoder = FixedWidthDecoder { op_size: 4 };
        let carry = ChunkCarry::default();

        let first = decoder
            .decode(Bytes::from_static(b"aaaabbbbcc"), &carry)
            .unwrap();
        assert_eq!(first.ops.len(), 2);
        assert_eq!(first.carry.leftover, "cc");
        assert_eq!(first.carry.ops_read, 2);

        // Prepending the leftover completes the interrupted op.
        let second = decoder
            .decode(Bytes::from_static(b"ccdddd"), &first.carry)
            .unwrap();
        assert_eq!(second.ops.len(), 1);
        assert_eq!(second.ops[0].0, "ccdd");
        assert_eq!(second.carry.leftover, "dd");
        assert_eq!(second.carry.ops_read, 3);
    }
}
