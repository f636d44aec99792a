//! Byte-stream sources.
//!
//! A `ByteSource` hands out bytes in order, either freshly generated from a
//! seeded `ChaCha8Rng` or replayed from a fixed buffer. Running off the end of
//! a replay buffer is an overrun, never a panic.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{DrawError, DrawResult};

#[derive(Debug, Clone)]
pub enum ByteSource {
    /// Fresh bytes from a seeded generator. Never runs out on its own; the
    /// owning `ConjectureData` enforces `max_length`.
    Random(ChaCha8Rng),

    /// Bytes replayed from a previously recorded (or mutated) buffer.
    Replay { buffer: Vec<u8>, position: usize },
}

impl ByteSource {
    pub fn random(seed: u64) -> ByteSource {
        ByteSource::Random(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_rng(rng: ChaCha8Rng) -> ByteSource {
        ByteSource::Random(rng)
    }

    pub fn replay<B: Into<Vec<u8>>>(buffer: B) -> ByteSource {
        ByteSource::Replay {
            buffer: buffer.into(),
            position: 0,
        }
    }

    pub fn is_replay(&self) -> bool {
        matches!(self, ByteSource::Replay { .. })
    }

    /// Bytes left before a replay overruns; `None` for random sources.
    pub fn remaining(&self) -> Option<usize> {
        match self {
            ByteSource::Random(_) => None,
            ByteSource::Replay { buffer, position } => Some(buffer.len() - *position),
        }
    }

    /// Fill `out` with the next `out.len()` bytes.
    ///
    /// On overrun nothing is consumed, so a replay that overruns stays at the
    /// position of the failed read.
    pub fn fill(&mut self, out: &mut [u8]) -> DrawResult<()> {
        match self {
            ByteSource::Random(rng) => {
                rng.fill_bytes(out);
                Ok(())
            }
            ByteSource::Replay { buffer, position } => {
                let end = *position + out.len();
                if end > buffer.len() {
                    return Err(DrawError::Overrun);
                }
                out.copy_from_slice(&buffer[*position..end]);
                *position = end;
                Ok(())
            }
        }
    }

    /// Return the next `n` bytes.
    pub fn next(&mut self, n: usize) -> DrawResult<Vec<u8>> {
        let mut out = vec![0; n];
        self.fill(&mut out)?;
        Ok(out)
    }
}
