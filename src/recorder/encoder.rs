//! Incremental PCM encoder.
//!
//! Converts mono `f32` frames to 16-bit little-endian PCM and cuts the stream
//! into chunks of a fixed duration. The finished clip is a WAV container
//! built from the concatenated chunks.

use anyhow::{anyhow, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::Cursor;
use std::time::Duration;

/// Mime type of assembled clips.
pub const MIME_TYPE: &str = "audio/wav";

/// Chunking encoder for one recording session.
pub struct ChunkEncoder {
    sample_rate: u32,
    /// Samples per chunk; `None` buffers everything until `finish`
    chunk_samples: Option<usize>,
    pending: Vec<i16>,
}

impl ChunkEncoder {
    /// Creates an encoder emitting one chunk per `timeslice` of audio.
    ///
    /// A zero timeslice produces a single chunk when the encoder finishes.
    pub fn new(sample_rate: u32, timeslice: Duration) -> Self {
        let samples = (sample_rate as u128 * timeslice.as_millis() / 1000) as usize;
        Self {
            sample_rate,
            chunk_samples: (samples > 0).then_some(samples),
            pending: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Encodes frames, returning every chunk completed by them.
    pub fn encode(&mut self, frames: &[f32]) -> Vec<Vec<u8>> {
        self.pending.extend(frames.iter().map(|&s| to_pcm16(s)));

        let Some(chunk_samples) = self.chunk_samples else {
            return Vec::new();
        };

        let mut chunks = Vec::new();
        while self.pending.len() >= chunk_samples {
            let rest = self.pending.split_off(chunk_samples);
            chunks.push(pcm_bytes(&self.pending));
            self.pending = rest;
        }
        chunks
    }

    /// Flushes whatever has not yet been emitted as a chunk.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            return None;
        }
        let chunk = pcm_bytes(&self.pending);
        self.pending.clear();
        Some(chunk)
    }

    /// Builds a WAV clip from chunks produced by this encoder.
    ///
    /// # Errors
    /// - If a chunk has an odd byte length
    /// - If the WAV writer fails
    pub fn assemble(&self, chunks: &[Vec<u8>]) -> Result<Vec<u8>> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for (index, chunk) in chunks.iter().enumerate() {
                if chunk.len() % 2 != 0 {
                    return Err(anyhow!(
                        "chunk {index} is not 16-bit aligned ({} bytes)",
                        chunk.len()
                    ));
                }
                for pair in chunk.chunks_exact(2) {
                    writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
                }
            }
            writer.finalize()?;
        }

        let bytes = cursor.into_inner();
        tracing::debug!(
            "Assembled clip: {} chunks, {} bytes at {}Hz",
            chunks.len(),
            bytes.len(),
            self.sample_rate
        );
        Ok(bytes)
    }
}

fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}
