//! # WAV Persistence
//!
//! Writes a connection's [`Recording`] as a mono 16-bit PCM WAV file.
//!
//! ## How the file is produced:
//! 1. Raw little-endian bytes are decoded into `i16` samples with `byteorder`
//! 2. The `wav` crate writes the RIFF header and sample data
//! 3. Output goes to a `.part` sibling first, then is renamed over the target,
//!    so a reader never observes a half-written file
//!
//! Concurrent connections share one output path; the last rename wins.

use crate::audio::stream::Recording;
use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PCM_FORMAT: u16 = 1;
const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Decode little-endian PCM16 bytes.
///
/// A trailing odd byte is zero-padded into one last sample, so every received
/// byte ends up in the data chunk.
pub fn pcm16_samples(pcm: &[u8]) -> Vec<i16> {
    let even = pcm.len() - pcm.len() % 2;
    let mut cursor = Cursor::new(&pcm[..even]);
    let mut samples = Vec::with_capacity(pcm.len() / 2 + 1);

    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(sample);
    }

    if let Some(&last) = pcm.get(even) {
        samples.push(i16::from_le_bytes([last, 0]));
    }

    samples
}

/// Write `pcm` as a mono 16-bit WAV stream.
pub fn write_pcm16_mono<W: Write + Seek>(writer: &mut W, pcm: &[u8], sample_rate: u32) -> Result<()> {
    let header = wav::Header::new(PCM_FORMAT, CHANNELS, sample_rate, BITS_PER_SAMPLE);
    let track = wav::BitDepth::Sixteen(pcm16_samples(pcm));

    wav::write(header, &track, writer).context("Failed to encode WAV data")?;
    Ok(())
}

/// Duration in seconds of `bytes` of mono PCM16 at `sample_rate`.
pub fn duration_secs(bytes: usize, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    (bytes / 2) as f64 / sample_rate as f64
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// Persist a recording at `path`, replacing any existing file.
pub fn save_recording(path: &Path, recording: &Recording) -> Result<()> {
    if recording.pcm.len() % 2 != 0 {
        warn!(
            bytes = recording.pcm.len(),
            "Recording has an odd byte count, padding the last sample with a zero byte"
        );
    }

    let staging = part_path(path);
    {
        let file = File::create(&staging)
            .with_context(|| format!("Failed to create {}", staging.display()))?;
        let mut writer = BufWriter::new(file);
        write_pcm16_mono(&mut writer, &recording.pcm, recording.sample_rate)?;
        writer.flush().context("Failed to flush WAV file")?;
    }

    fs::rename(&staging, path)
        .with_context(|| format!("Failed to move {} into place", staging.display()))?;

    info!(
        path = %path.display(),
        bytes = recording.pcm.len(),
        chunks = recording.chunk_count,
        sample_rate = recording.sample_rate,
        duration_secs = %format!("{:.2}", duration_secs(recording.pcm.len(), recording.sample_rate)),
        "Saved audio recording"
    );

    Ok(())
}
