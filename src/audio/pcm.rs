//! Linear PCM buffers and WAV container I/O
//!
//! Samples are held as host-order `i32` regardless of sample width. hound
//! decodes the little-endian container bytes on read; writing emits the
//! RIFF chunks directly with the same `fmt ` layout the source used, so a
//! read followed by a write reproduces a canonical file byte for byte.

use crate::{Result, StudioError};
use hound::{SampleFormat, WavReader};
use log::debug;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Lower bound of a signed 16-bit sample
pub const I16_MIN: i32 = i16::MIN as i32;
/// Upper bound of a signed 16-bit sample
pub const I16_MAX: i32 = i16::MAX as i32;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// KSDATAFORMAT_SUBTYPE_PCM
const PCM_SUBFORMAT: [u8; 16] = [
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0xAA, 0x00, 0x38, 0x9B, 0x71,
];

/// Layout of the `fmt ` chunk a buffer was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavHeader {
    /// Plain 16-byte WAVE_FORMAT_PCM
    Pcm,
    /// WAVE_FORMAT_EXTENSIBLE with an integer PCM subformat
    Extensible { valid_bits: u16, channel_mask: u32 },
}

/// Uncompressed interleaved PCM audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmBuffer {
    /// Number of interleaved channels
    pub channels: u16,
    /// Bytes per sample (2 for 16-bit)
    pub sample_width: u16,
    /// Frames per second
    pub frame_rate: u32,
    /// Container header to reproduce on write
    pub header: WavHeader,
    /// Interleaved samples; length is always a multiple of `channels`
    samples: Vec<i32>,
}

impl PcmBuffer {
    /// Build a buffer, rejecting sample counts that split a frame
    pub fn new(channels: u16, sample_width: u16, frame_rate: u32, samples: Vec<i32>) -> Result<Self> {
        if channels == 0 {
            return Err(StudioError::Other("PCM buffer needs at least one channel".into()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(StudioError::Other(format!(
                "{} samples do not fill whole frames of {} channels",
                samples.len(),
                channels
            )));
        }
        Ok(Self {
            channels,
            sample_width,
            frame_rate,
            header: WavHeader::Pcm,
            samples,
        })
    }

    pub fn with_header(mut self, header: WavHeader) -> Self {
        self.header = header;
        self
    }

    pub fn samples(&self) -> &[i32] {
        &self.samples
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_16_bit(&self) -> bool {
        self.sample_width == 2
    }
}

/// Result of a gain transform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gain {
    /// Factor was exactly 1.0; the input is already the answer
    Identity,
    /// A new buffer with the gain applied
    Applied(PcmBuffer),
    /// Sample width (in bytes) the transform does not handle; input left untouched
    Unsupported(u16),
}

/// Scale every sample by `factor`, saturating at the 16-bit range
///
/// Only 16-bit buffers are transformed. Anything else is reported as
/// `Gain::Unsupported` so the caller can pass the audio through unchanged.
pub fn apply_gain(buffer: &PcmBuffer, factor: f32) -> Gain {
    if !buffer.is_16_bit() {
        return Gain::Unsupported(buffer.sample_width);
    }
    if factor == 1.0 {
        return Gain::Identity;
    }

    let factor = f64::from(factor);
    let samples = buffer
        .samples
        .iter()
        .map(|&s| (f64::from(s) * factor).round().clamp(I16_MIN as f64, I16_MAX as f64) as i32)
        .collect();

    Gain::Applied(PcmBuffer {
        channels: buffer.channels,
        sample_width: buffer.sample_width,
        frame_rate: buffer.frame_rate,
        header: buffer.header,
        samples,
    })
}

/// Read an integer PCM WAV file
pub fn read_pcm_file(path: &Path) -> Result<PcmBuffer> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_format != SampleFormat::Int {
        return Err(StudioError::UnsupportedSampleFormat(spec.bits_per_sample / 8));
    }

    let samples = reader
        .into_samples::<i32>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let (header, width) = read_fmt_layout(path)?;
    debug!(
        "Read {}: {} ch, {} bit, {} Hz, {} samples, {:?}",
        path.display(),
        spec.channels,
        spec.bits_per_sample,
        spec.sample_rate,
        samples.len(),
        header
    );

    Ok(PcmBuffer::new(spec.channels, width, spec.sample_rate, samples)?.with_header(header))
}

/// Find the `fmt ` chunk and report its layout and per-sample container width
fn read_fmt_layout(path: &Path) -> Result<(WavHeader, u16)> {
    let mut file = BufReader::new(File::open(path)?);
    let mut riff = [0u8; 12];
    file.read_exact(&mut riff)?;
    if &riff[0..4] != b"RIFF" || &riff[8..12] != b"WAVE" {
        return Err(StudioError::Other(format!("{} is not a WAVE file", path.display())));
    }

    loop {
        let mut chunk = [0u8; 8];
        file.read_exact(&mut chunk)?;
        let size = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);
        if &chunk[0..4] != b"fmt " {
            // Chunks are padded to an even length
            file.seek(SeekFrom::Current(i64::from(size) + i64::from(size & 1)))?;
            continue;
        }

        let mut fmt = vec![0u8; size as usize];
        file.read_exact(&mut fmt)?;
        if fmt.len() < 16 {
            return Err(StudioError::Other(format!("{}: short fmt chunk", path.display())));
        }
        let tag = u16::from_le_bytes([fmt[0], fmt[1]]);
        let channels = u16::from_le_bytes([fmt[2], fmt[3]]).max(1);
        let block_align = u16::from_le_bytes([fmt[12], fmt[13]]);
        let header = if tag == WAVE_FORMAT_EXTENSIBLE && fmt.len() >= 24 {
            WavHeader::Extensible {
                valid_bits: u16::from_le_bytes([fmt[18], fmt[19]]),
                channel_mask: u32::from_le_bytes([fmt[20], fmt[21], fmt[22], fmt[23]]),
            }
        } else {
            WavHeader::Pcm
        };
        return Ok((header, block_align / channels));
    }
}

/// Little-endian bytes of one sample at the given width
fn encode_sample(sample: i32, width: u16, out: &mut Vec<u8>) -> Result<()> {
    match width {
        // 8-bit WAV samples are unsigned
        1 => out.push((sample + 128) as u8),
        2 => out.extend_from_slice(&(sample as i16).to_le_bytes()),
        3 => out.extend_from_slice(&sample.to_le_bytes()[..3]),
        4 => out.extend_from_slice(&sample.to_le_bytes()),
        other => return Err(StudioError::UnsupportedSampleFormat(other)),
    }
    Ok(())
}

/// Write a buffer as an integer PCM WAV file
pub fn write_pcm_file(path: &Path, buffer: &PcmBuffer) -> Result<()> {
    let width = buffer.sample_width;
    let block_align = buffer.channels * width;
    let byte_rate = buffer.frame_rate * u32::from(block_align);

    let mut data = Vec::with_capacity(buffer.samples.len() * width as usize);
    for &s in &buffer.samples {
        encode_sample(s, width, &mut data)?;
    }

    let mut fmt = Vec::with_capacity(40);
    let tag = match buffer.header {
        WavHeader::Pcm => WAVE_FORMAT_PCM,
        WavHeader::Extensible { .. } => WAVE_FORMAT_EXTENSIBLE,
    };
    fmt.extend_from_slice(&tag.to_le_bytes());
    fmt.extend_from_slice(&buffer.channels.to_le_bytes());
    fmt.extend_from_slice(&buffer.frame_rate.to_le_bytes());
    fmt.extend_from_slice(&byte_rate.to_le_bytes());
    fmt.extend_from_slice(&block_align.to_le_bytes());
    fmt.extend_from_slice(&(width * 8).to_le_bytes());
    if let WavHeader::Extensible {
        valid_bits,
        channel_mask,
    } = buffer.header
    {
        fmt.extend_from_slice(&22u16.to_le_bytes());
        fmt.extend_from_slice(&valid_bits.to_le_bytes());
        fmt.extend_from_slice(&channel_mask.to_le_bytes());
        fmt.extend_from_slice(&PCM_SUBFORMAT);
    }

    let data_len = u32::try_from(data.len())
        .map_err(|_| StudioError::Other("Audio too long for a WAV file".to_string()))?;
    let pad = data_len & 1;
    let riff_len = 4 + (8 + fmt.len() as u32) + (8 + data_len + pad);

    let mut out = BufWriter::new(File::create(path)?);
    out.write_all(b"RIFF")?;
    out.write_all(&riff_len.to_le_bytes())?;
    out.write_all(b"WAVE")?;
    out.write_all(b"fmt ")?;
    out.write_all(&(fmt.len() as u32).to_le_bytes())?;
    out.write_all(&fmt)?;
    out.write_all(b"data")?;
    out.write_all(&data_len.to_le_bytes())?;
    out.write_all(&data)?;
    if pad == 1 {
        out.write_all(&[0])?;
    }
    out.flush()?;

    debug!("Wrote {} frames to {}", buffer.frames(), path.display());
    Ok(())
}

/// Native frame rate of a WAV file without decoding its samples
pub fn frame_rate_of(path: &Path) -> Result<u32> {
    Ok(WavReader::open(path)?.spec().sample_rate)
}
