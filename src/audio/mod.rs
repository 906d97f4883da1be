//! PCM audio utilities

pub mod pcm;

pub use pcm::{apply_gain, read_pcm_file, write_pcm_file, Gain, PcmBuffer, WavHeader};
