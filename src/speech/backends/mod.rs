//! External tool backends

// Piper speech synthesizer
pub mod piper;

// ffmpeg resampler and encoder
pub mod ffmpeg;
