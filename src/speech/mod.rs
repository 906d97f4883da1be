//! Speech synthesis and post-processing adapters

pub mod synth;
pub mod post;
pub mod voices;
pub mod backends;

pub use synth::{Synthesizer, SynthesisConfig, SynthesisRequest, rate_to_length_scale};
pub use post::{Encoder, ExportFormat, PitchShifter};
pub use voices::{list_voices, VoiceDescriptor};
