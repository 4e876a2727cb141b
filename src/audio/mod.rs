//! Recorded audio input for the acoustic diarizer

pub mod file;

pub use file::AudioFile;
