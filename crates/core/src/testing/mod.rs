//! Testing utilities.
//!
//! `ScriptedTranscoder` stands in for the conversion engine with small shell
//! scripts, so tests exercise real child processes (spawn, poll, terminate,
//! reap) without ffmpeg installed.

mod scripted_transcoder;

pub use scripted_transcoder::ScriptedTranscoder;
