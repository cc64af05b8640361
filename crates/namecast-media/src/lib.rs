//! Media tooling for the render pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a timeout-aware runner
//! - Audio conversion and segment concatenation behind [`MediaTools`]
//! - The Remotion render engine behind [`RenderEngine`], with a memoized
//!   bundle in [`BundleCache`]
//! - Cross-device file moves

pub mod command;
pub mod error;
pub mod fs_utils;
pub mod render;
pub mod tools;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::move_file;
pub use render::{BundleCache, BundleHandle, InputProps, RemotionCli, RemotionConfig, RenderEngine};
pub use tools::{FfmpegTools, MediaTools};
