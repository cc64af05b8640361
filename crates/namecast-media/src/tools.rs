//! Audio conversion and segment concatenation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// External codec operations used by the render pipeline.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Re-encode `input` into the format implied by `output`'s extension.
    async fn convert_audio(&self, input: &Path, output: &Path) -> MediaResult<()>;

    /// Join `segments` in order into `output`.
    async fn concat_segments(&self, segments: &[PathBuf], output: &Path) -> MediaResult<()>;
}

/// FFmpeg-backed [`MediaTools`].
#[derive(Debug, Clone, Default)]
pub struct FfmpegTools {
    runner: FfmpegRunner,
}

impl FfmpegTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill FFmpeg invocations that run longer than `secs`.
    pub fn with_timeout(secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(secs),
        }
    }
}

#[async_trait]
impl MediaTools for FfmpegTools {
    async fn convert_audio(&self, input: &Path, output: &Path) -> MediaResult<()> {
        let cmd = conversion_command(input, output)?;
        self.runner.run(&cmd).await?;
        debug!(output = %output.display(), "Audio converted");
        Ok(())
    }

    async fn concat_segments(&self, segments: &[PathBuf], output: &Path) -> MediaResult<()> {
        if segments.is_empty() {
            return Err(MediaError::InvalidInput("no segments to concatenate".into()));
        }
        // The concat demuxer resolves relative entries against the list
        // file's directory, not the working directory.
        let segments = absolute_segments(segments)?;
        for segment in &segments {
            if !tokio::fs::try_exists(segment).await.unwrap_or(false) {
                return Err(MediaError::FileNotFound(segment.clone()));
            }
        }

        let list_path = output.with_extension("concat.txt");
        tokio::fs::write(&list_path, concat_list(&segments)).await?;

        let cmd = FfmpegCommand::new(&list_path, output)
            .concat_demuxer()
            .stream_copy();
        let result = self.runner.run(&cmd).await;

        let _ = tokio::fs::remove_file(&list_path).await;
        result?;

        info!(segments = segments.len(), output = %output.display(), "Segments concatenated");
        Ok(())
    }
}

/// Build the FFmpeg invocation for an audio conversion.
pub fn conversion_command(input: &Path, output: &Path) -> MediaResult<FfmpegCommand> {
    let ext = output
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| MediaError::InvalidInput(format!("no extension on {}", output.display())))?;

    let cmd = FfmpegCommand::new(input, output).no_video();
    let cmd = match ext.as_str() {
        "wav" => cmd.audio_codec("pcm_s16le").sample_rate(44_100),
        "mp3" => cmd.audio_codec("libmp3lame").audio_bitrate("192k"),
        "aac" | "m4a" => cmd.audio_codec("aac").audio_bitrate("192k"),
        "ogg" | "opus" => cmd.audio_codec("libopus").audio_bitrate("128k"),
        "flac" => cmd.audio_codec("flac"),
        other => {
            return Err(MediaError::InvalidInput(format!(
                "unsupported audio format: {other}"
            )))
        }
    };
    Ok(cmd)
}

/// Resolve relative segment paths against the current working directory.
fn absolute_segments(segments: &[PathBuf]) -> MediaResult<Vec<PathBuf>> {
    segments
        .iter()
        .map(|p| std::path::absolute(p).map_err(MediaError::from))
        .collect()
}

/// Concat demuxer list; single quotes in paths are escaped for FFmpeg.
fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', r"'\''")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_codec_from_extension() {
        let args = conversion_command(Path::new("a.mp3"), Path::new("a.wav"))
            .unwrap()
            .build_args();
        assert!(args.contains(&"pcm_s16le".to_string()));

        let args = conversion_command(Path::new("a.mp3"), Path::new("a.M4A"))
            .unwrap()
            .build_args();
        assert!(args.contains(&"aac".to_string()));
    }

    #[test]
    fn test_conversion_rejects_unknown_format() {
        assert!(conversion_command(Path::new("a.mp3"), Path::new("a.xyz")).is_err());
        assert!(conversion_command(Path::new("a.mp3"), Path::new("noext")).is_err());
    }

    #[test]
    fn test_concat_list_order_and_quoting() {
        let list = concat_list(&[
            PathBuf::from("/seg/intro.mp4"),
            PathBuf::from("/tmp/it's.mp4"),
            PathBuf::from("/seg/outro.mp4"),
        ]);
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines[0], "file '/seg/intro.mp4'");
        assert_eq!(lines[1], r"file '/tmp/it'\''s.mp4'");
        assert_eq!(lines[2], "file '/seg/outro.mp4'");
    }

    #[test]
    fn test_relative_segments_listed_as_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let segments = absolute_segments(&[
            PathBuf::from("assets/intro.mp4"),
            PathBuf::from("/seg/outro.mp4"),
        ])
        .unwrap();

        let list = concat_list(&segments);
        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(
            lines[0],
            format!("file '{}'", cwd.join("assets/intro.mp4").display())
        );
        assert_eq!(lines[1], "file '/seg/outro.mp4'");
    }

    #[tokio::test]
    async fn test_concat_missing_segment() {
        let dir = tempfile::tempdir().unwrap();
        let tools = FfmpegTools::new();
        let err = tools
            .concat_segments(&[dir.path().join("missing.mp4")], &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_concat_real_segments() {
        let dir = tempfile::tempdir().unwrap();
        let mut segments = Vec::new();
        for i in 0..2 {
            let path = dir.path().join(format!("seg{i}.mp4"));
            let status = tokio::process::Command::new("ffmpeg")
                .args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=d=1:s=64x64", "-f", "lavfi", "-i", "sine=d=1", "-shortest"])
                .arg(&path)
                .status()
                .await
                .unwrap();
            assert!(status.success());
            segments.push(path);
        }

        let output = dir.path().join("joined.mp4");
        FfmpegTools::new().concat_segments(&segments, &output).await.unwrap();
        assert!(output.exists());
        assert!(!output.with_extension("concat.txt").exists());
    }
}
