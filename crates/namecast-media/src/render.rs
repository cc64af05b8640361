//! Render engine adapter.
//!
//! The composition layer is an opaque engine: it compiles a bundle of
//! composition definitions once, lists the composition ids in it, and renders
//! one composition with a flat set of input props into a local file.
//! [`BundleCache`] memoizes the compiled bundle for the process lifetime.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::command::tail_lines;
use crate::error::{MediaError, MediaResult};

/// Reference to a compiled bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleHandle {
    location: PathBuf,
}

impl BundleHandle {
    pub fn new(location: impl Into<PathBuf>) -> Self {
        Self {
            location: location.into(),
        }
    }

    /// Where the engine reads the bundle from.
    pub fn location(&self) -> &Path {
        &self.location
    }
}

/// Input parameters handed to the composition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputProps {
    pub name: String,
    pub photo_url: String,
    pub has_photo: bool,
    pub audio_src: String,
}

/// An engine that turns a composition plus props into a video file.
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Compile the composition definitions.
    async fn compile(&self) -> MediaResult<BundleHandle>;

    /// Composition ids available in `bundle`.
    async fn list_compositions(&self, bundle: &BundleHandle) -> MediaResult<Vec<String>>;

    /// Render `composition_id` with `props` into `output`.
    async fn render(
        &self,
        bundle: &BundleHandle,
        composition_id: &str,
        props: &InputProps,
        output: &Path,
    ) -> MediaResult<()>;
}

struct CompiledBundle {
    handle: BundleHandle,
    compositions: Vec<String>,
}

/// Memoized bundle compilation in front of a [`RenderEngine`].
///
/// Concurrent first callers share one compilation. A failed compilation is
/// not cached, so the next job tries again.
pub struct BundleCache {
    engine: Arc<dyn RenderEngine>,
    bundle: OnceCell<CompiledBundle>,
    compilations: AtomicUsize,
}

impl BundleCache {
    pub fn new(engine: Arc<dyn RenderEngine>) -> Self {
        Self {
            engine,
            bundle: OnceCell::new(),
            compilations: AtomicUsize::new(0),
        }
    }

    /// Compile on first call; return the cached handle afterwards.
    pub async fn compile_once(&self) -> MediaResult<BundleHandle> {
        Ok(self.compiled().await?.handle.clone())
    }

    /// Whether a bundle has been compiled.
    pub fn is_compiled(&self) -> bool {
        self.bundle.initialized()
    }

    /// Number of underlying compilation attempts.
    pub fn compilation_count(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }

    /// Render `composition_id`, failing with `CompositionNotFound` when the
    /// bundle does not contain it.
    pub async fn render(
        &self,
        composition_id: &str,
        props: &InputProps,
        output: &Path,
    ) -> MediaResult<()> {
        let compiled = self.compiled().await?;

        if !compiled.compositions.iter().any(|c| c == composition_id) {
            return Err(MediaError::CompositionNotFound {
                requested: composition_id.to_string(),
                available: compiled.compositions.clone(),
            });
        }

        self.engine
            .render(&compiled.handle, composition_id, props, output)
            .await?;

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(MediaError::render_failed(
                format!("engine produced no file at {}", output.display()),
                None,
            ));
        }
        Ok(())
    }

    async fn compiled(&self) -> MediaResult<&CompiledBundle> {
        self.bundle
            .get_or_try_init(|| async {
                self.compilations.fetch_add(1, Ordering::SeqCst);
                let handle = self.engine.compile().await?;
                let compositions = self.engine.list_compositions(&handle).await?;
                info!(
                    bundle = %handle.location().display(),
                    compositions = ?compositions,
                    "Render bundle compiled"
                );
                Ok::<_, MediaError>(CompiledBundle {
                    handle,
                    compositions,
                })
            })
            .await
    }
}

/// Configuration for the Remotion CLI.
#[derive(Debug, Clone)]
pub struct RemotionConfig {
    /// Program to launch (`npx` or a direct `remotion` binary)
    pub program: String,
    /// Composition entry point
    pub entry_point: PathBuf,
    /// Where the compiled bundle is written
    pub bundle_dir: PathBuf,
    /// Video codec
    pub codec: String,
    /// Audio codec
    pub audio_codec: String,
}

impl Default for RemotionConfig {
    fn default() -> Self {
        Self {
            program: "npx".to_string(),
            entry_point: PathBuf::from("remotion/index.ts"),
            bundle_dir: std::env::temp_dir().join("namecast-bundle"),
            codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
        }
    }
}

impl RemotionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            program: std::env::var("REMOTION_BIN").unwrap_or(defaults.program),
            entry_point: std::env::var("REMOTION_ENTRY")
                .map(PathBuf::from)
                .unwrap_or(defaults.entry_point),
            bundle_dir: std::env::var("REMOTION_BUNDLE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.bundle_dir),
            codec: std::env::var("REMOTION_CODEC").unwrap_or(defaults.codec),
            audio_codec: std::env::var("REMOTION_AUDIO_CODEC").unwrap_or(defaults.audio_codec),
        }
    }
}

/// [`RenderEngine`] driving the Remotion CLI as a subprocess.
#[derive(Debug, Clone)]
pub struct RemotionCli {
    config: RemotionConfig,
}

impl RemotionCli {
    pub fn new(config: RemotionConfig) -> Self {
        Self { config }
    }

    /// Leading arguments selecting the Remotion CLI.
    fn base_args(&self) -> Vec<String> {
        let program = Path::new(&self.config.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if program == "npx" {
            vec!["remotion".to_string()]
        } else {
            Vec::new()
        }
    }

    fn render_args(
        &self,
        bundle: &BundleHandle,
        composition_id: &str,
        props_file: &Path,
        output: &Path,
    ) -> Vec<String> {
        let mut args = self.base_args();
        args.extend([
            "render".to_string(),
            bundle.location().to_string_lossy().to_string(),
            composition_id.to_string(),
            output.to_string_lossy().to_string(),
            format!("--props={}", props_file.to_string_lossy()),
            format!("--codec={}", self.config.codec),
            format!("--audio-codec={}", self.config.audio_codec),
            "--log=error".to_string(),
        ]);
        args
    }

    /// Run the CLI, returning stdout on success.
    async fn run(&self, args: &[String]) -> Result<String, (String, Option<i32>)> {
        let program = which::which(&self.config.program)
            .map_err(|_| (format!("{} not found in PATH", self.config.program), None))?;

        debug!("Running: {} {}", self.config.program, args.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| (e.to_string(), None))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err((tail_lines(&stderr, 20), output.status.code()))
        }
    }
}

#[async_trait]
impl RenderEngine for RemotionCli {
    async fn compile(&self) -> MediaResult<BundleHandle> {
        let mut args = self.base_args();
        args.extend([
            "bundle".to_string(),
            self.config.entry_point.to_string_lossy().to_string(),
            format!("--out-dir={}", self.config.bundle_dir.to_string_lossy()),
        ]);

        self.run(&args)
            .await
            .map_err(|(msg, code)| MediaError::BundleFailed(exit_message(&msg, code)))?;

        Ok(BundleHandle::new(&self.config.bundle_dir))
    }

    async fn list_compositions(&self, bundle: &BundleHandle) -> MediaResult<Vec<String>> {
        let mut args = self.base_args();
        args.extend([
            "compositions".to_string(),
            bundle.location().to_string_lossy().to_string(),
            "--quiet".to_string(),
        ]);

        let stdout = self
            .run(&args)
            .await
            .map_err(|(msg, code)| MediaError::BundleFailed(exit_message(&msg, code)))?;

        Ok(parse_composition_ids(&stdout))
    }

    async fn render(
        &self,
        bundle: &BundleHandle,
        composition_id: &str,
        props: &InputProps,
        output: &Path,
    ) -> MediaResult<()> {
        let props_file = output.with_extension("props.json");
        tokio::fs::write(&props_file, serde_json::to_vec(props)?).await?;

        let args = self.render_args(bundle, composition_id, &props_file, output);
        let result = self.run(&args).await;
        let _ = tokio::fs::remove_file(&props_file).await;

        result.map_err(|(msg, code)| {
            MediaError::render_failed(exit_message("Remotion render failed", code), Some(msg))
        })?;
        Ok(())
    }
}

fn exit_message(msg: &str, code: Option<i32>) -> String {
    match code {
        Some(code) => format!("{msg} (exit code {code})"),
        None => msg.to_string(),
    }
}

/// Parse `remotion compositions --quiet` output.
fn parse_composition_ids(stdout: &str) -> Vec<String> {
    stdout.split_whitespace().map(str::to_string).collect()
}
