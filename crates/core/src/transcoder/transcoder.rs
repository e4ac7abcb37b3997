//! The transcoder: adapter and preset registries plus the request pipeline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::output::{self, OutputClaim};
use super::types::{FailureMode, FileMode, PresetRef, TranscodeInput, TranscodeOptions};
use crate::adapter::{Adapter, FfmpegAdapter, HandbrakeAdapter, TextAdapter};
use crate::config::{validate_config, TranscoderConfig};
use crate::error::TranscodeError;
use crate::events::{EventBus, TranscodeEvent};
use crate::file::FileDescriptor;
use crate::preset::{catalog, Preset, PresetOptions};

/// A validated request whose output path has been claimed.
struct Request {
    input: FileDescriptor,
    preset: Arc<Preset>,
    adapter: Arc<dyn Adapter>,
    output: PathBuf,
}

/// A validation failure together with the best known output path at the time.
type Rejection = (TranscodeError, Option<PathBuf>);

/// Dispatches transcode requests to registered adapters.
///
/// Requests run in two phases. Validation resolves the preset and adapter,
/// checks the input and claims an output path; a failure there publishes a
/// single error event and never touches the adapter. Execution runs the adapter
/// between `before` and `after` events; a failure there cleans up partial
/// output according to the request's [`FailureMode`].
pub struct Transcoder {
    adapters: HashMap<String, Arc<dyn Adapter>>,
    presets: HashMap<String, Arc<Preset>>,
    events: Arc<EventBus>,
    file_creation_mode: FileMode,
    directory_creation_mode: FileMode,
    defaults: TranscodeOptions,
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut adapters: Vec<_> = self.adapters.keys().collect();
        adapters.sort();
        f.debug_struct("Transcoder")
            .field("adapters", &adapters)
            .field("presets", &self.presets.len())
            .field("file_creation_mode", &self.file_creation_mode)
            .field("directory_creation_mode", &self.directory_creation_mode)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcoder {
    /// Creates an empty transcoder with its own event bus.
    pub fn new() -> Self {
        Self::with_event_bus(Arc::new(EventBus::new()))
    }

    /// Creates an empty transcoder publishing on a shared bus.
    pub fn with_event_bus(events: Arc<EventBus>) -> Self {
        Self {
            adapters: HashMap::new(),
            presets: HashMap::new(),
            events,
            file_creation_mode: FileMode::DEFAULT_FILE,
            directory_creation_mode: FileMode::DEFAULT_DIRECTORY,
            defaults: TranscodeOptions::default(),
        }
    }

    /// Builds a transcoder from configuration.
    ///
    /// The configuration is validated first. The text adapter is always
    /// registered; ffmpeg and handbrake only when configured.
    pub fn from_config(config: &TranscoderConfig) -> Result<Self, TranscodeError> {
        validate_config(config)?;

        let mut transcoder = Self::new();
        transcoder.file_creation_mode = config.file_creation_mode;
        transcoder.directory_creation_mode = config.directory_creation_mode;
        transcoder.defaults = config.defaults;

        transcoder.register_adapter(Arc::new(TextAdapter::new()?));
        if let Some(ffmpeg) = &config.ffmpeg {
            transcoder.register_adapter(Arc::new(FfmpegAdapter::new(ffmpeg.clone())?));
        }
        if let Some(handbrake) = &config.handbrake {
            transcoder.register_adapter(Arc::new(HandbrakeAdapter::new(handbrake.clone())?));
        }

        if config.register_builtin_presets {
            for preset in catalog::builtin_presets()? {
                transcoder.register_preset(preset);
            }
        }

        info!(
            adapters = transcoder.adapters.len(),
            presets = transcoder.presets.len(),
            "Transcoder configured"
        );
        Ok(transcoder)
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // Adapters

    /// Registers an adapter under its key, replacing any previous one.
    pub fn register_adapter(&mut self, adapter: Arc<dyn Adapter>) -> &mut Self {
        if let Some(previous) = self.adapters.remove(adapter.key()) {
            previous.context().detach();
        }
        adapter.context().attach(&self.events);
        debug!(adapter = adapter.key(), "Registered adapter");
        self.adapters.insert(adapter.key().to_string(), adapter);
        self
    }

    pub fn get_adapter(&self, key: &str) -> Result<Arc<dyn Adapter>, TranscodeError> {
        self.adapters
            .get(key)
            .cloned()
            .ok_or_else(|| TranscodeError::AdapterNotFound {
                key: key.to_string(),
            })
    }

    pub fn has_adapter(&self, key: &str) -> bool {
        self.adapters.contains_key(key)
    }

    /// Unregisters an adapter and detaches it from the event bus.
    pub fn remove_adapter(&mut self, key: &str) -> Option<Arc<dyn Adapter>> {
        let adapter = self.adapters.remove(key)?;
        adapter.context().detach();
        Some(adapter)
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn Adapter>> {
        self.adapters.values()
    }

    // Presets

    /// Registers a preset under its key, replacing any previous one.
    pub fn register_preset(&mut self, preset: impl Into<Arc<Preset>>) -> &mut Self {
        let preset = preset.into();
        self.presets.insert(preset.key().to_string(), preset);
        self
    }

    pub fn get_preset(&self, key: &str) -> Result<Arc<Preset>, TranscodeError> {
        self.presets
            .get(key)
            .cloned()
            .ok_or_else(|| TranscodeError::PresetNotFound {
                key: key.to_string(),
            })
    }

    pub fn has_preset(&self, key: &str) -> bool {
        self.presets.contains_key(key)
    }

    pub fn remove_preset(&mut self, key: &str) -> Option<Arc<Preset>> {
        self.presets.remove(key)
    }

    pub fn presets(&self) -> impl Iterator<Item = &Arc<Preset>> {
        self.presets.values()
    }

    // Modes and policies

    /// Sets the permission bits applied to output files, e.g. `0o640u32` or `"0640"`.
    pub fn set_file_creation_mode(
        &mut self,
        mode: impl TryInto<FileMode, Error = TranscodeError>,
    ) -> Result<&mut Self, TranscodeError> {
        self.file_creation_mode = mode.try_into()?;
        Ok(self)
    }

    /// Sets the permission bits applied to created and output directories.
    pub fn set_directory_creation_mode(
        &mut self,
        mode: impl TryInto<FileMode, Error = TranscodeError>,
    ) -> Result<&mut Self, TranscodeError> {
        self.directory_creation_mode = mode.try_into()?;
        Ok(self)
    }

    pub fn file_creation_mode(&self) -> FileMode {
        self.file_creation_mode
    }

    pub fn directory_creation_mode(&self) -> FileMode {
        self.directory_creation_mode
    }

    /// Sets the policies used by requests that do not pass their own.
    pub fn set_default_options(&mut self, options: TranscodeOptions) -> &mut Self {
        self.defaults = options;
        self
    }

    pub fn default_options(&self) -> TranscodeOptions {
        self.defaults
    }

    // Transcoding

    /// Runs a single transcode and returns the produced output.
    ///
    /// `output` may name the output file, a directory to put a generated file
    /// name into, or be `None` to write next to the input. `options` overrides
    /// the transcoder's default policies for this request.
    pub async fn transcode_with_preset(
        &self,
        input: impl Into<TranscodeInput>,
        preset: impl Into<PresetRef>,
        output: Option<&Path>,
        options: Option<TranscodeOptions>,
    ) -> Result<FileDescriptor, TranscodeError> {
        let input = input.into();
        let preset = preset.into();
        let options = options.unwrap_or(self.defaults);

        let span = tracing::info_span!(
            "transcode",
            request_id = %Uuid::new_v4(),
            preset = %preset.key(),
            input = %input.path().display(),
        );
        self.run(input, preset, output, options).instrument(span).await
    }

    /// Runs an adapter directly with ad-hoc options through a dynamic preset.
    pub async fn transcode_with_adapter(
        &self,
        input: impl Into<TranscodeInput>,
        adapter: &str,
        options: PresetOptions,
        output: Option<&Path>,
        policies: Option<TranscodeOptions>,
    ) -> Result<FileDescriptor, TranscodeError> {
        let preset = Preset::dynamic(adapter, options)?;
        self.transcode_with_preset(input, preset, output, policies)
            .await
    }

    async fn run(
        &self,
        input: TranscodeInput,
        preset: PresetRef,
        output: Option<&Path>,
        options: TranscodeOptions,
    ) -> Result<FileDescriptor, TranscodeError> {
        let input_path = input.path().to_path_buf();
        let preset_key = preset.key().to_string();
        info!("Starting transcode");

        let request = match self.prepare(input, preset, output, options).await {
            Ok(request) => request,
            Err((error, best_output)) => {
                if error.is_validation() {
                    info!(error = %error, "Transcode rejected");
                } else {
                    warn!(error = %error, "Transcode rejected");
                }
                self.publish_error(&input_path, &preset_key, best_output, None, &error);
                return Err(error);
            }
        };

        self.events.publish(TranscodeEvent::Before {
            input: request.input.path().to_path_buf(),
            preset: preset_key.clone(),
            output: request.output.clone(),
        });

        match self.execute(&request).await {
            Ok(file) => {
                info!(output = %file.path().display(), "Transcode finished");
                Ok(file)
            }
            Err(error) => {
                warn!(
                    error = %error,
                    adapter = request.adapter.key(),
                    retryable = error.is_retryable(),
                    "Transcode failed"
                );
                self.clean_failed_transcode(&request, options.failure).await;
                self.publish_error(
                    request.input.path(),
                    &preset_key,
                    Some(request.output.clone()),
                    Some(request.adapter.key().to_string()),
                    &error,
                );
                Err(error)
            }
        }
    }

    /// Validation phase: everything that can fail before the adapter runs.
    async fn prepare(
        &self,
        input: TranscodeInput,
        preset: PresetRef,
        output: Option<&Path>,
        options: TranscodeOptions,
    ) -> Result<Request, Rejection> {
        let given_output = || output.map(Path::to_path_buf);

        let preset = match preset {
            PresetRef::Key(key) => self.get_preset(&key),
            PresetRef::Preset(preset) => Ok(preset),
        }
        .map_err(|e| (e, given_output()))?;

        let input = input
            .into_descriptor()
            .await
            .map_err(|e| (e, given_output()))?;

        preset
            .validate_input_file(&input)
            .map_err(|e| (e, given_output()))?;

        let adapter = self
            .get_adapter(preset.required_adapter())
            .map_err(|e| (e, given_output()))?;

        if !adapter.verify().await {
            let reason = adapter
                .verification_error()
                .unwrap_or_else(|| "environment verification failed".to_string());
            return Err((
                TranscodeError::environment(adapter.key(), reason),
                given_output(),
            ));
        }
        debug!(adapter = adapter.key(), "Adapter verified");

        adapter
            .validate_input_file(&input)
            .and_then(|()| adapter.validate_preset(&preset))
            .map_err(|e| (e, given_output()))?;
        debug!(mime = %input.mime(), "Input accepted");

        let candidate = preset
            .generate_output_path(&input, output)
            .map_err(|e| (e, given_output()))?;

        let claim = OutputClaim {
            bus: &self.events,
            conflict: options.conflict,
            directory: options.directory,
            directory_mode: self.directory_creation_mode,
        };
        let output = claim
            .claim(candidate.clone(), preset.outputs_directory())
            .await
            .map_err(|e| (e, Some(candidate)))?;

        Ok(Request {
            input,
            preset,
            adapter,
            output,
        })
    }

    /// Execution phase: run the adapter and finalize its output.
    async fn execute(&self, request: &Request) -> Result<FileDescriptor, TranscodeError> {
        let file = request
            .adapter
            .transcode(&request.input, &request.preset, &request.output)
            .await?;

        if !output::path_exists(file.path()).await {
            return Err(TranscodeError::InvalidOutput(format!(
                "adapter {} returned {} which does not exist",
                request.adapter.key(),
                file.path().display()
            )));
        }

        let claimed = tokio::fs::canonicalize(&request.output)
            .await
            .unwrap_or_else(|_| request.output.clone());
        if file.path() != request.output && file.path() != claimed {
            return Err(TranscodeError::InvalidOutput(format!(
                "adapter {} returned {} instead of {}",
                request.adapter.key(),
                file.path().display(),
                request.output.display()
            )));
        }

        request
            .preset
            .validate_output_file(&file)
            .and_then(|()| request.adapter.validate_output_file(&file))
            .map_err(|e| TranscodeError::InvalidOutput(e.to_string()))?;

        let (mode, event) = if file.is_dir() {
            (
                self.directory_creation_mode,
                TranscodeEvent::DirModified {
                    path: file.path().to_path_buf(),
                },
            )
        } else {
            (
                self.file_creation_mode,
                TranscodeEvent::FileModified {
                    path: file.path().to_path_buf(),
                },
            )
        };
        output::apply_mode(file.path(), mode)
            .await
            .map_err(|e| TranscodeError::file_permission(file.path(), e.to_string()))?;
        self.events.publish(event);

        self.events.publish(TranscodeEvent::After {
            input: request.input.path().to_path_buf(),
            preset: request.preset.key().to_string(),
            output: file.path().to_path_buf(),
        });
        self.events.publish(TranscodeEvent::FileCreated {
            path: file.path().to_path_buf(),
        });
        Ok(file)
    }

    /// Removes partial output of a failed execution. Never fails.
    async fn clean_failed_transcode(&self, request: &Request, mode: FailureMode) {
        let path = &request.output;
        match mode {
            FailureMode::Delete if output::path_exists(path).await => {
                if let Err(e) = output::remove_existing(&self.events, path).await {
                    warn!(path = %path.display(), error = %e, "Could not remove failed output");
                }
            }
            FailureMode::Delete => {}
            FailureMode::Preserve => {
                if output::remove_placeholder(path).await {
                    debug!(path = %path.display(), "Removed unused output placeholder");
                }
            }
        }
        request.adapter.cleanup_failed_transcode(path).await;
    }

    fn publish_error(
        &self,
        input: &Path,
        preset: &str,
        output: Option<PathBuf>,
        adapter: Option<String>,
        error: &TranscodeError,
    ) {
        self.events.publish(TranscodeEvent::Error {
            input: input.to_path_buf(),
            preset: preset.to_string(),
            output,
            adapter,
            kind: error.kind(),
            message: error.to_string(),
        });
    }
}
