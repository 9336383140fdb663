use anyhow::{Result, Context, anyhow};
use futures::StreamExt;
use log::{error, warn, info, debug};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use indicatif::{ProgressBar, ProgressStyle, MultiProgress};

use crate::app_config::Config;
use crate::errors::PipelineError;
use crate::file_utils::FileManager;
use crate::pipeline::TranslationPipeline;
use crate::providers::{self, Provider};
use crate::providers::key_cache::KeyValidationCache;

// @module: Application controller for document translation

/// Result of translating one file
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// The document was written to `output`
    Translated { output: PathBuf, average_quality: f64, segments: usize },
    /// An output already existed and overwrite was not requested
    Skipped(PathBuf),
    /// The run was interrupted; nothing was written
    Cancelled,
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,
    // @field: Pipeline shared by every file of a run
    pipeline: TranslationPipeline,
    // @field: Provider checked before the first file; `None` skips the check
    provider: Option<Arc<dyn Provider>>,
    // @field: Verdicts of earlier credential checks
    key_cache: KeyValidationCache,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        let pipeline = TranslationPipeline::from_config(&config)?;
        let provider = providers::from_config(&config.translation);
        Ok(Self {
            config,
            pipeline,
            provider: Some(provider),
            key_cache: KeyValidationCache::default(),
        })
    }

    /// Create a controller around an existing pipeline, without a provider check
    pub fn with_pipeline(config: Config, pipeline: TranslationPipeline) -> Self {
        Self {
            config,
            pipeline,
            provider: None,
            key_cache: KeyValidationCache::default(),
        }
    }

    /// Check if the controller is properly initialized with configuration
    pub fn is_initialized(&self) -> bool {
        !self.config.target_language.is_empty()
    }

    /// Make sure the provider answers and accepts the credentials, once per TTL
    pub async fn preflight(&self) -> Result<()> {
        let Some(provider) = &self.provider else {
            return Ok(());
        };

        let credential = match self.config.translation.get_api_key() {
            key if key.is_empty() => self.config.translation.get_endpoint(),
            key => key,
        };
        let cache_key = format!("{}:{}", provider.name(), credential);

        let verdict = self.key_cache.validate(&cache_key, provider.as_ref()).await;
        if verdict.valid {
            debug!("{} provider check passed", self.config.translation.provider.display_name());
            Ok(())
        } else {
            Err(anyhow!(
                "{} provider is not usable: {}",
                self.config.translation.provider.display_name(),
                verdict.reason.unwrap_or_else(|| "unknown reason".to_string())
            ))
        }
    }

    /// Translate one document
    ///
    /// With no `output`, the result goes next to the input. An `output` that is an
    /// existing directory receives the generated file name.
    pub async fn run(
        &self,
        input_file: PathBuf,
        output: Option<PathBuf>,
        retain_terms: &[String],
        force_overwrite: bool,
    ) -> Result<FileOutcome> {
        if !FileManager::file_exists(&input_file) {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }
        if !FileManager::is_docx(&input_file) {
            return Err(anyhow!("Only .docx files are supported: {:?}", input_file));
        }

        let output_path = self.resolve_output_path(&input_file, output)?;
        if output_path.exists() && !force_overwrite {
            warn!("Skipping file, translation already exists (use -f to force overwrite)");
            return Ok(FileOutcome::Skipped(output_path));
        }

        self.preflight().await?;

        let multi_progress = MultiProgress::new();
        self.translate_with_progress(&input_file, &output_path, retain_terms, &multi_progress)
            .await
    }

    /// Run the workflow in folder mode, processing every `.docx` under a directory
    /// Files that already have a translation will be skipped
    pub async fn run_folder(&self, input_dir: PathBuf, retain_terms: &[String], force_overwrite: bool) -> Result<()> {
        let start_time = Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let documents = FileManager::find_documents(&input_dir)?;
        if documents.is_empty() {
            return Err(anyhow!("No .docx files found in directory: {:?}", input_dir));
        }

        self.preflight().await?;

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(documents.len() as u64));
        folder_pb.set_style(Self::bar_style("files"));
        folder_pb.set_message("Processing files");

        let mut success_count = 0;
        let mut error_count = 0;
        let mut skip_count = 0;

        for document in &documents {
            let file_name = document
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            let output_dir = document.parent().map(Path::to_path_buf).unwrap_or_else(|| input_dir.clone());
            let output_path = FileManager::generate_output_path(document, &output_dir, &self.config.target_language);
            if output_path.exists() && !force_overwrite {
                warn!("Skipping {}, translation already exists (use -f to force overwrite)", file_name);
                skip_count += 1;
                folder_pb.inc(1);
                continue;
            }

            match self
                .translate_with_progress(document, &output_path, retain_terms, &multi_progress)
                .await
            {
                Ok(FileOutcome::Cancelled) => {
                    folder_pb.abandon_with_message("Cancelled");
                    warn!("Folder processing cancelled after {} files", success_count);
                    return Ok(());
                }
                Ok(_) => success_count += 1,
                Err(e) => {
                    error!("Error processing file {}: {}", file_name, e);
                    error_count += 1;
                }
            }

            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");

        let summary_message = format!(
            "Folder processing completed: {} processed, {} skipped, {} errors",
            success_count, skip_count, error_count
        );
        info!("{}", summary_message);

        let log_file_path = input_dir.join("docxlate.issues.log");
        let entry = format!(
            "{} - {} - Duration: {}",
            input_dir.display(),
            summary_message,
            Self::format_duration(start_time.elapsed())
        );
        if let Err(e) = FileManager::append_to_log_file(&log_file_path, &entry) {
            warn!("Failed to write folder log: {}", e);
        }

        Ok(())
    }

    /// Drive one pipeline run, mirroring its progress on a bar
    async fn translate_with_progress(
        &self,
        input_file: &Path,
        output_path: &Path,
        retain_terms: &[String],
        multi_progress: &MultiProgress,
    ) -> Result<FileOutcome> {
        let start_time = Instant::now();

        info!(
            "🚀 docxlate: {} - {} -> {}",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model(),
            self.config.target_language
        );

        let progress_bar = multi_progress.add(ProgressBar::new(100));
        progress_bar.set_style(Self::bar_style("%"));
        progress_bar.set_message("Translating");

        let mut run = self.pipeline.translate_document(
            input_file,
            output_path,
            &self.config.target_language,
            retain_terms,
        );

        // Ctrl-C cancels the run; the destination is left untouched
        let cancel = run.cancel_handle();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling translation");
                cancel.cancel();
            }
        });

        let mut last = None;
        let mut outcome = Ok(());
        while let Some(item) = run.next().await {
            match item {
                Ok(progress) => {
                    progress_bar.set_position(progress.percent.round() as u64);
                    progress_bar.set_message(format!(
                        "{}/{} segments, quality {:.1}/40",
                        progress.completed, progress.total, progress.average_quality
                    ));
                    last = Some(progress);
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        interrupt.abort();
        progress_bar.finish_and_clear();

        match outcome {
            Ok(()) => {
                let (average_quality, segments) = last.map_or((0.0, 0), |p| (p.average_quality, p.total));
                info!(
                    "Success: {} ({} segments, quality {:.1}/40, {})",
                    output_path.display(),
                    segments,
                    average_quality,
                    Self::format_duration(start_time.elapsed())
                );
                Ok(FileOutcome::Translated {
                    output: output_path.to_path_buf(),
                    average_quality,
                    segments,
                })
            }
            Err(PipelineError::Cancelled) => Ok(FileOutcome::Cancelled),
            Err(e) => Err(e).with_context(|| format!("Failed to translate {:?}", input_file)),
        }
    }

    fn resolve_output_path(&self, input_file: &Path, output: Option<PathBuf>) -> Result<PathBuf> {
        let target_language = &self.config.target_language;
        let path = match output {
            Some(dir) if FileManager::dir_exists(&dir) => {
                FileManager::generate_output_path(input_file, &dir, target_language)
            }
            Some(file) => {
                if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                    FileManager::ensure_dir(parent)?;
                }
                file
            }
            None => {
                let dir = input_file.parent().map(Path::to_path_buf).unwrap_or_default();
                FileManager::generate_output_path(input_file, dir, target_language)
            }
        };

        if path == input_file {
            return Err(anyhow!("Output would overwrite the input file: {:?}", path));
        }
        Ok(path)
    }

    fn bar_style(unit: &str) -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {} {{msg}} {{eta}}",
                unit
            ))
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓▒░")
    }

    // Format duration in a human-readable format (HH:MM:SS)
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
