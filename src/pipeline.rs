//! Batch orchestration.
//!
//! Walks an input directory, normalizes and stamps every eligible file,
//! and reports per-file outcomes. Processing is strictly sequential: one
//! file is fully inspected, planned, composed, embedded, and cleaned up
//! before the next begins. Failures are file-scoped — logged and
//! skipped — except for working-directory setup and listing failures,
//! which abort the batch.

use crate::convert::{SourceFormat, docx_to_pdf, image_to_pdf};
use crate::error::{Error, Result};
use crate::metadata;
use crate::stamp::{self, StampPlan, TokenMinter};
use std::path::{Path, PathBuf};

/// Default verification URL prefix encoded into token payloads.
pub const DEFAULT_VERIFY_BASE_URL: &str = "https://qrseal.dev";
/// Default badge asset looked up next to the working directory.
pub const DEFAULT_BADGE_PATH: &str = "badge.png";
/// Directory that receives final artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "output";
/// Directory for scratch token images, purged after every batch run.
pub const DEFAULT_SCRATCH_DIR: &str = "img";

/// Per-call configuration for a batch run.
#[derive(Debug, Clone)]
pub struct StampConfig {
    /// Optional fifth stamp position; both coordinates come together
    pub custom_position: Option<(f64, f64)>,
    /// Password for encrypted PDFs; used to decrypt the source and to
    /// re-encrypt the output with matching user/owner credentials
    pub password: Option<String>,
    /// Verification URL prefix (`<base>/verify/<uuid>`)
    pub verify_base_url: String,
    /// Badge image placed at the center of every token footprint
    pub badge_path: PathBuf,
    /// Directory receiving one output PDF per input file
    pub output_dir: PathBuf,
    /// Scratch directory for token images
    pub scratch_dir: PathBuf,
}

impl Default for StampConfig {
    fn default() -> Self {
        Self {
            custom_position: None,
            password: None,
            verify_base_url: DEFAULT_VERIFY_BASE_URL.to_string(),
            badge_path: PathBuf::from(DEFAULT_BADGE_PATH),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
        }
    }
}

impl StampConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the fifth stamp position at explicit page coordinates.
    pub fn with_custom_position(mut self, x: f64, y: f64) -> Self {
        self.custom_position = Some((x, y));
        self
    }

    /// Set the password used for encrypted sources.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the verification URL prefix.
    pub fn with_verify_base_url(mut self, base: impl Into<String>) -> Self {
        self.verify_base_url = base.into();
        self
    }

    /// Set the badge asset path.
    pub fn with_badge_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.badge_path = path.into();
        self
    }

    /// Set the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the scratch directory.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }
}

/// Outcome of processing one input file.
#[derive(Debug)]
pub struct FileOutcome {
    /// The input file
    pub input: PathBuf,
    /// The written artifact, on success
    pub output: Option<PathBuf>,
    /// One-line failure cause, on failure
    pub error: Option<String>,
}

impl FileOutcome {
    /// Whether this file produced an output.
    pub fn succeeded(&self) -> bool {
        self.output.is_some()
    }
}

/// Summary of a completed batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Per-file outcomes, in processing order
    pub outcomes: Vec<FileOutcome>,
    /// Entries skipped for an unsupported extension
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    /// Number of files that produced an output.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    /// Number of files that failed.
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Process every eligible file in `input_dir`.
///
/// Creates `output/` and `img/` (per the config) if absent — failure
/// there aborts the batch, as does a directory listing failure. Each
/// entry with a `.pdf`, `.jpg`, `.jpeg`, `.png`, or `.docx` extension
/// (case-insensitive) is processed; everything else is logged and
/// skipped. Per-file errors never stop the batch. The scratch directory
/// is purged once the run completes.
pub fn process_directory(input_dir: impl AsRef<Path>, config: &StampConfig) -> Result<BatchReport> {
    let input_dir = input_dir.as_ref();

    // Setup failures propagate unconditionally
    std::fs::create_dir_all(&config.output_dir)?;
    std::fs::create_dir_all(&config.scratch_dir)?;

    let mut entries: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| !p.is_dir())
        .collect();
    entries.sort();

    let mut report = BatchReport::default();

    for path in entries {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        let format = match SourceFormat::from_extension(extension) {
            Some(format) => format,
            None => {
                log::warn!("unsupported file format: {}", path.display());
                report.skipped.push(path);
                continue;
            },
        };

        match process_file(&path, format, config) {
            Ok(output) => {
                log::info!("processed file: {}", output.display());
                report.outcomes.push(FileOutcome {
                    input: path,
                    output: Some(output),
                    error: None,
                });
            },
            Err(e) => {
                log::error!("error processing file {}: {}", path.display(), e);
                report.outcomes.push(FileOutcome {
                    input: path,
                    output: None,
                    error: Some(e.to_string()),
                });
            },
        }
    }

    stamp::token::purge_dir(&config.scratch_dir)?;

    Ok(report)
}

/// Process a single input file into `output/<basename>.pdf`.
pub fn process_file(path: &Path, format: SourceFormat, config: &StampConfig) -> Result<PathBuf> {
    let file_stem = path
        .file_stem()
        .ok_or_else(|| Error::UnsupportedFormat(format!("no file name: {}", path.display())))?;
    let output_path = config
        .output_dir
        .join(Path::new(file_stem).with_extension("pdf"));

    match format {
        SourceFormat::Pdf => {
            let report = crate::document::inspect(path)?;
            if report.encrypted {
                let password = config.password.as_deref().ok_or_else(|| {
                    Error::Auth(format!(
                        "{} is password-protected but no password was configured",
                        path.display()
                    ))
                })?;
                stamp_file(path, &output_path, config, Some(password))?;
            } else {
                stamp_file(path, &output_path, config, None)?;
            }
        },
        SourceFormat::Jpeg | SourceFormat::Png => {
            // Normalize to a baseline PDF at the output path, then stamp
            // it in place
            let baseline = image_to_pdf(path)?;
            std::fs::write(&output_path, baseline)?;
            stamp_file(&output_path, &output_path, config, None)?;
        },
        SourceFormat::Docx => {
            let baseline = docx_to_pdf(path)?;
            std::fs::write(&output_path, baseline)?;
            stamp_file(&output_path, &output_path, config, None)?;
        },
    }

    Ok(output_path)
}

/// Plan, compose, embed, and write one document; token images and the
/// badge scratch file are deleted afterwards whether or not the write
/// succeeded.
fn stamp_file(
    source: &Path,
    output: &Path,
    config: &StampConfig,
    password: Option<&str>,
) -> Result<()> {
    let minter = TokenMinter::new(config.verify_base_url.clone(), &config.scratch_dir);
    let plan = StampPlan::generate(&minter, config.custom_position)?;

    let badge_scratch = config.scratch_dir.join("badge_resized.png");

    let result = (|| -> Result<()> {
        stamp::token::prepare_badge(&config.badge_path, &badge_scratch)?;

        let stamped = match password {
            Some(password) => {
                stamp::compose_protected(source, password, &plan, &badge_scratch)?
            },
            None => stamp::compose_unprotected(source, &plan, &badge_scratch)?,
        };

        let bytes = metadata::embed(stamped, password)?;
        std::fs::write(output, bytes)?;
        Ok(())
    })();

    // File-scoped teardown runs regardless of the outcome
    stamp::token::cleanup_plan(&plan);
    if let Err(e) = std::fs::remove_file(&badge_scratch) {
        log::warn!("failed to delete badge scratch {}: {}", badge_scratch.display(), e);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = StampConfig::new()
            .with_custom_position(120.0, 340.0)
            .with_password("pw")
            .with_verify_base_url("https://verify.example")
            .with_badge_path("assets/badge.png");

        assert_eq!(config.custom_position, Some((120.0, 340.0)));
        assert_eq!(config.password.as_deref(), Some("pw"));
        assert_eq!(config.verify_base_url, "https://verify.example");
        assert_eq!(config.badge_path, PathBuf::from("assets/badge.png"));
    }

    #[test]
    fn test_default_directories() {
        let config = StampConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert_eq!(config.scratch_dir, PathBuf::from("img"));
    }

    #[test]
    fn test_report_counts() {
        let report = BatchReport {
            outcomes: vec![
                FileOutcome {
                    input: PathBuf::from("a.pdf"),
                    output: Some(PathBuf::from("output/a.pdf")),
                    error: None,
                },
                FileOutcome {
                    input: PathBuf::from("b.pdf"),
                    output: None,
                    error: Some("boom".to_string()),
                },
            ],
            skipped: vec![PathBuf::from("c.txt")],
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
    }

    #[test]
    fn test_listing_failure_propagates() {
        let root = tempfile::tempdir().unwrap();
        let config = StampConfig::new()
            .with_output_dir(root.path().join("out"))
            .with_scratch_dir(root.path().join("img"));

        let result = process_directory("/definitely/not/a/real/dir", &config);
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
