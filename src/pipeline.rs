use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{info, warn};

use crate::config::VerifierConfig;
use crate::core::error::{EngineError, VerifyError};
use crate::core::model::{EngineId, EngineReading, VerificationResult};
use crate::core::source::{is_batch_candidate, SourceImage};
use crate::export::{Exporter, ReportExporter, TextExporter};
use crate::fusion::{ConsensusEngine, SimpleConsensusEngine};
use crate::ocr::{EngineAdapter, EngineRegistry};

/// Shared cancellation flag for a verification run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What happened to one image of a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub source: PathBuf,
    pub text_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub result: Result<VerificationResult, VerifyError>,
}

impl BatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs every enabled engine over an image and arbitrates their readings.
///
/// Image tasks and engine calls share one pool of `workers` threads, so no
/// more than `workers` engine calls are ever in flight.
pub struct Verifier {
    adapters: Vec<Arc<dyn EngineAdapter>>,
    consensus: SimpleConsensusEngine,
    pool: ThreadPool,
    cancel: CancelToken,
}

impl Verifier {
    pub fn new(
        config: &VerifierConfig,
        adapters: Vec<Arc<dyn EngineAdapter>>,
    ) -> Result<Self, VerifyError> {
        config.validate()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|idx| format!("ocrverify-{idx}"))
            .build()
            .map_err(|e| VerifyError::config(format!("building worker pool: {e}")))?;
        Ok(Self {
            adapters,
            consensus: SimpleConsensusEngine::from_config(config),
            pool,
            cancel: CancelToken::new(),
        })
    }

    pub fn from_registry(config: &VerifierConfig, registry: EngineRegistry) -> Result<Self, VerifyError> {
        Self::new(config, registry.into_adapters())
    }

    pub fn engines(&self) -> Vec<EngineId> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Verifies one image with every enabled engine.
    pub fn verify(&self, path: &Path) -> Result<VerificationResult, VerifyError> {
        self.pool.install(|| self.run(path, &self.adapters))
    }

    /// Verifies one image with the enabled engines named in `engines`.
    pub fn verify_with(
        &self,
        path: &Path,
        engines: &[EngineId],
    ) -> Result<VerificationResult, VerifyError> {
        let selected: Vec<Arc<dyn EngineAdapter>> = self
            .adapters
            .iter()
            .filter(|adapter| engines.contains(&adapter.id()))
            .cloned()
            .collect();
        self.pool.install(|| self.run(path, &selected))
    }

    /// Verifies each image independently; results come back in input order.
    pub fn verify_all(&self, paths: &[PathBuf]) -> Vec<(PathBuf, Result<VerificationResult, VerifyError>)> {
        self.pool.install(|| {
            paths
                .par_iter()
                .map(|path| (path.clone(), self.run(path, &self.adapters)))
                .collect()
        })
    }

    /// Verifies every image in `image_dir`, writing `<stem>.txt` to
    /// `output_dir` and, when asked, `<stem>.json` to `report_dir`.
    ///
    /// Only an unreadable input directory or an uncreatable output directory
    /// fails the whole batch; per-image failures land in the outcomes.
    pub fn verify_batch(
        &self,
        image_dir: &Path,
        output_dir: &Path,
        report_dir: Option<&Path>,
    ) -> Result<Vec<BatchOutcome>, VerifyError> {
        let images = collect_images(image_dir)?;
        fs::create_dir_all(output_dir)
            .map_err(|e| VerifyError::io(format!("creating {}", output_dir.display()), e))?;
        if let Some(dir) = report_dir {
            fs::create_dir_all(dir)
                .map_err(|e| VerifyError::io(format!("creating {}", dir.display()), e))?;
        }
        info!(count = images.len(), dir = %image_dir.display(), "starting batch");

        let text_exporter = TextExporter::new(output_dir.to_path_buf());
        let report_exporter = report_dir.map(|dir| ReportExporter::new(dir.to_path_buf()));

        let outcomes = self
            .verify_all(&images)
            .into_iter()
            .map(|(source, result)| {
                write_outcome(source, result, &text_exporter, report_exporter.as_ref())
            })
            .collect::<Vec<_>>();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            succeeded = outcomes.len() - failed,
            failed,
            "batch finished"
        );
        Ok(outcomes)
    }

    fn run(
        &self,
        path: &Path,
        adapters: &[Arc<dyn EngineAdapter>],
    ) -> Result<VerificationResult, VerifyError> {
        if self.cancel.is_cancelled() {
            return Err(VerifyError::Cancelled {
                path: path.to_path_buf(),
            });
        }

        let source_id = source_id(path);
        if adapters.is_empty() {
            warn!(source = %source_id, "no engines enabled");
            return Err(VerifyError::NoEnginesAvailable {
                result: Box::new(VerificationResult::empty(source_id.clone(), Vec::new())),
                source_id,
            });
        }

        let image = SourceImage::open(path)?;
        info!(source = %source_id, engines = adapters.len(), "verifying");

        let readings: Vec<EngineReading> = adapters
            .par_iter()
            .map(|adapter| guarded_attempt(adapter.as_ref(), &image))
            .collect();

        for reading in &readings {
            match &reading.error {
                None => info!(
                    source = %source_id,
                    engine = %reading.engine,
                    chars = reading.text.chars().count(),
                    confidence = reading.confidence,
                    "engine finished"
                ),
                Some(error) => warn!(
                    source = %source_id,
                    engine = %reading.engine,
                    %error,
                    "engine failed"
                ),
            }
        }

        let result = self.consensus.arbitrate(&source_id, readings);
        if result.successful().next().is_none() {
            return Err(VerifyError::NoEnginesAvailable {
                source_id,
                result: Box::new(result),
            });
        }

        info!(
            source = %source_id,
            confidence = result.overall_confidence,
            positions = result.total_positions,
            disagreements = result.total_disagreements,
            "verified"
        );
        Ok(result)
    }
}

fn guarded_attempt(adapter: &dyn EngineAdapter, image: &SourceImage) -> EngineReading {
    catch_unwind(AssertUnwindSafe(|| adapter.attempt(image))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        EngineReading::failed(adapter.id(), EngineError::Panicked(message))
    })
}

fn write_outcome(
    source: PathBuf,
    mut result: Result<VerificationResult, VerifyError>,
    text_exporter: &TextExporter,
    report_exporter: Option<&ReportExporter>,
) -> BatchOutcome {
    let mut text_path = None;
    let exported = match &result {
        Ok(verified) => text_exporter.export(verified).and_then(|path| {
            text_path = Some(path);
            report_exporter.map(|e| e.export(verified)).transpose()
        }),
        // The empty result is still worth a report for the reviewer.
        Err(err) => match (err.result(), report_exporter) {
            (Some(empty), Some(exporter)) => exporter.export(empty).map(Some),
            _ => Ok(None),
        },
    };

    let report_path = match exported {
        Ok(path) => path,
        Err(err) => {
            result = Err(err);
            None
        }
    };

    if let Err(err) = &result {
        warn!(source = %source.display(), error = %err, "image failed");
    }
    BatchOutcome {
        source,
        text_path,
        report_path,
        result,
    }
}

fn collect_images(dir: &Path) -> Result<Vec<PathBuf>, VerifyError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| VerifyError::io(format!("reading {}", dir.display()), e))?;
    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| VerifyError::io(format!("reading {}", dir.display()), e))?;
        let path = entry.path();
        if is_batch_candidate(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn source_id(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::Recognition;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct Scripted {
        id: EngineId,
        text: &'static str,
    }

    impl EngineAdapter for Scripted {
        fn id(&self) -> EngineId {
            self.id
        }

        fn recognize(&self, _image: &SourceImage) -> Result<Recognition, EngineError> {
            Ok(Recognition {
                text: self.text.to_string(),
                confidence: 0.95,
            })
        }
    }

    struct Panicking;

    impl EngineAdapter for Panicking {
        fn id(&self) -> EngineId {
            EngineId::Gpt
        }

        fn recognize(&self, _image: &SourceImage) -> Result<Recognition, EngineError> {
            panic!("decoder blew up");
        }
    }

    /// Tracks the peak number of concurrent calls across all instances.
    struct Counting {
        id: EngineId,
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl EngineAdapter for Counting {
        fn id(&self) -> EngineId {
            self.id
        }

        fn recognize(&self, _image: &SourceImage) -> Result<Recognition, EngineError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Recognition {
                text: "same words".into(),
                confidence: 0.9,
            })
        }
    }

    fn scripted(id: EngineId, text: &'static str) -> Arc<dyn EngineAdapter> {
        Arc::new(Scripted { id, text })
    }

    fn image(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"pixels").unwrap();
        path
    }

    #[test]
    fn panicking_adapter_becomes_failed_reading() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let verifier = Verifier::new(
            &VerifierConfig::default(),
            vec![scripted(EngineId::DocAi, "Dear Mother"), Arc::new(Panicking)],
        )?;

        let result = verifier.verify(&image(dir.path(), "a.jpg"))?;

        assert_eq!(result.consensus_text, "Dear Mother");
        let gpt = result.reading(EngineId::Gpt).unwrap();
        assert_eq!(gpt.error.as_deref(), Some("adapter panicked: decoder blew up"));
        Ok(())
    }

    #[test]
    fn verify_with_restricts_engines() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let verifier = Verifier::new(
            &VerifierConfig::default(),
            vec![scripted(EngineId::Vision, "one"), scripted(EngineId::Claude, "two")],
        )?;
        let path = image(dir.path(), "a.png");

        let result = verifier.verify_with(&path, &[EngineId::Claude])?;
        assert_eq!(result.engines, vec![EngineId::Claude]);
        assert_eq!(result.consensus_text, "two");

        let err = verifier.verify_with(&path, &[EngineId::DocAi]).unwrap_err();
        assert!(matches!(err, VerifyError::NoEnginesAvailable { .. }));
        Ok(())
    }

    #[test]
    fn unsupported_format_fails_before_dispatch() {
        let verifier =
            Verifier::new(&VerifierConfig::default(), vec![scripted(EngineId::Vision, "x")]).unwrap();
        let err = verifier.verify(Path::new("notes.docx")).unwrap_err();
        assert!(matches!(err, VerifyError::UnsupportedSourceFormat { .. }));
        let err = verifier.verify(Path::new("/nonexistent/page.jpg")).unwrap_err();
        assert!(matches!(err, VerifyError::SourceNotFound { .. }));
    }

    #[test]
    fn engine_calls_never_exceed_worker_count() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let adapters: Vec<Arc<dyn EngineAdapter>> = EngineId::ALL
            .iter()
            .map(|&id| {
                Arc::new(Counting {
                    id,
                    active: active.clone(),
                    peak: peak.clone(),
                }) as Arc<dyn EngineAdapter>
            })
            .collect();
        let config = VerifierConfig {
            workers: 2,
            ..VerifierConfig::default()
        };
        let verifier = Verifier::new(&config, adapters)?;
        let paths: Vec<PathBuf> = (0..4).map(|i| image(dir.path(), &format!("p{i}.jpg"))).collect();

        let results = verifier.verify_all(&paths);

        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert!(peak.load(Ordering::SeqCst) <= 2);
        Ok(())
    }

    #[test]
    fn cancelled_run_reports_cancellation() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let verifier = Verifier::new(&VerifierConfig::default(), vec![scripted(EngineId::Vision, "x")])?;
        verifier.cancel_token().cancel();
        let err = verifier.verify(&image(dir.path(), "a.jpg")).unwrap_err();
        assert!(matches!(err, VerifyError::Cancelled { .. }));
        Ok(())
    }

    #[test]
    fn batch_skips_non_images_and_sorts() -> anyhow::Result<()> {
        let input = tempfile::tempdir()?;
        let output = tempfile::tempdir()?;
        image(input.path(), "b.JPG");
        image(input.path(), "a.tif");
        image(input.path(), "notes.txt");
        image(input.path(), "scan.pdf");

        let verifier = Verifier::new(&VerifierConfig::default(), vec![scripted(EngineId::Vision, "hi")])?;
        let outcomes = verifier.verify_batch(input.path(), output.path(), None)?;

        let names: Vec<String> = outcomes
            .iter()
            .map(|o| o.source.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.tif", "b.JPG"]);
        assert_eq!(fs::read_to_string(output.path().join("b.txt"))?, "hi");
        assert!(outcomes.iter().all(|o| o.report_path.is_none()));
        Ok(())
    }

    #[test]
    fn missing_input_dir_fails_the_batch() {
        let verifier = Verifier::new(&VerifierConfig::default(), Vec::new()).unwrap();
        let out = tempfile::tempdir().unwrap();
        assert!(verifier
            .verify_batch(Path::new("/nonexistent/dir"), out.path(), None)
            .is_err());
    }
}
