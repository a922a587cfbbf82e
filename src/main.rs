use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use ocrverify::config::{Credentials, VerifierConfig};
use ocrverify::core::confidence::round4;
use ocrverify::core::init_tracing;
use ocrverify::core::model::{EngineId, VerificationResult};
use ocrverify::export::{Exporter, ReportExporter, TextExporter};
use ocrverify::ocr::EngineRegistry;
use ocrverify::pipeline::Verifier;

#[derive(Parser, Debug)]
#[command(name = "ocrverify")]
#[command(version, about = "Cross-check archival transcriptions against several OCR engines", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Engines to run, comma separated (default: all configured)
    #[arg(long, global = true, value_delimiter = ',')]
    engines: Vec<EngineId>,

    /// TOML configuration file
    #[arg(long, global = true, env = "OCRVERIFY_CONFIG")]
    config: Option<PathBuf>,

    /// Language hint for the Google engines (repeatable)
    #[arg(long = "language-hint", global = true)]
    language_hints: Vec<String>,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify a single image
    Verify {
        /// Source image (jpg, png, gif, webp, bmp, tiff or pdf)
        image: PathBuf,

        /// Write the consensus text to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the JSON audit report to this file
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Print the consensus text
        #[arg(long)]
        stdout: bool,

        /// Print the report, consensus text included, as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify every image in a directory
    Batch {
        /// Directory of jpg, png or tiff images
        input_dir: PathBuf,

        /// Directory for the consensus text files
        #[arg(long)]
        output_dir: PathBuf,

        /// Directory for the JSON reports
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Worker threads shared by images and engine calls
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Show which engines are configured and usable
    Engines,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.global.debug { "debug" } else { "info" });

    let mut config = load_config(&cli.global)?;

    match cli.command {
        Commands::Verify {
            image,
            output,
            report,
            stdout,
            json,
        } => verify_single(&config, &image, output, report, stdout, json),
        Commands::Batch {
            input_dir,
            output_dir,
            report_dir,
            workers,
        } => {
            if let Some(workers) = workers {
                config.workers = workers;
                config.validate()?;
            }
            verify_batch(&config, &input_dir, &output_dir, report_dir.as_deref())
        }
        Commands::Engines => show_engines(&config),
    }
}

fn load_config(global: &GlobalArgs) -> Result<VerifierConfig> {
    let mut config = match &global.config {
        Some(path) => VerifierConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => VerifierConfig::default(),
    };
    if !global.engines.is_empty() {
        config.engines = global.engines.clone();
    }
    if !global.language_hints.is_empty() {
        config.language_hints = global.language_hints.clone();
    }
    config.validate()?;
    Ok(config)
}

fn build_verifier(config: &VerifierConfig) -> Result<Verifier> {
    let registry = EngineRegistry::from_config(config, &Credentials::from_env());
    if registry.is_empty() {
        eprintln!("[!] No engines have credentials; results will be empty");
    } else {
        let names: Vec<&str> = registry.engines().iter().map(EngineId::as_str).collect();
        eprintln!("[*] Engines: {}", names.join(", "));
    }
    Ok(Verifier::from_registry(config, registry)?)
}

fn verify_single(
    config: &VerifierConfig,
    image: &Path,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
    stdout: bool,
    json: bool,
) -> Result<()> {
    if output.is_none() && report.is_none() && !stdout && !json {
        anyhow::bail!("Nothing to do: pass --output, --report, --stdout or --json");
    }

    let verifier = build_verifier(config)?;
    eprintln!("[*] Processing: {}", image.display());

    let outcome = verifier.verify(image);
    let result = match &outcome {
        Ok(result) => Some(result),
        Err(err) => err.result(),
    };

    if let (Some(result), Some(path)) = (result, report) {
        let path = ReportExporter::to_file(path).export(result)?;
        eprintln!("[+] Report: {}", path.display());
    }

    let result = outcome.with_context(|| format!("Failed to verify: {}", image.display()))?;
    print_summary(&result);

    if let Some(path) = output {
        let path = TextExporter::to_file(path).export(&result)?;
        eprintln!("[+] Text: {}", path.display());
    }
    if stdout {
        println!("{}", result.consensus_text);
    }
    if json {
        println!("{}", ReportExporter::new(PathBuf::new()).with_text(true).render(&result)?);
    }
    Ok(())
}

fn verify_batch(
    config: &VerifierConfig,
    input_dir: &Path,
    output_dir: &Path,
    report_dir: Option<&Path>,
) -> Result<()> {
    let verifier = build_verifier(config)?;
    eprintln!("[*] Batch processing: {}", input_dir.display());
    eprintln!("[*] Output: {}\n", output_dir.display());

    let outcomes = verifier
        .verify_batch(input_dir, output_dir, report_dir)
        .with_context(|| format!("Failed to process directory: {}", input_dir.display()))?;

    if outcomes.is_empty() {
        anyhow::bail!("No images found in {}", input_dir.display());
    }

    let total = outcomes.len();
    let mut failed = 0;
    for (i, outcome) in outcomes.iter().enumerate() {
        eprintln!("[{}/{}] {}", i + 1, total, outcome.source.display());
        match &outcome.result {
            Ok(result) => eprintln!(
                "  [✓] confidence {:.1}%, {} disagreement(s)",
                result.overall_confidence * 100.0,
                result.total_disagreements
            ),
            Err(err) => {
                eprintln!("  [✗] Failed: {err}");
                failed += 1;
            }
        }
    }

    eprintln!("\n[*] Summary: {} succeeded, {} failed", total - failed, failed);
    if failed > 0 {
        anyhow::bail!("{} image(s) failed to verify", failed);
    }
    Ok(())
}

fn print_summary(result: &VerificationResult) {
    eprintln!(
        "[+] Confidence: {} ({} high, {} medium, {} low of {} words)",
        round4(result.overall_confidence),
        result.counts.high,
        result.counts.medium,
        result.counts.low,
        result.total_positions
    );
    for reading in &result.readings {
        match &reading.error {
            None => eprintln!(
                "    {}: {} chars",
                reading.engine.display_name(),
                reading.text.chars().count()
            ),
            Some(error) => eprintln!("    {}: failed ({error})", reading.engine.display_name()),
        }
    }
    if result.total_disagreements > 0 {
        eprintln!("[!] {} position(s) need review", result.total_disagreements);
    }
}

fn show_engines(config: &VerifierConfig) -> Result<()> {
    let registry = EngineRegistry::from_config(config, &Credentials::from_env());
    let enabled = registry.engines();

    println!("Engines");
    println!("=======");
    for engine in EngineId::ALL {
        let status = if enabled.contains(&engine) {
            "ready".to_string()
        } else if let Some((_, err)) = registry.disabled().iter().find(|(id, _)| *id == engine) {
            format!("disabled ({err})")
        } else {
            "not selected".to_string()
        };
        println!(
            "{:<7} {:<14} {}",
            engine.as_str(),
            engine.class().as_str(),
            status
        );
    }
    Ok(())
}
