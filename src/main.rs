use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use langsniff::model_manager::DEFAULT_MODEL_NAME;
use langsniff::{Detection, DetectorConfig, LanguageDetector, ModelInfo, ModelLoader, ModelManager};
use log::info;

/// Sentences the detector can be tried on, one per language.
const SAMPLES: &[(&str, &str)] = &[
    ("English", "The quick brown fox jumps over the lazy dog"),
    ("French", "Le renard brun rapide saute par-dessus le chien paresseux"),
    ("Spanish", "El rápido zorro marrón salta sobre el perro perezoso"),
    ("German", "Der schnelle braune Fuchs springt über den faulen Hund"),
    ("Russian", "Быстрая коричневая лиса перепрыгивает через ленивую собаку"),
    ("Japanese", "速い茶色の狐が怠惰な犬を飛び越えます"),
    ("Arabic", "يقفز الثعلب البني السريع فوق الكلب الكسول"),
];

#[derive(Parser)]
#[command(author, version, about = "Detect the language of a text", long_about = None)]
struct Args {
    /// Text to analyse; read from stdin when omitted
    text: Option<String>,

    /// Directory holding pipeline.json and labels.json
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Download the artifacts listed in this manifest before detecting
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Force a fresh download of the artifacts
    #[arg(short, long, requires = "manifest")]
    fresh: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Run the bundled sample sentences instead of reading input
    #[arg(long, conflicts_with = "text")]
    samples: bool,

    /// Reject inputs longer than this many bytes (0 disables the cap)
    #[arg(long)]
    max_input_bytes: Option<usize>,
}

async fn resolve_model_dir(args: &Args) -> Result<PathBuf> {
    let Some(manifest) = &args.manifest else {
        return Ok(args.model_dir.clone().unwrap_or_else(|| {
            ModelManager::get_default_models_dir().join(DEFAULT_MODEL_NAME)
        }));
    };

    let info = ModelInfo::from_file(manifest)
        .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
    let manager = match &args.model_dir {
        Some(dir) => ModelManager::new(dir),
        None => ModelManager::new_default(),
    }
    .context("Failed to create models directory")?;

    if args.fresh {
        info!("Fresh download requested - removing any existing artifacts...");
        manager.remove_download(&info)?;
    }
    manager.ensure_model_downloaded(&info).await?;

    Ok(manager.get_model_dir(&info.name))
}

fn read_input(args: &Args) -> Result<String> {
    if let Some(text) = &args.text {
        return Ok(text.clone());
    }
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read text from stdin")?;
    Ok(text)
}

fn print_detection(detection: &Detection, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(detection)?);
        return Ok(());
    }

    println!("Predicted language: {}", detection.predicted_label);
    if !detection.ranked_confidences.is_empty() {
        println!("Confidence scores:");
        for confidence in &detection.ranked_confidences {
            let percent = (confidence.probability * 100.0) as u32;
            println!("  {:<12} {:>3}%", confidence.label, percent);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = DetectorConfig::from_env()?;
    if let Some(max) = args.max_input_bytes {
        config = config.with_max_input_bytes((max > 0).then_some(max));
    }

    let model_dir = resolve_model_dir(&args).await?;

    let start_time = Instant::now();
    let loader = ModelLoader::from_dir(&model_dir);
    let model = loader
        .load()
        .with_context(|| format!("Failed to load model from {}", model_dir.display()))?;
    let detector = LanguageDetector::with_config(model, config)?;
    info!("Model loaded in {:.2?}", start_time.elapsed());

    if args.samples {
        for (language, text) in SAMPLES {
            println!("\n{} sample: {}", language, text);
            let detection = detector.detect(text)?;
            print_detection(&detection, args.json)?;
        }
        return Ok(());
    }

    let text = read_input(&args)?;
    if text.trim().is_empty() && args.text.is_none() {
        bail!("No text given: pass it as an argument or pipe it through stdin");
    }

    let detect_start = Instant::now();
    let detection = detector.detect(&text)?;
    info!("Detection took {:.2?}", detect_start.elapsed());
    print_detection(&detection, args.json)
}
