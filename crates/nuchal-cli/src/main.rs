//! nuchal CLI — offline access to the NT measurement and detection post-processing.

use clap::{Args, Parser, Subcommand, ValueEnum};
use image::Luma;
use std::path::{Path, PathBuf};

use nuchal::{
    BoxPredictionResponse, DenoiseConfig, DenoiseMode, FittedEllipse, NtMeasurement, NtMeasurer,
    PipelineConfig, PixelCalibration, ProbabilityMap, RawDetectionInput, SegPredictionResponse,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "nuchal")]
#[command(about = "Nuchal translucency measurement and anatomy-box post-processing for fetal ultrasound")]
#[command(version)]
struct Cli {
    /// Pipeline configuration (JSON). Missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Suppress periodic noise in a grayscale frame.
    Denoise(CliDenoiseArgs),

    /// Fit the NT ellipse to a stored binary mask and measure the minor axis.
    MeasureMask(CliMeasureMaskArgs),

    /// Threshold an 8-bit probability map into a mask and measure NT.
    Binarize(CliBinarizeArgs),

    /// Decode raw detection-head output into pixel boxes.
    DecodeBoxes(CliDecodeBoxesArgs),

    /// Print the active anatomy label table.
    Labels,
}

#[derive(Debug, Clone, Args)]
struct CliDenoiseArgs {
    /// Input image (converted to grayscale).
    #[arg(long)]
    image: PathBuf,

    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    /// Lower band bound: mean + alpha·std of the log spectrum.
    #[arg(long)]
    alpha: Option<f64>,

    /// Upper band bound: max − beta·std of the log spectrum.
    #[arg(long)]
    beta: Option<f64>,

    /// Which side of the band to keep.
    #[arg(long, value_enum)]
    mode: Option<DenoiseModeArg>,

    /// Skip histogram equalisation before the transform.
    #[arg(long)]
    no_equalize: bool,
}

#[derive(Debug, Clone, Args)]
struct CliMeasureMaskArgs {
    /// Mask image; any non-zero pixel is foreground.
    #[arg(long)]
    mask: PathBuf,

    /// Path to write the measurement (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Millimetres per pixel.
    #[arg(long)]
    pixel_size_mm: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct CliBinarizeArgs {
    /// 8-bit probability map at the model working resolution (0..255 → 0..1).
    #[arg(long)]
    probs: PathBuf,

    /// Original frame width (default: probability map width).
    #[arg(long)]
    width: Option<u32>,

    /// Original frame height (default: probability map height).
    #[arg(long)]
    height: Option<u32>,

    /// Path to write the segmentation response (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Optional 0/255 mask image output.
    #[arg(long)]
    mask_out: Option<PathBuf>,

    /// Foreground probability threshold (strict).
    #[arg(long)]
    threshold: Option<f32>,

    /// Millimetres per pixel.
    #[arg(long)]
    pixel_size_mm: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct CliDecodeBoxesArgs {
    /// Raw head output: {class_scores, boxes, image_width, image_height}.
    #[arg(long)]
    input: PathBuf,

    /// Path to write the box response (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Minimum class score.
    #[arg(long)]
    threshold: Option<f32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DenoiseModeArg {
    Signal,
    Noise,
}

impl DenoiseModeArg {
    fn to_core(self) -> DenoiseMode {
        match self {
            Self::Signal => DenoiseMode::Signal,
            Self::Noise => DenoiseMode::Noise,
        }
    }
}

/// Ellipse and NT measurement written by `measure-mask`.
#[derive(Debug, serde::Serialize)]
struct MaskMeasurementReport {
    width: u32,
    height: u32,
    foreground_px: usize,
    ellipse: Option<FittedEllipse>,
    measurement: Option<NtMeasurement>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Denoise(args) => run_denoise(&args, &config),
        Commands::MeasureMask(args) => run_measure_mask(&args, &config),
        Commands::Binarize(args) => run_binarize(&args, &config),
        Commands::DecodeBoxes(args) => run_decode_boxes(&args, &config),
        Commands::Labels => run_labels(&config),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<PipelineConfig> {
    match path {
        Some(p) => {
            tracing::info!("Loading config: {}", p.display());
            Ok(PipelineConfig::from_json_file(p)?)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn open_gray(path: &Path) -> CliResult<image::GrayImage> {
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open image {}: {}", path.display(), e).into()
    })?;
    Ok(img.to_luma8())
}

fn calibration(config: &PipelineConfig, override_mm: Option<f64>) -> CliResult<PixelCalibration> {
    match override_mm {
        Some(mm) => Ok(PixelCalibration::new(mm)?),
        None => Ok(config.calibration),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, &json)?;
    tracing::info!("Results written to {}", path.display());
    Ok(())
}

fn log_measurement(m: &NtMeasurement) {
    tracing::info!(
        "NT: {:.2} px = {:.2} mm at {} mm/px",
        m.distance_px,
        m.distance_mm,
        m.pixel_size_mm
    );
}

// ── denoise ────────────────────────────────────────────────────────────

fn run_denoise(args: &CliDenoiseArgs, config: &PipelineConfig) -> CliResult<()> {
    let gray = open_gray(&args.image)?;
    tracing::info!("Image size: {}x{}", gray.width(), gray.height());

    let mut cfg: DenoiseConfig = config.segmentation.denoise.unwrap_or_default();
    if let Some(alpha) = args.alpha {
        cfg.alpha = alpha;
    }
    if let Some(beta) = args.beta {
        cfg.beta = beta;
    }
    if let Some(mode) = args.mode {
        cfg.mode = mode.to_core();
    }
    if args.no_equalize {
        cfg.equalize = false;
    }

    let out = nuchal::denoise(&gray, &cfg);
    out.save(&args.out)?;
    tracing::info!("Denoised image ({:?}) written to {}", cfg.mode, args.out.display());
    Ok(())
}

// ── measure-mask ───────────────────────────────────────────────────────

fn run_measure_mask(args: &CliMeasureMaskArgs, config: &PipelineConfig) -> CliResult<()> {
    let cal = calibration(config, args.pixel_size_mm)?;
    let mask = nuchal::BinaryMask::from_gray_nonzero(&open_gray(&args.mask)?);
    let (width, height) = mask.dimensions();

    let ellipse = nuchal::fit_mask_ellipse(&mask);
    let measurement = ellipse.map(|e| cal.measure(&nuchal::nt_endpoints(&e)));
    match &measurement {
        Some(m) => log_measurement(m),
        None => tracing::warn!("Mask has no foreground; no measurement"),
    }

    let report = MaskMeasurementReport {
        width,
        height,
        foreground_px: mask.foreground_count(),
        ellipse,
        measurement,
    };
    write_json(&args.out, &report)
}

// ── binarize ───────────────────────────────────────────────────────────

fn run_binarize(args: &CliBinarizeArgs, config: &PipelineConfig) -> CliResult<()> {
    let cal = calibration(config, args.pixel_size_mm)?;
    let probs_u8 = open_gray(&args.probs)?;
    let probs = ProbabilityMap::from_fn(probs_u8.width(), probs_u8.height(), |x, y| {
        Luma([f32::from(probs_u8.get_pixel(x, y)[0]) / 255.0])
    });
    let size = [
        args.width.unwrap_or(probs.width()),
        args.height.unwrap_or(probs.height()),
    ];

    let mut seg = config.segmentation.clone();
    if let Some(t) = args.threshold {
        seg.mask.threshold = t;
    }
    let result = NtMeasurer::new(seg).measure_probabilities(&probs, size);
    tracing::info!(
        "Mask {}x{}: {} foreground px",
        size[0],
        size[1],
        result.mask.foreground_count()
    );
    match result.measurement(&cal) {
        Some(m) => log_measurement(&m),
        None => tracing::warn!("Mask has no foreground; no measurement"),
    }

    if let Some(path) = &args.mask_out {
        result.mask.to_display_image().save(path)?;
        tracing::info!("Mask written to {}", path.display());
    }
    write_json(
        &args.out,
        &SegPredictionResponse {
            prediction: result.to_prediction(),
        },
    )
}

// ── decode-boxes ───────────────────────────────────────────────────────

fn run_decode_boxes(args: &CliDecodeBoxesArgs, config: &PipelineConfig) -> CliResult<()> {
    let raw: RawDetectionInput = serde_json::from_str(&std::fs::read_to_string(&args.input)?)?;
    let mut cfg = config.detection.clone();
    if let Some(t) = args.threshold {
        cfg.score_threshold = t;
    }

    let detections = nuchal::decode_detections(
        &raw.class_scores,
        &raw.boxes,
        [raw.image_width, raw.image_height],
        &cfg,
    )?;
    for d in &detections {
        tracing::info!(
            "{} ({:.2}): x={:.1} y={:.1} w={:.1} h={:.1}",
            d.class_name,
            d.confidence,
            d.x_min,
            d.y_min,
            d.width,
            d.height
        );
    }
    tracing::info!("{} of {} classes detected", detections.len(), raw.class_scores.len());
    write_json(&args.out, &BoxPredictionResponse::from_detections(&detections))
}

// ── labels ─────────────────────────────────────────────────────────────

fn run_labels(config: &PipelineConfig) -> CliResult<()> {
    let labels = &config.detection.labels;
    println!("nuchal anatomy labels ({} classes)", labels.len());
    for (i, name) in labels.names().iter().enumerate() {
        println!("  {:>2}: {}", i, name);
    }
    println!("  score threshold: {}", config.detection.score_threshold);
    Ok(())
}
