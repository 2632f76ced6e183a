// ============================================================================
// SnapForge CLI — headless batch editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   snapforge -i photo.png --brightness 20 --filter Sepia -o result.png
//   snapforge -i shots/*.jpg --rotate 90 --output-dir rotated/ --format png
//   snapforge -i scan.png --crop 10,10,400,300 --thumbnail 128 -o thumb.jpg --quality 85
//   snapforge --list-filters --config my_filters.json
//
// Every file goes through a real editing Session, so the CLI exercises the
// same pipeline and history as an interactive host.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};

use crate::canvas::{FlipAxis, Rect};
use crate::config::EditorConfig;
use crate::error::{EditorError, EditorResult};
use crate::io::{DEFAULT_JPEG_QUALITY, SaveFormat, encode_and_write, load_buffer};
use crate::ops::adjustments::AdjustmentUpdate;
use crate::ops::transform::thumbnail;
use crate::project::Session;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// SnapForge headless photo editor.
#[derive(Parser, Debug)]
#[command(
    name = "snapforge",
    about = "SnapForge headless batch photo editor",
    long_about = "Apply colour adjustments, filters and geometric edits to image files\n\
                  without a UI. Reads PNG, JPEG, WEBP, BMP and TGA; writes PNG, JPEG,\n\
                  BMP and TGA.\n\n\
                  Edits run in this order: adjustments, filter, rotate, flip, crop,\n\
                  thumbnail.\n\n\
                  Example:\n  \
                  snapforge -i photo.png --brightness 20 --filter Sepia -o out.png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, num_args = 1.., required_unless_present = "list_filters")]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Brightness offset (-100..100).
    #[arg(long, allow_negative_numbers = true, value_name = "N")]
    pub brightness: Option<i32>,

    /// Contrast (-100..100).
    #[arg(long, allow_negative_numbers = true, value_name = "N")]
    pub contrast: Option<i32>,

    /// Saturation change in percent (-100 = greyscale, 0 = unchanged, 100 = double).
    #[arg(long, allow_negative_numbers = true, value_name = "PCT")]
    pub saturation: Option<i32>,

    /// Hue rotation in degrees (-180..180).
    #[arg(long, allow_negative_numbers = true, value_name = "DEG")]
    pub hue: Option<i32>,

    /// Filter preset name (see --list-filters).
    #[arg(long, value_name = "NAME")]
    pub filter: Option<String>,

    /// Clockwise rotation in degrees; must be a multiple of 90.
    #[arg(long, allow_negative_numbers = true, value_name = "DEG")]
    pub rotate: Option<i32>,

    #[arg(long, value_enum)]
    pub flip: Option<FlipArg>,

    /// Crop rectangle as X,Y,W,H in pixels of the rotated/flipped image.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_rect)]
    pub crop: Option<Rect>,

    /// Downscale so the longer side is at most MAX pixels.
    #[arg(long, value_name = "MAX")]
    pub thumbnail: Option<u32>,

    /// Output format: png, jpeg, bmp, tga.
    /// When omitted, inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY, value_name = "1-100")]
    pub quality: u8,

    /// JSON editor configuration (history limit, debounce, filter catalog).
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the available filter names and exit.
    #[arg(long)]
    pub list_filters: bool,

    /// Print per-file history and timing.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FlipArg {
    Horizontal,
    Vertical,
}

impl From<FlipArg> for FlipAxis {
    fn from(arg: FlipArg) -> Self {
        match arg {
            FlipArg::Horizontal => FlipAxis::Horizontal,
            FlipArg::Vertical => FlipAxis::Vertical,
        }
    }
}

/// The edits requested on the command line, independent of any file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditPlan {
    pub adjustments: AdjustmentUpdate,
    pub filter: Option<String>,
    pub rotate: Option<i32>,
    pub flip: Option<FlipAxis>,
    pub crop: Option<Rect>,
    pub thumbnail: Option<u32>,
}

impl EditPlan {
    pub fn from_args(args: &CliArgs) -> Self {
        let mut adjustments = AdjustmentUpdate::default();
        if let Some(v) = args.brightness {
            adjustments = adjustments.brightness(v);
        }
        if let Some(v) = args.contrast {
            adjustments = adjustments.contrast(v);
        }
        if let Some(v) = args.saturation {
            adjustments = adjustments.saturation_percent(v);
        }
        if let Some(v) = args.hue {
            adjustments = adjustments.hue(v);
        }
        Self {
            adjustments,
            filter: args.filter.clone(),
            rotate: args.rotate,
            flip: args.flip.map(FlipAxis::from),
            crop: args.crop,
            thumbnail: args.thumbnail,
        }
    }

    /// Run the session-level edits. Thumbnailing happens at export time.
    pub fn apply(&self, session: &mut Session) -> EditorResult<()> {
        if !self.adjustments.is_empty() {
            session.set_adjustments(self.adjustments)?;
        }
        if let Some(name) = &self.filter {
            session.set_filter(Some(name.as_str()))?;
        }
        if let Some(degrees) = self.rotate {
            session.rotate_by(degrees)?;
        }
        if let Some(axis) = self.flip {
            session.flip(axis)?;
        }
        if let Some(rect) = self.crop {
            session.crop(rect)?;
        }
        session.flush_pending();
        Ok(())
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let config = match &args.config {
        Some(path) => match EditorConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: could not load config '{}': {}", path.display(), e);
                crate::log_err!("config {} rejected: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => EditorConfig::default(),
    };

    if args.list_filters {
        for filter in &config.filters {
            println!("{:<10} intensity {:.2}", filter.name, filter.intensity);
        }
        return ExitCode::SUCCESS;
    }

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    let save_format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let plan = EditPlan::from_args(&args);
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            save_format,
        ) else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &plan, &config, save_format, args.quality) {
            Ok(history) => {
                if args.verbose {
                    for (i, label) in history.iter().enumerate() {
                        println!("  {:>2}. {}", i, label);
                    }
                }
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                crate::log_err!("{}: {}", input_path.display(), e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing
// ============================================================================

/// Load, edit and save one file. Returns the session's history labels.
pub fn run_one(
    input: &Path,
    output: &Path,
    plan: &EditPlan,
    config: &EditorConfig,
    format: SaveFormat,
    quality: u8,
) -> EditorResult<Vec<String>> {
    let mut session = Session::new(config.clone())?;
    session.load_original(load_buffer(input)?);
    plan.apply(&mut session)?;

    let current = session
        .current_buffer()
        .ok_or_else(|| EditorError::precondition("no image after editing"))?;
    match plan.thumbnail {
        Some(max) => encode_and_write(&thumbnail(current, max)?, output, format, quality)?,
        None => encode_and_write(current, output, format, quality)?,
    }

    Ok(session.history_labels())
}

// ============================================================================
// Helpers
// ============================================================================

/// Parse "X,Y,W,H" into a rectangle.
pub fn parse_rect(s: &str) -> Result<Rect, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, w, h] = parts.as_slice() else {
        return Err(format!("expected X,Y,W,H but got '{}'", s));
    };
    let num = |v: &str| {
        v.parse::<u32>()
            .map_err(|_| format!("'{}' is not a non-negative integer", v))
    };
    Ok(Rect::new(num(*x)?, num(*y)?, num(*w)?, num(*h)?))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !crate::io::is_supported_input(&entry) {
                        continue;
                    }
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no image files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the output format from `--format` or the output extension.
/// Defaults to PNG when neither is given.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<SaveFormat, String> {
    if let Some(f) = format_arg {
        return SaveFormat::parse(f).ok_or_else(|| {
            let known: Vec<&str> = SaveFormat::all().iter().map(|fmt| fmt.extension()).collect();
            format!("unsupported output format '{}' (expected one of {})", f, known.join(", "))
        });
    }
    Ok(output.and_then(SaveFormat::from_path).unwrap_or_default())
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir` (input stem + format extension)
/// 3. Next to the input, with `_out` appended if it would overwrite it
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: SaveFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}
