// ============================================================================
// Retouch CLI: headless edit sessions driven by command-line arguments
// ============================================================================
//
// Usage examples:
//   retouch -i photo.png --filter sepia -o result.png
//   retouch -i photo.jpg --adjust brightness=20 --adjust contrast=15 -o out.jpg
//   retouch -i *.jpg --auto-enhance --upscale 2 --output-dir processed/
//   retouch -i shot.png --crop 100,50,100,50 --display 500x250 --dpr 2 -o crop.png
//   retouch -i card.png --text "Hello" --text-at 40,40 --color #ff8000 -o card.png
//
// Every step is one committed edit in a fresh session per input; the result
// is flattened and exported at the end.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;

use crate::components::layers::{parse_hex_color, LayerPatch};
use crate::error::{EditError, EditResult};
use crate::geometry::{Point, Rect, Size};
use crate::io::{load_raster, ExportFormat, FileExportSink};
use crate::ops::collaborator::LocalCollaborator;
use crate::ops::text::GlyphRenderer;
use crate::session::Session;
use crate::settings::Settings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Retouch headless image editor.
#[derive(Parser, Debug)]
#[command(
    name = "retouch",
    about = "Retouch headless image editor",
    long_about = "Apply filters, adjustments, crops and text overlays to image files\n\
                  through a non-destructive edit session, then export the flattened\n\
                  result. Supports PNG, JPEG, WEBP and BMP.\n\n\
                  Example:\n  \
                  retouch -i photo.png --filter sepia --text \"Hi\" -o result.png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, webp, bmp. Inferred from --output when omitted.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100).
    #[arg(short, long, default_value_t = 90, value_name = "1-100")]
    pub quality: u8,

    /// Named filter: grayscale, sepia, invert, blur, sharpen.
    #[arg(long, value_name = "NAME")]
    pub filter: Option<String>,

    /// Global adjustment, repeatable: brightness, contrast, saturation,
    /// exposure, temperature.
    #[arg(long, value_name = "KEY=VALUE")]
    pub adjust: Vec<String>,

    /// Stretch each channel's tonal range.
    #[arg(long)]
    pub auto_enhance: bool,

    /// Upscale by an integer factor. Without N the settings default is used.
    #[arg(long, value_name = "N", num_args = 0..=1, value_parser = clap::value_parser!(u32).range(2..=8))]
    pub upscale: Option<Option<u32>>,

    /// Crop selection in display space.
    #[arg(long, value_name = "X,Y,W,H")]
    pub crop: Option<String>,

    /// Displayed image size the crop selection refers to (default: natural size).
    #[arg(long, value_name = "WxH")]
    pub display: Option<String>,

    /// Text overlay, merged before export.
    #[arg(long, value_name = "TEXT")]
    pub text: Option<String>,

    /// Top-left position of the text overlay in image pixels.
    #[arg(long, value_name = "X,Y")]
    pub text_at: Option<String>,

    #[arg(long, value_name = "PX")]
    pub font_size: Option<f32>,

    #[arg(long, value_name = "#RRGGBB")]
    pub color: Option<String>,

    /// Device pixel ratio applied to crop output.
    #[arg(long, value_name = "F")]
    pub dpr: Option<f32>,

    /// Print per-file timing and history.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs, settings: &Settings) -> ExitCode {
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

    let plan = match EditPlan::from_args(&args, settings) {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let format = parse_format(args.format.as_deref(), args.output.as_deref());

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let renderer = Arc::new(GlyphRenderer::new());
    let collaborator = Arc::new(LocalCollaborator::new());

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), format)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        let mut session = Session::new(settings, collaborator.clone(), renderer.clone());
        if let Some(dpr) = args.dpr {
            session.set_device_pixel_ratio(dpr);
        }

        let mut sink = FileExportSink::with_format(&output_path, format);
        sink.quality = args.quality;

        match run_one(&mut session, input_path, &plan, &sink) {
            Ok(()) => {
                if args.verbose {
                    for (i, desc) in session.history().descriptions().iter().enumerate() {
                        println!("  {}. {}", i + 1, desc);
                    }
                }
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file edit pipeline
// ============================================================================

/// Parsed, validated edit steps shared by every input.
#[derive(Debug, Default, PartialEq)]
pub struct EditPlan {
    pub filter: Option<String>,
    pub adjustments: Vec<String>,
    pub auto_enhance: bool,
    pub upscale: Option<u32>,
    pub crop: Option<Rect>,
    pub display: Option<Size>,
    pub text: Option<TextPlan>,
}

#[derive(Debug, PartialEq)]
pub struct TextPlan {
    pub content: String,
    pub position: Option<Point>,
    pub font_size: Option<f32>,
    pub color: Option<[u8; 4]>,
}

impl EditPlan {
    pub fn from_args(args: &CliArgs, settings: &Settings) -> Result<Self, String> {
        for adj in &args.adjust {
            if !adj.contains('=') {
                return Err(format!("--adjust expects KEY=VALUE, got '{}'", adj));
            }
        }

        let crop = match &args.crop {
            Some(s) => match parse_floats(s, ',').as_deref() {
                Some(&[x, y, w, h]) => Some(Rect::new(x, y, w, h)),
                _ => return Err(format!("--crop expects X,Y,W,H, got '{}'", s)),
            },
            None => None,
        };
        let display = match &args.display {
            Some(s) => match parse_floats(s, 'x').as_deref() {
                Some(&[w, h]) => Some(Size::new(w, h)),
                _ => return Err(format!("--display expects WxH, got '{}'", s)),
            },
            None => None,
        };

        let text = match &args.text {
            Some(content) => {
                let position = match &args.text_at {
                    Some(s) => match parse_floats(s, ',').as_deref() {
                        Some(&[x, y]) => Some(Point::new(x, y)),
                        _ => return Err(format!("--text-at expects X,Y, got '{}'", s)),
                    },
                    None => None,
                };
                let color = match &args.color {
                    Some(s) => Some(parse_hex_color(s).ok_or_else(|| format!("invalid --color '{}'", s))?),
                    None => None,
                };
                Some(TextPlan { content: content.clone(), position, font_size: args.font_size, color })
            }
            None => None,
        };

        Ok(Self {
            filter: args.filter.clone(),
            adjustments: args.adjust.clone(),
            auto_enhance: args.auto_enhance,
            upscale: args.upscale.map(|n| n.unwrap_or(settings.upscale_factor)),
            crop,
            display,
            text,
        })
    }
}

fn run_one(session: &mut Session, input: &Path, plan: &EditPlan, sink: &FileExportSink) -> EditResult<()> {
    let raster = load_raster(input)?;
    let name = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Original")
        .to_string();
    session.load_image(raster, name)?;

    if let Some(filter) = &plan.filter {
        session.apply_filter(filter)?;
        session.wait()?;
    }
    if !plan.adjustments.is_empty() {
        session.apply_adjustment(&plan.adjustments.join(" "))?;
        session.wait()?;
    }
    if plan.auto_enhance {
        session.auto_enhance()?;
        session.wait()?;
    }
    if let Some(factor) = plan.upscale {
        session.upscale(factor)?;
        session.wait()?;
    }

    if let Some(region) = plan.crop {
        let natural = session
            .current()
            .map(|r| Size::from_pixels(r.width(), r.height()))
            .ok_or(EditError::NoImageLoaded)?;
        session.set_crop_region(region);
        session.apply_crop(plan.display.unwrap_or(natural))?;
    }

    if let Some(text) = &plan.text {
        let id = session.add_text_layer()?;
        let patch = LayerPatch {
            content: Some(text.content.clone()),
            font_size: text.font_size,
            color: text.color,
            position: text.position,
            ..LayerPatch::default()
        };
        session.update_layer(id, patch);
        session.merge_layers()?;
    }

    session.export(sink)
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_floats(s: &str, sep: char) -> Option<Vec<f32>> {
    s.split(sep).map(|p| p.trim().parse::<f32>().ok()).collect()
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
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// `--format` wins, then the `--output` extension, then PNG.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> ExportFormat {
    if let Some(f) = format_arg {
        return match f.to_lowercase().as_str() {
            "jpeg" | "jpg" => ExportFormat::Jpeg,
            "webp" => ExportFormat::Webp,
            "bmp" => ExportFormat::Bmp,
            _ => ExportFormat::Png,
        };
    }
    output.and_then(ExportFormat::from_path).unwrap_or(ExportFormat::Png)
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: next to the input with the new extension
///    (`_out` appended to the stem if it would overwrite the input)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: ExportFormat,
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
