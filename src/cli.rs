// ============================================================================
// paintcore CLI: headless flatten / convert via command-line arguments
// ============================================================================
//
// Usage examples:
//   paintcore -i drawing.pcp -o drawing.png
//   paintcore -i drawing.pcp -o flat.jpg --scale 0.5
//   paintcore -i *.png --output-dir projects/ --format pcp
//   paintcore -i a.pcp b.pcp --output-dir out/ --transparent
//
// Everything runs synchronously; no window is ever opened.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::io::{encode_and_write, flatten_for_export, load_image_sync, save_project, ExportFormat, ExportOptions};
use crate::settings::EngineSettings;

#[cfg(test)]
#[path = "cli_test.rs"]
mod cli_test;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// paintcore headless layer flattener.
#[derive(Parser, Debug)]
#[command(
    name = "paintcore",
    about = "Flatten paintcore projects and convert images without a UI",
    long_about = "Load .pcp projects or raster images, composite their visible layers\n\
                  and write PNG, JPEG or .pcp output.\n\n\
                  Example:\n  \
                  paintcore -i drawing.pcp -o drawing.png\n  \
                  paintcore -i *.pcp --output-dir out/ --format jpeg --scale 0.5"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.pcp", "shots/*.png").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, pcp.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Scale factor applied to flattened output.
    #[arg(long, value_name = "FACTOR")]
    pub scale: Option<f32>,

    /// Keep transparency instead of flattening onto white.
    #[arg(long)]
    pub transparent: bool,

    /// Print per-file timing and mirror the session log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Where a converted file ends up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Image(ExportFormat),
    Project,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Image(f) => f.extension(),
            OutputFormat::Project => crate::io::PROJECT_EXTENSION,
        }
    }

    fn from_name(name: &str) -> OutputFormat {
        match name.to_lowercase().as_str() {
            "jpeg" | "jpg" => OutputFormat::Image(ExportFormat::Jpeg),
            "pcp" => OutputFormat::Project,
            _ => OutputFormat::Image(ExportFormat::Png),
        }
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing with the user's saved settings and return an OS
/// exit code.  `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    run_with_settings(args, &EngineSettings::load())
}

/// `run` with explicit settings (export scale and transparency defaults).
pub fn run_with_settings(args: CliArgs, settings: &EngineSettings) -> ExitCode {
    crate::logger::set_echo(args.verbose);

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

    let format = parse_format(args.format.as_deref(), args.output.as_deref());
    let options = ExportOptions {
        scale: args.scale.unwrap_or(settings.export_scale),
        transparent: args.transparent || settings.export_transparent,
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

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
            format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, format, options) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                log_err!("CLI: {} failed: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(input: &Path, output: &Path, format: OutputFormat, options: ExportOptions) -> Result<(), String> {
    let stack = load_image_sync(input).map_err(|e| format!("load failed: {}", e))?;

    match format {
        OutputFormat::Project => {
            save_project(&stack, output).map_err(|e| format!("project save failed: {}", e))?;
        }
        OutputFormat::Image(image_format) => {
            let flat = flatten_for_export(&stack, options).map_err(|e| format!("export failed: {}", e))?;
            encode_and_write(&flat, output, image_format).map_err(|e| format!("save failed: {}", e))?;
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

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

/// Pick the output format from `--format`, else the output extension,
/// else PNG.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> OutputFormat {
    if let Some(f) = format_arg {
        return OutputFormat::from_name(f);
    }
    if let Some(ext) = output.and_then(|o| o.extension()).and_then(|e| e.to_str()) {
        return OutputFormat::from_name(ext);
    }
    OutputFormat::Image(ExportFormat::Png)
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: OutputFormat,
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

    // Avoid silent overwrite of the input
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}
