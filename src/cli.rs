// ============================================================================
// QR Tight Studio CLI - one branded QR code per invocation
// ============================================================================
//
// Usage examples:
//   qr-tight-studio -c https://example.com
//   qr-tight-studio -c https://shop.example -l logo.png --logo-shape square -o shop.png
//   qr-tight-studio -c https://cafe.example -l cup.png --suggest --output-dir out/
//   qr-tight-studio -c hello --no-frame --fg "#111111" --bg "#fafafa"
//
// Everything runs on the current thread except the optional suggestion
// request, which is handed to the rayon pool and awaited over a channel.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Instant;

use clap::Parser;

use crate::ai::{GeminiConfig, GeminiProvider, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS, GEMINI_API_BASE};
use crate::color::Color;
use crate::io::{load_image, write_png};
use crate::logger;
use crate::ops::export::ExportGeometry;
use crate::ops::logo::LogoLayout;
use crate::ops::qr::QR_NATIVE_SIZE;
use crate::ops::text::load_banner_font;
use crate::session::Session;
use crate::style::{FrameVariant, LogoShape, DEFAULT_CONTENT};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Generate a QR code with a logo badge, a tight quiet zone and an optional frame.
#[derive(Parser, Debug)]
#[command(
    name = "qr-tight-studio",
    about = "Branded QR code generator",
    long_about = "Render a high-error-correction QR code with a composited logo badge in the\n\
                  middle, crop it to a tight quiet zone and optionally add a labelled banner\n\
                  or a border. The result is written as PNG.\n\n\
                  Example:\n  \
                  qr-tight-studio -c https://example.com -l logo.png -o code.png\n  \
                  qr-tight-studio -c https://example.com --suggest --output-dir out/"
)]
pub struct CliArgs {
    /// Text or URL to encode.
    #[arg(short, long, default_value = DEFAULT_CONTENT, value_name = "TEXT")]
    pub content: String,

    /// Logo image placed in the middle of the code (PNG, JPEG, WEBP, ...).
    #[arg(short, long, value_name = "FILE")]
    pub logo: Option<PathBuf>,

    /// Badge shape behind the logo.
    #[arg(long, value_enum, ignore_case = true, value_name = "SHAPE")]
    pub logo_shape: Option<LogoShape>,

    /// Badge background color (hex).
    #[arg(long, value_name = "HEX")]
    pub logo_bg: Option<String>,

    /// Badge border color (hex).
    #[arg(long, value_name = "HEX")]
    pub border_color: Option<String>,

    /// Badge border thickness, percent of the badge (0-25).
    #[arg(long, value_name = "PCT")]
    pub border: Option<u8>,

    /// Space between badge edge and logo, percent of the inner shape (0-45).
    #[arg(long, value_name = "PCT")]
    pub padding: Option<u8>,

    /// Badge edge length inside the 2048px code (200-600).
    #[arg(long, value_name = "PX")]
    pub logo_size: Option<u32>,

    /// Draw the badge over the modules instead of clearing them first.
    #[arg(long)]
    pub no_excavate: bool,

    /// Module color (hex).
    #[arg(long, value_name = "HEX")]
    pub fg: Option<String>,

    /// Background color (hex).
    #[arg(long, value_name = "HEX")]
    pub bg: Option<String>,

    /// Export without banner or border.
    #[arg(long)]
    pub no_frame: bool,

    /// Frame variant.
    #[arg(long, value_enum, ignore_case = true, value_name = "STYLE")]
    pub frame_style: Option<FrameVariant>,

    /// Banner label (at most 15 characters, shown uppercase).
    #[arg(long, value_name = "TEXT")]
    pub frame_text: Option<String>,

    /// Banner / border color (hex).
    #[arg(long, value_name = "HEX")]
    pub frame_color: Option<String>,

    /// Banner label color (hex).
    #[arg(long, value_name = "HEX")]
    pub frame_text_color: Option<String>,

    /// Font file for the banner label instead of the system font.
    #[arg(long, value_name = "FILE")]
    pub font: Option<PathBuf>,

    /// Ask the model for a palette and caption before rendering.
    #[arg(long)]
    pub suggest: bool,

    /// API key for --suggest. Falls back to $API_KEY.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Model used for --suggest.
    #[arg(long, default_value = DEFAULT_MODEL, value_name = "MODEL")]
    pub model: String,

    /// API base URL for --suggest.
    #[arg(long, default_value = GEMINI_API_BASE, value_name = "URL")]
    pub api_base: String,

    /// Request timeout for --suggest, in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, value_name = "SECS")]
    pub timeout: u64,

    /// Output file path.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory; the file is named qr-tight-studio-<millis>.png.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Also save the composited logo badge here.
    #[arg(long, value_name = "FILE")]
    pub logo_out: Option<PathBuf>,

    /// Print geometry and timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the pipeline and return an OS exit code.
/// `0` = image written, `1` = anything failed.
pub fn run(args: CliArgs) -> ExitCode {
    if args.verbose {
        logger::set_echo(true);
        if let Some(path) = logger::log_path() {
            println!("log: {}", path.display());
        }
    }

    match run_pipeline(&args) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_err!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_pipeline(args: &CliArgs) -> Result<PathBuf, String> {
    let total_start = Instant::now();
    let mut session = Session::new();

    // -- Step 1: Content, logo and layout --------------------------------
    configure_layout(&mut session, args)?;

    // -- Step 2: Suggestion (optional) -----------------------------------
    if args.suggest {
        request_suggestion(&mut session, args)?;
    }

    // -- Step 3: Explicit colors win over any suggestion -----------------
    configure_colors(&mut session, args)?;

    if args.verbose {
        print_geometry(&session);
    }

    // -- Step 4: Render ---------------------------------------------------
    let step = Instant::now();
    session.render_qr().map_err(|e| e.to_string())?;
    if args.verbose {
        println!("  QR rendered ({:.0}ms)", step.elapsed().as_secs_f64() * 1000.0);
    }

    if let Some(path) = &args.logo_out {
        let badge = session
            .processed_logo()
            .ok_or_else(|| "--logo-out needs a logo (--logo)".to_string())?;
        write_png(badge, path).map_err(|e| format!("could not write '{}': {}", path.display(), e))?;
    }

    // -- Step 5: Export ---------------------------------------------------
    let font = if session.frame_style().is_banner() {
        load_banner_font(args.font.as_deref())
    } else {
        None
    };

    let step = Instant::now();
    let result = session
        .export(font.as_ref())
        .ok_or_else(|| "export produced no image".to_string())?;

    let output_path = build_output_path(args.output.as_deref(), args.output_dir.as_deref(), &result.file_name)?;
    write_png(&result.image, &output_path)
        .map_err(|e| format!("could not write '{}': {}", output_path.display(), e))?;

    if args.verbose {
        println!(
            "  exported {}x{} ({:.0}ms, total {:.0}ms)",
            result.image.width(),
            result.image.height(),
            step.elapsed().as_secs_f64() * 1000.0,
            total_start.elapsed().as_secs_f64() * 1000.0
        );
    }
    log_info!("wrote {}", output_path.display());

    Ok(output_path)
}

// ============================================================================
// Configuration
// ============================================================================

fn configure_layout(session: &mut Session, args: &CliArgs) -> Result<(), String> {
    session.set_content(args.content.clone());
    session.set_excavate(!args.no_excavate);

    if let Some(path) = &args.logo {
        session.set_logo_image(load_image(path)?);
    }

    let logo_bg = parse_color_arg("--logo-bg", args.logo_bg.as_deref())?;
    let border_color = parse_color_arg("--border-color", args.border_color.as_deref())?;
    session.edit_logo_style(|style| {
        if let Some(shape) = args.logo_shape {
            style.shape = shape;
        }
        if let Some(color) = logo_bg {
            style.background_color = color;
        }
        if let Some(color) = border_color {
            style.border_color = color;
        }
        if let Some(border) = args.border {
            style.border_width_percent = border;
        }
        if let Some(padding) = args.padding {
            style.padding_percent = padding;
        }
        if let Some(size) = args.logo_size {
            style.size_pixels = size;
        }
    });

    session.edit_frame(|frame| {
        frame.enabled = !args.no_frame;
        if let Some(variant) = args.frame_style {
            frame.variant = variant;
        }
        if let Some(text) = &args.frame_text {
            frame.text = text.clone();
        }
    });

    Ok(())
}

fn configure_colors(session: &mut Session, args: &CliArgs) -> Result<(), String> {
    if let Some(color) = parse_color_arg("--fg", args.fg.as_deref())? {
        session.set_foreground(color);
    }
    if let Some(color) = parse_color_arg("--bg", args.bg.as_deref())? {
        session.set_background(color);
    }

    let frame_color = parse_color_arg("--frame-color", args.frame_color.as_deref())?;
    let text_color = parse_color_arg("--frame-text-color", args.frame_text_color.as_deref())?;
    session.edit_frame(|frame| {
        if let Some(color) = frame_color {
            frame.frame_color = color;
        }
        if let Some(color) = text_color {
            frame.text_color = color;
        }
    });

    Ok(())
}

fn request_suggestion(session: &mut Session, args: &CliArgs) -> Result<(), String> {
    if session.qr_style().content.is_empty() {
        log_warn!("--suggest ignored: no content to analyse");
        return Ok(());
    }

    let api_key = resolve_api_key(args.api_key.as_deref());
    if api_key.is_empty() {
        log_warn!("no API key (--api-key, GEMINI_API_KEY, API_KEY); the fallback palette will be used");
    }

    let mut config = GeminiConfig::new(api_key);
    config.model = args.model.clone();
    config.base_url = args.api_base.clone();
    config.timeout = std::time::Duration::from_secs(args.timeout);
    let provider = GeminiProvider::new(config).map_err(|e| format!("could not set up suggestions: {}", e))?;

    let (sender, receiver) = mpsc::channel();
    let step = Instant::now();
    if session.spawn_suggestion(Arc::new(provider), sender).is_none() {
        return Err("a suggestion request is already running".to_string());
    }
    let message = receiver
        .recv()
        .map_err(|_| "suggestion worker exited without an answer".to_string())?;

    if session.apply_suggestion(message) {
        if let Some(s) = session.suggestion() {
            println!(
                "suggestion: \"{}\" ({}) palette {}",
                s.suggested_description,
                s.brand_tone,
                s.suggested_colors.join(", ")
            );
        }
    }
    if args.verbose {
        println!("  suggestion ({:.0}ms)", step.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(())
}

fn print_geometry(session: &Session) {
    let frame = session.frame_style().clone();
    let geo = ExportGeometry::compute(QR_NATIVE_SIZE, &frame);
    println!(
        "  export canvas {}x{}, margin {:.2}px, QR at ({}, {})",
        geo.width, geo.height, geo.margin, geo.qr_offset, geo.qr_offset
    );

    let style = *session.logo_style();
    if let Some((w, h)) = session.logo_dimensions() {
        let layout = LogoLayout::compute(&style, w, h);
        println!(
            "  logo {}x{} -> badge {}px ({}), draw area {:.1}px, drawn {:.1}x{:.1}",
            w, h, style.size_pixels, style.shape, layout.draw_area, layout.draw_width, layout.draw_height
        );
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn parse_color_arg(flag: &str, value: Option<&str>) -> Result<Option<Color>, String> {
    value
        .map(|v| v.parse::<Color>().map_err(|e| format!("{} '{}': {}", flag, v, e)))
        .transpose()
}

/// `--api-key` / `$GEMINI_API_KEY`, then `$API_KEY`.  Empty when none is set.
fn resolve_api_key(arg: Option<&str>) -> String {
    arg.map(str::to_string)
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var("API_KEY").ok())
        .unwrap_or_default()
}

/// Compute the output path.
///
/// Priority:
/// 1. `--output` (explicit path)
/// 2. `--output-dir` joined with the generated file name (directory created)
/// 3. The generated file name in the current directory
fn build_output_path(output: Option<&Path>, output_dir: Option<&Path>, file_name: &str) -> Result<PathBuf, String> {
    if let Some(out) = output {
        return Ok(out.to_path_buf());
    }

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("could not create output directory '{}': {}", dir.display(), e))?;
        return Ok(dir.join(file_name));
    }

    Ok(PathBuf::from(file_name))
}
