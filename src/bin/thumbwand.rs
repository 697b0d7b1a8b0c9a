use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use log::LevelFilter;
use serde::Serialize;

use thumbwand::client::{
    fetch_image, ClientConfig, EditConfig, EnhanceResponse, GeminiClient, GenerationResponse,
    ReplicateClient, SearchClient, SearchResponse,
};
use thumbwand::{
    highlight_selection, render_mask, select_by_similarity, Editor, PixelBuffer, Point, Rectangle,
    Result, CANVAS_HEIGHT, CANVAS_WIDTH, DEFAULT_THRESHOLD,
};

#[derive(Parser)]
#[command(
    name = "thumbwand",
    about = "Select regions of 1280x720 thumbnails and repaint them with AI inpainting",
    version,
    after_help = "API keys are read from REPLICATE_API_KEY, GEMINI_API_KEY and SERPAPI_KEY,\n\
                  or from the JSON file given with --config."
)]
struct Cli {
    /// JSON file with provider settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cover-fit an image to the 1280x720 canvas
    Fit {
        /// Input image
        input: PathBuf,
        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Magic wand: highlight every pixel similar to the seed colour
    Wand {
        /// Input image (fitted to the canvas first)
        input: PathBuf,
        /// Seed column
        #[arg(short)]
        x: i32,
        /// Seed row
        #[arg(short)]
        y: i32,
        /// Maximum RGB distance from the seed colour
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f32,
        /// Output PNG with the selection highlighted
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render a rectangle inpainting mask
    Mask {
        /// Rectangle as x,y,width,height (negative extents allowed)
        #[arg(long, value_parser = parse_rect, allow_hyphen_values = true)]
        rect: Rectangle,
        /// Mask width
        #[arg(long, default_value_t = CANVAS_WIDTH)]
        width: u32,
        /// Mask height
        #[arg(long, default_value_t = CANVAS_HEIGHT)]
        height: u32,
        /// Output PNG
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Generate a new image from a prompt
    Generate {
        /// What to generate
        prompt: String,
    },

    /// Repaint a rectangle of an image
    Edit {
        /// Input image (fitted to the canvas first)
        input: PathBuf,
        /// Rectangle as x,y,width,height (negative extents allowed)
        #[arg(long, value_parser = parse_rect, allow_hyphen_values = true)]
        rect: Rectangle,
        /// What to paint into the rectangle
        prompt: String,
        /// Download the edited image and save it here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Suggest richer variations of a prompt
    Enhance {
        /// Prompt to expand
        prompt: String,
    },

    /// Search YouTube for reference thumbnails
    Search {
        /// Search terms
        query: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Error
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    match run(cli.command, &config) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let base = match path {
        Some(p) => ClientConfig::load(p)?,
        None => ClientConfig::default(),
    };
    Ok(base.with_env())
}

/// Run one subcommand. `Ok(false)` means a provider call failed and its
/// error body was already printed.
fn run(command: Command, config: &ClientConfig) -> Result<bool> {
    match command {
        Command::Fit { input, output } => {
            let buffer = PixelBuffer::open(&input)?;
            buffer.as_image().save(&output)?;
            eprintln!("[OK] {} -> {}", input.display(), output.display());
        }

        Command::Wand {
            input,
            x,
            y,
            threshold,
            output,
        } => {
            let buffer = PixelBuffer::open(&input)?;
            let selection = select_by_similarity(&buffer, Point::new(x, y), threshold)?;
            highlight_selection(&buffer, &selection)?.save(&output)?;
            #[allow(clippy::cast_precision_loss)]
            let share = selection.count() as f64 / selection.as_slice().len() as f64;
            eprintln!(
                "[OK] selected {} pixels ({:.1}%) -> {}",
                selection.count(),
                share * 100.0,
                output.display()
            );
        }

        Command::Mask {
            rect,
            width,
            height,
            output,
        } => {
            let mask = render_mask(width, height, rect)?;
            std::fs::write(&output, &mask.png)?;
            eprintln!("[OK] {width}x{height} mask -> {}", output.display());
        }

        Command::Generate { prompt } => {
            let client = ReplicateClient::new(config.clone());
            let result = client.generate(&prompt);
            return print_generation(&result);
        }

        Command::Edit {
            input,
            rect,
            prompt,
            output,
        } => {
            let mut editor = Editor::new();
            editor.open(PixelBuffer::open(&input)?)?;
            editor.pointer_down(Point::new(rect.x, rect.y))?;
            editor.pointer_move(Point::new(
                rect.x.saturating_add(rect.width),
                rect.y.saturating_add(rect.height),
            ))?;
            editor.pointer_up()?;

            let (token, request) = editor.begin_edit(&prompt)?;
            let client = ReplicateClient::new(config.clone());
            let result = client.edit(&request, &EditConfig::from_client(config));
            let ok = print_generation(&result)?;
            if !ok {
                return Ok(false);
            }
            editor.finish(token, result)?;
            if let Some(output) = output {
                if let Some(url) = editor.pending_reload().map(|v| v.image_url.clone()) {
                    editor.load_current(fetch_image(config, &url)?)?;
                }
                if let Some(buffer) = editor.buffer() {
                    buffer.as_image().save(&output)?;
                    eprintln!("[OK] edited image -> {}", output.display());
                }
            }
        }

        Command::Enhance { prompt } => {
            let client = GeminiClient::new(config.clone());
            let enhanced_prompts = client.enhance(&prompt)?;
            print_json(&EnhanceResponse { enhanced_prompts })?;
        }

        Command::Search { query } => {
            let client = SearchClient::new(config.clone());
            let videos = client.search(&query)?;
            print_json(&SearchResponse { videos })?;
        }
    }
    Ok(true)
}

fn print_generation(result: &Result<String>) -> Result<bool> {
    let (status, body) = GenerationResponse::from_result(result);
    print_json(&body)?;
    if let Err(e) = result {
        log::error!("request failed ({status}): {e}");
    }
    Ok(status == 200)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_rect(s: &str) -> std::result::Result<Rectangle, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [x, y, w, h] = *parts.as_slice() else {
        return Err(format!("expected x,y,width,height, got {s:?}"));
    };
    let num = |v: &str| {
        v.parse::<i32>()
            .map_err(|e| format!("invalid number {v:?}: {e}"))
    };
    Ok(Rectangle::new(num(x)?, num(y)?, num(w)?, num(h)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rect_accepts_negative_extents() {
        assert_eq!(
            parse_rect("100, 100, -50, -50").unwrap(),
            Rectangle::new(100, 100, -50, -50)
        );
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_rect("1,2,3,x").is_err());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "thumbwand", "mask", "--rect", "-5,0,10,10", "-o", "m.png",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Mask { width: 1280, .. }));

        let cli = Cli::try_parse_from([
            "thumbwand", "edit", "in.png", "--rect", "10,10,-5,-5", "a hat", "-o", "out.png",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Edit { output: Some(_), .. }));
    }
}
