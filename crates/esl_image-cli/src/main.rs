//! eslraw - Decode OpenEPaperLink raw image files
//!
//! A command-line tool for turning the raw block streams served by an
//! OpenEPaperLink access point into viewable images.

use clap::{Args, Parser, Subcommand, ValueEnum};
use esl_image::{
    decode_raw_with_stats, to_image_with_options, Blocks, ColorTable, DisplayDescriptor,
    EncodeOptions, OutputFormat, Rgb, Rotation,
};
use serde::Deserialize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "eslraw")]
#[command(version)]
#[command(about = "Decode OpenEPaperLink raw image files", long_about = None)]
struct Cli {
    /// Log every block as it is decoded
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a raw file to an image
    Decode {
        /// Input raw file (use - for stdin)
        input: PathBuf,

        /// Output image file (default: input with .jpg or .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output image format
        #[arg(short, long, value_enum, default_value_t = Format::Jpeg)]
        format: Format,

        /// JPEG quality (1-100)
        #[arg(short, long, default_value = "95")]
        quality: u8,

        #[command(flatten)]
        display: DisplayArgs,
    },

    /// Write the assembled bitmap without color mapping
    Raw {
        /// Input raw file (use - for stdin)
        input: PathBuf,

        /// Output bitmap file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        display: DisplayArgs,
    },

    /// List the blocks in a raw file
    Info {
        /// Input raw file (use - for stdin)
        input: PathBuf,

        #[command(flatten)]
        display: DisplayArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Jpeg,
    Png,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Jpeg => OutputFormat::Jpeg,
            Format::Png => OutputFormat::Png,
        }
    }
}

#[derive(Args)]
struct DisplayArgs {
    /// Tag type JSON file as published by the access point
    #[arg(short, long, conflicts_with_all = ["width", "height", "bpp", "rotate", "colors"])]
    tag_type: Option<PathBuf>,

    /// Display width in pixels
    #[arg(long, required_unless_present = "tag_type")]
    width: Option<usize>,

    /// Display height in pixels
    #[arg(long, required_unless_present = "tag_type")]
    height: Option<usize>,

    /// Bits per pixel (1-2 for bit-planes, 3-8 for packed indices)
    #[arg(long, default_value = "1")]
    bpp: u8,

    /// Buffer rotation code (0-3, in steps of 90 degrees)
    #[arg(long, default_value = "0")]
    rotate: u8,

    /// Color table entry as name=r,g,b, in index order (repeatable).
    /// Defaults to white, black and, for 2 bpp, red.
    #[arg(long = "color", value_parser = parse_color)]
    colors: Vec<(String, Rgb)>,
}

/// The access point's tag type description.
#[derive(Deserialize)]
struct TagType {
    #[serde(default)]
    name: String,
    width: usize,
    height: usize,
    bpp: u8,
    #[serde(default)]
    rotatebuffer: u8,
    colortable: serde_json::Map<String, serde_json::Value>,
}

impl DisplayArgs {
    fn descriptor(&self) -> Result<DisplayDescriptor, Box<dyn std::error::Error>> {
        if let Some(path) = &self.tag_type {
            return load_tag_type(path);
        }

        let (Some(width), Some(height)) = (self.width, self.height) else {
            return Err("--width and --height are required without --tag-type".into());
        };

        let table = if self.colors.is_empty() {
            let mut table = ColorTable::black_white();
            if self.bpp == 2 {
                table.insert("red", Rgb::new(255, 0, 0));
            }
            table
        } else {
            self.colors.iter().cloned().collect()
        };

        Ok(DisplayDescriptor::new(width, height, self.bpp)
            .with_rotation(Rotation::try_from(self.rotate)?)
            .with_color_table(table))
    }
}

fn load_tag_type(path: &Path) -> Result<DisplayDescriptor, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
    let tag: TagType = serde_json::from_str(&text)
        .map_err(|e| format!("Invalid tag type '{}': {}", path.display(), e))?;

    let mut table = ColorTable::new();
    for (name, value) in tag.colortable {
        let rgb: [u8; 3] = serde_json::from_value(value)
            .map_err(|e| format!("Invalid color '{}': {}", name, e))?;
        table.insert(name, Rgb::from(rgb));
    }

    Ok(DisplayDescriptor::new(tag.width, tag.height, tag.bpp)
        .with_name(tag.name)
        .with_rotation(Rotation::try_from(tag.rotatebuffer)?)
        .with_color_table(table))
}

fn parse_color(arg: &str) -> Result<(String, Rgb), String> {
    let (name, rgb) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected name=r,g,b, got '{arg}'"))?;
    let channels = rgb
        .split(',')
        .map(|c| c.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid channel in '{arg}': {e}"))?;
    match channels.as_slice() {
        [r, g, b] => Ok((name.to_string(), Rgb::new(*r, *g, *b))),
        _ => Err(format!("expected three channels in '{arg}'")),
    }
}

fn read_input(input: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if input.to_string_lossy() == "-" {
        let mut buf = Vec::new();
        io::stdin().read_to_end(&mut buf)?;
        Ok(buf)
    } else {
        Ok(fs::read(input).map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Commands::Decode {
            input,
            output,
            format,
            quality,
            display,
        } => {
            let display = display.descriptor()?;
            let data = read_input(&input)?;

            let opts = EncodeOptions {
                format: format.into(),
                quality: quality.clamp(1, 100),
            };
            let encoded = to_image_with_options(&data, &display, &opts)?;

            let output_path = output.unwrap_or_else(|| {
                let mut p = if input.to_string_lossy() == "-" {
                    PathBuf::from("out")
                } else {
                    input.clone()
                };
                p.set_extension(match format {
                    Format::Jpeg => "jpg",
                    Format::Png => "png",
                });
                p
            });
            fs::write(&output_path, &encoded)?;

            eprintln!(
                "Decoded: {}x{} pixels -> '{}'",
                display.width,
                display.height,
                output_path.display()
            );
        }

        Commands::Raw {
            input,
            output,
            display,
        } => {
            let display = display.descriptor()?;
            let data = read_input(&input)?;
            let (bitmap, stats) = decode_raw_with_stats(&data, &display)?;

            eprintln!(
                "Assembled {} bytes ({} applied, {} skipped, {} failed)",
                bitmap.len(),
                stats.applied,
                stats.skipped,
                stats.failed
            );

            match output {
                Some(path) => fs::write(&path, &bitmap)?,
                None => io::stdout().write_all(&bitmap)?,
            }
        }

        Commands::Info { input, display } => {
            let display = display.descriptor()?;
            display.validate()?;
            let data = read_input(&input)?;
            let (width, height) = display.effective_dimensions();

            println!(
                "{} bytes, transport {}x{} at {} bpp, {} bytes per row",
                data.len(),
                width,
                height,
                display.bits_per_pixel,
                display.bytes_per_row()
            );

            for block in Blocks::new(&data, display.bytes_per_row()) {
                match block {
                    Ok(block) => {
                        let header = block.header();
                        println!(
                            "block {:>3}: {:<4} {:>6} -> {:>6} bytes  rows {}..{}  fmt 0x{:02X} flags 0x{:02X}",
                            block.index,
                            block.codec.as_str(),
                            block.payload_len,
                            block.as_bytes().len(),
                            header.start_row,
                            header.start_row as usize + header.row_count as usize,
                            header.format,
                            header.flags
                        );
                    }
                    Err(e) => {
                        log::warn!("{e}");
                        println!("error: {e}");
                    }
                }
            }
        }
    }

    Ok(())
}
