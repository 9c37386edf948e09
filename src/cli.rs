use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::diagram::load_diagram;
use crate::layout::{compute_layout, LayoutOptions};
use crate::layout_dump::write_layout_dump;
use crate::render::{render_svg, write_output_png, write_output_svg};

#[derive(Parser, Debug)]
#[command(
    name = "orthogram",
    version,
    about = "Draw block diagrams with orthogonal connections"
)]
pub struct Args {
    /// Diagram definition file (YAML, UTF-8)
    pub input: PathBuf,

    /// Output image (.png or .svg). Defaults to the input file name
    /// with the extension replaced by .png.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Write the computed geometry as YAML to this file
    #[arg(long = "dump-layout", value_name = "FILE")]
    pub dump_layout: Option<PathBuf>,
}

pub fn run() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let diagram = load_diagram(&args.input)?;
    let layout = compute_layout(&diagram, &LayoutOptions::default())?;
    let svg = render_svg(&diagram, &layout);

    if let Some(path) = &args.dump_layout {
        write_layout_dump(path, &diagram, &layout)?;
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension("png"));
    let extension = output
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("svg") => write_output_svg(&svg, &output)?,
        _ => write_output_png(&svg, &output)?,
    }
    Ok(())
}
