// SPDX-License-Identifier: MPL-2.0

use clap::Parser;
use stillbg_config::{Entry, FilterMethod, Mode, OutputSelector};
use stillbg_lib::engine::{BackgroundEngine, EngineConfig};
use tracing_subscriber::prelude::*;

/// stillbg - static background image or color for Wayland outputs
#[derive(Parser, Debug)]
#[command(name = "stillbg")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Index of the output to draw on, or `*` for every output
    output: OutputSelector,

    /// Image path, or a #rrggbb color when the mode is solid_color
    source: String,

    /// One of solid_color, stretch, fill, fit, center or tile
    mode: Mode,

    /// Resampling filter for scaled images: nearest, linear or lanczos
    #[arg(long, default_value = "lanczos")]
    filter: FilterMethod,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    if std::env::var("RUST_SPANTRACE").is_err() {
        unsafe {
            std::env::set_var("RUST_SPANTRACE", "0");
        }
    }

    init_logger();

    let args = Args::parse();

    let entry = Entry::from_args(args.output, &args.source, args.mode)?.filter_method(args.filter);

    BackgroundEngine::run(EngineConfig::new(entry))?;

    Ok(())
}

fn init_logger() {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);

    let log_format = tracing_subscriber::fmt::format()
        .pretty()
        .without_time()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_thread_names(true);

    let log_filter = tracing_subscriber::fmt::Layer::default()
        .with_writer(std::io::stderr)
        .event_format(log_format)
        .with_filter(tracing_subscriber::filter::filter_fn(move |metadata| {
            metadata.level() == &tracing::Level::ERROR
                || (metadata.target().starts_with("stillbg") && metadata.level() <= &log_level)
        }));

    tracing_subscriber::registry().with(log_filter).init();
}
