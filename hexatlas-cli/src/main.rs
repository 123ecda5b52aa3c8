//! Hexatlas CLI - snapshot renderer for the hex-chart tile engine.
//!
//! Renders one fully materialized view of the procedural demo chart to a
//! PNG, exercising the whole pipeline: view state, compositing, background
//! scheduling, cache reuse and placeholder fallback. A saved-view file can
//! carry the camera between invocations.

mod chart;
mod raster;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hexatlas::compositor::FocusTarget;
use hexatlas::coord::{CoordError, Viewport, WorldPoint};
use hexatlas::view::{SavedView, ViewState};
use hexatlas::{
    AtlasConfig, ChartStyle, Compositor, ConfigError, RenderOptions, RenderScheduler, Renderer,
    SchedulerDaemon, TileCache,
};

use chart::ChartRenderer;

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum StyleArg {
    #[default]
    Poster,
    Print,
    Atlas,
    Draft,
}

impl From<StyleArg> for ChartStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Poster => ChartStyle::Poster,
            StyleArg::Print => ChartStyle::Print,
            StyleArg::Atlas => ChartStyle::Atlas,
            StyleArg::Draft => ChartStyle::Draft,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "hexatlas", about = "Render a hex-chart snapshot to PNG")]
struct Cli {
    /// Viewport width in pixels.
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Viewport height in pixels.
    #[arg(long, default_value_t = 768)]
    height: u32,

    /// World-space center, x component (hex columns).
    #[arg(long, default_value_t = 0.0)]
    center_x: f64,

    /// World-space center, y component (hex rows).
    #[arg(long, default_value_t = 0.0)]
    center_y: f64,

    /// Zoom as log2 of pixels per hex column.
    #[arg(long, default_value_t = 5.0)]
    scale: f64,

    /// Visual style.
    #[arg(long, value_enum, default_value_t = StyleArg::Poster)]
    style: StyleArg,

    /// Draw the hex grid.
    #[arg(long)]
    grid: bool,

    /// Draw trade routes.
    #[arg(long)]
    routes: bool,

    /// Draw system labels.
    #[arg(long)]
    names: bool,

    /// Draw subsector borders.
    #[arg(long)]
    borders: bool,

    /// Procedural content epoch; changing it reshuffles the chart.
    #[arg(long, default_value_t = 0)]
    epoch: u64,

    /// Saved-view file to restore from and update.
    #[arg(long)]
    view_file: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long, default_value = "chart.png")]
    output: PathBuf,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = 256)]
    tile_px: u32,

    /// Tile cache capacity in entries.
    #[arg(long, default_value_t = 512)]
    cache_capacity: usize,

    /// Print cache and scheduler statistics after rendering.
    #[arg(long)]
    stats: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid view geometry: {0}")]
    View(#[from] CoordError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode {path}: {message}")]
    Encode { path: PathBuf, message: String },

    #[error("surface allocation failed")]
    Allocation,

    #[error("scheduler daemon panicked: {0}")]
    Daemon(#[from] tokio::task::JoinError),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = AtlasConfig::default()
        .with_tile_px(cli.tile_px)
        .with_cache_capacity(cli.cache_capacity)
        .normalize()?;

    let mut view = ViewState::new(
        &config,
        WorldPoint::new(cli.center_x, cli.center_y),
        cli.scale,
        Viewport::new(cli.width, cli.height),
    )?;
    restore_view(&mut view, cli.view_file.as_deref());

    let mut options = RenderOptions::NONE;
    if cli.grid {
        options = options | RenderOptions::HEX_GRID;
    }
    if cli.routes {
        options = options | RenderOptions::ROUTES;
    }
    if cli.names {
        options = options | RenderOptions::NAMES;
    }
    if cli.borders {
        options = options | RenderOptions::BORDERS;
    }

    let cache = TileCache::shared(config.cache_capacity)?;
    let renderer: Arc<dyn Renderer> = Arc::new(ChartRenderer::new());
    let scheduler = Arc::new(Mutex::new(RenderScheduler::new(
        Arc::clone(&cache),
        renderer,
        config.tile_px,
    )));
    let mut compositor = Compositor::new(&config).ok_or(CliError::Allocation)?;
    {
        let mut guard = scheduler.lock();
        compositor.set_style(cli.style.into(), &mut guard);
        compositor.set_options(options, &mut guard);
        compositor.set_content_epoch(cli.epoch, &mut guard);
    }

    // First pass queues every visible tile as placeholder work.
    let first = compositor.compose(&view, &mut scheduler.lock(), FocusTarget::ViewCenter);
    info!(
        level = first.level,
        missing = first.missing,
        "Initial compositing pass"
    );

    // Materialize in the background, then stop the daemon.
    let shutdown = CancellationToken::new();
    let daemon = SchedulerDaemon::new(Arc::clone(&scheduler))
        .with_interval(Duration::from_millis(1));
    let mut redraw = scheduler.lock().redraw_watch();
    let pump = tokio::spawn(daemon.run(shutdown.clone()));
    loop {
        let idle = scheduler.lock().is_idle();
        if idle {
            break;
        }
        // A failed tile announces no redraw; the timeout re-polls.
        let _ = tokio::time::timeout(Duration::from_millis(50), redraw.changed()).await;
    }
    shutdown.cancel();
    pump.await?;

    // Second pass draws entirely from cache.
    let frame = compositor.compose(&view, &mut scheduler.lock(), FocusTarget::ViewCenter);
    let background = tiny_skia::Color::from_rgba8(0x08, 0x08, 0x0C, 0xFF);
    let pixmap =
        raster::rasterize(&frame, view.viewport(), background).ok_or(CliError::Allocation)?;
    pixmap.save_png(&cli.output).map_err(|e| CliError::Encode {
        path: cli.output.clone(),
        message: e.to_string(),
    })?;
    info!(path = %cli.output.display(), pending = frame.is_pending(), "Snapshot written");

    if let Some(path) = cli.view_file.as_deref() {
        save_view(&view, path)?;
    }

    if cli.stats {
        let cache_stats = cache.lock().stats();
        let scheduler_stats = scheduler.lock().stats();
        println!("{cache_stats}");
        println!(
            "scheduler: enqueued {} coalesced {} materialized {} failed {} superseded {}",
            scheduler_stats.enqueued,
            scheduler_stats.coalesced,
            scheduler_stats.materialized,
            scheduler_stats.render_failures,
            scheduler_stats.superseded,
        );
    }
    Ok(())
}

/// Restore the camera from a saved-view file.
///
/// Any failure (absent file, malformed record, format mismatch) keeps the
/// command-line defaults; a bad saved view must not make a snapshot
/// unreachable.
fn restore_view(view: &mut ViewState, path: Option<&std::path::Path>) {
    let Some(path) = path else {
        return;
    };
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read saved view; using defaults");
            return;
        }
    };
    match SavedView::from_json(&json).and_then(|saved| saved.apply(view)) {
        Ok(_) => info!(path = %path.display(), "Saved view restored"),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Saved view rejected; using defaults")
        }
    }
}

fn save_view(view: &ViewState, path: &std::path::Path) -> Result<(), CliError> {
    let saved = SavedView::capture(view);
    let json = saved.to_json().map_err(|e| CliError::Encode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(path, json)?;
    Ok(())
}
