//! Procedural chart renderer.
//!
//! Draws a deterministic star chart straight from tile coordinates: every
//! hex hashes to a stable "has a star / star class" decision, so any tile
//! can be rendered in isolation and adjacent tiles always agree at their
//! edges. The content epoch is folded into the hash, which makes an epoch
//! bump reshuffle the chart and exercises cache invalidation end to end.

use hexatlas::coord::{WorldRect, GRID_SCALE_X, GRID_SCALE_Y};
use hexatlas::tile::RenderOptions;
use hexatlas::{ChartStyle, Fingerprint, RenderError, Renderer, TileSurface};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Rect, Stroke, Transform};

/// Style palette: background, grid, star, route, label accent.
struct Palette {
    background: Color,
    grid: Color,
    star: Color,
    route: Color,
    label: Color,
}

fn palette(style: ChartStyle) -> Palette {
    match style {
        ChartStyle::Poster => Palette {
            background: Color::from_rgba8(0x10, 0x12, 0x1A, 0xFF),
            grid: Color::from_rgba8(0x2A, 0x2E, 0x3C, 0xFF),
            star: Color::from_rgba8(0xF2, 0xE9, 0xC8, 0xFF),
            route: Color::from_rgba8(0x4C, 0x8A, 0xC0, 0xFF),
            label: Color::from_rgba8(0x8F, 0x96, 0xA8, 0xFF),
        },
        ChartStyle::Print => Palette {
            background: Color::from_rgba8(0xFC, 0xFB, 0xF4, 0xFF),
            grid: Color::from_rgba8(0xC8, 0xC4, 0xB4, 0xFF),
            star: Color::from_rgba8(0x20, 0x20, 0x24, 0xFF),
            route: Color::from_rgba8(0x50, 0x50, 0x58, 0xFF),
            label: Color::from_rgba8(0x70, 0x6C, 0x60, 0xFF),
        },
        ChartStyle::Atlas => Palette {
            background: Color::from_rgba8(0x18, 0x22, 0x2C, 0xFF),
            grid: Color::from_rgba8(0x2E, 0x40, 0x50, 0xFF),
            star: Color::from_rgba8(0xE8, 0xD8, 0x90, 0xFF),
            route: Color::from_rgba8(0x68, 0xB0, 0x88, 0xFF),
            label: Color::from_rgba8(0x90, 0xA8, 0xB8, 0xFF),
        },
        ChartStyle::Draft => Palette {
            background: Color::from_rgba8(0x20, 0x20, 0x20, 0xFF),
            grid: Color::from_rgba8(0x40, 0x40, 0x40, 0xFF),
            star: Color::from_rgba8(0xC0, 0xC0, 0xC0, 0xFF),
            route: Color::from_rgba8(0x80, 0x80, 0x80, 0xFF),
            label: Color::from_rgba8(0x60, 0x60, 0x60, 0xFF),
        },
    }
}

/// splitmix64 over the hex address and content epoch.
fn cell_hash(hx: i64, hy: i64, epoch: u64) -> u64 {
    let mut z = (hx as u64)
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .wrapping_add((hy as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9))
        .wrapping_add(epoch.wrapping_mul(0x94D0_49BB_1331_11EB));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn has_star(hx: i64, hy: i64, epoch: u64) -> bool {
    cell_hash(hx, hy, epoch) % 100 < 45
}

/// World center of hex `(hx, hy)`; inverse of the address mapping.
fn hex_center(hx: i64, hy: i64) -> (f64, f64) {
    let offset = if hx.rem_euclid(2) == 0 { 0.5 } else { -0.5 };
    (hx as f64, hy as f64 - offset)
}

/// Stateless procedural renderer for the demo chart.
pub struct ChartRenderer;

impl ChartRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for ChartRenderer {
    fn render(
        &self,
        world: WorldRect,
        linear_scale: f64,
        fingerprint: Fingerprint,
        surface: &mut TileSurface,
    ) -> Result<(), RenderError> {
        let colors = palette(fingerprint.style);
        let epoch = fingerprint.content_epoch;
        let pixmap = surface.pixmap_mut();
        pixmap.fill(colors.background);

        // Local pixel projection for this tile.
        let sx = linear_scale * GRID_SCALE_X;
        let sy = linear_scale * GRID_SCALE_Y;
        let to_px = |wx: f64, wy: f64| {
            (
                ((wx - world.min.x) * sx) as f32,
                ((wy - world.min.y) * sy) as f32,
            )
        };

        // One hex of margin so edge-straddling marks draw on both tiles.
        let x_lo = world.min.x.floor() as i64 - 1;
        let x_hi = world.max.x.ceil() as i64 + 1;
        let y_lo = world.min.y.floor() as i64 - 1;
        let y_hi = world.max.y.ceil() as i64 + 1;

        let opts = fingerprint.options;
        let star_px = (0.14 * linear_scale).max(0.75) as f32;

        for hx in x_lo..=x_hi {
            for hy in y_lo..=y_hi {
                let (cx, cy) = hex_center(hx, hy);
                let (px, py) = to_px(cx, cy);
                let hash = cell_hash(hx, hy, epoch);

                if opts.contains(RenderOptions::HEX_GRID) {
                    draw_hex_outline(pixmap, px, py, linear_scale, colors.grid);
                }

                if !has_star(hx, hy, epoch) {
                    continue;
                }

                if opts.contains(RenderOptions::ROUTES) {
                    // A route runs to the eastern neighbor when both ends
                    // exist and the western end's hash elects it.
                    if has_star(hx + 1, hy, epoch) && hash & 0b110 != 0 {
                        let (nx, ny) = hex_center(hx + 1, hy);
                        let (qx, qy) = to_px(nx, ny);
                        draw_line(pixmap, px, py, qx, qy, star_px * 0.35, colors.route);
                    }
                }

                let radius = star_px * (0.7 + (hash >> 8 & 0x3) as f32 * 0.2);
                if let Some(circle) = PathBuilder::from_circle(px, py, radius) {
                    let mut paint = Paint::default();
                    paint.set_color(colors.star);
                    paint.anti_alias = true;
                    pixmap.fill_path(&circle, &paint, FillRule::Winding, Transform::identity(), None);
                }

                if opts.contains(RenderOptions::NAMES) && linear_scale >= 16.0 {
                    // Stand-in label bar below the star.
                    let w = star_px * (2.0 + (hash >> 16 & 0x7) as f32 * 0.5);
                    if let Some(rect) =
                        Rect::from_xywh(px - w / 2.0, py + radius * 2.0, w, star_px * 0.4)
                    {
                        let mut paint = Paint::default();
                        paint.set_color(colors.label);
                        pixmap.fill_rect(rect, &paint, Transform::identity(), None);
                    }
                }
            }
        }

        if opts.contains(RenderOptions::BORDERS) {
            draw_subsector_borders(pixmap, &world, sx, sy, colors.route);
        }

        Ok(())
    }
}

fn draw_line(
    pixmap: &mut tiny_skia::Pixmap,
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    width: f32,
    color: Color,
) {
    let mut pb = PathBuilder::new();
    pb.move_to(x0, y0);
    pb.line_to(x1, y1);
    let Some(path) = pb.finish() else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(color);
    paint.anti_alias = true;
    let stroke = Stroke {
        width,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

fn draw_hex_outline(pixmap: &mut tiny_skia::Pixmap, cx: f32, cy: f32, scale: f64, color: Color) {
    // Flat-top hexagon sized to the unit column spacing.
    let rx = (0.577 * scale * GRID_SCALE_X) as f32;
    let ry = (0.577 * scale * GRID_SCALE_Y) as f32;
    let mut pb = PathBuilder::new();
    for i in 0..6 {
        let angle = std::f32::consts::FRAC_PI_3 * i as f32;
        let (x, y) = (cx + rx * angle.cos(), cy + ry * angle.sin());
        if i == 0 {
            pb.move_to(x, y);
        } else {
            pb.line_to(x, y);
        }
    }
    pb.close();
    let Some(path) = pb.finish() else {
        return;
    };
    let mut paint = Paint::default();
    paint.set_color(color);
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
}

/// Faint 8x10-hex subsector frame lines.
fn draw_subsector_borders(
    pixmap: &mut tiny_skia::Pixmap,
    world: &WorldRect,
    sx: f64,
    sy: f64,
    color: Color,
) {
    const SUB_W: f64 = 8.0;
    const SUB_H: f64 = 10.0;
    let mut x = (world.min.x / SUB_W).floor() * SUB_W;
    while x <= world.max.x {
        let px = ((x - world.min.x) * sx) as f32;
        draw_line(pixmap, px, 0.0, px, pixmap.height() as f32, 1.0, color);
        x += SUB_W;
    }
    let mut y = (world.min.y / SUB_H).floor() * SUB_H;
    while y <= world.max.y {
        let py = ((y - world.min.y) * sy) as f32;
        draw_line(pixmap, 0.0, py, pixmap.width() as f32, py, 1.0, color);
        y += SUB_H;
    }
}
