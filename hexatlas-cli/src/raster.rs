//! Frame rasterization.
//!
//! Turns the compositor's backend-agnostic draw commands into one flat
//! pixmap. Each command maps a source rectangle of a tile surface onto a
//! destination rectangle of the output; fractional zoom and placeholder
//! pieces want bilinear filtering, exact-level blits stay nearest-neighbor.

use hexatlas::coord::{PixelRect, Viewport};
use hexatlas::{DrawCommand, Frame};
use tiny_skia::{
    Color, FillRule, FilterQuality, Mask, PathBuilder, Pixmap, PixmapPaint, Transform,
};

/// Rasterize a frame into a fresh pixmap.
///
/// Returns `None` only for a degenerate viewport.
pub fn rasterize(frame: &Frame, viewport: Viewport, background: Color) -> Option<Pixmap> {
    let mut out = Pixmap::new(viewport.width, viewport.height)?;
    out.fill(background);

    let full = PixelRect::new(0.0, 0.0, viewport.width as f64, viewport.height as f64);
    let clip = frame.clip.and_then(|c| c.intersect(&full)).unwrap_or(full);

    for command in &frame.commands {
        blit(&mut out, command, clip);
    }
    Some(out)
}

fn blit(out: &mut Pixmap, command: &DrawCommand, clip: PixelRect) {
    let src = command.src;
    let dest = command.dest;
    if src.width <= 0.0 || src.height <= 0.0 {
        return;
    }
    let Some(visible) = dest.intersect(&clip) else {
        return;
    };

    // Map source pixels onto the destination rectangle.
    let sx = dest.width / src.width;
    let sy = dest.height / src.height;
    let transform = Transform::from_row(
        sx as f32,
        0.0,
        0.0,
        sy as f32,
        (dest.x - src.x * sx) as f32,
        (dest.y - src.y * sy) as f32,
    );

    let paint = PixmapPaint {
        quality: if command.smoothing {
            FilterQuality::Bilinear
        } else {
            FilterQuality::Nearest
        },
        ..PixmapPaint::default()
    };

    let pixmap = command.surface.pixmap();
    let src_is_full = src.x == 0.0
        && src.y == 0.0
        && src.width == pixmap.width() as f64
        && src.height == pixmap.height() as f64;
    let mask = if src_is_full && rect_contains(visible, dest) {
        None
    } else {
        rect_mask(out.width(), out.height(), visible)
    };

    out.draw_pixmap(0, 0, pixmap.as_ref(), &paint, transform, mask.as_ref());
}

fn rect_contains(outer: PixelRect, inner: PixelRect) -> bool {
    inner.x >= outer.x
        && inner.y >= outer.y
        && inner.x + inner.width <= outer.x + outer.width
        && inner.y + inner.height <= outer.y + outer.height
}

fn rect_mask(width: u32, height: u32, rect: PixelRect) -> Option<Mask> {
    let mut mask = Mask::new(width, height)?;
    let skia_rect = tiny_skia::Rect::from_xywh(
        rect.x as f32,
        rect.y as f32,
        rect.width as f32,
        rect.height as f32,
    )?;
    let path = PathBuilder::from_rect(skia_rect);
    mask.fill_path(&path, FillRule::Winding, false, Transform::identity());
    Some(mask)
}
