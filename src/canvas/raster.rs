//! Hard-edged software rasterisation of recorded vector shapes, for layers
//! that are drawn at low resolution and upscaled.

use super::*;

fn blend_over(dst: &mut [u8], Rgba([r, g, b, a]): Rgba) {
    let src_a = a as f32 / 255.;
    if src_a <= 0. {
        return;
    }

    let dst_a = dst[3] as f32 / 255.;
    let out_a = src_a + dst_a * (1. - src_a);
    [r, g, b].into_iter().zip(dst.iter_mut()).for_each(|(src, dst)| {
        *dst = ((src as f32 * src_a + *dst as f32 * dst_a * (1. - src_a)) / out_a).round() as u8;
    });
    dst[3] = (out_a * 255.).round() as u8;
}

fn segment_distance(point: Vec2, from: Vec2, to: Vec2) -> f32 {
    let along = to - from;
    let t = match along.length_squared() {
        length if 0. < length => ((point - from).dot(along) / length).clamp(0., 1.),
        _ => 0.,
    };
    point.distance(from + along * t)
}

/// Runs `paint` on every pixel of `target` inside `bounds` whose centre
/// passes `inside`.
fn cover(
    target: &mut PixelBuffer,
    (min, max): (Vec2, Vec2),
    inside: impl Fn(Vec2) -> bool,
    mut paint: impl FnMut(&mut [u8]),
) {
    let (width, height) = (target.width, target.height);
    let xs = (min.x.floor().max(0.) as u32)..(max.x.ceil().max(0.) as u32).min(width);
    let ys = (min.y.floor().max(0.) as u32)..(max.y.ceil().max(0.) as u32).min(height);

    ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
        .filter(|&(x, y)| inside(Vec2::new(x as f32 + 0.5, y as f32 + 0.5)))
        .for_each(|(x, y)| {
            let at = (y as usize * width as usize + x as usize) * 4;
            paint(&mut target.data[at..at + 4]);
        });
}

fn around(center: Vec2, reach: f32) -> (Vec2, Vec2) {
    (center - Vec2::splat(reach), center + Vec2::splat(reach))
}

/// Clears `target` and paints `shapes` into it in order. Erase shapes clear
/// what was painted before them back to transparent. Images and text are not
/// rasterised.
pub fn rasterize(shapes: &[Shape], target: &mut PixelBuffer) {
    target.clear();

    shapes.iter().for_each(|shape| match *shape {
        Shape::Background(color) => target
            .data
            .chunks_exact_mut(4)
            .for_each(|pixel| pixel.copy_from_slice(&color.0)),
        Shape::Line { from, to, stroke } => {
            let half = stroke.width / 2.;
            cover(
                target,
                (from.min(to) - Vec2::splat(half), from.max(to) + Vec2::splat(half)),
                |point| segment_distance(point, from, to) <= half,
                |pixel| blend_over(pixel, stroke.color),
            );
        }
        Shape::Circle { center, radius, fill, stroke } => {
            if let Some(fill) = fill {
                cover(
                    target,
                    around(center, radius),
                    |point| point.distance(center) <= radius,
                    |pixel| blend_over(pixel, fill),
                );
            }
            if let Some(stroke) = stroke {
                let half = stroke.width / 2.;
                cover(
                    target,
                    around(center, radius + half),
                    |point| (point.distance(center) - radius).abs() <= half,
                    |pixel| blend_over(pixel, stroke.color),
                );
            }
        }
        Shape::Erase { center, radius } => cover(
            target,
            around(center, radius),
            |point| point.distance(center) <= radius,
            |pixel| pixel.fill(0),
        ),
        Shape::Image { .. } | Shape::Text { .. } => {}
    });
}
