pub mod present;
pub mod raster;

use bevy::math::{Affine2, Rect, Vec2};
use derive_more::{Deref, DerefMut, Display, From};
use std::ops;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deref, DerefMut, From)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const WHITE: Self = Self([255; 4]);

    pub fn rgb([r, g, b]: [u8; 3]) -> Self {
        Self([r, g, b, 255])
    }

    /// Gray level with a fractional alpha, as in `stroke(255, 160 * scale)`.
    pub fn gray(level: u8, alpha: f64) -> Self {
        Self([level, level, level, alpha.round().clamp(0., 255.) as u8])
    }

    pub fn with_alpha(self, alpha: f64) -> Self {
        let [r, g, b, _] = self.0;
        Self([r, g, b, alpha.round().clamp(0., 255.) as u8])
    }
}

/// Opaque handle of a texture, keyed by file name or buffer name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
pub struct TextureKey(pub String);

impl From<&str> for TextureKey {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Straight RGBA8 pixels, row major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn from_image(image: image::RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let at = (y as usize * self.width as usize + x as usize) * 4;
        (x < self.width && y < self.height)
            .then(|| Rgba([self.data[at], self.data[at + 1], self.data[at + 2], self.data[at + 3]]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub width: f32,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Background(Rgba),
    Line {
        from: Vec2,
        to: Vec2,
        stroke: Stroke,
    },
    Circle {
        center: Vec2,
        radius: f32,
        fill: Option<Rgba>,
        stroke: Option<Stroke>,
    },
    /// Area cleared back to the background colour.
    Erase { center: Vec2, radius: f32 },
    Image {
        texture: TextureKey,
        dest: Rect,
        src: Option<Rect>,
        flip_x: bool,
        flip_y: bool,
        tint: Rgba,
    },
    Text {
        position: Vec2,
        text: String,
        size: f32,
        color: Rgba,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Style {
    fill: Option<Rgba>,
    stroke: Option<Rgba>,
    stroke_weight: f32,
    tint: Rgba,
    erase: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: Some(Rgba::WHITE),
            stroke: Some(Rgba([0, 0, 0, 255])),
            stroke_weight: 1.,
            tint: Rgba::WHITE,
            erase: false,
        }
    }
}

/// Recording drawing surface. Draw calls resolve the current transform and
/// style into screen-space [`Shape`]s which a presenter paints later.
#[derive(Debug, Clone)]
pub struct Canvas {
    size: Vec2,
    transform: Affine2,
    style: Style,
    stack: Vec<(Affine2, Style)>,
    shapes: Vec<Shape>,
    uploads: Vec<(TextureKey, PixelBuffer)>,
}

impl Canvas {
    pub fn new(size: Vec2) -> Self {
        Self {
            size,
            transform: Affine2::IDENTITY,
            style: Style::default(),
            stack: vec![],
            shapes: vec![],
            uploads: vec![],
        }
    }

    pub fn width(&self) -> f32 {
        self.size.x
    }

    pub fn height(&self) -> f32 {
        self.size.y
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    /// Starts a new frame: drops recorded output and resets all state.
    pub fn reset(&mut self) {
        self.transform = Affine2::IDENTITY;
        self.style = Style::default();
        self.stack.clear();
        self.shapes.clear();
        self.uploads.clear();
    }

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn take_uploads(&mut self) -> Vec<(TextureKey, PixelBuffer)> {
        std::mem::take(&mut self.uploads)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Saves transform and style; they are restored when the guard drops.
    pub fn scoped(&mut self) -> Scoped<'_> {
        self.stack.push((self.transform, self.style));
        Scoped { canvas: self }
    }

    fn restore(&mut self) {
        if let Some((transform, style)) = self.stack.pop() {
            self.transform = transform;
            self.style = style;
        }
    }

    pub fn translate(&mut self, by: Vec2) {
        self.transform = self.transform * Affine2::from_translation(by);
    }

    pub fn scale(&mut self, by: Vec2) {
        self.transform = self.transform * Affine2::from_scale(by);
    }

    pub fn fill(&mut self, color: Rgba) {
        self.style.fill = Some(color);
    }

    pub fn no_fill(&mut self) {
        self.style.fill = None;
    }

    pub fn stroke(&mut self, color: Rgba) {
        self.style.stroke = Some(color);
    }

    pub fn no_stroke(&mut self) {
        self.style.stroke = None;
    }

    pub fn stroke_weight(&mut self, weight: f32) {
        self.style.stroke_weight = weight;
    }

    pub fn tint(&mut self, color: Rgba) {
        self.style.tint = color;
    }

    pub fn erase(&mut self) {
        self.style.erase = true;
    }

    pub fn no_erase(&mut self) {
        self.style.erase = false;
    }

    fn length_scale(&self) -> f32 {
        self.transform.matrix2.determinant().abs().sqrt()
    }

    fn point(&self, point: Vec2) -> Vec2 {
        self.transform.transform_point2(point)
    }

    fn current_stroke(&self) -> Option<Stroke> {
        self.style
            .stroke
            .filter(|_| 0. < self.style.stroke_weight)
            .map(|color| Stroke {
                width: self.style.stroke_weight * self.length_scale(),
                color,
            })
    }

    pub fn background(&mut self, color: Rgba) {
        self.shapes.push(Shape::Background(color));
    }

    pub fn line(&mut self, from: Vec2, to: Vec2) {
        if let Some(stroke) = self.current_stroke() {
            self.shapes.push(Shape::Line {
                from: self.point(from),
                to: self.point(to),
                stroke,
            });
        }
    }

    /// Circle by diameter. In erase mode the filled area is cut out instead.
    /// A zero diameter draws nothing.
    pub fn circle(&mut self, center: Vec2, diameter: f32) {
        if diameter == 0. {
            return;
        }
        let (center, radius) = (self.point(center), diameter.abs() / 2. * self.length_scale());

        if self.style.erase {
            if self.style.fill.is_some() {
                self.shapes.push(Shape::Erase { center, radius });
            }
            return;
        }

        let (fill, stroke) = (self.style.fill, self.current_stroke());
        if fill.is_some() || stroke.is_some() {
            self.shapes.push(Shape::Circle {
                center,
                radius,
                fill,
                stroke,
            });
        }
    }

    /// Blits `src` (texture pixels, whole texture if `None`) into `dest`.
    pub fn image(&mut self, texture: impl Into<TextureKey>, dest: Rect, src: Option<Rect>) {
        let (min, max) = (self.point(dest.min), self.point(dest.max));
        self.shapes.push(Shape::Image {
            texture: texture.into(),
            dest: Rect::from_corners(min, max),
            src,
            flip_x: max.x < min.x,
            flip_y: max.y < min.y,
            tint: self.style.tint,
        });
    }

    pub fn text(&mut self, text: impl Into<String>, position: Vec2, size: f32) {
        self.shapes.push(Shape::Text {
            position: self.point(position),
            text: text.into(),
            size: size * self.length_scale(),
            color: self.style.fill.unwrap_or(Rgba::WHITE),
        });
    }

    /// Queues new pixels for a dynamic texture.
    pub fn upload(&mut self, texture: impl Into<TextureKey>, pixels: PixelBuffer) {
        self.uploads.push((texture.into(), pixels));
    }
}

/// Exclusive access to a [`Canvas`] for one nested drawing block. Dropping
/// the guard restores the transform and style saved when it was taken, on
/// every exit path.
pub struct Scoped<'a> {
    canvas: &'a mut Canvas,
}

impl ops::Deref for Scoped<'_> {
    type Target = Canvas;

    fn deref(&self) -> &Canvas {
        self.canvas
    }
}

impl ops::DerefMut for Scoped<'_> {
    fn deref_mut(&mut self) -> &mut Canvas {
        self.canvas
    }
}

impl Drop for Scoped<'_> {
    fn drop(&mut self) {
        self.canvas.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn canvas() -> Canvas {
        Canvas::new(Vec2::new(1920., 1080.))
    }

    #[test]
    fn scoped_restores_transform_and_style() {
        let mut canvas = canvas();
        canvas.stroke(Rgba::WHITE);
        canvas.stroke_weight(2.);
        {
            let mut inner = canvas.scoped();
            inner.translate(Vec2::new(100., 50.));
            inner.stroke_weight(8.);
            {
                let mut nested = inner.scoped();
                nested.scale(Vec2::splat(2.));
                assert_eq!(nested.depth(), 2);
                nested.line(Vec2::ZERO, Vec2::X);
            }
            inner.line(Vec2::ZERO, Vec2::X);
        }
        canvas.line(Vec2::ZERO, Vec2::X);

        assert_eq!(canvas.depth(), 0);
        let lines = canvas
            .shapes()
            .iter()
            .map(|shape| match shape {
                Shape::Line { from, to, stroke } => (*from, *to, stroke.width),
                _ => unreachable!(),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            lines,
            vec![
                (Vec2::new(100., 50.), Vec2::new(102., 50.), 16.),
                (Vec2::new(100., 50.), Vec2::new(101., 50.), 8.),
                (Vec2::ZERO, Vec2::X, 2.),
            ]
        );
    }

    #[test]
    fn guard_restores_on_early_exit() {
        fn fails(canvas: &mut Canvas) -> Result<(), ()> {
            let mut scope = canvas.scoped();
            scope.translate(Vec2::splat(10.));
            scope.no_stroke();
            Err(())
        }

        let mut canvas = canvas();
        assert!(fails(&mut canvas).is_err());
        assert_eq!(canvas.depth(), 0);
        canvas.line(Vec2::ZERO, Vec2::X);
        assert!(matches!(canvas.shapes(), [Shape::Line { from, .. }] if *from == Vec2::ZERO));
    }

    #[test]
    fn circles_follow_style() {
        let mut canvas = canvas();
        canvas.scale(Vec2::splat(0.5));
        canvas.no_stroke();
        canvas.no_fill();
        canvas.circle(Vec2::ZERO, 10.);
        canvas.fill(Rgba::WHITE);
        canvas.circle(Vec2::new(10., 0.), 10.);
        canvas.circle(Vec2::new(10., 0.), 0.);
        canvas.erase();
        canvas.circle(Vec2::ZERO, 4.);
        canvas.circle(Vec2::ZERO, 0.);

        assert_eq!(
            canvas.shapes(),
            &[
                Shape::Circle {
                    center: Vec2::new(5., 0.),
                    radius: 2.5,
                    fill: Some(Rgba::WHITE),
                    stroke: None,
                },
                Shape::Erase {
                    center: Vec2::ZERO,
                    radius: 1.
                },
            ]
        );
    }

    #[test]
    fn flipped_images_are_normalized() {
        let mut canvas = canvas();
        canvas.translate(Vec2::new(0., 100.));
        canvas.scale(Vec2::new(1., -1.));
        canvas.image("rei", Rect::new(0., 0., 10., 20.), None);

        match &canvas.shapes()[0] {
            Shape::Image { dest, flip_x, flip_y, texture, .. } => {
                assert_eq!(*dest, Rect::new(0., 80., 10., 100.));
                assert_eq!((*flip_x, *flip_y), (false, true));
                assert_eq!(texture, &TextureKey::from("rei"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reset_clears_everything() {
        let mut canvas = canvas();
        canvas.background(Rgba::WHITE);
        canvas.upload("bg", PixelBuffer::new(2, 2));
        std::mem::forget(canvas.scoped());
        canvas.reset();
        assert!(canvas.shapes().is_empty());
        assert!(canvas.take_uploads().is_empty());
        assert_eq!(canvas.depth(), 0);
    }

    #[test]
    fn gray_alpha_rounds_and_clamps() {
        assert_eq!(Rgba::gray(255, 159.6), Rgba([255, 255, 255, 160]));
        assert_eq!(Rgba::gray(0, 400.), Rgba([0, 0, 0, 255]));
        assert_eq!(Rgba::rgb([1, 2, 3]).with_alpha(-3.), Rgba([1, 2, 3, 0]));
    }
}
