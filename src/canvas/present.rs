use super::*;
use crate::compositor::Frame;
use bevy::{
    prelude::*,
    render::{
        render_resource::{Extent3d, TextureDimension, TextureFormat},
        texture::ImageSampler,
    },
    utils::HashMap,
};
use bevy_egui::{
    egui::{self, Align2, Color32, FontId, LayerId, Pos2},
    EguiContexts,
};

struct Registered {
    handle: Handle<Image>,
    id: egui::TextureId,
    size: Vec2,
}

/// Textures known to the presenter. Static images are queued during setup;
/// dynamic ones arrive through [`Canvas::upload`] every frame.
#[derive(Resource, Default)]
pub struct TextureRegistry {
    textures: HashMap<TextureKey, Registered>,
    pending: Vec<(TextureKey, PixelBuffer)>,
}

impl TextureRegistry {
    pub fn queue(&mut self, key: impl Into<TextureKey>, pixels: PixelBuffer) {
        self.pending.push((key.into(), pixels));
    }

    /// Low resolution layers are sampled nearest so they upscale into hard
    /// pixels.
    fn upload(
        &mut self,
        (key, pixels): (TextureKey, PixelBuffer),
        pixelated: bool,
        images: &mut Assets<Image>,
        contexts: &mut EguiContexts,
    ) {
        let size = pixels.size();
        if let Some(image) = self
            .textures
            .get(&key)
            .filter(|registered| registered.size == size)
            .and_then(|registered| images.get_mut(&registered.handle))
        {
            image.data = pixels.data;
            return;
        }

        let mut image = Image::new(
            Extent3d {
                width: pixels.width,
                height: pixels.height,
                depth_or_array_layers: 1,
            },
            TextureDimension::D2,
            pixels.data,
            TextureFormat::Rgba8UnormSrgb,
        );
        if pixelated {
            image.sampler_descriptor = ImageSampler::nearest();
        }
        let handle = images.add(image);
        let id = contexts.add_image(handle.clone_weak());

        if let Some(stale) = self.textures.insert(key, Registered { handle, id, size }) {
            contexts.remove_image(&stale.handle);
        }
    }
}

fn color32(Rgba([r, g, b, a]): Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// Letterboxed mapping from canvas space onto the window.
struct Viewport {
    origin: Vec2,
    scale: f32,
}

impl Viewport {
    fn new(screen: egui::Rect, canvas: Vec2) -> Self {
        let scale = (screen.width() / canvas.x).min(screen.height() / canvas.y);
        Self {
            origin: Vec2::new(screen.center().x, screen.center().y) - canvas * scale / 2.,
            scale,
        }
    }

    fn pos(&self, point: Vec2) -> Pos2 {
        (self.origin + point * self.scale).to_array().into()
    }

    fn rect(&self, rect: Rect) -> egui::Rect {
        egui::Rect::from_min_max(self.pos(rect.min), self.pos(rect.max))
    }
}

#[rustfmt::skip]
fn uv(src: Option<Rect>, texture: Vec2, flip_x: bool, flip_y: bool) -> egui::Rect {
    let src = src.unwrap_or(Rect::from_corners(Vec2::ZERO, texture));
    let (min, max) = (src.min / texture, src.max / texture);
    let (u0, u1) = if flip_x { (max.x, min.x) } else { (min.x, max.x) };
    let (v0, v1) = if flip_y { (max.y, min.y) } else { (min.y, max.y) };
    egui::Rect::from_min_max(egui::pos2(u0, v0), egui::pos2(u1, v1))
}

/// Paints the frame recorded by the compositor onto the egui background layer.
#[rustfmt::skip]
pub fn present(
    mut contexts: EguiContexts,
    mut frame: ResMut<Frame>,
    mut registry: ResMut<TextureRegistry>,
    mut images: ResMut<Assets<Image>>,
) {
    std::mem::take(&mut registry.pending)
        .into_iter()
        .for_each(|upload| registry.upload(upload, false, &mut images, &mut contexts));
    frame
        .take_uploads()
        .into_iter()
        .for_each(|upload| registry.upload(upload, true, &mut images, &mut contexts));

    let ctx = contexts.ctx_mut();
    let painter = ctx.layer_painter(LayerId::background());
    let view = Viewport::new(ctx.screen_rect(), frame.size());

    frame.shapes().iter().for_each(|shape| match shape {
        Shape::Background(color) => {
            painter.rect_filled(view.rect(Rect::from_corners(Vec2::ZERO, frame.size())), 0., color32(*color));
        }
        Shape::Line { from, to, stroke } => {
            painter.line_segment(
                [view.pos(*from), view.pos(*to)],
                (stroke.width * view.scale, color32(stroke.color)),
            );
        }
        Shape::Circle { center, radius, fill, stroke } => {
            painter.circle(
                view.pos(*center),
                radius * view.scale,
                fill.map_or(Color32::TRANSPARENT, color32),
                stroke.map_or(egui::Stroke::NONE, |stroke| {
                    egui::Stroke::new(stroke.width * view.scale, color32(stroke.color))
                }),
            );
        }
        // Erasing only means something inside a rasterised layer.
        Shape::Erase { .. } => {}
        Shape::Image { texture, dest, src, flip_x, flip_y, tint } => {
            match registry.textures.get(texture) {
                Some(registered) => painter.image(
                    registered.id,
                    view.rect(*dest),
                    uv(*src, registered.size, *flip_x, *flip_y),
                    color32(*tint),
                ),
                None => debug!("Texture {texture} is not registered yet"),
            }
        }
        Shape::Text { position, text, size, color } => {
            painter.text(
                view.pos(*position),
                Align2::LEFT_TOP,
                text,
                FontId::proportional(size * view.scale),
                color32(*color),
            );
        }
    });
}
