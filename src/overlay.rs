//! Frame overlays.
//!
//! [`Overlay::render`] draws the full interface of the counter on top of a camera frame: a header
//! bar, one annotation per person, the counter panel, the status banner and, while a photo is being
//! taken, the countdown or capture caption. [`minimal`] holds the plain variant.
//!
//! Rendering takes an immutable [`Scene`] and returns a new frame; the camera frame is left as is.

pub mod minimal;

use std::path::Path;

use crate::{
    capture::{Stage, THRESHOLD},
    detection::Detection,
    image::{draw, BlendMode, Color, Image, Rect, Resolution},
};

const TITLE: &str = "CONTADOR DE COOPERATIVISTAS";
const ACTIVE: &str = "SISTEMA ACTIVO";

/// Highlight color for boxes and panel borders.
const ACCENT: Color = Color::from_rgb8(74, 200, 221);
/// Counter color once the quota is met.
const SUCCESS: Color = Color::from_rgb8(46, 204, 113);
/// Counter color below the quota.
const BELOW_QUOTA: Color = Color::from_rgb8(231, 76, 60);
const PANEL: Color = Color::from_rgba8(10, 14, 22, 190);
const TRACK: Color = Color::from_rgba8(255, 255, 255, 60);

const HEADER_HEIGHT: u32 = 80;
const COUNTER_PANEL: Rect = Rect::from_top_left(30, 110, 300, 160);
const BANNER_HEIGHT: u32 = 140;
const PROGRESS_WIDTH: u32 = 800;
const PROGRESS_HEIGHT: u32 = 24;
const BOX_STROKE: u32 = 3;
const MARGIN: i32 = 30;

/// Height the logo is scaled to.
pub const LOGO_HEIGHT: u32 = 120;

/// Everything the overlay shows for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    /// The people counted in the frame, in detection order.
    pub people: &'a [Detection],
    /// Number of people in the frame.
    pub person_count: usize,
    /// Smoothed count for the counter panel.
    pub display_count: usize,
    pub stage: Stage,
    /// Average frames per second.
    pub fps: f32,
}

impl Scene<'_> {
    /// The number shown in the counter panel.
    ///
    /// Once the countdown has started, the count that triggered it is shown.
    pub fn counter_value(&self) -> usize {
        match self.stage {
            Stage::Countdown { snapshot, .. } | Stage::Capture { snapshot } => snapshot,
            Stage::Live | Stage::Frozen => self.display_count,
        }
    }

    /// The text in the status banner.
    pub fn banner_message(&self) -> String {
        match self.stage {
            Stage::Capture { snapshot } => success_message(snapshot),
            _ => status_message(self.person_count),
        }
    }
}

/// Returns the status banner text for `person_count` people.
pub fn status_message(person_count: usize) -> String {
    match THRESHOLD.saturating_sub(person_count) {
        0 => success_message(person_count),
        1 => "Les falta 1 cooperativista para formar la cooperativa".to_string(),
        missing => format!("Les faltan {missing} cooperativistas para formar la cooperativa"),
    }
}

/// Returns the celebration text for a cooperative of `members` people.
pub fn success_message(members: usize) -> String {
    format!("¡Ya pueden formar una cooperativa de {members}!")
}

/// Fraction of the quota that is met, between 0.0 and 1.0.
pub fn progress(person_count: usize) -> f32 {
    (person_count as f32 / THRESHOLD as f32).min(1.0)
}

/// A logo drawn in the top right corner.
#[derive(Debug, Clone)]
pub struct Logo {
    image: Image,
    mode: BlendMode,
}

impl Logo {
    /// Loads a logo image and scales it to [`LOGO_HEIGHT`].
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let image = Image::load(path)?;
        Ok(Self::from_image(image))
    }

    /// Creates a logo from an image, scaling it to [`LOGO_HEIGHT`].
    ///
    /// Logos with transparent areas are alpha-blended, others are copied as they are.
    pub fn from_image(image: Image) -> Self {
        let mode = if image.has_transparency() {
            BlendMode::Alpha
        } else {
            BlendMode::Overwrite
        };
        let width = if image.height() == 0 {
            0
        } else {
            (image.width() as u64 * LOGO_HEIGHT as u64 / image.height() as u64) as u32
        };
        let image = image.resize(Resolution::new(width, LOGO_HEIGHT));
        log::debug!("logo: {}x{}, {:?} blending", image.width(), image.height(), mode);
        Self { image, mode }
    }

    pub fn image(&self) -> &Image {
        &self.image
    }
}

/// Renders the counter interface.
#[derive(Debug, Default)]
pub struct Overlay {
    logo: Option<Logo>,
}

impl Overlay {
    pub fn new(logo: Option<Logo>) -> Self {
        Self { logo }
    }

    /// Draws the interface for `scene` on a copy of `frame`.
    pub fn render(&self, frame: &Image, scene: &Scene<'_>) -> Image {
        let mut out = frame.clone();

        for (rank, det) in scene.people.iter().enumerate() {
            draw_person(&mut out, det, rank + 1);
        }

        draw_header(&mut out, scene.fps);
        draw_counter(&mut out, scene.counter_value());
        draw_banner(&mut out, scene);
        if let Some(logo) = &self.logo {
            draw_logo(&mut out, logo);
        }

        match scene.stage {
            Stage::Countdown { remaining, .. } => draw_countdown(&mut out, remaining),
            Stage::Capture { .. } => draw_capture_caption(&mut out),
            Stage::Live | Stage::Frozen => {}
        }

        out
    }
}

fn draw_person(out: &mut Image, det: &Detection, rank: usize) {
    let rect = det.bounding_rect();
    draw::rect(out, rect).color(ACCENT).stroke_width(BOX_STROKE);

    let label = format!("Cooperativista #{rank}");
    let (w, h) = draw::text_size(&label, 1);
    let label_rect = Rect::from_top_left(rect.x(), rect.y() - h as i32 - 8, w + 16, h + 8);
    draw::filled_rect(out, label_rect).color(ACCENT);
    draw::text(out, label_rect.x() + 8, label_rect.y() + 4, &label)
        .align_left()
        .align_top()
        .color(Color::BLACK);

    let badge = format!("{:.0}%", det.confidence() * 100.0);
    let (w, h) = draw::text_size(&badge, 1);
    let badge_rect = Rect::from_top_left(rect.right() - w as i32 - 12, rect.y(), w + 12, h + 8);
    draw::filled_rect(out, badge_rect).color(PANEL);
    draw::text(out, badge_rect.x() + 6, badge_rect.y() + 4, &badge)
        .align_left()
        .align_top()
        .color(ACCENT);
}

fn draw_header(out: &mut Image, fps: f32) {
    let width = out.width();
    let mid = HEADER_HEIGHT as i32 / 2;
    draw::filled_rect(out, Rect::from_top_left(0, 0, width, HEADER_HEIGHT)).color(PANEL);
    draw::line(out, 0, HEADER_HEIGHT as i32, width as i32, HEADER_HEIGHT as i32)
        .color(ACCENT)
        .stroke_width(2);

    draw::text(out, MARGIN, mid, TITLE)
        .align_left()
        .scale(2)
        .color(Color::WHITE);

    let fps_text = format!("FPS: {fps:.1}");
    let (fps_width, _) = draw::text_size(&fps_text, 1);
    let right = width as i32 - MARGIN;
    draw::text(out, right, mid, &fps_text)
        .align_right()
        .color(Color::WHITE);

    let (active_width, _) = draw::text_size(ACTIVE, 1);
    let active_right = right - fps_width as i32 - 40;
    draw::text(out, active_right, mid, ACTIVE)
        .align_right()
        .color(SUCCESS);
    draw::circle(out, active_right - active_width as i32 - 16, mid, 14).color(SUCCESS);
}

fn draw_counter(out: &mut Image, value: usize) {
    let color = if value >= THRESHOLD {
        SUCCESS
    } else {
        BELOW_QUOTA
    };
    let panel = COUNTER_PANEL;
    draw::filled_rect(out, panel).color(PANEL);
    draw::rect(out, panel).color(color).stroke_width(3);

    let (cx, _) = panel.center();
    draw::text(out, cx, panel.y() + 16, "COOPERATIVISTAS")
        .align_top()
        .color(Color::WHITE);
    draw::text(out, cx, panel.y() + 96, &format!("{value}/{THRESHOLD}"))
        .scale(4)
        .color(color);
}

fn draw_banner(out: &mut Image, scene: &Scene<'_>) {
    let (width, height) = (out.width(), out.height());
    let top = height as i32 - BANNER_HEIGHT as i32;
    let banner = Rect::from_top_left(0, top, width, BANNER_HEIGHT);
    draw::filled_rect(out, banner).color(PANEL);

    let message = scene.banner_message();
    let met = matches!(scene.stage, Stage::Capture { .. }) || scene.person_count >= THRESHOLD;
    let cx = width as i32 / 2;
    if met {
        draw::text(out, cx, top + BANNER_HEIGHT as i32 / 2, &message)
            .scale(2)
            .color(SUCCESS);
        return;
    }

    draw::text(out, cx, top + 44, &message)
        .scale(2)
        .color(Color::WHITE);

    let track = Rect::from_top_left(
        cx - PROGRESS_WIDTH as i32 / 2,
        top + 86,
        PROGRESS_WIDTH,
        PROGRESS_HEIGHT,
    );
    draw::filled_rect(out, track).color(TRACK);
    let filled = (PROGRESS_WIDTH as f32 * progress(scene.person_count)).round() as u32;
    draw::filled_rect(
        out,
        Rect::from_top_left(track.x(), track.y(), filled, PROGRESS_HEIGHT),
    )
    .color(ACCENT);
}

fn draw_logo(out: &mut Image, logo: &Logo) {
    let image = logo.image();
    let rect = Rect::from_top_left(
        out.width() as i32 - image.width() as i32 - MARGIN,
        HEADER_HEIGHT as i32 + 20,
        image.width(),
        image.height(),
    );
    out.view_mut(rect).blend_from(image).mode(logo.mode);
}

fn draw_countdown(out: &mut Image, remaining: u32) {
    let (cx, cy) = out.rect().center();
    draw::circle(out, cx, cy - 40, 300).color(PANEL);
    draw::circle(out, cx, cy - 40, 300)
        .outline(6)
        .color(ACCENT);
    draw::text(out, cx, cy - 40, &remaining.to_string())
        .scale(10)
        .color(Color::WHITE);
    draw::text(out, cx, cy + 170, "¡Sonrían!")
        .scale(4)
        .color(ACCENT);
}

fn draw_capture_caption(out: &mut Image) {
    let rect = out.rect();
    draw::rect(out, rect).color(Color::WHITE).stroke_width(12);

    let (cx, cy) = rect.center();
    let caption = "¡Cooperativa formada!";
    let (w, h) = draw::text_size(caption, 3);
    draw::filled_rect(
        out,
        Rect::from_center(cx, cy, w + 60, h + 40),
    )
    .color(PANEL);
    draw::text(out, cx, cy, caption).scale(3).color(SUCCESS);
}
