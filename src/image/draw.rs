//! Drawing primitives.
//!
//! Every function returns a guard that performs the drawing operation when dropped, so that
//! optional settings can be chained onto the call:
//!
//! ```ignore
//! draw::rect(&mut image, rect).color(Color::GREEN).stroke_width(3);
//! ```
//!
//! Colors with an alpha value below 255 are alpha-blended onto the existing image contents.

use std::convert::Infallible;

use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle},
    prelude::*,
    primitives::{Circle, Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle, StrokeAlignment},
    text::{Alignment, Baseline, Text, TextStyleBuilder},
};

use super::{blend::blend_alpha, AsImageViewMut, Color, Image, ImageViewMut, Rect};

/// Guard returned by [`rect`]; draws the rectangle outline when dropped.
pub struct DrawRect<'a> {
    image: ImageViewMut<'a>,
    rect: Rect,
    color: Color,
    stroke_width: u32,
}

impl DrawRect<'_> {
    /// Sets the rectangle's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the rectangle's stroke width.
    ///
    /// By default, a stroke width of 1 is used. The stroke is drawn inside of the rectangle.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawRect<'_> {
    fn drop(&mut self) {
        let style = PrimitiveStyleBuilder::new()
            .stroke_color(self.color)
            .stroke_width(self.stroke_width)
            .stroke_alignment(StrokeAlignment::Inside)
            .build();
        draw_infallible(self.rect.rect.into_styled(style), &mut self.image);
    }
}

/// Guard returned by [`filled_rect`]; fills the rectangle when dropped.
pub struct DrawFilledRect<'a> {
    image: ImageViewMut<'a>,
    rect: Rect,
    color: Color,
}

impl DrawFilledRect<'_> {
    /// Sets the fill color. Translucent colors produce a tinted panel.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }
}

impl Drop for DrawFilledRect<'_> {
    fn drop(&mut self) {
        let style = PrimitiveStyle::with_fill(self.color);
        draw_infallible(self.rect.rect.into_styled(style), &mut self.image);
    }
}

/// Guard returned by [`circle`]; draws the circle when dropped.
pub struct DrawCircle<'a> {
    image: ImageViewMut<'a>,
    x: i32,
    y: i32,
    diameter: u32,
    color: Color,
    stroke_width: Option<u32>,
}

impl DrawCircle<'_> {
    /// Sets the circle's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Draws only the outline of the circle, with the given stroke width.
    ///
    /// By default, circles are filled.
    pub fn outline(&mut self, stroke_width: u32) -> &mut Self {
        self.stroke_width = Some(stroke_width);
        self
    }
}

impl Drop for DrawCircle<'_> {
    fn drop(&mut self) {
        let style = match self.stroke_width {
            Some(width) => PrimitiveStyle::with_stroke(self.color, width),
            None => PrimitiveStyle::with_fill(self.color),
        };
        let circle = Circle::with_center(Point::new(self.x, self.y), self.diameter);
        draw_infallible(circle.into_styled(style), &mut self.image);
    }
}

/// Guard returned by [`line`]; draws the line when dropped.
pub struct DrawLine<'a> {
    image: ImageViewMut<'a>,
    start: Point,
    end: Point,
    color: Color,
    stroke_width: u32,
}

impl DrawLine<'_> {
    /// Sets the line's color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Sets the line's stroke width.
    ///
    /// By default, a stroke width of 1 is used.
    pub fn stroke_width(&mut self, width: u32) -> &mut Self {
        self.stroke_width = width;
        self
    }
}

impl Drop for DrawLine<'_> {
    fn drop(&mut self) {
        let line = Line::new(self.start, self.end)
            .into_styled(PrimitiveStyle::with_stroke(self.color, self.stroke_width));
        draw_infallible(line, &mut self.image);
    }
}

/// Guard returned by [`text`]; draws the text when dropped.
pub struct DrawText<'a> {
    image: ImageViewMut<'a>,
    x: i32,
    y: i32,
    text: &'a str,
    color: Color,
    scale: u32,
    alignment: Alignment,
    baseline: Baseline,
}

impl<'a> DrawText<'a> {
    /// Sets the text color.
    pub fn color(&mut self, color: Color) -> &mut Self {
        self.color = color;
        self
    }

    /// Scales every glyph by an integer factor.
    ///
    /// At scale 1, each glyph is 10x20 pixels.
    pub fn scale(&mut self, scale: u32) -> &mut Self {
        assert!(scale != 0, "text scale must be greater than zero");
        self.scale = scale;
        self
    }

    /// Aligns the top of the text with the `y` coordinate.
    pub fn align_top(&mut self) -> &mut Self {
        self.baseline = Baseline::Top;
        self
    }

    /// Aligns the bottom of the text with the `y` coordinate.
    pub fn align_bottom(&mut self) -> &mut Self {
        self.baseline = Baseline::Bottom;
        self
    }

    /// Aligns the left side of the text with the `x` coordinate.
    pub fn align_left(&mut self) -> &mut Self {
        self.alignment = Alignment::Left;
        self
    }

    /// Aligns the right side of the text with the `x` coordinate.
    pub fn align_right(&mut self) -> &mut Self {
        self.alignment = Alignment::Right;
        self
    }

    fn bounds(&self) -> Rect {
        let (w, h) = text_size(self.text, self.scale);
        let x = match self.alignment {
            Alignment::Left => self.x,
            Alignment::Center => self.x - (w / 2) as i32,
            Alignment::Right => self.x - w as i32,
        };
        let y = match self.baseline {
            Baseline::Top => self.y,
            Baseline::Bottom | Baseline::Alphabetic => self.y - h as i32,
            Baseline::Middle => self.y - (h / 2) as i32,
        };
        Rect::from_top_left(x, y, w, h)
    }
}

impl Drop for DrawText<'_> {
    fn drop(&mut self) {
        let bounds = self.bounds();
        if self.scale == 1 {
            let style = TextStyleBuilder::new()
                .alignment(Alignment::Left)
                .baseline(Baseline::Top)
                .build();
            let text = Text::with_text_style(
                self.text,
                Point::new(bounds.x(), bounds.y()),
                MonoTextStyle::new(&FONT_10X20, self.color),
                style,
            );
            draw_infallible(text, &mut self.image);
            return;
        }

        // Render at native size, then stretch the glyphs over the scaled area.
        let (w, h) = text_size(self.text, 1);
        let mut glyphs = Image::new(w, h);
        text(&mut glyphs, 0, 0, self.text)
            .color(self.color)
            .align_left()
            .align_top();

        let mut dest = self.image.view_mut(bounds);
        dest.blend_from(&glyphs);
    }
}

/// Computes the size in pixels that `text` occupies when drawn at `scale`.
pub fn text_size(text: &str, scale: u32) -> (u32, u32) {
    let chars = text.chars().count() as u32;
    let width = chars * (FONT_10X20.character_size.width + FONT_10X20.character_spacing);
    let width = width.saturating_sub(FONT_10X20.character_spacing);
    (width * scale, FONT_10X20.character_size.height * scale)
}

/// Draws the outline of a rectangle onto an image.
pub fn rect<I: AsImageViewMut>(image: &mut I, rect: Rect) -> DrawRect<'_> {
    DrawRect {
        image: image.as_view_mut(),
        rect,
        color: Color::RED,
        stroke_width: 1,
    }
}

/// Fills a rectangle on an image.
pub fn filled_rect<I: AsImageViewMut>(image: &mut I, rect: Rect) -> DrawFilledRect<'_> {
    DrawFilledRect {
        image: image.as_view_mut(),
        rect,
        color: Color::BLACK,
    }
}

/// Draws a circle centered at `(x, y)` onto an image.
pub fn circle<I: AsImageViewMut>(image: &mut I, x: i32, y: i32, diameter: u32) -> DrawCircle<'_> {
    DrawCircle {
        image: image.as_view_mut(),
        x,
        y,
        diameter,
        color: Color::GREEN,
        stroke_width: None,
    }
}

/// Draws a line onto an image.
pub fn line<I: AsImageViewMut>(
    image: &mut I,
    start_x: i32,
    start_y: i32,
    end_x: i32,
    end_y: i32,
) -> DrawLine<'_> {
    DrawLine {
        image: image.as_view_mut(),
        start: Point::new(start_x, start_y),
        end: Point::new(end_x, end_y),
        color: Color::BLUE,
        stroke_width: 1,
    }
}

/// Draws a text string onto an image.
///
/// By default, the text is drawn centered horizontally and vertically around `x` and `y`. The
/// font covers ISO 8859-1, so Spanish punctuation and accents render, but characters outside of
/// Latin-1 are replaced.
pub fn text<'a, I: AsImageViewMut>(
    image: &'a mut I,
    x: i32,
    y: i32,
    text: &'a str,
) -> DrawText<'a> {
    DrawText {
        image: image.as_view_mut(),
        x,
        y,
        text,
        color: Color::WHITE,
        scale: 1,
        alignment: Alignment::Center,
        baseline: Baseline::Middle,
    }
}

fn draw_infallible<D: Drawable<Color = Color>>(drawable: D, image: &mut ImageViewMut<'_>) {
    match drawable.draw(&mut Target(image.reborrow())) {
        Ok(_) => {}
        Err(infallible) => match infallible {},
    }
}

struct Target<'a>(ImageViewMut<'a>);

impl Dimensions for Target<'_> {
    fn bounding_box(&self) -> Rectangle {
        let (width, height) = (self.0.width(), self.0.height());

        Rectangle {
            top_left: Point { x: 0, y: 0 },
            size: Size { width, height },
        }
    }
}

impl DrawTarget for Target<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0
                || point.y < 0
                || point.x as u32 >= self.0.width()
                || point.y as u32 >= self.0.height()
            {
                continue;
            }

            let (x, y) = (point.x as u32, point.y as u32);
            let color = if color.a() == 255 {
                color
            } else {
                blend_alpha(self.0.get(x, y), color)
            };
            self.0.set(x, y, color);
        }

        Ok(())
    }
}
