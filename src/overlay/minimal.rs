//! The plain overlay: boxes, a one-line status and the frame rate.

use crate::{
    capture::THRESHOLD,
    detection::Detection,
    image::{draw, Color, Image},
};

const SUCCESS: Color = Color::from_rgb8(74, 200, 221);
const BOX_STROKE: u32 = 2;

/// Returns the status line for `person_count` people.
pub fn status_message(person_count: usize) -> String {
    if person_count >= THRESHOLD {
        format!("Ya pueden formar una Cooperativa de {person_count} :)")
    } else {
        format!(
            "Les falta {} personas pa formar una coop bro :'(",
            THRESHOLD - person_count
        )
    }
}

/// Draws a box around each of `people`, the status line and, if known, the frame rate on a copy
/// of `frame`.
pub fn render(frame: &Image, people: &[Detection], fps: Option<f32>) -> Image {
    let mut out = frame.clone();
    let person_count = people.len();

    for det in people {
        let rect = det.bounding_rect();
        draw::rect(&mut out, rect)
            .color(Color::GREEN)
            .stroke_width(BOX_STROKE);
        draw::text(
            &mut out,
            rect.x(),
            rect.y() - 10,
            &format!("Person {:.2}", det.confidence()),
        )
        .align_left()
        .align_bottom()
        .color(Color::GREEN);
    }

    let message = status_message(person_count);
    if person_count >= THRESHOLD {
        draw::text(&mut out, 10, 40, &message)
            .align_left()
            .align_bottom()
            .scale(2)
            .color(SUCCESS);
    } else {
        draw::text(&mut out, 10, 30, &message)
            .align_left()
            .align_bottom()
            .color(Color::RED);
    }

    if let Some(fps) = fps {
        draw::text(&mut out, 10, 70, &format!("FPS: {fps:.2}"))
            .align_left()
            .align_bottom()
            .color(Color::BLUE);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        detection::PERSON_CLASS,
        image::{Rect, Resolution},
    };

    #[test]
    fn messages() {
        assert_eq!(
            status_message(2),
            "Les falta 4 personas pa formar una coop bro :'("
        );
        assert_eq!(
            status_message(0),
            "Les falta 6 personas pa formar una coop bro :'("
        );
        assert_eq!(status_message(6), "Ya pueden formar una Cooperativa de 6 :)");
        assert_eq!(status_message(8), "Ya pueden formar una Cooperativa de 8 :)");
    }

    #[test]
    fn boxes_people() {
        let frame = Image::filled(Resolution::RES_720P, Color::BLACK);
        let people = [Detection::new(
            Rect::from_corners(300, 300, 500, 600),
            PERSON_CLASS,
            0.9,
        )];
        let out = render(&frame, &people, None);
        assert_eq!(out.get(300, 450), Color::GREEN);
        assert_eq!(out.get(700, 450), Color::BLACK);
    }

    #[test]
    fn fps_line_is_optional() {
        let frame = Image::filled(Resolution::RES_720P, Color::BLACK);
        let without = render(&frame, &[], None);
        let with = render(&frame, &[], Some(29.97));
        assert_ne!(without, with);
        assert_eq!(frame, Image::filled(Resolution::RES_720P, Color::BLACK));
    }
}
