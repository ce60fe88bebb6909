use super::*;
use Color as C;

fn mkimage<const W: usize, const H: usize>(data: [[Color; W]; H]) -> Image {
    let mut image = Image::new(W as u32, H as u32);
    for (y, row) in data.iter().enumerate() {
        for (x, color) in row.iter().enumerate() {
            image.set(x as u32, y as u32, *color);
        }
    }
    image
}

#[test]
fn view() {
    let image = mkimage([[C::RED, C::GREEN]]);

    let view = image.view(Rect::from_top_left(1, 0, 1, 1));
    assert_eq!(view.width(), 1);
    assert_eq!(view.height(), 1);
    assert_eq!(view.get(0, 0), C::GREEN);

    // Views keep their size, out-of-bounds pixels read as NULL.
    let view = image.view(Rect::from_top_left(1, 0, 4, 4));
    assert_eq!(view.width(), 4);
    assert_eq!(view.get(0, 0), C::GREEN);
    assert_eq!(view.get(1, 0), C::NULL);
    assert_eq!(view.get(0, 1), C::NULL);
}

#[test]
fn view_mut_ignores_out_of_bounds_writes() {
    let mut image = mkimage([[C::RED, C::RED]]);
    let mut view = image.view_mut(Rect::from_top_left(1, -1, 2, 2));
    for y in 0..2 {
        for x in 0..2 {
            view.set(x, y, C::BLUE);
        }
    }
    assert_eq!(image, mkimage([[C::RED, C::BLUE]]));
}

#[test]
fn blend() {
    let mut image = mkimage([[C::RED]]);
    let overlay = mkimage([[C::GREEN.with_alpha(0)]]);
    image.blend_from(&overlay).mode(BlendMode::Alpha);
    assert_eq!(image.get(0, 0), C::RED); // no change

    let mut image = mkimage([[C::RED]]);
    let overlay = mkimage([[C::GREEN.with_alpha(0)]]);
    image.blend_from(&overlay).mode(BlendMode::Overwrite);
    assert_eq!(image.get(0, 0), C::GREEN.with_alpha(0));

    let mut image = mkimage([[C::RED]]);
    let overlay = mkimage([[C::GREEN]]);
    image.blend_from(&overlay).mode(BlendMode::Alpha);
    assert_eq!(image.get(0, 0), C::GREEN);

    // Half-transparent white over black lands well above the sRGB midpoint.
    let mut image = mkimage([[C::BLACK]]);
    let overlay = mkimage([[C::WHITE.with_alpha(128)]]);
    image.blend_from(&overlay);
    let result = image.get(0, 0);
    assert_eq!(result.a(), 255);
    assert!(result.r() > 180 && result.r() < 200, "{result:?}");
    assert_eq!(result.r(), result.g());
}

#[test]
fn blend_stretches_source() {
    let mut image = Image::new(4, 2);
    let src = mkimage([[C::RED, C::BLUE]]);
    image.blend_from(&src).mode(BlendMode::Overwrite);
    assert_eq!(
        image,
        mkimage([
            [C::RED, C::RED, C::BLUE, C::BLUE],
            [C::RED, C::RED, C::BLUE, C::BLUE],
        ])
    );
}

#[test]
fn blend_into_subview() {
    let mut image = Image::filled(Resolution::new(3, 1), C::BLACK);
    let src = mkimage([[C::WHITE]]);
    image
        .view_mut(Rect::from_top_left(1, 0, 1, 1))
        .blend_from(&src)
        .mode(BlendMode::Overwrite);
    assert_eq!(image, mkimage([[C::BLACK, C::WHITE, C::BLACK]]));
}

#[test]
fn aspect_aware_resize() {
    let image = mkimage([[C::RED, C::RED]]);
    let resized = image.aspect_aware_resize(Resolution::new(2, 2));
    // The content fills the top row, the bottom row is a black bar.
    assert_eq!(resized.resolution(), Resolution::new(2, 2));
    assert!(resized.data().chunks(4).any(|px| px == [255, 0, 0, 255]));
    assert!(resized.data().chunks(4).all(|px| px[3] == 255));
}

#[test]
fn transparency() {
    assert!(!mkimage([[C::RED, C::GREEN]]).has_transparency());
    assert!(mkimage([[C::RED, C::GREEN.with_alpha(254)]]).has_transparency());
}

#[test]
fn filled_rect_blends_translucent_color() {
    let mut image = Image::filled(Resolution::new(4, 4), C::BLACK);
    draw::filled_rect(&mut image, Rect::from_top_left(1, 1, 2, 2)).color(C::WHITE.with_alpha(128));
    assert_eq!(image.get(0, 0), C::BLACK);
    let inside = image.get(1, 1);
    assert!(inside.r() > 100 && inside.r() < 255, "{inside:?}");
    assert_eq!(inside.a(), 255);
}

#[test]
fn rect_outline() {
    let mut image = Image::filled(Resolution::new(5, 5), C::BLACK);
    draw::rect(&mut image, Rect::from_top_left(0, 0, 5, 5)).color(C::GREEN);
    assert_eq!(image.get(0, 0), C::GREEN);
    assert_eq!(image.get(4, 4), C::GREEN);
    assert_eq!(image.get(2, 2), C::BLACK);
}

#[test]
fn text_size() {
    assert_eq!(draw::text_size("", 1), (0, 20));
    assert_eq!(draw::text_size("a", 1), (10, 20));
    // Non-ASCII characters count as one glyph each.
    assert_eq!(draw::text_size("¡Sí!", 2), (80, 40));
}

#[test]
fn scaled_text_stays_in_bounds() {
    let mut image = Image::filled(Resolution::new(100, 100), C::BLACK);
    draw::text(&mut image, 50, 50, "5").scale(4).color(C::WHITE);

    // A 40x80 box is centered on (50, 50).
    let mut lit = Vec::new();
    for y in 0..100 {
        for x in 0..100 {
            if image.get(x, y) != C::BLACK {
                lit.push((x, y));
            }
        }
    }
    assert!(!lit.is_empty());
    assert!(lit
        .iter()
        .all(|&(x, y)| (30..70).contains(&x) && (10..90).contains(&y)));
}
