use std::fmt;

use super::Rect;

/// Size (`width x height`) of a camera frame, window, or network input.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    width: u32,
    height: u32,
}

impl Resolution {
    /// 1080p resolution: `1920x1080`
    pub const RES_1080P: Self = Self::new(1920, 1080);

    /// 720p resolution: `1280x720`
    pub const RES_720P: Self = Self::new(1280, 720);

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn num_pixels(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Computes the [`AspectRatio`] of this [`Resolution`].
    ///
    /// If `self` has a width or height of 0, `None` is returned.
    pub fn aspect_ratio(&self) -> Option<AspectRatio> {
        AspectRatio::new(self.width, self.height)
    }

    /// Computes a centered, maximally sized [`Rect`] inside of `self` that has the given aspect
    /// ratio.
    ///
    /// This is the area a letterboxed (or pillarboxed) image of aspect ratio `ratio` occupies when
    /// scaled into `self`.
    pub fn fit_aspect_ratio(&self, ratio: AspectRatio) -> Rect {
        let Some(own_ratio) = self.aspect_ratio() else {
            return Rect::from_top_left(0, 0, self.width, self.height);
        };

        let (x, y, w, h);
        if ratio.as_f32() > own_ratio.as_f32() {
            // Wider than us, bars on top and bottom.
            w = self.width;
            h = (self.width as f32 / ratio.as_f32()) as u32;
            x = 0;
            y = (self.height - h) / 2;
        } else {
            // Taller than (or as wide as) us, bars on the sides.
            w = (self.height as f32 * ratio.as_f32()) as u32;
            h = self.height;
            x = (self.width - w) / 2;
            y = 0;
        }

        Rect::from_top_left(x as i32, y as i32, w, h)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Ratio of a width to a height.
#[derive(PartialEq, Eq, Clone, Copy)]
pub struct AspectRatio {
    // Invariant: both nonzero and reduced (GCD is 1).
    width: u32,
    height: u32,
}

impl AspectRatio {
    /// 1:1 aspect ratio, used by most detection network inputs.
    pub const SQUARE: Self = Self {
        width: 1,
        height: 1,
    };

    /// Creates the aspect ratio representing `width:height`.
    ///
    /// If either `width` or `height` is `0`, returns `None`.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }

        let gcd = gcd(width, height);
        Some(Self {
            width: width / gcd,
            height: height / gcd,
        })
    }

    #[inline]
    pub fn as_f32(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl fmt::Debug for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

const fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b > 0 {
        let t = b;
        b = a % b;
        a = t;
    }

    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(6, 9), 3);
        assert_eq!(gcd(7, 13), 1);
        assert_eq!(gcd(0, 7), 7);
        assert_eq!(gcd(7, 0), 7);
    }

    #[test]
    fn test_aspect_ratio() {
        let ratio = AspectRatio::new(1920, 1080).unwrap();
        assert_eq!(ratio, AspectRatio::new(1280, 720).unwrap());
        assert_eq!(ratio.to_string(), "16:9");
        assert_eq!(AspectRatio::new(0, 10), None);
    }

    #[test]
    fn test_fit_aspect_ratio() {
        // 16:9 camera frame letterboxed into a square network input.
        let rect = Resolution::new(640, 640).fit_aspect_ratio(AspectRatio::new(16, 9).unwrap());
        assert_eq!(rect, Rect::from_top_left(0, 140, 640, 360));

        let rect = Resolution::new(16, 16).fit_aspect_ratio(AspectRatio::new(8, 16).unwrap());
        assert_eq!(rect, Rect::from_top_left(4, 0, 8, 16));

        let rect = Resolution::new(16, 8).fit_aspect_ratio(AspectRatio::new(16, 8).unwrap());
        assert_eq!(rect, Rect::from_top_left(0, 0, 16, 8));
    }
}
