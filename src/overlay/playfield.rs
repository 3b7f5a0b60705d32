use crate::foundation::core::{
    Affine, Canvas, PLAYFIELD_HEIGHT, PLAYFIELD_WIDTH, Point, Rect, clamp_or,
};

/// Affine map from the 512x384 logical playfield onto a centered pixel rectangle.
///
/// The rectangle keeps the playfield aspect ratio (uniform scale) and has integral origin and size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayfieldMapping {
    canvas: Canvas,
    scale: f64,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl PlayfieldMapping {
    /// Fit the playfield into `canvas`.
    pub fn new(canvas: Canvas) -> Self {
        let (cw, ch) = (f64::from(canvas.width), f64::from(canvas.height));
        let scale = (cw / PLAYFIELD_WIDTH).min(ch / PLAYFIELD_HEIGHT);
        let width = (PLAYFIELD_WIDTH * scale).round();
        let height = (PLAYFIELD_HEIGHT * scale).round();
        Self {
            canvas,
            scale,
            x: ((cw - width) / 2.0).round() as u32,
            y: ((ch - height) / 2.0).round() as u32,
            width: width as u32,
            height: height as u32,
        }
    }

    /// Output canvas the mapping was built for.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Playfield-unit to pixel scale factor.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Left edge in pixels.
    pub fn x(&self) -> u32 {
        self.x
    }

    /// Top edge in pixels.
    pub fn y(&self) -> u32 {
        self.y
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel rectangle covered by the playfield.
    pub fn rect(&self) -> Rect {
        Rect::new(
            f64::from(self.x),
            f64::from(self.y),
            f64::from(self.x + self.width),
            f64::from(self.y + self.height),
        )
    }

    /// Playfield-to-pixel transform (without clamping or rounding).
    pub fn transform(&self) -> Affine {
        Affine::translate((f64::from(self.x), f64::from(self.y)))
            * Affine::scale_non_uniform(
                f64::from(self.width) / PLAYFIELD_WIDTH,
                f64::from(self.height) / PLAYFIELD_HEIGHT,
            )
    }

    /// Map a playfield position to whole pixels. Positions outside the field are clamped onto it.
    pub fn map(&self, x: f64, y: f64) -> (i64, i64) {
        let p = self.transform()
            * Point::new(
                clamp_or(x, 0.0, PLAYFIELD_WIDTH, 0.0),
                clamp_or(y, 0.0, PLAYFIELD_HEIGHT, 0.0),
            );
        (p.x.round() as i64, p.y.round() as i64)
    }

    /// Grid and border guide geometry for this rectangle.
    pub fn guides(&self) -> PlayfieldGuides {
        PlayfieldGuides {
            grid_step_x: (f64::from(self.width) / 8.0).round().max(24.0) as u32,
            grid_step_y: (f64::from(self.height) / 6.0).round().max(24.0) as u32,
            border: (f64::from(self.width.min(self.height)) / 180.0)
                .round()
                .max(2.0) as u32,
        }
    }
}

/// Grid spacing and border thickness drawn around the playfield.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlayfieldGuides {
    /// Horizontal grid step in pixels.
    pub grid_step_x: u32,
    /// Vertical grid step in pixels.
    pub grid_step_y: u32,
    /// Border thickness in pixels.
    pub border: u32,
}

#[cfg(test)]
#[path = "../../tests/unit/overlay/playfield.rs"]
mod tests;
