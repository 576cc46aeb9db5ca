use crate::geometry::Rect;
use anyhow::{Result, ensure};

/// Rectangular circuit block.
///
/// Dimensions are fixed at construction; `rotate` exchanges width and height.
/// The position refers to the lower-left corner and is written by the packer.
#[derive(Clone, Debug)]
pub struct Module {
    name: String,
    width: f64,
    height: f64,
    x: f64,
    y: f64,
    rotated: bool,
}

impl Module {
    pub fn new(name: impl Into<String>, width: f64, height: f64) -> Result<Self> {
        let name = name.into();
        ensure!(
            width > 0.0 && height > 0.0 && width.is_finite() && height.is_finite(),
            "module {name} has invalid dimensions {width}x{height}"
        );
        Ok(Module {
            name,
            width,
            height,
            x: 0.0,
            y: 0.0,
            rotated: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn rotated(&self) -> bool {
        self.rotated
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn rect(&self) -> Rect {
        Rect {
            x_min: self.x,
            y_min: self.y,
            x_max: self.x + self.width,
            y_max: self.y + self.height,
        }
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    /// Rotates the module by 90 degrees, exchanging width and height.
    pub fn rotate(&mut self) {
        std::mem::swap(&mut self.width, &mut self.height);
        self.rotated = !self.rotated;
    }
}
