use anyhow::{Result, ensure};

///Axis-aligned rectangle
#[derive(Clone, Debug, PartialEq, Copy)]
pub struct Rect {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl Rect {
    pub fn try_new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
        ensure!(
            x_min < x_max && y_min < y_max,
            "invalid rectangle, x_min: {x_min}, x_max: {x_max}, y_min: {y_min}, y_max: {y_max}"
        );
        Ok(Rect {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn area(&self) -> f64 {
        (self.x_max - self.x_min) * (self.y_max - self.y_min)
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }

    /// Returns the smallest rectangle that contains both `a` and `b`.
    pub fn bounding_rect(a: Rect, b: Rect) -> Rect {
        Rect {
            x_min: f64::min(a.x_min, b.x_min),
            y_min: f64::min(a.y_min, b.y_min),
            x_max: f64::max(a.x_max, b.x_max),
            y_max: f64::max(a.y_max, b.y_max),
        }
    }

    /// Returns the largest rectangle that is contained in both `a` and `b`.
    pub fn intersection(a: Rect, b: Rect) -> Option<Rect> {
        let x_min = f64::max(a.x_min, b.x_min);
        let y_min = f64::max(a.y_min, b.y_min);
        let x_max = f64::min(a.x_max, b.x_max);
        let y_max = f64::min(a.y_max, b.y_max);
        if x_min < x_max && y_min < y_max {
            Some(Rect {
                x_min,
                y_min,
                x_max,
                y_max,
            })
        } else {
            None
        }
    }

    pub fn translated(self, dx: f64, dy: f64) -> Rect {
        Rect {
            x_min: self.x_min + dx,
            y_min: self.y_min + dy,
            x_max: self.x_max + dx,
            y_max: self.y_max + dy,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_degenerate_rectangles() {
        assert!(Rect::try_new(0.0, 0.0, 0.0, 1.0).is_err());
        assert!(Rect::try_new(2.0, 0.0, 1.0, 1.0).is_err());
        assert!(Rect::try_new(0.0, 0.0, 4.0, 3.0).is_ok());
    }

    #[test]
    fn bounding_and_intersection() {
        let a = Rect::try_new(0.0, 0.0, 4.0, 3.0).unwrap();
        let b = Rect::try_new(2.0, 1.0, 6.0, 5.0).unwrap();

        let bb = Rect::bounding_rect(a, b);
        assert_eq!(bb, Rect::try_new(0.0, 0.0, 6.0, 5.0).unwrap());

        let inter = Rect::intersection(a, b).unwrap();
        assert_eq!(inter, Rect::try_new(2.0, 1.0, 4.0, 3.0).unwrap());

        let c = Rect::try_new(10.0, 10.0, 11.0, 11.0).unwrap();
        assert!(Rect::intersection(a, c).is_none());
    }

    #[test]
    fn translation_preserves_size() {
        let r = Rect::try_new(0.0, 0.0, 4.0, 3.0).unwrap().translated(2.0, 5.0);
        assert_eq!(r, Rect::try_new(2.0, 5.0, 6.0, 8.0).unwrap());
        assert_eq!(r.area(), 12.0);
    }
}
