use glam::{Mat3, Vec2, Vec3};

/// Observer direction and view-plane extent.
///
/// `l` rotates about the grid z axis, `b` tilts about y. Both in radians.
/// `width`/`height` are the physical size of the view plane in grid units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct View {
    pub l: f32,
    pub b: f32,
    pub width: f32,
    pub height: f32,
}

impl View {
    pub fn new(l: f32, b: f32, width: f32, height: f32) -> Self {
        Self {
            l,
            b,
            width,
            height,
        }
    }
}

/// Orthonormal view basis expressed in grid coordinates.
///
/// The columns of `Rz(-l) * Ry(b)`: `rx`/`ry` span the image plane and `rz`
/// is the line of sight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewBasis {
    pub rx: Vec3,
    pub ry: Vec3,
    pub rz: Vec3,
}

impl ViewBasis {
    pub fn new(l: f32, b: f32) -> Self {
        let m = Self::rotation(l, b);
        Self {
            rx: m.x_axis,
            ry: m.y_axis,
            rz: m.z_axis,
        }
    }

    fn rotation(l: f32, b: f32) -> Mat3 {
        Mat3::from_rotation_z(-l) * Mat3::from_rotation_y(b)
    }

    /// `p` in view coordinates (the inverse rotation `Ry(-b) * Rz(l)`).
    pub fn to_view(&self, p: Vec3) -> Vec3 {
        Vec3::new(self.rx.dot(p), self.ry.dot(p), self.rz.dot(p))
    }

    /// View-plane position of a grid-space point, e.g. the grid centre.
    pub fn plane_offset(&self, p: Vec3) -> Vec2 {
        self.to_view(p).truncate()
    }
}
