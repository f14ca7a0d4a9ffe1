// math.rs — vector and bounding-box primitives shared by all crates

pub type Vec3 = [f32; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

// ============================================================
// Vector helpers
// ============================================================

pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

pub fn vector_negate(v: &Vec3) -> Vec3 {
    [-v[0], -v[1], -v[2]]
}

pub fn vector_compare(a: &Vec3, b: &Vec3) -> bool {
    a[0] == b[0] && a[1] == b[1] && a[2] == b[2]
}

pub fn vector_is_zero(v: &Vec3) -> bool {
    v[0] == 0.0 && v[1] == 0.0 && v[2] == 0.0
}

// ============================================================
// Axis-aligned bounding box
// ============================================================

/// Value used to initialize cleared bounds so any real point replaces it.
const BOGUS_RANGE: f32 = 99999.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub mins: Vec3,
    pub maxs: Vec3,
}

impl Bounds {
    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    /// Inverted bounds; adding any point produces a valid box.
    pub fn cleared() -> Self {
        Self {
            mins: [BOGUS_RANGE; 3],
            maxs: [-BOGUS_RANGE; 3],
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.mins[0] > self.maxs[0]
    }

    pub fn add_point(&mut self, p: &Vec3) {
        for i in 0..3 {
            if p[i] < self.mins[i] {
                self.mins[i] = p[i];
            }
            if p[i] > self.maxs[i] {
                self.maxs[i] = p[i];
            }
        }
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        let mut out = *self;
        out.add_point(&other.mins);
        out.add_point(&other.maxs);
        out
    }

    /// Strict overlap test: boxes sharing only a face do not intersect.
    pub fn intersects(&self, other: &Bounds) -> bool {
        for i in 0..3 {
            if self.maxs[i] <= other.mins[i] || other.maxs[i] <= self.mins[i] {
                return false;
            }
        }
        true
    }

    pub fn size(&self) -> Vec3 {
        vector_subtract(&self.maxs, &self.mins)
    }

    pub fn center(&self) -> Vec3 {
        vector_scale(&vector_add(&self.mins, &self.maxs), 0.5)
    }

    pub fn translate(&self, offset: &Vec3) -> Bounds {
        Bounds {
            mins: vector_add(&self.mins, offset),
            maxs: vector_add(&self.maxs, offset),
        }
    }
}

// ============================================================
// Tests
// ============================================================
