pub mod math;

pub use math::{
    dot_product, vector_add, vector_compare, vector_is_zero, vector_negate, vector_scale,
    vector_subtract, Bounds, Vec3, VEC3_ORIGIN,
};
