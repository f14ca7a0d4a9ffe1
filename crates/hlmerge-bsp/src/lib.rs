pub mod bspfile;
pub mod entity;
pub mod error;
pub mod map;
#[cfg(any(test, feature = "test-fixtures"))]
pub mod testutil;

pub use entity::Entity;
pub use error::BspError;
pub use map::Map;
