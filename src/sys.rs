pub mod clock;
pub mod geometry;
