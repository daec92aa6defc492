pub mod bits;
pub mod canvas;
pub mod color;
pub mod decoder;
pub mod error;
pub mod lzw;
pub mod math;

pub mod prelude;
