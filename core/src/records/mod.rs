pub mod ppv;
pub mod sample;

pub use ppv::{Period, PpvColumn, PpvRecord};
pub use sample::Sample;
