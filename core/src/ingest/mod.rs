pub mod rion;
pub mod upload;

pub use rion::RionSource;
pub use upload::{BatchKey, UploadedFile};
