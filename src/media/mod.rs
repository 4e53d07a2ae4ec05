pub mod analysis;
pub mod storage;

pub use analysis::{analyze_image, ImageAnalysis};
pub use storage::{FileKind, UploadPolicy, UploadRejection, UploadStore};
