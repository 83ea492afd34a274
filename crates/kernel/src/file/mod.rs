//! Image uploads: compression and local storage.

pub mod compress;
pub mod storage;

pub use compress::{ImageError, ImageProcessor, JPEG_QUALITY, MAX_DIMENSION, compress_jpeg};
pub use storage::{ALLOWED_IMAGE_TYPES, LocalImageStore, StoredImage};
