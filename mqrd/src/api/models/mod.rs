//! API request/response models.

pub mod decode;
