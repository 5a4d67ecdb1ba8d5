//! HTTP request handlers.
//!
//! - [`decode`]: batch Micro QR decoding from multipart uploads

pub mod decode;
