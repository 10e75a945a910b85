//! Utilities (image encoding, question files).

pub mod image;
pub mod questions;

pub use image::encode_image_data_url;
pub use questions::{read_questions, split_questions};
