pub mod annotate;
pub mod discover;
pub mod document;
pub mod transform;
