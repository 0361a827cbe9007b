pub mod audit;
pub mod integrity;
pub mod metadata;
pub mod review;
pub mod versioning;

pub mod error;
