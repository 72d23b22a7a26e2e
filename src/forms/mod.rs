pub mod errors;
pub mod posts;
