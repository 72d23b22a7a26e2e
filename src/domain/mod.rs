pub mod auth;
pub mod category;
pub mod post;
pub mod types;
pub mod user;
