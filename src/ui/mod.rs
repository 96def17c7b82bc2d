pub mod admin;
pub mod app;
