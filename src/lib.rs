//! Render orchestration service: turns a stored HTML template plus caller data into
//! a PDF or PNG artifact via external renderers and hands back its storage location.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
