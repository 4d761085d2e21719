//! Application services: the render pipeline and the ports it drives.

pub mod error;
pub mod ports;
pub mod render;
