//! Marchline - positional engine for armies marching on a road network

pub mod campaign;
pub mod core;
