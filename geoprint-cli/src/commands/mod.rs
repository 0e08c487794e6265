//! Command implementations for the GeoPrint CLI

pub mod config;
pub mod legend;
pub mod print;
