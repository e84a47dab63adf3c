// atelier-common: shared types and utilities for the atelier workspace

pub mod archive;
pub mod name;
pub mod path;
pub mod protocol;
pub mod types;
