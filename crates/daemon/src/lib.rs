// atelier-daemon library entry point.

pub mod config;
pub mod content;
pub mod registry;
pub mod rpc;
pub mod runtime;
pub mod scope;
pub mod security;
pub mod startup;
pub mod store;
