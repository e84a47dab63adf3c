// Scope-relative request path handling.

pub mod normalize;

pub use normalize::{join_relative, normalize_request_path, PathError};
