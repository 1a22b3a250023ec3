mod loader;

pub use loader::{Config, PathEntry, PathKind, ProbeConfig};
