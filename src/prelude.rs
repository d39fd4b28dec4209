pub use std::sync::Arc;
pub use std::time::Duration as StdDuration;

pub use anyhow::{anyhow, bail, ensure, Context as _};
pub use tracing::{debug, error, info, info_span, instrument, trace, warn};

pub type AHashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;

pub type DateTime = chrono::DateTime<chrono::Utc>;
pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
