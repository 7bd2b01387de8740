pub mod analysis;
pub mod candidate;
pub mod feedback;
pub mod session;
pub mod user;

use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 500;

/// `?skip=&limit=` pagination shared by every listing endpoint.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_LIMIT
}

impl Default for Page {
    fn default() -> Self {
        Page {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    /// Clamps client input into a safe window.
    pub fn normalized(self) -> Self {
        Page {
            skip: self.skip.max(0),
            limit: self.limit.clamp(1, MAX_LIMIT),
        }
    }

    /// Unbounded window for internal aggregation; never built from client input.
    pub fn all() -> Self {
        Page {
            skip: 0,
            limit: i64::MAX,
        }
    }

    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        items
            .into_iter()
            .skip(usize::try_from(self.skip).unwrap_or(0))
            .take(usize::try_from(self.limit).unwrap_or(usize::MAX))
            .collect()
    }
}
