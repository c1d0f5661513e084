use serde::{Deserialize, Serialize};

use crate::constants::CALL_CREATE_DEPTH;

/// Dispatcher switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Only the root frame runs; nested primitives succeed without doing
    /// anything.
    pub no_recursion: bool,
    /// Primitives fail with `DepthExceeded` when dispatched above this depth.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            no_recursion: false,
            max_call_depth: CALL_CREATE_DEPTH,
        }
    }
}
