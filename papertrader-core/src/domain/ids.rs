//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order identifier, unique within one broker simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ord-{}", self.0)
    }
}

/// One-cancels-other group identifier (the stop and target legs of a bracket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OcoGroupId(pub u64);
