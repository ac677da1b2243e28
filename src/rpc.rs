use serde::{Deserialize, Serialize};

/// Request or response message without fields.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}
