use serde::{Deserialize, Serialize};

/// Position of a passage in the loaded corpus. Row order is significant.
pub type PassageId = usize;

/// One question+answer unit from the knowledge corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    /// Question and answer joined by a space, fixed at load time.
    pub text: String,
}
