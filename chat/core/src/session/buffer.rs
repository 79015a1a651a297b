//! Running Buffer
//!
//! Session-local accumulation of streamed reply text.

/// Accumulated reply text for one turn
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunningBuffer {
    text: String,
}

impl RunningBuffer {
    /// Empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one text event: `replace` supersedes, otherwise append
    pub fn apply(&mut self, fragment: &str, replace: bool) {
        if replace {
            self.text.clear();
        }
        self.text.push_str(fragment);
    }

    /// Reset to empty
    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Current content
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether nothing has been accumulated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
