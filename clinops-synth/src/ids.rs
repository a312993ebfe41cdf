use std::collections::HashSet;

use rand::Rng;

/// Issues prefixed identifiers such as `PAT-1A2B3C4D`, unique across everything it issued.
#[derive(Debug, Default)]
pub(crate) struct IdAllocator {
    issued: HashSet<String>,
}

impl IdAllocator {
    /// Draws ids until one has not been issued before.
    pub(crate) fn next<R: Rng>(&mut self, prefix: &str, rng: &mut R) -> String {
        loop {
            let id = format!("{prefix}-{:08X}", rng.next_u32());
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}
