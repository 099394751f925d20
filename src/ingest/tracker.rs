//! Open-element stack for a single ingestion pass.

use std::fmt::Display;

use crate::error::IngestError;

/// Tracks which elements are open while a document streams past.
///
/// Handles are pushed after their element has been recorded and popped on the
/// matching end event, so `depth()` always equals the current nesting depth.
/// The parser is responsible for rejecting mismatched tags; the tracker only
/// guards its own stack.
#[derive(Debug)]
pub struct HierarchyTracker<H> {
    stack: Vec<H>,
    max_depth: usize,
}

impl<H: Copy + Display> HierarchyTracker<H> {
    pub fn new() -> Self {
        Self {
            stack: Vec::new(),
            max_depth: 0,
        }
    }

    /// Push the handle of a freshly recorded element. Returns the new depth.
    pub fn on_element_open(&mut self, name: &str, handle: H) -> usize {
        self.stack.push(handle);
        let depth = self.stack.len();
        self.max_depth = self.max_depth.max(depth);
        log::trace!("open <{}> as {} at depth {}", name, handle, depth);
        depth
    }

    /// Pop the innermost element
    pub fn on_element_close(&mut self) -> Result<H, IngestError> {
        self.stack
            .pop()
            .ok_or_else(|| IngestError::Parse("end tag without an open element".to_string()))
    }

    /// Character content is reported against the innermost element, never stored
    pub fn on_text(&self, text: &str) {
        let content = text.trim();
        if content.is_empty() {
            return;
        }
        if let Some(handle) = self.innermost() {
            log::debug!("Content for tag {}: {}", handle, content);
        }
    }

    pub fn innermost(&self) -> Option<H> {
        self.stack.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Check that every element was closed
    pub fn finish(&self) -> Result<(), IngestError> {
        match self.stack.len() {
            0 => Ok(()),
            open => Err(IngestError::Parse(format!(
                "unexpected end of document: {} element(s) still open",
                open
            ))),
        }
    }
}

impl<H: Copy + Display> Default for HierarchyTracker<H> {
    fn default() -> Self {
        Self::new()
    }
}
