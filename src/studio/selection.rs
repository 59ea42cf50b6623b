// Selection set for multi-image composition

use super::error::ValidationError;
use super::types::ImageId;

/// Default number of images that can be composed at once
pub const DEFAULT_MAX_SELECTION: usize = 5;

/// Ordered set of selected ids, bounded by `cap`
#[derive(Debug, Clone)]
pub struct SelectionSet {
    ids: Vec<ImageId>,
    cap: usize,
}

impl SelectionSet {
    pub fn new(cap: usize) -> Self {
        Self {
            ids: Vec::with_capacity(cap),
            cap,
        }
    }

    /// Flip the selection state of `id`.
    ///
    /// Returns `Ok(true)` when the id is now selected and `Ok(false)` when it was
    /// removed. Adding past the cap fails and leaves the set untouched.
    pub fn toggle(&mut self, id: ImageId) -> Result<bool, ValidationError> {
        if self.remove(id) {
            return Ok(false);
        }
        self.insert(id)?;
        Ok(true)
    }

    /// Select `id`; selecting an already selected id is a no-op
    pub fn insert(&mut self, id: ImageId) -> Result<(), ValidationError> {
        if self.contains(id) {
            return Ok(());
        }
        if self.is_full() {
            return Err(ValidationError::SelectionFull { cap: self.cap });
        }
        self.ids.push(id);
        Ok(())
    }

    pub fn remove(&mut self, id: ImageId) -> bool {
        match self.ids.iter().position(|&selected| selected == id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= self.cap
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Selected ids in the order they were picked
    pub fn ids(&self) -> &[ImageId] {
        &self.ids
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}

impl Default for SelectionSet {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SELECTION)
    }
}
