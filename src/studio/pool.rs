// Image pools - ordered, newest-first collections of records

use super::types::{ImageId, ImageRecord};
use chrono::Utc;

/// Hands out strictly increasing ids based on the wall clock in milliseconds
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> ImageId {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        self.last = now.max(self.last + 1);
        ImageId(self.last)
    }
}

/// A collection of image records for one category
#[derive(Debug, Default, Clone)]
pub struct ImagePool {
    records: Vec<ImageRecord>,
}

impl ImagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record at the front, the position shown first
    pub fn push_front(&mut self, record: ImageRecord) {
        self.records.insert(0, record);
    }

    /// Append a record at the back
    pub fn push_back(&mut self, record: ImageRecord) {
        self.records.push(record);
    }

    pub fn get(&self, id: ImageId) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: ImageId) -> bool {
        self.get(id).is_some()
    }

    pub fn remove(&mut self, id: ImageId) -> Option<ImageRecord> {
        let index = self.records.iter().position(|r| r.id == id)?;
        Some(self.records.remove(index))
    }

    pub fn first(&self) -> Option<&ImageRecord> {
        self.records.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
