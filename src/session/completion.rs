use std::collections::HashSet;

/// Lectures finished in this session. Only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSet {
    ids: HashSet<String>,
}

impl CompletionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `lecture_id` was not already complete.
    pub fn insert(&mut self, lecture_id: &str) -> bool {
        self.ids.insert(lecture_id.to_string())
    }

    pub fn contains(&self, lecture_id: &str) -> bool {
        self.ids.contains(lecture_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}
