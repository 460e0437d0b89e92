use std::collections::HashMap;

/// Remote flush outcomes per course.
#[derive(Debug, Default)]
pub struct FlushMetrics {
    success_counts: HashMap<String, u64>,
    failure_counts: HashMap<String, u64>,
    skipped_counts: HashMap<String, u64>,
}

impl FlushMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, course_id: &str) {
        *self
            .success_counts
            .entry(course_id.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_failure(&mut self, course_id: &str) {
        *self
            .failure_counts
            .entry(course_id.to_string())
            .or_insert(0) += 1;
    }

    /// Flushes not attempted because the circuit was open.
    pub fn record_skipped(&mut self, course_id: &str) {
        *self
            .skipped_counts
            .entry(course_id.to_string())
            .or_insert(0) += 1;
    }

    pub fn get_success_count(&self, course_id: &str) -> u64 {
        *self.success_counts.get(course_id).unwrap_or(&0)
    }

    pub fn get_failure_count(&self, course_id: &str) -> u64 {
        *self.failure_counts.get(course_id).unwrap_or(&0)
    }

    pub fn get_skipped_count(&self, course_id: &str) -> u64 {
        *self.skipped_counts.get(course_id).unwrap_or(&0)
    }

    pub fn get_success_rate(&self, course_id: &str) -> f32 {
        let success = self.get_success_count(course_id) as f32;
        let total = success + self.get_failure_count(course_id) as f32;

        if total == 0.0 {
            0.0
        } else {
            success / total
        }
    }
}
