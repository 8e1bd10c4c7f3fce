use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedDayRecord {
    pub day: u32,
    pub completed_at: DateTime<Utc>,
    pub notes: Option<String>,
    /// Minutes
    pub time_spent: f64,
}

/// Per-caregiver progress through the program days
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub caregiver_id: String,
    pub current_day: u32,
    /// Ordered by day, day numbers unique
    pub completed_days: Vec<CompletedDayRecord>,
    pub total_time_spent: f64,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn new(caregiver_id: &str) -> Self {
        Self {
            caregiver_id: caregiver_id.to_string(),
            current_day: 1,
            completed_days: Vec::new(),
            total_time_spent: 0.0,
            is_completed: false,
            completed_at: None,
        }
    }

    pub fn completion(&self, day: u32) -> Option<&CompletedDayRecord> {
        self.completed_days.iter().find(|entry| entry.day == day)
    }

    pub fn has_completed(&self, day: u32) -> bool {
        self.completion(day).is_some()
    }

    /// Insert a completion keeping the list ordered by day.
    /// Returns false when the day was already recorded.
    pub fn record_completion(&mut self, entry: CompletedDayRecord) -> bool {
        match self.completed_days.binary_search_by_key(&entry.day, |existing| existing.day) {
            Ok(_) => false,
            Err(index) => {
                self.total_time_spent += entry.time_spent;
                self.completed_days.insert(index, entry);
                true
            }
        }
    }

    /// Remove the completion for a day, returning it if present.
    /// `total_time_spent` is an accumulator and is left untouched.
    pub fn remove_completion(&mut self, day: u32) -> Option<CompletedDayRecord> {
        let index = self.completed_days.iter().position(|entry| entry.day == day)?;
        Some(self.completed_days.remove(index))
    }
}
