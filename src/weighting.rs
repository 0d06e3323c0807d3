// ⚖️ Weighting Engine
// Students who were late, absent, or not called for a while get picked more often.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::roster::Student;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Coefficients of the selection weight.
///
/// weight = 1.0 + late * late_bonus + absent * absent_bonus + recency term,
/// where the recency term is min(days_since_last_call * recency_per_day, recency_cap)
/// for called students and never_called_bonus otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    pub base: f64,
    pub late_bonus: f64,
    pub absent_bonus: f64,
    pub recency_per_day: f64,
    pub recency_cap: f64,
    pub never_called_bonus: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            base: 1.0,
            late_bonus: 0.5,
            absent_bonus: 0.3,
            recency_per_day: 0.1,
            recency_cap: 1.0,
            never_called_bonus: 0.5,
        }
    }
}

/// A student paired with its weight for one roll. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedStudent {
    pub student: Student,
    pub weight: f64,
}

impl WeightConfig {
    /// Every weight must stay at or above 1.0 so no student drops out of the draw.
    pub fn validate(&self) -> Result<(), InputError> {
        if !self.base.is_finite() || self.base < 1.0 {
            return Err(InputError::InvalidWeights(format!(
                "base must be at least 1.0, got {}",
                self.base
            )));
        }

        let bonuses = [
            ("late_bonus", self.late_bonus),
            ("absent_bonus", self.absent_bonus),
            ("recency_per_day", self.recency_per_day),
            ("recency_cap", self.recency_cap),
            ("never_called_bonus", self.never_called_bonus),
        ];
        for (name, value) in bonuses {
            if !value.is_finite() || value < 0.0 {
                return Err(InputError::InvalidWeights(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }

    pub fn weight_for(&self, student: &Student, now: DateTime<Utc>) -> f64 {
        let mut weight = self.base;

        weight += student.late_count as f64 * self.late_bonus;
        weight += student.absent_count as f64 * self.absent_bonus;

        weight += match student.last_roll_time {
            Some(last) => {
                let days = (now - last).num_milliseconds().max(0) as f64 / 1000.0 / SECONDS_PER_DAY;
                (days * self.recency_per_day).min(self.recency_cap)
            }
            None => self.never_called_bonus,
        };

        weight
    }

    /// One weighted entry per student, in roster order.
    pub fn weigh(&self, students: &[Student], now: DateTime<Utc>) -> Vec<WeightedStudent> {
        students
            .iter()
            .map(|student| WeightedStudent {
                student: student.clone(),
                weight: self.weight_for(student, now),
            })
            .collect()
    }
}

/// Weights with the default coefficients.
pub fn compute_weights(students: &[Student], now: DateTime<Utc>) -> Vec<WeightedStudent> {
    WeightConfig::default().weigh(students, now)
}
