//! Spaced-repetition scheduler.
//!
//! Each card carries an interval (days) and an ease factor. A correct answer
//! grows the interval by the ease factor, an incorrect one halves it and
//! flags the card for review. Intervals are snapped to a fixed ladder of
//! review distances so learners see cards at predictable points.
//!
//! # Batch selection
//!
//! [`SpacedRepetitionScheduler::cards_for_training`] fills at most
//! [`MAX_BATCH_SIZE`] cards from three tiers, in order:
//!
//! 1. cards flagged `needs_review` (up to [`MAX_NEEDS_REVIEW`])
//! 2. cards whose `next_review` has passed (up to [`MAX_DUE_CARDS`])
//! 3. cards with no record yet (up to [`MAX_NEW_CARDS`])
//!
//! Input order is preserved within each tier and no card appears twice.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use learnify_core::{Clock, StorageError, StorageResult, Timestamp};
use learnify_storage::KvStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::card::{CardId, Reviewable};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Allowed review distances in days, ascending.
pub const SNAP_INTERVALS: [u32; 4] = [1, 7, 16, 35];

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MAX_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
const EASE_STEP_UP: f64 = 0.1;
const EASE_STEP_DOWN: f64 = 0.2;

pub const MAX_BATCH_SIZE: usize = 10;
pub const MAX_NEEDS_REVIEW: usize = 5;
pub const MAX_DUE_CARDS: usize = 5;
pub const MAX_NEW_CARDS: usize = 2;

/// Substrate key for persisted scheduler state.
pub const REPETITION_STORAGE_KEY: &str = "learnify_repetition";

// ============================================================================
// RECORDS
// ============================================================================

/// Scheduling state of one card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionData {
    pub card_id: CardId,
    pub lesson_id: String,
    pub course_id: String,
    pub last_review: Option<Timestamp>,
    pub next_review: Option<Timestamp>,
    /// Current review distance in days.
    pub interval: u32,
    pub ease_factor: f64,
    pub needs_review: bool,
    pub mistakes: u32,
}

impl RepetitionData {
    /// Record for a card that has never been answered.
    pub fn new(card_id: CardId, lesson_id: impl Into<String>, course_id: impl Into<String>) -> Self {
        Self {
            card_id,
            lesson_id: lesson_id.into(),
            course_id: course_id.into(),
            last_review: None,
            next_review: None,
            interval: 1,
            ease_factor: DEFAULT_EASE_FACTOR,
            needs_review: false,
            mistakes: 0,
        }
    }

    /// Due when `next_review` lies strictly before `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.next_review.is_some_and(|next| next < now)
    }
}

/// Answer counters for the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub reviewed: u32,
    pub correct: u32,
    /// Percentage of correct answers, 0 to 100.
    pub accuracy: f64,
}

impl TrainingStats {
    fn record(&mut self, correct: bool) {
        self.reviewed += 1;
        if correct {
            self.correct += 1;
        }
        self.accuracy = if self.reviewed > 0 {
            f64::from(self.correct) / f64::from(self.reviewed) * 100.0
        } else {
            0.0
        };
    }
}

/// Result of [`calculate_next_review`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NextReview {
    pub next_review: Timestamp,
    /// Snapped interval in days.
    pub interval: u32,
    pub ease_factor: f64,
}

/// Serializable scheduler state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub records: Vec<RepetitionData>,
    pub stats: TrainingStats,
}

// ============================================================================
// INTERVAL MATH
// ============================================================================

/// Nearest value of [`SNAP_INTERVALS`] to `raw`. Ties go to the smaller one.
pub fn snap_interval(raw: u32) -> u32 {
    SNAP_INTERVALS
        .iter()
        .copied()
        .fold(SNAP_INTERVALS[0], |best, candidate| {
            if candidate.abs_diff(raw) < best.abs_diff(raw) {
                candidate
            } else {
                best
            }
        })
}

fn add_days(now: Timestamp, days: u32) -> Timestamp {
    now.checked_add_signed(TimeDelta::days(i64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Next review for a card given its current record.
///
/// A card with no record is reviewed again tomorrow with the default ease.
pub fn calculate_next_review(
    previous: Option<&RepetitionData>,
    correct: bool,
    now: Timestamp,
) -> NextReview {
    let Some(data) = previous else {
        return NextReview {
            next_review: add_days(now, 1),
            interval: 1,
            ease_factor: DEFAULT_EASE_FACTOR,
        };
    };

    let (raw, ease_factor) = if correct {
        let grown = (f64::from(data.interval) * data.ease_factor).floor();
        (
            grown.clamp(0.0, f64::from(u32::MAX)) as u32,
            (data.ease_factor + EASE_STEP_UP).min(MAX_EASE_FACTOR),
        )
    } else {
        (
            (data.interval / 2).max(1),
            (data.ease_factor - EASE_STEP_DOWN).max(MIN_EASE_FACTOR),
        )
    };

    let interval = snap_interval(raw);
    NextReview {
        next_review: add_days(now, interval),
        interval,
        ease_factor,
    }
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// Owns every card's [`RepetitionData`] and the session statistics.
#[derive(Debug)]
pub struct SpacedRepetitionScheduler {
    records: HashMap<CardId, RepetitionData>,
    stats: TrainingStats,
    clock: Arc<dyn Clock>,
}

impl SpacedRepetitionScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: HashMap::new(),
            stats: TrainingStats::default(),
            clock,
        }
    }

    /// Record an answer and return the card's updated record.
    pub fn submit_answer(
        &mut self,
        card_id: CardId,
        correct: bool,
        lesson_id: &str,
        course_id: &str,
    ) -> RepetitionData {
        let now = self.clock.now();
        let previous = self.records.get(&card_id);
        let next = calculate_next_review(previous, correct, now);

        let mut data = previous
            .cloned()
            .unwrap_or_else(|| RepetitionData::new(card_id.clone(), lesson_id, course_id));
        data.last_review = Some(now);
        data.next_review = Some(next.next_review);
        data.interval = next.interval;
        data.ease_factor = next.ease_factor;
        data.needs_review = !correct;
        if !correct {
            data.mistakes += 1;
        }

        debug!(
            card_id = %card_id,
            correct,
            interval = data.interval,
            ease_factor = data.ease_factor,
            "Scheduled card"
        );

        self.records.insert(card_id, data.clone());
        self.stats.record(correct);
        data
    }

    /// Clear the review flag on a card. Unknown cards are ignored.
    pub fn mark_reviewed(&mut self, card_id: &CardId) {
        if let Some(data) = self.records.get(card_id) {
            let updated = RepetitionData {
                needs_review: false,
                ..data.clone()
            };
            self.records.insert(card_id.clone(), updated);
        }
    }

    /// Select the next training batch from `cards`.
    pub fn cards_for_training<C>(&self, cards: &[C]) -> Vec<C>
    where
        C: Reviewable + Clone,
    {
        let now = self.clock.now();
        let keyed: Vec<(CardId, &C)> = cards.iter().map(|c| (c.card_id(), c)).collect();

        let mut seen = HashSet::new();
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        let mut take_tier = |in_tier: &dyn Fn(&CardId) -> bool, cap: usize| {
            let mut taken = 0;
            for (id, card) in &keyed {
                if taken == cap {
                    break;
                }
                if in_tier(id) && seen.insert(id.clone()) {
                    batch.push((*card).clone());
                    taken += 1;
                }
            }
        };

        take_tier(
            &|id| self.records.get(id).is_some_and(|d| d.needs_review),
            MAX_NEEDS_REVIEW,
        );
        take_tier(
            &|id| {
                self.records
                    .get(id)
                    .is_some_and(|d| !d.needs_review && d.is_due(now))
            },
            MAX_DUE_CARDS,
        );
        take_tier(&|id| !self.records.contains_key(id), MAX_NEW_CARDS);

        batch.truncate(MAX_BATCH_SIZE);
        batch
    }

    pub fn record(&self, card_id: &CardId) -> Option<&RepetitionData> {
        self.records.get(card_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn session_stats(&self) -> &TrainingStats {
        &self.stats
    }

    /// Reset session counters; records are kept.
    pub fn reset_session(&mut self) {
        self.stats = TrainingStats::default();
    }

    // === Persistence ===

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let mut records: Vec<RepetitionData> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.card_id.cmp(&b.card_id));
        SchedulerSnapshot {
            records,
            stats: self.stats.clone(),
        }
    }

    /// Replace all state with `snapshot`.
    pub fn restore(&mut self, snapshot: SchedulerSnapshot) {
        self.records = snapshot
            .records
            .into_iter()
            .map(|data| (data.card_id.clone(), data))
            .collect();
        self.stats = snapshot.stats;
    }

    /// Persist the snapshot under [`REPETITION_STORAGE_KEY`].
    pub fn save_to(&self, store: &dyn KvStore) -> StorageResult<()> {
        let encoded =
            serde_json::to_string(&self.snapshot()).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        store.write(REPETITION_STORAGE_KEY, &encoded)
    }

    /// Restore from [`REPETITION_STORAGE_KEY`]. Returns `false` when nothing
    /// was stored, leaving current state untouched.
    pub fn load_from(&mut self, store: &dyn KvStore) -> StorageResult<bool> {
        let Some(raw) = store.read(REPETITION_STORAGE_KEY)? else {
            return Ok(false);
        };
        let snapshot: SchedulerSnapshot =
            serde_json::from_str(&raw).map_err(|e| StorageError::Serialization {
                reason: e.to_string(),
            })?;
        debug!(records = snapshot.records.len(), "Restored repetition state");
        self.restore(snapshot);
        Ok(true)
    }
}
