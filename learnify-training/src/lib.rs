//! Learnify Training
//!
//! Spaced-repetition scheduling for flashcard-style review. The scheduler
//! keeps one [`RepetitionData`] record per [`CardId`], updates it on every
//! answer and picks the next batch of cards to show.

pub mod card;
pub mod scheduler;

pub use card::{CardId, LessonCard, Reviewable};
pub use scheduler::{
    calculate_next_review, snap_interval, NextReview, RepetitionData, SchedulerSnapshot,
    SpacedRepetitionScheduler, TrainingStats, DEFAULT_EASE_FACTOR, MAX_BATCH_SIZE,
    MAX_EASE_FACTOR, MAX_NEEDS_REVIEW, MAX_NEW_CARDS, MAX_DUE_CARDS, MIN_EASE_FACTOR,
    REPETITION_STORAGE_KEY, SNAP_INTERVALS,
};
