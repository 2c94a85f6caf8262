//! Card identity.

use std::fmt;

use learnify_core::Block;
use serde::{Deserialize, Serialize};

/// Stable identity of a schedulable card.
///
/// Lesson blocks have no server id, so their card id is the composite
/// `"<lesson_id>:<kind>-<order>"`. The same scheme is used when recording
/// answers and when selecting batches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Card id for a block inside a lesson.
    pub fn for_block(lesson_id: &str, block: &Block) -> Self {
        Self(format!("{}:{}", lesson_id, block.local_key()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Anything the scheduler can order. The scheduler never looks past the id.
pub trait Reviewable {
    fn card_id(&self) -> CardId;
}

impl Reviewable for CardId {
    fn card_id(&self) -> CardId {
        self.clone()
    }
}

/// A block together with the lesson and course it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonCard {
    pub lesson_id: String,
    pub course_id: String,
    pub block: Block,
}

impl LessonCard {
    pub fn new(lesson_id: impl Into<String>, course_id: impl Into<String>, block: Block) -> Self {
        Self {
            lesson_id: lesson_id.into(),
            course_id: course_id.into(),
            block,
        }
    }

    /// Every block of a lesson as a card.
    pub fn from_lesson(lesson: &learnify_core::Lesson) -> Vec<Self> {
        lesson
            .blocks
            .iter()
            .map(|block| Self::new(&lesson.id, &lesson.course_id, block.clone()))
            .collect()
    }
}

impl Reviewable for LessonCard {
    fn card_id(&self) -> CardId {
        CardId::for_block(&self.lesson_id, &self.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnify_core::{Lesson, TheoryBlock};

    fn theory(order: i32) -> Block {
        Block::Theory(TheoryBlock {
            order,
            title: format!("Theory {order}"),
            content: "content".to_string(),
            visualization_hint: String::new(),
        })
    }

    #[test]
    fn test_card_id_for_block() {
        let id = CardId::for_block("lesson-1", &theory(3));
        assert_eq!(id.as_str(), "lesson-1:theory-3");
        assert_eq!(id.to_string(), "lesson-1:theory-3");
    }

    #[test]
    fn test_same_block_in_different_lessons_differs() {
        let a = CardId::for_block("lesson-1", &theory(1));
        let b = CardId::for_block("lesson-2", &theory(1));
        assert_ne!(a, b);
    }

    #[test]
    fn test_lesson_cards_use_lesson_and_course() {
        let lesson = Lesson {
            id: "l1".to_string(),
            course_id: "c1".to_string(),
            order: 1,
            title: "Intro".to_string(),
            description: String::new(),
            blocks: vec![theory(1), theory(2)],
        };

        let cards = LessonCard::from_lesson(&lesson);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].course_id, "c1");
        assert_eq!(cards[1].card_id(), CardId::new("l1:theory-2"));
    }

    #[test]
    fn test_card_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&CardId::new("l1:practice-4")).unwrap();
        assert_eq!(json, "\"l1:practice-4\"");
    }
}
