//! Content and progress entities served by the Learnify REST backend.
//!
//! Field names follow the backend's snake_case JSON. Server timestamps are
//! kept as strings because the backend emits naive ISO-8601 values without
//! an offset.

use serde::{Deserialize, Serialize};

// ============================================================================
// COURSES & CATEGORIES
// ============================================================================

/// Course category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: String,
}

/// Course as returned by `/courses` and `/courses/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    pub title: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    pub subcategory: String,
    pub level: String,
    pub difficulty_score: i32,
    pub estimated_duration_weeks: i32,
    pub estimated_duration_hours: i32,
    pub total_lessons: i32,
    pub total_practice_tasks: i32,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub target_audience: Vec<String>,
    #[serde(default)]
    pub completion_certificate: bool,
    pub short_description: String,
    pub full_description: String,
    #[serde(default)]
    pub learning_outcomes: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    pub cover_image_url: String,
    #[serde(default)]
    pub promo_video_url: Option<String>,
    #[serde(default)]
    pub creation_date: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

/// Response to `POST /courses/{id}/enroll`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseEnrollResponse {
    pub message: String,
    pub course_id: String,
}

// ============================================================================
// LESSONS & BLOCKS
// ============================================================================

/// Lesson entry in a course's lesson list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonSummary {
    pub id: String,
    pub order: i32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// Full lesson with its blocks (cards).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub course_id: String,
    pub order: i32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

/// A lesson block. Blocks have no server id; within a lesson they are
/// identified by kind and order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Theory(TheoryBlock),
    Practice(PracticeBlock),
}

impl Block {
    pub fn kind(&self) -> &'static str {
        match self {
            Block::Theory(_) => "theory",
            Block::Practice(_) => "practice",
        }
    }

    pub fn order(&self) -> i32 {
        match self {
            Block::Theory(b) => b.order,
            Block::Practice(b) => b.order,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Block::Theory(b) => &b.title,
            Block::Practice(b) => &b.title,
        }
    }

    /// `"<kind>-<order>"`, unique within one lesson.
    pub fn local_key(&self) -> String {
        format!("{}-{}", self.kind(), self.order())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheoryBlock {
    pub order: i32,
    pub title: String,
    pub content: String,
    pub visualization_hint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PracticeSubtype {
    MultipleChoice,
    Reflection,
    Case,
    TextInput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeBlock {
    pub subtype: PracticeSubtype,
    pub order: i32,
    pub title: String,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub sample_answer: Option<String>,
}

// ============================================================================
// ACHIEVEMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: String,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(default)]
    pub unlocked_at: Option<String>,
    #[serde(default)]
    pub progress: Option<i32>,
    #[serde(default)]
    pub max_progress: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementUnlockResponse {
    pub message: String,
    pub achievement_id: String,
    pub unlocked_at: String,
}

// ============================================================================
// PROGRESS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockProgressCreate {
    pub block_id: String,
    pub lesson_id: String,
    pub course_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonProgressCreate {
    pub lesson_id: String,
    pub course_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub message: String,
    #[serde(default)]
    pub block_id: Option<String>,
    #[serde(default)]
    pub lesson_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressItem {
    pub block_id: String,
    pub lesson_id: String,
    pub course_id: String,
    #[serde(default)]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub total_blocks_completed: u32,
    #[serde(default)]
    pub progress: Vec<ProgressItem>,
}

impl UserProgress {
    /// Completed block count per lesson id.
    pub fn completed_by_lesson(&self) -> std::collections::BTreeMap<String, u32> {
        let mut counts = std::collections::BTreeMap::new();
        for item in &self.progress {
            *counts.entry(item.lesson_id.clone()).or_insert(0) += 1;
        }
        counts
    }
}

// ============================================================================
// TRAINING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingCards {
    pub cards: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSubmitRequest {
    pub block_id: String,
    pub lesson_id: String,
    pub course_id: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSubmitResponse {
    pub message: String,
    pub next_review: String,
    pub interval: i32,
    pub needs_review: bool,
}

// ============================================================================
// AUTH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLogin {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegister {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub level: i32,
    pub xp: i32,
    pub streak: i32,
    pub daily_goal: i32,
    pub completed_today: i32,
    #[serde(default)]
    pub selected_categories: Vec<serde_json::Value>,
    #[serde(default)]
    pub notifications: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_decodes_by_type_tag() {
        let theory: Block = serde_json::from_value(json!({
            "type": "theory",
            "order": 1,
            "title": "Intro",
            "content": "...",
            "visualization_hint": "diagram"
        }))
        .unwrap();
        assert_eq!(theory.kind(), "theory");
        assert_eq!(theory.local_key(), "theory-1");

        let practice: Block = serde_json::from_value(json!({
            "type": "practice",
            "subtype": "multiple_choice",
            "order": 2,
            "title": "Quiz",
            "options": ["a", "b"],
            "correct_answer": "a"
        }))
        .unwrap();
        assert_eq!(practice.local_key(), "practice-2");
        match practice {
            Block::Practice(p) => {
                assert_eq!(p.subtype, PracticeSubtype::MultipleChoice);
                assert!(p.hints.is_empty());
            }
            Block::Theory(_) => panic!("expected practice block"),
        }
    }

    #[test]
    fn test_course_tolerates_missing_optional_fields() {
        let course: Course = serde_json::from_value(json!({
            "course_id": "c1",
            "title": "Rust",
            "category": {"id": "prog", "name": "Programming", "icon": "code"},
            "subcategory": "systems",
            "level": "Средний",
            "difficulty_score": 6,
            "estimated_duration_weeks": 4,
            "estimated_duration_hours": 20,
            "total_lessons": 10,
            "total_practice_tasks": 30,
            "author": "someone",
            "short_description": "short",
            "full_description": "full",
            "cover_image_url": "https://example.invalid/c.png",
            "creation_date": "2024-01-01T00:00:00"
        }))
        .unwrap();
        assert_eq!(course.category.unwrap().id, "prog");
        assert!(course.tags.is_empty());
        assert!(!course.completion_certificate);
    }

    #[test]
    fn test_completed_by_lesson() {
        let progress = UserProgress {
            total_blocks_completed: 3,
            progress: vec![
                ProgressItem {
                    block_id: "theory-1".into(),
                    lesson_id: "l1".into(),
                    course_id: "c1".into(),
                    completed_at: None,
                },
                ProgressItem {
                    block_id: "practice-2".into(),
                    lesson_id: "l1".into(),
                    course_id: "c1".into(),
                    completed_at: None,
                },
                ProgressItem {
                    block_id: "theory-1".into(),
                    lesson_id: "l2".into(),
                    course_id: "c1".into(),
                    completed_at: None,
                },
            ],
        };
        let counts = progress.completed_by_lesson();
        assert_eq!(counts.get("l1"), Some(&2));
        assert_eq!(counts.get("l2"), Some(&1));
    }
}
