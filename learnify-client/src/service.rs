//! Caching service layer over the backend's resources.
//!
//! Reads store the raw JSON body under a per-resource key and fall back to
//! that body when the request fails. Writes bypass the cache, run with at
//! most one retry (never more than reads get), and invalidate the per-user
//! keys they make stale.

use std::sync::Arc;
use std::time::Duration;

use learnify_core::{
    Achievement, AchievementUnlockResponse, ApiError, BlockProgressCreate, Category, Course,
    CourseEnrollResponse, Lesson, LessonProgressCreate, LessonSummary, ProgressResponse,
    RequestError, TokenResponse, TrainingCards, TrainingSubmitRequest, TrainingSubmitResponse,
    UserLogin, UserProfile, UserProgress, UserRegister,
};
use learnify_storage::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{StoredTokenProvider, TokenProvider};
use crate::constants::{DETAIL_CACHE_TTL, LIST_CACHE_TTL, USER_CACHE_TTL, WRITE_MAX_RETRIES};
use crate::executor::ResilientRequestExecutor;
use crate::retry::RetryOverrides;
use crate::transport::Method;

// ============================================================================
// CACHE KEYS
// ============================================================================

pub mod keys {
    pub const COURSES_ALL: &str = "courses_all";
    pub const CATEGORIES_ALL: &str = "categories_all";
    pub const ACHIEVEMENTS_ALL: &str = "achievements_all";
    pub const PROGRESS_ALL: &str = "progress_all";
    pub const TRAINING_CARDS: &str = "training_cards";
    pub const PROFILE_ME: &str = "profile_me";

    pub fn courses_in_category(category_id: &str) -> String {
        format!("courses_category_{category_id}")
    }

    pub fn course(course_id: &str) -> String {
        format!("course_{course_id}")
    }

    pub fn course_lessons(course_id: &str) -> String {
        format!("course_{course_id}_lessons")
    }

    pub fn lesson(lesson_id: &str) -> String {
        format!("lesson_{lesson_id}")
    }

    /// Keys whose contents change when the user makes progress.
    pub const USER_PROGRESS: [&str; 3] = [PROGRESS_ALL, TRAINING_CARDS, ACHIEVEMENTS_ALL];
}

// ============================================================================
// SERVICE
// ============================================================================

#[derive(Debug, Clone)]
pub struct LearnifyService {
    executor: ResilientRequestExecutor,
    cache: Cache,
    tokens: Option<Arc<StoredTokenProvider>>,
}

impl LearnifyService {
    pub fn new(executor: ResilientRequestExecutor, cache: Cache) -> Self {
        Self {
            executor,
            cache,
            tokens: None,
        }
    }

    /// Persist tokens returned by login/register/refresh in `tokens`.
    pub fn with_token_store(mut self, tokens: Arc<StoredTokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn executor(&self) -> &ResilientRequestExecutor {
        &self.executor
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    // === Courses ===

    pub async fn courses(&self, category_id: Option<&str>) -> Result<Vec<Course>, ApiError> {
        match category_id {
            Some(id) => {
                let url = self
                    .executor
                    .url_with_query("/courses", &[("category_id", id)])?;
                self.cached_get(&url, &keys::courses_in_category(id), LIST_CACHE_TTL)
                    .await
            }
            None => {
                self.cached_get("/courses", keys::COURSES_ALL, LIST_CACHE_TTL)
                    .await
            }
        }
    }

    pub async fn course(&self, course_id: &str) -> Result<Course, ApiError> {
        let path = format!("/courses/{course_id}");
        self.cached_get(&path, &keys::course(course_id), DETAIL_CACHE_TTL)
            .await
    }

    pub async fn course_lessons(&self, course_id: &str) -> Result<Vec<LessonSummary>, ApiError> {
        let path = format!("/courses/{course_id}/lessons");
        self.cached_get(&path, &keys::course_lessons(course_id), LIST_CACHE_TTL)
            .await
    }

    pub async fn enroll_course(&self, course_id: &str) -> Result<CourseEnrollResponse, ApiError> {
        let path = format!("/courses/{course_id}/enroll");
        self.write(Method::Post, &path, None, &keys::USER_PROGRESS)
            .await
    }

    // === Lessons & categories ===

    pub async fn lesson(&self, lesson_id: &str) -> Result<Lesson, ApiError> {
        let path = format!("/lessons/{lesson_id}");
        self.cached_get(&path, &keys::lesson(lesson_id), DETAIL_CACHE_TTL)
            .await
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        self.cached_get("/categories", keys::CATEGORIES_ALL, LIST_CACHE_TTL)
            .await
    }

    // === Achievements ===

    pub async fn achievements(&self) -> Result<Vec<Achievement>, ApiError> {
        self.cached_get("/achievements", keys::ACHIEVEMENTS_ALL, USER_CACHE_TTL)
            .await
    }

    pub async fn unlock_achievement(
        &self,
        achievement_id: &str,
    ) -> Result<AchievementUnlockResponse, ApiError> {
        let path = format!("/achievements/{achievement_id}/unlock");
        self.write(Method::Post, &path, None, &[keys::ACHIEVEMENTS_ALL])
            .await
    }

    // === Progress ===

    pub async fn progress(&self) -> Result<UserProgress, ApiError> {
        self.cached_get("/progress", keys::PROGRESS_ALL, USER_CACHE_TTL)
            .await
    }

    pub async fn mark_block_completed(
        &self,
        request: &BlockProgressCreate,
    ) -> Result<ProgressResponse, ApiError> {
        let body = to_body(request)?;
        self.write(Method::Post, "/progress/block", Some(body), &keys::USER_PROGRESS)
            .await
    }

    pub async fn mark_lesson_completed(
        &self,
        request: &LessonProgressCreate,
    ) -> Result<ProgressResponse, ApiError> {
        let body = to_body(request)?;
        self.write(Method::Post, "/progress/lesson", Some(body), &keys::USER_PROGRESS)
            .await
    }

    // === Training ===

    pub async fn training_cards(&self) -> Result<TrainingCards, ApiError> {
        self.cached_get("/training/cards", keys::TRAINING_CARDS, USER_CACHE_TTL)
            .await
    }

    pub async fn submit_training_answer(
        &self,
        request: &TrainingSubmitRequest,
    ) -> Result<TrainingSubmitResponse, ApiError> {
        let body = to_body(request)?;
        self.write(Method::Post, "/training/submit", Some(body), &keys::USER_PROGRESS)
            .await
    }

    // === Auth ===

    pub async fn login(&self, credentials: &UserLogin) -> Result<TokenResponse, ApiError> {
        let body = to_body(credentials)?;
        let tokens: TokenResponse = self
            .write(Method::Post, "/auth/login", Some(body), &[])
            .await?;
        self.start_session(&tokens);
        Ok(tokens)
    }

    pub async fn register(&self, user: &UserRegister) -> Result<TokenResponse, ApiError> {
        let body = to_body(user)?;
        let tokens: TokenResponse = self
            .write(Method::Post, "/auth/register", Some(body), &[])
            .await?;
        self.start_session(&tokens);
        Ok(tokens)
    }

    /// Exchange the stored refresh token for a new pair. Returns `None` when
    /// there is no refresh token; a rejected refresh clears the session.
    pub async fn refresh_session(&self) -> Option<TokenResponse> {
        let store = self.tokens.as_ref()?;
        let refresh_token = store.refresh_token()?;

        let result: Result<TokenResponse, ApiError> = self
            .write(
                Method::Post,
                "/auth/refresh",
                Some(json!({ "refresh_token": refresh_token })),
                &[],
            )
            .await;

        match result {
            Ok(tokens) => {
                if let Err(e) = store.save_tokens(&tokens) {
                    warn!(error = %e, "Failed to persist refreshed tokens");
                }
                Some(tokens)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                store.clear_tokens();
                None
            }
        }
    }

    pub fn logout(&self) {
        if let Some(store) = &self.tokens {
            store.clear_tokens();
        }
        self.invalidate(&[keys::PROFILE_ME]);
        self.invalidate(&keys::USER_PROGRESS);
        info!("Logged out");
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens
            .as_ref()
            .is_some_and(|store| store.is_authenticated())
    }

    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        self.cached_get("/auth/profile", keys::PROFILE_ME, USER_CACHE_TTL)
            .await
    }

    // === Plumbing ===

    /// GET `path` and cache the body under `key` once it decodes. A failed
    /// request or an undecodable body falls back to the cached body.
    async fn cached_get<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<T, ApiError> {
        let err = match self.executor.get(path, None).await {
            Ok(response) => match serde_json::from_value::<T>(response.body.clone()) {
                Ok(value) => {
                    self.cache.set(key, &response.body, ttl);
                    return Ok(value);
                }
                Err(e) => ApiError::from(RequestError::Decode {
                    message: e.to_string(),
                }),
            },
            Err(err) => ApiError::from(err),
        };

        match self.cache.get::<Value>(key) {
            Some(cached) => {
                warn!(key, error = %err, "Request failed, serving stale cache");
                decode(cached)
            }
            None => Err(err),
        }
    }

    async fn write<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        invalidates: &[&str],
    ) -> Result<T, ApiError> {
        let budget = WRITE_MAX_RETRIES.min(self.executor.retry_options().max_retries);
        let overrides = RetryOverrides::max_retries(budget);
        let response = self
            .executor
            .request(method, path, body.as_ref(), None, Some(&overrides))
            .await?;
        self.invalidate(invalidates);
        decode(response.body)
    }

    fn invalidate(&self, keys: &[&str]) {
        for key in keys {
            self.cache.delete(key);
        }
    }

    fn start_session(&self, tokens: &TokenResponse) {
        if let Some(store) = &self.tokens {
            if let Err(e) = store.save_tokens(tokens) {
                warn!(error = %e, "Failed to persist tokens");
            }
        }
        self.invalidate(&[keys::PROFILE_ME]);
        self.invalidate(&keys::USER_PROGRESS);
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| {
        ApiError::from(RequestError::Decode {
            message: e.to_string(),
        })
    })
}

fn to_body<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::new(format!("Invalid request body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_keys() {
        assert_eq!(keys::courses_in_category("7"), "courses_category_7");
        assert_eq!(keys::course("7"), "course_7");
        assert_eq!(keys::course_lessons("7"), "course_7_lessons");
        assert_eq!(keys::lesson("l1"), "lesson_l1");
    }

    #[test]
    fn test_decode_failure_is_api_error() {
        let err = decode::<Vec<Course>>(json!({"not": "a list"})).unwrap_err();
        assert!(err.message.contains("Invalid response body"));
        assert_eq!(err.status, None);
    }
}
