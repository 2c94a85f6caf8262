//! Learnify Test Utilities
//!
//! Shared test infrastructure for the Learnify workspace:
//! - Scripted mock transport with a call log
//! - Composition helpers wired to a manual clock
//! - Backend JSON fixtures
//! - Proptest generators

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use learnify_client::{
    BreakerRegistry, HttpResponse, LearnifyService, Method, ResilientRequestExecutor,
    RetryOptions, StoredTokenProvider, Transport,
};
use serde_json::Value;

// Re-export the pieces most tests need
pub use learnify_core::{Clock, ManualClock, RequestClass, RequestError};
pub use learnify_storage::{Cache, KvStore, MemoryKvStore};

// ============================================================================
// SCRIPTED TRANSPORT
// ============================================================================

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// Transport that replays queued results in order.
///
/// When the queue runs dry it answers with the fallback result, a
/// `ECONNRESET` transport error unless one was set.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, RequestError>>>,
    fallback: Mutex<Result<HttpResponse, RequestError>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Err(RequestError::transport(
                Some("ECONNRESET"),
                "Network error: connection reset",
            ))),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a 200 response with `body`.
    pub fn push_ok(&self, body: Value) -> &Self {
        self.push(Ok(HttpResponse::ok(body)))
    }

    /// Queue a status error.
    pub fn push_status(&self, status: u16) -> &Self {
        self.push(Err(RequestError::status(status, format!("HTTP {status}"))))
    }

    pub fn push(&self, result: Result<HttpResponse, RequestError>) -> &Self {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).push_back(result);
        self
    }

    /// Result returned once the script is exhausted.
    pub fn set_fallback(&self, result: Result<HttpResponse, RequestError>) {
        *self.fallback.lock().unwrap_or_else(PoisonError::into_inner) = result;
    }

    /// Answer every unscripted call with `status`.
    pub fn fail_with_status(&self, status: u16) {
        self.set_fallback(Err(RequestError::status(status, format!("HTTP {status}"))));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn perform(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<HttpResponse, RequestError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedCall {
            method,
            url: url.to_string(),
            body: body.cloned(),
        });

        let next = self.script.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
        match next {
            Some(result) => result,
            None => self.fallback.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }
}

// ============================================================================
// COMPOSITION
// ============================================================================

pub const TEST_BASE_URL: &str = "http://learnify.test/api";

/// A service wired to a scripted transport and a memory store, on a manual clock.
pub struct TestHarness {
    pub transport: Arc<ScriptedTransport>,
    pub store: Arc<MemoryKvStore>,
    pub clock: Arc<ManualClock>,
    pub breakers: BreakerRegistry,
    pub tokens: Arc<StoredTokenProvider>,
    pub service: LearnifyService,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_retry(RetryOptions::default())
    }

    pub fn with_retry(retry: RetryOptions) -> Self {
        let transport = Arc::new(ScriptedTransport::new());
        let store = Arc::new(MemoryKvStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let breakers = BreakerRegistry::new(clock.clone());

        let executor = ResilientRequestExecutor::new(
            transport.clone(),
            breakers.clone(),
            TEST_BASE_URL,
            retry,
        );
        let cache = Cache::new(store.clone(), clock.clone());
        let tokens = Arc::new(StoredTokenProvider::new(store.clone()));
        let service = LearnifyService::new(executor, cache).with_token_store(tokens.clone());

        Self {
            transport,
            store,
            clock,
            breakers,
            tokens,
            service,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{TEST_BASE_URL}{path}")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Backend-shaped JSON bodies.

    use serde_json::{json, Value};

    pub fn course(id: &str, title: &str) -> Value {
        json!({
            "course_id": id,
            "title": title,
            "category_id": "1",
            "subcategory": "systems",
            "level": "beginner",
            "difficulty_score": 3,
            "estimated_duration_weeks": 4,
            "estimated_duration_hours": 20,
            "total_lessons": 2,
            "total_practice_tasks": 1,
            "tags": ["rust"],
            "author": "Learnify",
            "short_description": format!("{title} in brief"),
            "full_description": format!("{title} from the ground up"),
            "cover_image_url": "https://learnify.test/cover.png"
        })
    }

    pub fn courses() -> Value {
        json!([course("1", "Rust Basics"), course("2", "Async Rust")])
    }

    pub fn theory_block(order: i32) -> Value {
        json!({
            "type": "theory",
            "order": order,
            "title": "What is ownership",
            "content": "Every value has one owner.",
            "visualization_hint": "diagram"
        })
    }

    pub fn practice_block(order: i32) -> Value {
        json!({
            "type": "practice",
            "subtype": "multiple_choice",
            "order": order,
            "title": "Check yourself",
            "question": "Who owns a moved value?",
            "options": ["The old binding", "The new binding"],
            "correct_answer": "The new binding"
        })
    }

    pub fn lesson(id: &str, course_id: &str) -> Value {
        json!({
            "id": id,
            "course_id": course_id,
            "order": 1,
            "title": "Ownership",
            "description": "Moves and borrows",
            "blocks": [theory_block(1), practice_block(2)]
        })
    }

    pub fn categories() -> Value {
        json!([
            {"id": "1", "name": "Programming", "icon": "code"},
            {"id": "2", "name": "Design", "icon": "brush"}
        ])
    }

    pub fn progress(completed: u32) -> Value {
        let items: Vec<Value> = (0..completed)
            .map(|i| {
                json!({
                    "block_id": format!("theory-{i}"),
                    "lesson_id": "l1",
                    "course_id": "1"
                })
            })
            .collect();
        json!({ "total_blocks_completed": completed, "progress": items })
    }

    pub fn tokens(access: &str, refresh: &str) -> Value {
        json!({
            "access_token": access,
            "refresh_token": refresh,
            "token_type": "bearer"
        })
    }

    pub fn progress_response(block_id: &str) -> Value {
        json!({ "message": "Block marked as completed", "block_id": block_id })
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Learnify types.

    use super::*;
    use learnify_training::CardId;
    use proptest::prelude::*;

    /// HTTP statuses the retry policy retries by default.
    pub fn arb_retryable_status() -> impl Strategy<Value = u16> {
        prop::sample::select(vec![408u16, 429, 500, 502, 503, 504])
    }

    /// Client and server statuses the retry policy gives up on.
    pub fn arb_fatal_status() -> impl Strategy<Value = u16> {
        prop::sample::select(vec![400u16, 401, 403, 404, 409, 422, 501])
    }

    pub fn arb_request_class() -> impl Strategy<Value = RequestClass> {
        prop_oneof![
            Just(RequestClass::Read),
            Just(RequestClass::Write),
            Just(RequestClass::Default),
        ]
    }

    pub fn arb_card_id() -> impl Strategy<Value = CardId> {
        ("[a-z0-9]{1,8}", prop_oneof![Just("theory"), Just("practice")], 1i32..20)
            .prop_map(|(lesson, kind, order)| CardId::new(format!("{lesson}:{kind}-{order}")))
    }

    pub fn arb_retry_options() -> impl Strategy<Value = RetryOptions> {
        (0u32..5, 1u64..2_000, 1u64..20_000, 1.0f64..4.0).prop_map(
            |(max_retries, initial_ms, extra_ms, multiplier)| RetryOptions {
                max_retries,
                initial_delay: std::time::Duration::from_millis(initial_ms),
                max_delay: std::time::Duration::from_millis(initial_ms + extra_ms),
                backoff_multiplier: multiplier,
                ..RetryOptions::default()
            },
        )
    }
}
