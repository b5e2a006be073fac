//! Shared in-memory doubles for API tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use courier_api::AdmissionStore;
use courier_core::MessageState;
use courier_db::models::{CapDecision, IdempotencyResult, Message, NewMessage};
use courier_db::DbError;
use courier_queue::{Job, JobPublisher, QueueError};

#[derive(Clone, Debug)]
pub struct StoredMessage {
    pub new: NewMessage,
    pub state: MessageState,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct FakeStore {
    messages: Mutex<HashMap<String, StoredMessage>>,
    by_idempotency: Mutex<HashMap<(String, String), String>>,
    suppressed: Mutex<HashSet<(String, String)>>,
    opted_in: Mutex<HashSet<(String, String)>>,
    caps: Mutex<HashMap<(String, String, NaiveDate), i32>>,
    hide_next_lookup: AtomicBool,
}

impl FakeStore {
    pub fn opt_in(&self, tenant: &str, phone: &str) {
        self.opted_in
            .lock()
            .unwrap()
            .insert((tenant.to_string(), phone.to_string()));
    }

    pub fn suppress(&self, tenant: &str, phone: &str) {
        self.suppressed
            .lock()
            .unwrap()
            .insert((tenant.to_string(), phone.to_string()));
    }

    /// Make the next idempotency lookup miss, simulating the window where
    /// a concurrent create has inserted but this task's lookup ran first.
    pub fn hide_from_next_lookup(&self) {
        self.hide_next_lookup.store(true, Ordering::SeqCst);
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn last_error_of(&self, id: &str) -> Option<String> {
        self.messages
            .lock()
            .unwrap()
            .get(id)
            .and_then(|m| m.last_error.clone())
    }

    pub fn states_with_last_error(&self, last_error: &str) -> Vec<MessageState> {
        self.messages
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.last_error.as_deref() == Some(last_error))
            .map(|m| m.state)
            .collect()
    }

    pub fn cap_count(&self, tenant: &str, phone: &str, now: DateTime<Utc>) -> i32 {
        self.caps
            .lock()
            .unwrap()
            .get(&(tenant.to_string(), phone.to_string(), now.date_naive()))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug)]
struct UniqueViolation;

impl std::fmt::Display for UniqueViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("duplicate key value violates unique constraint")
    }
}

impl std::error::Error for UniqueViolation {}

impl sqlx::error::DatabaseError for UniqueViolation {
    fn message(&self) -> &str {
        "duplicate key value violates unique constraint"
    }

    fn kind(&self) -> sqlx::error::ErrorKind {
        sqlx::error::ErrorKind::UniqueViolation
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }
}

fn unique_violation() -> DbError {
    DbError::QueryFailed(sqlx::Error::Database(Box::new(UniqueViolation)))
}

#[async_trait]
impl AdmissionStore for FakeStore {
    async fn find_by_idempotency(
        &self,
        tenant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<IdempotencyResult>, DbError> {
        if self.hide_next_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }

        let by_idempotency = self.by_idempotency.lock().unwrap();
        let messages = self.messages.lock().unwrap();
        Ok(by_idempotency
            .get(&(tenant_id.to_string(), idempotency_key.to_string()))
            .and_then(|id| messages.get(id))
            .map(|m| IdempotencyResult {
                message_id: m.new.id.clone(),
                state: m.state,
            }))
    }

    async fn insert_message(&self, new: &NewMessage, now: DateTime<Utc>) -> Result<(), DbError> {
        let mut by_idempotency = self.by_idempotency.lock().unwrap();
        let key = (new.tenant_id.clone(), new.idempotency_key.clone());
        if by_idempotency.contains_key(&key) {
            return Err(unique_violation());
        }

        by_idempotency.insert(key, new.id.clone());
        self.messages.lock().unwrap().insert(
            new.id.clone(),
            StoredMessage {
                new: new.clone(),
                state: MessageState::Queued,
                last_error: None,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(())
    }

    async fn mark_state(
        &self,
        id: &str,
        state: MessageState,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let mut messages = self.messages.lock().unwrap();
        let msg = messages.get_mut(id).expect("message exists");
        msg.state = state;
        msg.last_error = last_error.map(str::to_string);
        msg.updated_at = now;
        Ok(())
    }

    async fn get_message(&self, id: &str) -> Result<Option<Message>, DbError> {
        Ok(self.messages.lock().unwrap().get(id).map(|m| Message {
            id: m.new.id.clone(),
            tenant_id: m.new.tenant_id.clone(),
            to: m.new.to.clone(),
            template_id: m.new.template_id.clone(),
            campaign_id: m.new.campaign_id.clone(),
            state: m.state,
            provider: None,
            provider_msg_id: None,
            last_error: m.last_error.clone(),
            created_at: m.created_at,
            updated_at: m.updated_at,
        }))
    }

    async fn is_suppressed(&self, tenant_id: &str, phone: &str) -> Result<bool, DbError> {
        Ok(self
            .suppressed
            .lock()
            .unwrap()
            .contains(&(tenant_id.to_string(), phone.to_string())))
    }

    async fn is_opted_in(&self, tenant_id: &str, phone: &str) -> Result<bool, DbError> {
        Ok(self
            .opted_in
            .lock()
            .unwrap()
            .contains(&(tenant_id.to_string(), phone.to_string())))
    }

    async fn increment_daily_cap(
        &self,
        tenant_id: &str,
        phone: &str,
        now: DateTime<Utc>,
        max_per_day: i32,
    ) -> Result<CapDecision, DbError> {
        let mut caps = self.caps.lock().unwrap();
        let counter = caps
            .entry((tenant_id.to_string(), phone.to_string(), now.date_naive()))
            .or_insert(0);
        *counter += 1;

        if *counter > max_per_day {
            *counter -= 1;
            Ok(CapDecision {
                allowed: false,
                count: *counter,
            })
        } else {
            Ok(CapDecision {
                allowed: true,
                count: *counter,
            })
        }
    }
}

#[derive(Default)]
pub struct FakePublisher {
    jobs: Mutex<Vec<Job>>,
    fail: bool,
}

impl FakePublisher {
    pub fn failing() -> Self {
        Self {
            jobs: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobPublisher for FakePublisher {
    async fn enqueue(&self, job: &Job) -> Result<(), QueueError> {
        if self.fail {
            return Err(QueueError::Serialization(serde_json::Error::io(
                std::io::Error::other("broker down"),
            )));
        }
        self.jobs.lock().unwrap().push(job.clone());
        Ok(())
    }
}
