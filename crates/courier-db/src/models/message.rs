//! `Message` model: the row every pipeline component revolves around.
//!
//! Ownership of transitions is split by component: the admission path
//! creates rows and may suppress or fail them; the dispatch worker owns
//! `queued → processing → submitted`; the reconciler owns
//! `submitted → delivered | failed`. Every transition here is expressed as
//! a conditional UPDATE so replays and races resolve to no-ops instead of
//! double-applies.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::{postgres::PgRow, PgPool, Row};

use courier_core::MessageState;

use crate::error::DbError;

/// Full message row, as returned to API readers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub tenant_id: String,
    pub to: String,
    pub template_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub state: MessageState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_msg_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The slice of a message the dispatch worker needs to process a job.
#[derive(Debug, Clone)]
pub struct MessageForWorker {
    pub tenant_id: String,
    pub to: String,
    pub template_id: String,
    pub campaign_id: Option<String>,
    pub state: MessageState,
    pub provider_msg_id: Option<String>,
    pub vars: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Result of an idempotency lookup.
#[derive(Debug, Clone)]
pub struct IdempotencyResult {
    pub message_id: String,
    pub state: MessageState,
}

/// Fields for inserting a new message. Rows are always born `queued`.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: String,
    pub tenant_id: String,
    pub idempotency_key: String,
    pub to: String,
    pub template_id: String,
    pub vars: HashMap<String, String>,
    pub campaign_id: Option<String>,
}

impl Message {
    /// Look up an existing message by its tenant-scoped idempotency key.
    pub async fn find_by_idempotency(
        pool: &PgPool,
        tenant_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<IdempotencyResult>, DbError> {
        let row = sqlx::query(
            r"
            SELECT id, state FROM messages
            WHERE tenant_id = $1 AND idempotency_key = $2
            ",
        )
        .bind(tenant_id)
        .bind(idempotency_key)
        .fetch_optional(pool)
        .await?;

        row.map(|r| {
            Ok(IdempotencyResult {
                message_id: r.get("id"),
                state: parse_state(&r)?,
            })
        })
        .transpose()
    }

    /// Insert a new message in state `queued`.
    ///
    /// Fails with a unique violation (`DbError::is_unique_violation`) when a
    /// concurrent create already claimed the (tenant, idempotency key) pair.
    pub async fn insert(
        pool: &PgPool,
        new: &NewMessage,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let vars = serde_json::to_value(&new.vars).unwrap_or_default();

        sqlx::query(
            r"
            INSERT INTO messages (
                id, tenant_id, idempotency_key, to_phone, template_id,
                vars_json, campaign_id, state, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            ",
        )
        .bind(&new.id)
        .bind(&new.tenant_id)
        .bind(&new.idempotency_key)
        .bind(&new.to)
        .bind(&new.template_id)
        .bind(&vars)
        .bind(&new.campaign_id)
        .bind(MessageState::Queued.as_str())
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Set a message's state and last error.
    ///
    /// Used by owners that already hold the message (admission after
    /// insert, worker after claim), never for cross-component transitions.
    /// The update is conditioned on the current state being a legal
    /// predecessor of `state`, so an illegal transition (out of a terminal
    /// state in particular) matches zero rows instead of overwriting.
    pub async fn mark_state(
        pool: &PgPool,
        id: &str,
        state: MessageState,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let allowed_from: Vec<String> = state
            .valid_sources()
            .into_iter()
            .map(|from| from.as_str().to_string())
            .collect();

        let result = sqlx::query(
            r"
            UPDATE messages SET state = $2, last_error = $3, updated_at = $4
            WHERE id = $1 AND state = ANY($5)
            ",
        )
        .bind(id)
        .bind(state.as_str())
        .bind(last_error)
        .bind(now)
        .bind(&allowed_from)
        .execute(pool)
        .await?;

        // Callers own the row at this point, so a miss means the machine
        // refused the transition (or the row vanished); surface it.
        if result.rows_affected() == 0 {
            tracing::warn!(
                message_id = %id,
                target_state = %state,
                "State transition refused; message not in a valid source state"
            );
        }

        Ok(())
    }

    /// Record the provider acceptance: provider name, provider message id
    /// and the new state in one statement.
    pub async fn set_provider_details(
        pool: &PgPool,
        id: &str,
        provider: &str,
        provider_msg_id: &str,
        state: MessageState,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"
            UPDATE messages
            SET provider = $2, provider_msg_id = $3, state = $4, updated_at = $5
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(provider)
        .bind(provider_msg_id)
        .bind(state.as_str())
        .bind(now)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Attempt to claim a message for processing.
    ///
    /// Succeeds when the message is `queued`, or when it is `processing`
    /// but went stale (`updated_at` older than `stale_after`), which
    /// reclaims work from a crashed worker. Returns whether the claim
    /// changed anything; `false` means another worker owns it.
    pub async fn claim(
        pool: &PgPool,
        id: &str,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Result<bool, DbError> {
        let stale_before = now - stale_after;

        let result = sqlx::query(
            r"
            UPDATE messages SET state = $2, updated_at = $3
            WHERE id = $1
              AND (state = 'queued' OR (state = 'processing' AND updated_at < $4))
            ",
        )
        .bind(id)
        .bind(MessageState::Processing.as_str())
        .bind(now)
        .bind(stale_before)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apply a provider callback by (provider, provider message id).
    ///
    /// The WHERE clause keeps terminal states terminal: a replayed terminal
    /// callback matches via `state = $3` (a no-op re-apply), while a
    /// conflicting terminal state refuses to change. Returns whether a row
    /// matched — `false` usually means the worker has not persisted the
    /// provider message id yet.
    pub async fn update_by_provider_msg_id(
        pool: &PgPool,
        provider: &str,
        provider_msg_id: &str,
        new_state: MessageState,
        last_error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"
            UPDATE messages
            SET state = $3, last_error = $4, updated_at = $5
            WHERE provider = $1 AND provider_msg_id = $2
              AND (state = $3 OR state IN ('queued', 'processing', 'submitted'))
            ",
        )
        .bind(provider)
        .bind(provider_msg_id)
        .bind(new_state.as_str())
        .bind(last_error)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch a full message row.
    pub async fn get(pool: &PgPool, id: &str) -> Result<Option<Message>, DbError> {
        let row = sqlx::query(
            r"
            SELECT id, tenant_id, to_phone, template_id, campaign_id, state,
                   provider, provider_msg_id, last_error, created_at, updated_at
            FROM messages WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(|r| row_to_message(&r)).transpose()
    }

    /// Fetch the worker's view of a message, including the vars snapshot.
    pub async fn get_for_worker(
        pool: &PgPool,
        id: &str,
    ) -> Result<Option<MessageForWorker>, DbError> {
        let row = sqlx::query(
            r"
            SELECT tenant_id, to_phone, template_id, campaign_id, state,
                   provider_msg_id, vars_json, created_at
            FROM messages WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(|r| {
            let vars_json: serde_json::Value = r.get("vars_json");
            let vars = serde_json::from_value(vars_json).map_err(|e| DbError::CorruptRow {
                table: "messages",
                message: format!("vars_json: {e}"),
            })?;

            Ok(MessageForWorker {
                tenant_id: r.get("tenant_id"),
                to: r.get("to_phone"),
                template_id: r.get("template_id"),
                campaign_id: r.get("campaign_id"),
                state: parse_state(&r)?,
                provider_msg_id: r.get("provider_msg_id"),
                vars,
                created_at: r.get("created_at"),
            })
        })
        .transpose()
    }
}

fn row_to_message(row: &PgRow) -> Result<Message, DbError> {
    Ok(Message {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        to: row.get("to_phone"),
        template_id: row.get("template_id"),
        campaign_id: row.get("campaign_id"),
        state: parse_state(row)?,
        provider: row.get("provider"),
        provider_msg_id: row.get("provider_msg_id"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn parse_state(row: &PgRow) -> Result<MessageState, DbError> {
    let raw: String = row.get("state");
    MessageState::parse(&raw).ok_or_else(|| DbError::CorruptRow {
        table: "messages",
        message: format!("unknown state '{raw}'"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_camel_case() {
        let msg = Message {
            id: "msg_0191".to_string(),
            tenant_id: "t1".to_string(),
            to: "+15550100000".to_string(),
            template_id: "txn_confirm_v1".to_string(),
            campaign_id: None,
            state: MessageState::Queued,
            provider: None,
            provider_msg_id: None,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["tenantId"], "t1");
        assert_eq!(json["templateId"], "txn_confirm_v1");
        assert_eq!(json["state"], "queued");
        // Absent optionals are omitted entirely.
        assert!(json.get("providerMsgId").is_none());
    }
}
