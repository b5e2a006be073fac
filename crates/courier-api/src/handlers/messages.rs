//! Message endpoints: accept send requests, serve message lookups.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;

use courier_core::MessageId;
use courier_db::models::Message;

use crate::error::ApiError;
use crate::router::ApiState;
use crate::services::admission::{CreateOutcome, SmsRequest};

/// `POST /v1/sms/messages` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendSmsRequest {
    pub tenant_id: String,
    pub idempotency_key: String,
    pub to: String,
    pub template_id: String,
    #[serde(default)]
    pub vars: HashMap<String, String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
}

impl SendSmsRequest {
    fn validate(&self) -> Result<(), ApiError> {
        if self.tenant_id.is_empty()
            || self.idempotency_key.is_empty()
            || self.to.is_empty()
            || self.template_id.is_empty()
        {
            return Err(ApiError::Validation("missing required fields".into()));
        }
        Ok(())
    }
}

impl From<SendSmsRequest> for SmsRequest {
    fn from(req: SendSmsRequest) -> Self {
        Self {
            tenant_id: req.tenant_id,
            idempotency_key: req.idempotency_key,
            to: req.to,
            template_id: req.template_id,
            vars: req.vars,
            campaign_id: req.campaign_id,
        }
    }
}

/// Accept a send request: 202 with the admission outcome, 400 on
/// validation failure, 502 when the store or queue is unavailable.
pub async fn create_message(
    State(state): State<ApiState>,
    payload: Result<Json<SendSmsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOutcome>), ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::Validation(rejection.body_text()))?;
    request.validate()?;

    let outcome = state
        .admission
        .create_and_enqueue(request.into(), MessageId::new(), Utc::now())
        .await?;

    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// `GET /v1/messages/{id}`.
pub async fn get_message(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Message>, ApiError> {
    let message = state
        .admission
        .get_message(&id)
        .await?
        .ok_or(ApiError::NotFound {
            resource: "message",
            id,
        })?;

    Ok(Json(message))
}
