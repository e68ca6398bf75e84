//! services/runner/src/adapters/http_api.rs
//!
//! The remote session adapter, the concrete implementation of the `SessionApi`
//! port. It talks JSON over HTTP to the tracking API using `reqwest`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;
use workout_session_core::domain::{
    ExerciseRef, ExerciseStatus, LastPerformance, Session, SessionBundle, SessionExercise,
    SessionSet, SessionStatus, SetEdit, SetResult, WorkoutItemRef, WorkoutItemType,
};
use workout_session_core::ports::{FieldError, PortError, PortResult, SessionApi};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An HTTP adapter that implements the `SessionApi` port.
#[derive(Clone)]
pub struct HttpSessionApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSessionApi {
    /// Creates a new `HttpSessionApi` rooted at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, token))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "Calling session API.");
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends the request and decodes a JSON body on success.
    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> PortResult<T> {
        let response = send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed response body: {}", e)))
    }

    /// Sends the request and ignores the body on success.
    async fn send_empty(&self, builder: RequestBuilder) -> PortResult<()> {
        send(builder).await.map(|_| ())
    }
}

async fn send(builder: RequestBuilder) -> PortResult<Response> {
    let response = builder.send().await.map_err(|e| {
        warn!("Session API request failed: {}", e);
        PortError::Unexpected(e.to_string())
    })?;
    if response.status().is_success() {
        Ok(response)
    } else {
        let error = into_port_error(response).await;
        warn!(code = error.code(), "Session API returned an error: {}", error);
        Err(error)
    }
}

//=========================================================================================
// Error Envelope Mapping
//=========================================================================================

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

/// Maps a non-2xx response onto the port's error vocabulary. The `{error: {...}}`
/// envelope wins; the status code is the fallback for bodies that aren't one.
async fn into_port_error(response: Response) -> PortError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let Ok(ErrorEnvelope { error }) = serde_json::from_str::<ErrorEnvelope>(&body) else {
        return match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PortError::Unauthorized,
            StatusCode::NOT_FOUND => PortError::NotFound(body),
            StatusCode::CONFLICT => PortError::Conflict(body),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => PortError::Validation {
                message: body,
                fields: Vec::new(),
            },
            _ => PortError::Unexpected(format!("{}: {}", status, body)),
        };
    };

    let ErrorBody {
        code,
        message,
        details,
    } = error;
    match code.as_str() {
        "VALIDATION_ERROR" => PortError::Validation {
            message,
            fields: details.as_ref().map(field_errors).unwrap_or_default(),
        },
        "NOT_FOUND" => PortError::NotFound(message),
        "CONFLICT" => PortError::Conflict(message),
        "SESSION_ALREADY_ACTIVE" => match details.as_ref().and_then(active_session_id) {
            Some(active_session_id) => PortError::SessionAlreadyActive { active_session_id },
            None => PortError::Conflict(message),
        },
        "SESSION_NOT_ACTIVE" => PortError::SessionNotActive(message),
        "UNAUTHORIZED" => PortError::Unauthorized,
        _ if status == StatusCode::UNAUTHORIZED => PortError::Unauthorized,
        _ => PortError::Unexpected(format!("{}: {}", code, message)),
    }
}

fn active_session_id(details: &serde_json::Value) -> Option<Uuid> {
    details
        .get("activeSessionId")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// Accepts either `[{field, message}]` or a `{field: message}` map.
fn field_errors(details: &serde_json::Value) -> Vec<FieldError> {
    match details {
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                Some(FieldError {
                    field: item.get("field")?.as_str()?.to_string(),
                    message: item.get("message")?.as_str()?.to_string(),
                })
            })
            .collect(),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(field, message)| FieldError {
                field: field.clone(),
                message: message
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| message.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

//=========================================================================================
// "Impure" Wire Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionEnvelope {
    data: SessionRecord,
    #[serde(default)]
    last_session: Option<SessionRecord>,
}
impl SessionEnvelope {
    fn to_domain(self) -> PortResult<SessionBundle> {
        Ok(SessionBundle {
            session: self.data.to_domain()?,
            last_session: self.last_session.map(SessionRecord::to_domain).transpose()?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRecord {
    id: Uuid,
    workout_id: Uuid,
    status: String,
    started_at: DateTime<Utc>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    exercises: Vec<SessionExerciseRecord>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        let mut exercises = self
            .exercises
            .into_iter()
            .map(SessionExerciseRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;
        exercises.sort_by_key(|e| e.position);
        Ok(Session {
            id: self.id,
            workout_id: self.workout_id,
            status: self
                .status
                .parse::<SessionStatus>()
                .map_err(PortError::Unexpected)?,
            started_at: self.started_at,
            completed_at: self.completed_at,
            notes: self.notes,
            exercises,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionExerciseRecord {
    id: Uuid,
    exercise: ExerciseRecord,
    status: String,
    position: u32,
    #[serde(default)]
    workout_item: Option<WorkoutItemRecord>,
    #[serde(default)]
    substituted_from_id: Option<Uuid>,
    #[serde(default)]
    rest_seconds: Option<u32>,
    #[serde(default)]
    sets: Vec<SessionSetRecord>,
}
impl SessionExerciseRecord {
    fn to_domain(self) -> PortResult<SessionExercise> {
        let mut sets: Vec<SessionSet> = self
            .sets
            .into_iter()
            .map(SessionSetRecord::to_domain)
            .collect();
        sets.sort_by_key(|s| s.set_number);
        Ok(SessionExercise {
            id: self.id,
            exercise: self.exercise.to_domain(),
            status: self
                .status
                .parse::<ExerciseStatus>()
                .map_err(PortError::Unexpected)?,
            position: self.position,
            workout_item: self
                .workout_item
                .map(WorkoutItemRecord::to_domain)
                .transpose()?,
            substituted_from_id: self.substituted_from_id,
            rest_seconds: self.rest_seconds,
            sets,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExerciseRecord {
    id: Uuid,
    name: String,
    #[serde(default)]
    muscle_groups: Vec<String>,
}
impl ExerciseRecord {
    fn to_domain(self) -> ExerciseRef {
        ExerciseRef {
            id: self.id,
            name: self.name,
            muscle_groups: self.muscle_groups,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkoutItemRecord {
    id: Uuid,
    #[serde(rename = "type")]
    item_type: String,
    #[serde(default)]
    rest_seconds: Option<u32>,
    #[serde(default)]
    rest_after_seconds: Option<u32>,
}
impl WorkoutItemRecord {
    fn to_domain(self) -> PortResult<WorkoutItemRef> {
        Ok(WorkoutItemRef {
            id: self.id,
            item_type: self
                .item_type
                .parse::<WorkoutItemType>()
                .map_err(PortError::Unexpected)?,
            rest_seconds: self.rest_seconds,
            rest_after_seconds: self.rest_after_seconds,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionSetRecord {
    id: Uuid,
    set_number: u32,
    target_reps: u32,
    #[serde(default, deserialize_with = "lenient_weight")]
    target_weight: Option<f64>,
    #[serde(default)]
    actual_reps: Option<u32>,
    #[serde(default, deserialize_with = "lenient_weight")]
    actual_weight: Option<f64>,
    #[serde(default)]
    rpe: Option<f32>,
    #[serde(default)]
    completed_at: Option<DateTime<Utc>>,
}
impl SessionSetRecord {
    fn to_domain(self) -> SessionSet {
        SessionSet {
            id: self.id,
            set_number: self.set_number,
            target_reps: self.target_reps,
            target_weight: self.target_weight,
            actual_reps: self.actual_reps,
            actual_weight: self.actual_weight,
            rpe: self.rpe,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastPerformanceRecord {
    exercise_id: Uuid,
    performed_at: DateTime<Utc>,
    #[serde(default)]
    sets: Vec<SessionSetRecord>,
}
impl LastPerformanceRecord {
    fn to_domain(self) -> LastPerformance {
        LastPerformance {
            exercise_id: self.exercise_id,
            performed_at: self.performed_at,
            sets: self
                .sets
                .into_iter()
                .map(SessionSetRecord::to_domain)
                .collect(),
        }
    }
}

/// Decimal columns arrive either as JSON numbers or as numeric strings.
fn lenient_weight<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Weight {
        Number(f64),
        Text(String),
    }

    match Option::<Weight>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Weight::Number(n)) => Ok(Some(n)),
        Some(Weight::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

//=========================================================================================
// Request Bodies
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartSessionBody {
    workout_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSessionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

#[derive(Serialize)]
struct UpdateExerciseBody<'a> {
    status: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubstituteBody {
    new_exercise_id: Uuid,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReorderBody<'a> {
    exercise_ids: &'a [Uuid],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordSetBody {
    set_number: u32,
    actual_reps: u32,
    actual_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rpe: Option<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSetBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    actual_reps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    actual_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rpe: Option<f32>,
}

//=========================================================================================
// `SessionApi` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn start_session(&self, workout_id: Uuid) -> PortResult<SessionBundle> {
        let builder = self
            .request(Method::POST, "/sessions")
            .json(&StartSessionBody { workout_id });
        self.send_json::<SessionEnvelope>(builder).await?.to_domain()
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<SessionBundle> {
        let builder = self.request(Method::GET, &format!("/sessions/{}", session_id));
        self.send_json::<SessionEnvelope>(builder).await?.to_domain()
    }

    async fn update_session(
        &self,
        session_id: Uuid,
        status: Option<SessionStatus>,
        notes: Option<String>,
    ) -> PortResult<Session> {
        let body = UpdateSessionBody {
            status: status.as_ref().map(SessionStatus::as_str),
            notes,
        };
        let builder = self
            .request(Method::PATCH, &format!("/sessions/{}", session_id))
            .json(&body);
        self.send_json::<DataEnvelope<SessionRecord>>(builder)
            .await?
            .data
            .to_domain()
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        let builder = self.request(Method::DELETE, &format!("/sessions/{}", session_id));
        self.send_empty(builder).await
    }

    async fn update_exercise_status(
        &self,
        session_id: Uuid,
        exercise_id: Uuid,
        status: ExerciseStatus,
    ) -> PortResult<SessionExercise> {
        let builder = self
            .request(
                Method::PATCH,
                &format!("/sessions/{}/exercises/{}", session_id, exercise_id),
            )
            .json(&UpdateExerciseBody {
                status: status.as_str(),
            });
        self.send_json::<DataEnvelope<SessionExerciseRecord>>(builder)
            .await?
            .data
            .to_domain()
    }

    async fn substitute_exercise(
        &self,
        session_id: Uuid,
        exercise_id: Uuid,
        new_exercise_id: Uuid,
    ) -> PortResult<SessionExercise> {
        let builder = self
            .request(
                Method::POST,
                &format!(
                    "/sessions/{}/exercises/{}/substitute",
                    session_id, exercise_id
                ),
            )
            .json(&SubstituteBody { new_exercise_id });
        self.send_json::<DataEnvelope<SessionExerciseRecord>>(builder)
            .await?
            .data
            .to_domain()
    }

    async fn reorder_exercises(
        &self,
        session_id: Uuid,
        exercise_ids: &[Uuid],
    ) -> PortResult<Vec<SessionExercise>> {
        let builder = self
            .request(
                Method::PUT,
                &format!("/sessions/{}/exercises/reorder", session_id),
            )
            .json(&ReorderBody { exercise_ids });
        self.send_json::<DataEnvelope<Vec<SessionExerciseRecord>>>(builder)
            .await?
            .data
            .into_iter()
            .map(SessionExerciseRecord::to_domain)
            .collect()
    }

    async fn record_set_result(
        &self,
        session_id: Uuid,
        exercise_id: Uuid,
        result: &SetResult,
    ) -> PortResult<SessionSet> {
        let body = RecordSetBody {
            set_number: result.set_number,
            actual_reps: result.actual_reps,
            actual_weight: result.actual_weight,
            rpe: result.rpe,
        };
        let builder = self
            .request(
                Method::POST,
                &format!("/sessions/{}/exercises/{}/sets", session_id, exercise_id),
            )
            .json(&body);
        Ok(self
            .send_json::<DataEnvelope<SessionSetRecord>>(builder)
            .await?
            .data
            .to_domain())
    }

    async fn update_set(&self, session_id: Uuid, edit: &SetEdit) -> PortResult<SessionSet> {
        let body = UpdateSetBody {
            actual_reps: edit.actual_reps,
            actual_weight: edit.actual_weight,
            rpe: edit.rpe,
        };
        let builder = self
            .request(
                Method::PUT,
                &format!("/sessions/{}/sets/{}", session_id, edit.set_id),
            )
            .json(&body);
        Ok(self
            .send_json::<DataEnvelope<SessionSetRecord>>(builder)
            .await?
            .data
            .to_domain())
    }

    async fn delete_set(&self, session_id: Uuid, set_id: Uuid) -> PortResult<()> {
        let builder = self.request(
            Method::DELETE,
            &format!("/sessions/{}/sets/{}", session_id, set_id),
        );
        self.send_empty(builder).await
    }

    async fn get_last_performance(
        &self,
        exercise_id: Uuid,
    ) -> PortResult<Option<LastPerformance>> {
        let builder = self.request(
            Method::GET,
            &format!("/exercises/{}/last-performance", exercise_id),
        );
        match self
            .send_json::<DataEnvelope<Option<LastPerformanceRecord>>>(builder)
            .await
        {
            Ok(envelope) => Ok(envelope.data.map(LastPerformanceRecord::to_domain)),
            Err(PortError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
