//! Route handlers for the intake wire API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::dto::{
    CreateComputeDefinitionRequest, CreateFormFieldRequest, CreateFormLogicRequest,
    CreateFormTemplateRequest, CreateRuleSetRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use intake_core::engine::IntakeRequest;
use intake_core::errors::IntakeError;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/studies/:study/forms", post(create_form_template))
        .route(
            "/api/studies/:study/forms/:form_id/fields",
            post(create_form_field),
        )
        .route(
            "/api/studies/:study/forms/:form_id/logic",
            post(create_form_logic),
        )
        .route(
            "/api/studies/:study/compute-definitions",
            post(create_compute_definition),
        )
        .route("/api/studies/:study/rule-sets", post(create_rule_set))
        .route(
            "/api/studies/:study/participants/:pid/intake-submit",
            post(submit_intake),
        )
        .route(
            "/api/studies/:study/participants/:pid/intake-result",
            get(intake_result),
        )
        .with_state(state)
}

/// Bodies arrive as raw JSON so that structural violations map to a 400
/// `InvalidPayload` rather than the extractor's default rejection.
fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError::Engine(IntakeError::InvalidPayload(e.to_string())))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "version": state.version }))
}

async fn create_form_template(
    State(state): State<AppState>,
    Path(study): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let req: CreateFormTemplateRequest = parse_body(body)?;
    let template = state.service()?.create_form_template(
        &study,
        &req.name,
        req.version,
        req.status.as_deref(),
    )?;
    Ok((StatusCode::CREATED, Json(json!({ "form_template": template }))))
}

async fn create_form_field(
    State(state): State<AppState>,
    Path((study, form_id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let req: CreateFormFieldRequest = parse_body(body)?;
    let field = state.service()?.create_form_field(
        &study,
        form_id,
        &req.key,
        &req.label,
        &req.field_type,
        req.required,
        req.options.as_ref(),
        req.validation.as_ref(),
        req.order_index,
    )?;
    Ok((StatusCode::CREATED, Json(json!({ "form_field": field }))))
}

async fn create_form_logic(
    State(state): State<AppState>,
    Path((study, form_id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let req: CreateFormLogicRequest = parse_body(body)?;
    let logic =
        state
            .service()?
            .create_form_logic(&study, form_id, &req.logic, req.order_index)?;
    Ok((StatusCode::CREATED, Json(json!({ "form_logic": logic }))))
}

async fn create_compute_definition(
    State(state): State<AppState>,
    Path(study): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let req: CreateComputeDefinitionRequest = parse_body(body)?;
    let definition = state.service()?.create_compute_definition(
        &study,
        &req.key,
        &req.value_type,
        &req.definition,
        req.version,
        req.status.as_deref(),
    )?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "compute_definition": definition })),
    ))
}

async fn create_rule_set(
    State(state): State<AppState>,
    Path(study): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let req: CreateRuleSetRequest = parse_body(body)?;
    let rule_set = state.service()?.create_rule_set(
        &study,
        &req.rule_type,
        &req.name,
        req.version,
        req.status.as_deref(),
        &req.expression,
    )?;
    Ok((StatusCode::CREATED, Json(json!({ "rule_set": rule_set }))))
}

async fn submit_intake(
    State(state): State<AppState>,
    Path((study, pid)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    let request: IntakeRequest = parse_body(body)?;
    let envelope = state.service()?.submit_intake(&study, &pid, request).await?;
    Ok((StatusCode::CREATED, Json(envelope)))
}

async fn intake_result(
    State(state): State<AppState>,
    Path((study, pid)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let envelope = state.service()?.intake_result(&study, &pid).await?;
    Ok(Json(envelope))
}
