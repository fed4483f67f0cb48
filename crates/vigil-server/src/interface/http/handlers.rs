//! 操作员侧 HTTP 处理函数
//!
//! 薄封装：解析输入，调用核心操作，翻译错误。业务规则全部在核心里。

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use vigil_core::agent::{Agent, AgentStatus, Metric, RegisterRequest};
use vigil_core::constants::DEFAULT_EVENT_WINDOW;
use vigil_core::duration::parse_duration;
use vigil_core::error::CoreError;
use vigil_core::policy::{Event, Policy};

use super::error::HttpError;
use super::AppState;

/// 对外展示的 Agent 视图：记录字段加上读取时推导的状态
#[derive(Debug, Serialize)]
pub struct AgentView {
    #[serde(flatten)]
    pub agent: Agent,
    pub status: AgentStatus,
}

pub async fn list_agents(
    State(state): State<AppState>,
) -> Result<Json<Vec<AgentView>>, HttpError> {
    let agents = state.registry.list().await?;
    let views = agents
        .into_iter()
        .map(|agent| AgentView {
            status: state.registry.status(&agent),
            agent,
        })
        .collect();
    Ok(Json(views))
}

pub async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), HttpError> {
    state.registry.register(&req.uid, &req.host_name).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "nats_url": state.nats_url })),
    ))
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<AgentView>, HttpError> {
    let agent = state.registry.get(&uid).await?;
    Ok(Json(AgentView {
        status: state.registry.status(&agent),
        agent,
    }))
}

pub async fn list_metrics(
    State(state): State<AppState>,
) -> Result<Json<Vec<Metric>>, HttpError> {
    Ok(Json(state.ingest.list_metrics().await?))
}

pub async fn ingest_metric(
    State(state): State<AppState>,
    Json(metric): Json<Metric>,
) -> Result<StatusCode, HttpError> {
    state.ingest.ingest_metric(metric).await?;
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub uid: String,
    pub policy_name: String,
    /// 时间窗口，缺省 5m
    pub t: Option<String>,
}

pub async fn query_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, HttpError> {
    if query.uid.is_empty() {
        return Err(CoreError::validation("uid query string required").into());
    }
    if query.policy_name.is_empty() {
        return Err(CoreError::validation("policy_name query string required").into());
    }
    let window = query.t.as_deref().unwrap_or(DEFAULT_EVENT_WINDOW);
    let since = parse_duration(window)
        .map_err(|_| CoreError::validation("malformed time duration"))?;

    let events = state
        .ingest
        .query_events(&query.uid, &query.policy_name, since)
        .await?;
    Ok(Json(events))
}

pub async fn dispatch_policy(
    State(state): State<AppState>,
    Json(policy): Json<Policy>,
) -> Result<StatusCode, HttpError> {
    state.dispatcher.dispatch(&policy).await?;
    Ok(StatusCode::OK)
}
