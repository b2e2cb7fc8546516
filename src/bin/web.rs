//! Procure Web API
//!
//! 启动: cargo run --bin procure-web --features web
//! POST /api/chat、POST /api/chat/stream（SSE）、GET /api/codes/export、POST /api/codes/remove

#![cfg(feature = "web")]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use procure::config::load_config;
use procure::react::AgentEvent;
use procure::session::{SessionState, StateSnapshot};
use procure::{
    create_agent_components, process_message, process_message_stream, AgentComponents,
    Conversation,
};

struct ConversationEntry {
    conv: Arc<Mutex<Conversation>>,
    last_used: Instant,
}

struct AppState {
    components: Arc<AgentComponents>,
    /// conversation_id -> 对话；每个对话一把锁，同一对话的轮次串行执行
    conversations: RwLock<HashMap<String, ConversationEntry>>,
}

impl AppState {
    fn new(components: AgentComponents) -> Self {
        Self {
            components: Arc::new(components),
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// 取出已有对话或新建；未给出 id 时生成 uuid
    async fn conversation(&self, id: Option<String>) -> (String, Arc<Mutex<Conversation>>) {
        let id = id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut map = self.conversations.write().await;
        let entry = map.entry(id.clone()).or_insert_with(|| ConversationEntry {
            conv: Arc::new(Mutex::new(self.components.new_conversation(id.clone()))),
            last_used: Instant::now(),
        });
        entry.last_used = Instant::now();
        (id, entry.conv.clone())
    }

    async fn existing(&self, id: &str) -> Option<Arc<Mutex<Conversation>>> {
        let mut map = self.conversations.write().await;
        let entry = map.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.conv.clone())
    }

    /// 移除闲置超过 idle 的对话；正在处理轮次（锁被占用）的对话保留
    async fn evict_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut map = self.conversations.write().await;
        let before = map.len();
        map.retain(|id, entry| {
            let keep = entry.conv.try_lock().is_err()
                || now.duration_since(entry.last_used) < idle;
            if !keep {
                tracing::info!(conversation_id = %id, "idle conversation evicted");
            }
            keep
        });
        before - map.len()
    }
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default)]
    conversation_id: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    conversation_id: String,
    response: String,
    state: SessionState,
}

#[derive(Deserialize)]
struct ConversationQuery {
    conversation_id: String,
}

#[derive(Deserialize)]
struct RemoveCodeRequest {
    conversation_id: String,
    index: usize,
}

#[derive(Deserialize)]
struct ClearRequest {
    #[serde(default)]
    conversation_id: Option<String>,
}

/// POST /api/chat：跑完整一轮后返回回复与最新状态
async fn api_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let (conversation_id, conv) = state.conversation(req.conversation_id).await;
    let mut conv = conv.lock().await;
    let result = process_message(&state.components, &mut conv, message)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(ChatResponse {
        conversation_id,
        response: result.response,
        state: conv.state.clone(),
    }))
}

/// POST /api/chat/stream：以 SSE 推送 AgentEvent；首个事件携带 conversation_id
async fn api_chat_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, (StatusCode, String)>
{
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message is required".to_string()));
    }

    let (conversation_id, conv) = state.conversation(req.conversation_id).await;
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AgentEvent>();
    let components = Arc::clone(&state.components);
    // 流被丢弃（客户端断开）时 guard 取消本轮
    let cancel_token = CancellationToken::new();
    let guard = cancel_token.clone().drop_guard();

    tokio::spawn(async move {
        let mut conv = conv.lock_owned().await;
        if let Err(e) =
            process_message_stream(&components, &mut conv, &message, event_tx, cancel_token).await
        {
            tracing::warn!(error = %e, "streamed turn failed");
        }
    });

    let first = serde_json::json!({
        "type": "conversation_id",
        "conversation_id": conversation_id,
    })
    .to_string();

    let events = stream::unfold(
        (Some(first), event_rx, guard),
        |(first, mut rx, guard)| async move {
            if let Some(line) = first {
                return Some((Ok(Event::default().data(line)), (None, rx, guard)));
            }
            let ev = rx.recv().await?;
            let data = serde_json::to_string(&ev).unwrap_or_else(|e| {
                serde_json::json!({"type": "error", "text": e.to_string()}).to_string()
            });
            Some((Ok(Event::default().data(data)), (None, rx, guard)))
        },
    );

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}

/// GET /api/codes/export：已保存编码的纯文本下载，每行 "{code} - {description}"
async fn api_codes_export(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ConversationQuery>,
) -> Result<Response, (StatusCode, String)> {
    let conv = state
        .existing(&q.conversation_id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, "conversation not found".to_string()))?;
    let body = conv.lock().await.state.export_codes_text();
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"procurement_codes.txt\"",
            ),
        ],
        body,
    )
        .into_response())
}

/// POST /api/codes/remove：按下标删除一条已保存编码，返回最新快照
async fn api_codes_remove(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RemoveCodeRequest>,
) -> Result<Json<StateSnapshot>, (StatusCode, String)> {
    let conv = state
        .existing(&req.conversation_id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, "conversation not found".to_string()))?;
    let snapshot = conv
        .lock()
        .await
        .state
        .remove_code(req.index)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("no saved code at index {}", req.index)))?;
    Ok(Json(snapshot))
}

/// POST /api/session/clear：丢弃对话
async fn api_session_clear(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClearRequest>,
) -> StatusCode {
    if let Some(id) = req.conversation_id.filter(|s| !s.is_empty()) {
        state.conversations.write().await.remove(&id);
        tracing::info!(conversation_id = %id, "conversation cleared");
    }
    StatusCode::OK
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    procure::observability::init();

    let cfg = load_config(None).context("Failed to load configuration")?;
    let components = create_agent_components(&cfg).context("Failed to create agent")?;

    let state = Arc::new(AppState::new(components));

    if cfg.web.idle_timeout_secs > 0 {
        let idle = Duration::from_secs(cfg.web.idle_timeout_secs);
        let period = Duration::from_secs((cfg.web.idle_timeout_secs / 4).max(1));
        let sweeper = Arc::clone(&state);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            loop {
                tick.tick().await;
                let evicted = sweeper.evict_idle(idle).await;
                if evicted > 0 {
                    tracing::debug!(evicted, "idle sweep");
                }
            }
        });
    }

    let app = Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/chat/stream", post(api_chat_stream))
        .route("/api/codes/export", get(api_codes_export))
        .route("/api/codes/remove", post(api_codes_remove))
        .route("/api/session/clear", post(api_session_clear))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&cfg.web.bind)
        .await
        .with_context(|| format!("Failed to bind {}", cfg.web.bind))?;
    tracing::info!(addr = %cfg.web.bind, "procure web listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use procure::build_agent_components;
    use procure::config::AppConfig;
    use procure::llm::ScriptedLlmClient;
    use procure::rag::IndexHandle;

    fn app_state() -> Arc<AppState> {
        let components = build_agent_components(
            &AppConfig::default(),
            Arc::new(ScriptedLlmClient::new(Vec::<String>::new())),
            IndexHandle::Unavailable("test".into()),
        );
        Arc::new(AppState::new(components))
    }

    #[tokio::test]
    async fn test_remove_code_route() {
        let state = app_state();
        let (id, conv) = state.conversation(None).await;
        {
            let mut conv = conv.lock().await;
            conv.state.save_code("CFR01067261", "Steel I-beam");
            conv.state.save_code("CWR00000001", "Copper wire");
        }

        let Json(snapshot) = api_codes_remove(
            State(state.clone()),
            Json(RemoveCodeRequest {
                conversation_id: id.clone(),
                index: 0,
            }),
        )
        .await
        .unwrap();
        let codes = snapshot.snapshot.procurement_codes();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes[0].code, "CWR00000001");

        let (status, _) = api_codes_remove(
            State(state.clone()),
            Json(RemoveCodeRequest {
                conversation_id: id,
                index: 5,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = api_codes_remove(
            State(state),
            Json(RemoveCodeRequest {
                conversation_id: "unknown".to_string(),
                index: 0,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_idle_conversations_are_evicted_unless_busy() {
        let state = app_state();
        state.conversation(Some("idle".to_string())).await;
        let (_, busy) = state.conversation(Some("busy".to_string())).await;
        let _turn = busy.lock().await;

        assert_eq!(state.evict_idle(Duration::ZERO).await, 1);
        assert!(state.existing("idle").await.is_none());
        assert!(state.existing("busy").await.is_some());

        state.conversation(Some("fresh".to_string())).await;
        assert_eq!(state.evict_idle(Duration::from_secs(3600)).await, 0);
        assert_eq!(state.conversations.read().await.len(), 2);
    }
}
