//! Mamascota Gateway: chat proxy for the pet-care assistant.
//! `POST /agent` assembles the clinical context on the first turn and forwards the
//! conversation to the completion service. Read-only catalog routes for the client UI.

mod memory;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mamascota_core::{
    breeds::breeds_for,
    symptoms::SYMPTOM_KEYS,
    AgentError, AgentResponse, ChatAgent, ChatRequest, CompletionService, ContextAssembler,
    EchoCompletion, FileSource, GatewayConfig, KnowledgeBaseStore, OpenAiChatClient,
    PromptProfile, Species, GENERIC_FAILURE, NO_PET_DATA,
};
use memory::ConversationMemory;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const INVALID_JSON: &str = "INVALID_JSON";
const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

struct AppState {
    agent: ChatAgent,
    memory: ConversationMemory,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("[MAMASCOTA] Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let store = Arc::new(KnowledgeBaseStore::new(FileSource::new(
        &config.knowledge_base_path,
    )));
    let kb = store.load().await;
    tracing::info!(
        "[MAMASCOTA] Knowledge base ready: {} algorithms, {} clinical details, {} breed risks",
        kb.algorithms.len(),
        kb.clinical_details.len(),
        kb.breed_risks.len()
    );

    let completion: Arc<dyn CompletionService> = match GatewayConfig::api_key() {
        Some(key) => Arc::new(
            OpenAiChatClient::new(&config.llm_api_base, &key, &config.llm_model)
                .with_temperature(config.llm_temperature)
                .with_timeout(config.llm_timeout()),
        ),
        None => {
            tracing::warn!("[MAMASCOTA] No API key set (OPENAI_API_KEY / OPENROUTER_API_KEY): echo mode");
            Arc::new(EchoCompletion)
        }
    };

    let state = Arc::new(build_state(&config, store, completion));
    tracing::info!(
        "[MAMASCOTA] Completion service: {}",
        state.agent.completion_name()
    );

    let app = build_app(state, config.body_limit_bytes);
    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("[MAMASCOTA] Cannot bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "[MAMASCOTA] Gateway v{} listening on {}",
        mamascota_core::version(),
        addr
    );

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("[MAMASCOTA] Server stopped: {}", e);
    }
}

fn build_state(
    config: &GatewayConfig,
    store: Arc<KnowledgeBaseStore>,
    completion: Arc<dyn CompletionService>,
) -> AppState {
    let assembler = ContextAssembler::new(store).with_default_lang(config.default_lang.clone());
    let agent = ChatAgent::new(
        assembler,
        completion,
        PromptProfile::load(&config.system_prompt_path),
    )
    .with_default_lang(config.default_lang.clone())
    .with_level_filter(config.level_filter.clone())
    .with_history_limit(config.history_limit);
    AppState {
        memory: ConversationMemory::new(agent.history_limit(), config.max_conversations),
        agent,
    }
}

fn build_app(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agent", post(agent_handler))
        .route("/breeds/:species", get(breeds_handler))
        .route("/symptoms", get(symptoms_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(axum::middleware::from_fn(log_requests))
        .layer(CatchPanicLayer::custom(handle_panic))
}

async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    tracing::info!(
        "[MAMASCOTA HTTP] {} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = err
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    tracing::error!("[MAMASCOTA] Handler panicked: {}", details);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(AgentResponse::error(INTERNAL_ERROR).with_details(details)),
    )
        .into_response()
}

async fn health() -> &'static str {
    "OK"
}

/// POST /agent: one chat turn.
async fn agent_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> (StatusCode, Json<AgentResponse>) {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::warn!("[MAMASCOTA] Rejected /agent body: {}", rejection.body_text());
            let (status, code) = if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                (StatusCode::PAYLOAD_TOO_LARGE, PAYLOAD_TOO_LARGE)
            } else {
                (StatusCode::BAD_REQUEST, INVALID_JSON)
            };
            return (
                status,
                Json(AgentResponse::error(code).with_details(rejection.body_text())),
            );
        }
    };

    let request = ChatRequest::from_value(&body);
    let conversation_id = request
        .conversation_id
        .clone()
        .unwrap_or_else(|| format!("conv-{}", uuid::Uuid::new_v4()));
    let prior = state.memory.prior_for(&conversation_id, &request);

    match state.agent.respond(&request, &prior).await {
        Ok(reply) => {
            if !request.is_one_shot() {
                state
                    .memory
                    .record(&conversation_id, prior, &request.message, &reply);
                tracing::debug!(
                    conversations = state.memory.conversation_count(),
                    "[MAMASCOTA] Reply stored for {}",
                    conversation_id
                );
            }
            (
                StatusCode::OK,
                Json(AgentResponse::reply(reply, conversation_id)),
            )
        }
        Err(AgentError::NoPetData) => (
            StatusCode::BAD_REQUEST,
            Json(AgentResponse::error(NO_PET_DATA).with_conversation(conversation_id)),
        ),
        Err(e) => {
            tracing::error!("[MAMASCOTA] Turn failed for {}: {}", conversation_id, e);
            (
                StatusCode::OK,
                Json(
                    AgentResponse::error(GENERIC_FAILURE)
                        .with_details(e.to_string())
                        .with_conversation(conversation_id),
                ),
            )
        }
    }
}

/// GET /breeds/:species: picker catalog for dogs and cats.
async fn breeds_handler(Path(species): Path<String>) -> Response {
    let species = Species::parse(&species);
    let breeds = breeds_for(&species);
    if breeds.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "ok": false, "error": "NO_BREED_CATALOG", "species": species.code() })),
        )
            .into_response();
    }
    Json(json!({ "ok": true, "species": species.code(), "breeds": breeds })).into_response()
}

/// GET /symptoms: selector vocabulary.
async fn symptoms_handler() -> Json<Value> {
    Json(json!({ "ok": true, "symptoms": SYMPTOM_KEYS }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::header::CONTENT_TYPE;
    use mamascota_core::{ChatMessage, CompletionError, KnowledgeBase};
    use std::sync::Mutex;
    use tower::ServiceExt;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionService for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, CompletionError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            if self.fail {
                return Err(CompletionError::Status {
                    status: 503,
                    body: "down".into(),
                });
            }
            Ok(format!("reply {}", self.calls.lock().unwrap().len()))
        }
    }

    struct Panicking;

    #[async_trait]
    impl CompletionService for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, CompletionError> {
            panic!("completion exploded")
        }
    }

    fn test_config() -> GatewayConfig {
        GatewayConfig::load_from("/no/such/mamascota-config").unwrap()
    }

    fn app_with(recorder: Arc<dyn CompletionService>) -> (Router, Arc<AppState>) {
        let kb = KnowledgeBase::from_value(&json!({
            "algorithms": [{ "id": "a1", "nivelUsuario": "familiar" }],
            "breedRisks": [{ "especie": "perro", "raza": "Labrador Retriever" }]
        }));
        let store = Arc::new(KnowledgeBaseStore::preloaded(kb));
        let state = Arc::new(build_state(&test_config(), store, recorder));
        (build_app(Arc::clone(&state), 2 * 1024 * 1024), state)
    }

    fn post_agent(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/agent")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_ok() {
        let (app, _) = app_with(Arc::new(Recorder::default()));
        let res = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn missing_species_is_400_no_pet_data() {
        let (app, _) = app_with(Arc::new(Recorder::default()));
        let res = app
            .oneshot(post_agent(
                r#"{"message":"hi","pet":{"name":"Rex"},"conversationId":"c-1"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(res).await,
            json!({ "ok": false, "error": "NO_PET_DATA", "conversationId": "c-1" })
        );
    }

    #[tokio::test]
    async fn malformed_body_is_400_invalid_json() {
        let (app, _) = app_with(Arc::new(Recorder::default()));
        let res = app.oneshot(post_agent("{ nope")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["error"], INVALID_JSON);
    }

    #[tokio::test]
    async fn conversation_is_remembered_across_turns() {
        let recorder = Arc::new(Recorder::default());
        let (app, state) = app_with(Arc::clone(&recorder) as Arc<dyn CompletionService>);

        let first = app
            .clone()
            .oneshot(post_agent(
                r#"{"message":"he coughs","pet":{"species":"dog","breed":"Labrador Retriever"},"symptomKeys":["cough"]}"#,
            ))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let first = json_body(first).await;
        assert_eq!(first["ok"], true);
        assert_eq!(first["reply"], "reply 1");
        let id = first["conversationId"].as_str().unwrap().to_string();
        assert!(id.starts_with("conv-"));

        let body = json!({
            "message": "since yesterday",
            "pet": { "species": "dog" },
            "conversationId": id
        });
        let second = app.oneshot(post_agent(&body.to_string())).await.unwrap();
        assert_eq!(json_body(second).await["reply"], "reply 2");

        let calls = recorder.calls.lock().unwrap();
        assert!(calls[0][2].content.contains("\"breed_risks_for_pet\":[{"));
        let follow_up: Vec<&str> = calls[1].iter().map(|m| m.content.as_str()).collect();
        assert!(follow_up.contains(&"he coughs"));
        assert!(follow_up.contains(&"reply 1"));
        assert_eq!(*follow_up.last().unwrap(), "since yesterday");
        assert_eq!(state.memory.history(&id).len(), 4);
    }

    #[tokio::test]
    async fn new_conversations_get_distinct_ids_and_history() {
        let recorder = Arc::new(Recorder::default());
        let (app, state) = app_with(recorder.clone());

        let first = app
            .clone()
            .oneshot(post_agent(
                r#"{"message":"first owner secret","pet":{"species":"dog"}}"#,
            ))
            .await
            .unwrap();
        let first_id = json_body(first).await["conversationId"]
            .as_str()
            .unwrap()
            .to_string();
        let second = app
            .oneshot(post_agent(
                r#"{"message":"second owner hello","pet":{"species":"cat"}}"#,
            ))
            .await
            .unwrap();
        let second_id = json_body(second).await["conversationId"]
            .as_str()
            .unwrap()
            .to_string();

        assert_ne!(first_id, second_id);
        assert!(second_id.starts_with("conv-"));
        let calls = recorder.calls.lock().unwrap();
        assert!(calls[1].iter().all(|m| !m.content.contains("first owner secret")));
        assert_eq!(state.memory.history(&second_id)[0].content, "second owner hello");
    }

    #[tokio::test]
    async fn handler_panic_is_500_internal_error() {
        let (app, _) = app_with(Arc::new(Panicking));
        let res = app
            .oneshot(post_agent(r#"{"message":"hi","pet":{"species":"dog"}}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(res).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], INTERNAL_ERROR);
        assert_eq!(body["details"], "completion exploded");
    }

    #[tokio::test]
    async fn summary_conversations_are_not_stored() {
        let (app, state) = app_with(Arc::new(Recorder::default()));
        let res = app
            .oneshot(post_agent(
                r#"{"message":"summarise","pet":{"species":"cat"},"conversationId":"summary-7"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(json_body(res).await["conversationId"], "summary-7");
        assert!(state.memory.history("summary-7").is_empty());
    }

    #[tokio::test]
    async fn completion_failure_is_reported_softly() {
        let (app, state) = app_with(Arc::new(Recorder {
            fail: true,
            ..Default::default()
        }));
        let res = app
            .oneshot(post_agent(
                r#"{"message":"hi","pet":{"species":"dog"},"conversationId":"c-9"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], GENERIC_FAILURE);
        assert!(state.memory.history("c-9").is_empty());
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let kb = KnowledgeBase::default();
        let store = Arc::new(KnowledgeBaseStore::preloaded(kb));
        let state = Arc::new(build_state(&test_config(), store, Arc::new(Recorder::default())));
        let app = build_app(state, 64);
        let big = json!({ "message": "x".repeat(200), "pet": { "species": "dog" } });
        let res = app.oneshot(post_agent(&big.to_string())).await.unwrap();
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(res).await["error"], PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn breed_catalogs() {
        let (app, _) = app_with(Arc::new(Recorder::default()));
        let res = app
            .clone()
            .oneshot(Request::builder().uri("/breeds/DOG").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["breeds"].as_array().unwrap().len(), 34);

        let res = app
            .oneshot(Request::builder().uri("/breeds/rabbit").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn symptom_vocabulary() {
        let (app, _) = app_with(Arc::new(Recorder::default()));
        let res = app
            .oneshot(Request::builder().uri("/symptoms").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(res).await;
        assert_eq!(body["symptoms"].as_array().unwrap().len(), SYMPTOM_KEYS.len());
    }
}
