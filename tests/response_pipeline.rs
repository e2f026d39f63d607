//! End-to-end turns through the response pipeline with in-memory fakes.

use async_trait::async_trait;
use bytes::Bytes;
use companion_bot::agent::tools::generation::{GenerationBackend, GenerationError, GenerationRequest};
use companion_bot::agent::tools::image::GenerateImageTool;
use companion_bot::agent::tools::reminder::{self, RemindMeTool};
use companion_bot::agent::{AgentError, ConversationAgent, Tool, ToolError, ToolInput};
use companion_bot::bot::transport::{send_all, ChatTransport};
use companion_bot::config::START_GREETING;
use companion_bot::pipeline::{IncomingMessage, ResponseError, ResponsePipeline};
use companion_bot::response::{
    ContentMaterializer, ContentReference, MessageAssembler, OutboundMessage, VoiceAugmenter,
};
use companion_bot::scheduler::{DeferredInvoker, SchedulerError, SEND_MESSAGE};
use companion_bot::storage::{
    Artifact, ArtifactStore, SignedUrlOperation, SignedUrlRequest, StorageError,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PHOTO_ID: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
const CHAT_ID: &str = "123";

#[derive(Default)]
struct InMemoryStore {
    artifacts: Mutex<HashMap<ContentReference, Artifact>>,
    signed: Mutex<Vec<SignedUrlRequest>>,
    uploads: Mutex<Vec<(String, Bytes)>>,
}

impl InMemoryStore {
    fn with_artifact(id: &str, mime_type: &str, bytes: &'static [u8]) -> Self {
        let store = Self::default();
        let mut artifact = Artifact::new(mime_type, bytes);
        artifact.id = ContentReference::parse(id).expect("valid id");
        store
            .artifacts
            .lock()
            .expect("lock")
            .insert(artifact.id, artifact);
        store
    }

    fn signed_count(&self) -> usize {
        self.signed.lock().expect("lock").len()
    }
}

#[async_trait]
impl ArtifactStore for InMemoryStore {
    async fn get(&self, id: &ContentReference) -> Result<Artifact, StorageError> {
        self.artifacts
            .lock()
            .expect("lock")
            .get(id)
            .cloned()
            .ok_or(StorageError::NotFound(*id))
    }

    async fn put(&self, artifact: &Artifact) -> Result<(), StorageError> {
        self.artifacts
            .lock()
            .expect("lock")
            .insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn create_signed_url(&self, request: &SignedUrlRequest) -> Result<String, StorageError> {
        self.signed.lock().expect("lock").push(request.clone());
        let access = match request.operation {
            SignedUrlOperation::Read => "read",
            SignedUrlOperation::Write => "write",
        };
        Ok(format!(
            "https://files.test/{}/{}?access={access}",
            request.bucket.prefix(),
            request.path
        ))
    }

    async fn upload_to_signed_url(&self, url: &str, bytes: Bytes) -> Result<(), StorageError> {
        self.uploads.lock().expect("lock").push((url.to_string(), bytes));
        Ok(())
    }
}

/// Answers every turn with a fixed text and counts resets
struct ScriptedAgent {
    answer: String,
    resets: Mutex<Vec<String>>,
    runs: Mutex<usize>,
}

impl ScriptedAgent {
    fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            resets: Mutex::new(Vec::new()),
            runs: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ConversationAgent for ScriptedAgent {
    async fn run(&self, _chat_id: &str, _input: &str) -> Result<String, AgentError> {
        *self.runs.lock().expect("lock") += 1;
        Ok(self.answer.clone())
    }

    async fn reset(&self, chat_id: &str) -> Result<(), AgentError> {
        self.resets.lock().expect("lock").push(chat_id.to_string());
        Ok(())
    }
}

/// Calls one tool with the user input and answers with its output
struct SingleToolAgent {
    tool: Arc<dyn Tool>,
}

#[async_trait]
impl ConversationAgent for SingleToolAgent {
    async fn run(&self, _chat_id: &str, input: &str) -> Result<String, AgentError> {
        let output = self.tool.run(ToolInput::from(input)).await?;
        Ok(format!("Here you go: {output}"))
    }

    async fn reset(&self, _chat_id: &str) -> Result<(), AgentError> {
        Ok(())
    }
}

struct EmptyBackend;

#[async_trait]
impl GenerationBackend for EmptyBackend {
    async fn generate(&self, _request: GenerationRequest) -> Result<Vec<Artifact>, GenerationError> {
        Ok(Vec::new())
    }
}

/// Stores the spoken text as an audio artifact
struct FakeSpeech {
    store: Arc<InMemoryStore>,
}

#[async_trait]
impl Tool for FakeSpeech {
    fn name(&self) -> &'static str {
        "GenerateSpokenAudio"
    }

    fn description(&self) -> String {
        "speaks".to_string()
    }

    async fn run(&self, input: ToolInput) -> Result<String, ToolError> {
        let artifact = Artifact::new("audio/mpeg", input.as_prompt().into_bytes());
        self.store
            .put(&artifact)
            .await
            .map_err(|e| ToolError::Backend {
                tool: "GenerateSpokenAudio",
                message: e.to_string(),
            })?;
        Ok(artifact.id.to_string())
    }
}

#[derive(Default)]
struct RecordingInvoker {
    calls: Mutex<Vec<(String, u64, Value)>>,
}

#[async_trait]
impl DeferredInvoker for RecordingInvoker {
    async fn invoke_later(&self, name: &str, delay_ms: u64, arguments: Value) -> Result<(), SchedulerError> {
        self.calls
            .lock()
            .expect("lock")
            .push((name.to_string(), delay_ms, arguments));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<OutboundMessage>>,
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send(&self, message: &OutboundMessage) -> anyhow::Result<()> {
        self.sent.lock().expect("lock").push(message.clone());
        Ok(())
    }
}

fn pipeline(
    agent: Arc<dyn ConversationAgent>,
    store: Arc<InMemoryStore>,
    voice: Option<VoiceAugmenter>,
) -> ResponsePipeline {
    ResponsePipeline::new(
        agent,
        voice,
        MessageAssembler::new(ContentMaterializer::new(store)),
    )
}

#[tokio::test]
async fn photo_answer_becomes_text_media_text() {
    let store = Arc::new(InMemoryStore::with_artifact(PHOTO_ID, "image/png", b"png"));
    let agent = Arc::new(ScriptedAgent::new(format!(
        "Here is your photo: {PHOTO_ID} enjoy!"
    )));
    let pipeline = pipeline(agent, store.clone(), None);

    let messages = pipeline
        .create_response(&IncomingMessage::new(CHAT_ID, "send me a selfie"))
        .await
        .expect("turn succeeds");

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0], OutboundMessage::text(CHAT_ID, "Here is your photo: "));
    let OutboundMessage::Media {
        chat_id,
        locator,
        mime_type,
    } = &messages[1]
    else {
        panic!("expected media, got {:?}", messages[1]);
    };
    assert_eq!(chat_id, CHAT_ID);
    assert_eq!(mime_type, "image/png");
    assert!(locator.starts_with("https://files.test/plugin-data/"));
    assert!(locator.ends_with(".png?access=read"));
    assert_eq!(messages[2], OutboundMessage::text(CHAT_ID, "enjoy!"));

    let uploads = store.uploads.lock().expect("lock");
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].0.ends_with("?access=write"));
    assert_eq!(uploads[0].1, Bytes::from_static(b"png"));
}

#[tokio::test]
async fn each_turn_publishes_under_a_new_path() {
    let store = Arc::new(InMemoryStore::with_artifact(PHOTO_ID, "image/png", b"png"));
    let agent = Arc::new(ScriptedAgent::new(PHOTO_ID));
    let pipeline = pipeline(agent, store, None);
    let incoming = IncomingMessage::new(CHAT_ID, "again");

    let first = pipeline.create_response(&incoming).await.expect("first");
    let second = pipeline.create_response(&incoming).await.expect("second");
    assert_ne!(first, second);
}

#[tokio::test]
async fn missing_artifact_fails_whole_turn() {
    let store = Arc::new(InMemoryStore::default());
    let agent = Arc::new(ScriptedAgent::new(format!("before {PHOTO_ID} after")));
    let pipeline = pipeline(agent, store, None);

    let result = pipeline
        .create_response(&IncomingMessage::new(CHAT_ID, "photo"))
        .await;
    let Err(err) = result else {
        panic!("expected materialization failure");
    };
    assert!(matches!(err, ResponseError::Materialize(_)), "unexpected error: {err}");
}

#[tokio::test]
async fn voice_follows_every_text_segment() {
    let store = Arc::new(InMemoryStore::with_artifact(PHOTO_ID, "image/png", b"png"));
    let speech = Arc::new(FakeSpeech {
        store: store.clone(),
    });
    let agent = Arc::new(ScriptedAgent::new(format!("Look {PHOTO_ID} cute, right?")));
    let pipeline = pipeline(agent, store, Some(VoiceAugmenter::new(speech)));

    let messages = pipeline
        .create_response(&IncomingMessage::new(CHAT_ID, "hi"))
        .await
        .expect("turn succeeds");

    let kinds: Vec<&str> = messages
        .iter()
        .map(|m| match m {
            OutboundMessage::Text { .. } => "text",
            OutboundMessage::Media { mime_type, .. } => mime_type.as_str(),
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["text", "audio/mpeg", "image/png", "text", "audio/mpeg"]
    );
}

#[tokio::test]
async fn reminder_request_schedules_one_delivery() {
    let invoker = Arc::new(RecordingInvoker::default());
    let tool = RemindMeTool::new(invoker.clone(), CHAT_ID);

    let output = tool
        .run(ToolInput::from(
            r#"{"after": "15s", "reminder": "turn off the lights"}"#,
        ))
        .await
        .expect("tool runs");

    assert_eq!(output, reminder::SCHEDULED);
    let calls = invoker.calls.lock().expect("lock");
    assert_eq!(
        *calls,
        vec![(
            SEND_MESSAGE.to_string(),
            15_000,
            json!({"message": "turn off the lights", "chat_id": CHAT_ID}),
        )]
    );
}

#[tokio::test]
async fn unparseable_reminder_is_a_soft_failure() {
    let invoker = Arc::new(RecordingInvoker::default());
    let tool = RemindMeTool::new(invoker.clone(), CHAT_ID);

    let output = tool
        .run(ToolInput::from("remind me about the thing, sometime"))
        .await
        .expect("no error is raised");

    assert_eq!(output, reminder::FAILURE);
    assert!(invoker.calls.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn empty_generation_aborts_before_assembly() {
    let store = Arc::new(InMemoryStore::default());
    let tool = Arc::new(GenerateImageTool::new(
        Arc::new(EmptyBackend),
        Duration::from_secs(5),
    ));
    let pipeline = pipeline(Arc::new(SingleToolAgent { tool }), store.clone(), None);

    let result = pipeline
        .create_response(&IncomingMessage::new(CHAT_ID, "a cat on the moon"))
        .await;
    let Err(err) = result else {
        panic!("expected tool failure");
    };
    assert!(
        matches!(
            err,
            ResponseError::Agent(AgentError::Tool(ToolError::NoArtifacts {
                tool: "GenerateImage",
                ..
            }))
        ),
        "unexpected error: {err}"
    );
    assert_eq!(store.signed_count(), 0);
}

#[tokio::test]
async fn start_command_greets_without_running_agent() {
    let store = Arc::new(InMemoryStore::default());
    let agent = Arc::new(ScriptedAgent::new(PHOTO_ID));
    let pipeline = pipeline(agent.clone(), store.clone(), None);
    let transport = RecordingTransport::default();

    let messages = pipeline
        .create_response(&IncomingMessage::new(CHAT_ID, "/start"))
        .await
        .expect("greeting");
    send_all(&transport, &messages).await.expect("delivered");

    assert_eq!(
        *transport.sent.lock().expect("lock"),
        vec![OutboundMessage::text(CHAT_ID, START_GREETING)]
    );
    assert_eq!(*agent.resets.lock().expect("lock"), vec![CHAT_ID.to_string()]);
    assert_eq!(*agent.runs.lock().expect("lock"), 0);
    assert_eq!(store.signed_count(), 0);
}
