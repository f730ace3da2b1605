use async_trait::async_trait;
use cortex::convo::{EMPTY_REPLY, FALLBACK_REPLY};
use cortex::{
    ChatMessage, ChatReply, Chatter, ConversationEngine, EngineConfig, Origin, Role, Searcher,
    ToolCallRequest, ToolDispatcher, ToolSpec, Utterance,
};
use robot::{AudioClip, EyeColor, Gesture, LoggingRobot, MoveDirection, Robot};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Chatter that replays a fixed script and records every request it saw.
#[derive(Default)]
struct ScriptedChatter {
    script: Mutex<VecDeque<ChatReply>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatter {
    fn with_script(replies: Vec<ChatReply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, n: usize) -> Vec<ChatMessage> {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl Chatter for ScriptedChatter {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> anyhow::Result<ChatReply> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))
    }
}

/// Chatter that asks for the same tool on every round, forever.
struct ToolHungryChatter {
    calls: AtomicUsize,
}

#[async_trait]
impl Chatter for ToolHungryChatter {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> anyhow::Result<ChatReply> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ChatReply {
            text: String::new(),
            tool_calls: vec![ToolCallRequest {
                call_id: format!("call-{n}"),
                name: "wave".into(),
                arguments: json!({}),
            }],
        })
    }
}

struct SnippetSearch {
    calls: AtomicUsize,
}

#[async_trait]
impl Searcher for SnippetSearch {
    async fn search(&self, query: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "Web search results for '{query}':\n\n1. Big Tech News\n   Something shipped.\n"
        ))
    }
}

fn dispatcher(searcher: Arc<dyn Searcher>) -> ToolDispatcher {
    ToolDispatcher::new(Arc::new(LoggingRobot), searcher)
}

fn engine(chatter: Arc<dyn Chatter>, dispatcher: ToolDispatcher) -> ConversationEngine {
    ConversationEngine::new(
        chatter,
        dispatcher,
        EngineConfig {
            call_timeout: Duration::from_millis(500),
            ..EngineConfig::default()
        },
    )
}

fn text_reply(text: &str) -> ChatReply {
    ChatReply {
        text: text.into(),
        tool_calls: Vec::new(),
    }
}

fn tool_reply(call_id: &str, name: &str, arguments: serde_json::Value) -> ChatReply {
    ChatReply {
        text: String::new(),
        tool_calls: vec![ToolCallRequest {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }],
    }
}

/// Spec scenario: a news question triggers one search round-trip, one
/// follow-up inference call and exactly one assistant utterance.
#[tokio::test]
async fn search_round_trip_yields_one_assistant_utterance() {
    let chatter = ScriptedChatter::with_script(vec![
        tool_reply("c1", "web_search", json!({"query": "today's top tech news"})),
        text_reply("Here's the top story: something shipped."),
    ]);
    let searcher = Arc::new(SnippetSearch {
        calls: AtomicUsize::new(0),
    });
    let engine = engine(chatter.clone(), dispatcher(searcher.clone()));

    let user = Utterance::user_text("What's today's top tech news?");
    let reply = engine.take_turn(&user).await.unwrap();

    assert_eq!(reply.text, "Here's the top story: something shipped.");
    assert_eq!(searcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(chatter.calls(), 2);

    // The follow-up round saw the tool result.
    let followup = chatter.request(1);
    let tool_msg = followup
        .iter()
        .find(|m| m.role == Role::Tool)
        .expect("tool result missing from follow-up request");
    assert_eq!(tool_msg.tool_call_id.as_deref(), Some("c1"));
    assert!(tool_msg.content.contains("Big Tech News"));

    // Exactly one assistant utterance in the log.
    let history = engine.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].origin, Origin::Assistant);
}

#[tokio::test]
async fn tool_loop_terminates_at_configured_depth() {
    let chatter = Arc::new(ToolHungryChatter {
        calls: AtomicUsize::new(0),
    });
    let searcher = Arc::new(SnippetSearch {
        calls: AtomicUsize::new(0),
    });
    let engine = engine(chatter.clone(), dispatcher(searcher));

    let reply = engine
        .take_turn(&Utterance::user_text("wave forever"))
        .await
        .unwrap();

    assert_eq!(reply.text, FALLBACK_REPLY);
    assert_eq!(chatter.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_tool_error_stays_visible_to_the_model() {
    let chatter = ScriptedChatter::with_script(vec![
        tool_reply("c9", "dance", json!({})),
        text_reply("I can't dance, sorry."),
    ]);
    let searcher = Arc::new(SnippetSearch {
        calls: AtomicUsize::new(0),
    });
    let engine = engine(chatter.clone(), dispatcher(searcher));

    let reply = engine
        .take_turn(&Utterance::user_text("dance for me"))
        .await
        .unwrap();

    assert_eq!(reply.text, "I can't dance, sorry.");
    let followup = chatter.request(1);
    let tool_msg = followup.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_msg.content.contains("ERROR"));
    assert!(tool_msg.content.contains("unknown tool: dance"));
}

#[tokio::test]
async fn empty_model_text_becomes_a_canned_reply() {
    let chatter = ScriptedChatter::with_script(vec![text_reply("   ")]);
    let searcher = Arc::new(SnippetSearch {
        calls: AtomicUsize::new(0),
    });
    let engine = engine(chatter, dispatcher(searcher));

    let reply = engine.take_turn(&Utterance::user_text("hm")).await.unwrap();
    assert_eq!(reply.text, EMPTY_REPLY);
}

#[tokio::test]
async fn backend_failure_surfaces_as_an_error() {
    let chatter = ScriptedChatter::with_script(Vec::new());
    let searcher = Arc::new(SnippetSearch {
        calls: AtomicUsize::new(0),
    });
    let engine = engine(chatter, dispatcher(searcher));

    let err = engine
        .take_turn(&Utterance::user_text("hello?"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("script exhausted"));
    assert!(engine.history().await.is_empty());
}

/// Gestures ride along with the final text round and are acknowledged
/// without blocking the loop.
#[tokio::test]
async fn gesture_calls_are_acknowledged() {
    #[derive(Default)]
    struct GestureBot(Mutex<Vec<Gesture>>);

    #[async_trait]
    impl Robot for GestureBot {
        async fn perform(&self, gesture: Gesture) {
            self.0.lock().unwrap().push(gesture);
        }
        async fn set_eye_color(&self, _color: EyeColor) {}
        async fn indicate_thinking(&self, _on: bool) {}
        async fn drive(&self, _direction: MoveDirection) {}
        async fn halt(&self) {}
        async fn say(&self, _text: &str) {}
        async fn play_clip(&self, _clip: &AudioClip) -> anyhow::Result<()> {
            Ok(())
        }
        async fn rest(&self) {}
    }

    let bot = Arc::new(GestureBot::default());
    let chatter = ScriptedChatter::with_script(vec![
        tool_reply("c1", "wave", json!({})),
        text_reply("Hello there!"),
    ]);
    let searcher = Arc::new(SnippetSearch {
        calls: AtomicUsize::new(0),
    });
    let engine = ConversationEngine::new(
        chatter,
        ToolDispatcher::new(bot.clone(), searcher),
        EngineConfig::default(),
    );

    let reply = engine.take_turn(&Utterance::user_text("hi")).await.unwrap();
    assert_eq!(reply.text, "Hello there!");

    // The gesture is fire-and-forget; give the spawned task a beat.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(bot.0.lock().unwrap().as_slice(), [Gesture::Wave]);
}
