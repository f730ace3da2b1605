//! Tool schema and dispatch.
//!
//! Three effect classes: local gesture/LED tools are validated and fired at
//! the robot without waiting for the animation; `web_search` is the one
//! latency-bearing tool and is awaited under its own deadline; anything else
//! resolves to an `is_error` result. Nothing escapes the dispatcher as a
//! failure, so a bad call can never take down a conversation turn.
//! Locomotion has no tool on purpose: driving is keyboard-only.

use crate::ling::{Searcher, ToolCallRequest, ToolCallResult, ToolSpec};
use robot::{EyeColor, Gesture, Robot};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Name of the one latency-bearing tool.
pub const WEB_SEARCH: &str = "web_search";
/// Name of the LED tool.
pub const SET_EYE_COLOR: &str = "set_eye_color";

/// Build the full tool schema advertised to the model.
pub fn tool_schema() -> Vec<ToolSpec> {
    let mut specs: Vec<ToolSpec> = Gesture::ALL
        .iter()
        .map(|g| ToolSpec {
            name: g.name().to_string(),
            description: g.description().to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        })
        .collect();
    specs.push(ToolSpec {
        name: SET_EYE_COLOR.to_string(),
        description: "Set the color of the robot's eye LEDs".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "color": {
                    "type": "string",
                    "enum": ["blue", "green", "red", "white"],
                    "description": "The eye color to switch to"
                }
            },
            "required": ["color"]
        }),
    });
    specs.push(ToolSpec {
        name: WEB_SEARCH.to_string(),
        description: "Search the web for current information. Use this for up-to-date \
                      facts, recent events, or current news."
            .to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        }),
    });
    specs
}

/// Maps model-requested tool calls onto robot and search effects.
pub struct ToolDispatcher {
    robot: Arc<dyn Robot>,
    searcher: Arc<dyn Searcher>,
    search_timeout: Duration,
    schema: Vec<ToolSpec>,
}

impl ToolDispatcher {
    pub fn new(robot: Arc<dyn Robot>, searcher: Arc<dyn Searcher>) -> Self {
        Self {
            robot,
            searcher,
            search_timeout: Duration::from_secs(15),
            schema: tool_schema(),
        }
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn schema(&self) -> &[ToolSpec] {
        &self.schema
    }

    /// Execute one call and return its result. Never fails; malformed input
    /// and backend trouble both come back as `is_error` results for the
    /// model to read.
    pub async fn dispatch(&self, call: &ToolCallRequest) -> ToolCallResult {
        let result = self.run(call).await;
        debug!(
            tool = %call.name,
            is_error = result.is_error,
            "tool call dispatched"
        );
        result
    }

    async fn run(&self, call: &ToolCallRequest) -> ToolCallResult {
        if call.name == WEB_SEARCH {
            let query = string_arg(&call.arguments, "query");
            let Some(query) = query else {
                return ToolCallResult::error(
                    &call.call_id,
                    "web_search requires a non-empty string `query` argument",
                );
            };
            info!(%query, "model requested web search");
            return match tokio::time::timeout(self.search_timeout, self.searcher.search(&query))
                .await
            {
                Ok(Ok(results)) => ToolCallResult::ok(&call.call_id, results),
                Ok(Err(e)) => ToolCallResult::error(&call.call_id, format!("search failed: {e}")),
                Err(_) => ToolCallResult::error(&call.call_id, "search timed out"),
            };
        }

        if call.name == SET_EYE_COLOR {
            let color = string_arg(&call.arguments, "color")
                .and_then(|c| c.parse::<EyeColor>().ok());
            let Some(color) = color else {
                return ToolCallResult::error(
                    &call.call_id,
                    "set_eye_color requires a `color` of blue, green, red or white",
                );
            };
            let robot = self.robot.clone();
            tokio::spawn(async move { robot.set_eye_color(color).await });
            return ToolCallResult::ok(&call.call_id, format!("eyes set to {color}"));
        }

        if let Ok(gesture) = call.name.parse::<Gesture>() {
            // Fire-and-forget: the animation runs for a second or two and
            // must not stall the tool loop.
            let robot = self.robot.clone();
            tokio::spawn(async move { robot.perform(gesture).await });
            return ToolCallResult::ok(&call.call_id, format!("performed {gesture}"));
        }

        ToolCallResult::error(&call.call_id, format!("unknown tool: {}", call.name))
    }
}

fn string_arg(arguments: &Value, key: &str) -> Option<String> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use robot::LoggingRobot;

    struct EchoSearch;

    #[async_trait]
    impl Searcher for EchoSearch {
        async fn search(&self, query: &str) -> anyhow::Result<String> {
            Ok(format!("results for {query}"))
        }
    }

    fn dispatcher() -> ToolDispatcher {
        ToolDispatcher::new(Arc::new(LoggingRobot), Arc::new(EchoSearch))
    }

    fn call(name: &str, arguments: Value) -> ToolCallRequest {
        ToolCallRequest {
            call_id: "c1".into(),
            name: name.into(),
            arguments,
        }
    }

    #[tokio::test]
    async fn set_eye_color_rejects_unknown_colors() {
        let result = dispatcher()
            .dispatch(&call("set_eye_color", json!({"color": "purple"})))
            .await;
        assert!(result.is_error);
        assert!(result.content.contains("blue, green, red or white"));

        let result = dispatcher().dispatch(&call("set_eye_color", json!({}))).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn set_eye_color_acknowledges_valid_colors() {
        let result = dispatcher()
            .dispatch(&call("set_eye_color", json!({"color": "green"})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, "eyes set to green");
    }

    #[tokio::test]
    async fn web_search_requires_a_query() {
        let result = dispatcher().dispatch(&call("web_search", json!({}))).await;
        assert!(result.is_error);

        let result = dispatcher()
            .dispatch(&call("web_search", json!({"query": "robots"})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.content, "results for robots");
    }

    #[tokio::test]
    async fn unknown_tools_come_back_as_errors() {
        let result = dispatcher().dispatch(&call("self_destruct", json!({}))).await;
        assert!(result.is_error);
        assert!(result.content.contains("unknown tool: self_destruct"));
        assert_eq!(result.call_id, "c1");
    }

    #[test]
    fn schema_covers_every_advertised_tool() {
        let specs = tool_schema();
        assert!(specs.len() >= 12);
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        for g in Gesture::ALL {
            assert!(names.contains(&g.name()));
        }
        assert!(names.contains(&SET_EYE_COLOR));
        assert!(names.contains(&WEB_SEARCH));
        // Driving stays off the model's menu.
        assert!(!names.iter().any(|n| n.contains("move") || n.contains("drive")));
    }

    #[test]
    fn string_arg_rejects_blank_and_missing() {
        assert_eq!(string_arg(&json!({"query": " hi "}), "query").as_deref(), Some("hi"));
        assert_eq!(string_arg(&json!({"query": "  "}), "query"), None);
        assert_eq!(string_arg(&json!({}), "query"), None);
        assert_eq!(string_arg(&json!({"query": 3}), "query"), None);
    }
}
