use serde::Deserialize;

/// Fields shared by all hook event inputs.
#[derive(Debug, Clone, Deserialize)]
pub struct CommonInput {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub cwd: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionStartInput {
    #[serde(flatten)]
    pub common: CommonInput,
}

#[derive(Debug, Deserialize)]
pub struct UserPromptSubmitInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct PostToolUseInput {
    #[serde(flatten)]
    pub common: CommonInput,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
}

/// The subset of a file-write tool's input the cross-repo observer needs.
#[derive(Debug, Clone, Deserialize)]
pub struct FileToolInput {
    pub file_path: String,
}

impl PostToolUseInput {
    /// Extract the target file path from `tool_input`, if present.
    pub fn file_path(&self) -> Option<String> {
        serde_json::from_value::<FileToolInput>(self.tool_input.clone())
            .ok()
            .map(|t| t.file_path)
            .filter(|p| !p.is_empty())
    }
}

/// Top-level hook input, deserialized from stdin JSON.
///
/// Tagged by the `hook_event_name` field. Only the events the engine consumes
/// are modeled; everything else falls into `Other` and is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "hook_event_name")]
pub enum HookInput {
    SessionStart(SessionStartInput),
    UserPromptSubmit(UserPromptSubmitInput),
    PostToolUse(PostToolUseInput),
    #[serde(other)]
    Other,
}
