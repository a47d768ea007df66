//! Player choices: generate the next story step and attach it to the tree.

use std::sync::Arc;

use storyweave_domain::{ChoiceText, GameSessionId, PathNode, PathNodeId, StoryContent};

use crate::infrastructure::ports::{ChatMessage, LlmError, LlmPort, LlmRequest};
use crate::use_cases::story::{
    BranchMutations, BranchResolver, StepInput, StoryPathError, TimelineNavigator,
};

const STORY_SYSTEM_PROMPT: &str = "You are the narrator of an interactive story. \
Continue the story from the player's latest choice in one or two short paragraphs. \
Write in second person and stop at a point where the player must decide what to do next.";

const STORY_TEMPERATURE: f32 = 0.8;
const STORY_MAX_TOKENS: u32 = 800;

/// A choice the player made while viewing a node.
#[derive(Debug, Clone)]
pub struct ChoiceInput {
    pub choice: ChoiceText,
    /// Node the choice was made on; the current node when absent
    pub from_node_id: Option<PathNodeId>,
    pub expected_current_node_id: Option<PathNodeId>,
}

pub struct MakeChoice {
    resolver: Arc<BranchResolver>,
    timeline: Arc<TimelineNavigator>,
    mutations: Arc<BranchMutations>,
    llm: Arc<dyn LlmPort>,
}

impl MakeChoice {
    pub fn new(
        resolver: Arc<BranchResolver>,
        timeline: Arc<TimelineNavigator>,
        mutations: Arc<BranchMutations>,
        llm: Arc<dyn LlmPort>,
    ) -> Self {
        Self {
            resolver,
            timeline,
            mutations,
            llm,
        }
    }

    /// Generate the continuation for `input.choice`, then advance from the
    /// current node or diverge from an earlier one.
    ///
    /// Generation runs without the session lock. The mutation afterwards
    /// expects the current node seen before generating, so a session that
    /// moved in the meantime fails with `ConcurrentMutation`.
    pub async fn execute(
        &self,
        session_id: GameSessionId,
        input: ChoiceInput,
    ) -> Result<PathNode, StoryPathError> {
        self.resolver.active_session(session_id).await?;
        let history = self.timeline.get_path_history(session_id).await?;
        let current = history
            .current_node_id
            .ok_or(StoryPathError::NoCurrentNode(session_id))?;
        let expected = input.expected_current_node_id.unwrap_or(current);
        if expected != current {
            return Err(StoryPathError::ConcurrentMutation(format!(
                "session {} moved past node {}",
                session_id, expected
            )));
        }

        let from = input.from_node_id.filter(|id| *id != current);
        let path = match from {
            None => history.path_nodes,
            Some(from_id) => self.timeline.path_to(session_id, from_id).await?,
        };

        let content = self.generate(&path, &input.choice).await?;
        let step = StepInput::new(content)
            .with_choice(input.choice)
            .expecting(expected);

        match from {
            None => self.mutations.advance(session_id, step).await,
            Some(from_id) => self.mutations.diverge(session_id, from_id, step).await,
        }
    }

    async fn generate(
        &self,
        path: &[PathNode],
        choice: &ChoiceText,
    ) -> Result<StoryContent, StoryPathError> {
        let request = LlmRequest::new(build_conversation(path, choice))
            .with_system_prompt(STORY_SYSTEM_PROMPT)
            .with_temperature(STORY_TEMPERATURE)
            .with_max_tokens(Some(STORY_MAX_TOKENS));

        let response = self.llm.generate(request).await?;
        tracing::debug!(
            finish_reason = ?response.finish_reason,
            total_tokens = response.usage.as_ref().map(|u| u.total_tokens),
            "Story continuation generated"
        );

        StoryContent::new(response.content.trim())
            .map_err(|e| StoryPathError::Generation(LlmError::InvalidResponse(e.to_string())))
    }
}

/// The path so far as alternating narration and choices, ending with the new choice.
fn build_conversation(path: &[PathNode], choice: &ChoiceText) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(path.len() * 2 + 1);
    for node in path {
        if let Some(previous) = &node.selected_choice_text {
            messages.push(ChatMessage::user(previous.clone()));
        }
        messages.push(ChatMessage::assistant(node.content.clone()));
    }
    messages.push(ChatMessage::user(choice.as_str()));
    messages
}
