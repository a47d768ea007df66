//! Value objects - validated newtypes shared by entities.

mod branch_id;
mod story_text;

pub use branch_id::{BranchId, BRANCH_ID_PREFIX};
pub use story_text::{ChoiceText, StoryContent};
