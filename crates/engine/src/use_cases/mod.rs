//! Use cases - User story orchestration.
//!
//! Each module contains use cases for a specific domain area.
//! Use cases orchestrate across entity modules to fulfill user stories.

pub mod choice;
pub mod session;
pub mod story;

pub use choice::{ChoiceInput, MakeChoice};
pub use session::SessionUseCases;
pub use story::{StoryPathError, StoryUseCases};
