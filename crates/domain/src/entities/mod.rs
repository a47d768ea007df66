//! Domain entities - plain records with their invariants.

mod game_session;
mod path_node;

pub use game_session::GameSession;
pub use path_node::PathNode;
