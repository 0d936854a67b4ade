//! The hierarchical command-line interface.
//!
//! [`tree`] holds the static command tree; [`interpreter`] walks it against
//! tokenized console input with permission checks at the terminal nodes.

pub mod interpreter;
pub mod tree;

pub use interpreter::Interpreter;
pub use tree::{CommandNode, CommandTree, MenuId, NodeAction, COMMAND_TREE};
