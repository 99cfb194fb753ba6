// Repository tree model
//
// Nodes live in a path-keyed arena; folders reference their children by
// path. Folder levels arrive lazily and are merged in as they load.

pub mod arena;
pub mod node;

pub use arena::TreeArena;
pub use node::{NodeKind, NodeType, TreeNode};
