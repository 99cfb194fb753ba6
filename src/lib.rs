// Repository file-tree engine - exposes all core modules for hosts and tests

pub mod compress;
pub mod config;
pub mod error;
pub mod generator;
pub mod loader;
pub mod logging;
pub mod navigation;
pub mod search;
pub mod session;
pub mod tree;

mod sync;

pub use config::SidebarConfig;
pub use error::{LoadError, TreeError};
pub use generator::{VisibleNode, VisibleNodes, VisibleNodesGenerator};
pub use navigation::FileExplorer;
pub use session::{SessionEpoch, TreeSession};
