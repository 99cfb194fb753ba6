// Test repository fixtures

use repotree::loader::{InMemorySource, RemoteNode};
use std::path::PathBuf;
use tempfile::TempDir;

/// A small repository, folders listed before files as a host would
///
/// ```text
/// /
/// ├── crates/
/// │   └── core/
/// │       └── src/
/// │           ├── lib.rs
/// │           └── tree.rs
/// ├── docs/
/// │   └── guide.md
/// ├── src/
/// │   └── main.rs
/// └── Cargo.toml
/// ```
pub fn sample_repo() -> RemoteNode {
    RemoteNode::tree(
        "",
        vec![
            RemoteNode::tree(
                "crates",
                vec![RemoteNode::tree(
                    "crates/core",
                    vec![RemoteNode::tree(
                        "crates/core/src",
                        vec![
                            RemoteNode::blob("crates/core/src/lib.rs"),
                            RemoteNode::blob("crates/core/src/tree.rs"),
                        ],
                    )],
                )],
            ),
            RemoteNode::tree(
                "docs",
                vec![RemoteNode::blob("docs/guide.md").with_url("/blob/main/docs/guide.md")],
            ),
            RemoteNode::tree("src", vec![RemoteNode::blob("src/main.rs")]),
            RemoteNode::blob("Cargo.toml"),
        ],
    )
}

/// A fixture tree written to a temporary JSON file
pub struct FixtureFile {
    _temp_dir: TempDir,
    pub path: PathBuf,
}

impl FixtureFile {
    pub fn new(root: &RemoteNode) -> anyhow::Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        let path = temp_dir.path().join("tree.json");
        std::fs::write(&path, serde_json::to_string_pretty(root)?)?;
        Ok(Self {
            _temp_dir: temp_dir,
            path,
        })
    }

    /// Serve the file through an in-memory data source
    pub fn source(&self) -> anyhow::Result<InMemorySource> {
        let json = std::fs::read_to_string(&self.path)?;
        Ok(InMemorySource::from_json(&json)?)
    }
}
