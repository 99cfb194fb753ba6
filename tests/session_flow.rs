// Session-level tests: set-up, slow and out-of-order loads, teardown, rendering

mod common;

use common::fixtures::{sample_repo, FixtureFile};
use common::tracing::init_tracing_from_env;
use repotree::compress::CompressedView;
use repotree::loader::{InMemorySource, RepoContext, SlowSource, SlowSourceConfig};
use repotree::navigation::{HostOs, Key, KeyInput, KeyOutcome};
use repotree::session::{PlatformHints, TreeSession};
use repotree::SidebarConfig;
use std::sync::Arc;
use std::time::Duration;

fn context() -> RepoContext {
    RepoContext::new("octo", "sample", "main")
}

fn rendered_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

struct ShowingTreeRs;

impl PlatformHints for ShowingTreeRs {
    fn current_path(&self, _branch_name: &str) -> Option<Vec<String>> {
        Some(
            ["crates", "core", "src", "tree.rs"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

#[tokio::test]
async fn test_set_up_from_fixture_file_reveals_current_path() {
    init_tracing_from_env();
    let fixture = FixtureFile::new(&sample_repo()).unwrap();
    let source = Arc::new(fixture.source().unwrap().with_defer(true));

    let session = TreeSession::new(source, context(), SidebarConfig::default())
        .with_hints(Arc::new(ShowingTreeRs));
    let explorer = session.set_up(|_| {}).await.unwrap().unwrap();
    let snapshot = explorer.visible_nodes();

    insta::assert_debug_snapshot!(rendered_lines(&snapshot.to_string()), @r#"
    [
        " v crates",
        "   v core",
        "     v src",
        "       - lib.rs",
        ">      - tree.rs",
        " + docs",
        " + src",
        " - Cargo.toml",
    ]
    "#);

    let view = CompressedView::new(&snapshot);
    insta::assert_debug_snapshot!(rendered_lines(&view.to_string()), @r#"
    [
        " v crates/core/src",
        "   - lib.rs",
        ">  - tree.rs",
        " + docs",
        " + src",
        " - Cargo.toml",
    ]
    "#);
}

#[tokio::test]
async fn test_keyboard_walk_after_set_up() {
    let source = Arc::new(InMemorySource::new(sample_repo()).with_defer(true));
    let session = TreeSession::new(source, context(), SidebarConfig::default())
        .with_hints(Arc::new(ShowingTreeRs));
    let explorer = session
        .set_up(|_| {})
        .await
        .unwrap()
        .unwrap()
        .with_host_os(HostOs::Other);

    let left = KeyInput::new(Key::Left);
    assert_eq!(explorer.handle_key(left).await.unwrap(), KeyOutcome::Handled);
    assert_eq!(
        explorer.visible_nodes().focused_node.as_deref(),
        Some("crates/core/src")
    );

    // Collapse, then walk down past the end of the list
    explorer.handle_key(left).await.unwrap();
    assert!(!explorer.generator().is_expanded("crates/core/src"));
    let mut outcome = KeyOutcome::Handled;
    for _ in 0..10 {
        outcome = explorer.handle_key(KeyInput::new(Key::Down)).await.unwrap();
        if outcome != KeyOutcome::Handled {
            break;
        }
    }
    assert_eq!(outcome, KeyOutcome::FocusSearch);
    assert_eq!(explorer.visible_nodes().focused_node, None);
}

#[tokio::test(start_paused = true)]
async fn test_loads_commit_in_completion_order() {
    let inner = Arc::new(InMemorySource::new(sample_repo()).with_defer(true));
    let slow = Arc::new(SlowSource::new(
        inner,
        SlowSourceConfig::none()
            .with_path_delay("docs", Duration::from_millis(300))
            .with_path_delay("src", Duration::from_millis(50)),
    ));
    let session = TreeSession::new(slow.clone(), context(), SidebarConfig::default());
    let explorer = session.set_up(|_| {}).await.unwrap().unwrap();
    let generator = explorer.generator();
    let (mut updates, _subscription) = generator.updates();

    let (docs, src) = tokio::join!(
        generator.set_expand("docs", true, false),
        generator.set_expand("src", true, false)
    );
    docs.unwrap();
    src.unwrap();

    let first = updates.recv().await.unwrap();
    let second = updates.recv().await.unwrap();
    assert!(first.is_expanded("src"));
    assert!(!first.is_expanded("docs"));
    assert!(second.is_expanded("docs"));
    assert!(first.revision < second.revision);
    assert!(updates.try_recv().is_err());

    let metrics = slow.metrics();
    assert_eq!(metrics.root_calls, 1);
    assert_eq!(metrics.level_calls, 2);
}

#[tokio::test(start_paused = true)]
async fn test_tear_down_drops_in_flight_loads() {
    let inner = Arc::new(InMemorySource::new(sample_repo()).with_defer(true));
    let slow = Arc::new(SlowSource::with_uniform_delay(
        inner,
        Duration::from_millis(100),
    ));
    let session = TreeSession::new(slow, context(), SidebarConfig::default());
    let explorer = session.set_up(|_| {}).await.unwrap().unwrap();
    let before = explorer.visible_nodes();

    let expand = explorer.generator().set_expand("crates", true, true);
    let teardown = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.tear_down();
    };
    let (result, ()) = tokio::join!(expand, teardown);

    result.unwrap();
    assert!(!explorer.generator().is_current());
    assert!(!explorer.generator().is_loaded("crates"));
    assert_eq!(explorer.visible_nodes(), before);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_expansions_share_one_fetch() {
    let inner = Arc::new(InMemorySource::new(sample_repo()).with_defer(true));
    let slow = Arc::new(SlowSource::with_uniform_delay(
        inner.clone(),
        Duration::from_millis(100),
    ));
    let session = TreeSession::new(slow, context(), SidebarConfig::default());
    let explorer = session.set_up(|_| {}).await.unwrap().unwrap();
    let generator = explorer.generator();

    let (a, b, c) = tokio::join!(
        generator.set_expand("src", true, false),
        generator.toggle_expand("src", false),
        generator.expand_to("src/main.rs")
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(c.unwrap().path, "src/main.rs");

    assert_eq!(inner.calls_for("src"), 1);
    assert!(generator.is_expanded("src"));
}
