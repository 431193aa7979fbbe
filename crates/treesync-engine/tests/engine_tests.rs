//! End-to-end engine scenarios: ordering, prerequisites, partial
//! failure, cancellation, and re-run safety.

use pretty_assertions::assert_eq;
use treesync_engine::{
    ConflictDecision, Engine, EngineError, FetchOptions, OperationKind, StoreError, StorePrimitive,
};
use treesync_model::{ChangeType, Direction, SyncSet, SyncState};
use treesync_test_utils::{
    ProgressProbe, RecordingStore, ScriptedCommentPrompt, ScriptedConflictPrompt, StoreCall,
    TreeBuilder,
};

fn outgoing(change: ChangeType) -> SyncState {
    SyncState::change(Direction::Outgoing, change)
}

fn incoming(change: ChangeType) -> SyncState {
    SyncState::change(Direction::Incoming, change)
}

#[test]
fn publish_orders_register_delete_publish() {
    // fileA is an outgoing addition, fileB an outgoing deletion: the
    // store must see register, then delete-remote, then one publish
    // covering both.
    let (mut tree, ids) = TreeBuilder::new("project")
        .file("project/fileA", outgoing(ChangeType::Addition))
        .file("project/fileB", outgoing(ChangeType::Deletion))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::answering("publish message");
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    let result = engine
        .run(&mut tree, OperationKind::Publish, selection, &progress)
        .unwrap();

    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Register("project/fileA".into()),
            StoreCall::DeleteRemote(vec!["project/fileB".into()]),
            StoreCall::Publish(
                vec!["project/fileA".into(), "project/fileB".into()],
                "publish message".into()
            ),
        ]
    );
    assert!(result.contains(ids["project/fileA"]));
    assert!(result.contains(ids["project/fileB"]));
    assert_eq!(result.len(), 2);

    // Both leaves were folded out of the tree.
    assert!(tree.is_removed(ids["project/fileA"]));
    assert!(tree.is_removed(ids["project/fileB"]));

    // The tombstoned result set stays readable.
    let resources = result.resources(&tree);
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].path.as_str(), "project/fileA");
}

#[test]
fn update_registers_prerequisite_folder_before_fetching() {
    // folderC is an incoming addition; its child fileD cannot be
    // fetched until the folder exists locally.
    let (mut tree, ids) = TreeBuilder::new("project")
        .folder("project/folderC", incoming(ChangeType::Addition))
        .file("project/folderC/fileD", incoming(ChangeType::Addition))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::Abort);
    let comments = ScriptedCommentPrompt::cancelling();
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    let result = engine
        .run(
            &mut tree,
            OperationKind::Update {
                mergeable_only: false,
            },
            selection,
            &progress,
        )
        .unwrap();

    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Register("project/folderC".into()),
            StoreCall::Fetch(
                vec!["project/folderC/fileD".into()],
                FetchOptions::shallow_ignore_local()
            ),
        ]
    );
    assert_eq!(result.len(), 1);
    assert!(result.contains(ids["project/folderC/fileD"]));

    // The satisfied prerequisite container collapsed away with its
    // synchronized child.
    assert!(tree.is_removed(ids["project/folderC"]));
}

#[test]
fn contiguous_prerequisite_chain_registers_top_down() {
    // a is already in sync (assumed registered); b and c are incoming
    // additions and must be registered outermost-first.
    let (mut tree, _ids) = TreeBuilder::new("project")
        .folder("project/a", SyncState::in_sync())
        .folder("project/a/b", incoming(ChangeType::Addition))
        .folder("project/a/b/c", incoming(ChangeType::Addition))
        .file("project/a/b/c/leaf", incoming(ChangeType::Addition))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::cancelling();
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    engine
        .run(&mut tree, OperationKind::Fetch, selection, &progress)
        .unwrap();

    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Register("project/a/b".into()),
            StoreCall::Register("project/a/b/c".into()),
            StoreCall::Fetch(
                vec!["project/a/b/c/leaf".into()],
                FetchOptions::shallow_ignore_local()
            ),
        ]
    );
}

#[test]
fn conflicting_ancestor_is_registered_as_prerequisite() {
    let (mut tree, ids) = TreeBuilder::new("project")
        .folder(
            "project/clash",
            SyncState::conflict(ChangeType::Modification, false),
        )
        .file("project/clash/file", incoming(ChangeType::Addition))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::cancelling();
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    let result = engine
        .run(&mut tree, OperationKind::Fetch, selection, &progress)
        .unwrap();

    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Register("project/clash".into()),
            StoreCall::Fetch(
                vec!["project/clash/file".into()],
                FetchOptions::shallow_ignore_local()
            ),
        ]
    );
    assert_eq!(result.len(), 1);
    assert!(tree.is_removed(ids["project/clash"]));
}

#[test]
fn proceed_non_conflicting_drops_the_conflict() {
    // One conflicting and one outgoing node under publish; the
    // prompt picks the safe subset.
    let (mut tree, ids) = TreeBuilder::new("project")
        .file(
            "project/clash.txt",
            SyncState::conflict(ChangeType::Modification, false),
        )
        .file("project/mine.txt", outgoing(ChangeType::Modification))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedNonConflicting);
    let comments = ScriptedCommentPrompt::answering("msg");
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    let result = engine
        .run(&mut tree, OperationKind::Publish, selection, &progress)
        .unwrap();

    assert_eq!(
        store.calls(),
        vec![StoreCall::Publish(vec!["project/mine.txt".into()], "msg".into())]
    );
    assert_eq!(result.len(), 1);
    assert!(result.contains(ids["project/mine.txt"]));

    // The conflicting node was left untouched and re-diffable.
    assert!(!tree.is_removed(ids["project/clash.txt"]));
    assert!(
        tree.node(ids["project/clash.txt"])
            .unwrap()
            .state()
            .is_conflict()
    );
}

#[test]
fn publish_partial_failure_folds_only_the_applied_prefix() {
    // Publish fails for a 3-node batch after the first node
    // succeeds.
    let (mut tree, ids) = TreeBuilder::new("project")
        .file("project/one", outgoing(ChangeType::Modification))
        .file("project/two", outgoing(ChangeType::Modification))
        .file("project/three", outgoing(ChangeType::Modification))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new().fail_when(
        StorePrimitive::Publish,
        StoreError::Partial {
            applied: 1,
            reason: "connection dropped".into(),
        },
    );
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::answering("msg");
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    let err = engine
        .run(&mut tree, OperationKind::Publish, selection, &progress)
        .unwrap_err();

    match err {
        EngineError::StoreFailure {
            primitive,
            resource,
            source,
        } => {
            assert_eq!(primitive, StorePrimitive::Publish);
            assert_eq!(resource, "project/two");
            assert_eq!(
                source,
                StoreError::Partial {
                    applied: 1,
                    reason: "connection dropped".into()
                }
            );
        }
        other => panic!("expected StoreFailure, got {other:?}"),
    }

    // Only the applied prefix was folded; the rest keeps its
    // classification for a retry.
    assert!(tree.is_removed(ids["project/one"]));
    assert!(!tree.is_removed(ids["project/two"]));
    assert!(!tree.is_removed(ids["project/three"]));
    assert!(tree.node(ids["project/two"]).unwrap().state().is_outgoing());
}

#[test]
fn failed_first_primitive_leaves_multi_step_node_classified() {
    // fileB's register fails. fileA's register succeeded, but fileA
    // still needs its publish, so nothing may be folded.
    let (mut tree, ids) = TreeBuilder::new("project")
        .file("project/fileA", outgoing(ChangeType::Addition))
        .file("project/fileB", outgoing(ChangeType::Addition))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new().fail_when_path(
        StorePrimitive::Register,
        "project/fileB",
        StoreError::Rejected {
            path: "project/fileB".into(),
            reason: "permission denied".into(),
        },
    );
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::answering("msg");
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    let err = engine
        .run(&mut tree, OperationKind::Publish, selection, &progress)
        .unwrap_err();

    assert!(matches!(
        err,
        EngineError::StoreFailure {
            primitive: StorePrimitive::Register,
            ..
        }
    ));
    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Register("project/fileA".into()),
            StoreCall::Register("project/fileB".into()),
        ]
    );
    // No publish ran, so neither node is synchronized; a re-run
    // re-registers fileA, which the store contract keeps idempotent.
    assert!(!tree.is_removed(ids["project/fileA"]));
    assert!(!tree.is_removed(ids["project/fileB"]));
}

#[test]
fn successful_run_consumes_the_selection() {
    let (mut tree, _ids) = TreeBuilder::new("project")
        .file("project/a", outgoing(ChangeType::Modification))
        .file("project/b", outgoing(ChangeType::Deletion))
        .finish();

    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::answering("msg");
    let progress = ProgressProbe::new();

    let mut store = RecordingStore::new();
    let first = {
        let selection = SyncSet::from_selection(&tree, [tree.root()]);
        let mut engine = Engine::new(&mut store, &conflicts, &comments);
        engine
            .run(&mut tree, OperationKind::Publish, selection, &progress)
            .unwrap()
    };
    assert_eq!(first.len(), 2);

    // Re-running the same operation over the same initial selection
    // (re-derived from the tree) finds nothing left to do.
    let mut second_store = RecordingStore::new();
    let second = {
        let selection = SyncSet::from_selection(&tree, [tree.root()]);
        let mut engine = Engine::new(&mut second_store, &conflicts, &comments);
        engine
            .run(&mut tree, OperationKind::Publish, selection, &progress)
            .unwrap()
    };
    assert!(second.is_empty());
    assert_eq!(second_store.calls(), vec![]);
}

#[test]
fn cancellation_between_primitives_keeps_partial_result() {
    // fileA needs convert + delete-local (3 units), fileB a fetch. The
    // probe cancels once 3 units are reported, so fileB's fetch never
    // runs but fileA's completed work is kept.
    let (mut tree, ids) = TreeBuilder::new("project")
        .file("project/fileA", outgoing(ChangeType::Addition))
        .file("project/fileB", incoming(ChangeType::Modification))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::cancelling();
    let progress = ProgressProbe::cancel_after(3);

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    let err = engine
        .run(
            &mut tree,
            OperationKind::Update {
                mergeable_only: false,
            },
            selection,
            &progress,
        )
        .unwrap_err();

    assert_eq!(err, EngineError::OperationCancelled { applied: 1, total: 2 });
    assert_eq!(
        store.calls(),
        vec![
            StoreCall::ConvertDirection("project/fileA".into(), Direction::Incoming),
            StoreCall::DeleteLocal("project/fileA".into()),
        ]
    );
    assert!(tree.is_removed(ids["project/fileA"]));
    assert!(!tree.is_removed(ids["project/fileB"]));
}

#[test]
fn comment_cancel_aborts_before_any_store_call() {
    let (mut tree, ids) = TreeBuilder::new("project")
        .file("project/a", outgoing(ChangeType::Modification))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::cancelling();
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    let err = engine
        .run(&mut tree, OperationKind::Publish, selection, &progress)
        .unwrap_err();

    assert_eq!(err, EngineError::UserCancelled);
    assert_eq!(store.calls(), vec![]);
    assert!(!tree.is_removed(ids["project/a"]));
}

#[test]
fn empty_selection_is_noop_success() {
    let (mut tree, _) = TreeBuilder::new("project").finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::Abort);
    let comments = ScriptedCommentPrompt::cancelling();
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    let result = engine
        .run(&mut tree, OperationKind::Publish, selection, &progress)
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(store.calls(), vec![]);
    assert_eq!(conflicts.times_asked(), 0);
    assert_eq!(comments.times_asked(), 0);
}

#[test]
fn progress_totals_follow_step_weights() {
    // register (1) + publish (1) for fileA, delete-remote (2) +
    // publish (1) for fileB: five units announced and reported.
    let (mut tree, _) = TreeBuilder::new("project")
        .file("project/fileA", outgoing(ChangeType::Addition))
        .file("project/fileB", outgoing(ChangeType::Deletion))
        .finish();
    let selection = SyncSet::from_selection(&tree, [tree.root()]);

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::answering("msg");
    let progress = ProgressProbe::new();

    let mut engine = Engine::new(&mut store, &conflicts, &comments);
    engine
        .run(&mut tree, OperationKind::Publish, selection, &progress)
        .unwrap();

    assert_eq!(progress.total(), Some(5));
    assert_eq!(progress.reported(), 5);
}

#[test]
fn is_enabled_ors_over_descendants() {
    let (tree, ids) = TreeBuilder::new("project")
        .folder("project/src", SyncState::in_sync())
        .folder("project/src/deep", SyncState::in_sync())
        .file("project/src/deep/changed", outgoing(ChangeType::Modification))
        .file("project/readme", SyncState::in_sync())
        .finish();

    let mut store = RecordingStore::new();
    let conflicts = ScriptedConflictPrompt::answering(ConflictDecision::ProceedAll);
    let comments = ScriptedCommentPrompt::answering("msg");
    let engine = Engine::new(&mut store, &conflicts, &comments);

    assert!(engine.is_enabled(&tree, OperationKind::Publish, tree.root()));
    assert!(engine.is_enabled(&tree, OperationKind::Publish, ids["project/src"]));
    assert!(!engine.is_enabled(&tree, OperationKind::Fetch, tree.root()));
    assert!(!engine.is_enabled(&tree, OperationKind::Publish, ids["project/readme"]));
}
