use pretty_assertions::assert_eq;
use srcgraph_indexer::{
    apply_database_policy, keys, AutoPolicy, Blackboard, DatabasePolicy, IncludeGraphParser,
    IndexerConfig, IndexingPipeline, IndexingReport, ParseFailure, PipelineEvent, PipelineOptions,
    Project, RefreshMode, RunOutcome, SharedDecider, SourceParser,
};
use srcgraph_store::{ParserClient, PersistentSymbolStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Ends inside `[indexing]` so that tests can append indexing settings.
const BASE_CONFIG: &str = r#"
[[source_group]]
kind = "cxx"
name = "app"
source_paths = ["src"]
header_search_paths = ["include"]

[indexing]
worker_count = 0
tick_interval_ms = 1
fingerprint = "content_hash"
"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn sample_project(extra: &str) -> (TempDir, Project) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "src/a.c", "#include \"b.h\"\n#include <lib.h>\nint main() {}\n");
    write(root, "src/b.h", "#define B_VALUE 1\n");
    write(root, "src/c.c", "#define C_ONLY 3\n");
    write(root, "include/lib.h", "#define LIB 2\n");

    let config = IndexerConfig::from_toml_str(&format!("{BASE_CONFIG}{extra}")).unwrap();
    let project = Project::new(root, config).unwrap();
    (dir, project)
}

fn keep_all() -> SharedDecider {
    Arc::new(Mutex::new(AutoPolicy {
        keep_interrupted: true,
    }))
}

fn refresh(
    project: &Project,
    store: &mut PersistentSymbolStore,
    mode: RefreshMode,
    parser: Arc<dyn SourceParser>,
    options: PipelineOptions,
    decider: SharedDecider,
) -> IndexingReport {
    let info = project.plan(store, mode).unwrap();
    let mut pipeline = IndexingPipeline::new(options, parser, decider);
    let report = pipeline.run(&info, store, &mut Blackboard::new()).unwrap();
    apply_database_policy(store, report.policy.unwrap()).unwrap();
    report
}

fn index(
    project: &Project,
    store: &mut PersistentSymbolStore,
    mode: RefreshMode,
) -> IndexingReport {
    let info = project.plan(store, mode).unwrap();
    refresh(
        project,
        store,
        mode,
        Arc::new(project.parser()),
        project.pipeline_options(&info),
        keep_all(),
    )
}

fn src(project: &Project, relative: &str) -> PathBuf {
    project.root().join(relative)
}

#[test]
fn full_index_then_nothing_to_do() {
    let (_dir, project) = sample_project("");
    let mut store = project.open_store().unwrap();

    let report = index(&project, &mut store, RefreshMode::AllFiles);
    assert_eq!(report.outcome, RunOutcome::Success { errors: 0 });
    assert_eq!(report.source_file_count, 3);
    assert_eq!(report.indexed_source_file_count, 3);
    assert_eq!(report.file_count, 4);
    assert_eq!(report.policy, Some(DatabasePolicy::Keep));

    let again = project.plan(&store, RefreshMode::UpdatedFiles).unwrap();
    assert!(again.is_empty(), "unexpected plan {again:?}");

    let reopened = PersistentSymbolStore::open(project.store_path()).unwrap();
    assert_eq!(reopened.get_storage_stats().unwrap().file_count, 4);
    assert_eq!(reopened.find_symbol("B_VALUE").unwrap().len(), 1);
}

#[test]
fn modified_header_reindexes_its_includer() {
    let (_dir, project) = sample_project("");
    let mut store = project.open_store().unwrap();
    index(&project, &mut store, RefreshMode::AllFiles);

    write(project.root(), "src/b.h", "#define B_VALUE 42\n");
    let info = project.plan(&store, RefreshMode::UpdatedFiles).unwrap();
    let expected = vec![src(&project, "src/a.c"), src(&project, "src/b.h")];
    assert_eq!(info.files_to_clear, expected);
    assert_eq!(info.files_to_index, expected);

    let report = index(&project, &mut store, RefreshMode::UpdatedFiles);
    assert_eq!(report.indexed_source_file_count, 2);
    assert!(project.plan(&store, RefreshMode::UpdatedFiles).unwrap().is_empty());
}

#[test]
fn header_outside_the_source_set_is_cleared_but_not_indexed() {
    let (_dir, project) = sample_project("");
    let mut store = project.open_store().unwrap();
    index(&project, &mut store, RefreshMode::AllFiles);

    let lib = project.root().join("include/lib.h");
    assert_eq!(
        store.dependents_of(&lib).unwrap().into_iter().collect::<Vec<_>>(),
        vec![src(&project, "src/a.c")]
    );

    write(project.root(), "include/lib.h", "#define LIB 3\n");
    let info = project.plan(&store, RefreshMode::UpdatedFiles).unwrap();
    assert_eq!(info.files_to_clear, vec![lib.clone(), src(&project, "src/a.c")]);
    assert_eq!(info.files_to_index, vec![src(&project, "src/a.c")]);

    index(&project, &mut store, RefreshMode::UpdatedFiles);
    assert!(store.file(&lib).unwrap().is_some());
    assert!(project.plan(&store, RefreshMode::UpdatedFiles).unwrap().is_empty());
}

#[test]
fn deleted_file_is_only_cleared() {
    let (_dir, project) = sample_project("");
    let mut store = project.open_store().unwrap();
    index(&project, &mut store, RefreshMode::AllFiles);

    fs::remove_file(src(&project, "src/c.c")).unwrap();
    let info = project.plan(&store, RefreshMode::UpdatedFiles).unwrap();
    assert_eq!(info.files_to_clear, vec![src(&project, "src/c.c")]);
    assert!(info.files_to_index.is_empty());

    index(&project, &mut store, RefreshMode::UpdatedFiles);
    assert!(store.find_symbol("C_ONLY").unwrap().is_empty());
    assert_eq!(store.get_storage_stats().unwrap().file_count, 3);
}

#[test]
fn unresolved_include_is_a_non_fatal_error() {
    let (_dir, project) = sample_project("");
    write(project.root(), "src/d.c", "#include \"missing.h\"\n");
    let mut store = project.open_store().unwrap();

    let report = index(&project, &mut store, RefreshMode::AllFiles);
    assert_eq!(report.outcome, RunOutcome::Success { errors: 1 });
    assert_eq!(report.completed_file_count, report.file_count);
    assert!(store.errors().unwrap()[0].message.contains("missing.h"));
}

#[test]
fn worker_pool_matches_inline_indexing() {
    let (_inline_dir, inline_project) = sample_project("");
    let mut inline_store = inline_project.open_store().unwrap();
    index(&inline_project, &mut inline_store, RefreshMode::AllFiles);

    let (_pool_dir, pool_project) = sample_project("");
    let mut pool_store = pool_project.open_store().unwrap();
    let info = pool_project.plan(&pool_store, RefreshMode::AllFiles).unwrap();
    let mut options = pool_project.pipeline_options(&info);
    options.worker_count = 4;
    let report = refresh(
        &pool_project,
        &mut pool_store,
        RefreshMode::AllFiles,
        Arc::new(pool_project.parser()),
        options,
        keep_all(),
    );

    assert_eq!(report.indexed_source_file_count, 3);
    assert_eq!(
        inline_store.get_storage_stats().unwrap(),
        pool_store.get_storage_stats().unwrap()
    );
}

/// Cancels the run once `after` files have been parsed.
struct CancelAfter {
    inner: IncludeGraphParser,
    token: CancellationToken,
    after: usize,
    parsed: AtomicUsize,
}

impl SourceParser for CancelAfter {
    fn parse(&self, path: &Path, client: &mut dyn ParserClient) -> Result<(), ParseFailure> {
        self.inner.parse(path, client)?;
        if self.parsed.fetch_add(1, Ordering::SeqCst) + 1 >= self.after {
            self.token.cancel();
        }
        Ok(())
    }
}

#[test]
fn cancelled_run_keeps_applied_files_and_retries_the_rest() {
    let (_dir, project) = sample_project("");
    let mut store = project.open_store().unwrap();

    let info = project.plan(&store, RefreshMode::AllFiles).unwrap();
    let token = CancellationToken::new();
    let parser = Arc::new(CancelAfter {
        inner: project.parser(),
        token: token.clone(),
        after: 1,
        parsed: AtomicUsize::new(0),
    });
    let mut pipeline = IndexingPipeline::new(project.pipeline_options(&info), parser, keep_all())
        .with_cancel_token(token);

    let mut board = Blackboard::new();
    let report = pipeline.run(&info, &mut store, &mut board).unwrap();
    assert_eq!(report.outcome, RunOutcome::Interrupted);
    assert!(report.interrupted);
    assert_eq!(board.get::<bool>(keys::INTERRUPTED_INDEXING), Some(true));
    apply_database_policy(&mut store, report.policy.unwrap()).unwrap();

    assert_eq!(report.indexed_source_file_count, 1);
    let records = store.file_records().unwrap();
    let a = src(&project, "src/a.c");
    assert!(records.iter().any(|r| r.path == a && r.indexed));
    assert!(records
        .iter()
        .filter(|r| r.path != a && r.path.starts_with(project.root().join("src")))
        .all(|r| !r.indexed));

    assert!(project.plan(&store, RefreshMode::UpdatedFiles).unwrap().is_empty());
    // a.c comes back too because it includes the unfinished b.h.
    let retry = project
        .plan(&store, RefreshMode::UpdatedAndIncompleteFiles)
        .unwrap();
    assert_eq!(
        retry.files_to_index,
        vec![a, src(&project, "src/b.h"), src(&project, "src/c.c")]
    );
}

#[test]
fn discarded_run_leaves_the_kept_store_untouched() {
    let (_dir, project) = sample_project("");
    let mut store = project.open_store().unwrap();
    index(&project, &mut store, RefreshMode::AllFiles);
    let before = store.get_storage_stats().unwrap();

    write(project.root(), "src/e.c", "#define E 5\n");
    let info = project.plan(&store, RefreshMode::UpdatedFiles).unwrap();
    let discard: SharedDecider =
        Arc::new(Mutex::new(|_: &IndexingReport| DatabasePolicy::Discard));
    let report = refresh(
        &project,
        &mut store,
        RefreshMode::UpdatedFiles,
        Arc::new(project.parser()),
        project.pipeline_options(&info),
        discard,
    );

    assert_eq!(report.policy, Some(DatabasePolicy::Discard));
    assert_eq!(store.get_storage_stats().unwrap(), before);
    assert!(store.find_symbol("E").unwrap().is_empty());
    let reopened = PersistentSymbolStore::open(project.store_path()).unwrap();
    assert_eq!(reopened.get_storage_stats().unwrap(), before);
}

#[test]
fn failing_include_validation_aborts_before_any_write() {
    let (_dir, project) =
        sample_project("validate_includes = true\nfail_on_unresolved_includes = true\n");
    write(project.root(), "src/d.c", "#include \"missing.h\"\n");
    let mut store = project.open_store().unwrap();

    let mut board = Blackboard::new();
    let info = project.plan(&store, RefreshMode::AllFiles).unwrap();
    let mut pipeline = IndexingPipeline::new(
        project.pipeline_options(&info),
        Arc::new(project.parser()),
        keep_all(),
    );
    let report = pipeline.run(&info, &mut store, &mut board).unwrap();

    assert!(matches!(report.outcome, RunOutcome::Aborted { .. }));
    assert_eq!(report.policy, Some(DatabasePolicy::Discard));
    assert_eq!(board.get::<usize>(keys::UNRESOLVED_INCLUDE_COUNT), Some(1));
    apply_database_policy(&mut store, DatabasePolicy::Discard).unwrap();
    assert!(!store.has_files().unwrap());
}

#[test]
fn aborted_run_reports_even_when_nobody_listens() {
    let (_dir, project) =
        sample_project("validate_includes = true\nfail_on_unresolved_includes = true\n");
    write(project.root(), "src/d.c", "#include \"missing.h\"\n");
    let mut store = project.open_store().unwrap();

    let (sender, receiver) = tokio::sync::mpsc::unbounded_channel::<PipelineEvent>();
    drop(receiver);
    let info = project.plan(&store, RefreshMode::AllFiles).unwrap();
    let mut pipeline = IndexingPipeline::new(
        project.pipeline_options(&info),
        Arc::new(project.parser()),
        keep_all(),
    )
    .with_events(sender);
    let report = pipeline
        .run(&info, &mut store, &mut Blackboard::new())
        .unwrap();

    assert!(matches!(report.outcome, RunOutcome::Aborted { .. }));
    assert_eq!(report.policy, Some(DatabasePolicy::Discard));
}

/// Front end that always gives up.
struct Rejecting;

impl SourceParser for Rejecting {
    fn parse(&self, _path: &Path, _client: &mut dyn ParserClient) -> Result<(), ParseFailure> {
        Err(ParseFailure::new("no front end for this dialect"))
    }
}

#[test]
fn fatal_errors_leave_files_incomplete() {
    let (_dir, project) = sample_project("");
    let mut store = project.open_store().unwrap();
    let info = project.plan(&store, RefreshMode::AllFiles).unwrap();

    let report = refresh(
        &project,
        &mut store,
        RefreshMode::AllFiles,
        Arc::new(Rejecting),
        project.pipeline_options(&info),
        keep_all(),
    );
    assert_eq!(
        report.outcome,
        RunOutcome::SuccessWithFatalErrors {
            errors: 3,
            fatal: 3
        }
    );
    assert_eq!(report.completed_file_count, 0);
    assert!(report.status_line().ends_with("3 errors (3 fatal errors)"));

    let retry = project
        .plan(&store, RefreshMode::UpdatedAndIncompleteFiles)
        .unwrap();
    assert_eq!(retry.files_to_index.len(), 3);
}
