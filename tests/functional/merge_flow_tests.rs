//! End-to-end merge transaction scenarios

use crate::common::{pipe_config, provider, rows, TestFixture};
use std::fs;
use tabmerge::cancel::CancellationToken;
use tabmerge::loader::TableFormat;
use tabmerge::merge::{MergeEngine, MergeOutcome, MergeRequest};
use tabmerge::progress::NoopProgress;

fn run_merge(
    fixture: &TestFixture,
    config: tabmerge::config::ConfigProvider,
    users: &[&str],
    precheck: bool,
) -> MergeOutcome {
    run_merge_with_token(fixture, config, users, precheck, CancellationToken::new())
}

fn run_merge_with_token(
    fixture: &TestFixture,
    config: tabmerge::config::ConfigProvider,
    users: &[&str],
    precheck: bool,
    cancel: CancellationToken,
) -> MergeOutcome {
    let request = MergeRequest {
        baseline_dir: fixture.root().join("baseline"),
        user_dirs: users.iter().map(|u| fixture.root().join(u)).collect(),
        target_dir: fixture.root().join("target"),
        precheck_duplicates: precheck,
    };
    MergeEngine::new(&config, &NoopProgress, cancel).run(&request)
}

#[test]
fn test_merge_applies_user_changes_sorted_by_key() {
    let fixture = TestFixture::new();
    let header: &[&str] = &["id", "name", "amt"];
    fixture.write_table(
        "baseline/plans.csv",
        &[header, &["1", "A", "10"], &["2", "B", "20"]],
    );
    fixture.write_table(
        "target/plans.csv",
        &[header, &["1", "A", "10"], &["2", "B", "20"]],
    );
    // User modifies row 1, adds row 3, removes row 2.
    fixture.write_table(
        "user1/plans.csv",
        &[header, &["3", "C", "30"], &["1", "A", "15"]],
    );

    let config = provider(vec![("plans.csv", pipe_config(&["id"], &[]))]);
    let outcome = run_merge(&fixture, config, &["user1"], true);
    assert!(outcome.is_success(), "{:?}", outcome);

    let merged = fixture.read_table("target/plans.csv");
    assert_eq!(
        merged,
        rows(&[header, &["1", "A", "15"], &["3", "C", "30"]])
    );
}

#[test]
fn test_conflicting_users_abort_and_roll_back() {
    let fixture = TestFixture::new();
    let header: &[&str] = &["id", "plan", "amt"];
    let base: &[&[&str]] = &[header, &["9", "PLAN-1", "10"], &["9", "PLAN-2", "20"]];
    fixture.write_table("baseline/plans.csv", base);
    fixture.write_table("target/plans.csv", base);
    // Both users edit rows that project to dup-key "9".
    fixture.write_table(
        "userA/plans.csv",
        &[header, &["9", "PLAN-1", "11"], &["9", "PLAN-2", "20"]],
    );
    fixture.write_table(
        "userB/plans.csv",
        &[header, &["9", "PLAN-1", "10"], &["9", "PLAN-2", "21"]],
    );

    let before = fs::read(fixture.root().join("target/plans.csv")).unwrap();

    let config = provider(vec![("plans.csv", pipe_config(&["id", "plan"], &["id"]))]);
    let outcome = run_merge(&fixture, config, &["userA", "userB"], true);

    let message = match outcome {
        MergeOutcome::Warning(msg) => msg,
        other => panic!("expected a conflict warning, got {:?}", other),
    };
    assert!(message.contains("userA"), "{}", message);
    assert!(message.contains("userB"), "{}", message);

    // Rollback must leave the target byte-identical to its pre-transaction
    // state even though userA's merge had already been written.
    let after = fs::read(fixture.root().join("target/plans.csv")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_disjoint_entities_from_two_users_merge_cleanly() {
    let fixture = TestFixture::new();
    let header: &[&str] = &["id", "plan", "amt"];
    let base: &[&[&str]] = &[header, &["1", "P", "10"], &["2", "Q", "20"]];
    fixture.write_table("baseline/plans.csv", base);
    fixture.write_table("target/plans.csv", base);
    fixture.write_table(
        "userA/plans.csv",
        &[header, &["1", "P", "11"], &["2", "Q", "20"]],
    );
    fixture.write_table(
        "userB/plans.csv",
        &[header, &["1", "P", "10"], &["2", "Q", "22"]],
    );

    let config = provider(vec![("plans.csv", pipe_config(&["id", "plan"], &["id"]))]);
    let outcome = run_merge(&fixture, config, &["userA", "userB"], true);
    assert!(outcome.is_success(), "{:?}", outcome);

    let merged = fixture.read_table("target/plans.csv");
    assert_eq!(merged, rows(&[header, &["1", "P", "11"], &["2", "Q", "22"]]));
}

#[test]
fn test_duplicate_key_precheck_blocks_before_any_mutation() {
    let fixture = TestFixture::new();
    let header: &[&str] = &["id", "name"];
    fixture.write_table("baseline/plans.csv", &[header, &["1", "A"]]);
    fixture.write_table("target/plans.csv", &[header, &["1", "A"]]);
    fixture.write_table(
        "user1/plans.csv",
        &[header, &["1", "A"], &["1", "B"], &["2", "C"]],
    );

    let before = fs::read(fixture.root().join("target/plans.csv")).unwrap();
    let config = provider(vec![("plans.csv", pipe_config(&["id"], &[]))]);
    let outcome = run_merge(&fixture, config, &["user1"], true);

    match outcome {
        MergeOutcome::Warning(msg) => assert!(msg.contains("duplicate key"), "{}", msg),
        other => panic!("expected a duplicate-key warning, got {:?}", other),
    }
    let after = fs::read(fixture.root().join("target/plans.csv")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_no_eligible_files_is_a_warning() {
    let fixture = TestFixture::new();
    fixture.mkdir("baseline");
    fixture.mkdir("target");
    fixture.mkdir("user1");

    let config = provider(vec![("plans.csv", pipe_config(&["id"], &[]))]);
    let outcome = run_merge(&fixture, config, &["user1"], true);
    match outcome {
        MergeOutcome::Warning(msg) => assert!(msg.contains("no eligible files"), "{}", msg),
        other => panic!("expected a warning, got {:?}", other),
    }
}

#[test]
fn test_unconfigured_files_are_skipped_not_fatal() {
    let fixture = TestFixture::new();
    let header: &[&str] = &["id", "name"];
    fixture.write_table("baseline/plans.csv", &[header, &["1", "A"]]);
    fixture.write_table("baseline/notes.csv", &[&["text"], &["hello"]]);
    fixture.write_table("target/plans.csv", &[header, &["1", "A"]]);
    fixture.write_table("target/notes.csv", &[&["text"], &["hello"]]);
    fixture.write_table("user1/plans.csv", &[header, &["1", "Z"]]);
    fixture.write_table("user1/notes.csv", &[&["text"], &["edited"]]);

    let config = provider(vec![("plans.csv", pipe_config(&["id"], &[]))]);
    let outcome = run_merge(&fixture, config, &["user1"], true);
    assert!(outcome.is_success(), "{:?}", outcome);

    assert_eq!(
        fixture.read_table("target/plans.csv"),
        rows(&[header, &["1", "Z"]])
    );
    // The unconfigured file is not touched.
    assert_eq!(
        fixture.read_table("target/notes.csv"),
        rows(&[&["text"], &["hello"]])
    );
}

#[test]
fn test_missing_target_file_starts_from_baseline() {
    let fixture = TestFixture::new();
    let header: &[&str] = &["id", "name"];
    fixture.write_table("baseline/plans.csv", &[header, &["1", "A"], &["2", "B"]]);
    fixture.mkdir("target");
    fixture.write_table(
        "user1/plans.csv",
        &[header, &["1", "A"], &["2", "B"], &["3", "C"]],
    );

    let config = provider(vec![("plans.csv", pipe_config(&["id"], &[]))]);
    let outcome = run_merge(&fixture, config, &["user1"], true);
    assert!(outcome.is_success(), "{:?}", outcome);

    assert_eq!(
        fixture.read_table("target/plans.csv"),
        rows(&[header, &["1", "A"], &["2", "B"], &["3", "C"]])
    );
}

#[test]
fn test_merged_rows_sort_date_aware() {
    let fixture = TestFixture::new();
    let header: &[&str] = &["booked", "name"];
    let base: &[&[&str]] = &[header, &["10/12/2024", "A"]];
    fixture.write_table("baseline/orders.csv", base);
    fixture.write_table("target/orders.csv", base);
    // Ordinal string order would put "02/01/2025" first; date order must not.
    fixture.write_table(
        "user1/orders.csv",
        &[header, &["10/12/2024", "A"], &["02/01/2025", "B"]],
    );

    let config = provider(vec![("orders.csv", pipe_config(&["booked"], &[]))]);
    let outcome = run_merge(&fixture, config, &["user1"], true);
    assert!(outcome.is_success(), "{:?}", outcome);

    assert_eq!(
        fixture.read_table("target/orders.csv"),
        rows(&[header, &["10/12/2024", "A"], &["02/01/2025", "B"]])
    );
}

#[test]
fn test_binary_tables_merge_through_their_own_writer() {
    let fixture = TestFixture::new();
    let baseline = fixture.mkdir("baseline");
    let target = fixture.mkdir("target");
    let user = fixture.mkdir("user1");

    let base = rows(&[&["id", "name"], &["1", "A"], &["2", "B"]]);
    TableFormat::Binary.write(&baseline.join("plans.tbl"), &base).unwrap();
    TableFormat::Binary.write(&target.join("plans.tbl"), &base).unwrap();
    let edited = rows(&[&["id", "name"], &["1", "A"], &["2", "Z"]]);
    TableFormat::Binary.write(&user.join("plans.tbl"), &edited).unwrap();

    let config = provider(vec![("plans.tbl", pipe_config(&["id"], &[]))]);
    let outcome = run_merge(&fixture, config, &["user1"], true);
    assert!(outcome.is_success(), "{:?}", outcome);

    let merged = TableFormat::Binary
        .load(&fixture.root().join("target/plans.tbl"))
        .unwrap();
    assert_eq!(merged, edited);
}

#[test]
fn test_cancelled_transaction_fails_without_mutation() {
    let fixture = TestFixture::new();
    let header: &[&str] = &["id", "name"];
    fixture.write_table("baseline/plans.csv", &[header, &["1", "A"]]);
    fixture.write_table("target/plans.csv", &[header, &["1", "A"]]);
    fixture.write_table("user1/plans.csv", &[header, &["1", "Z"]]);

    let before = fs::read(fixture.root().join("target/plans.csv")).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let config = provider(vec![("plans.csv", pipe_config(&["id"], &[]))]);
    let outcome = run_merge_with_token(&fixture, config, &["user1"], true, token);
    assert!(matches!(outcome, MergeOutcome::Failure(_)), "{:?}", outcome);

    let after = fs::read(fixture.root().join("target/plans.csv")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_pre_existing_target_divergence_conflicts_with_user_edit() {
    let fixture = TestFixture::new();
    let header: &[&str] = &["id", "name"];
    fixture.write_table("baseline/plans.csv", &[header, &["1", "A"]]);
    // The target already diverged from the baseline on key 1.
    fixture.write_table("target/plans.csv", &[header, &["1", "T"]]);
    fixture.write_table("user1/plans.csv", &[header, &["1", "U"]]);

    let before = fs::read(fixture.root().join("target/plans.csv")).unwrap();
    let config = provider(vec![("plans.csv", pipe_config(&["id"], &[]))]);
    let outcome = run_merge(&fixture, config, &["user1"], true);

    match outcome {
        MergeOutcome::Warning(msg) => assert!(msg.contains("target copy"), "{}", msg),
        other => panic!("expected a conflict warning, got {:?}", other),
    }
    let after = fs::read(fixture.root().join("target/plans.csv")).unwrap();
    assert_eq!(before, after);
}
