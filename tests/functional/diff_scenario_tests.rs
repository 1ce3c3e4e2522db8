//! Keyed diff scenarios over real table files

use crate::common::{pipe_config, rows, TestFixture};
use tabmerge::differ::{diff_tables, display_key};
use tabmerge::loader::TableFormat;

fn load(fixture: &TestFixture, rel: &str) -> Vec<tabmerge::loader::Row> {
    TableFormat::Delimited { delimiter: b'|' }
        .load(&fixture.root().join(rel))
        .unwrap()
}

#[test]
fn test_diff_classifies_loaded_tables() {
    let fixture = TestFixture::new();
    fixture.write_table(
        "left.csv",
        &[&["id", "name", "amt"], &["1", "A", "10"], &["2", "B", "20"]],
    );
    fixture.write_table(
        "right.csv",
        &[&["id", "name", "amt"], &["1", "A", "15"], &["3", "C", "30"]],
    );

    let left = load(&fixture, "left.csv");
    let right = load(&fixture, "right.csv");
    let result = diff_tables(&left, &right, &pipe_config(&["id"], &[])).unwrap();

    assert_eq!(result.modified_count(), 1);
    assert_eq!(result.deleted_count(), 1);
    assert_eq!(result.added_count(), 1);
    assert_eq!(result.modified[0].left, Some(rows(&[&["1", "A", "10"]])[0].clone()));
    assert_eq!(result.modified[0].right, Some(rows(&[&["1", "A", "15"]])[0].clone()));
}

#[test]
fn test_composite_key_spans_multiple_columns() {
    let fixture = TestFixture::new();
    fixture.write_table(
        "left.csv",
        &[&["id", "plan", "amt"], &["9", "PLAN-1", "10"], &["9", "PLAN-2", "20"]],
    );
    fixture.write_table(
        "right.csv",
        &[&["id", "plan", "amt"], &["9", "PLAN-1", "10"], &["9", "PLAN-2", "25"]],
    );

    let left = load(&fixture, "left.csv");
    let right = load(&fixture, "right.csv");
    let result = diff_tables(&left, &right, &pipe_config(&["id", "plan"], &[])).unwrap();

    assert_eq!(result.modified_count(), 1);
    assert_eq!(display_key(&result.modified[0].key), "9|PLAN-2");
}

#[test]
fn test_no_config_entry_means_whole_row_comparison() {
    let fixture = TestFixture::new();
    fixture.write_table("left.csv", &[&["id", "name"], &["1", "A"], &["2", "B"]]);
    fixture.write_table("right.csv", &[&["id", "name"], &["1", "A"], &["2", "Z"]]);

    let left = load(&fixture, "left.csv");
    let right = load(&fixture, "right.csv");
    // A file without key columns routes to add/delete-only comparison.
    let result = diff_tables(&left, &right, &pipe_config(&[], &[])).unwrap();

    assert_eq!(result.modified_count(), 0);
    assert_eq!(result.added_count(), 1);
    assert_eq!(result.deleted_count(), 1);
}

#[test]
fn test_diff_result_serializes_to_json() {
    let fixture = TestFixture::new();
    fixture.write_table("left.csv", &[&["id"], &["1"]]);
    fixture.write_table("right.csv", &[&["id"], &["2"]]);

    let left = load(&fixture, "left.csv");
    let right = load(&fixture, "right.csv");
    let result = diff_tables(&left, &right, &pipe_config(&["id"], &[])).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["added"].as_array().unwrap().len(), 1);
    assert_eq!(json["deleted"].as_array().unwrap().len(), 1);
}
