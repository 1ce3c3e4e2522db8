//! Folder-level line coverage scenarios

use crate::common::TestFixture;
use tabmerge::cancel::CancellationToken;
use tabmerge::lineset::{LineSetComparator, LineSetOptions};

fn comparator(options: LineSetOptions) -> LineSetComparator {
    LineSetComparator::new(options, CancellationToken::new())
}

#[test]
fn test_counts_balance_across_a_folder() {
    let fixture = TestFixture::new();
    fixture.write_lines("left/a.txt", &["one", "two", "three"]);
    fixture.write_lines("left/b.txt", &["three", "four"]);
    fixture.write_lines("right/ref.txt", &["two", "three", "five"]);

    let report = comparator(LineSetOptions::default())
        .compare(&fixture.root().join("left"), &fixture.root().join("right"))
        .unwrap();

    assert_eq!(report.files.len(), 2);
    for file in &report.files {
        assert_eq!(file.matched + file.missing, file.total);
    }
    // a.txt misses "one"; b.txt misses "four".
    assert_eq!(report.total_missing(), 2);
    assert_eq!(report.reference_lines, 3);
}

#[test]
fn test_missing_line_names_every_file_it_came_from() {
    let fixture = TestFixture::new();
    fixture.write_lines("left/a.txt", &["shared-miss"]);
    fixture.write_lines("left/b.txt", &["shared-miss"]);
    fixture.write_lines("right/ref.txt", &["other"]);

    let report = comparator(LineSetOptions::default())
        .compare(&fixture.root().join("left"), &fixture.root().join("right"))
        .unwrap();

    let sources = report.missing_lines.get("shared-miss").unwrap();
    assert_eq!(sources.len(), 2);
}

#[test]
fn test_recursive_flag_controls_depth() {
    let fixture = TestFixture::new();
    fixture.write_lines("left/top.txt", &["x"]);
    fixture.write_lines("left/nested/deep.txt", &["y"]);
    fixture.write_lines("right/ref.txt", &["x", "y"]);

    let flat = comparator(LineSetOptions::default())
        .compare(&fixture.root().join("left"), &fixture.root().join("right"))
        .unwrap();
    assert_eq!(flat.files.len(), 1);

    let recursive = comparator(LineSetOptions {
        recursive: true,
        ..LineSetOptions::default()
    })
    .compare(&fixture.root().join("left"), &fixture.root().join("right"))
    .unwrap();
    assert_eq!(recursive.files.len(), 2);
}

#[test]
fn test_optimized_and_plain_modes_agree_on_folder_inputs() {
    let fixture = TestFixture::new();
    let left: Vec<String> = (0..300).map(|i| format!("L{:03}", i)).collect();
    let right: Vec<String> = (150..450).map(|i| format!("L{:03}", i)).collect();
    fixture.write_lines(
        "left/a.txt",
        &left.iter().map(String::as_str).collect::<Vec<_>>(),
    );
    fixture.write_lines(
        "right/b.txt",
        &right.iter().map(String::as_str).collect::<Vec<_>>(),
    );

    let plain = comparator(LineSetOptions::default())
        .compare(&fixture.root().join("left"), &fixture.root().join("right"))
        .unwrap();
    let optimized = comparator(LineSetOptions {
        optimize_threshold: 0,
        ..LineSetOptions::default()
    })
    .compare(&fixture.root().join("left"), &fixture.root().join("right"))
    .unwrap();

    assert_eq!(plain.files[0].matched, optimized.files[0].matched);
    assert_eq!(plain.files[0].missing, optimized.files[0].missing);
}
