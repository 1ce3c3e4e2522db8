//! External sort-merge comparison against an in-memory reference

use crate::common::TestFixture;
use std::collections::HashSet;
use tabmerge::cancel::CancellationToken;
use tabmerge::extsort::{ExternalSortComparator, ExternalSortOptions};

fn comparator(chunk_lines: usize, sample_limit: usize) -> ExternalSortComparator {
    ExternalSortComparator::new(
        ExternalSortOptions {
            chunk_lines,
            sample_limit,
        },
        CancellationToken::new(),
    )
}

#[test]
fn test_counts_match_set_reference_across_chunk_sizes() {
    let fixture = TestFixture::new();
    // Deterministically shuffled unique lines per side.
    let left: Vec<String> = (0..500).map(|i| format!("k-{:05}", (i * 7919) % 100_000)).collect();
    let right: Vec<String> = (250..750).map(|i| format!("k-{:05}", (i * 7919) % 100_000)).collect();
    let left_path = fixture.write_lines(
        "left.txt",
        &left.iter().map(String::as_str).collect::<Vec<_>>(),
    );
    let right_path = fixture.write_lines(
        "right.txt",
        &right.iter().map(String::as_str).collect::<Vec<_>>(),
    );

    let left_set: HashSet<_> = left.iter().collect();
    let right_set: HashSet<_> = right.iter().collect();
    let expected_common = left_set.intersection(&right_set).count() as u64;

    for chunk_lines in [7, 64, 10_000] {
        let result = comparator(chunk_lines, 100)
            .compare(&left_path, &right_path)
            .unwrap();
        assert_eq!(result.common, expected_common, "chunk_lines={}", chunk_lines);
        assert_eq!(
            result.only_left,
            left_set.difference(&right_set).count() as u64
        );
        assert_eq!(
            result.only_right,
            right_set.difference(&left_set).count() as u64
        );
    }
}

#[test]
fn test_samples_come_from_the_right_category() {
    let fixture = TestFixture::new();
    let left_path = fixture.write_lines("left.txt", &["both", "left-only"]);
    let right_path = fixture.write_lines("right.txt", &["both", "right-only"]);

    let result = comparator(4, 10).compare(&left_path, &right_path).unwrap();
    assert_eq!(result.common_samples, vec!["both".to_string()]);
    assert_eq!(result.only_left_samples, vec!["left-only".to_string()]);
    assert_eq!(result.only_right_samples, vec!["right-only".to_string()]);
}

#[test]
fn test_identical_files_have_no_exclusive_lines() {
    let fixture = TestFixture::new();
    let lines: Vec<String> = (0..100).map(|i| format!("row-{}", i)).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    let a = fixture.write_lines("a.txt", &refs);
    let b = fixture.write_lines("b.txt", &refs);

    let result = comparator(16, 10).compare(&a, &b).unwrap();
    assert_eq!(result.common, 100);
    assert_eq!(result.only_left, 0);
    assert_eq!(result.only_right, 0);
}
