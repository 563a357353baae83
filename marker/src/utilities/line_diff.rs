//! Line diffs in the `difflib.Differ` layout: one entry per line, prefixed
//! with `"  "` (in both), `"- "` (expected only) or `"+ "` (actual only).
//! Lines keep their terminators so joining the entries reproduces both
//! inputs.

use std::time::Duration;

use similar::{Algorithm, ChangeTag, TextDiff};

const COMMON: &str = "  ";
const EXPECTED_ONLY: &str = "- ";
const ACTUAL_ONLY: &str = "+ ";

/// Past this the diff settles for a coarser, still complete, answer.
const DIFF_TIMEOUT: Duration = Duration::from_secs(2);

pub fn line_diff(expected: &str, actual: &str) -> Vec<String> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_TIMEOUT)
        .diff_lines(expected, actual);

    // Within a replaced block deletions come before insertions.
    diff.iter_all_changes()
        .map(|change| {
            let tag = match change.tag() {
                ChangeTag::Equal => COMMON,
                ChangeTag::Delete => EXPECTED_ONLY,
                ChangeTag::Insert => ACTUAL_ONLY,
            };
            format!("{tag}{}", change.value())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_is_all_common() {
        assert_eq!(line_diff("a\nb\n", "a\nb\n"), ["  a\n", "  b\n"]);
        assert!(line_diff("", "").is_empty());
    }

    #[test]
    fn changed_line_is_removed_then_added() {
        assert_eq!(
            line_diff("one\ntwo\nthree\n", "one\n2\nthree\n"),
            ["  one\n", "- two\n", "+ 2\n", "  three\n"]
        );
    }

    #[test]
    fn missing_terminator_counts_as_a_difference() {
        assert_eq!(line_diff("42\n", "42"), ["- 42\n", "+ 42"]);
    }

    #[test]
    fn extra_and_missing_lines() {
        assert_eq!(line_diff("", "x\n"), ["+ x\n"]);
        assert_eq!(
            line_diff("a\nb\nc\n", "a\nc\nd\n"),
            ["  a\n", "- b\n", "  c\n", "+ d\n"]
        );
    }

    #[test]
    fn large_outputs_that_differ_everywhere() {
        let lines = 150_000;
        let diff = line_diff(&"a\n".repeat(lines), &"b\n".repeat(lines));

        assert_eq!(diff.len(), 2 * lines);
        assert_eq!(diff.iter().filter(|l| *l == "- a\n").count(), lines);
        assert_eq!(diff.iter().filter(|l| *l == "+ b\n").count(), lines);
    }

    #[test]
    fn large_outputs_with_one_changed_line() {
        let expected: String = (0..100_000).map(|i| format!("{i}\n")).collect();
        let actual = expected.replacen("50000\n", "fifty thousand\n", 1);
        let diff = line_diff(&expected, &actual);

        assert_eq!(diff.len(), 100_001);
        assert_eq!(
            diff.iter().filter(|l| !l.starts_with(COMMON)).collect::<Vec<_>>(),
            ["- 50000\n", "+ fifty thousand\n"]
        );
    }
}
