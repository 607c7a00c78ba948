//! Literal substring patching.
//!
//! Hunks apply in order against the progressively updated content. A hunk
//! whose `old_text` matches more than once must name the occurrence; the
//! patcher never guesses.

use super::entities::PatchHunk;
use thiserror::Error;

/// Largest file content (in characters) a patch may produce.
pub const MAX_FILE_CHARS: usize = 350_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("patch_file requires an existing file: {path}")]
    FileMissing { path: String },

    #[error("hunk {hunk} in {path} has an empty oldText")]
    EmptyOldText { path: String, hunk: usize },

    #[error("oldText not found in {path} (hunk {hunk})")]
    NotFound { path: String, hunk: usize },

    #[error(
        "oldText is ambiguous in {path} (hunk {hunk}): {count} occurrences and no occurrence index"
    )]
    Ambiguous {
        path: String,
        hunk: usize,
        count: usize,
    },

    #[error("occurrence {occurrence} out of range in {path} (hunk {hunk}): {count} matches")]
    OccurrenceOutOfRange {
        path: String,
        hunk: usize,
        occurrence: usize,
        count: usize,
    },

    #[error("patched content for {path} is {chars} characters, limit is {MAX_FILE_CHARS}")]
    TooLarge { path: String, chars: usize },
}

/// Apply `hunks` to `content`, returning the patched text.
///
/// Hunk numbers in errors are 1-based.
pub fn apply_hunks(path: &str, content: &str, hunks: &[PatchHunk]) -> Result<String, PatchError> {
    let mut current = content.to_string();

    for (index, hunk) in hunks.iter().enumerate() {
        let hunk_no = index + 1;
        if hunk.old_text.is_empty() {
            return Err(PatchError::EmptyOldText {
                path: path.to_string(),
                hunk: hunk_no,
            });
        }

        let positions: Vec<usize> = current
            .match_indices(hunk.old_text.as_str())
            .map(|(pos, _)| pos)
            .collect();

        let start = match (positions.len(), hunk.occurrence) {
            (0, _) => {
                return Err(PatchError::NotFound {
                    path: path.to_string(),
                    hunk: hunk_no,
                });
            }
            (1, None) => positions[0],
            (count, None) => {
                return Err(PatchError::Ambiguous {
                    path: path.to_string(),
                    hunk: hunk_no,
                    count,
                });
            }
            (count, Some(occurrence)) => {
                if occurrence == 0 || occurrence > count {
                    return Err(PatchError::OccurrenceOutOfRange {
                        path: path.to_string(),
                        hunk: hunk_no,
                        occurrence,
                        count,
                    });
                }
                positions[occurrence - 1]
            }
        };

        current.replace_range(start..start + hunk.old_text.len(), &hunk.new_text);
    }

    let chars = current.chars().count();
    if chars > MAX_FILE_CHARS {
        return Err(PatchError::TooLarge {
            path: path.to_string(),
            chars,
        });
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_hunk_replacement() {
        let out = apply_hunks(
            "src/app.rs",
            "fn main() {\n    run();\n}\n",
            &[PatchHunk::new("run();", "run_with_health();")],
        )
        .unwrap();
        assert_eq!(out, "fn main() {\n    run_with_health();\n}\n");
    }

    #[test]
    fn test_reapplying_unique_hunk_fails_with_not_found() {
        let hunk = PatchHunk::new("let port = 80;", "let port = 8080;");
        let first = apply_hunks("cfg.rs", "let port = 80;\n", std::slice::from_ref(&hunk)).unwrap();

        let err = apply_hunks("cfg.rs", &first, &[hunk]).unwrap_err();
        assert!(matches!(err, PatchError::NotFound { hunk: 1, .. }));
        assert!(err.to_string().contains("oldText not found"));
    }

    #[test]
    fn test_ambiguous_match_without_occurrence_is_rejected() {
        let err = apply_hunks("a.txt", "x\nx\n", &[PatchHunk::new("x", "y")]).unwrap_err();
        assert_eq!(
            err,
            PatchError::Ambiguous {
                path: "a.txt".into(),
                hunk: 1,
                count: 2
            }
        );
    }

    #[test]
    fn test_explicit_occurrence_selects_match() {
        let out = apply_hunks(
            "a.txt",
            "x-x-x",
            &[PatchHunk::new("x", "Y").at_occurrence(2)],
        )
        .unwrap();
        assert_eq!(out, "x-Y-x");
    }

    #[test]
    fn test_occurrence_out_of_range() {
        let err = apply_hunks("a.txt", "x-x", &[PatchHunk::new("x", "Y").at_occurrence(3)])
            .unwrap_err();
        assert!(matches!(
            err,
            PatchError::OccurrenceOutOfRange {
                occurrence: 3,
                count: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_hunks_apply_against_progressive_content() {
        // The second hunk only matches text introduced by the first.
        let out = apply_hunks(
            "a.txt",
            "alpha",
            &[PatchHunk::new("alpha", "beta"), PatchHunk::new("beta", "gamma")],
        )
        .unwrap();
        assert_eq!(out, "gamma");
    }

    #[test]
    fn test_empty_old_text_is_rejected() {
        let err = apply_hunks("a.txt", "abc", &[PatchHunk::new("", "z")]).unwrap_err();
        assert!(matches!(err, PatchError::EmptyOldText { hunk: 1, .. }));
    }

    #[test]
    fn test_oversized_result_is_rejected() {
        let big = "y".repeat(MAX_FILE_CHARS + 1);
        let err = apply_hunks("big.txt", "x", &[PatchHunk::new("x", big)]).unwrap_err();
        assert!(matches!(err, PatchError::TooLarge { .. }));
    }
}
