//! Entry-file selection for an extracted bundle.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use arxivflat_shared::{ArxivFlatError, Result, SourceBundle};

use crate::directive::code_portion;

static BEGIN_DOCUMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\begin\s*\{document\}").expect("valid regex"));

/// Whether `text` contains `\begin{document}` outside a comment.
pub fn has_document_start(text: &str) -> bool {
    text.lines().any(|line| BEGIN_DOCUMENT.is_match(code_portion(line)))
}

/// Pick the root `.tex` file of `bundle`.
///
/// 1. A bundle with exactly one `.tex` file uses it.
/// 2. Otherwise only files with a `\begin{document}` are candidates.
/// 3. Among several candidates the shallowest path wins, then the
///    lexicographically smallest.
/// 4. No candidate is [`ArxivFlatError::NoEntryFound`].
pub fn resolve_entry(bundle: &SourceBundle) -> Result<String> {
    let tex_files = bundle.tex_files();

    match tex_files.as_slice() {
        [] => {
            return Err(ArxivFlatError::NoEntryFound(format!(
                "bundle of {} files contains no .tex file",
                bundle.len()
            )));
        }
        [only] => {
            info!(entry = %only, "single .tex file selected as entry");
            return Ok((*only).to_string());
        }
        _ => {}
    }

    let mut candidates: Vec<&str> = tex_files
        .into_iter()
        .filter(|path| {
            bundle
                .text(path)
                .is_some_and(|text| has_document_start(&text))
        })
        .collect();

    debug!(candidates = ?candidates, "entry candidates with \\begin{{document}}");

    candidates.sort_by(|a, b| depth(a).cmp(&depth(b)).then_with(|| a.cmp(b)));

    match candidates.first() {
        Some(entry) => {
            info!(entry = %entry, candidates = candidates.len(), "entry file selected");
            Ok((*entry).to_string())
        }
        None => Err(ArxivFlatError::NoEntryFound(
            "no .tex file contains \\begin{document}".into(),
        )),
    }
}

fn depth(path: &str) -> usize {
    path.matches('/').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(files: &[(&str, &str)]) -> SourceBundle {
        let mut b = SourceBundle::new();
        for (path, text) in files {
            b.insert(path, *text).unwrap();
        }
        b
    }

    #[test]
    fn single_tex_file_wins_without_marker() {
        let b = bundle(&[("paper.tex", "no marker here"), ("fig.png", "")]);
        assert_eq!(resolve_entry(&b).unwrap(), "paper.tex");
    }

    #[test]
    fn marker_selects_root_over_fragment() {
        let b = bundle(&[
            ("a_fragment.tex", "just a section"),
            ("z_main.tex", "\\documentclass{article}\n\\begin{document}\nhi\n\\end{document}"),
        ]);
        assert_eq!(resolve_entry(&b).unwrap(), "z_main.tex");
    }

    #[test]
    fn selection_ignores_insertion_order() {
        let files = [
            ("intro.tex", "intro"),
            ("root.tex", "\\begin{document}"),
        ];
        let forward = bundle(&files);
        let mut reversed_files = files;
        reversed_files.reverse();
        let reversed = bundle(&reversed_files);
        assert_eq!(resolve_entry(&forward).unwrap(), "root.tex");
        assert_eq!(resolve_entry(&reversed).unwrap(), "root.tex");
    }

    #[test]
    fn ties_break_on_depth_then_name() {
        let b = bundle(&[
            ("aaa/deep.tex", "\\begin{document}"),
            ("main.tex", "\\begin{document}"),
            ("beta.tex", "\\begin {document}"),
        ]);
        assert_eq!(resolve_entry(&b).unwrap(), "beta.tex");
    }

    #[test]
    fn commented_marker_does_not_count() {
        let b = bundle(&[
            ("a.tex", "% \\begin{document}"),
            ("b.tex", "\\begin{document}"),
        ]);
        assert_eq!(resolve_entry(&b).unwrap(), "b.tex");
    }

    #[test]
    fn no_candidate_is_an_error() {
        let b = bundle(&[("a.tex", "x"), ("b.tex", "y")]);
        let err = resolve_entry(&b).unwrap_err();
        assert!(matches!(err, ArxivFlatError::NoEntryFound(_)));

        let b = bundle(&[("readme.txt", "x")]);
        assert!(matches!(resolve_entry(&b).unwrap_err(), ArxivFlatError::NoEntryFound(_)));
    }
}
