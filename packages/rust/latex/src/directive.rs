//! Line tokenizer for `\input{...}` and `\include{...}` directives.
//!
//! Recognized grammar, per line:
//!
//! ```text
//! directive := "\" ("input" | "include") [ \t]* "{" target "}"
//! ```
//!
//! The control word must end where the letters end, so `\includegraphics`
//! and `\inputencoding` never match. An unescaped `%` starts a comment and
//! ends the scan. Control symbols (`\%`, `\\`, `\{`) are skipped as a unit.
//! Only ASCII bytes are structural, so byte offsets are always valid `str`
//! boundaries.

use std::ops::Range;

/// Which include command introduced a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeCommand {
    Input,
    Include,
}

impl IncludeCommand {
    fn from_word(word: &str) -> Option<Self> {
        match word {
            "input" => Some(Self::Input),
            "include" => Some(Self::Include),
            _ => None,
        }
    }
}

/// One include directive found in a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective<'a> {
    pub command: IncludeCommand,
    /// Braced argument with surrounding whitespace trimmed.
    pub target: &'a str,
    /// Byte range of the whole directive, backslash through closing brace.
    pub span: Range<usize>,
}

/// Find every include directive in `line`, left to right.
pub fn scan_line(line: &str) -> Vec<IncludeDirective<'_>> {
    let bytes = line.as_bytes();
    let mut found = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => break,
            b'\\' => {
                let start = i;
                i += 1;
                let word_start = i;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                if i == word_start {
                    // control symbol
                    i += 1;
                    continue;
                }
                let Some(command) = IncludeCommand::from_word(&line[word_start..i]) else {
                    continue;
                };

                let mut j = i;
                while j < bytes.len() && matches!(bytes[j], b' ' | b'\t') {
                    j += 1;
                }
                if j >= bytes.len() || bytes[j] != b'{' {
                    continue;
                }
                let arg_start = j + 1;
                let Some(close) = line[arg_start..].find('}').map(|k| arg_start + k) else {
                    continue;
                };

                let target = line[arg_start..close].trim();
                i = close + 1;
                if target.is_empty() {
                    continue;
                }
                found.push(IncludeDirective {
                    command,
                    target,
                    span: start..close + 1,
                });
            }
            _ => i += 1,
        }
    }

    found
}

/// The part of `line` before an unescaped `%` comment marker.
pub fn code_portion(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => return &line[..i],
            b'\\' => i += 2,
            _ => i += 1,
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(line: &str) -> Vec<&str> {
        scan_line(line).into_iter().map(|d| d.target).collect()
    }

    #[test]
    fn finds_input_and_include() {
        let found = scan_line(r"\input{intro}");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].command, IncludeCommand::Input);
        assert_eq!(found[0].target, "intro");
        assert_eq!(found[0].span, 0..13);

        let found = scan_line(r"  \include {chapters/one.tex} ");
        assert_eq!(found[0].command, IncludeCommand::Include);
        assert_eq!(found[0].target, "chapters/one.tex");
        assert_eq!(&r"  \include {chapters/one.tex} "[found[0].span.clone()], r"\include {chapters/one.tex}");
    }

    #[test]
    fn multiple_directives_keep_order() {
        assert_eq!(targets(r"\input{a}\input{b} text \include{c}"), vec!["a", "b", "c"]);
    }

    #[test]
    fn prefix_commands_are_not_directives() {
        assert!(scan_line(r"\includegraphics{fig.png}").is_empty());
        assert!(scan_line(r"\includeonly{a,b}").is_empty());
        assert!(scan_line(r"\inputencoding{utf8}").is_empty());
        assert!(scan_line(r"\usepackage{input}").is_empty());
    }

    #[test]
    fn comments_end_the_scan() {
        assert!(scan_line(r"% \input{hidden}").is_empty());
        assert_eq!(targets(r"\input{shown} % \input{hidden}"), vec!["shown"]);
        assert_eq!(targets(r"50\% done \input{after}"), vec!["after"]);
    }

    #[test]
    fn control_symbols_are_skipped() {
        // `\\` is a line break, so `input` after it is plain text.
        assert!(scan_line(r"\\input{x}").is_empty());
        assert_eq!(targets(r"\\ \input{y}"), vec!["y"]);
    }

    #[test]
    fn malformed_arguments_are_ignored() {
        assert!(scan_line(r"\input intro").is_empty());
        assert!(scan_line(r"\input{unterminated").is_empty());
        assert!(scan_line(r"\input{  }").is_empty());
        assert!(scan_line(r"\input").is_empty());
    }

    #[test]
    fn handles_non_ascii_text() {
        assert_eq!(targets("Grüße \\input{kapitel} ü"), vec!["kapitel"]);
        assert!(scan_line("\\é").is_empty());
    }

    #[test]
    fn code_portion_strips_comments() {
        assert_eq!(code_portion(r"\begin{document} % start"), r"\begin{document} ");
        assert_eq!(code_portion(r"% \begin{document}"), "");
        assert_eq!(code_portion(r"100\% sure"), r"100\% sure");
    }
}
