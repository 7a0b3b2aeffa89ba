//! LaTeX source handling for arxivflat.
//!
//! This crate provides:
//! - [`directive`]: line tokenizer for `\input` / `\include`
//! - [`entry`]: selection of the root `.tex` file of a bundle
//! - [`assemble`](mod@assemble): recursive, cycle-safe include inlining
//!
//! Everything here is pure text processing over a [`SourceBundle`]; no I/O.
//!
//! [`SourceBundle`]: arxivflat_shared::SourceBundle

pub mod assemble;
pub mod directive;
pub mod entry;

pub use assemble::{Assembly, assemble};
pub use directive::{IncludeCommand, IncludeDirective, code_portion, scan_line};
pub use entry::{has_document_start, resolve_entry};

#[cfg(test)]
mod tests {
    use super::*;
    use arxivflat_shared::{AssemblyConfig, SourceBundle};

    #[test]
    fn entry_then_assembly() {
        let mut bundle = SourceBundle::new();
        bundle
            .insert(
                "ms.tex",
                "\\documentclass{article}\n\\begin{document}\n\\input{sec/intro}\n\\end{document}\n",
            )
            .unwrap();
        bundle.insert("sec/intro.tex", "\\section{Intro}\nHello.\n").unwrap();
        bundle.insert("sec/unused.tex", "never included").unwrap();

        let entry = resolve_entry(&bundle).unwrap();
        assert_eq!(entry, "ms.tex");

        let out = assemble(&bundle, &entry, &AssemblyConfig::default()).unwrap();
        assert_eq!(
            out.text,
            "\\documentclass{article}\n\\begin{document}\n\\section{Intro}\nHello.\n\\end{document}\n"
        );
        assert!(!out.text.contains("never included"));
    }
}
