//! Recursive include inlining.
//!
//! Starting from the entry file, every `\input{...}` / `\include{...}` whose
//! target is in the bundle is replaced by that file's own assembled text,
//! depth-first and in source order. Directives that cannot or must not be
//! expanded (missing target, cycle, depth limit, output size limit) stay in
//! the output verbatim.

use std::collections::HashSet;

use tracing::{debug, info, instrument};

use arxivflat_shared::{ArxivFlatError, AssemblyConfig, Result, SourceBundle, normalize_relative};

use crate::directive::scan_line;

/// Output of one assembly pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    /// The merged document.
    pub text: String,
    /// Entry file the pass started from.
    pub entry: String,
    /// Every inlined file, once per occurrence, in pre-order.
    pub inlined: Vec<String>,
    /// Directive targets not present in the bundle.
    pub missing: Vec<String>,
    /// Files whose expansion was skipped because they were already being expanded.
    pub cycles: Vec<String>,
    /// Files left verbatim because the nesting limit was reached.
    pub depth_limited: Vec<String>,
    /// Files left verbatim because the output size limit was reached.
    pub size_limited: Vec<String>,
}

/// Transient state for one assembly request.
struct AssemblyContext<'a> {
    bundle: &'a SourceBundle,
    config: &'a AssemblyConfig,
    /// Directory of the entry file; LaTeX resolves inputs against it.
    entry_dir: String,
    /// Paths on the active recursion path.
    active: HashSet<String>,
    out: Assembly,
}

/// Merge `entry` and its transitive includes into one text.
#[instrument(skip_all, fields(entry = %entry, files = bundle.len()))]
pub fn assemble(bundle: &SourceBundle, entry: &str, config: &AssemblyConfig) -> Result<Assembly> {
    if !bundle.contains(entry) {
        return Err(ArxivFlatError::NoEntryFound(format!(
            "entry file '{entry}' is not in the bundle"
        )));
    }

    let mut ctx = AssemblyContext {
        bundle,
        config,
        entry_dir: parent_dir(entry).to_string(),
        active: HashSet::new(),
        out: Assembly {
            entry: entry.to_string(),
            ..Assembly::default()
        },
    };
    ctx.expand(entry, 0);

    let out = ctx.out;
    info!(
        bytes = out.text.len(),
        inlined = out.inlined.len(),
        missing = out.missing.len(),
        cycles = out.cycles.len(),
        depth_limited = out.depth_limited.len(),
        size_limited = out.size_limited.len(),
        "assembly complete"
    );
    Ok(out)
}

impl AssemblyContext<'_> {
    fn expand(&mut self, path: &str, depth: usize) {
        let bundle = self.bundle;
        let Some(text) = bundle.text(path) else {
            return;
        };

        self.active.insert(path.to_string());
        for line in text.split_inclusive('\n') {
            self.expand_line(path, line, depth);
        }
        self.active.remove(path);
    }

    fn expand_line(&mut self, from: &str, line: &str, depth: usize) {
        let directives = scan_line(line);
        if directives.is_empty() {
            self.out.text.push_str(line);
            return;
        }

        let mut cursor = 0;
        for directive in directives {
            self.out.text.push_str(&line[cursor..directive.span.start]);
            let raw = &line[directive.span.clone()];
            cursor = directive.span.end;

            let Some(target) = self.resolve(from, directive.target) else {
                debug!(from, target = directive.target, "include target not in bundle");
                self.out.missing.push(directive.target.to_string());
                self.out.text.push_str(raw);
                continue;
            };

            if self.active.contains(&target) {
                debug!(from, target = %target, "include cycle, leaving directive");
                self.out.cycles.push(target);
                self.out.text.push_str(raw);
                continue;
            }

            if self.out.text.len() >= self.config.max_output_bytes {
                debug!(from, target = %target, bytes = self.out.text.len(), "output size limit reached");
                self.out.size_limited.push(target);
                self.out.text.push_str(raw);
                continue;
            }

            if depth >= self.config.max_depth {
                debug!(from, target = %target, depth, "include depth limit reached");
                self.out.depth_limited.push(target);
                self.out.text.push_str(raw);
                continue;
            }

            debug!(from, target = %target, depth = depth + 1, "inlining");
            self.out.inlined.push(target.clone());
            let before = self.out.text.len();
            self.expand(&target, depth + 1);
            self.drop_trailing_newline(before);
        }
        self.out.text.push_str(&line[cursor..]);
    }

    /// Remove one line ending appended after `since`, so the line ending that
    /// followed the directive is not doubled.
    fn drop_trailing_newline(&mut self, since: usize) {
        let text = &mut self.out.text;
        if text.len() > since && text.ends_with('\n') {
            text.pop();
            if text.len() > since && text.ends_with('\r') {
                text.pop();
            }
        }
    }

    /// Map a directive target to a bundle path, or `None` if it is missing.
    fn resolve(&self, from: &str, target: &str) -> Option<String> {
        if target.starts_with('/') {
            return None;
        }

        let from_dir = parent_dir(from);
        let mut bases = vec![self.entry_dir.as_str()];
        if from_dir != self.entry_dir {
            bases.push(from_dir);
        }

        for base in bases {
            for name in candidate_names(target) {
                let joined = if base.is_empty() {
                    name
                } else {
                    format!("{base}/{name}")
                };
                if let Some(path) = normalize_relative(&joined) {
                    if self.bundle.contains(&path) {
                        return Some(path);
                    }
                }
            }
        }
        None
    }
}

/// File names to try for a target, most likely first.
fn candidate_names(target: &str) -> [String; 2] {
    let with_tex = format!("{target}.tex");
    if has_extension(target) {
        [target.to_string(), with_tex]
    } else {
        [with_tex, target.to_string()]
    }
}

fn has_extension(target: &str) -> bool {
    let name = target.rsplit('/').next().unwrap_or(target);
    name.rfind('.').is_some_and(|dot| dot > 0 && dot + 1 < name.len())
}

fn parent_dir(path: &str) -> &str {
    path.rfind('/').map_or("", |i| &path[..i])
}
