//! Block extraction from LaTeX sources.
//!
//! A full document is split into one block per display environment and per
//! `\[ ... \]` span, in document order. Macro definitions from the preamble
//! are prepended to every block so each one renders on its own. Bare
//! expressions become a single `math` block.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::source::SourceDocument;

/// `\begin{env}` for the display environments rendered as separate blocks.
static ENVIRONMENT_BEGIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\\begin\{(equation|align|gather|multline|eqnarray|displaymath|flalign|alignat)(\*?)\}",
    )
    .unwrap()
});

/// Start of a macro or operator definition.
static DEFINITION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:newcommand|renewcommand|providecommand|DeclareMathOperator)\b\*?|\\def\b")
        .unwrap()
});

const BEGIN_DOCUMENT: &str = r"\begin{document}";

/// One independently rendered unit of LaTeX.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionBlock {
    /// Environment name, `display`, `math`, or `document`.
    pub label: String,
    /// Source sent to the renderer.
    pub content: String,
}

impl ExtractionBlock {
    fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Located block before preamble injection.
#[derive(Debug)]
struct Span {
    start: usize,
    end: usize,
    block: ExtractionBlock,
}

/// Split a source into render blocks.
///
/// Raw math yields exactly one `math` block with the trimmed source. A
/// structured document yields its display environments and `\[ \]` spans in
/// document order, each prefixed with the preamble definitions; when it has
/// none, the whole document becomes a single `document` block.
#[must_use]
pub fn extract_blocks(source: &SourceDocument) -> Vec<ExtractionBlock> {
    let text = source.text();
    if !source.is_structured() {
        return vec![ExtractionBlock::new("math", text.trim())];
    }

    let mut spans = environments(text);
    let display = display_spans(text, &spans);
    spans.extend(display);
    spans.sort_by_key(|s| s.start);

    if spans.is_empty() {
        debug!("No display math found, rendering whole document");
        return vec![ExtractionBlock::new("document", text)];
    }

    let preamble = preamble_definitions(text);
    spans
        .into_iter()
        .map(|span| {
            let ExtractionBlock { label, content } = span.block;
            if preamble.is_empty() {
                ExtractionBlock { label, content }
            } else {
                ExtractionBlock {
                    label,
                    content: format!("{preamble}\n{content}"),
                }
            }
        })
        .collect()
}

/// Find named display environments with their matching `\end`.
fn environments(text: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(caps) = ENVIRONMENT_BEGIN.captures_at(text, cursor) {
        let Some(begin) = caps.get(0) else { break };
        if is_commented(text, begin.start()) {
            cursor = begin.end();
            continue;
        }
        let name = format!("{}{}", &caps[1], &caps[2]);
        let end_tag = format!("\\end{{{name}}}");

        if let Some(rel) = text[begin.end()..].find(&end_tag) {
            let end = begin.end() + rel + end_tag.len();
            spans.push(Span {
                start: begin.start(),
                end,
                block: ExtractionBlock::new(name, &text[begin.start()..end]),
            });
            cursor = end;
        } else {
            warn!(environment = %name, "Unterminated environment, skipping");
            cursor = begin.end();
        }
    }

    spans
}

/// Find `\[ ... \]` spans outside the given environment spans.
fn display_spans(text: &str, environments: &[Span]) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_unescaped(text, cursor, r"\[") {
        if let Some(env) = environments
            .iter()
            .find(|e| e.start <= start && start < e.end)
        {
            cursor = env.end;
            continue;
        }
        if is_commented(text, start) {
            cursor = start + 2;
            continue;
        }

        let inner_start = start + 2;
        let Some(close) = find_unescaped(text, inner_start, r"\]") else {
            warn!(offset = start, "Unterminated \\[ span, skipping");
            break;
        };
        let end = close + 2;
        spans.push(Span {
            start,
            end,
            block: ExtractionBlock::new("display", text[inner_start..close].trim()),
        });
        cursor = end;
    }

    spans
}

/// Concatenate macro and operator definitions found before the document body.
fn preamble_definitions(text: &str) -> String {
    let preamble = text.find(BEGIN_DOCUMENT).map_or(text, |i| &text[..i]);
    let mut definitions = Vec::new();
    let mut cursor = 0;

    while let Some(m) = DEFINITION_START.find_at(preamble, cursor) {
        if is_commented(preamble, m.start()) {
            cursor = m.end();
            continue;
        }
        if let Some(end) = definition_end(preamble, m.end()) {
            definitions.push(&preamble[m.start()..end]);
            cursor = end;
        } else {
            debug!(offset = m.start(), "Unparseable definition, skipping");
            cursor = m.end();
        }
    }

    definitions.join("\n")
}

/// End of a definition whose command word ends at `from`.
///
/// Accepts a name (`{\foo}` or `\foo`), then optional `[n]`, `[default]` or
/// `#n` parameter markers, then a balanced `{...}` body.
fn definition_end(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = skip_whitespace(bytes, from);

    match bytes.get(i)? {
        b'{' => i = group_end(bytes, i)?,
        b'\\' => {
            i += 1;
            let letters = bytes[i..]
                .iter()
                .take_while(|b| b.is_ascii_alphabetic())
                .count();
            i += letters.max(1);
        }
        _ => return None,
    }

    loop {
        i = skip_whitespace(bytes, i);
        match bytes.get(i)? {
            b'[' => i += bytes[i..].iter().position(|&b| b == b']')? + 1,
            b'#' => i += 2,
            b'{' => return group_end(bytes, i),
            _ => return None,
        }
    }
}

/// Index just past the brace that closes the group opened at `open`.
fn group_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;

    for (offset, &b) in bytes[open..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' => escaped = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn skip_whitespace(bytes: &[u8], from: usize) -> usize {
    from + bytes
        .get(from..)
        .unwrap_or_default()
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count()
}

/// Whether the character at `pos` is preceded by an odd run of backslashes.
fn is_escaped(text: &str, pos: usize) -> bool {
    text.as_bytes()[..pos]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count()
        % 2
        == 1
}

/// First occurrence of `needle` at or after `from` that is not escaped,
/// so `\\[2pt]` line breaks are not mistaken for display math.
fn find_unescaped(text: &str, from: usize, needle: &str) -> Option<usize> {
    let mut cursor = from;
    while let Some(rel) = text[cursor..].find(needle) {
        let pos = cursor + rel;
        if !is_escaped(text, pos) {
            return Some(pos);
        }
        cursor = pos + needle.len();
    }
    None
}

/// Whether `pos` sits after an unescaped `%` on its line.
fn is_commented(text: &str, pos: usize) -> bool {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    text[line_start..pos]
        .match_indices('%')
        .any(|(i, _)| !is_escaped(text, line_start + i))
}
