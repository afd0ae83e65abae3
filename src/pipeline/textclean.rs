//! Text clean-up: deterministic fixes to OCR output before it is spoken.
//!
//! OCR text arrives with the artefacts of the printed page: words hyphenated
//! across line ends, hard line breaks in the middle of sentences, ligature
//! and zero-width characters, and (from vision LLMs) stray Markdown syntax
//! and code fences. A TTS engine reads all of that literally, so every
//! segment passes through these rules first.
//!
//! Every rule is a pure `&str → String` function. Applying a rule to its own
//! output changes nothing, so re-cleaning a transcript is safe.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a whole-page OCR reply, keeping its paragraph structure.
///
/// Paragraphs stay separated by exactly one blank line; use
/// [`split_paragraphs`] to break the result apart.
pub fn clean_ocr_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fences(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

/// Join one paragraph's lines into a single line of running text.
///
/// Table rows (lines starting with `|`) keep their line breaks.
pub fn normalize_paragraph(input: &str) -> String {
    if input.lines().any(is_table_row) {
        return input
            .lines()
            .map(|l| collapse_spaces(l.trim()))
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
    }
    let s = dehyphenate(input);
    let s = unwrap_lines(&s);
    collapse_spaces(&s).trim().to_string()
}

/// Split cleaned text into paragraphs at blank lines.
pub fn split_paragraphs(input: &str) -> Vec<String> {
    RE_PARAGRAPH_BREAK
        .split(input)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Code fences ─────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*?)\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Whitespace and line structure ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").into_owned()
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// A lower-case letter after the break marks a word split by the typesetter;
// "Smith-\nJones" stays hyphenated.
static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").unwrap());

/// Re-join words hyphenated across a line break: `exam-\nple` → `example`.
pub fn dehyphenate(input: &str) -> String {
    RE_HYPHEN_BREAK.replace_all(input, "$1$2").into_owned()
}

static RE_SOFT_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\n[ \t]*").unwrap());

/// Replace single line breaks with spaces.
pub fn unwrap_lines(input: &str) -> String {
    RE_SOFT_BREAK.replace_all(input, " ").into_owned()
}

static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}\u{2009}]+").unwrap());

/// Collapse runs of spaces, tabs and non-breaking spaces into one space.
pub fn collapse_spaces(input: &str) -> String {
    RE_SPACES.replace_all(input, " ").into_owned()
}

// ── Markdown that must not be spoken ────────────────────────────────────────

static RE_HEADING_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s+").unwrap());
static RE_BULLET_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-*+•▪◦]\s+").unwrap());
static RE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"!?\[([^\]]*)\]\([^)]*\)").unwrap());
static RE_STRONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\*\*|__)([^*_\n]+?)(\*\*|__)").unwrap());
static RE_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*\s][^*\n]*?)\*").unwrap());
static RE_INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]*)`").unwrap());

/// Strip a leading Markdown heading marker (`## `), if any.
pub fn strip_heading_marker(line: &str) -> Option<&str> {
    RE_HEADING_MARKER
        .find(line)
        .map(|m| line[m.end()..].trim())
}

/// Strip a leading bullet (`- `, `* `, `• `), if any.
pub fn strip_bullet_marker(line: &str) -> Option<&str> {
    RE_BULLET_MARKER
        .find(line)
        .map(|m| line[m.end()..].trim())
}

/// Whether a line is a `| cell | cell |` table row.
pub fn is_table_row(line: &str) -> bool {
    let t = line.trim();
    t.len() > 2 && t.starts_with('|') && t.ends_with('|')
}

fn is_separator_row(line: &str) -> bool {
    is_table_row(line)
        && line
            .trim()
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | ' '))
}

/// Render text the way it should be read aloud.
///
/// Heading and bullet markers, emphasis, inline code ticks and link targets
/// are removed. Table rows become comma-separated cells ending in a full
/// stop; separator rows disappear.
pub fn speakable(input: &str) -> String {
    let lines: Vec<String> = input
        .lines()
        .filter(|l| !is_separator_row(l))
        .map(|line| {
            let line = line.trim();
            if is_table_row(line) {
                let cells: Vec<&str> = line
                    .trim_matches('|')
                    .split('|')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .collect();
                return if cells.is_empty() {
                    String::new()
                } else {
                    format!("{}.", cells.join(", "))
                };
            }
            let line = strip_heading_marker(line).unwrap_or(line);
            let line = strip_bullet_marker(line).unwrap_or(line);
            line.to_string()
        })
        .filter(|l| !l.is_empty())
        .collect();

    let s = lines.join(" ");
    let s = RE_LINK.replace_all(&s, "$1");
    let s = RE_STRONG.replace_all(&s, "$2");
    let s = RE_EMPHASIS.replace_all(&s, "$1");
    let s = RE_INLINE_CODE.replace_all(&s, "$1");
    collapse_spaces(&s).trim().to_string()
}
