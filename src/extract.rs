//! Final-answer recovery from agent console transcripts.
//!
//! Three heuristics are tried in order of decreasing precision:
//!
//! 1. [`marker_section`]: everything after the `FINAL RESULT:` marker.
//! 2. [`labeled_section`]: lines following a `Final Answer` label, up to the
//!    first line of framework status chrome.
//! 3. [`last_substantial_block`]: the last run of long lines not broken by
//!    box-drawing UI.
//!
//! [`extract_final_result`] never fails; when nothing matches it returns a
//! fixed pointer to the console output. ANSI styling is removed separately by
//! [`ExtractedResult::display_text`].

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const MARKER: &str = "FINAL RESULT:";

pub const FALLBACK_MESSAGE: &str =
    "Research completed successfully. Please check the console output for detailed results.";

const ANSWER_LABELS: &[&str] = &["## Final Answer", "Final Answer:"];
const INLINE_LABEL: &str = "Final Answer:";

/// Lowercased phrases that mean the answer is over and status output has begun.
const SECTION_END: &[&str] = &[
    "crew execution completed",
    "task completion",
    "crew completion",
    "└──",
    "assigned to:",
    "status:",
    "used",
];

const UI_CHROME: &[&str] = &[
    "╭",
    "│",
    "╰",
    "🚀",
    "📋",
    "└──",
    "Assigned to:",
    "Status:",
];

const MIN_LABELED_CHARS: usize = 10;
const MIN_BLOCK_CHARS: usize = 30;

static DECORATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[╭│╰═─└├┤┬┴┼╔╗╚╝║╠╣╦╩╬▓▒░]").expect("static regex"));

static DECORATION_AND_EMOJI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[╭│╰═─└├┤┬┴┼╔╗╚╝║╠╣╦╩╬▓▒░🚀📋🔧✅]").expect("static regex")
});

static ANSI_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[\d;]*m").expect("static regex"));

/// Which heuristic produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Marker,
    LabeledSection,
    LastBlock,
    Fallback,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Marker => write!(f, "marker"),
            Self::LabeledSection => write!(f, "labeled section"),
            Self::LastBlock => write!(f, "last block"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedResult {
    pub text: String,
    pub strategy: Strategy,
}

impl ExtractedResult {
    fn fallback() -> Self {
        Self {
            text: FALLBACK_MESSAGE.into(),
            strategy: Strategy::Fallback,
        }
    }

    /// The text with ANSI styling removed, ready to show or save.
    ///
    /// If stripping leaves nothing, the fallback message is returned instead.
    pub fn display_text(&self) -> String {
        let cleaned = strip_ansi(&self.text);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            FALLBACK_MESSAGE.into()
        } else {
            cleaned.to_string()
        }
    }
}

/// Run the heuristic cascade over a full transcript.
pub fn extract_final_result(transcript: &str) -> ExtractedResult {
    let found = marker_section(transcript)
        .map(|text| (text, Strategy::Marker))
        .or_else(|| labeled_section(transcript).map(|text| (text, Strategy::LabeledSection)))
        .or_else(|| last_substantial_block(transcript).map(|text| (text, Strategy::LastBlock)));

    match found {
        Some((text, strategy)) => {
            tracing::debug!(%strategy, chars = text.len(), "final result extracted");
            ExtractedResult { text, strategy }
        }
        None => {
            tracing::debug!("no extraction heuristic matched");
            ExtractedResult::fallback()
        }
    }
}

/// Remove ANSI color/style escape sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_STYLE.replace_all(text, "").into_owned()
}

/// Everything after the first `FINAL RESULT:` marker, decorations removed.
///
/// Text trailing the marker on its own line becomes the first result line.
pub fn marker_section(transcript: &str) -> Option<String> {
    let lines: Vec<&str> = transcript.lines().collect();
    let start = lines.iter().position(|line| line.contains(MARKER))?;

    let mut result = Vec::new();
    for line in &lines[start..] {
        if let Some((_, after)) = line.split_once(MARKER) {
            let after = after.trim();
            if !after.is_empty() {
                result.push(after.to_string());
            }
            continue;
        }
        let cleaned = DECORATION.replace_all(line, "");
        let cleaned = cleaned.trim();
        if !cleaned.is_empty() {
            result.push(cleaned.to_string());
        }
    }

    non_empty(result.join("\n"))
}

/// Lines after a `## Final Answer` / `Final Answer:` label, until status chrome.
pub fn labeled_section(transcript: &str) -> Option<String> {
    let mut result = Vec::new();
    let mut capturing = false;

    for line in transcript.lines() {
        if ANSWER_LABELS.iter().any(|label| line.contains(label)) {
            capturing = true;
            if let Some((_, after)) = line.split_once(INLINE_LABEL) {
                if let Some(kept) = clean_labeled_line(after) {
                    result.push(kept);
                }
            }
            continue;
        }

        if !capturing {
            continue;
        }

        let lower = line.to_lowercase();
        if SECTION_END.iter().any(|phrase| lower.contains(phrase)) {
            break;
        }

        if let Some(kept) = clean_labeled_line(line) {
            result.push(kept);
        }
    }

    non_empty(result.join("\n"))
}

fn clean_labeled_line(line: &str) -> Option<String> {
    let cleaned = DECORATION_AND_EMOJI.replace_all(line, "");
    let cleaned = cleaned.trim();
    (cleaned.chars().count() > MIN_LABELED_CHARS).then(|| cleaned.to_string())
}

/// The last contiguous run of long lines, where UI chrome or a short/blank
/// line ends a run.
pub fn last_substantial_block(transcript: &str) -> Option<String> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in transcript.lines() {
        let is_chrome = UI_CHROME.iter().any(|marker| line.contains(marker));
        let trimmed = line.trim();
        if !is_chrome && trimmed.chars().count() > MIN_BLOCK_CHARS {
            current.push(trimmed);
        } else if !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    blocks.pop().and_then(|block| non_empty(block.join("\n")))
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_returns_following_lines() {
        let transcript = "noise\nFINAL RESULT:\nline one\n\nline two\nline three\n";
        assert_eq!(
            marker_section(transcript).unwrap(),
            "line one\nline two\nline three"
        );
    }

    #[test]
    fn marker_keeps_trailing_content_on_marker_line() {
        let transcript = "FINAL RESULT: Plants make sugar\nfrom light";
        assert_eq!(
            marker_section(transcript).unwrap(),
            "Plants make sugar\nfrom light"
        );
    }

    #[test]
    fn marker_strips_box_drawing() {
        let transcript = "FINAL RESULT:\n╭────╮\n│ Chlorophyll absorbs light │\n╰────╯\n";
        // ╮ and ╯ are not in the decoration set and survive.
        assert_eq!(
            marker_section(transcript).unwrap(),
            "╮\nChlorophyll absorbs light\n╯"
        );
    }

    #[test]
    fn marker_with_nothing_after_yields_none() {
        assert!(marker_section("FINAL RESULT:\n═══\n   \n").is_none());
        assert!(marker_section("no marker at all").is_none());
    }

    #[test]
    fn labeled_section_stops_at_end_phrase_case_insensitively() {
        let transcript = "\
## Final Answer
Photosynthesis converts light into chemical energy.
Chlorophyll captures photons in the thylakoids.
CREW EXECUTION COMPLETED
This line is after the end marker and is long.";
        assert_eq!(
            labeled_section(transcript).unwrap(),
            "Photosynthesis converts light into chemical energy.\n\
             Chlorophyll captures photons in the thylakoids."
        );
    }

    #[test]
    fn labeled_section_drops_short_lines() {
        let transcript = "Final Answer:\nshort\n🚀 tiny ✅\nA sufficiently long line of text\n";
        assert_eq!(
            labeled_section(transcript).unwrap(),
            "A sufficiently long line of text"
        );
    }

    #[test]
    fn labeled_section_keeps_inline_answer() {
        let transcript = "Agent Final Answer: The Calvin cycle fixes carbon\nStatus: done";
        assert_eq!(
            labeled_section(transcript).unwrap(),
            "The Calvin cycle fixes carbon"
        );
    }

    #[test]
    fn labeled_section_word_used_ends_capture() {
        let transcript = "Final Answer:\nFirst long answer line here\nTools used: search\nmore text after it";
        assert_eq!(
            labeled_section(transcript).unwrap(),
            "First long answer line here"
        );
    }

    #[test]
    fn last_block_picks_final_run() {
        let transcript = "\
This is the first substantial line of the transcript
and another substantial line belonging to block one

This second block is what the extractor should return
because it is the last run of long lines in the text
ok";
        assert_eq!(
            last_substantial_block(transcript).unwrap(),
            "This second block is what the extractor should return\n\
             because it is the last run of long lines in the text"
        );
    }

    #[test]
    fn last_block_broken_by_chrome() {
        let transcript = "\
A long line that starts a block of real content here
│ boxed line that is also rather long but is chrome │
A long line after the chrome starts a new block ok";
        assert_eq!(
            last_substantial_block(transcript).unwrap(),
            "A long line after the chrome starts a new block ok"
        );
    }

    #[test]
    fn cascade_prefers_marker_over_label() {
        let transcript = "Final Answer: Something long enough to keep\nFINAL RESULT:\nthe marker wins";
        let result = extract_final_result(transcript);
        assert_eq!(result.strategy, Strategy::Marker);
        assert_eq!(result.text, "the marker wins");
    }

    #[test]
    fn empty_transcript_falls_back() {
        let result = extract_final_result("");
        assert_eq!(result.strategy, Strategy::Fallback);
        assert_eq!(result.text, FALLBACK_MESSAGE);
    }

    #[test]
    fn decorative_only_transcript_falls_back() {
        let result = extract_final_result("╭──────╮\n│      │\n╰──────╯\n═══");
        assert_eq!(result.strategy, Strategy::Fallback);
    }

    #[test]
    fn strip_ansi_removes_style_codes() {
        assert_eq!(strip_ansi("\x1b[1;32mgreen\x1b[0m text"), "green text");
    }

    #[test]
    fn display_text_never_empty() {
        let result = ExtractedResult {
            text: "\x1b[0m".into(),
            strategy: Strategy::Marker,
        };
        assert_eq!(result.display_text(), FALLBACK_MESSAGE);
    }
}
