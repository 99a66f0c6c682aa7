// Artifact detection in model output
//
// Two independent detectors. The fenced-block detector is structural and
// reliable. The keyword detector is a coarse guess that also fires on
// prose mentioning "class Foo" or "import this"; keep it separate.

use crate::artifacts::mime::{extension_for_language, mime_for_language};
use crate::artifacts::types::{ArtifactKind, CandidateArtifact, Detector};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum length (in characters) before the keyword detector looks at a text
const HEURISTIC_MIN_CHARS: usize = 100;

static FENCED_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(\w*)\n((?s:.*?))```").expect("valid fenced block regex"));

static CODE_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(function|import|export|const|let|var|def|class)\s+\w+")
        .expect("valid code keyword regex")
});

/// Extract candidates from `text`, naming them after the current time
pub fn extract(text: &str) -> Vec<CandidateArtifact> {
    extract_at(text, Utc::now())
}

/// Extract candidates from `text`; fenced blocks first, then the heuristic match
pub fn extract_at(text: &str, at: DateTime<Utc>) -> Vec<CandidateArtifact> {
    let stamp = at.timestamp_millis();
    let mut candidates = fenced_blocks(text, stamp);
    if let Some(candidate) = detect_code(text, stamp) {
        candidates.push(candidate);
    }
    candidates
}

/// Every language-tagged fenced block, left to right
pub fn fenced_blocks(text: &str, stamp: i64) -> Vec<CandidateArtifact> {
    FENCED_BLOCK_RE
        .captures_iter(text)
        .enumerate()
        .map(|(index, caps)| {
            let tag = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let language = if tag.is_empty() { "text" } else { tag };
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let extension = extension_for_language(language);

            CandidateArtifact {
                kind: ArtifactKind::Code,
                name: format!("code_block_{}_{}.{}", stamp, index, extension),
                language: language.to_string(),
                extension: extension.to_string(),
                mime_type: mime_for_language(language).to_string(),
                content: body.to_string(),
                detector: Detector::Fenced,
            }
        })
        .collect()
}

/// Whole-text candidate when the text looks like unfenced code
pub fn detect_code(text: &str, stamp: i64) -> Option<CandidateArtifact> {
    if text.chars().count() <= HEURISTIC_MIN_CHARS || !CODE_KEYWORD_RE.is_match(text) {
        return None;
    }

    Some(CandidateArtifact {
        kind: ArtifactKind::Code,
        name: format!("detected_code_{}.txt", stamp),
        language: "text".to_string(),
        extension: "txt".to_string(),
        mime_type: "text/plain".to_string(),
        content: text.to_string(),
        detector: Detector::Heuristic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_two_tagged_blocks_in_order() {
        let text = "Here:\n```python\nprint('a')\n```\nand\n```bash\necho b\n```\n";
        let candidates = extract_at(text, fixed_time());

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].extension, "py");
        assert_eq!(candidates[0].mime_type, "text/x-python");
        assert_eq!(candidates[0].content, "print('a')\n");
        assert_eq!(candidates[1].extension, "sh");
        assert_eq!(candidates[1].content, "echo b\n");
        assert!(candidates.iter().all(|c| c.kind == ArtifactKind::Code));
        assert!(candidates.iter().all(|c| c.detector == Detector::Fenced));
        assert_ne!(candidates[0].name, candidates[1].name);
    }

    #[test]
    fn test_untagged_block_defaults_to_text() {
        let candidates = extract_at("```\nplain\n```", fixed_time());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].language, "text");
        assert_eq!(candidates[0].extension, "txt");
        assert_eq!(candidates[0].mime_type, "text/plain");
    }

    #[test]
    fn test_unknown_tag_falls_back() {
        let candidates = extract_at("```cobol\nDISPLAY 'HI'.\n```", fixed_time());
        assert_eq!(candidates[0].extension, "txt");
        assert_eq!(candidates[0].mime_type, "text/plain");
        assert_eq!(candidates[0].language, "cobol");
    }

    #[test]
    fn test_unterminated_block_is_ignored() {
        assert!(extract_at("```python\nprint(1)\n", fixed_time()).is_empty());
    }

    #[test]
    fn test_names_carry_timestamp() {
        let at = fixed_time();
        let candidates = extract_at("```js\nlet a = 1;\n```", at);
        assert_eq!(
            candidates[0].name,
            format!("code_block_{}_0.js", at.timestamp_millis())
        );
    }

    #[test]
    fn test_heuristic_needs_length_and_keyword() {
        let short = "def main(): pass";
        assert!(extract_at(short, fixed_time()).is_empty());

        let long_prose = "a".repeat(150);
        assert!(extract_at(&long_prose, fixed_time()).is_empty());

        let long_code = format!("def main():\n    return 1\n{}", "# padding\n".repeat(12));
        let candidates = extract_at(&long_code, fixed_time());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].detector, Detector::Heuristic);
        assert_eq!(candidates[0].content, long_code);
        assert_eq!(candidates[0].extension, "txt");
    }

    #[test]
    fn test_heuristic_runs_alongside_fenced() {
        let text = format!(
            "Use this helper function to start:\n```python\ndef start():\n    pass\n```\n{}",
            "More explanation follows here. ".repeat(4)
        );
        let candidates = extract_at(&text, fixed_time());
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].detector, Detector::Fenced);
        assert_eq!(candidates[1].detector, Detector::Heuristic);
    }

    #[test]
    fn test_heuristic_counts_characters_not_bytes() {
        // 60 two-byte characters: 120 bytes but only 60 chars
        let text = format!("class Foo {}", "é".repeat(60));
        assert!(detect_code(&text, 0).is_none());
    }
}
