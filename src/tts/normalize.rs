//! Text normalization applied before synthesis.
//!
//! Both backends receive the same cleaned text: markdown markers stripped,
//! emoji removed, common technical acronyms spaced out so they are spelled
//! rather than mispronounced, and version numbers expanded to words.

use std::sync::OnceLock;

use regex::Regex;

/// Acronyms replaced with letter-spaced (or expanded) pronunciations.
const ACRONYMS: &[(&str, &str)] = &[
    (r"\bAPI\b", "A P I"),
    (r"\bHTML\b", "H T M L"),
    (r"\bCSS\b", "C S S"),
    (r"\bJS\b", "JavaScript"),
    (r"\bJSON\b", "J S O N"),
    (r"\bURL\b", "U R L"),
    (r"\bHTTPS\b", "H T T P S"),
    (r"\bHTTP\b", "H T T P"),
    (r"\bAI\b", "A I"),
    (r"\bML\b", "M L"),
    (r"\bUI\b", "U I"),
    (r"\bUX\b", "U X"),
];

struct Rules {
    bold: Regex,
    italic: Regex,
    code: Regex,
    heading: Regex,
    emoji: Regex,
    acronyms: Vec<(Regex, &'static str)>,
    version: Regex,
    decimal: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        bold: Regex::new(r"\*\*(.*?)\*\*").expect("bold regex"),
        italic: Regex::new(r"\*(.*?)\*").expect("italic regex"),
        code: Regex::new(r"`(.*?)`").expect("code regex"),
        heading: Regex::new(r"(?m)^#{1,6}\s+").expect("heading regex"),
        emoji: Regex::new(
            "[\u{1F300}-\u{1F5FF}\u{1F600}-\u{1F64F}\u{1F680}-\u{1F6FF}\
             \u{1F1E0}-\u{1F1FF}\u{2600}-\u{26FF}\u{2700}-\u{27BF}]",
        )
        .expect("emoji regex"),
        acronyms: ACRONYMS
            .iter()
            .map(|(pat, rep)| (Regex::new(pat).expect("acronym regex"), *rep))
            .collect(),
        version: Regex::new(r"\bv(\d+)\.(\d+)").expect("version regex"),
        decimal: Regex::new(r"(\d+)\.(\d+)").expect("decimal regex"),
    })
}

/// Clean `text` for synthesis.  Returns a trimmed string; may be empty if
/// the input contained only markup.
pub fn clean_for_speech(text: &str) -> String {
    let r = rules();

    let mut out = r.bold.replace_all(text, "$1").into_owned();
    out = r.italic.replace_all(&out, "$1").into_owned();
    out = r.code.replace_all(&out, "$1").into_owned();
    out = r.heading.replace_all(&out, "").into_owned();
    out = r.emoji.replace_all(&out, "").into_owned();

    for (pattern, replacement) in &r.acronyms {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }

    out = r.version.replace_all(&out, "version $1 point $2").into_owned();
    out = r.decimal.replace_all(&out, "$1 point $2").into_owned();

    out.trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_markers() {
        assert_eq!(clean_for_speech("**bold** and *italic*"), "bold and italic");
        assert_eq!(clean_for_speech("run `cargo test` now"), "run cargo test now");
        assert_eq!(clean_for_speech("## Heading\nbody"), "Heading\nbody");
    }

    #[test]
    fn removes_emoji() {
        assert_eq!(clean_for_speech("great job \u{1F600}"), "great job");
        assert_eq!(clean_for_speech("\u{2705} done"), "done");
    }

    #[test]
    fn spaces_out_acronyms() {
        assert_eq!(
            clean_for_speech("the API returns JSON"),
            "the A P I returns J S O N"
        );
        assert_eq!(clean_for_speech("written in JS"), "written in JavaScript");
    }

    #[test]
    fn acronyms_match_whole_words_only() {
        // "AIMED" must not trigger the AI replacement.
        assert_eq!(clean_for_speech("AIMED high"), "AIMED high");
    }

    #[test]
    fn https_wins_over_http_prefix() {
        assert_eq!(clean_for_speech("use HTTPS"), "use H T T P S");
        assert_eq!(clean_for_speech("plain HTTP"), "plain H T T P");
    }

    #[test]
    fn expands_version_numbers() {
        assert_eq!(clean_for_speech("since v2.1"), "since version 2 point 1");
        assert_eq!(clean_for_speech("about 3.5 years"), "about 3 point 5 years");
    }

    #[test]
    fn trims_result() {
        assert_eq!(clean_for_speech("  hello  "), "hello");
        assert_eq!(clean_for_speech("**"), "");
    }
}
