//! Local-engine voice enumeration and selection.
//!
//! The local backend asks eSpeak-NG for its installed voices once and picks
//! the most natural-sounding one by a fixed priority ladder: premium/neural
//! markers first, then well-known high-quality platform voice names, then
//! female-sounding voices, then any English voice, then anything at all.

use std::sync::OnceLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// VoiceInfo
// ---------------------------------------------------------------------------

/// Reported gender of an installed voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

/// One voice as reported by the synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceInfo {
    /// Language tag, e.g. `"en-US"`.
    pub language: String,
    /// Human-readable voice name.
    pub name: String,
    /// Identifier passed back to the engine (`-v` argument).
    pub identifier: String,
    pub gender: Gender,
}

impl VoiceInfo {
    fn is_english(&self) -> bool {
        let lang = self.language.to_ascii_lowercase();
        lang == "en" || lang.starts_with("en-")
    }
}

// ---------------------------------------------------------------------------
// Voice-list parsing (eSpeak `--voices` output)
// ---------------------------------------------------------------------------

/// Parse the tabular output of `espeak-ng --voices=en`.
///
/// Expected rows (header skipped):
///
/// ```text
/// Pty Language       Age/Gender VoiceName           File         Other Languages
///  2  en-US           --/M      English (America)   gmw/en-US
/// ```
pub fn parse_voice_list(output: &str) -> Vec<VoiceInfo> {
    let mut voices = Vec::new();

    for line in output.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            continue;
        }

        // Columns: priority, language, age/gender, name..., file.
        // The name may contain spaces; the file is the last field.
        let language = fields[1].to_string();
        let gender = match fields[2].rsplit('/').next() {
            Some("M") => Gender::Male,
            Some("F") => Gender::Female,
            _ => Gender::Unknown,
        };
        let identifier = fields[fields.len() - 1].to_string();
        let name = fields[3..fields.len() - 1].join(" ");

        if name.is_empty() {
            continue;
        }

        voices.push(VoiceInfo {
            language,
            name,
            identifier,
            gender,
        });
    }

    voices
}

// ---------------------------------------------------------------------------
// Priority selection
// ---------------------------------------------------------------------------

struct Ladder {
    premium: Regex,
    platform: Regex,
    female_name: Regex,
}

fn ladder() -> &'static Ladder {
    static LADDER: OnceLock<Ladder> = OnceLock::new();
    LADDER.get_or_init(|| Ladder {
        premium: Regex::new(r"(?i)neural|premium|enhanced|natural|eloquence").expect("premium"),
        platform: Regex::new(
            r"(?i)samantha|alex|victoria|karen|daniel|fiona|moira|tessa|zira|david|mark|hazel",
        )
        .expect("platform"),
        female_name: Regex::new(r"(?i)female|woman|girl").expect("female"),
    })
}

/// Pick the best available voice by the fixed priority ladder.
///
/// Returns `None` only when `voices` is empty.
pub fn pick_best_voice(voices: &[VoiceInfo]) -> Option<&VoiceInfo> {
    if voices.is_empty() {
        return None;
    }

    let l = ladder();
    let english: Vec<&VoiceInfo> = voices.iter().filter(|v| v.is_english()).collect();

    // 1. Premium / neural markers in the name.
    if let Some(v) = english.iter().find(|v| l.premium.is_match(&v.name)) {
        return Some(v);
    }

    // 2. Named high-quality platform voices.
    if let Some(v) = english.iter().find(|v| l.platform.is_match(&v.name)) {
        return Some(v);
    }

    // 3. Female-sounding voices, by reported gender or name.
    if let Some(v) = english
        .iter()
        .find(|v| v.gender == Gender::Female || l.female_name.is_match(&v.name))
    {
        return Some(v);
    }

    // 4. Any English voice.
    if let Some(v) = english.first() {
        return Some(v);
    }

    // 5. Anything at all.
    voices.first()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
