//! Content-token extraction from release names

use lazy_static::lazy_static;
use regex::Regex;

/// Cosmetic group tags removed before any matching. Exact, case-sensitive
/// substrings as the bots publish them.
const RELEASE_TAGS: [&str; 4] = ["[AnimeNSK]", "[_AnimeNSK]", "[#AnimeNSK]", "[XvidRC4]"];

lazy_static! {
    // 8 non-space chars enclosed in () or []; display names end at the bracket
    static ref DISPLAY_TOKEN: Regex = Regex::new(r"[\[(](\S{8})[\])]").unwrap();
    // filenames additionally carry an extension dot right after the bracket
    static ref FILE_TOKEN: Regex = Regex::new(r"[\[(](\S{8})[\])]\.").unwrap();
    static ref ARCHIVE_VOLUME: Regex = Regex::new(r"\S+\.rar").unwrap();
}

/// Identifying marker extracted from a release name.
///
/// Archive volumes carry a recognizable extension but no hash token, so they
/// are identifiable without being usable as a dedup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameKey {
    Hash(String),
    Archive,
}

impl NameKey {
    pub fn hash(self) -> Option<String> {
        match self {
            NameKey::Hash(token) => Some(token),
            NameKey::Archive => None,
        }
    }
}

/// Remove every known release tag from a name.
pub fn strip_release_tags(name: &str) -> String {
    let mut cleaned = name.to_string();
    for tag in RELEASE_TAGS {
        cleaned = cleaned.replace(tag, "");
    }
    cleaned
}

/// Extract the content token from a display name (no file extension).
pub fn display_key(name: &str) -> Option<NameKey> {
    key_with(&DISPLAY_TOKEN, name)
}

/// Extract the content token from a bare filename, where the closing bracket
/// is followed by the extension dot.
pub fn file_key(name: &str) -> Option<NameKey> {
    key_with(&FILE_TOKEN, name)
}

fn key_with(token_re: &Regex, name: &str) -> Option<NameKey> {
    if let Some(caps) = token_re.captures(name) {
        return Some(NameKey::Hash(caps[1].to_uppercase()));
    }
    if ARCHIVE_VOLUME.is_match(name) {
        return Some(NameKey::Archive);
    }
    None
}
