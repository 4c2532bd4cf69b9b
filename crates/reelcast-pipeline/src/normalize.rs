//! Filename → (base title, year) normalisation.
//!
//! # Design
//! - Pure and deterministic: no I/O, no caching between calls.
//! - Cleaning runs in a fixed order: extension, URLs, bracketed noise, delimiters,
//!   leading promotional tokens, symbols, year, release tags, whitespace.
//! - A result is never empty; when cleaning strips everything the minimally
//!   cleaned original name is used instead, and `"Untitled"` when even that is empty.

use once_cell::sync::Lazy;
use regex::Regex;
use reelcast_core::NormalizedTitle;

/// Title used when a filename carries no usable text at all.
pub const UNTITLED: &str = "Untitled";

const MAX_EXTENSION_LEN: usize = 5;

const PROMO_KEYWORDS: &[&str] = &[
    "movies",
    "hub",
    "flix",
    "rips",
    "team",
    "group",
    "hd",
    "exclusive",
    "uploader",
    "channel",
    "official",
    "telegram",
    "series",
    "rockers",
];

static URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:https?://\S+|www\.[a-z0-9-]+(?:\.[a-z0-9-]+)*\.(?:com|net|org|in|xyz|pro|me|io|club|site|co)\b)",
    )
    .expect("url pattern is valid")
});

static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]|\([^)]*\)|\{[^}]*\}").expect("bracket pattern is valid"));

static DELIMITERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[._\-]+").expect("delimiter pattern is valid"));

static YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").expect("year pattern is valid"));

static TAGS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:",
        r"2160p|1440p|1080p|720p|576p|480p|360p|4k|8k|uhd|fhd|hd|hdr|hdr10|sdr|10bit|8bit",
        r"|bluray|blu ray|bdrip|brrip|webrip|web dl|webdl|web|dl|hdrip|dvdrip|dvdscr|hdtv|hdcam|camrip|predvd",
        r"|x264|x265|h264|h265|hevc|avc|xvid",
        r"|aac\d?|ac3|eac3|ddp?\d?|dts|atmos|truehd|dual audio|multi audio|audio",
        r"|hindi|english|tamil|telugu|malayalam|kannada|bengali|marathi|korean|japanese|dubbed|dual",
        r"|esubs?|msubs?|subs|subbed",
        r"|proper|repack|extended|uncut|remastered|complete|org",
        r"|s\d+e\d+|s\d+|e\d+|ep\d+|season ?\d+|part ?\d+|episode ?\d+",
        r")\b",
    ))
    .expect("tag pattern is valid")
});

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Normalise a raw filename into a base title and optional release year.
///
/// Bracketed content is noise, years included. When several year tokens
/// remain the last one is the release year: `1917.2019.mkv` yields `1917`
/// with year `2019`.
#[must_use]
pub fn normalize(raw: &str) -> NormalizedTitle {
    let raw = raw.trim();
    if raw.is_empty() {
        return untitled();
    }

    let working = strip_symbols(&pre_clean(raw));

    let mut tokens: Vec<&str> = working.split_whitespace().collect();
    let year_index = tokens.iter().rposition(|token| YEAR.is_match(token));
    let year = year_index.map(|index| tokens.remove(index).to_string());

    let joined = tokens.join(" ");
    let without_tags = TAGS.replace_all(&joined, " ");
    let base_title = collapse(&without_tags);

    if base_title.is_empty() {
        return fallback(raw);
    }

    NormalizedTitle { base_title, year }
}

/// Human-readable per-file label that keeps episode and quality markers.
#[must_use]
pub fn file_label(raw: &str) -> String {
    let raw = raw.trim();
    let label = collapse(&pre_clean(raw).replace('`', ""));
    if label.is_empty() {
        fallback(raw).base_title
    } else {
        label
    }
}

fn untitled() -> NormalizedTitle {
    NormalizedTitle {
        base_title: UNTITLED.to_string(),
        year: None,
    }
}

fn fallback(raw: &str) -> NormalizedTitle {
    let minimal = collapse(&DELIMITERS.replace_all(strip_extension(raw), " "));
    if minimal.is_empty() {
        return untitled();
    }
    NormalizedTitle {
        base_title: minimal,
        year: None,
    }
}

/// Extension, URLs, bracketed noise, delimiters, and leading promotional tokens.
fn pre_clean(raw: &str) -> String {
    let stem = strip_extension(raw);
    let without_urls = URL.replace_all(stem, " ");
    let without_brackets = BRACKETED.replace_all(&without_urls, " ");
    let spaced = DELIMITERS.replace_all(&without_brackets, " ");
    skip_promotional_prefix(&spaced)
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=MAX_EXTENSION_LEN).contains(&ext.len())
                && ext.chars().all(|ch| ch.is_ascii_alphanumeric())
                && ext.chars().any(|ch| ch.is_ascii_alphabetic()) =>
        {
            stem
        }
        _ => name,
    }
}

fn is_promotional(token: &str) -> bool {
    let lower = token.to_lowercase();
    lower.starts_with('@')
        || lower.starts_with("www")
        || PROMO_KEYWORDS
            .iter()
            .any(|keyword| lower.ends_with(keyword))
}

fn skip_promotional_prefix(text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let skip = tokens
        .iter()
        .take_while(|token| is_promotional(token))
        .count()
        .min(tokens.len().saturating_sub(1));
    tokens[skip..].join(" ")
}

fn strip_symbols(text: &str) -> String {
    text.chars()
        .filter(|ch| *ch != '\'' && *ch != '’')
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect()
}

fn collapse(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title(raw: &str) -> (String, Option<String>) {
        let normalized = normalize(raw);
        (normalized.base_title, normalized.year)
    }

    #[test]
    fn episode_markers_and_quality_tags_are_removed() {
        assert_eq!(
            title("Show.Name.S01E02.1080p.mkv"),
            ("Show Name".to_string(), None)
        );
    }

    #[test]
    fn year_is_extracted_and_removed() {
        assert_eq!(
            title("Movie.Title.2021.720p.BluRay.mkv"),
            ("Movie Title".to_string(), Some("2021".to_string()))
        );
    }

    #[test]
    fn empty_input_is_untitled() {
        assert_eq!(title(""), ("Untitled".to_string(), None));
        assert_eq!(title("   "), ("Untitled".to_string(), None));
    }

    #[test]
    fn bracketed_noise_and_promotions_are_dropped() {
        assert_eq!(
            title("[TeamXYZ] @MoviesHub Alpha_Centauri (Dual Audio) {x265}.mp4"),
            ("Alpha Centauri".to_string(), None)
        );
        assert_eq!(
            title("www.SiteRips.com - Blade Runner - 1982 - HDRip.avi"),
            ("Blade Runner".to_string(), Some("1982".to_string()))
        );
    }

    #[test]
    fn bracketed_year_is_dropped_with_the_noise() {
        assert_eq!(
            title("The Thing (1982) [1080p].mkv"),
            ("The Thing".to_string(), None)
        );
        assert_eq!(title("Movie (2021).mkv"), ("Movie".to_string(), None));
    }

    #[test]
    fn last_year_token_wins() {
        assert_eq!(
            title("Blade.Runner.2049.2017.2160p.mkv"),
            ("Blade Runner 2049".to_string(), Some("2017".to_string()))
        );
        assert_eq!(
            title("1917.2019.1080p.mkv"),
            ("1917".to_string(), Some("2019".to_string()))
        );
    }

    #[test]
    fn all_tag_names_fall_back_to_minimal_cleaning() {
        assert_eq!(title("1080p.x264.mkv"), ("1080p x264".to_string(), None));
        assert_eq!(title("2012.mkv"), ("2012".to_string(), None));
        assert_eq!(title("...."), ("Untitled".to_string(), None));
    }

    #[test]
    fn numeric_suffix_is_not_treated_as_extension() {
        assert_eq!(
            title("Movie.Title.2019"),
            ("Movie Title".to_string(), Some("2019".to_string()))
        );
    }

    #[test]
    fn normalisation_never_returns_empty_title() {
        let samples = [
            "",
            ".",
            "-_-",
            "[x]",
            "(2020)",
            "@channel",
            "S01E01",
            "720p",
            "mkv",
            "a.b",
            "🎬.mkv",
            "Ocean's.Eleven.2001.mkv",
        ];
        for sample in samples {
            assert!(
                !normalize(sample).base_title.is_empty(),
                "empty title for {sample:?}"
            );
        }
    }

    #[test]
    fn apostrophes_are_dropped_inside_words() {
        assert_eq!(
            title("Ocean's.Eleven.2001.mkv"),
            ("Oceans Eleven".to_string(), Some("2001".to_string()))
        );
    }

    #[test]
    fn file_label_keeps_episode_markers() {
        assert_eq!(file_label("[Grp] Alpha.S01E02.1080p.mkv"), "Alpha S01E02 1080p");
        assert_eq!(file_label("`weird`.mkv"), "weird");
        assert_eq!(file_label(""), "Untitled");
    }
}
