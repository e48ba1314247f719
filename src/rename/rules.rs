//! Textual cleanup rules for release-style file names.
//!
//! Rules operate on the base name only (no extension) and are applied in the
//! configured order. Every rule is idempotent on its own output, and the
//! default ordering keeps the whole set idempotent: cleaning an already
//! cleaned name returns it unchanged.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters that separate tokens in a release name.
const TOKEN_PATTERN: &str = r"[^\s._\[\](){}]+";

/// Tokens that mark the start of release noise: years, resolutions,
/// sources, codecs and audio formats.
const MARKER_PATTERN: &str = r"(?i)^(?:(?:19|20)\d{2}|(?:480|576|720|1080|2160|4320)[pi]|4k|uhd|blu-?ray|bdrip|brrip|bdremux|remux|web-?dl|web-?rip|hdtv|hdrip|dvdrip|x26[45]|h26[45]|hevc|xvid|10bit|hdr10|aac|ac3|dts|truehd|atmos)$";

/// A single cleanup step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupRule {
    /// Remove `[...]` and `{...}` groups.
    StripBracketed,
    /// Remove a trailing `-GROUP` that follows a release marker, unless it
    /// belongs to the first token.
    StripReleaseGroup,
    /// Cut the name before the first release marker after the first token.
    TruncateAtMarkers,
    /// Scene-style names (no inner whitespace): runs of `.`/`_` become a space.
    NormalizeSeparators,
    /// Collapse whitespace runs and trim the ends.
    CollapseWhitespace,
}

impl CleanupRule {
    /// The default rule order.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::StripBracketed,
            Self::StripReleaseGroup,
            Self::TruncateAtMarkers,
            Self::NormalizeSeparators,
            Self::CollapseWhitespace,
        ]
    }
}

/// An ordered, compiled set of cleanup rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CleanupRule>,
    bracketed: Regex,
    token: Regex,
    marker: Regex,
    group: Regex,
    separators: Regex,
    whitespace: Regex,
}

impl RuleSet {
    /// Compile `rules`, applied in the given order.
    pub fn new(rules: Vec<CleanupRule>) -> Result<Self, regex::Error> {
        Ok(Self {
            rules,
            bracketed: Regex::new(r"\[[^\[\]]*\]|\{[^{}]*\}")?,
            token: Regex::new(TOKEN_PATTERN)?,
            marker: Regex::new(MARKER_PATTERN)?,
            group: Regex::new(r"^[A-Za-z0-9]+$")?,
            separators: Regex::new(r"[._]+")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Compile the default rule order.
    pub fn with_defaults() -> Result<Self, regex::Error> {
        Self::new(CleanupRule::defaults())
    }

    /// The rules in application order.
    pub fn rules(&self) -> &[CleanupRule] {
        &self.rules
    }

    /// Clean a base name. Returns the input unchanged if cleaning would leave
    /// nothing.
    pub fn clean(&self, base_name: &str) -> String {
        let mut name = base_name.to_string();
        for rule in &self.rules {
            name = match rule {
                CleanupRule::StripBracketed => self.strip_bracketed(&name),
                CleanupRule::StripReleaseGroup => self.strip_release_group(&name),
                CleanupRule::TruncateAtMarkers => self.truncate_at_markers(&name),
                CleanupRule::NormalizeSeparators => self.normalize_separators(&name),
                CleanupRule::CollapseWhitespace => self.collapse_whitespace(&name),
            };
        }

        if name.trim().is_empty() {
            base_name.to_string()
        } else {
            name
        }
    }

    fn is_marker(&self, token: &str) -> bool {
        self.marker.is_match(token)
    }

    /// A token is noise if it is a marker itself or a marker with a
    /// hyphenated suffix (`x264-GROUP`, `WEB-DL-GROUP`).
    fn token_is_marker(&self, token: &str) -> bool {
        self.is_marker(token)
            || token
                .split_once('-')
                .is_some_and(|(head, _)| self.is_marker(head))
            || token
                .rsplit_once('-')
                .is_some_and(|(head, _)| self.is_marker(head))
    }

    fn strip_bracketed(&self, name: &str) -> String {
        let mut current = name.to_string();
        // Nested groups come off one level per pass.
        loop {
            let next = self.bracketed.replace_all(&current, " ").into_owned();
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn strip_release_group(&self, name: &str) -> String {
        // The first token is title, never release noise, even when it is the
        // only one left.
        let Some(last) = self.token.find_iter(name).skip(1).last() else {
            return name.to_string();
        };
        // Trailing punctuation after the group goes with it.
        match last.as_str().rsplit_once('-') {
            Some((head, group)) if self.is_marker(head) && self.group.is_match(group) => {
                name[..last.start() + head.len()].to_string()
            }
            _ => name.to_string(),
        }
    }

    fn truncate_at_markers(&self, name: &str) -> String {
        let cut = self
            .token
            .find_iter(name)
            .skip(1)
            .find(|token| self.token_is_marker(token.as_str()))
            .map(|token| token.start());

        match cut {
            Some(at) => {
                let kept = name[..at].trim_end_matches(|c: char| {
                    c.is_whitespace() || matches!(c, '.' | '_' | '-' | '(' | '[' | '{')
                });
                if kept.is_empty() {
                    name.to_string()
                } else {
                    kept.to_string()
                }
            }
            None => name.to_string(),
        }
    }

    fn normalize_separators(&self, name: &str) -> String {
        if name.trim().contains(char::is_whitespace) {
            return name.to_string();
        }
        self.separators.replace_all(name, " ").into_owned()
    }

    fn collapse_whitespace(&self, name: &str) -> String {
        self.whitespace.replace_all(name.trim(), " ").into_owned()
    }
}


/// Release-style names built from a fixed token alphabet with a seeded
/// xorshift generator, so every run sees the same inputs.
#[cfg(test)]
pub(super) fn sample_names(count: usize, seed: u64) -> Vec<String> {
    const TOKENS: &[&str] = &[
        "Movie", "The", "Show", "S01E01", "Spider-Man", "Dr", "2012", "2020", "1999",
        "1080p", "720p", "4K", "x264", "x265", "HEVC", "WEB-DL", "BluRay", "Blu-ray",
        "GRP", "-GRP", "x264-GRP", "x265-TERMiNAL", "2012-Remastered", "1080p-2020",
        "WEB-DL-GROUP", "[tag]", "[1080p]", "{b}", "(2019)", "[[nested] x]", "[", ")",
        "-", "---",
    ];
    const SEPARATORS: &[&str] = &[".", "_", " ", "..", " - ", "._", "  "];

    let mut state = seed.max(1);
    let mut next = move |bound: usize| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state % bound as u64) as usize
    };

    (0..count)
        .map(|_| {
            let mut name = String::new();
            if next(8) == 0 {
                name.push_str(SEPARATORS[next(SEPARATORS.len())]);
            }
            for i in 0..=next(6) {
                if i > 0 {
                    name.push_str(SEPARATORS[next(SEPARATORS.len())]);
                }
                name.push_str(TOKENS[next(TOKENS.len())]);
            }
            if next(4) == 0 {
                name.push_str(SEPARATORS[next(SEPARATORS.len())]);
            }
            name
        })
        .collect()
}
