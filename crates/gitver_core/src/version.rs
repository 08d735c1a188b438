//! The configuration's version syntax: 2–4 numeric components with optional
//! prerelease and build metadata, where dot-separated identifiers may be the
//! `{height}` macro.
//!
//! `semver::Version` cannot carry the macro, so this type owns parsing and
//! only converts to strict semver at the edges that need it.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const HEIGHT_MACRO: &str = "{height}";

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+(?:\.\d+){1,3})(-[0-9A-Za-z\-\.\{\}]+)?(\+[0-9A-Za-z\-\.\{\}]+)?$")
        .expect("version pattern compiles")
});

/// A parsed version expression from `version.json`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SemanticVersion {
    components: Vec<u64>,
    /// Empty, or starts with `-`.
    prerelease: String,
    /// Empty, or starts with `+`.
    build_metadata: String,
}

impl SemanticVersion {
    pub fn new(components: Vec<u64>) -> Self {
        debug_assert!((2..=4).contains(&components.len()));
        Self {
            components,
            prerelease: String::new(),
            build_metadata: String::new(),
        }
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let captures = VERSION_PATTERN
            .captures(text)
            .ok_or_else(|| format!("'{text}' is not a valid version expression"))?;
        let components: Vec<u64> = captures[1]
            .split('.')
            .map(|part| part.parse().map_err(|_| format!("component '{part}' overflows")))
            .collect::<Result<_, _>>()?;
        let prerelease = captures.get(2).map_or("", |m| m.as_str()).to_string();
        let build_metadata = captures.get(3).map_or("", |m| m.as_str()).to_string();

        validate_macro_placement(&prerelease)?;
        validate_macro_placement(&build_metadata)?;
        Ok(Self {
            components,
            prerelease,
            build_metadata,
        })
    }

    pub fn major(&self) -> u64 {
        self.components[0]
    }

    pub fn minor(&self) -> u64 {
        self.components[1]
    }

    /// The explicit third component, when one was written.
    pub fn build_component(&self) -> Option<u64> {
        self.components.get(2).copied()
    }

    pub fn fourth_component(&self) -> Option<u64> {
        self.components.get(3).copied()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn prerelease(&self) -> &str {
        &self.prerelease
    }

    pub fn build_metadata(&self) -> &str {
        &self.build_metadata
    }

    pub fn with_prerelease(&self, prerelease: &str) -> Self {
        debug_assert!(prerelease.is_empty() || prerelease.starts_with('-'));
        Self {
            components: self.components.clone(),
            prerelease: prerelease.to_string(),
            build_metadata: self.build_metadata.clone(),
        }
    }

    pub fn contains_height_macro(&self) -> bool {
        has_macro(&self.prerelease) || has_macro(&self.build_metadata)
    }

    pub fn prerelease_contains_height_macro(&self) -> bool {
        has_macro(&self.prerelease)
    }

    /// The prerelease with `{height}` identifiers removed; the lineage
    /// identity is unchanged by the macro itself.
    pub fn prerelease_without_height(&self) -> String {
        strip_macro(&self.prerelease, '-')
    }

    /// The build metadata with `{height}` identifiers removed.
    pub fn build_metadata_without_height(&self) -> String {
        strip_macro(&self.build_metadata, '+')
    }

    pub fn with_build_metadata(&self, build_metadata: &str) -> Self {
        debug_assert!(build_metadata.is_empty() || build_metadata.starts_with('+'));
        Self {
            components: self.components.clone(),
            prerelease: self.prerelease.clone(),
            build_metadata: build_metadata.to_string(),
        }
    }

    /// Replaces `{height}` identifiers with the concrete height.
    pub fn substitute_height(&self, height: u64) -> Self {
        Self {
            components: self.components.clone(),
            prerelease: replace_macro(&self.prerelease, height),
            build_metadata: replace_macro(&self.build_metadata, height),
        }
    }

    /// The identity-bearing form used by the lineage signature and the
    /// height cache: numeric components plus macro-free prerelease.
    pub fn base_version_string(&self) -> String {
        let numeric = self
            .components
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        format!("{numeric}{}", self.prerelease_without_height())
    }

    /// Truncates to the first `count` numeric components, dropping prerelease
    /// and metadata. Used for release branch names.
    pub fn truncated_numeric(&self, count: usize) -> String {
        self.components
            .iter()
            .take(count.max(1))
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let numeric = self
            .components
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{numeric}{}{}", self.prerelease, self.build_metadata)
    }
}

impl FromStr for SemanticVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}

fn identifiers(section: &str) -> impl Iterator<Item = &str> {
    // skip the leading '-' or '+'
    section.get(1..).unwrap_or("").split('.')
}

fn has_macro(section: &str) -> bool {
    identifiers(section).any(|ident| ident == HEIGHT_MACRO)
}

/// The macro must stand alone as a dot-separated identifier; braces anywhere
/// else are malformed.
fn validate_macro_placement(section: &str) -> Result<(), String> {
    if section.is_empty() {
        return Ok(());
    }
    for ident in identifiers(section) {
        if ident.is_empty() {
            return Err("empty identifier".to_string());
        }
        if ident != HEIGHT_MACRO && ident.contains(['{', '}']) {
            return Err(format!(
                "'{ident}' embeds braces; the height macro must be a whole identifier"
            ));
        }
    }
    Ok(())
}

fn strip_macro(section: &str, lead: char) -> String {
    if section.is_empty() {
        return String::new();
    }
    let kept: Vec<&str> = identifiers(section)
        .filter(|ident| *ident != HEIGHT_MACRO)
        .collect();
    if kept.is_empty() {
        String::new()
    } else {
        format!("{lead}{}", kept.join("."))
    }
}

fn replace_macro(section: &str, height: u64) -> String {
    section.replace(HEIGHT_MACRO, &height.to_string())
}

/// SemVer-1 rendering of a prerelease: dots become hyphens and numeric
/// identifiers are zero-padded so ordinal comparison sorts correctly.
pub fn semver1_prerelease(prerelease: &str, padding: usize) -> String {
    if prerelease.is_empty() {
        return String::new();
    }
    let converted: Vec<String> = identifiers(prerelease)
        .map(|ident| {
            if ident.bytes().all(|b| b.is_ascii_digit()) {
                format!("{ident:0>padding$}")
            } else {
                ident.to_string()
            }
        })
        .collect();
    format!("-{}", converted.join("-"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_plain_versions() {
        let v = SemanticVersion::parse("1.2").unwrap();
        assert_eq!(v.major(), 1);
        assert_eq!(v.minor(), 2);
        assert_eq!(v.component_count(), 2);
        assert_eq!(v.to_string(), "1.2");

        let v = SemanticVersion::parse("1.2.3.4").unwrap();
        assert_eq!(v.build_component(), Some(3));
        assert_eq!(v.fourth_component(), Some(4));
    }

    #[test]
    fn parses_prerelease_and_metadata() {
        let v = SemanticVersion::parse("4.8-beta.5+build.9").unwrap();
        assert_eq!(v.prerelease(), "-beta.5");
        assert_eq!(v.build_metadata(), "+build.9");
    }

    #[test]
    fn rejects_single_component_and_garbage() {
        assert!(SemanticVersion::parse("1").is_err());
        assert!(SemanticVersion::parse("1.2.3.4.5").is_err());
        assert!(SemanticVersion::parse("a.b").is_err());
        assert!(SemanticVersion::parse("1.2-bad_tag").is_err());
    }

    #[test]
    fn height_macro_must_stand_alone() {
        assert!(SemanticVersion::parse("1.2-beta.{height}").is_ok());
        assert!(SemanticVersion::parse("1.2+{height}").is_ok());
        assert!(SemanticVersion::parse("1.2-beta{height}").is_err());
        assert!(SemanticVersion::parse("1.2-{heigh}").is_err());
    }

    #[test]
    fn height_substitution_and_stripping() {
        let v = SemanticVersion::parse("1.2-beta.{height}").unwrap();
        assert!(v.contains_height_macro());
        assert_eq!(v.substitute_height(42).prerelease(), "-beta.42");
        assert_eq!(v.prerelease_without_height(), "-beta");
        assert_eq!(v.base_version_string(), "1.2-beta");

        let bare = SemanticVersion::parse("1.2-{height}").unwrap();
        assert_eq!(bare.prerelease_without_height(), "");
        assert_eq!(bare.base_version_string(), "1.2");
    }

    #[test]
    fn metadata_stripping_and_replacement() {
        let v = SemanticVersion::parse("1.2+build.{height}").unwrap();
        assert_eq!(v.build_metadata_without_height(), "+build");
        assert_eq!(
            v.with_build_metadata(&v.build_metadata_without_height())
                .to_string(),
            "1.2+build"
        );

        let bare = SemanticVersion::parse("1.2+{height}").unwrap();
        assert_eq!(bare.build_metadata_without_height(), "");
        assert_eq!(bare.with_build_metadata("").to_string(), "1.2");
    }

    #[test]
    fn truncation_for_branch_names() {
        let v = SemanticVersion::parse("1.2.3-beta").unwrap();
        assert_eq!(v.truncated_numeric(1), "1");
        assert_eq!(v.truncated_numeric(2), "1.2");
        assert_eq!(v.truncated_numeric(3), "1.2.3");
    }

    #[test]
    fn semver1_padding_and_dots() {
        assert_eq!(semver1_prerelease("-beta.5", 4), "-beta-0005");
        assert_eq!(semver1_prerelease("-rc.10.hotfix", 2), "-rc-10-hotfix");
        assert_eq!(semver1_prerelease("", 4), "");
    }

    #[test]
    fn serde_round_trip() {
        let v: SemanticVersion = serde_json::from_str("\"2.5-rc.{height}\"").unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"2.5-rc.{height}\"");
        assert!(serde_json::from_str::<SemanticVersion>("\"nope\"").is_err());
    }
}
