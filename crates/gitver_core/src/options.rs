//! The `version.json` document.
//!
//! Every field is optional so that inheritance is an explicit shallow merge
//! over `Option<T>` fields; effective values come from the accessor methods,
//! which apply the documented defaults.

use serde::{Deserialize, Serialize};

use crate::version::SemanticVersion;

/// The version synthesized when a repository has commits but no
/// configuration: height lands in the third component, the commit fragment
/// in the fourth.
pub const DEFAULT_VERSION: &str = "0.0";
pub const DEFAULT_SEMVER1_PADDING: usize = 4;
pub const DEFAULT_SHORT_ID_LENGTH: usize = 10;

/// The version configuration document. Unknown top-level fields are ignored.
#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct VersionOptions {
    /// When true, omitted fields come from the nearest ancestor document.
    #[serde(skip_serializing_if = "is_false")]
    pub inherit: bool,
    /// Required unless `inherit` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<SemanticVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assembly_version: Option<AssemblyVersionOptions>,
    /// Added to the computed height wherever the height is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_number_offset: Option<i64>,
    /// Zero-padding width for numeric prerelease identifiers in SemVer-1
    /// output. Minimum 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sem_ver1_numeric_identifier_padding: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_id_short_fixed_length: Option<usize>,
    /// When non-zero, short ids grow from this length until unique instead
    /// of using the fixed length.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_commit_id_short_auto_minimum: Option<usize>,
    /// Regexes matched against the effective ref to decide `publicRelease`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_release_ref_spec: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nu_get_package_version: Option<NuGetPackageVersionOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_filters: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_build: Option<CloudBuildOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseOptions>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl VersionOptions {
    /// Fills every `None` field from `parent`; the child always wins.
    pub fn merge_from(mut self, parent: VersionOptions) -> Self {
        self.version = self.version.or(parent.version);
        self.assembly_version = self.assembly_version.or(parent.assembly_version);
        self.build_number_offset = self.build_number_offset.or(parent.build_number_offset);
        self.sem_ver1_numeric_identifier_padding = self
            .sem_ver1_numeric_identifier_padding
            .or(parent.sem_ver1_numeric_identifier_padding);
        self.git_commit_id_short_fixed_length = self
            .git_commit_id_short_fixed_length
            .or(parent.git_commit_id_short_fixed_length);
        self.git_commit_id_short_auto_minimum = self
            .git_commit_id_short_auto_minimum
            .or(parent.git_commit_id_short_auto_minimum);
        self.public_release_ref_spec = self
            .public_release_ref_spec
            .or(parent.public_release_ref_spec);
        self.nu_get_package_version = self
            .nu_get_package_version
            .or(parent.nu_get_package_version);
        self.path_filters = self.path_filters.or(parent.path_filters);
        self.cloud_build = self.cloud_build.or(parent.cloud_build);
        self.release = self.release.or(parent.release);
        self
    }

    pub fn version_or_default(&self) -> SemanticVersion {
        self.version
            .clone()
            .unwrap_or_else(|| SemanticVersion::parse(DEFAULT_VERSION).expect("default parses"))
    }

    pub fn build_number_offset_or_default(&self) -> i64 {
        self.build_number_offset.unwrap_or(0)
    }

    pub fn semver1_padding_or_default(&self) -> usize {
        self.sem_ver1_numeric_identifier_padding
            .unwrap_or(DEFAULT_SEMVER1_PADDING)
            .max(1)
    }

    pub fn path_filters_or_default(&self) -> &[String] {
        self.path_filters.as_deref().unwrap_or(&[])
    }

    pub fn public_release_ref_spec_or_default(&self) -> &[String] {
        self.public_release_ref_spec.as_deref().unwrap_or(&[])
    }

    pub fn nuget_semver_or_default(&self) -> NuGetSemVerLevel {
        self.nu_get_package_version
            .as_ref()
            .map_or(NuGetSemVerLevel::One, |n| n.sem_ver)
    }

    /// The effective assembly version, widened to four components per the
    /// configured precision. Missing pieces inherit from `version`.
    pub fn assembly_version_quad(&self, version: &SemanticVersion, height_component: u64) -> [u64; 4] {
        let (base, precision) = match &self.assembly_version {
            Some(av) => (
                av.version.clone().unwrap_or_else(|| version.clone()),
                av.precision,
            ),
            None => (version.clone(), AssemblyVersionPrecision::Minor),
        };
        let components = base.components();
        let full = [
            components.first().copied().unwrap_or(0),
            components.get(1).copied().unwrap_or(0),
            components.get(2).copied().unwrap_or(height_component),
            components.get(3).copied().unwrap_or(0),
        ];
        let keep = precision.component_count();
        std::array::from_fn(|i| if i < keep { full[i] } else { 0 })
    }
}

/// `assemblyVersion` accepts either `"M.m"` or
/// `{ "version": …, "precision": … }`.
#[derive(PartialEq, Clone, Debug)]
pub struct AssemblyVersionOptions {
    pub version: Option<SemanticVersion>,
    pub precision: AssemblyVersionPrecision,
}

impl Serialize for AssemblyVersionOptions {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AssemblyVersionDocument::Full {
            version: self.version.clone(),
            precision: self.precision,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AssemblyVersionOptions {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match AssemblyVersionDocument::deserialize(deserializer)? {
            AssemblyVersionDocument::Shorthand(version) => Ok(Self {
                version: Some(version),
                precision: AssemblyVersionPrecision::default(),
            }),
            AssemblyVersionDocument::Full { version, precision } => {
                Ok(Self { version, precision })
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AssemblyVersionDocument {
    Shorthand(SemanticVersion),
    Full {
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<SemanticVersion>,
        #[serde(default)]
        precision: AssemblyVersionPrecision,
    },
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum AssemblyVersionPrecision {
    Major,
    #[default]
    Minor,
    Build,
    Revision,
}

impl AssemblyVersionPrecision {
    pub fn component_count(self) -> usize {
        match self {
            Self::Major => 1,
            Self::Minor => 2,
            Self::Build => 3,
            Self::Revision => 4,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct NuGetPackageVersionOptions {
    pub sem_ver: NuGetSemVerLevel,
}

impl Default for NuGetPackageVersionOptions {
    fn default() -> Self {
        Self {
            sem_ver: NuGetSemVerLevel::One,
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum NuGetSemVerLevel {
    One,
    Two,
}

impl Serialize for NuGetSemVerLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            Self::One => 1,
            Self::Two => 2,
        })
    }
}

impl<'de> Deserialize<'de> for NuGetSemVerLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(serde::de::Error::custom(format!(
                "semVer must be 1 or 2, not {other}"
            ))),
        }
    }
}

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudBuildOptions {
    pub set_version_variables: bool,
    pub build_number: BuildNumberOptions,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildNumberOptions {
    pub enabled: bool,
    pub include_commit_id: IncludeCommitIdOptions,
}

#[derive(Serialize, Deserialize, Default, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct IncludeCommitIdOptions {
    pub when: IncludeCommitIdWhen,
    pub r#where: IncludeCommitIdWhere,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum IncludeCommitIdWhen {
    Always,
    #[default]
    NonPublicReleaseOnly,
    Never,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum IncludeCommitIdWhere {
    #[default]
    BuildMetadata,
    FourthVersionComponent,
}

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct ReleaseOptions {
    /// Must contain `{version}`.
    pub branch_name: String,
    pub version_increment: ReleaseVersionIncrement,
    pub first_unstable_tag: String,
    /// How many numeric components go into the branch name; `None` uses the
    /// version's own component count.
    pub version_field_count: Option<usize>,
}

impl Default for ReleaseOptions {
    fn default() -> Self {
        Self {
            branch_name: "v{version}".to_string(),
            version_increment: ReleaseVersionIncrement::Minor,
            first_unstable_tag: "alpha".to_string(),
            version_field_count: None,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum ReleaseVersionIncrement {
    Major,
    #[default]
    Minor,
    Build,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_a_full_document() {
        let doc = r#"{
            "$schema": "https://example.com/version.schema.json",
            "version": "4.8-beta.{height}",
            "assemblyVersion": { "version": "4.8", "precision": "Build" },
            "buildNumberOffset": 10,
            "semVer1NumericIdentifierPadding": 2,
            "publicReleaseRefSpec": ["^refs/heads/release$"],
            "nuGetPackageVersion": { "semVer": 2 },
            "pathFilters": [".", ":^docs"],
            "cloudBuild": {
                "setVersionVariables": true,
                "buildNumber": {
                    "enabled": true,
                    "includeCommitId": { "when": "Always", "where": "FourthVersionComponent" }
                }
            },
            "release": { "branchName": "rel/{version}", "versionIncrement": "Build", "firstUnstableTag": "rc", "versionFieldCount": 2 },
            "someUnknownField": 3
        }"#;
        let options: VersionOptions = serde_json::from_str(doc).unwrap();
        assert_eq!(options.version.as_ref().unwrap().to_string(), "4.8-beta.{height}");
        assert_eq!(options.build_number_offset, Some(10));
        assert_eq!(options.nuget_semver_or_default(), NuGetSemVerLevel::Two);
        assert_eq!(
            options.cloud_build.as_ref().unwrap().build_number.include_commit_id.r#where,
            IncludeCommitIdWhere::FourthVersionComponent
        );
        let release = options.release.as_ref().unwrap();
        assert_eq!(release.branch_name, "rel/{version}");
        assert_eq!(release.version_field_count, Some(2));
    }

    #[test]
    fn assembly_version_shorthand() {
        let options: VersionOptions =
            serde_json::from_str(r#"{ "version": "1.0", "assemblyVersion": "2.5" }"#).unwrap();
        let av = options.assembly_version.as_ref().unwrap();
        assert_eq!(av.version.as_ref().unwrap().to_string(), "2.5");
        assert_eq!(av.precision, AssemblyVersionPrecision::Minor);
    }

    #[test]
    fn invalid_version_string_fails() {
        assert!(serde_json::from_str::<VersionOptions>(r#"{ "version": "x.y" }"#).is_err());
        assert!(
            serde_json::from_str::<VersionOptions>(r#"{ "version": "1.2-a{height}" }"#).is_err()
        );
    }

    #[test]
    fn merge_fills_only_missing_fields() {
        let child: VersionOptions =
            serde_json::from_str(r#"{ "inherit": true, "version": "2.0" }"#).unwrap();
        let parent: VersionOptions = serde_json::from_str(
            r#"{ "version": "1.0", "buildNumberOffset": 5, "semVer1NumericIdentifierPadding": 3 }"#,
        )
        .unwrap();
        let merged = child.merge_from(parent);
        assert_eq!(merged.version.as_ref().unwrap().to_string(), "2.0");
        assert_eq!(merged.build_number_offset, Some(5));
        assert_eq!(merged.semver1_padding_or_default(), 3);
    }

    #[test]
    fn assembly_version_widening_respects_precision() {
        let version = SemanticVersion::parse("1.2").unwrap();
        let defaults = VersionOptions::default();
        // default precision Minor zeroes everything past major.minor
        assert_eq!(defaults.assembly_version_quad(&version, 7), [1, 2, 0, 0]);

        let options: VersionOptions = serde_json::from_str(
            r#"{ "version": "1.2", "assemblyVersion": { "precision": "Build" } }"#,
        )
        .unwrap();
        // Build precision keeps the height component
        assert_eq!(options.assembly_version_quad(&version, 7), [1, 2, 7, 0]);

        let options: VersionOptions = serde_json::from_str(
            r#"{ "version": "1.2", "assemblyVersion": { "version": "3.4.5.6", "precision": "Revision" } }"#,
        )
        .unwrap();
        assert_eq!(options.assembly_version_quad(&version, 7), [3, 4, 5, 6]);
    }

    #[test]
    fn defaults_are_applied() {
        let options = VersionOptions::default();
        assert_eq!(options.version_or_default().to_string(), "0.0");
        assert_eq!(options.build_number_offset_or_default(), 0);
        assert_eq!(options.semver1_padding_or_default(), 4);
        assert_eq!(options.nuget_semver_or_default(), NuGetSemVerLevel::One);
        assert!(options.public_release_ref_spec_or_default().is_empty());
    }
}
