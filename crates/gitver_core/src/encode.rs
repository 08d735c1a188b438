//! Stamping `(major, minor, height, commit-id-fragment)` into a four
//! component version, and recovering commits from a stamped version.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use git_store::{ObjectId, ObjectStore, ancestors};
use tracing::warn;

use crate::error::Result;
use crate::height::{HeightEngine, LineageSignature};
use crate::options::VersionOptions;
use crate::version::SemanticVersion;
use crate::version_file;

/// The largest value downstream build tooling accepts in a version
/// component.
pub const MAX_STAMP_COMPONENT: u64 = 0xFFFE;

/// The ceiling for the revision slot. Consumers read it through signed
/// 16-bit fields, so the high bit must stay clear.
pub const MAX_REVISION_COMPONENT: u64 = 0x7FFE;

/// A concrete four-component version as stamped into builds.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StampedVersion {
    pub major: u64,
    pub minor: u64,
    pub build: u64,
    pub revision: u64,
}

impl fmt::Display for StampedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for StampedVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<u64> = s
            .split('.')
            .map(|part| {
                part.parse()
                    .map_err(|_| format!("'{part}' is not a version component"))
            })
            .collect::<std::result::Result<_, _>>()?;
        if !(2..=4).contains(&parts.len()) {
            return Err(format!("'{s}' must have 2 to 4 numeric components"));
        }
        Ok(Self {
            major: parts[0],
            minor: parts[1],
            build: parts.get(2).copied().unwrap_or(0),
            revision: parts.get(3).copied().unwrap_or(0),
        })
    }
}

/// Where the height lands in the stamped version for a given configured
/// version shape.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HeightStampPosition {
    /// The `{height}` macro consumes the height; the numeric components stay
    /// as written.
    Prerelease,
    /// Two-component versions: height in the third component, commit-id
    /// fragment in the fourth.
    Third,
    /// Three-component versions: height in the fourth component; no room for
    /// a commit-id fragment.
    Fourth,
    /// Fully explicit four-component versions carry no height.
    None,
}

pub fn height_stamp_position(version: &SemanticVersion) -> HeightStampPosition {
    if version.contains_height_macro() {
        HeightStampPosition::Prerelease
    } else {
        match version.component_count() {
            0..=2 => HeightStampPosition::Third,
            3 => HeightStampPosition::Fourth,
            _ => HeightStampPosition::None,
        }
    }
}

/// The first two commit-id bytes, clamped to the revision ceiling. A stored
/// 0x7FFE therefore stands for "any fragment at or above the ceiling", which
/// decode honors.
pub fn commit_id_fragment(id: &ObjectId) -> u64 {
    u64::from(id.first_two_bytes()).min(MAX_REVISION_COMPONENT)
}

/// Clamps a stamped component to its slot's ceiling, warning when real
/// information is lost.
pub fn clamp_component(value: u64, ceiling: u64, what: &str) -> u64 {
    if value > ceiling {
        warn!(value, ceiling, what, "version component exceeds its ceiling and was clamped");
        ceiling
    } else {
        value
    }
}

/// Builds the stamped version for a configured version, a height (offset
/// already applied), and the producing commit.
pub fn encode(
    version: &SemanticVersion,
    height_with_offset: u64,
    commit: Option<&ObjectId>,
) -> StampedVersion {
    let (build, revision) = match height_stamp_position(version) {
        HeightStampPosition::Third => (
            clamp_component(height_with_offset, MAX_STAMP_COMPONENT, "build number"),
            commit.map(commit_id_fragment).unwrap_or(0),
        ),
        HeightStampPosition::Fourth => (
            version.build_component().unwrap_or(0),
            clamp_component(height_with_offset, MAX_REVISION_COMPONENT, "revision"),
        ),
        HeightStampPosition::Prerelease | HeightStampPosition::None => (
            version.build_component().unwrap_or(0),
            version.fourth_component().unwrap_or(0),
        ),
    };
    StampedVersion {
        major: version.major(),
        minor: version.minor(),
        build,
        revision,
    }
}

/// Finds the commits that a stamped version decodes back to.
///
/// Every commit reachable from HEAD is considered; a candidate must carry a
/// configuration whose `(major, minor)` matches, whose commit-id fragment
/// agrees with the stamped revision (for two-component bases), and whose
/// recomputed height plus offset equals the stamped height component.
pub fn decode(
    store: &ObjectStore,
    project_subdir: &str,
    query: &StampedVersion,
) -> Result<Vec<ObjectId>> {
    let Some(head) = store.head()?.id() else {
        return Ok(Vec::new());
    };

    let mut engines: HashMap<(LineageSignature, String), HeightEngine<'_>> = HashMap::new();
    let mut matches = Vec::new();
    for commit in ancestors(store, head) {
        let commit = commit?;
        let loaded = version_file::load_from_commit(store, &commit.id, project_subdir)?;
        let (options, scope_dir) = match loaded {
            Some(loaded) => (loaded.options, loaded.directory),
            None => (VersionOptions::default(), project_subdir.to_string()),
        };
        let version = options.version_or_default();
        if version.major() != query.major || version.minor() != query.minor {
            continue;
        }

        // the stamped slot was clamped at encoding time, so the recomputed
        // height must be clamped to the same ceiling before comparing
        let (expected_height, ceiling) = match height_stamp_position(&version) {
            HeightStampPosition::Third => {
                if commit_id_fragment(&commit.id) != query.revision {
                    continue;
                }
                (query.build, MAX_STAMP_COMPONENT)
            }
            HeightStampPosition::Fourth => {
                if version.build_component() != Some(query.build) {
                    continue;
                }
                (query.revision, MAX_REVISION_COMPONENT)
            }
            // nothing numeric to match the height against
            HeightStampPosition::Prerelease | HeightStampPosition::None => continue,
        };

        let signature = LineageSignature::of(&options);
        let engine = match engines.entry((signature, scope_dir)) {
            std::collections::hash_map::Entry::Occupied(slot) => slot.into_mut(),
            std::collections::hash_map::Entry::Vacant(slot) => {
                let scope_dir = slot.key().1.clone();
                slot.insert(HeightEngine::new(
                    store,
                    project_subdir,
                    &scope_dir,
                    &options,
                )?)
            }
        };
        let height = engine.height(&commit.id)?;
        let stamped = apply_offset(height, options.build_number_offset_or_default()).min(ceiling);
        if stamped == expected_height {
            matches.push(commit.id);
        }
    }
    Ok(matches)
}

/// Offsets may be negative; heights never go below zero.
pub fn apply_offset(height: u64, offset: i64) -> u64 {
    if offset.is_negative() {
        height.saturating_sub(offset.unsigned_abs())
    } else {
        height.saturating_add(offset.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn version(text: &str) -> SemanticVersion {
        SemanticVersion::parse(text).unwrap()
    }

    #[test]
    fn two_component_versions_stamp_height_and_fragment() {
        let id = ObjectId::from_hex("4abd456789abcdef0123456789abcdef01234567").unwrap();
        let stamped = encode(&version("5.8"), 7, Some(&id));
        assert_eq!(
            stamped,
            StampedVersion {
                major: 5,
                minor: 8,
                build: 7,
                revision: 0x4abd
            }
        );
        assert_eq!(stamped.to_string(), "5.8.7.19133");
    }

    #[test]
    fn three_component_versions_stamp_height_fourth() {
        let stamped = encode(&version("1.2.3"), 9, None);
        assert_eq!(
            stamped,
            StampedVersion {
                major: 1,
                minor: 2,
                build: 3,
                revision: 9
            }
        );
    }

    #[test]
    fn macro_versions_keep_numeric_components() {
        let stamped = encode(&version("1.2-beta.{height}"), 9, None);
        assert_eq!(stamped.build, 0);
        assert_eq!(stamped.revision, 0);
    }

    #[test]
    fn heights_clamp_at_the_ceiling() {
        let stamped = encode(&version("1.2"), 0x1_0000, None);
        assert_eq!(stamped.build, MAX_STAMP_COMPONENT);

        // the revision slot is read through signed 16-bit fields and caps
        // lower than the build slot
        let stamped = encode(&version("1.2.3"), 0x9000, None);
        assert_eq!(stamped.revision, MAX_REVISION_COMPONENT);
        let stamped = encode(&version("1.2.3"), 9, None);
        assert_eq!(stamped.revision, 9);
    }

    #[test]
    fn fragment_clamps_to_the_revision_ceiling() {
        let high_bit = ObjectId::from_hex("9f3c456789abcdef0123456789abcdef01234567").unwrap();
        assert_eq!(commit_id_fragment(&high_bit), MAX_REVISION_COMPONENT);
        let at_ceiling = ObjectId::from_hex("7ffe456789abcdef0123456789abcdef01234567").unwrap();
        assert_eq!(commit_id_fragment(&at_ceiling), MAX_REVISION_COMPONENT);
        let below = ObjectId::from_hex("7ffd456789abcdef0123456789abcdef01234567").unwrap();
        assert_eq!(commit_id_fragment(&below), 0x7ffd);
    }

    #[test]
    fn offsets_apply_in_both_directions() {
        assert_eq!(apply_offset(5, 3), 8);
        assert_eq!(apply_offset(5, -3), 2);
        assert_eq!(apply_offset(5, -9), 0);
    }

    #[test]
    fn stamped_version_parses_two_to_four_components() {
        let v: StampedVersion = "5.8.7.40764".parse().unwrap();
        assert_eq!(v.revision, 40764);
        let v: StampedVersion = "5.8".parse().unwrap();
        assert_eq!((v.build, v.revision), (0, 0));
        assert!("5".parse::<StampedVersion>().is_err());
        assert!("a.b.c".parse::<StampedVersion>().is_err());
    }

    #[test]
    fn position_follows_component_count() {
        assert_eq!(
            height_stamp_position(&version("1.2")),
            HeightStampPosition::Third
        );
        assert_eq!(
            height_stamp_position(&version("1.2.3")),
            HeightStampPosition::Fourth
        );
        assert_eq!(
            height_stamp_position(&version("1.2.3.4")),
            HeightStampPosition::None
        );
        assert_eq!(
            height_stamp_position(&version("1.2-rc.{height}")),
            HeightStampPosition::Prerelease
        );
    }
}
