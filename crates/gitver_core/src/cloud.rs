//! Cloud build collaborators: an explicit environment snapshot instead of
//! process-global reads, provider detection, and the provider-specific
//! command lines that publish build numbers and variables.

use std::cell::RefCell;
use std::collections::BTreeMap;

use tracing::debug;

/// Everything the oracle may observe about the hosting build environment.
///
/// Constructed once at the entry point and passed down; nothing in the core
/// reads `std::env` directly. With `capture` set, emitted command lines land
/// in an in-memory buffer instead of stdout so tests can assert on them.
#[derive(Debug)]
pub struct BuildContext {
    env: BTreeMap<String, String>,
    capture: bool,
    captured: RefCell<String>,
}

impl BuildContext {
    pub fn from_process_env() -> Self {
        Self {
            env: std::env::vars().collect(),
            capture: false,
            captured: RefCell::new(String::new()),
        }
    }

    /// A context with a fixed environment whose output is captured.
    pub fn for_testing<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            env: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            capture: true,
            captured: RefCell::new(String::new()),
        }
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    fn env_is(&self, key: &str, value: &str) -> bool {
        self.env(key).is_some_and(|v| v.eq_ignore_ascii_case(value))
    }

    fn emit_line(&self, line: &str) {
        if self.capture {
            let mut captured = self.captured.borrow_mut();
            captured.push_str(line);
            captured.push('\n');
        } else {
            println!("{line}");
        }
    }

    /// Appends to the file named by `env_key`, or falls back to emitting the
    /// line. GitHub Actions publishes variables through such a file.
    fn emit_to_env_file(&self, env_key: &str, line: &str) {
        if self.capture {
            self.emit_line(line);
            return;
        }
        if let Some(path) = self.env(env_key) {
            use std::io::Write;
            let appended = std::fs::OpenOptions::new()
                .append(true)
                .open(path)
                .and_then(|mut file| writeln!(file, "{line}"));
            if appended.is_ok() {
                return;
            }
        }
        self.emit_line(line);
    }

    pub fn captured(&self) -> String {
        self.captured.borrow().clone()
    }
}

/// The hosted build services this tool understands. Detection sniffs the
/// environment variables each service defines.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CloudProvider {
    AppVeyor,
    AzurePipelines,
    GitHubActions,
    TeamCity,
    GitLab,
    Jenkins,
    Travis,
}

impl CloudProvider {
    pub fn detect(ctx: &BuildContext) -> Option<Self> {
        let provider = if ctx.env_is("APPVEYOR", "true") {
            Self::AppVeyor
        } else if ctx.env_is("TF_BUILD", "true") {
            Self::AzurePipelines
        } else if ctx.env_is("GITHUB_ACTIONS", "true") {
            Self::GitHubActions
        } else if ctx.env("TEAMCITY_VERSION").is_some() {
            Self::TeamCity
        } else if ctx.env_is("GITLAB_CI", "true") {
            Self::GitLab
        } else if ctx.env("JENKINS_URL").is_some() {
            Self::Jenkins
        } else if ctx.env_is("TRAVIS", "true") {
            Self::Travis
        } else {
            return None;
        };
        debug!(?provider, "detected cloud build service");
        Some(provider)
    }

    /// The ref the service says it is building, canonicalized to `refs/…`.
    pub fn building_ref(self, ctx: &BuildContext) -> Option<String> {
        match self {
            Self::AppVeyor => ctx.env("APPVEYOR_REPO_BRANCH").map(canonical_branch),
            Self::AzurePipelines => ctx.env("BUILD_SOURCEBRANCH").map(str::to_string),
            Self::GitHubActions => ctx.env("GITHUB_REF").map(str::to_string),
            Self::TeamCity => ctx.env("BUILD_VCS_BRANCH").map(str::to_string),
            Self::GitLab => ctx.env("CI_COMMIT_REF_NAME").map(canonical_branch),
            Self::Jenkins => ctx.env("GIT_BRANCH").map(canonical_branch),
            Self::Travis => ctx.env("TRAVIS_BRANCH").map(canonical_branch),
        }
    }

    /// Publishes the build number to the service log.
    pub fn emit_build_number(self, ctx: &BuildContext, build_number: &str) {
        match self {
            Self::AppVeyor => {
                ctx.emit_line(&format!("appveyor UpdateBuild -Version \"{build_number}\""));
            }
            Self::AzurePipelines => {
                ctx.emit_line(&format!("##vso[build.updatebuildnumber]{build_number}"));
            }
            Self::TeamCity => {
                ctx.emit_line(&format!("##teamcity[buildNumber '{build_number}']"));
            }
            // these services take the build number from the environment or
            // have no updatable build number at all
            Self::GitHubActions | Self::GitLab | Self::Jenkins | Self::Travis => {
                ctx.emit_line(&format!("BUILD_NUMBER={build_number}"));
            }
        }
    }

    /// Publishes one build variable.
    pub fn emit_variable(self, ctx: &BuildContext, key: &str, value: &str) {
        match self {
            Self::AppVeyor => {
                ctx.emit_line(&format!("appveyor SetVariable -Name {key} -Value \"{value}\""));
            }
            Self::AzurePipelines => {
                ctx.emit_line(&format!("##vso[task.setvariable variable={key};]{value}"));
            }
            Self::GitHubActions => {
                ctx.emit_to_env_file("GITHUB_ENV", &format!("{key}={value}"));
            }
            Self::TeamCity => {
                ctx.emit_line(&format!("##teamcity[setParameter name='{key}' value='{value}']"));
            }
            Self::GitLab | Self::Jenkins | Self::Travis => {
                ctx.emit_line(&format!("{key}={value}"));
            }
        }
    }
}

fn canonical_branch(branch: &str) -> String {
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{branch}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn detects_nothing_on_a_bare_environment() {
        let ctx = BuildContext::for_testing(Vec::<(String, String)>::new());
        assert_eq!(CloudProvider::detect(&ctx), None);
    }

    #[test]
    fn detects_azure_pipelines_and_its_ref() {
        let ctx = BuildContext::for_testing([
            ("TF_BUILD", "True"),
            ("BUILD_SOURCEBRANCH", "refs/heads/release"),
        ]);
        let provider = CloudProvider::detect(&ctx).unwrap();
        assert_eq!(provider, CloudProvider::AzurePipelines);
        assert_eq!(
            provider.building_ref(&ctx).as_deref(),
            Some("refs/heads/release")
        );
    }

    #[test]
    fn short_branch_names_are_canonicalized() {
        let ctx = BuildContext::for_testing([("GITLAB_CI", "true"), ("CI_COMMIT_REF_NAME", "main")]);
        let provider = CloudProvider::detect(&ctx).unwrap();
        assert_eq!(
            provider.building_ref(&ctx).as_deref(),
            Some("refs/heads/main")
        );
    }

    #[test]
    fn azure_command_lines() {
        let ctx = BuildContext::for_testing([("TF_BUILD", "True")]);
        let provider = CloudProvider::AzurePipelines;
        provider.emit_build_number(&ctx, "1.2.3");
        provider.emit_variable(&ctx, "GitVersionHeight", "3");
        assert_eq!(
            ctx.captured(),
            "##vso[build.updatebuildnumber]1.2.3\n##vso[task.setvariable variable=GitVersionHeight;]3\n"
        );
    }

    #[test]
    fn teamcity_escapes_nothing_but_uses_service_messages() {
        let ctx = BuildContext::for_testing([("TEAMCITY_VERSION", "2024.1")]);
        let provider = CloudProvider::detect(&ctx).unwrap();
        assert_eq!(provider, CloudProvider::TeamCity);
        provider.emit_build_number(&ctx, "9");
        assert_eq!(ctx.captured(), "##teamcity[buildNumber '9']\n");
    }

    #[test]
    fn github_variables_are_key_value_lines() {
        let ctx = BuildContext::for_testing([("GITHUB_ACTIONS", "true")]);
        let provider = CloudProvider::detect(&ctx).unwrap();
        provider.emit_variable(&ctx, "SemVer2", "1.2.3-rc.1");
        assert_eq!(ctx.captured(), "SemVer2=1.2.3-rc.1\n");
    }
}
