use crate::EvalError;
use cask_schema::{Arch, LocalePolicy, Os, Platform, NO_AUTOBUMP_REASONS};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// What `{appdir}` expands to when computing a content hash.
pub const APPDIR_PLACEHOLDER: &str = "$APPDIR";

const DEFAULT_APPDIR: &str = "/Applications";
const DEFAULT_CASKROOM: &str = "/opt/homebrew/Caskroom";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    #[default]
    Install,
    /// Machine-specific values are replaced by fixed placeholders.
    ContentHash,
}

/// Everything an evaluation pass reads from outside the manifest.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub platform: Platform,
    pub now: DateTime<Utc>,
    pub preferred_locales: Vec<String>,
    pub allow_reassignment: bool,
    pub mode: EvaluationMode,
    pub appdir: PathBuf,
    pub caskroom: PathBuf,
    pub locale_policy: LocalePolicy,
    pub no_autobump_reasons: Vec<String>,
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new(Platform::host())
    }
}

impl EvaluationContext {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            now: Utc::now(),
            preferred_locales: Vec::new(),
            allow_reassignment: false,
            mode: EvaluationMode::Install,
            appdir: PathBuf::from(DEFAULT_APPDIR),
            caskroom: PathBuf::from(DEFAULT_CASKROOM),
            locale_policy: LocalePolicy::default(),
            no_autobump_reasons: default_no_autobump_reasons(),
        }
    }

    /// The same context aimed at another platform.
    pub fn for_platform(&self, platform: Platform) -> Self {
        Self {
            platform,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    #[must_use]
    pub fn with_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_locales = locales.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_allow_reassignment(mut self, allow: bool) -> Self {
        self.allow_reassignment = allow;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: EvaluationMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_appdir(mut self, appdir: impl Into<PathBuf>) -> Self {
        self.appdir = appdir.into();
        self
    }

    #[must_use]
    pub fn with_caskroom(mut self, caskroom: impl Into<PathBuf>) -> Self {
        self.caskroom = caskroom.into();
        self
    }

    #[must_use]
    pub fn with_locale_policy(mut self, policy: LocalePolicy) -> Self {
        self.locale_policy = policy;
        self
    }

    #[must_use]
    pub fn with_no_autobump_reasons<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.no_autobump_reasons = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn accepts_no_autobump_reason(&self, code: &str) -> bool {
        self.no_autobump_reasons.iter().any(|c| c == code)
    }

    /// Value `{appdir}` expands to in this mode.
    pub fn appdir_value(&self) -> String {
        match self.mode {
            EvaluationMode::Install => self.appdir.display().to_string(),
            EvaluationMode::ContentHash => APPDIR_PLACEHOLDER.to_owned(),
        }
    }
}

fn default_no_autobump_reasons() -> Vec<String> {
    NO_AUTOBUMP_REASONS.iter().map(|r| r.code.to_owned()).collect()
}

/// File form of an [`EvaluationContext`]. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvalConfig {
    pub os: Option<Os>,
    pub arch: Option<Arch>,
    pub now: Option<DateTime<Utc>>,
    pub languages: Vec<String>,
    pub allow_reassignment: bool,
    pub mode: EvaluationMode,
    pub appdir: Option<PathBuf>,
    pub caskroom: Option<PathBuf>,
    pub locale_policy: LocalePolicy,
    pub no_autobump_reasons: Option<Vec<String>>,
}

impl EvalConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, EvalError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, EvalError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), EvalError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Overlay `CASK_LANGUAGE` and `CASK_APPDIR` from the process environment.
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay environment-style variables from an arbitrary lookup.
    #[must_use]
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(languages) = lookup("CASK_LANGUAGE") {
            self.languages = languages
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_owned)
                .collect();
            debug!("preferred languages from environment: {:?}", self.languages);
        }
        if let Some(appdir) = lookup("CASK_APPDIR").filter(|a| !a.trim().is_empty()) {
            self.appdir = Some(PathBuf::from(appdir));
        }
        self
    }

    pub fn into_context(self) -> EvaluationContext {
        let host = Platform::host();
        let platform = Platform::new(self.os.unwrap_or(host.os), self.arch.unwrap_or(host.arch));
        let mut ctx = EvaluationContext::new(platform)
            .with_locales(self.languages)
            .with_allow_reassignment(self.allow_reassignment)
            .with_mode(self.mode)
            .with_locale_policy(self.locale_policy);
        if let Some(now) = self.now {
            ctx = ctx.with_now(now);
        }
        if let Some(appdir) = self.appdir {
            ctx = ctx.with_appdir(appdir);
        }
        if let Some(caskroom) = self.caskroom {
            ctx = ctx.with_caskroom(caskroom);
        }
        if let Some(codes) = self.no_autobump_reasons {
            ctx = ctx.with_no_autobump_reasons(codes);
        }
        ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let ctx = EvaluationContext::new(Platform::new(Os::Linux, Arch::Arm));
        assert!(!ctx.allow_reassignment);
        assert_eq!(ctx.mode, EvaluationMode::Install);
        assert!(ctx.accepts_no_autobump_reason("bumped_by_upstream"));
        assert!(!ctx.accepts_no_autobump_reason("because"));
        assert_eq!(ctx.appdir_value(), "/Applications");
    }

    #[test]
    fn content_hash_mode_uses_placeholder() {
        let ctx = EvaluationContext::default()
            .with_appdir("/Users/me/Applications")
            .with_mode(EvaluationMode::ContentHash);
        assert_eq!(ctx.appdir_value(), APPDIR_PLACEHOLDER);
    }

    #[test]
    fn for_platform_keeps_everything_else() {
        let ctx = EvaluationContext::new(Platform::new(Os::Macos, Arch::Arm)).with_locales(["fr"]);
        let other = ctx.for_platform(Platform::new(Os::Linux, Arch::Intel));
        assert_eq!(other.platform, Platform::new(Os::Linux, Arch::Intel));
        assert_eq!(other.preferred_locales, vec!["fr".to_owned()]);
        assert_eq!(other.now, ctx.now);
    }

    #[test]
    fn parses_config_file() {
        let config = EvalConfig::from_toml_str(
            r#"
os = "linux"
arch = "intel"
now = "2025-01-01T00:00:00Z"
languages = ["de-AT", "en"]
mode = "content_hash"
locale_policy = "declaration_order"
no_autobump_reasons = ["custom"]
"#,
        )
        .unwrap();
        let ctx = config.into_context();
        assert_eq!(ctx.platform, Platform::new(Os::Linux, Arch::Intel));
        assert_eq!(ctx.preferred_locales, vec!["de-AT".to_owned(), "en".to_owned()]);
        assert_eq!(ctx.mode, EvaluationMode::ContentHash);
        assert_eq!(ctx.locale_policy, LocalePolicy::DeclarationOrder);
        assert!(ctx.accepts_no_autobump_reason("custom"));
        assert!(!ctx.accepts_no_autobump_reason("bumped_by_upstream"));
        assert_eq!(ctx.now.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            EvalConfig::from_toml_str("colour = true"),
            Err(EvalError::Config(_))
        ));
    }

    #[test]
    fn env_overlay() {
        let config = EvalConfig::default().apply_vars(|key| match key {
            "CASK_LANGUAGE" => Some("fr-CA, fr ,".to_owned()),
            "CASK_APPDIR" => Some("/tmp/apps".to_owned()),
            _ => None,
        });
        assert_eq!(config.languages, vec!["fr-CA".to_owned(), "fr".to_owned()]);
        assert_eq!(config.appdir, Some(PathBuf::from("/tmp/apps")));
    }

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/eval.toml");
        let config = EvalConfig {
            os: Some(Os::Macos),
            languages: vec!["ja".to_owned()],
            allow_reassignment: true,
            ..EvalConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(EvalConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            EvalConfig::load(&dir.path().join("absent.toml")),
            Err(EvalError::Io(_))
        ));
    }
}
