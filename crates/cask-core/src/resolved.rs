use crate::context::EvaluationMode;
use crate::lifecycle::{LifecycleClock, LifecycleRecord, LifecycleStatus};
use crate::EvalError;
use cask_schema::{
    Artifact, ArtifactKind, ChecksumOrSkip, ConditionalValue, ConflictDeclaration, ContainerSpec,
    DependencyDeclaration, LanguageBlocks, LivecheckSpec, LocalePolicy, Platform, Reason, Token,
    UrlSpec,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::debug;

/// Version value that means "always the newest download".
pub const LATEST_VERSION: &str = "latest";

/// Non-fatal findings collected during evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Warning {
    UnknownStanza { name: String },
    GenericReplacement { stanza: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnknownStanza { name } => write!(f, "unknown stanza '{name}' ignored"),
            Warning::GenericReplacement { stanza } => write!(
                f,
                "'{stanza}' uses 'replacement'; use 'replacement_formula' or 'replacement_cask'"
            ),
        }
    }
}

/// Outcome of one evaluation pass. Read-only once built.
#[derive(Debug)]
pub struct ResolvedManifest {
    pub(crate) token: Token,
    pub(crate) platform: Platform,
    pub(crate) mode: EvaluationMode,
    pub(crate) now: DateTime<Utc>,
    pub(crate) caskroom: PathBuf,
    pub(crate) preferred_locales: Vec<String>,
    pub(crate) locale_policy: LocalePolicy,
    pub(crate) names: Vec<String>,
    pub(crate) desc: Option<String>,
    pub(crate) homepage: Option<String>,
    pub(crate) version: Option<String>,
    pub(crate) url: Option<UrlSpec>,
    pub(crate) container: Option<ContainerSpec>,
    pub(crate) sha256: Option<ConditionalValue<ChecksumOrSkip>>,
    pub(crate) arch: Option<ConditionalValue<String>>,
    pub(crate) os: Option<ConditionalValue<String>>,
    pub(crate) auto_updates: Option<bool>,
    pub(crate) depends_on: DependencyDeclaration,
    pub(crate) depends_on_set_in_block: bool,
    pub(crate) conflicts_with: Option<ConflictDeclaration>,
    pub(crate) language_blocks: LanguageBlocks,
    pub(crate) language: OnceLock<Option<String>>,
    pub(crate) lifecycle: LifecycleRecord,
    pub(crate) lifecycle_status: OnceLock<LifecycleStatus>,
    pub(crate) no_autobump_reason: Option<Reason>,
    pub(crate) livecheck: Option<LivecheckSpec>,
    pub(crate) caveats: Vec<String>,
    pub(crate) artifacts: Vec<Artifact>,
    pub(crate) platform_conditional: bool,
    pub(crate) warnings: Vec<Warning>,
    pub(crate) staged_path: OnceLock<PathBuf>,
}

impl ResolvedManifest {
    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn homepage(&self) -> Option<&str> {
        self.homepage.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn is_latest(&self) -> bool {
        self.version.as_deref() == Some(LATEST_VERSION)
    }

    pub fn url(&self) -> Option<&UrlSpec> {
        self.url.as_ref()
    }

    pub fn container(&self) -> Option<&ContainerSpec> {
        self.container.as_ref()
    }

    /// Checksum for the evaluated platform.
    pub fn sha256(&self) -> Option<&ChecksumOrSkip> {
        self.sha256.as_ref()?.resolve(self.platform)
    }

    /// Checksum as declared, across all platforms.
    pub fn sha256_declared(&self) -> Option<&ConditionalValue<ChecksumOrSkip>> {
        self.sha256.as_ref()
    }

    /// The `arch` stanza value for the evaluated platform.
    pub fn arch(&self) -> Option<&str> {
        self.arch.as_ref()?.resolve(self.platform).map(String::as_str)
    }

    /// The `os` stanza value for the evaluated platform.
    pub fn os(&self) -> Option<&str> {
        self.os.as_ref()?.resolve(self.platform).map(String::as_str)
    }

    pub fn auto_updates(&self) -> bool {
        self.auto_updates.unwrap_or(false)
    }

    pub fn depends_on(&self) -> &DependencyDeclaration {
        &self.depends_on
    }

    pub fn depends_on_set_in_block(&self) -> bool {
        self.depends_on_set_in_block
    }

    pub fn conflicts_with(&self) -> Option<&ConflictDeclaration> {
        self.conflicts_with.as_ref()
    }

    pub fn has_language_blocks(&self) -> bool {
        !self.language_blocks.is_empty()
    }

    /// Every declared locale tag, in declaration order.
    pub fn languages(&self) -> Vec<String> {
        self.language_blocks
            .languages()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Value of the selected language block, computed once.
    pub fn language(&self) -> Option<&str> {
        self.language
            .get_or_init(|| {
                let selected = self
                    .language_blocks
                    .select(&self.preferred_locales, self.locale_policy)
                    .ok()
                    .flatten()
                    .map(|b| b.block.call());
                debug!("{}: language resolved to {selected:?}", self.token);
                selected
            })
            .as_deref()
    }

    pub fn lifecycle(&self) -> &LifecycleRecord {
        &self.lifecycle
    }

    /// Lifecycle state at the evaluation instant, computed once.
    pub fn lifecycle_status(&self) -> &LifecycleStatus {
        self.lifecycle_status
            .get_or_init(|| self.lifecycle.status(LifecycleClock::new(self.now)))
    }

    pub fn deprecated(&self) -> bool {
        self.lifecycle_status().flags.deprecated
    }

    pub fn disabled(&self) -> bool {
        self.lifecycle_status().flags.disabled
    }

    pub fn autobump(&self) -> bool {
        self.no_autobump_reason.is_none()
    }

    pub fn no_autobump_reason(&self) -> Option<&Reason> {
        self.no_autobump_reason.as_ref()
    }

    pub fn livecheck(&self) -> Option<&LivecheckSpec> {
        self.livecheck.as_ref()
    }

    pub fn caveats(&self) -> &[String] {
        &self.caveats
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn artifact_kinds(&self) -> Vec<ArtifactKind> {
        self.artifacts.iter().map(Artifact::kind).collect()
    }

    /// Whether any OS- or architecture-scoped content was seen.
    pub fn is_platform_conditional(&self) -> bool {
        self.platform_conditional
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// `<caskroom>/<token>/<version>`, computed once.
    pub fn staged_path(&self) -> &PathBuf {
        self.staged_path.get_or_init(|| {
            self.caskroom
                .join(self.token.as_str())
                .join(self.version.as_deref().unwrap_or("unknown"))
        })
    }

    pub fn canonical_json(&self) -> Result<String, EvalError> {
        Ok(serde_json::to_string(&self.summary())?)
    }

    /// blake3 of [`Self::canonical_json`]. Only machine-independent in
    /// [`EvaluationMode::ContentHash`].
    pub fn content_hash(&self) -> Result<String, EvalError> {
        let json = self.canonical_json()?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }

    fn summary(&self) -> Summary<'_> {
        Summary {
            token: self.token.as_str(),
            platform: self.platform.to_string(),
            names: &self.names,
            desc: self.desc(),
            homepage: self.homepage(),
            version: self.version(),
            url: self.url(),
            container: self.container(),
            sha256: self.sha256(),
            arch: self.arch(),
            os: self.os(),
            auto_updates: self.auto_updates(),
            depends_on: &self.depends_on,
            conflicts_with: self.conflicts_with(),
            languages: self.languages(),
            language: self.language(),
            lifecycle: &self.lifecycle,
            no_autobump_reason: self.no_autobump_reason(),
            livecheck: self.livecheck(),
            caveats: &self.caveats,
            artifacts: &self.artifacts,
            platform_conditional: self.platform_conditional,
        }
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    token: &'a str,
    platform: String,
    names: &'a [String],
    desc: Option<&'a str>,
    homepage: Option<&'a str>,
    version: Option<&'a str>,
    url: Option<&'a UrlSpec>,
    container: Option<&'a ContainerSpec>,
    sha256: Option<&'a ChecksumOrSkip>,
    arch: Option<&'a str>,
    os: Option<&'a str>,
    auto_updates: bool,
    depends_on: &'a DependencyDeclaration,
    conflicts_with: Option<&'a ConflictDeclaration>,
    languages: Vec<String>,
    language: Option<&'a str>,
    lifecycle: &'a LifecycleRecord,
    no_autobump_reason: Option<&'a Reason>,
    livecheck: Option<&'a LivecheckSpec>,
    caveats: &'a [String],
    artifacts: &'a [Artifact],
    platform_conditional: bool,
}
