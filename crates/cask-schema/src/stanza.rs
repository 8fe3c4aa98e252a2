//! The closed set of stanzas a cask body may invoke, each with its argument
//! schema, and the event stream the evaluator consumes.

use crate::artifact::{Artifact, ArtifactKind};
use crate::checksum::ChecksumArg;
use crate::depends::{ConflictsArg, DependsOnArg};
use crate::platform::{Arch, Os, Platform};
use crate::reason::Reason;
use crate::types::StringList;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Names of the non-artifact stanzas, in the order they usually appear.
pub const STANZA_NAMES: &[&str] = &[
    "arch",
    "os",
    "version",
    "sha256",
    "language",
    "url",
    "name",
    "desc",
    "homepage",
    "livecheck",
    "no_autobump",
    "deprecate",
    "disable",
    "auto_updates",
    "conflicts_with",
    "depends_on",
    "container",
    "caveats",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stanza {
    Name(StringList),
    Desc(String),
    Homepage(String),
    Version(String),
    Url(UrlSpec),
    Container(ContainerSpec),
    Sha256(ChecksumArg),
    Arch(ArchArg),
    Os(OsArg),
    AutoUpdates(bool),
    DependsOn(DependsOnArg),
    ConflictsWith(ConflictsArg),
    Language(LanguageArg),
    Caveats(String),
    Livecheck(LivecheckSpec),
    Deprecate(LifecycleArg),
    Disable(LifecycleArg),
    NoAutobump(NoAutobumpArg),
    #[serde(skip_deserializing)]
    Artifact(Artifact),
}

/// Why a stanza value could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub stanza: String,
    pub detail: String,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for '{}': {}", self.stanza, self.detail)
    }
}

impl std::error::Error for DecodeError {}

impl Stanza {
    /// Decode one `name = value` entry. Returns `Ok(None)` for names that are
    /// neither a stanza nor an artifact kind.
    pub fn decode(name: &str, value: Value) -> Result<Option<Stanza>, DecodeError> {
        let invalid = |e: serde_json::Error| DecodeError {
            stanza: name.to_owned(),
            detail: e.to_string(),
        };
        let tagged = Value::Object(std::iter::once((name.to_owned(), value)).collect());

        if ArtifactKind::from_dsl_key(name).is_some() {
            let artifact: Artifact = serde_json::from_value(tagged).map_err(invalid)?;
            return Ok(Some(Stanza::Artifact(artifact)));
        }
        if !STANZA_NAMES.contains(&name) {
            return Ok(None);
        }
        serde_json::from_value(tagged).map(Some).map_err(invalid)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stanza::Name(_) => "name",
            Stanza::Desc(_) => "desc",
            Stanza::Homepage(_) => "homepage",
            Stanza::Version(_) => "version",
            Stanza::Url(_) => "url",
            Stanza::Container(_) => "container",
            Stanza::Sha256(_) => "sha256",
            Stanza::Arch(_) => "arch",
            Stanza::Os(_) => "os",
            Stanza::AutoUpdates(_) => "auto_updates",
            Stanza::DependsOn(_) => "depends_on",
            Stanza::ConflictsWith(_) => "conflicts_with",
            Stanza::Language(_) => "language",
            Stanza::Caveats(_) => "caveats",
            Stanza::Livecheck(_) => "livecheck",
            Stanza::Deprecate(_) => "deprecate",
            Stanza::Disable(_) => "disable",
            Stanza::NoAutobump(_) => "no_autobump",
            Stanza::Artifact(a) => a.kind().dsl_key(),
        }
    }
}

/// Download location. A bare string is the URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "UrlRepr")]
pub struct UrlSpec {
    pub uri: String,
    pub verified: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub header: Vec<String>,
    pub using: Option<String>,
}

impl UrlSpec {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            verified: None,
            user_agent: None,
            referer: None,
            header: Vec::new(),
            using: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UrlRepr {
    Uri(String),
    Full {
        uri: String,
        #[serde(default)]
        verified: Option<String>,
        #[serde(default)]
        user_agent: Option<String>,
        #[serde(default)]
        referer: Option<String>,
        #[serde(default)]
        header: StringList,
        #[serde(default)]
        using: Option<String>,
    },
}

impl From<UrlRepr> for UrlSpec {
    fn from(repr: UrlRepr) -> Self {
        match repr {
            UrlRepr::Uri(uri) => UrlSpec::new(uri),
            UrlRepr::Full {
                uri,
                verified,
                user_agent,
                referer,
                header,
                using,
            } => Self {
                uri,
                verified,
                user_agent,
                referer,
                header: header.into_vec(),
                using,
            },
        }
    }
}

/// How the downloaded file is unpacked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerSpec {
    #[serde(default)]
    pub nested: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Per-architecture strings, e.g. `{ arm = "arm64", intel = "x86_64" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchArg {
    #[serde(default)]
    pub arm: Option<String>,
    #[serde(default)]
    pub intel: Option<String>,
}

/// Per-OS strings, e.g. `{ macos = "darwin", linux = "linux" }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OsArg {
    #[serde(default)]
    pub macos: Option<String>,
    #[serde(default)]
    pub linux: Option<String>,
}

/// A language block. `value` is what `{language}` expands to when this block
/// is selected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LanguageArg {
    pub locales: StringList,
    #[serde(default)]
    pub default: bool,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LivecheckSpec {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
}

/// Arguments of `deprecate!` and `disable!`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleArg {
    pub date: String,
    pub because: Reason,
    #[serde(default)]
    pub replacement: Option<String>,
    #[serde(default)]
    pub replacement_formula: Option<String>,
    #[serde(default)]
    pub replacement_cask: Option<String>,
}

impl LifecycleArg {
    /// Number of non-blank replacement arguments supplied.
    pub fn replacement_count(&self) -> usize {
        [
            &self.replacement,
            &self.replacement_formula,
            &self.replacement_cask,
        ]
        .iter()
        .filter(|r| r.as_deref().is_some_and(|r| !r.trim().is_empty()))
        .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoAutobumpArg {
    pub because: Reason,
}

/// Guard of a platform-conditional block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Os(Os),
    Arch(Arch),
}

impl Condition {
    pub fn from_dsl_key(key: &str) -> Option<Self> {
        match key {
            "on_macos" => Some(Condition::Os(Os::Macos)),
            "on_linux" => Some(Condition::Os(Os::Linux)),
            "on_arm" => Some(Condition::Arch(Arch::Arm)),
            "on_intel" => Some(Condition::Arch(Arch::Intel)),
            _ => None,
        }
    }

    pub fn dsl_key(self) -> &'static str {
        match self {
            Condition::Os(Os::Macos) => "on_macos",
            Condition::Os(Os::Linux) => "on_linux",
            Condition::Arch(Arch::Arm) => "on_arm",
            Condition::Arch(Arch::Intel) => "on_intel",
        }
    }

    pub fn matches(self, platform: Platform) -> bool {
        match self {
            Condition::Os(os) => platform.os == os,
            Condition::Arch(arch) => platform.arch == arch,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dsl_key())
    }
}

/// One step of a cask body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Stanza(Stanza),
    Unknown { name: String },
    EnterConditional(Condition),
    ExitConditional,
}
