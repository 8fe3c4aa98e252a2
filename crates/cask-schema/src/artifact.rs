//! The closed set of artifact kinds a cask may declare, with per-kind argument
//! schemas.

use crate::types::StringList;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArtifactError {
    #[error("'{0}' path must not be empty")]
    EmptyPath(ArtifactKind),
    #[error("'artifact' requires an explicit target")]
    MissingTarget,
    #[error("'stage_only' must be true")]
    StageOnlyFalse,
    #[error("'{0}' requires at least one directive")]
    NoDirectives(ArtifactKind),
    #[error("'{0}' script executable must not be empty")]
    EmptyExecutable(ArtifactKind),
}

/// Every artifact kind. Ordinary kinds participate in the stage-only
/// exclusivity rule; hook blocks do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Installer,
    App,
    Artifact,
    AudioUnitPlugin,
    Binary,
    Colorpicker,
    Dictionary,
    Font,
    InputMethod,
    InternetPlugin,
    KeyboardLayout,
    Manpage,
    Pkg,
    Prefpane,
    Qlplugin,
    Mdimporter,
    ScreenSaver,
    Service,
    StageOnly,
    Suite,
    VstPlugin,
    Vst3Plugin,
    ZshCompletion,
    FishCompletion,
    BashCompletion,
    Uninstall,
    Zap,
    Preflight,
    Postflight,
    UninstallPreflight,
    UninstallPostflight,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 31] = [
        ArtifactKind::Installer,
        ArtifactKind::App,
        ArtifactKind::Artifact,
        ArtifactKind::AudioUnitPlugin,
        ArtifactKind::Binary,
        ArtifactKind::Colorpicker,
        ArtifactKind::Dictionary,
        ArtifactKind::Font,
        ArtifactKind::InputMethod,
        ArtifactKind::InternetPlugin,
        ArtifactKind::KeyboardLayout,
        ArtifactKind::Manpage,
        ArtifactKind::Pkg,
        ArtifactKind::Prefpane,
        ArtifactKind::Qlplugin,
        ArtifactKind::Mdimporter,
        ArtifactKind::ScreenSaver,
        ArtifactKind::Service,
        ArtifactKind::StageOnly,
        ArtifactKind::Suite,
        ArtifactKind::VstPlugin,
        ArtifactKind::Vst3Plugin,
        ArtifactKind::ZshCompletion,
        ArtifactKind::FishCompletion,
        ArtifactKind::BashCompletion,
        ArtifactKind::Uninstall,
        ArtifactKind::Zap,
        ArtifactKind::Preflight,
        ArtifactKind::Postflight,
        ArtifactKind::UninstallPreflight,
        ArtifactKind::UninstallPostflight,
    ];

    /// Stanza name used to declare this kind.
    pub fn dsl_key(self) -> &'static str {
        match self {
            ArtifactKind::Installer => "installer",
            ArtifactKind::App => "app",
            ArtifactKind::Artifact => "artifact",
            ArtifactKind::AudioUnitPlugin => "audio_unit_plugin",
            ArtifactKind::Binary => "binary",
            ArtifactKind::Colorpicker => "colorpicker",
            ArtifactKind::Dictionary => "dictionary",
            ArtifactKind::Font => "font",
            ArtifactKind::InputMethod => "input_method",
            ArtifactKind::InternetPlugin => "internet_plugin",
            ArtifactKind::KeyboardLayout => "keyboard_layout",
            ArtifactKind::Manpage => "manpage",
            ArtifactKind::Pkg => "pkg",
            ArtifactKind::Prefpane => "prefpane",
            ArtifactKind::Qlplugin => "qlplugin",
            ArtifactKind::Mdimporter => "mdimporter",
            ArtifactKind::ScreenSaver => "screen_saver",
            ArtifactKind::Service => "service",
            ArtifactKind::StageOnly => "stage_only",
            ArtifactKind::Suite => "suite",
            ArtifactKind::VstPlugin => "vst_plugin",
            ArtifactKind::Vst3Plugin => "vst3_plugin",
            ArtifactKind::ZshCompletion => "zsh_completion",
            ArtifactKind::FishCompletion => "fish_completion",
            ArtifactKind::BashCompletion => "bash_completion",
            ArtifactKind::Uninstall => "uninstall",
            ArtifactKind::Zap => "zap",
            ArtifactKind::Preflight => "preflight",
            ArtifactKind::Postflight => "postflight",
            ArtifactKind::UninstallPreflight => "uninstall_preflight",
            ArtifactKind::UninstallPostflight => "uninstall_postflight",
        }
    }

    pub fn from_dsl_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.dsl_key() == key)
    }

    /// Hook blocks are not ordinary artifacts.
    pub fn is_ordinary(self) -> bool {
        !matches!(
            self,
            ArtifactKind::Preflight
                | ArtifactKind::Postflight
                | ArtifactKind::UninstallPreflight
                | ArtifactKind::UninstallPostflight
        )
    }

    /// Every ordinary kind except `stage_only`.
    pub fn is_activatable(self) -> bool {
        self.is_ordinary() && self != ArtifactKind::StageOnly
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dsl_key())
    }
}

/// A source path inside the staged download, optionally moved to a new name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RelocationRepr")]
pub struct Relocation {
    pub source: String,
    pub target: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RelocationRepr {
    Source(String),
    Full {
        source: String,
        #[serde(default)]
        target: Option<String>,
    },
}

impl From<RelocationRepr> for Relocation {
    fn from(repr: RelocationRepr) -> Self {
        match repr {
            RelocationRepr::Source(source) => Self {
                source,
                target: None,
            },
            RelocationRepr::Full { source, target } => Self { source, target },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PkgRepr")]
pub struct PkgSpec {
    pub path: String,
    pub allow_untrusted: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PkgRepr {
    Path(String),
    Full {
        path: String,
        #[serde(default)]
        allow_untrusted: bool,
    },
}

impl From<PkgRepr> for PkgSpec {
    fn from(repr: PkgRepr) -> Self {
        match repr {
            PkgRepr::Path(path) => Self {
                path,
                allow_untrusted: false,
            },
            PkgRepr::Full {
                path,
                allow_untrusted,
            } => Self {
                path,
                allow_untrusted,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptSpec {
    pub executable: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub sudo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallerSpec {
    /// An installer the user has to run by hand.
    Manual(String),
    Script(ScriptSpec),
}

/// Directives shared by `uninstall` and `zap`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UninstallDirectives {
    #[serde(default)]
    pub early_script: Option<ScriptSpec>,
    #[serde(default)]
    pub launchctl: StringList,
    #[serde(default)]
    pub quit: StringList,
    #[serde(default)]
    pub signal: StringList,
    #[serde(default)]
    pub login_item: StringList,
    #[serde(default)]
    pub kext: StringList,
    #[serde(default)]
    pub script: Option<ScriptSpec>,
    #[serde(default)]
    pub pkgutil: StringList,
    #[serde(default)]
    pub delete: StringList,
    #[serde(default)]
    pub trash: StringList,
    #[serde(default)]
    pub rmdir: StringList,
}

impl UninstallDirectives {
    pub fn is_empty(&self) -> bool {
        self.early_script.is_none()
            && self.script.is_none()
            && [
                &self.launchctl,
                &self.quit,
                &self.signal,
                &self.login_item,
                &self.kext,
                &self.pkgutil,
                &self.delete,
                &self.trash,
                &self.rmdir,
            ]
            .iter()
            .all(|list| list.is_empty())
    }

    fn scripts(&self) -> impl Iterator<Item = &ScriptSpec> {
        self.early_script.iter().chain(self.script.iter())
    }
}

/// A declared artifact. The variant is the kind; each kind carries its own
/// argument schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Installer(InstallerSpec),
    App(Relocation),
    Artifact(Relocation),
    AudioUnitPlugin(Relocation),
    Binary(Relocation),
    Colorpicker(Relocation),
    Dictionary(Relocation),
    Font(Relocation),
    InputMethod(Relocation),
    InternetPlugin(Relocation),
    KeyboardLayout(Relocation),
    Manpage(Relocation),
    Pkg(PkgSpec),
    Prefpane(Relocation),
    Qlplugin(Relocation),
    Mdimporter(Relocation),
    ScreenSaver(Relocation),
    Service(String),
    StageOnly(bool),
    Suite(Relocation),
    VstPlugin(Relocation),
    Vst3Plugin(Relocation),
    ZshCompletion(Relocation),
    FishCompletion(Relocation),
    BashCompletion(Relocation),
    Uninstall(UninstallDirectives),
    Zap(UninstallDirectives),
    Preflight(String),
    Postflight(String),
    UninstallPreflight(String),
    UninstallPostflight(String),
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Installer(_) => ArtifactKind::Installer,
            Artifact::App(_) => ArtifactKind::App,
            Artifact::Artifact(_) => ArtifactKind::Artifact,
            Artifact::AudioUnitPlugin(_) => ArtifactKind::AudioUnitPlugin,
            Artifact::Binary(_) => ArtifactKind::Binary,
            Artifact::Colorpicker(_) => ArtifactKind::Colorpicker,
            Artifact::Dictionary(_) => ArtifactKind::Dictionary,
            Artifact::Font(_) => ArtifactKind::Font,
            Artifact::InputMethod(_) => ArtifactKind::InputMethod,
            Artifact::InternetPlugin(_) => ArtifactKind::InternetPlugin,
            Artifact::KeyboardLayout(_) => ArtifactKind::KeyboardLayout,
            Artifact::Manpage(_) => ArtifactKind::Manpage,
            Artifact::Pkg(_) => ArtifactKind::Pkg,
            Artifact::Prefpane(_) => ArtifactKind::Prefpane,
            Artifact::Qlplugin(_) => ArtifactKind::Qlplugin,
            Artifact::Mdimporter(_) => ArtifactKind::Mdimporter,
            Artifact::ScreenSaver(_) => ArtifactKind::ScreenSaver,
            Artifact::Service(_) => ArtifactKind::Service,
            Artifact::StageOnly(_) => ArtifactKind::StageOnly,
            Artifact::Suite(_) => ArtifactKind::Suite,
            Artifact::VstPlugin(_) => ArtifactKind::VstPlugin,
            Artifact::Vst3Plugin(_) => ArtifactKind::Vst3Plugin,
            Artifact::ZshCompletion(_) => ArtifactKind::ZshCompletion,
            Artifact::FishCompletion(_) => ArtifactKind::FishCompletion,
            Artifact::BashCompletion(_) => ArtifactKind::BashCompletion,
            Artifact::Uninstall(_) => ArtifactKind::Uninstall,
            Artifact::Zap(_) => ArtifactKind::Zap,
            Artifact::Preflight(_) => ArtifactKind::Preflight,
            Artifact::Postflight(_) => ArtifactKind::Postflight,
            Artifact::UninstallPreflight(_) => ArtifactKind::UninstallPreflight,
            Artifact::UninstallPostflight(_) => ArtifactKind::UninstallPostflight,
        }
    }

    fn relocation(&self) -> Option<&Relocation> {
        match self {
            Artifact::App(r)
            | Artifact::Artifact(r)
            | Artifact::AudioUnitPlugin(r)
            | Artifact::Binary(r)
            | Artifact::Colorpicker(r)
            | Artifact::Dictionary(r)
            | Artifact::Font(r)
            | Artifact::InputMethod(r)
            | Artifact::InternetPlugin(r)
            | Artifact::KeyboardLayout(r)
            | Artifact::Manpage(r)
            | Artifact::Prefpane(r)
            | Artifact::Qlplugin(r)
            | Artifact::Mdimporter(r)
            | Artifact::ScreenSaver(r)
            | Artifact::Suite(r)
            | Artifact::VstPlugin(r)
            | Artifact::Vst3Plugin(r)
            | Artifact::ZshCompletion(r)
            | Artifact::FishCompletion(r)
            | Artifact::BashCompletion(r) => Some(r),
            _ => None,
        }
    }

    /// Check the arguments against the kind's schema.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let kind = self.kind();
        if let Some(r) = self.relocation() {
            if r.source.trim().is_empty() {
                return Err(ArtifactError::EmptyPath(kind));
            }
            if r.target.as_deref().is_some_and(|t| t.trim().is_empty()) {
                return Err(ArtifactError::EmptyPath(kind));
            }
            if kind == ArtifactKind::Artifact && r.target.is_none() {
                return Err(ArtifactError::MissingTarget);
            }
            return Ok(());
        }

        match self {
            Artifact::Pkg(spec) if spec.path.trim().is_empty() => Err(ArtifactError::EmptyPath(kind)),
            Artifact::Installer(InstallerSpec::Manual(path)) if path.trim().is_empty() => {
                Err(ArtifactError::EmptyPath(kind))
            }
            Artifact::Installer(InstallerSpec::Script(script))
                if script.executable.trim().is_empty() =>
            {
                Err(ArtifactError::EmptyExecutable(kind))
            }
            Artifact::Service(name) if name.trim().is_empty() => Err(ArtifactError::EmptyPath(kind)),
            Artifact::StageOnly(false) => Err(ArtifactError::StageOnlyFalse),
            Artifact::Uninstall(d) | Artifact::Zap(d) => {
                if d.is_empty() {
                    return Err(ArtifactError::NoDirectives(kind));
                }
                if d.scripts().any(|s| s.executable.trim().is_empty()) {
                    return Err(ArtifactError::EmptyExecutable(kind));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Path-like strings that may contain placeholders.
    pub fn paths_mut(&mut self) -> Vec<&mut String> {
        match self {
            Artifact::App(r)
            | Artifact::Artifact(r)
            | Artifact::AudioUnitPlugin(r)
            | Artifact::Binary(r)
            | Artifact::Colorpicker(r)
            | Artifact::Dictionary(r)
            | Artifact::Font(r)
            | Artifact::InputMethod(r)
            | Artifact::InternetPlugin(r)
            | Artifact::KeyboardLayout(r)
            | Artifact::Manpage(r)
            | Artifact::Prefpane(r)
            | Artifact::Qlplugin(r)
            | Artifact::Mdimporter(r)
            | Artifact::ScreenSaver(r)
            | Artifact::Suite(r)
            | Artifact::VstPlugin(r)
            | Artifact::Vst3Plugin(r)
            | Artifact::ZshCompletion(r)
            | Artifact::FishCompletion(r)
            | Artifact::BashCompletion(r) => {
                let mut paths = vec![&mut r.source];
                paths.extend(r.target.as_mut());
                paths
            }
            Artifact::Pkg(spec) => vec![&mut spec.path],
            Artifact::Installer(InstallerSpec::Manual(path)) => vec![path],
            Artifact::Installer(InstallerSpec::Script(script)) => vec![&mut script.executable],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsl_keys_round_trip() {
        for kind in ArtifactKind::ALL {
            assert_eq!(ArtifactKind::from_dsl_key(kind.dsl_key()), Some(kind));
        }
        assert_eq!(ArtifactKind::from_dsl_key("desc"), None);
    }

    #[test]
    fn dsl_keys_match_serde_names() {
        for kind in ArtifactKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.dsl_key()));
        }
    }

    #[test]
    fn stage_only_is_ordinary_but_not_activatable() {
        assert!(ArtifactKind::StageOnly.is_ordinary());
        assert!(!ArtifactKind::StageOnly.is_activatable());
        assert!(ArtifactKind::App.is_activatable());
        assert!(ArtifactKind::Zap.is_activatable());
        assert!(!ArtifactKind::Preflight.is_ordinary());
        assert!(!ArtifactKind::Postflight.is_activatable());
    }

    #[test]
    fn relocation_accepts_bare_source() {
        let a: Artifact = serde_json::from_str(r#"{"app": "Firefox.app"}"#).unwrap();
        assert_eq!(
            a,
            Artifact::App(Relocation {
                source: "Firefox.app".to_owned(),
                target: None,
            })
        );
        assert_eq!(a.kind(), ArtifactKind::App);
    }

    #[test]
    fn relocation_accepts_target() {
        let a: Artifact = serde_json::from_str(
            r#"{"binary": {"source": "bin/tool", "target": "tool-cli"}}"#,
        )
        .unwrap();
        assert!(a.validate().is_ok());
    }

    #[test]
    fn generic_artifact_requires_target() {
        let a: Artifact = serde_json::from_str(r#"{"artifact": "Thing"}"#).unwrap();
        assert_eq!(a.validate(), Err(ArtifactError::MissingTarget));
    }

    #[test]
    fn empty_source_is_rejected() {
        let a: Artifact = serde_json::from_str(r#"{"font": "  "}"#).unwrap();
        assert_eq!(a.validate(), Err(ArtifactError::EmptyPath(ArtifactKind::Font)));
    }

    #[test]
    fn stage_only_must_be_true() {
        assert_eq!(
            Artifact::StageOnly(false).validate(),
            Err(ArtifactError::StageOnlyFalse)
        );
        assert!(Artifact::StageOnly(true).validate().is_ok());
    }

    #[test]
    fn zap_requires_directives() {
        let a: Artifact = serde_json::from_str(r#"{"zap": {}}"#).unwrap();
        assert_eq!(a.validate(), Err(ArtifactError::NoDirectives(ArtifactKind::Zap)));

        let a: Artifact =
            serde_json::from_str(r#"{"zap": {"trash": "~/Library/Caches/foo"}}"#).unwrap();
        assert!(a.validate().is_ok());
    }

    #[test]
    fn uninstall_rejects_unknown_directive() {
        let r: Result<Artifact, _> = serde_json::from_str(r#"{"uninstall": {"explode": "now"}}"#);
        assert!(r.is_err());
    }

    #[test]
    fn pkg_accepts_options() {
        let a: Artifact =
            serde_json::from_str(r#"{"pkg": {"path": "Install.pkg", "allow_untrusted": true}}"#)
                .unwrap();
        let Artifact::Pkg(spec) = a else {
            panic!("expected pkg");
        };
        assert!(spec.allow_untrusted);
    }

    #[test]
    fn installer_script_requires_executable() {
        let a: Artifact =
            serde_json::from_str(r#"{"installer": {"script": {"executable": ""}}}"#).unwrap();
        assert_eq!(
            a.validate(),
            Err(ArtifactError::EmptyExecutable(ArtifactKind::Installer))
        );
    }

    #[test]
    fn paths_mut_exposes_source_and_target() {
        let mut a = Artifact::Suite(Relocation {
            source: "a".to_owned(),
            target: Some("b".to_owned()),
        });
        assert_eq!(a.paths_mut().len(), 2);
        assert!(Artifact::Service("x".to_owned()).paths_mut().is_empty());
    }
}
