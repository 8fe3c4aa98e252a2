//! Dependency and conflict declarations.

use crate::platform::Arch;
use crate::types::{FormulaName, StringList, Token};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DependsError {
    #[error("'depends_on' requires at least one of formula, cask, macos or arch")]
    Empty,
    #[error("unknown architecture '{0}', expected arm64 or x86_64")]
    UnknownArch(String),
    #[error("unknown macOS version '{0}'")]
    UnknownMacos(String),
    #[error("invalid macOS requirement '{0}'")]
    InvalidMacosRequirement(String),
    #[error("only a single 'depends_on macos' is allowed")]
    MacosAlreadySpecified,
    #[error("'conflicts_with' requires at least one of cask or formula")]
    EmptyConflicts,
}

/// Named macOS releases, newest first.
pub const MACOS_RELEASES: &[(&str, MacosVersion)] = &[
    ("tahoe", MacosVersion::new(26, 0)),
    ("sequoia", MacosVersion::new(15, 0)),
    ("sonoma", MacosVersion::new(14, 0)),
    ("ventura", MacosVersion::new(13, 0)),
    ("monterey", MacosVersion::new(12, 0)),
    ("big_sur", MacosVersion::new(11, 0)),
    ("catalina", MacosVersion::new(10, 15)),
    ("mojave", MacosVersion::new(10, 14)),
    ("high_sierra", MacosVersion::new(10, 13)),
    ("sierra", MacosVersion::new(10, 12)),
    ("el_capitan", MacosVersion::new(10, 11)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MacosVersion {
    pub major: u16,
    pub minor: u16,
}

impl MacosVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    /// Parse a release name (`big_sur`) or a numeric version (`11`, `10.15`).
    pub fn parse(input: &str) -> Result<Self, DependsError> {
        let input = input.trim();
        if let Some((_, v)) = MACOS_RELEASES.iter().find(|(name, _)| *name == input) {
            return Ok(*v);
        }
        let unknown = || DependsError::UnknownMacos(input.to_owned());
        let (major, minor) = match input.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (input, "0"),
        };
        let major = major.parse::<u16>().map_err(|_| unknown())?;
        let minor = minor.parse::<u16>().map_err(|_| unknown())?;
        let version = MacosVersion::new(major, minor);
        if MACOS_RELEASES.iter().any(|(_, v)| *v == version) {
            Ok(version)
        } else {
            Err(unknown())
        }
    }

    pub fn name(self) -> Option<&'static str> {
        MACOS_RELEASES
            .iter()
            .find(|(_, v)| *v == self)
            .map(|(name, _)| *name)
    }
}

impl fmt::Display for MacosVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.major >= 11 && self.minor == 0 {
            write!(f, "{}", self.major)
        } else {
            write!(f, "{}.{}", self.major, self.minor)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparator {
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
}

impl Comparator {
    fn split(input: &str) -> Option<(Self, &str)> {
        const OPS: [(&str, Comparator); 5] = [
            (">=", Comparator::Ge),
            ("<=", Comparator::Le),
            ("==", Comparator::Eq),
            (">", Comparator::Gt),
            ("<", Comparator::Lt),
        ];
        OPS.iter()
            .find_map(|(op, c)| input.strip_prefix(op).map(|rest| (*c, rest)))
    }

    pub fn accepts(self, host: MacosVersion, required: MacosVersion) -> bool {
        match self {
            Comparator::Ge => host >= required,
            Comparator::Gt => host > required,
            Comparator::Le => host <= required,
            Comparator::Lt => host < required,
            Comparator::Eq => host == required,
        }
    }
}

/// A `depends_on macos:` requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MacosRequirement {
    Compare {
        comparator: Comparator,
        version: MacosVersion,
    },
    AnyOf(Vec<MacosVersion>),
}

impl MacosRequirement {
    /// `">= big_sur"` is a comparison; a bare release or a list of releases
    /// is an exact set.
    pub fn parse(values: &[String]) -> Result<Self, DependsError> {
        if let [single] = values {
            if let Some((comparator, rest)) = Comparator::split(single.trim()) {
                let version = MacosVersion::parse(rest)
                    .map_err(|_| DependsError::InvalidMacosRequirement(single.clone()))?;
                return Ok(MacosRequirement::Compare {
                    comparator,
                    version,
                });
            }
        }
        if values.is_empty() {
            return Err(DependsError::InvalidMacosRequirement(String::new()));
        }
        let versions = values
            .iter()
            .map(|v| MacosVersion::parse(v))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(MacosRequirement::AnyOf(versions))
    }

    pub fn is_satisfied_by(&self, host: MacosVersion) -> bool {
        match self {
            MacosRequirement::Compare {
                comparator,
                version,
            } => comparator.accepts(host, *version),
            MacosRequirement::AnyOf(versions) => versions.contains(&host),
        }
    }
}

/// Arguments of one `depends_on` stanza.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependsOnArg {
    #[serde(default)]
    pub formula: StringList,
    #[serde(default)]
    pub cask: StringList,
    #[serde(default)]
    pub macos: Option<StringList>,
    #[serde(default)]
    pub arch: StringList,
}

/// Accumulated `depends_on` declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyDeclaration {
    pub formulae: Vec<FormulaName>,
    pub casks: Vec<Token>,
    pub macos: Option<MacosRequirement>,
    pub arch: Vec<Arch>,
}

impl DependencyDeclaration {
    pub fn is_empty(&self) -> bool {
        self.formulae.is_empty() && self.casks.is_empty() && self.macos.is_none() && self.arch.is_empty()
    }

    /// Merge one `depends_on` stanza into the accumulated declaration. The
    /// declaration is left untouched when the stanza is invalid.
    pub fn load(&mut self, arg: DependsOnArg) -> Result<(), DependsError> {
        if arg.formula.is_empty() && arg.cask.is_empty() && arg.macos.is_none() && arg.arch.is_empty() {
            return Err(DependsError::Empty);
        }

        let macos = match &arg.macos {
            Some(_) if self.macos.is_some() => return Err(DependsError::MacosAlreadySpecified),
            Some(values) => Some(MacosRequirement::parse(values.as_slice())?),
            None => None,
        };
        let arches = arg
            .arch
            .as_slice()
            .iter()
            .map(|a| parse_dependency_arch(a))
            .collect::<Result<Vec<_>, _>>()?;

        for formula in arg.formula.into_vec() {
            let formula = FormulaName::new(formula);
            if !self.formulae.contains(&formula) {
                self.formulae.push(formula);
            }
        }
        for cask in arg.cask.into_vec() {
            let cask = Token::new(cask);
            if !self.casks.contains(&cask) {
                self.casks.push(cask);
            }
        }
        if macos.is_some() {
            self.macos = macos;
        }
        for arch in arches {
            if !self.arch.contains(&arch) {
                self.arch.push(arch);
            }
        }
        Ok(())
    }
}

fn parse_dependency_arch(value: &str) -> Result<Arch, DependsError> {
    match value.trim() {
        "arm64" | "arm" => Ok(Arch::Arm),
        "x86_64" | "intel" => Ok(Arch::Intel),
        other => Err(DependsError::UnknownArch(other.to_owned())),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConflictsArg {
    #[serde(default)]
    pub cask: StringList,
    #[serde(default)]
    pub formula: StringList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictDeclaration {
    pub casks: Vec<Token>,
    pub formulae: Vec<FormulaName>,
}

impl TryFrom<ConflictsArg> for ConflictDeclaration {
    type Error = DependsError;

    fn try_from(arg: ConflictsArg) -> Result<Self, Self::Error> {
        if arg.cask.is_empty() && arg.formula.is_empty() {
            return Err(DependsError::EmptyConflicts);
        }
        Ok(Self {
            casks: arg.cask.into_vec().into_iter().map(Token::new).collect(),
            formulae: arg.formula.into_vec().into_iter().map(FormulaName::new).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[&str]) -> StringList {
        StringList::new(values.iter().map(|v| (*v).to_owned()).collect())
    }

    #[test]
    fn parses_named_and_numeric_versions() {
        assert_eq!(MacosVersion::parse("big_sur").unwrap(), MacosVersion::new(11, 0));
        assert_eq!(MacosVersion::parse("10.15").unwrap(), MacosVersion::new(10, 15));
        assert_eq!(MacosVersion::parse("14").unwrap(), MacosVersion::new(14, 0));
        assert!(MacosVersion::parse("leopard").is_err());
        assert!(MacosVersion::parse("99").is_err());
    }

    #[test]
    fn version_display() {
        assert_eq!(MacosVersion::new(13, 0).to_string(), "13");
        assert_eq!(MacosVersion::new(10, 15).to_string(), "10.15");
        assert_eq!(MacosVersion::new(14, 0).name(), Some("sonoma"));
    }

    #[test]
    fn comparison_requirement() {
        let req = MacosRequirement::parse(&[">= monterey".to_owned()]).unwrap();
        assert!(req.is_satisfied_by(MacosVersion::new(13, 0)));
        assert!(req.is_satisfied_by(MacosVersion::new(12, 0)));
        assert!(!req.is_satisfied_by(MacosVersion::new(11, 0)));
    }

    #[test]
    fn exact_set_requirement() {
        let req = MacosRequirement::parse(&["sonoma".to_owned(), "sequoia".to_owned()]).unwrap();
        assert!(req.is_satisfied_by(MacosVersion::new(14, 0)));
        assert!(!req.is_satisfied_by(MacosVersion::new(13, 0)));
    }

    #[test]
    fn bad_comparison_is_rejected() {
        assert_eq!(
            MacosRequirement::parse(&[">= nope".to_owned()]),
            Err(DependsError::InvalidMacosRequirement(">= nope".to_owned()))
        );
    }

    #[test]
    fn accumulates_and_deduplicates() {
        let mut deps = DependencyDeclaration::default();
        deps.load(DependsOnArg {
            formula: list(&["wget"]),
            arch: list(&["x86_64"]),
            ..DependsOnArg::default()
        })
        .unwrap();
        deps.load(DependsOnArg {
            formula: list(&["wget", "jq"]),
            arch: list(&["intel"]),
            cask: list(&["java"]),
            ..DependsOnArg::default()
        })
        .unwrap();
        assert_eq!(deps.formulae.len(), 2);
        assert_eq!(deps.arch, vec![Arch::Intel]);
        assert_eq!(deps.casks, vec![Token::new("java")]);
    }

    #[test]
    fn second_macos_requirement_is_rejected() {
        let mut deps = DependencyDeclaration::default();
        let arg = DependsOnArg {
            macos: Some(list(&[">= big_sur"])),
            ..DependsOnArg::default()
        };
        deps.load(arg.clone()).unwrap();
        assert_eq!(deps.load(arg), Err(DependsError::MacosAlreadySpecified));
    }

    #[test]
    fn invalid_stanza_leaves_declaration_untouched() {
        let mut deps = DependencyDeclaration::default();
        let err = deps
            .load(DependsOnArg {
                formula: list(&["wget"]),
                arch: list(&["sparc"]),
                ..DependsOnArg::default()
            })
            .unwrap_err();
        assert_eq!(err, DependsError::UnknownArch("sparc".to_owned()));
        assert!(deps.is_empty());
    }

    #[test]
    fn empty_depends_on_is_rejected() {
        let mut deps = DependencyDeclaration::default();
        assert_eq!(deps.load(DependsOnArg::default()), Err(DependsError::Empty));
    }

    #[test]
    fn conflicts_require_an_entry() {
        assert_eq!(
            ConflictDeclaration::try_from(ConflictsArg::default()),
            Err(DependsError::EmptyConflicts)
        );
        let decl = ConflictDeclaration::try_from(ConflictsArg {
            cask: list(&["firefox@beta"]),
            formula: StringList::default(),
        })
        .unwrap();
        assert_eq!(decl.casks, vec![Token::new("firefox@beta")]);
    }
}
