//! Evaluation engine for cask manifests.
//!
//! This crate consumes the typed event stream produced by `cask-schema` and
//! evaluates it into an immutable `ResolvedManifest` for one platform and
//! locale preference list. It enforces the single-assignment discipline of
//! unique stanzas (`StanzaGuard`), the stage-only artifact exclusion, and
//! computes the time-gated lifecycle state (`LifecycleClock`).

pub mod context;
pub mod evaluator;
pub mod guard;
pub mod lifecycle;
pub mod resolved;

pub use context::{EvalConfig, EvaluationContext, EvaluationMode, APPDIR_PLACEHOLDER};
pub use evaluator::{evaluate, evaluate_document, evaluate_str, evaluate_variations, Evaluator};
pub use guard::{Admission, GuardViolation, SlotState, StanzaGuard, UniqueStanza};
pub use lifecycle::{
    LifecycleClock, LifecycleDeclaration, LifecycleFlags, LifecycleRecord, LifecycleState,
    LifecycleStatus,
};
pub use resolved::{ResolvedManifest, Warning};

use cask_schema::ManifestError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{token}: '{stanza}' stanza may only appear once")]
    DuplicateStanza { token: String, stanza: String },
    #[error("{token}: '{stanza}' stanza may only be overridden once")]
    DuplicateOverride { token: String, stanza: String },
    #[error("{token}: invalid '{stanza}' stanza: {detail}")]
    InvalidStanzaValue {
        token: String,
        stanza: String,
        detail: String,
    },
    #[error("{token}: '{stanza}' cannot be combined with '{existing}': 'stage_only' must be the only activatable artifact")]
    IncompatibleArtifacts {
        token: String,
        stanza: String,
        existing: String,
    },
    #[error("{token}: '{stanza}' specifies more than one of replacement, replacement_formula and replacement_cask")]
    AmbiguousReplacement { token: String, stanza: String },
    #[error("{token}: language blocks are declared but none is the default")]
    NoDefaultLanguage { token: String },
    #[error("{token}: only one language block may be the default")]
    MultipleDefaultLanguages { token: String },
    #[error("{token}: '{stanza}' reason '{code}' is not a known reason code")]
    InvalidReasonCode {
        token: String,
        stanza: String,
        code: String,
    },
    #[error("{token}: {detail}")]
    UnbalancedConditional { token: String, detail: String },
    #[error("manifest error: {0}")]
    Manifest(ManifestError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid evaluation config: {0}")]
    Config(#[from] toml::de::Error),
    #[error("failed to write evaluation config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ManifestError> for EvalError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::InvalidStanza { token, source } => EvalError::InvalidStanzaValue {
                token,
                stanza: source.stanza,
                detail: source.detail,
            },
            other => EvalError::Manifest(other),
        }
    }
}

impl EvalError {
    /// Token of the manifest being evaluated, when known.
    pub fn token(&self) -> Option<&str> {
        match self {
            EvalError::DuplicateStanza { token, .. }
            | EvalError::DuplicateOverride { token, .. }
            | EvalError::InvalidStanzaValue { token, .. }
            | EvalError::IncompatibleArtifacts { token, .. }
            | EvalError::AmbiguousReplacement { token, .. }
            | EvalError::NoDefaultLanguage { token }
            | EvalError::MultipleDefaultLanguages { token }
            | EvalError::InvalidReasonCode { token, .. }
            | EvalError::UnbalancedConditional { token, .. } => Some(token),
            _ => None,
        }
    }

    /// Name of the offending stanza, for stanza-level failures.
    pub fn stanza(&self) -> Option<&str> {
        match self {
            EvalError::DuplicateStanza { stanza, .. }
            | EvalError::DuplicateOverride { stanza, .. }
            | EvalError::InvalidStanzaValue { stanza, .. }
            | EvalError::IncompatibleArtifacts { stanza, .. }
            | EvalError::AmbiguousReplacement { stanza, .. }
            | EvalError::InvalidReasonCode { stanza, .. } => Some(stanza),
            EvalError::NoDefaultLanguage { .. } | EvalError::MultipleDefaultLanguages { .. } => {
                Some("language")
            }
            _ => None,
        }
    }
}
