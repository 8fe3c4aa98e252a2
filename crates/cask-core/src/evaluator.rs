use crate::context::EvaluationContext;
use crate::guard::{Admission, GuardViolation, SlotState, StanzaGuard, UniqueStanza};
use crate::lifecycle::{LifecycleDeclaration, LifecycleRecord};
use crate::resolved::{ResolvedManifest, Warning};
use crate::EvalError;
use cask_schema::{
    parse_manifest_str, Artifact, ArtifactKind, ChecksumOrSkip, Condition, ConditionalValue,
    ConflictDeclaration, ContainerSpec, DependencyDeclaration, Event, LanguageArg, LanguageBlocks,
    LanguageError, LazyBlock, LifecycleArg, LivecheckSpec, LocaleTag, ManifestDocument, Platform,
    Reason, Stanza, Token, UrlSpec,
};
use chrono::NaiveDate;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Consumes the event stream of one manifest for one platform.
///
/// Every pass owns its own guards and accumulators; evaluating the same
/// manifest for another platform means building a new `Evaluator`.
pub struct Evaluator<'a> {
    ctx: &'a EvaluationContext,
    token: Token,
    /// One entry per open conditional block: whether it matches the platform.
    conditionals: Vec<bool>,
    names: Vec<String>,
    desc: StanzaGuard<String>,
    homepage: StanzaGuard<String>,
    version: StanzaGuard<String>,
    url: StanzaGuard<UrlSpec>,
    container: StanzaGuard<ContainerSpec>,
    sha256: StanzaGuard<ConditionalValue<ChecksumOrSkip>>,
    arch: StanzaGuard<ConditionalValue<String>>,
    os: StanzaGuard<ConditionalValue<String>>,
    auto_updates: StanzaGuard<bool>,
    conflicts_with: StanzaGuard<ConflictDeclaration>,
    depends_on: DependencyDeclaration,
    depends_on_set_in_block: bool,
    language_blocks: LanguageBlocks,
    language: OnceLock<String>,
    lifecycle: LifecycleRecord,
    no_autobump_reason: Option<Reason>,
    livecheck: Option<LivecheckSpec>,
    caveats: Vec<String>,
    artifacts: Vec<Artifact>,
    platform_conditional: bool,
    warnings: Vec<Warning>,
}

impl<'a> Evaluator<'a> {
    pub fn new(token: Token, ctx: &'a EvaluationContext) -> Self {
        Self {
            ctx,
            token,
            conditionals: Vec::new(),
            names: Vec::new(),
            desc: StanzaGuard::new(),
            homepage: StanzaGuard::new(),
            version: StanzaGuard::new(),
            url: StanzaGuard::new(),
            container: StanzaGuard::new(),
            sha256: StanzaGuard::new(),
            arch: StanzaGuard::new(),
            os: StanzaGuard::new(),
            auto_updates: StanzaGuard::new(),
            conflicts_with: StanzaGuard::new(),
            depends_on: DependencyDeclaration::default(),
            depends_on_set_in_block: false,
            language_blocks: LanguageBlocks::new(),
            language: OnceLock::new(),
            lifecycle: LifecycleRecord::default(),
            no_autobump_reason: None,
            livecheck: None,
            caveats: Vec::new(),
            artifacts: Vec::new(),
            platform_conditional: false,
            warnings: Vec::new(),
        }
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn platform(&self) -> Platform {
        self.ctx.platform
    }

    /// Whether the next stanza would be inside a conditional block.
    pub fn inside_conditional(&self) -> bool {
        !self.conditionals.is_empty()
    }

    fn skipping(&self) -> bool {
        self.conditionals.iter().any(|matches| !matches)
    }

    pub fn is_platform_conditional(&self) -> bool {
        self.platform_conditional
    }

    /// Guard state of a unique stanza.
    pub fn state_of(&self, stanza: UniqueStanza) -> SlotState {
        match stanza {
            UniqueStanza::Desc => self.desc.state(),
            UniqueStanza::Homepage => self.homepage.state(),
            UniqueStanza::Version => self.version.state(),
            UniqueStanza::Url => self.url.state(),
            UniqueStanza::Container => self.container.state(),
            UniqueStanza::Sha256 => self.sha256.state(),
            UniqueStanza::ConflictsWith => self.conflicts_with.state(),
            UniqueStanza::Arch => self.arch.state(),
            UniqueStanza::Os => self.os.state(),
            UniqueStanza::AutoUpdates => self.auto_updates.state(),
        }
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.get().map(String::as_str)
    }

    pub fn homepage(&self) -> Option<&str> {
        self.homepage.get().map(String::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.get().map(String::as_str)
    }

    pub fn url(&self) -> Option<&UrlSpec> {
        self.url.get()
    }

    pub fn auto_updates(&self) -> Option<bool> {
        self.auto_updates.get().copied()
    }

    /// The `arch` stanza value for the evaluated platform.
    pub fn arch(&self) -> Option<&str> {
        self.arch.get()?.resolve(self.ctx.platform).map(String::as_str)
    }

    /// The `os` stanza value for the evaluated platform.
    pub fn os(&self) -> Option<&str> {
        self.os.get()?.resolve(self.ctx.platform).map(String::as_str)
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn apply(&mut self, event: Event) -> Result<(), EvalError> {
        match event {
            Event::EnterConditional(condition) => {
                self.enter(condition);
                Ok(())
            }
            Event::ExitConditional => {
                if self.conditionals.pop().is_none() {
                    return Err(EvalError::UnbalancedConditional {
                        token: self.token.to_string(),
                        detail: "end of conditional block without a matching start".to_owned(),
                    });
                }
                Ok(())
            }
            _ if self.skipping() => Ok(()),
            Event::Unknown { name } => {
                warn!("{}: unknown stanza '{name}' ignored", self.token);
                self.warnings.push(Warning::UnknownStanza { name });
                Ok(())
            }
            Event::Stanza(stanza) => self.stanza(stanza),
        }
    }

    fn enter(&mut self, condition: Condition) {
        self.platform_conditional = true;
        let matches = condition.matches(self.ctx.platform);
        if !matches {
            debug!(
                "{}: skipping {condition} block on {}",
                self.token, self.ctx.platform
            );
        }
        self.conditionals.push(matches);
    }

    fn stanza(&mut self, stanza: Stanza) -> Result<(), EvalError> {
        match stanza {
            Stanza::Name(names) => {
                self.names.extend(names.into_vec());
                Ok(())
            }
            Stanza::Desc(desc) => {
                let admission = self.admit(UniqueStanza::Desc)?;
                self.desc.commit(admission, desc);
                Ok(())
            }
            Stanza::Homepage(homepage) => {
                let admission = self.admit(UniqueStanza::Homepage)?;
                let homepage = self.interpolate("homepage", &homepage)?;
                self.homepage.commit(admission, homepage);
                Ok(())
            }
            Stanza::Version(version) => {
                let admission = self.admit(UniqueStanza::Version)?;
                if version.trim().is_empty() {
                    return Err(self.invalid("version", "version must not be empty"));
                }
                self.version.commit(admission, version);
                Ok(())
            }
            Stanza::Url(mut spec) => {
                let admission = self.admit(UniqueStanza::Url)?;
                spec.uri = self.interpolate("url", &spec.uri)?;
                self.url.commit(admission, spec);
                Ok(())
            }
            Stanza::Container(mut spec) => {
                let admission = self.admit(UniqueStanza::Container)?;
                if let Some(nested) = spec.nested.take() {
                    spec.nested = Some(self.interpolate("container", &nested)?);
                }
                self.container.commit(admission, spec);
                Ok(())
            }
            Stanza::Sha256(arg) => {
                let admission = self.admit(UniqueStanza::Sha256)?;
                if arg.is_platform_scoped() {
                    self.platform_conditional = true;
                }
                let value = arg
                    .into_conditional()
                    .map_err(|e| self.invalid("sha256", e))?;
                self.sha256.commit(admission, value);
                Ok(())
            }
            Stanza::Arch(arg) => {
                let admission = self.admit(UniqueStanza::Arch)?;
                if arg.arm.is_none() && arg.intel.is_none() {
                    return Err(self.invalid("arch", "requires an 'arm' or 'intel' value"));
                }
                self.platform_conditional = true;
                self.arch
                    .commit(admission, ConditionalValue::by_arch(arg.arm, arg.intel));
                Ok(())
            }
            Stanza::Os(arg) => {
                let admission = self.admit(UniqueStanza::Os)?;
                if arg.macos.is_none() && arg.linux.is_none() {
                    return Err(self.invalid("os", "requires a 'macos' or 'linux' value"));
                }
                self.platform_conditional = true;
                self.os
                    .commit(admission, ConditionalValue::by_os(arg.macos, arg.linux));
                Ok(())
            }
            Stanza::AutoUpdates(flag) => {
                let admission = self.admit(UniqueStanza::AutoUpdates)?;
                self.auto_updates.commit(admission, flag);
                Ok(())
            }
            Stanza::ConflictsWith(arg) => {
                let admission = self.admit(UniqueStanza::ConflictsWith)?;
                let conflicts =
                    ConflictDeclaration::try_from(arg).map_err(|e| self.invalid("conflicts_with", e))?;
                self.conflicts_with.commit(admission, conflicts);
                Ok(())
            }
            Stanza::DependsOn(arg) => {
                if let Err(e) = self.depends_on.load(arg) {
                    return Err(self.invalid("depends_on", e));
                }
                if self.inside_conditional() {
                    self.depends_on_set_in_block = true;
                }
                Ok(())
            }
            Stanza::Language(arg) => self.language_block(arg),
            Stanza::Caveats(text) => {
                self.caveats.push(text);
                Ok(())
            }
            Stanza::Livecheck(spec) => {
                if self.livecheck.is_some() && !self.ctx.allow_reassignment {
                    return Err(self.duplicate("livecheck"));
                }
                self.livecheck = Some(spec);
                Ok(())
            }
            Stanza::Deprecate(arg) => {
                let declaration = self.lifecycle_declaration("deprecate", arg)?;
                self.lifecycle.deprecation = Some(declaration);
                Ok(())
            }
            Stanza::Disable(arg) => {
                let declaration = self.lifecycle_declaration("disable", arg)?;
                self.lifecycle.disable = Some(declaration);
                Ok(())
            }
            Stanza::NoAutobump(arg) => {
                if self.no_autobump_reason.is_some() && !self.ctx.allow_reassignment {
                    return Err(self.duplicate("no_autobump"));
                }
                if let Reason::Code { code } = &arg.because {
                    if !self.ctx.accepts_no_autobump_reason(code) {
                        return Err(EvalError::InvalidReasonCode {
                            token: self.token.to_string(),
                            stanza: "no_autobump".to_owned(),
                            code: code.clone(),
                        });
                    }
                }
                self.no_autobump_reason = Some(arg.because);
                Ok(())
            }
            Stanza::Artifact(artifact) => self.artifact(artifact),
        }
    }

    fn admit(&self, stanza: UniqueStanza) -> Result<Admission, EvalError> {
        let inside = self.inside_conditional();
        let allow = self.ctx.allow_reassignment;
        let result = match stanza {
            UniqueStanza::Desc => self.desc.admit(inside, allow),
            UniqueStanza::Homepage => self.homepage.admit(inside, allow),
            UniqueStanza::Version => self.version.admit(inside, allow),
            UniqueStanza::Url => self.url.admit(inside, allow),
            UniqueStanza::Container => self.container.admit(inside, allow),
            UniqueStanza::Sha256 => self.sha256.admit(inside, allow),
            UniqueStanza::ConflictsWith => self.conflicts_with.admit(inside, allow),
            UniqueStanza::Arch => self.arch.admit(inside, allow),
            UniqueStanza::Os => self.os.admit(inside, allow),
            UniqueStanza::AutoUpdates => self.auto_updates.admit(inside, allow),
        };
        match result {
            Ok(admission) => {
                if admission.is_override() {
                    debug!("{}: '{stanza}' overridden in conditional block", self.token);
                }
                Ok(admission)
            }
            Err(GuardViolation::DuplicateStanza) => Err(self.duplicate(stanza.name())),
            Err(GuardViolation::DuplicateOverride) => Err(EvalError::DuplicateOverride {
                token: self.token.to_string(),
                stanza: stanza.name().to_owned(),
            }),
        }
    }

    fn language_block(&mut self, arg: LanguageArg) -> Result<(), EvalError> {
        let LanguageArg {
            locales,
            default,
            value,
        } = arg;
        if locales.is_empty() {
            return Err(self.invalid("language", "requires at least one locale"));
        }
        let tags = locales
            .as_slice()
            .iter()
            .map(|l| l.parse::<LocaleTag>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.invalid("language", e))?;

        self.declare_language(tags, LazyBlock::constant(value), default)
    }

    /// Register a language block whose value is computed on demand.
    pub fn declare_language(
        &mut self,
        tags: Vec<LocaleTag>,
        block: LazyBlock,
        default: bool,
    ) -> Result<(), EvalError> {
        self.language_blocks
            .declare(tags, block, default, self.ctx.allow_reassignment)
            .map_err(|e| self.language_error(e))
    }

    fn language_error(&self, err: LanguageError) -> EvalError {
        let token = self.token.to_string();
        match err {
            LanguageError::NoDefault => EvalError::NoDefaultLanguage { token },
            LanguageError::MultipleDefaults => EvalError::MultipleDefaultLanguages { token },
        }
    }

    /// Value of the selected language block. Resolved once per pass; nothing
    /// is cached until a block has been declared.
    fn language_value(&self) -> Result<Option<String>, EvalError> {
        if let Some(value) = self.language.get() {
            return Ok(Some(value.clone()));
        }
        let Some(selected) = self
            .language_blocks
            .select(&self.ctx.preferred_locales, self.ctx.locale_policy)
            .map_err(|e| self.language_error(e))?
        else {
            return Ok(None);
        };
        let value = self.language.get_or_init(|| selected.block.call());
        debug!("{}: language resolved to {value:?}", self.token);
        Ok(Some(value.clone()))
    }

    fn lifecycle_declaration(
        &mut self,
        stanza: &str,
        arg: LifecycleArg,
    ) -> Result<LifecycleDeclaration, EvalError> {
        if arg.replacement_count() > 1 {
            return Err(EvalError::AmbiguousReplacement {
                token: self.token.to_string(),
                stanza: stanza.to_owned(),
            });
        }
        let date = NaiveDate::parse_from_str(arg.date.trim(), "%Y-%m-%d")
            .map_err(|e| self.invalid(stanza, format!("invalid date '{}': {e}", arg.date)))?;

        let LifecycleArg {
            because,
            replacement,
            replacement_formula,
            replacement_cask,
            ..
        } = arg;
        let present = |r: Option<String>| r.filter(|r| !r.trim().is_empty());
        let (replacement, replacement_formula, replacement_cask) = (
            present(replacement),
            present(replacement_formula),
            present(replacement_cask),
        );
        if replacement.is_some() {
            warn!(
                "{}: '{stanza}' uses 'replacement'; use 'replacement_formula' or 'replacement_cask'",
                self.token
            );
            self.warnings.push(Warning::GenericReplacement {
                stanza: stanza.to_owned(),
            });
        }
        Ok(LifecycleDeclaration {
            date,
            reason: because,
            replacement_formula: replacement_formula.or_else(|| replacement.clone()),
            replacement_cask: replacement_cask.or(replacement),
        })
    }

    fn artifact(&mut self, mut artifact: Artifact) -> Result<(), EvalError> {
        let kind = artifact.kind();
        artifact
            .validate()
            .map_err(|e| self.invalid(kind.dsl_key(), e))?;

        if kind.is_ordinary() {
            if let Some(existing) = self.incompatible_with(kind) {
                return Err(EvalError::IncompatibleArtifacts {
                    token: self.token.to_string(),
                    stanza: kind.dsl_key().to_owned(),
                    existing: existing.dsl_key().to_owned(),
                });
            }
        }

        for path in artifact.paths_mut() {
            *path = self.interpolate(kind.dsl_key(), path)?;
        }
        self.artifacts.push(artifact);
        Ok(())
    }

    /// The already declared kind that `kind` cannot join, if any.
    fn incompatible_with(&self, kind: ArtifactKind) -> Option<ArtifactKind> {
        let mut existing = self
            .artifacts
            .iter()
            .map(Artifact::kind)
            .filter(|k| k.is_ordinary());
        if kind == ArtifactKind::StageOnly {
            existing.find(|k| *k == ArtifactKind::StageOnly || k.is_activatable())
        } else if kind.is_activatable() {
            existing.find(|k| *k == ArtifactKind::StageOnly)
        } else {
            None
        }
    }

    /// Expand `{version}`, `{language}`, `{arch}`, `{os}` and `{appdir}`.
    fn interpolate(&self, stanza: &str, input: &str) -> Result<String, EvalError> {
        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(start) = rest.find('{') {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            out.push_str(&rest[..start]);
            let name = &rest[start + 1..start + len];
            let value = match name {
                "version" => self.version().map(str::to_owned),
                "language" => self.language_value()?,
                "arch" => self.arch().map(str::to_owned),
                "os" => self.os().map(str::to_owned),
                "appdir" => Some(self.ctx.appdir_value()),
                other => {
                    return Err(self.invalid(stanza, format!("unknown placeholder '{{{other}}}'")));
                }
            };
            out.push_str(value.as_deref().unwrap_or_default());
            rest = &rest[start + len + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn duplicate(&self, stanza: &str) -> EvalError {
        EvalError::DuplicateStanza {
            token: self.token.to_string(),
            stanza: stanza.to_owned(),
        }
    }

    fn invalid(&self, stanza: &str, detail: impl ToString) -> EvalError {
        EvalError::InvalidStanzaValue {
            token: self.token.to_string(),
            stanza: stanza.to_owned(),
            detail: detail.to_string(),
        }
    }

    pub fn finish(self) -> Result<ResolvedManifest, EvalError> {
        if !self.conditionals.is_empty() {
            return Err(EvalError::UnbalancedConditional {
                token: self.token.to_string(),
                detail: format!("{} conditional block(s) left open", self.conditionals.len()),
            });
        }
        if !self.language_blocks.is_empty() && !self.language_blocks.has_default() {
            return Err(EvalError::NoDefaultLanguage {
                token: self.token.to_string(),
            });
        }

        debug!(
            "{}: evaluated {} artifact(s) for {}",
            self.token,
            self.artifacts.len(),
            self.ctx.platform
        );
        Ok(ResolvedManifest {
            token: self.token,
            platform: self.ctx.platform,
            mode: self.ctx.mode,
            now: self.ctx.now,
            caskroom: self.ctx.caskroom.clone(),
            preferred_locales: self.ctx.preferred_locales.clone(),
            locale_policy: self.ctx.locale_policy,
            names: self.names,
            desc: self.desc.into_value(),
            homepage: self.homepage.into_value(),
            version: self.version.into_value(),
            url: self.url.into_value(),
            container: self.container.into_value(),
            sha256: self.sha256.into_value(),
            arch: self.arch.into_value(),
            os: self.os.into_value(),
            auto_updates: self.auto_updates.into_value(),
            depends_on: self.depends_on,
            depends_on_set_in_block: self.depends_on_set_in_block,
            conflicts_with: self.conflicts_with.into_value(),
            language_blocks: self.language_blocks,
            language: match self.language.into_inner() {
                Some(value) => OnceLock::from(Some(value)),
                None => OnceLock::new(),
            },
            lifecycle: self.lifecycle,
            lifecycle_status: OnceLock::new(),
            no_autobump_reason: self.no_autobump_reason,
            livecheck: self.livecheck,
            caveats: self.caveats,
            artifacts: self.artifacts,
            platform_conditional: self.platform_conditional,
            warnings: self.warnings,
            staged_path: OnceLock::new(),
        })
    }
}

/// Evaluate an event stream for the platform in `ctx`.
pub fn evaluate<I>(token: Token, events: I, ctx: &EvaluationContext) -> Result<ResolvedManifest, EvalError>
where
    I: IntoIterator<Item = Event>,
{
    debug!("evaluating {token} for {}", ctx.platform);
    let mut evaluator = Evaluator::new(token, ctx);
    for event in events {
        evaluator.apply(event)?;
    }
    evaluator.finish()
}

pub fn evaluate_document(
    document: &ManifestDocument,
    ctx: &EvaluationContext,
) -> Result<ResolvedManifest, EvalError> {
    evaluate(document.token.clone(), document.events(), ctx)
}

/// Parse a TOML manifest and evaluate it.
pub fn evaluate_str(input: &str, ctx: &EvaluationContext) -> Result<ResolvedManifest, EvalError> {
    let document = parse_manifest_str(input)?;
    evaluate_document(&document, ctx)
}

/// Evaluate a manifest for every platform it can differ on.
///
/// A manifest without platform-conditional content yields a single result
/// for `ctx.platform`. Otherwise one fresh pass runs per platform, in
/// parallel, in [`Platform::all`] order.
pub fn evaluate_variations(
    document: &ManifestDocument,
    ctx: &EvaluationContext,
) -> Result<Vec<ResolvedManifest>, EvalError> {
    let first = evaluate_document(document, ctx)?;
    if !first.is_platform_conditional() {
        return Ok(vec![first]);
    }

    info!(
        "{}: platform-conditional, evaluating {} platforms",
        document.token,
        Platform::all().len()
    );
    let contexts: Vec<EvaluationContext> = Platform::all()
        .into_iter()
        .map(|p| ctx.for_platform(p))
        .collect();
    std::thread::scope(|s| {
        let joins: Vec<_> = contexts
            .iter()
            .map(|c| s.spawn(move || evaluate_document(document, c)))
            .collect();
        joins
            .into_iter()
            .map(|join| join.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_schema::{Arch, ArchArg, Os, OsArg, Relocation};

    fn ctx(os: Os, arch: Arch) -> EvaluationContext {
        EvaluationContext::new(Platform::new(os, arch))
    }

    fn version(v: &str) -> Event {
        Event::Stanza(Stanza::Version(v.to_owned()))
    }

    fn app(source: &str) -> Event {
        Event::Stanza(Stanza::Artifact(Artifact::App(Relocation {
            source: source.to_owned(),
            target: None,
        })))
    }

    #[test]
    fn bare_read_does_not_change_state() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let mut ev = Evaluator::new(Token::new("demo"), &ctx);
        ev.apply(version("1.0")).unwrap();
        let before = ev.state_of(UniqueStanza::Version);
        for _ in 0..3 {
            assert_eq!(ev.version(), Some("1.0"));
        }
        assert_eq!(ev.state_of(UniqueStanza::Version), before);
        assert_eq!(ev.state_of(UniqueStanza::Desc), SlotState::Unset);
    }

    #[test]
    fn skipped_branch_is_not_guarded() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let mut ev = Evaluator::new(Token::new("demo"), &ctx);
        ev.apply(version("1.0")).unwrap();
        for _ in 0..3 {
            ev.apply(Event::EnterConditional(Condition::Os(Os::Linux))).unwrap();
            ev.apply(version("1.0-linux")).unwrap();
            ev.apply(Event::ExitConditional).unwrap();
        }
        assert_eq!(ev.version(), Some("1.0"));
        assert_eq!(ev.state_of(UniqueStanza::Version), SlotState::SetOutsideConditional);
        assert!(ev.is_platform_conditional());
    }

    #[test]
    fn nested_blocks_require_every_condition() {
        let ctx = ctx(Os::Linux, Arch::Intel);
        let mut ev = Evaluator::new(Token::new("demo"), &ctx);
        ev.apply(Event::EnterConditional(Condition::Os(Os::Linux))).unwrap();
        ev.apply(Event::EnterConditional(Condition::Arch(Arch::Arm))).unwrap();
        ev.apply(version("arm")).unwrap();
        ev.apply(Event::ExitConditional).unwrap();
        ev.apply(version("intel")).unwrap();
        ev.apply(Event::ExitConditional).unwrap();
        assert_eq!(ev.version(), Some("intel"));
        assert_eq!(ev.state_of(UniqueStanza::Version), SlotState::SetInsideConditional);
    }

    #[test]
    fn unbalanced_exit_fails() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let mut ev = Evaluator::new(Token::new("demo"), &ctx);
        assert!(matches!(
            ev.apply(Event::ExitConditional),
            Err(EvalError::UnbalancedConditional { .. })
        ));
    }

    #[test]
    fn open_block_at_end_fails() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let result = evaluate(
            Token::new("demo"),
            [Event::EnterConditional(Condition::Os(Os::Macos))],
            &ctx,
        );
        assert!(matches!(result, Err(EvalError::UnbalancedConditional { .. })));
    }

    #[test]
    fn interpolates_placeholders() {
        let ctx = ctx(Os::Linux, Arch::Arm).with_appdir("/opt/apps");
        let events = vec![
            version("2.1"),
            Event::Stanza(Stanza::Arch(ArchArg {
                arm: Some("arm64".to_owned()),
                intel: Some("x86_64".to_owned()),
            })),
            Event::Stanza(Stanza::Os(OsArg {
                macos: Some("darwin".to_owned()),
                linux: Some("linux".to_owned()),
            })),
            Event::Stanza(Stanza::Url(UrlSpec::new(
                "https://example.com/{version}/app-{os}-{arch}.tar.gz",
            ))),
            app("App {version}.app"),
            Event::Stanza(Stanza::Artifact(Artifact::Binary(Relocation {
                source: "{appdir}/App.app/Contents/MacOS/app".to_owned(),
                target: Some("app".to_owned()),
            }))),
        ];
        let manifest = evaluate(Token::new("demo"), events, &ctx).unwrap();
        assert_eq!(
            manifest.url().unwrap().uri,
            "https://example.com/2.1/app-linux-arm64.tar.gz"
        );
        assert_eq!(
            manifest.artifacts()[0],
            Artifact::App(Relocation {
                source: "App 2.1.app".to_owned(),
                target: None,
            })
        );
        let Artifact::Binary(binary) = &manifest.artifacts()[1] else {
            panic!("expected binary");
        };
        assert_eq!(binary.source, "/opt/apps/App.app/Contents/MacOS/app");
    }

    #[test]
    fn unset_placeholder_expands_empty_and_unknown_fails() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let manifest = evaluate(
            Token::new("demo"),
            [Event::Stanza(Stanza::Homepage("https://example.com/{version}".to_owned()))],
            &ctx,
        )
        .unwrap();
        assert_eq!(manifest.homepage(), Some("https://example.com/"));

        let err = evaluate(
            Token::new("demo"),
            [Event::Stanza(Stanza::Homepage("https://example.com/{flavour}".to_owned()))],
            &ctx,
        )
        .unwrap_err();
        assert_eq!(err.stanza(), Some("homepage"));
    }

    #[test]
    fn unclosed_brace_is_literal() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let manifest = evaluate(
            Token::new("demo"),
            [Event::Stanza(Stanza::Homepage("https://example.com/{oops".to_owned()))],
            &ctx,
        )
        .unwrap();
        assert_eq!(manifest.homepage(), Some("https://example.com/{oops"));
    }

    #[test]
    fn unknown_stanza_is_a_warning() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let manifest = evaluate(
            Token::new("demo"),
            [Event::Unknown {
                name: "flavour".to_owned(),
            }],
            &ctx,
        )
        .unwrap();
        assert_eq!(
            manifest.warnings(),
            &[Warning::UnknownStanza {
                name: "flavour".to_owned()
            }]
        );
    }

    #[test]
    fn stage_only_rejects_later_activatable() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let err = evaluate(
            Token::new("demo"),
            [
                Event::Stanza(Stanza::Artifact(Artifact::StageOnly(true))),
                app("Demo.app"),
            ],
            &ctx,
        )
        .unwrap_err();
        match err {
            EvalError::IncompatibleArtifacts { stanza, existing, .. } => {
                assert_eq!(stanza, "app");
                assert_eq!(existing, "stage_only");
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn stage_only_rejects_earlier_activatable() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let err = evaluate(
            Token::new("demo"),
            [
                app("Demo.app"),
                Event::Stanza(Stanza::Artifact(Artifact::StageOnly(true))),
            ],
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::IncompatibleArtifacts { .. }));
        assert_eq!(err.stanza(), Some("stage_only"));
    }

    #[test]
    fn hooks_coexist_with_stage_only() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let manifest = evaluate(
            Token::new("demo"),
            [
                Event::Stanza(Stanza::Artifact(Artifact::StageOnly(true))),
                Event::Stanza(Stanza::Artifact(Artifact::Postflight("touch marker".to_owned()))),
            ],
            &ctx,
        )
        .unwrap();
        assert_eq!(
            manifest.artifact_kinds(),
            vec![ArtifactKind::StageOnly, ArtifactKind::Postflight]
        );
    }

    #[test]
    fn second_stage_only_is_incompatible() {
        let ctx = ctx(Os::Macos, Arch::Arm);
        let stage_only = || Event::Stanza(Stanza::Artifact(Artifact::StageOnly(true)));
        let err = evaluate(Token::new("demo"), [stage_only(), stage_only()], &ctx).unwrap_err();
        assert!(matches!(err, EvalError::IncompatibleArtifacts { .. }));
    }
}
