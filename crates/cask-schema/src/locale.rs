//! Locale tags, language blocks, and selection of the block matching a user's
//! preferred locales.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocaleParseError {
    #[error("locale must not be empty")]
    Empty,
    #[error("invalid locale '{input}': unrecognized component '{component}'")]
    InvalidComponent { input: String, component: String },
    #[error("invalid locale '{input}': components must appear as language-Script-REGION")]
    OutOfOrder { input: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LanguageError {
    #[error("no default language specified")]
    NoDefault,
    #[error("only one default language may be defined")]
    MultipleDefaults,
}

/// A parsed `language[-Script][-REGION]` tag. Every component is optional but
/// at least one is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocaleTag {
    language: Option<String>,
    script: Option<String>,
    region: Option<String>,
}

impl LocaleTag {
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Whether `other` is satisfied by `self`: every component present in
    /// `other` must be equal in `self`. `en-GB` includes `en`, `en` does not
    /// include `en-GB`.
    pub fn includes(&self, other: &LocaleTag) -> bool {
        fn component(mine: Option<&String>, theirs: Option<&String>) -> bool {
            theirs.is_none() || mine == theirs
        }
        component(self.language.as_ref(), other.language.as_ref())
            && component(self.script.as_ref(), other.script.as_ref())
            && component(self.region.as_ref(), other.region.as_ref())
    }
}

#[derive(Clone, Copy, PartialEq, PartialOrd)]
enum Component {
    Language,
    Script,
    Region,
}

fn classify(part: &str) -> Option<Component> {
    let len = part.len();
    if (2..=3).contains(&len) && part.bytes().all(|b| b.is_ascii_lowercase()) {
        return Some(Component::Language);
    }
    if len == 4 {
        let mut bytes = part.bytes();
        let first_upper = bytes.next().is_some_and(|b| b.is_ascii_uppercase());
        if first_upper && bytes.all(|b| b.is_ascii_lowercase()) {
            return Some(Component::Script);
        }
    }
    if (len == 2 && part.bytes().all(|b| b.is_ascii_uppercase()))
        || (len == 3 && part.bytes().all(|b| b.is_ascii_digit()))
    {
        return Some(Component::Region);
    }
    None
}

impl FromStr for LocaleTag {
    type Err = LocaleParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if input.is_empty() {
            return Err(LocaleParseError::Empty);
        }

        let mut tag = LocaleTag {
            language: None,
            script: None,
            region: None,
        };
        let mut last: Option<Component> = None;

        for part in input.split('-') {
            let Some(component) = classify(part) else {
                return Err(LocaleParseError::InvalidComponent {
                    input: input.to_owned(),
                    component: part.to_owned(),
                });
            };
            if last.is_some_and(|prev| prev >= component) {
                return Err(LocaleParseError::OutOfOrder {
                    input: input.to_owned(),
                });
            }
            last = Some(component);
            let slot = match component {
                Component::Language => &mut tag.language,
                Component::Script => &mut tag.script,
                Component::Region => &mut tag.region,
            };
            *slot = Some(part.to_owned());
        }

        Ok(tag)
    }
}

impl fmt::Display for LocaleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.language, &self.script, &self.region]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        f.write_str(&parts.join("-"))
    }
}

impl Serialize for LocaleTag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How a preferred locale chooses among several matching language blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalePolicy {
    /// An exactly equal tag in any block wins over an inclusive match in an
    /// earlier block.
    #[default]
    ExactFirst,
    /// The first block in declaration order with an equal or included tag wins.
    DeclarationOrder,
}

/// A deferred value, computed on demand. The evaluator caches the result.
#[derive(Clone)]
pub struct LazyBlock(Arc<dyn Fn() -> String + Send + Sync>);

impl LazyBlock {
    pub fn new(f: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn constant(value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(move || value.clone())
    }

    pub fn call(&self) -> String {
        (self.0)()
    }
}

impl fmt::Debug for LazyBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LazyBlock(..)")
    }
}

#[derive(Debug, Clone)]
pub struct LanguageBlock {
    pub tags: Vec<LocaleTag>,
    pub block: LazyBlock,
}

/// Declared language blocks in declaration order, plus the designated default.
#[derive(Debug, Clone, Default)]
pub struct LanguageBlocks {
    blocks: Vec<LanguageBlock>,
    default: Option<usize>,
}

impl LanguageBlocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a block. Re-declaring an identical tag sequence replaces the
    /// earlier block in place.
    pub fn declare(
        &mut self,
        tags: Vec<LocaleTag>,
        block: LazyBlock,
        default: bool,
        allow_reassignment: bool,
    ) -> Result<(), LanguageError> {
        if default && self.default.is_some() && !allow_reassignment {
            return Err(LanguageError::MultipleDefaults);
        }

        let index = if let Some(index) = self.blocks.iter().position(|b| b.tags == tags) {
            self.blocks[index].block = block;
            index
        } else {
            self.blocks.push(LanguageBlock { tags, block });
            self.blocks.len() - 1
        };

        if default {
            self.default = Some(index);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn blocks(&self) -> &[LanguageBlock] {
        &self.blocks
    }

    pub fn default_block(&self) -> Option<&LanguageBlock> {
        self.default.map(|i| &self.blocks[i])
    }

    /// All declared tags, flattened in declaration order.
    pub fn languages(&self) -> Vec<&LocaleTag> {
        self.blocks.iter().flat_map(|b| b.tags.iter()).collect()
    }

    /// Select the block for the given preferences (most preferred first).
    ///
    /// Returns `Ok(None)` when no block was declared. Unparsable preferences
    /// are skipped.
    pub fn select(
        &self,
        preferred: &[String],
        policy: LocalePolicy,
    ) -> Result<Option<&LanguageBlock>, LanguageError> {
        if self.blocks.is_empty() {
            return Ok(None);
        }

        for raw in preferred {
            let locale = match raw.parse::<LocaleTag>() {
                Ok(locale) => locale,
                Err(e) => {
                    warn!("skipping preferred locale: {e}");
                    continue;
                }
            };
            if let Some(block) = self.find(&locale, policy) {
                debug!("preferred locale {locale} matched {:?}", block.tags);
                return Ok(Some(block));
            }
        }

        self.default_block().map(Some).ok_or(LanguageError::NoDefault)
    }

    fn find(&self, locale: &LocaleTag, policy: LocalePolicy) -> Option<&LanguageBlock> {
        let inclusive = |b: &&LanguageBlock| b.tags.iter().any(|t| locale.includes(t));
        match policy {
            LocalePolicy::ExactFirst => self
                .blocks
                .iter()
                .find(|b| b.tags.iter().any(|t| t == locale))
                .or_else(|| self.blocks.iter().find(inclusive)),
            LocalePolicy::DeclarationOrder => self.blocks.iter().find(inclusive),
        }
    }
}
