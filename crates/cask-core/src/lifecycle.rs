use cask_schema::{Reason, LIFECYCLE_REASONS};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;

/// Derived lifecycle booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LifecycleFlags {
    pub deprecated: bool,
    pub disabled: bool,
    /// A disable date exists but has not been reached.
    pub disable_pending: bool,
}

/// Compares declared dates against the evaluation day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleClock {
    today: NaiveDate,
}

impl LifecycleClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            today: now.date_naive(),
        }
    }

    pub fn on(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn resolve(
        &self,
        deprecation_date: Option<NaiveDate>,
        disable_date: Option<NaiveDate>,
    ) -> LifecycleFlags {
        match (deprecation_date, disable_date) {
            (_, Some(disable)) if disable <= self.today => LifecycleFlags {
                deprecated: false,
                disabled: true,
                disable_pending: false,
            },
            (_, Some(_)) => LifecycleFlags {
                deprecated: true,
                disabled: false,
                disable_pending: true,
            },
            (Some(deprecation), None) => LifecycleFlags {
                deprecated: deprecation <= self.today,
                ..LifecycleFlags::default()
            },
            (None, None) => LifecycleFlags::default(),
        }
    }
}

/// One `deprecate!` or `disable!` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleDeclaration {
    pub date: NaiveDate,
    pub reason: Reason,
    pub replacement_formula: Option<String>,
    pub replacement_cask: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LifecycleRecord {
    pub deprecation: Option<LifecycleDeclaration>,
    pub disable: Option<LifecycleDeclaration>,
}

impl LifecycleRecord {
    pub fn is_empty(&self) -> bool {
        self.deprecation.is_none() && self.disable.is_none()
    }

    pub fn status(&self, clock: LifecycleClock) -> LifecycleStatus {
        let flags = clock.resolve(
            self.deprecation.as_ref().map(|d| d.date),
            self.disable.as_ref().map(|d| d.date),
        );
        let (state, surfaced) = if flags.disabled {
            (LifecycleState::Disabled, self.disable.clone())
        } else if flags.disable_pending {
            (LifecycleState::Deprecated, self.disable.clone())
        } else if flags.deprecated {
            (LifecycleState::Deprecated, self.deprecation.clone())
        } else {
            (LifecycleState::Active, None)
        };
        LifecycleStatus {
            state,
            flags,
            surfaced,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Deprecated,
    Disabled,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Deprecated => write!(f, "deprecated"),
            LifecycleState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Lifecycle as seen at one instant, with the declaration whose reason and
/// replacement are shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleStatus {
    pub state: LifecycleState,
    pub flags: LifecycleFlags,
    pub surfaced: Option<LifecycleDeclaration>,
}

impl LifecycleStatus {
    pub fn is_deprecated(&self) -> bool {
        self.flags.deprecated
    }

    pub fn is_disabled(&self) -> bool {
        self.flags.disabled
    }

    pub fn reason(&self) -> Option<&Reason> {
        self.surfaced.as_ref().map(|d| &d.reason)
    }

    pub fn replacement_formula(&self) -> Option<&str> {
        self.surfaced.as_ref()?.replacement_formula.as_deref()
    }

    pub fn replacement_cask(&self) -> Option<&str> {
        self.surfaced.as_ref()?.replacement_cask.as_deref()
    }

    /// User-facing message, or `None` for an active cask.
    pub fn message(&self) -> Option<String> {
        if self.state == LifecycleState::Active {
            return None;
        }
        let mut message = self.state.to_string();

        let reason = self
            .reason()
            .map(|r| r.describe(LIFECYCLE_REASONS))
            .filter(|r| !r.trim().is_empty());
        match reason {
            Some(reason) => message.push_str(&format!(" because it {reason}!")),
            None => message.push('!'),
        }

        if let Some(decl) = &self.surfaced {
            if self.flags.disable_pending {
                message.push_str(&format!(" It will be disabled on {}.", decl.date));
            } else if self.flags.disabled {
                message.push_str(&format!(" It was disabled on {}.", decl.date));
            }
            if let Some(formula) = &decl.replacement_formula {
                message.push_str(&format!("\nReplacement:\n  install --formula {formula}\n"));
            } else if let Some(cask) = &decl.replacement_cask {
                message.push_str(&format!("\nReplacement:\n  install --cask {cask}\n"));
            }
        }
        Some(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn clock() -> LifecycleClock {
        LifecycleClock::on(date("2025-06-15"))
    }

    fn decl(d: &str, reason: Reason) -> LifecycleDeclaration {
        LifecycleDeclaration {
            date: date(d),
            reason,
            replacement_formula: None,
            replacement_cask: None,
        }
    }

    #[test]
    fn future_deprecation_is_active() {
        let flags = clock().resolve(Some(date("2030-01-01")), None);
        assert_eq!(flags, LifecycleFlags::default());
    }

    #[test]
    fn past_deprecation_is_deprecated() {
        let flags = clock().resolve(Some(date("2020-01-01")), None);
        assert!(flags.deprecated);
        assert!(!flags.disabled);
    }

    #[test]
    fn deprecation_takes_effect_on_its_date() {
        assert!(clock().resolve(Some(date("2025-06-15")), None).deprecated);
        assert!(clock().resolve(None, Some(date("2025-06-15"))).disabled);
    }

    #[test]
    fn future_disable_surfaces_as_deprecation() {
        let flags = clock().resolve(None, Some(date("2030-01-01")));
        assert!(flags.deprecated);
        assert!(!flags.disabled);
        assert!(flags.disable_pending);
    }

    #[test]
    fn past_disable_supersedes_deprecation() {
        let flags = clock().resolve(Some(date("2019-01-01")), Some(date("2020-01-01")));
        assert!(flags.disabled);
        assert!(!flags.deprecated);
    }

    #[test]
    fn clock_uses_utc_day() {
        let now: DateTime<Utc> = "2025-06-15T23:59:59Z".parse().unwrap();
        assert_eq!(LifecycleClock::new(now).today(), date("2025-06-15"));
    }

    #[test]
    fn pending_disable_uses_disable_payload() {
        let record = LifecycleRecord {
            deprecation: Some(decl("2020-01-01", Reason::code("unmaintained"))),
            disable: Some(LifecycleDeclaration {
                replacement_cask: Some("newer".to_owned()),
                ..decl("2030-01-01", Reason::code("discontinued"))
            }),
        };
        let status = record.status(clock());
        assert_eq!(status.state, LifecycleState::Deprecated);
        assert_eq!(status.reason(), Some(&Reason::code("discontinued")));
        assert_eq!(status.replacement_cask(), Some("newer"));
        assert_eq!(
            status.message().unwrap(),
            "deprecated because it is discontinued upstream! It will be disabled on 2030-01-01.\nReplacement:\n  install --cask newer\n"
        );
    }

    #[test]
    fn disabled_message_with_text_reason() {
        let record = LifecycleRecord {
            deprecation: None,
            disable: Some(decl("2020-01-01", Reason::text("is broken"))),
        };
        assert_eq!(
            record.status(clock()).message().unwrap(),
            "disabled because it is broken! It was disabled on 2020-01-01."
        );
    }

    #[test]
    fn deprecated_message_without_dates_suffix() {
        let record = LifecycleRecord {
            deprecation: Some(LifecycleDeclaration {
                replacement_formula: Some("wget".to_owned()),
                ..decl("2020-01-01", Reason::code("discontinued"))
            }),
            disable: None,
        };
        assert_eq!(
            record.status(clock()).message().unwrap(),
            "deprecated because it is discontinued upstream!\nReplacement:\n  install --formula wget\n"
        );
    }

    #[test]
    fn empty_reason_renders_bare_state() {
        let record = LifecycleRecord {
            deprecation: Some(decl("2020-01-01", Reason::text(""))),
            disable: None,
        };
        assert_eq!(record.status(clock()).message().unwrap(), "deprecated!");
    }

    #[test]
    fn active_has_no_message() {
        let record = LifecycleRecord::default();
        assert!(record.is_empty());
        let status = record.status(clock());
        assert_eq!(status.state, LifecycleState::Active);
        assert_eq!(status.message(), None);
        assert_eq!(status.reason(), None);
    }

    mod properties {
        use super::*;
        use chrono::Duration;
        use proptest::prelude::*;

        fn offset(days: i64) -> NaiveDate {
            clock().today() + Duration::days(days)
        }

        proptest! {
            #[test]
            fn reached_disable_is_never_deprecated(
                disable in -2000i64..=0,
                deprecation in proptest::option::of(-2000i64..2000),
            ) {
                let flags = clock().resolve(deprecation.map(offset), Some(offset(disable)));
                prop_assert!(flags.disabled);
                prop_assert!(!flags.deprecated);
                prop_assert!(!flags.disable_pending);
            }

            #[test]
            fn pending_disable_always_warns(
                disable in 1i64..2000,
                deprecation in proptest::option::of(-2000i64..2000),
            ) {
                let flags = clock().resolve(deprecation.map(offset), Some(offset(disable)));
                prop_assert!(flags.deprecated);
                prop_assert!(!flags.disabled);
                prop_assert!(flags.disable_pending);
            }

            #[test]
            fn deprecation_alone_follows_its_date(deprecation in -2000i64..2000) {
                let flags = clock().resolve(Some(offset(deprecation)), None);
                prop_assert_eq!(flags.deprecated, deprecation <= 0);
                prop_assert!(!flags.disabled);
                prop_assert!(!flags.disable_pending);
            }
        }
    }
}
