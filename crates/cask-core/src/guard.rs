//! Single-assignment discipline for unique stanzas.
//!
//! A unique stanza may be assigned once, and then overridden once from inside
//! a platform-conditional block. Everything else is a violation unless the
//! evaluation explicitly allows reassignment. Whether an assignment is an
//! override is derived from the slot's state alone.

use serde::Serialize;
use std::fmt;

/// Stanzas governed by a [`StanzaGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniqueStanza {
    Desc,
    Homepage,
    Version,
    Url,
    Container,
    Sha256,
    ConflictsWith,
    Arch,
    Os,
    AutoUpdates,
}

impl UniqueStanza {
    pub const ALL: [UniqueStanza; 10] = [
        UniqueStanza::Desc,
        UniqueStanza::Homepage,
        UniqueStanza::Version,
        UniqueStanza::Url,
        UniqueStanza::Container,
        UniqueStanza::Sha256,
        UniqueStanza::ConflictsWith,
        UniqueStanza::Arch,
        UniqueStanza::Os,
        UniqueStanza::AutoUpdates,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UniqueStanza::Desc => "desc",
            UniqueStanza::Homepage => "homepage",
            UniqueStanza::Version => "version",
            UniqueStanza::Url => "url",
            UniqueStanza::Container => "container",
            UniqueStanza::Sha256 => "sha256",
            UniqueStanza::ConflictsWith => "conflicts_with",
            UniqueStanza::Arch => "arch",
            UniqueStanza::Os => "os",
            UniqueStanza::AutoUpdates => "auto_updates",
        }
    }
}

impl fmt::Display for UniqueStanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    #[default]
    Unset,
    SetOutsideConditional,
    SetInsideConditional,
    OverriddenOnce,
}

impl SlotState {
    pub fn is_set(self) -> bool {
        self != SlotState::Unset
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotState::Unset => write!(f, "unset"),
            SlotState::SetOutsideConditional => write!(f, "set"),
            SlotState::SetInsideConditional => write!(f, "set-in-conditional"),
            SlotState::OverriddenOnce => write!(f, "overridden"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardViolation {
    DuplicateStanza,
    DuplicateOverride,
}

/// Permission to record a value, returned by [`StanzaGuard::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Admission {
    next: SlotState,
}

impl Admission {
    pub fn next_state(self) -> SlotState {
        self.next
    }

    pub fn is_override(self) -> bool {
        self.next == SlotState::OverriddenOnce
    }
}

/// One unique-stanza slot: its FSM state and the recorded value.
#[derive(Debug, Clone)]
pub struct StanzaGuard<T> {
    state: SlotState,
    value: Option<T>,
}

impl<T> Default for StanzaGuard<T> {
    fn default() -> Self {
        Self {
            state: SlotState::Unset,
            value: None,
        }
    }
}

impl<T> StanzaGuard<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    /// Read the recorded value. Never changes state.
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// Check whether an assignment is allowed without recording anything.
    pub fn admit(
        &self,
        inside_conditional: bool,
        allow_reassignment: bool,
    ) -> Result<Admission, GuardViolation> {
        let next = match (self.state, inside_conditional) {
            (SlotState::Unset, false) => SlotState::SetOutsideConditional,
            (SlotState::Unset, true) => SlotState::SetInsideConditional,
            _ if allow_reassignment => self.state,
            (_, false) => return Err(GuardViolation::DuplicateStanza),
            (SlotState::OverriddenOnce, true) => return Err(GuardViolation::DuplicateOverride),
            (_, true) => SlotState::OverriddenOnce,
        };
        Ok(Admission { next })
    }

    pub fn commit(&mut self, admission: Admission, value: T) {
        self.state = admission.next;
        self.value = Some(value);
    }

    pub fn assign(
        &mut self,
        value: T,
        inside_conditional: bool,
        allow_reassignment: bool,
    ) -> Result<SlotState, GuardViolation> {
        let admission = self.admit(inside_conditional, allow_reassignment)?;
        self.commit(admission, value);
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_assignment_outside() {
        let mut guard = StanzaGuard::new();
        assert_eq!(guard.assign("1.0", false, false), Ok(SlotState::SetOutsideConditional));
        assert_eq!(guard.get(), Some(&"1.0"));
    }

    #[test]
    fn duplicate_outside_fails() {
        let mut guard = StanzaGuard::new();
        guard.assign("1.0", false, false).unwrap();
        assert_eq!(guard.assign("2.0", false, false), Err(GuardViolation::DuplicateStanza));
        assert_eq!(guard.get(), Some(&"1.0"));
    }

    #[test]
    fn override_inside_once() {
        let mut guard = StanzaGuard::new();
        guard.assign("1.0", false, false).unwrap();
        assert_eq!(guard.assign("1.0-linux", true, false), Ok(SlotState::OverriddenOnce));
        assert_eq!(guard.get(), Some(&"1.0-linux"));
        assert_eq!(guard.assign("again", true, false), Err(GuardViolation::DuplicateOverride));
        assert_eq!(guard.assign("again", false, false), Err(GuardViolation::DuplicateStanza));
    }

    #[test]
    fn conditional_only_path() {
        let mut guard = StanzaGuard::new();
        assert_eq!(guard.assign(1, true, false), Ok(SlotState::SetInsideConditional));
        assert_eq!(guard.assign(2, true, false), Ok(SlotState::OverriddenOnce));
        assert_eq!(guard.assign(3, true, false), Err(GuardViolation::DuplicateOverride));
    }

    #[test]
    fn set_inside_then_outside_is_duplicate() {
        let mut guard = StanzaGuard::new();
        guard.assign(1, true, false).unwrap();
        assert_eq!(guard.assign(2, false, false), Err(GuardViolation::DuplicateStanza));
    }

    #[test]
    fn reassignment_mode_admits_everything() {
        let mut guard = StanzaGuard::new();
        guard.assign(1, false, true).unwrap();
        assert_eq!(guard.assign(2, false, true), Ok(SlotState::SetOutsideConditional));
        guard.assign(3, true, false).unwrap();
        assert_eq!(guard.assign(4, true, true), Ok(SlotState::OverriddenOnce));
        assert_eq!(guard.get(), Some(&4));
    }

    #[test]
    fn rejected_admission_records_nothing() {
        let mut guard = StanzaGuard::new();
        guard.assign("a", false, false).unwrap();
        assert!(guard.admit(false, false).is_err());
        assert_eq!(guard.state(), SlotState::SetOutsideConditional);
        let admission = guard.admit(true, false).unwrap();
        assert!(admission.is_override());
        assert_eq!(guard.state(), SlotState::SetOutsideConditional);
    }

    #[test]
    fn reads_are_idempotent() {
        let mut guard = StanzaGuard::new();
        guard.assign(String::from("x"), false, false).unwrap();
        let state = guard.state();
        for _ in 0..5 {
            assert_eq!(guard.get().map(String::as_str), Some("x"));
        }
        assert_eq!(guard.state(), state);
    }

    #[test]
    fn names_are_stanza_keys() {
        assert_eq!(UniqueStanza::AutoUpdates.name(), "auto_updates");
        assert_eq!(UniqueStanza::ALL.len(), 10);
        assert_eq!(UniqueStanza::ConflictsWith.to_string(), "conflicts_with");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn at_most_one_override_without_reassignment(
                placements in proptest::collection::vec(any::<bool>(), 0..12),
            ) {
                let mut guard = StanzaGuard::new();
                let mut accepted = Vec::new();
                for (i, inside) in placements.iter().copied().enumerate() {
                    let before = guard.state();
                    match guard.assign(i, inside, false) {
                        Ok(_) => accepted.push((i, inside)),
                        Err(_) => prop_assert_eq!(guard.state(), before),
                    }
                }
                prop_assert!(accepted.len() <= 2);
                if let [_, (_, second_inside)] = accepted.as_slice() {
                    prop_assert!(*second_inside);
                    prop_assert_eq!(guard.state(), SlotState::OverriddenOnce);
                }
                prop_assert_eq!(guard.get().copied(), accepted.last().map(|(i, _)| *i));
            }

            #[test]
            fn reassignment_accepts_everything(
                placements in proptest::collection::vec(any::<bool>(), 1..12),
            ) {
                let mut guard = StanzaGuard::new();
                for (i, inside) in placements.iter().copied().enumerate() {
                    prop_assert!(guard.assign(i, inside, true).is_ok());
                }
                prop_assert_eq!(guard.get().copied(), Some(placements.len() - 1));
            }
        }
    }
}
