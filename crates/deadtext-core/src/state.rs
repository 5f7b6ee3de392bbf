//! The per-subject liveness state machine.
//!
//! The edge table lives in [`SubjectState::can_transition_to`]; every write
//! path (check-ins, the scheduler, administrative actions) goes through it.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Liveness state of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectState {
  /// Checked in recently enough.
  Active,
  /// Timeout elapsed; waiting out the grace period.
  Grace,
  /// Contacts have been (or are being) notified.
  Escalated,
  /// A contact acknowledged the escalation; repeat dispatch is suppressed.
  Acknowledged,
  /// Excluded from evaluation until re-enabled.
  Disabled,
}

impl SubjectState {
  pub const ALL: [SubjectState; 5] = [
    Self::Active,
    Self::Grace,
    Self::Escalated,
    Self::Acknowledged,
    Self::Disabled,
  ];

  /// The string stored in the `state` column and used on the wire.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Active => "active",
      Self::Grace => "grace",
      Self::Escalated => "escalated",
      Self::Acknowledged => "acknowledged",
      Self::Disabled => "disabled",
    }
  }

  /// Whether `self -> to` is an edge of the state machine.
  pub fn can_transition_to(self, to: SubjectState) -> bool {
    use SubjectState::*;
    match (self, to) {
      (Active, Grace)
      | (Grace, Escalated)
      | (Grace, Active)
      | (Escalated, Active)
      | (Escalated, Acknowledged)
      | (Acknowledged, Active)
      | (Acknowledged, Escalated)
      | (Disabled, Active) => true,
      (from, Disabled) => from != Disabled,
      _ => false,
    }
  }

  /// States a check-in pulls back to [`SubjectState::Active`].
  pub fn resets_on_checkin(self) -> bool {
    matches!(self, Self::Grace | Self::Escalated | Self::Acknowledged)
  }
}

impl fmt::Display for SubjectState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SubjectState {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|state| state.as_str() == s)
      .ok_or_else(|| Error::InvalidInput(format!("unknown state: {s:?}")))
  }
}

#[cfg(test)]
mod tests {
  use super::SubjectState::{self, *};

  #[test]
  fn allowed_edges() {
    let allowed = [
      (Active, Grace),
      (Grace, Escalated),
      (Grace, Active),
      (Escalated, Active),
      (Escalated, Acknowledged),
      (Acknowledged, Active),
      (Acknowledged, Escalated),
      (Active, Disabled),
      (Grace, Disabled),
      (Escalated, Disabled),
      (Acknowledged, Disabled),
      (Disabled, Active),
    ];

    for from in SubjectState::ALL {
      for to in SubjectState::ALL {
        let expected = allowed.contains(&(from, to));
        assert_eq!(
          from.can_transition_to(to),
          expected,
          "{from} -> {to} should be {}",
          if expected { "allowed" } else { "rejected" }
        );
      }
    }
  }

  #[test]
  fn active_cannot_skip_grace() {
    assert!(!Active.can_transition_to(Escalated));
    assert!(!Active.can_transition_to(Acknowledged));
  }

  #[test]
  fn disabled_is_terminal_except_enable() {
    assert!(!Disabled.can_transition_to(Disabled));
    assert!(!Disabled.can_transition_to(Grace));
    assert!(Disabled.can_transition_to(Active));
  }

  #[test]
  fn parses_its_own_strings() {
    for state in SubjectState::ALL {
      assert_eq!(state.as_str().parse::<SubjectState>().unwrap(), state);
    }
    assert!("zombie".parse::<SubjectState>().is_err());
  }
}
