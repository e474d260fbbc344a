//! Badge catalog. Badges are earned once and never revoked.

use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
  pub id: &'static str,
  pub name: &'static str,
  pub description: &'static str,
  /// Total XP needed; 0 means the first completed lesson earns it.
  pub xp_required: u64,
}

pub static BADGES: [Badge; 4] = [
  Badge { id: "first_lesson", name: "First Steps", description: "Completed your first lesson", xp_required: 0 },
  Badge { id: "xp_100", name: "Quick Learner", description: "Earned 100 XP", xp_required: 100 },
  Badge { id: "xp_500", name: "Rising Star", description: "Earned 500 XP", xp_required: 500 },
  Badge { id: "xp_1000", name: "Market Scholar", description: "Earned 1000 XP", xp_required: 1000 },
];

/// Badges a user with `total_xp` qualifies for after completing a lesson,
/// minus the ones in `owned`.
pub fn newly_earned(total_xp: u64, owned: &[String]) -> Vec<&'static Badge> {
  BADGES
    .iter()
    .filter(|b| total_xp >= b.xp_required)
    .filter(|b| !owned.iter().any(|o| o == b.id))
    .collect()
}
