//! Handler priority.

use serde::{Deserialize, Serialize};

/// Relative invocation order among handlers matched by the same publish.
///
/// Higher levels run first. `Unset` is the default and sorts below every
/// explicit level, so handlers that never asked for a priority run last.
#[derive(
    Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Unset,
    Level(i32),
}

impl Priority {
    pub const LOWEST: Priority = Priority::Level(0);
    pub const LOW: Priority = Priority::Level(25);
    pub const NORMAL: Priority = Priority::Level(50);
    pub const HIGH: Priority = Priority::Level(75);
    pub const HIGHEST: Priority = Priority::Level(100);

    pub fn is_set(&self) -> bool {
        !matches!(self, Priority::Unset)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Priority::Level(value)
    }
}

impl core::fmt::Display for Priority {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Priority::Unset => f.write_str("unset"),
            Priority::Level(level) => write!(f, "{level}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn named_levels_are_ordered() {
        assert!(Priority::HIGHEST > Priority::HIGH);
        assert!(Priority::HIGH > Priority::NORMAL);
        assert!(Priority::NORMAL > Priority::LOW);
        assert!(Priority::LOW > Priority::LOWEST);
        assert_eq!(Priority::default(), Priority::Unset);
        assert!(!Priority::Unset.is_set());
        assert!(Priority::from(7).is_set());
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: `Unset` sorts below any explicit level, including negative ones.
        #[test]
        fn unset_sorts_below_every_level(level in any::<i32>()) {
            prop_assert!(Priority::Unset < Priority::Level(level));
        }

        /// Property: explicit levels order exactly like their integers.
        #[test]
        fn levels_order_like_integers(a in any::<i32>(), b in any::<i32>()) {
            prop_assert_eq!(Priority::from(a).cmp(&Priority::from(b)), a.cmp(&b));
        }
    }
}
