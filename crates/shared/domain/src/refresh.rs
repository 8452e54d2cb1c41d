use bitflags::bitflags;
use serde::{Serialize, Serializer};

bitflags! {
    /// Page regions an enhanced client should reload after a mutation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RefreshTargets: u8 {
        const SUMMARY = 1 << 0;
        const FEATURES = 1 << 1;
        const ISSUES = 1 << 2;
        const UNDO = 1 << 3;

        /// Everything that depends on the character's rule state.
        const CHARACTER = Self::SUMMARY.bits() | Self::FEATURES.bits() | Self::ISSUES.bits();
        const ALL = Self::CHARACTER.bits() | Self::UNDO.bits();
    }
}

impl RefreshTargets {
    const EVENTS: [(Self, &'static str); 4] = [
        (Self::SUMMARY, "refresh-summary"),
        (Self::FEATURES, "refresh-features"),
        (Self::ISSUES, "refresh-issues"),
        (Self::UNDO, "refresh-undo"),
    ];

    /// Client event names in a stable order.
    pub fn events(self) -> impl Iterator<Item = &'static str> {
        Self::EVENTS.into_iter().filter(move |(flag, _)| self.contains(*flag)).map(|(_, name)| name)
    }

    /// Comma separated value for the trigger header.
    #[must_use]
    pub fn header_value(self) -> String {
        self.events().collect::<Vec<_>>().join(", ")
    }
}

impl Serialize for RefreshTargets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.events())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lists_events_in_order() {
        let targets = RefreshTargets::UNDO | RefreshTargets::SUMMARY;
        assert_eq!(targets.header_value(), "refresh-summary, refresh-undo");
        assert_eq!(RefreshTargets::empty().header_value(), "");
        assert_eq!(RefreshTargets::ALL.events().count(), 4);
    }
}
