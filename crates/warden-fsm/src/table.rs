//! Index-based transition table.
//!
//! The table is a fixed `states x signals` array keyed by
//! `(AlarmState::index(), Signal::index())`. An empty cell means the signal is
//! ignored in that state.

use std::fmt;

use warden_core::{AlarmState, Signal};

/// Mapping from `(state, signal)` to the next state.
///
/// # Examples
///
/// ```
/// use warden_core::{AlarmState, Signal};
/// use warden_fsm::TransitionTable;
///
/// let table = TransitionTable::alarm();
/// assert_eq!(
///     table.next(AlarmState::Disarmed, Signal::Arm),
///     Some(AlarmState::DisarmedCountdown)
/// );
/// assert_eq!(table.next(AlarmState::Disarmed, Signal::Trigger), None);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct TransitionTable {
    cells: [[Option<AlarmState>; Signal::COUNT]; AlarmState::COUNT],
}

impl TransitionTable {
    /// A table with no transitions.
    pub const fn empty() -> Self {
        Self {
            cells: [[None; Signal::COUNT]; AlarmState::COUNT],
        }
    }

    /// Add (or replace) the edge `from --signal--> to`.
    pub fn with_edge(mut self, from: AlarmState, signal: Signal, to: AlarmState) -> Self {
        self.cells[from.index()][signal.index()] = Some(to);
        self
    }

    /// The alarm topology.
    ///
    /// | From | Signal | To |
    /// |---|---|---|
    /// | Disarmed | Arm | DisarmedCountdown |
    /// | Disarmed | InstantArm | Armed |
    /// | DisarmedCountdown | Disarm | Disarmed |
    /// | DisarmedCountdown | Timeout | Armed |
    /// | DisarmedCountdown | InstantArm | Armed |
    /// | Armed | Disarm | Disarmed |
    /// | Armed | Trigger | ArmedCountdown |
    /// | ArmedCountdown | Disarm | Disarmed |
    /// | ArmedCountdown | Arm | Armed |
    /// | ArmedCountdown | InstantArm | Armed |
    /// | ArmedCountdown | Timeout | Triggered |
    /// | Triggered | Disarm | Disarmed |
    /// | Triggered | Arm | Armed |
    /// | Triggered | InstantArm | Armed |
    pub fn alarm() -> Self {
        use AlarmState::*;

        Self::empty()
            .with_edge(Disarmed, Signal::Arm, DisarmedCountdown)
            .with_edge(Disarmed, Signal::InstantArm, Armed)
            .with_edge(DisarmedCountdown, Signal::Disarm, Disarmed)
            .with_edge(DisarmedCountdown, Signal::Timeout, Armed)
            .with_edge(DisarmedCountdown, Signal::InstantArm, Armed)
            .with_edge(Armed, Signal::Disarm, Disarmed)
            .with_edge(Armed, Signal::Trigger, ArmedCountdown)
            .with_edge(ArmedCountdown, Signal::Disarm, Disarmed)
            .with_edge(ArmedCountdown, Signal::Arm, Armed)
            .with_edge(ArmedCountdown, Signal::InstantArm, Armed)
            .with_edge(ArmedCountdown, Signal::Timeout, Triggered)
            .with_edge(Triggered, Signal::Disarm, Disarmed)
            .with_edge(Triggered, Signal::Arm, Armed)
            .with_edge(Triggered, Signal::InstantArm, Armed)
    }

    /// Next state for `signal` received in `from`, if the pair is defined.
    pub fn next(&self, from: AlarmState, signal: Signal) -> Option<AlarmState> {
        self.cells[from.index()][signal.index()]
    }

    /// Every defined edge, in `(state, signal)` index order.
    pub fn edges(&self) -> impl Iterator<Item = (AlarmState, Signal, AlarmState)> + '_ {
        AlarmState::ALL.into_iter().flat_map(move |from| {
            Signal::ALL
                .into_iter()
                .filter_map(move |signal| self.next(from, signal).map(|to| (from, signal, to)))
        })
    }

    /// Number of defined edges.
    pub fn len(&self) -> usize {
        self.edges().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::alarm()
    }
}

impl fmt::Debug for TransitionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.edges()
                    .map(|(from, signal, to)| format!("{from} --{signal}--> {to}")),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use AlarmState::*;

    #[test]
    fn test_alarm_table_has_fourteen_edges() {
        assert_eq!(TransitionTable::alarm().len(), 14);
    }

    #[test]
    fn test_empty_table() {
        let table = TransitionTable::empty();
        assert!(table.is_empty());
        assert_eq!(table.next(Armed, Signal::Disarm), None);
    }

    #[rstest]
    #[case(Disarmed, Signal::Arm, DisarmedCountdown)]
    #[case(Disarmed, Signal::InstantArm, Armed)]
    #[case(DisarmedCountdown, Signal::Disarm, Disarmed)]
    #[case(DisarmedCountdown, Signal::Timeout, Armed)]
    #[case(DisarmedCountdown, Signal::InstantArm, Armed)]
    #[case(Armed, Signal::Disarm, Disarmed)]
    #[case(Armed, Signal::Trigger, ArmedCountdown)]
    #[case(ArmedCountdown, Signal::Disarm, Disarmed)]
    #[case(ArmedCountdown, Signal::Arm, Armed)]
    #[case(ArmedCountdown, Signal::InstantArm, Armed)]
    #[case(ArmedCountdown, Signal::Timeout, Triggered)]
    #[case(Triggered, Signal::Disarm, Disarmed)]
    #[case(Triggered, Signal::Arm, Armed)]
    #[case(Triggered, Signal::InstantArm, Armed)]
    fn test_defined_edges(#[case] from: AlarmState, #[case] signal: Signal, #[case] to: AlarmState) {
        assert_eq!(TransitionTable::alarm().next(from, signal), Some(to));
    }

    #[rstest]
    #[case(Disarmed, Signal::Disarm)]
    #[case(Disarmed, Signal::Timeout)]
    #[case(Disarmed, Signal::Trigger)]
    #[case(DisarmedCountdown, Signal::Arm)]
    #[case(DisarmedCountdown, Signal::Trigger)]
    #[case(Armed, Signal::Arm)]
    #[case(Armed, Signal::InstantArm)]
    #[case(Armed, Signal::Timeout)]
    #[case(ArmedCountdown, Signal::Trigger)]
    #[case(Triggered, Signal::Timeout)]
    #[case(Triggered, Signal::Trigger)]
    fn test_absent_pairs(#[case] from: AlarmState, #[case] signal: Signal) {
        assert_eq!(TransitionTable::alarm().next(from, signal), None);
    }

    #[test]
    fn test_no_self_loops() {
        assert!(TransitionTable::alarm().edges().all(|(from, _, to)| from != to));
    }

    #[test]
    fn test_with_edge_replaces() {
        let table = TransitionTable::alarm().with_edge(Armed, Signal::Trigger, Triggered);
        assert_eq!(table.next(Armed, Signal::Trigger), Some(Triggered));
        assert_eq!(table.len(), 14);
    }

    #[test]
    fn test_debug_lists_edges() {
        let table = TransitionTable::empty().with_edge(Disarmed, Signal::Arm, Armed);
        assert_eq!(format!("{table:?}"), "[\"disarmed --ARM--> armed\"]");
    }
}
