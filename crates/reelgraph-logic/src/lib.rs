// crates/reelgraph-logic/src/lib.rs
// ============================================================================
// Crate: reelgraph-logic
// Description: Tri-state (Kleene/Bochvar) requirement trees over a
//              caller-supplied leaf condition type.
// Purpose: Give a condition evaluator a comparator-agnostic boolean-with-
//          unknown algebra to build on, instead of hand-rolling And/Or
//          combinators inline next to the comparator logic.
// ============================================================================

//! ## Overview
//! A [`Requirement<P>`] is a tree of leaf conditions (`P`) combined with
//! `and`, `or`, `negate`, and `require_group` (an "at least N of" gate).
//! Evaluating one produces a [`TriState`]: `True`, `False`, or `Unknown` when
//! a leaf could not be resolved. Combinators never guess: an `Unknown` child
//! only survives when no sibling already settles the result on its own (a
//! `False` anywhere under `and`, a `True` anywhere under `or`).
//!
//! Two [`TriStateLogic`] implementations are provided: [`KleeneLogic`]
//! (strong Kleene three-valued logic) and [`BochvarLogic`] (Bochvar's
//! "infectious" unknown, where any `Unknown` operand forces the whole
//! combination to `Unknown`).

use std::fmt;

/// The three-valued outcome of evaluating a requirement or leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    /// The condition holds.
    True,
    /// The condition does not hold.
    False,
    /// The condition could not be evaluated.
    Unknown,
}

impl TriState {
    /// True only for [`TriState::True`].
    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// True only for [`TriState::False`].
    #[must_use]
    pub const fn is_false(self) -> bool {
        matches!(self, Self::False)
    }

    /// True only for [`TriState::Unknown`].
    #[must_use]
    pub const fn is_unknown(self) -> bool {
        matches!(self, Self::Unknown)
    }
}

impl From<bool> for TriState {
    fn from(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "true"),
            Self::False => write!(f, "false"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Tally of a `require_group`'s member outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupCounts {
    /// Members that evaluated to `True`.
    pub satisfied: u32,
    /// Members that evaluated to `Unknown`.
    pub unknown: u32,
    /// Total members in the group.
    pub total: u32,
}

impl GroupCounts {
    /// Members that evaluated to `False`, saturating so a miscounted group
    /// never underflows.
    #[must_use]
    pub const fn failed(self) -> u32 {
        self.total.saturating_sub(self.satisfied).saturating_sub(self.unknown)
    }
}

/// A three-valued combination algebra over [`TriState`].
pub trait TriStateLogic {
    /// Combines two operands with AND.
    fn and(&self, left: TriState, right: TriState) -> TriState;

    /// Combines two operands with OR.
    fn or(&self, left: TriState, right: TriState) -> TriState;

    /// Negates one operand.
    fn not(&self, value: TriState) -> TriState;

    /// Resolves a "require at least `min` of" group from its member tally.
    fn require_group(&self, min: u8, counts: GroupCounts) -> TriState;
}

/// Strong Kleene three-valued logic: `Unknown` behaves as "could go either
/// way," so it only survives a combination when no sibling already settles
/// the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct KleeneLogic;

impl TriStateLogic for KleeneLogic {
    fn and(&self, left: TriState, right: TriState) -> TriState {
        match (left, right) {
            (TriState::False, _) | (_, TriState::False) => TriState::False,
            (TriState::Unknown, _) | (_, TriState::Unknown) => TriState::Unknown,
            (TriState::True, TriState::True) => TriState::True,
        }
    }

    fn or(&self, left: TriState, right: TriState) -> TriState {
        match (left, right) {
            (TriState::True, _) | (_, TriState::True) => TriState::True,
            (TriState::Unknown, _) | (_, TriState::Unknown) => TriState::Unknown,
            (TriState::False, TriState::False) => TriState::False,
        }
    }

    fn not(&self, value: TriState) -> TriState {
        negate(value)
    }

    fn require_group(&self, min: u8, counts: GroupCounts) -> TriState {
        require_group_kleene(min, counts)
    }
}

/// Bochvar's "infectious" three-valued logic: any `Unknown` operand forces
/// the whole combination to `Unknown`, regardless of the other operand.
#[derive(Debug, Clone, Copy, Default)]
pub struct BochvarLogic;

impl TriStateLogic for BochvarLogic {
    fn and(&self, left: TriState, right: TriState) -> TriState {
        if left.is_unknown() || right.is_unknown() {
            return TriState::Unknown;
        }
        TriState::from(left.is_true() && right.is_true())
    }

    fn or(&self, left: TriState, right: TriState) -> TriState {
        if left.is_unknown() || right.is_unknown() {
            return TriState::Unknown;
        }
        TriState::from(left.is_true() || right.is_true())
    }

    fn not(&self, value: TriState) -> TriState {
        negate(value)
    }

    fn require_group(&self, min: u8, counts: GroupCounts) -> TriState {
        if counts.unknown > 0 {
            return TriState::Unknown;
        }
        TriState::from(u32::from(min) <= counts.satisfied)
    }
}

fn negate(value: TriState) -> TriState {
    match value {
        TriState::True => TriState::False,
        TriState::False => TriState::True,
        TriState::Unknown => TriState::Unknown,
    }
}

fn require_group_kleene(min: u8, counts: GroupCounts) -> TriState {
    let min = u32::from(min);
    if counts.satisfied >= min {
        TriState::True
    } else if counts.satisfied + counts.unknown < min {
        TriState::False
    } else {
        TriState::Unknown
    }
}

/// The logic mode a [`Requirement`] tree is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogicMode {
    /// Strong Kleene three-valued logic (the default).
    #[default]
    Kleene,
    /// Bochvar's infectious-unknown logic.
    Bochvar,
}

impl TriStateLogic for LogicMode {
    fn and(&self, left: TriState, right: TriState) -> TriState {
        match self {
            Self::Kleene => KleeneLogic.and(left, right),
            Self::Bochvar => BochvarLogic.and(left, right),
        }
    }

    fn or(&self, left: TriState, right: TriState) -> TriState {
        match self {
            Self::Kleene => KleeneLogic.or(left, right),
            Self::Bochvar => BochvarLogic.or(left, right),
        }
    }

    fn not(&self, value: TriState) -> TriState {
        negate(value)
    }

    fn require_group(&self, min: u8, counts: GroupCounts) -> TriState {
        match self {
            Self::Kleene => KleeneLogic.require_group(min, counts),
            Self::Bochvar => BochvarLogic.require_group(min, counts),
        }
    }
}

/// A leaf condition type that can evaluate itself against a caller-defined
/// reading context.
pub trait TriStateConditionEval {
    /// The context a leaf condition reads from to produce its `TriState`.
    type Reader<'a>
    where
        Self: 'a;

    /// Evaluates this leaf at `row` against `reader`.
    fn eval_row_tristate(&self, reader: &Self::Reader<'_>, row: usize) -> TriState;
}

/// Observes each leaf condition's outcome as a [`Requirement`] tree is
/// evaluated, for callers that need more than the tri-state verdict (e.g. a
/// human-readable reason for the first non-`True` leaf reached).
pub trait RequirementTrace<P> {
    /// Called once per leaf, in evaluation order, with its result.
    fn on_condition_evaluated(&mut self, condition: &P, result: TriState);
}

impl<P> RequirementTrace<P> for () {
    fn on_condition_evaluated(&mut self, _condition: &P, _result: TriState) {}
}

/// A tree of leaf conditions combined with and/or/negate/require-at-least-N.
#[derive(Debug, Clone)]
pub enum Requirement<P> {
    /// A single leaf condition.
    Condition(P),
    /// All members must hold.
    And(Vec<Requirement<P>>),
    /// At least one member must hold.
    Or(Vec<Requirement<P>>),
    /// The negation of one member.
    Negate(Box<Requirement<P>>),
    /// At least `min` of `members` must hold.
    Group {
        /// The minimum number of members that must be `True`.
        min: u8,
        /// The group's members.
        members: Vec<Requirement<P>>,
    },
}

impl<P> Requirement<P> {
    /// A single leaf condition.
    #[must_use]
    pub fn condition(leaf: P) -> Self {
        Self::Condition(leaf)
    }

    /// All of `members` must hold.
    #[must_use]
    pub fn and(members: Vec<Self>) -> Self {
        Self::And(members)
    }

    /// At least one of `members` must hold.
    #[must_use]
    pub fn or(members: Vec<Self>) -> Self {
        Self::Or(members)
    }

    /// The negation of `inner`.
    #[must_use]
    pub fn negate(inner: Self) -> Self {
        Self::Negate(Box::new(inner))
    }

    /// At least `min` of `members` must hold.
    #[must_use]
    pub fn require_group(min: u8, members: Vec<Self>) -> Self {
        Self::Group { min, members }
    }
}

impl<P: TriStateConditionEval> Requirement<P> {
    /// Evaluates this requirement tree at `row` against `reader`, under
    /// `logic`, discarding per-leaf detail.
    #[must_use]
    pub fn eval_tristate(
        &self,
        reader: &P::Reader<'_>,
        row: usize,
        logic: &impl TriStateLogic,
    ) -> TriState {
        self.eval_tristate_with_trace(reader, row, logic, &mut ())
    }

    /// Evaluates this requirement tree at `row` against `reader`, under
    /// `logic`, reporting every leaf's outcome to `trace` as it is reached.
    pub fn eval_tristate_with_trace(
        &self,
        reader: &P::Reader<'_>,
        row: usize,
        logic: &impl TriStateLogic,
        trace: &mut impl RequirementTrace<P>,
    ) -> TriState {
        match self {
            Self::Condition(leaf) => {
                let result = leaf.eval_row_tristate(reader, row);
                trace.on_condition_evaluated(leaf, result);
                result
            }
            Self::And(members) => members.iter().fold(TriState::True, |acc, member| {
                logic.and(acc, member.eval_tristate_with_trace(reader, row, logic, trace))
            }),
            Self::Or(members) => members.iter().fold(TriState::False, |acc, member| {
                logic.or(acc, member.eval_tristate_with_trace(reader, row, logic, trace))
            }),
            Self::Negate(inner) => logic.not(inner.eval_tristate_with_trace(reader, row, logic, trace)),
            Self::Group { min, members } => {
                let mut counts = GroupCounts {
                    total: u32::try_from(members.len()).unwrap_or(u32::MAX),
                    ..GroupCounts::default()
                };
                for member in members {
                    match member.eval_tristate_with_trace(reader, row, logic, trace) {
                        TriState::True => counts.satisfied += 1,
                        TriState::Unknown => counts.unknown += 1,
                        TriState::False => {}
                    }
                }
                logic.require_group(*min, counts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BoolLeaf(TriState);

    impl TriStateConditionEval for BoolLeaf {
        type Reader<'a> = ();

        fn eval_row_tristate(&self, _reader: &Self::Reader<'_>, _row: usize) -> TriState {
            self.0
        }
    }

    #[test]
    fn kleene_and_is_unknown_when_no_operand_is_false() {
        assert_eq!(KleeneLogic.and(TriState::True, TriState::Unknown), TriState::Unknown);
        assert_eq!(KleeneLogic.and(TriState::Unknown, TriState::False), TriState::False);
    }

    #[test]
    fn kleene_or_short_circuits_on_true() {
        assert_eq!(KleeneLogic.or(TriState::Unknown, TriState::True), TriState::True);
        assert_eq!(KleeneLogic.or(TriState::Unknown, TriState::False), TriState::Unknown);
    }

    #[test]
    fn bochvar_unknown_is_infectious() {
        assert_eq!(BochvarLogic.and(TriState::True, TriState::Unknown), TriState::Unknown);
        assert_eq!(BochvarLogic.or(TriState::False, TriState::Unknown), TriState::Unknown);
    }

    #[test]
    fn require_group_resolves_true_as_soon_as_min_is_met() {
        let counts = GroupCounts { satisfied: 2, unknown: 1, total: 4 };
        assert_eq!(KleeneLogic.require_group(2, counts), TriState::True);
    }

    #[test]
    fn require_group_is_unknown_while_min_is_still_reachable() {
        let counts = GroupCounts { satisfied: 1, unknown: 2, total: 4 };
        assert_eq!(KleeneLogic.require_group(3, counts), TriState::Unknown);
    }

    #[test]
    fn require_group_is_false_once_min_is_unreachable() {
        let counts = GroupCounts { satisfied: 1, unknown: 0, total: 4 };
        assert_eq!(KleeneLogic.require_group(3, counts), TriState::False);
    }

    #[test]
    fn group_counts_failed_never_underflows() {
        let counts = GroupCounts { satisfied: 10, unknown: 10, total: 5 };
        assert_eq!(counts.failed(), 0);
    }

    #[test]
    fn requirement_tree_evaluates_nested_and_or() {
        let tree = Requirement::and(vec![
            Requirement::condition(BoolLeaf(TriState::True)),
            Requirement::or(vec![
                Requirement::condition(BoolLeaf(TriState::False)),
                Requirement::condition(BoolLeaf(TriState::Unknown)),
            ]),
        ]);
        assert_eq!(tree.eval_tristate(&(), 0, &KleeneLogic), TriState::Unknown);
    }

    #[test]
    fn trace_observes_every_leaf_in_order() {
        let tree = Requirement::and(vec![
            Requirement::condition(BoolLeaf(TriState::True)),
            Requirement::condition(BoolLeaf(TriState::False)),
        ]);
        struct RecordingTrace(Vec<TriState>);
        impl RequirementTrace<BoolLeaf> for RecordingTrace {
            fn on_condition_evaluated(&mut self, _condition: &BoolLeaf, result: TriState) {
                self.0.push(result);
            }
        }
        let mut trace = RecordingTrace(Vec::new());
        let result = tree.eval_tristate_with_trace(&(), 0, &KleeneLogic, &mut trace);
        assert_eq!(result, TriState::False);
        assert_eq!(trace.0, vec![TriState::True, TriState::False]);
    }
}
