//! Label / jump tracking
//!
//! Labels are small integer handles into a per-function table. A label is
//! unresolved until [`LabelTable::resolve`] binds it to the index of the next
//! instruction to be emitted. Jump instructions are linked to labels with
//! [`LabelTable::mark_as_jump`]; their offsets are computed during layout.

use crate::packer::{InstrRecord, JumpLink};
use std::fmt;

/// Handle for a jump target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl Label {
    /// Label with a known table index
    pub fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// Index into the label table
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Per-function label table
#[derive(Debug, Default)]
pub struct LabelTable {
    /// Instruction index each label points at, once resolved
    targets: Vec<Option<usize>>,
}

impl LabelTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh unresolved label
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.targets.len() as u32);
        self.targets.push(None);
        label
    }

    /// Bind `label` to instruction index `instr_index`.
    ///
    /// Panics if the label was never allocated or is already resolved.
    pub fn resolve(&mut self, label: Label, instr_index: usize) {
        let slot = self
            .targets
            .get_mut(label.index())
            .unwrap_or_else(|| panic!("label {} was never allocated", label));
        assert!(slot.is_none(), "label {} resolved twice", label);
        *slot = Some(instr_index);
    }

    /// Instruction index of a resolved label
    pub fn target(&self, label: Label) -> Option<usize> {
        self.targets.get(label.index()).copied().flatten()
    }

    /// Whether `label` has been bound
    pub fn is_resolved(&self, label: Label) -> bool {
        self.target(label).is_some()
    }

    /// Number of allocated labels
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether no label was allocated
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Iterate over all labels with their resolution
    pub fn iter(&self) -> impl Iterator<Item = (Label, Option<usize>)> + '_ {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, target)| (Label(i as u32), *target))
    }

    /// Record that `record` ends with a jump field at byte `field_offset`
    /// whose value must become the distance to `label`.
    ///
    /// Panics if the label was never allocated or the opcode has no jump field.
    pub fn mark_as_jump(&self, record: &mut InstrRecord, label: Label, field_offset: usize) {
        assert!(
            label.index() < self.targets.len(),
            "label {} was never allocated",
            label
        );
        assert!(
            record.opcode().has_jump_field(),
            "{} has no jump field",
            record.opcode()
        );
        record.set_jump(JumpLink { label, field_offset });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::Instr;

    #[test]
    fn test_new_labels_are_unresolved() {
        let mut labels = LabelTable::new();
        let a = labels.new_label();
        let b = labels.new_label();
        assert_ne!(a, b);
        assert_eq!(labels.len(), 2);
        assert!(!labels.is_resolved(a));
        assert_eq!(labels.target(b), None);
    }

    #[test]
    fn test_resolve() {
        let mut labels = LabelTable::new();
        let a = labels.new_label();
        labels.resolve(a, 7);
        assert_eq!(labels.target(a), Some(7));
        assert_eq!(labels.iter().collect::<Vec<_>>(), vec![(a, Some(7))]);
    }

    #[test]
    #[should_panic(expected = "resolved twice")]
    fn test_double_resolve_panics() {
        let mut labels = LabelTable::new();
        let a = labels.new_label();
        labels.resolve(a, 0);
        labels.resolve(a, 1);
    }

    #[test]
    #[should_panic(expected = "never allocated")]
    fn test_resolve_unknown_label_panics() {
        let mut labels = LabelTable::new();
        labels.resolve(Label::from_index(3), 0);
    }

    #[test]
    fn test_mark_as_jump() {
        let mut labels = LabelTable::new();
        let target = labels.new_label();
        let mut record = InstrRecord::new(&Instr::Jump { target }, 1, 0);
        labels.mark_as_jump(&mut record, target, 1);
        assert_eq!(record.jump().map(|j| j.label), Some(target));
    }

    #[test]
    #[should_panic(expected = "has no jump field")]
    fn test_mark_non_jump_panics() {
        let mut labels = LabelTable::new();
        let target = labels.new_label();
        let mut record = InstrRecord::new(&Instr::Return, 1, 0);
        labels.mark_as_jump(&mut record, target, 1);
    }
}
