//! Two-pass layout and jump patching
//!
//! Pass one packs every non-jump instruction and positions the whole stream
//! with jumps still at their wide size. Jump offsets are then computed from
//! those positions, which lets pass two pack each jump at its final width.
//! Jumps can only shrink in pass two, so every distance can only get shorter
//! and a jump packed narrow still fits when offsets are recomputed.

use crate::error::AsmResult;
use crate::label::{Label, LabelTable};
use crate::packer::InstrRecord;

/// Lay out `records`, patch every jump and return the total code size
pub fn compress_instructions(records: &mut [InstrRecord], labels: &LabelTable) -> AsmResult<usize> {
    let code_end = assign_positions(records, false)?;
    adjust_jump_offsets(records, labels, code_end)?;

    let code_end = assign_positions(records, true)?;
    adjust_jump_offsets(records, labels, code_end)?;

    Ok(code_end)
}

/// Assign byte positions from scratch, packing either the non-jump or the jump records
fn assign_positions(records: &mut [InstrRecord], pack_jumps: bool) -> AsmResult<usize> {
    let mut position = 0;
    for record in records.iter_mut() {
        record.set_position(position);
        if record.is_jump() == pack_jumps {
            record.pack()?;
        }
        position += record.size();
    }
    Ok(position)
}

/// Rewrite every jump with `target - (position + size)`
fn adjust_jump_offsets(
    records: &mut [InstrRecord],
    labels: &LabelTable,
    code_end: usize,
) -> AsmResult<()> {
    for index in 0..records.len() {
        let Some(link) = records[index].jump() else {
            continue;
        };
        let target = label_position(records, labels, link.label, code_end);
        let record = &mut records[index];
        let offset = target as i64 - (record.position() + record.size()) as i64;
        record.set_jump_offset(offset)?;
    }
    Ok(())
}

/// Byte position of a resolved label.
///
/// A label resolved past the last instruction points at the end of the code.
/// Panics if the label is unresolved.
pub fn label_position(
    records: &[InstrRecord],
    labels: &LabelTable,
    label: Label,
    code_end: usize,
) -> usize {
    let Some(index) = labels.target(label) else {
        panic!("label {} was never resolved", label);
    };
    records.get(index).map_or(code_end, InstrRecord::position)
}
