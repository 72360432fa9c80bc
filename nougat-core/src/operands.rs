use redcode::{AddrMode, CompleteInstruction};

use crate::{
    core_memory::{Core, CoreAddr, FieldSel, Pid},
    tracer::Tracer,
};

/// Which operand of the executing instruction is being resolved
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperandSlot {
    /// The A operand
    A,
    /// The B operand
    B,
}

/// A resolved operand: where it points and what the opcode will see there.
///
/// `target` is a snapshot taken after any pre-decrement and before any
/// post-increment, so the opcode observes a stable value even when it
/// writes to the same cell.  The deferred post-increment is applied to the
/// live core once the opcode has run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Operand {
    /// Absolute address of the target cell; the PC itself for immediate
    /// operands
    pub pointer: CoreAddr,
    /// Deep copy of the target instruction
    pub target: CompleteInstruction,
    /// The indirection cell and field a post-increment mode bumps after
    /// the opcode runs
    postinc: Option<(CoreAddr, FieldSel)>,
}

/// Resolve one operand of the instruction at `pc`, applying pre-decrement
/// side effects and remembering deferred post-increments.
pub fn resolve(
    core: &mut Core,
    pc: CoreAddr,
    slot: OperandSlot,
    pid: Pid,
    tracer: &mut Tracer,
) -> Operand {
    let cur = core.get(pc).instr;
    let (mode, field) = match slot {
        OperandSlot::A => (cur.instr.a_addr_mode, cur.a_field),
        OperandSlot::B => (cur.instr.b_addr_mode, cur.b_field),
    };

    let operand = match mode {
        // An immediate operand is data: its target is the executing
        // instruction itself
        AddrMode::Immediate => Operand {
            pointer: pc,
            target: cur,
            postinc: None,
        },
        AddrMode::Direct => {
            let pointer = core.offset(pc, i64::from(field));
            Operand {
                pointer,
                target: core.load(pointer, tracer),
                postinc: None,
            }
        }
        AddrMode::IndirectA
        | AddrMode::IndirectB
        | AddrMode::PredecA
        | AddrMode::PredecB
        | AddrMode::PostincA
        | AddrMode::PostincB => {
            let secondary = match mode {
                AddrMode::IndirectA
                | AddrMode::PredecA
                | AddrMode::PostincA => FieldSel::A,
                _ => FieldSel::B,
            };
            let indirection = core.offset(pc, i64::from(field));
            if matches!(mode, AddrMode::PredecA | AddrMode::PredecB) {
                core.bump_field(
                    pc,
                    indirection,
                    secondary,
                    -1,
                    pid,
                    tracer,
                );
            }
            let via = core.load(indirection, tracer);
            let offset = match secondary {
                FieldSel::A => via.a_field,
                FieldSel::B => via.b_field,
            };
            let pointer = core.offset(indirection, i64::from(offset));
            let postinc = matches!(
                mode,
                AddrMode::PostincA | AddrMode::PostincB
            )
            .then_some((indirection, secondary));
            Operand {
                pointer,
                target: core.load(pointer, tracer),
                postinc,
            }
        }
    };

    let postinc_snapshot =
        operand.postinc.map(|(addr, _)| core.get(addr).instr);
    tracer.log_operand(operand.pointer, operand.target, postinc_snapshot);
    operand
}

/// Apply an operand's deferred post-increment to the live core.
///
/// The increment lands on the indirection cell that was used during
/// resolution, which by now may hold whatever the opcode stored there.
pub fn apply_postinc(
    core: &mut Core,
    pc: CoreAddr,
    operand: &Operand,
    pid: Pid,
    tracer: &mut Tracer,
) {
    if let Some((addr, field)) = operand.postinc {
        core.bump_field(pc, addr, field, 1, pid, tracer);
    }
}
