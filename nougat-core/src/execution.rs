use redcode::{CompleteInstruction, FieldValue, Modifier, Opcode};

use crate::{
    core_memory::{Core, CoreAddr, FieldSel, Pid},
    operands::{apply_postinc, resolve, Operand, OperandSlot},
    tracer::Tracer,
};

/// Everything an opcode needs: the core, the executing instruction's
/// context, and both resolved operands.
struct OpInputs<'a> {
    /// The live core
    core: &'a mut Core,
    /// Execution observer
    tracer: &'a mut Tracer,
    /// Address of the executing instruction
    pc: CoreAddr,
    /// Executing warrior
    pid: Pid,
    /// Modifier of the executing instruction
    modifier: Modifier,
    /// Resolved A operand
    a: &'a Operand,
    /// Resolved B operand
    b: &'a Operand,
}

impl OpInputs<'_> {
    /// `pc + 1`, the usual successor
    fn next_pc(&self) -> CoreAddr {
        self.core.offset(self.pc, 1)
    }

    /// Write one field of the B-target, honoring the write window
    fn store_b_target(&mut self, field: FieldSel, value: FieldValue) {
        self.core.store_field(
            self.pc,
            self.b.pointer,
            field,
            value,
            self.pid,
            self.tracer,
        );
    }
}

/// Execute the instruction at `pc` on behalf of `pid`.
///
/// Returns the ordered successor PCs to enqueue: empty when the process
/// dies, two for a fork.  Successors outside the read window from `pc`
/// have already been dropped.
pub fn execute(
    core: &mut Core,
    pc: CoreAddr,
    pid: Pid,
    tracer: &mut Tracer,
) -> Vec<CoreAddr> {
    let cur = core.get(pc).instr;
    tracer.begin_instruction(pc, cur, pid);

    // Operand evaluation order: A pre-effects and snapshot first, then B.
    // Post-increments wait until the opcode has run.
    tracer.begin_a_operand();
    let a = resolve(core, pc, OperandSlot::A, pid, tracer);
    tracer.begin_b_operand();
    let b = resolve(core, pc, OperandSlot::B, pid, tracer);
    tracer.operation(&cur.instr.opcode.to_string());

    let mut successors = {
        let mut inputs = OpInputs {
            core,
            tracer,
            pc,
            pid,
            modifier: cur.instr.modifier,
            a: &a,
            b: &b,
        };
        match cur.instr.opcode {
            Opcode::Dat => Vec::new(),
            Opcode::Mov => mov_op(&mut inputs),
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod => arithmetic_op(&mut inputs, cur.instr.opcode),
            Opcode::Jmp => vec![inputs.a.pointer],
            Opcode::Jmz => jmz_op(&inputs),
            Opcode::Jmn => jmn_op(&inputs),
            Opcode::Djn => djn_op(&mut inputs),
            Opcode::Spl => vec![inputs.next_pc(), inputs.a.pointer],
            Opcode::Slt => slt_op(&inputs),
            Opcode::Cmp | Opcode::Seq => seq_op(&inputs),
            Opcode::Sne => sne_op(&inputs),
            Opcode::Nop => vec![inputs.next_pc()],
        }
    };

    // A's post-increment applies before B's, both against the live core
    tracer.begin_a_operand();
    apply_postinc(core, pc, &a, pid, tracer);
    tracer.begin_b_operand();
    apply_postinc(core, pc, &b, pid, tracer);

    successors.retain(|&s| core.in_read_window(pc, s));
    successors
}

/// The field pairs a modifier combines: `(destination, b_value, a_value)`
/// per spec table, where writes land in the destination field of the
/// B-target
fn field_pairs(
    modifier: Modifier,
    a: &CompleteInstruction,
    b: &CompleteInstruction,
) -> Vec<(FieldSel, FieldValue, FieldValue)> {
    match modifier {
        Modifier::A => vec![(FieldSel::A, b.a_field, a.a_field)],
        Modifier::B => vec![(FieldSel::B, b.b_field, a.b_field)],
        Modifier::AB => vec![(FieldSel::B, b.b_field, a.a_field)],
        Modifier::BA => vec![(FieldSel::A, b.a_field, a.b_field)],
        Modifier::F | Modifier::I => vec![
            (FieldSel::A, b.a_field, a.a_field),
            (FieldSel::B, b.b_field, a.b_field),
        ],
        Modifier::X => vec![
            (FieldSel::A, b.a_field, a.b_field),
            (FieldSel::B, b.b_field, a.a_field),
        ],
    }
}

/// `MOV` copies fields of the A-snapshot into the B-target; `.I` replaces
/// the whole target instruction
fn mov_op(inputs: &mut OpInputs) -> Vec<CoreAddr> {
    let next = inputs.next_pc();
    match inputs.modifier {
        Modifier::A => {
            inputs.store_b_target(FieldSel::A, inputs.a.target.a_field);
        }
        Modifier::B => {
            inputs.store_b_target(FieldSel::B, inputs.a.target.b_field);
        }
        Modifier::AB => {
            inputs.store_b_target(FieldSel::B, inputs.a.target.a_field);
        }
        Modifier::BA => {
            inputs.store_b_target(FieldSel::A, inputs.a.target.b_field);
        }
        Modifier::F => {
            inputs.store_b_target(FieldSel::A, inputs.a.target.a_field);
            inputs.store_b_target(FieldSel::B, inputs.a.target.b_field);
        }
        Modifier::X => {
            inputs.store_b_target(FieldSel::A, inputs.a.target.b_field);
            inputs.store_b_target(FieldSel::B, inputs.a.target.a_field);
        }
        Modifier::I => {
            inputs.core.store(
                inputs.pc,
                inputs.b.pointer,
                inputs.a.target,
                inputs.pid,
                inputs.tracer,
            );
        }
    }
    vec![next]
}

/// One arithmetic combination modulo the core size; `None` on a zero
/// divisor
fn combine(
    op: Opcode,
    lhs: FieldValue,
    rhs: FieldValue,
    core: &Core,
) -> Option<FieldValue> {
    let size = u64::from(core.size());
    match op {
        Opcode::Add => Some(core.offset(lhs, i64::from(rhs))),
        Opcode::Sub => Some(core.offset(lhs, -i64::from(rhs))),
        #[allow(clippy::cast_possible_truncation)]
        Opcode::Mul => {
            Some((u64::from(lhs) * u64::from(rhs) % size) as FieldValue)
        }
        Opcode::Div => (rhs != 0).then(|| lhs / rhs),
        Opcode::Mod => (rhs != 0).then(|| lhs % rhs),
        // execute() only dispatches arithmetic opcodes here
        _ => unreachable!("combine called with non-arithmetic opcode {op}"),
    }
}

/// `ADD SUB MUL DIV MOD`: combine per the modifier's field pairs.  Every
/// pair is attempted; pairs with a zero divisor leave their field
/// untouched and the process dies after the rest are written.
fn arithmetic_op(inputs: &mut OpInputs, op: Opcode) -> Vec<CoreAddr> {
    let next = inputs.next_pc();
    let mut divided_by_zero = false;
    for (dest, b_value, a_value) in
        field_pairs(inputs.modifier, &inputs.a.target, &inputs.b.target)
    {
        match combine(op, b_value, a_value, inputs.core) {
            Some(value) => inputs.store_b_target(dest, value),
            None => divided_by_zero = true,
        }
    }
    if divided_by_zero {
        Vec::new()
    } else {
        vec![next]
    }
}

/// The B-target fields a modifier tests in `JMZ`/`JMN`/`DJN`
fn tested_fields(
    modifier: Modifier,
    b: &CompleteInstruction,
) -> Vec<FieldValue> {
    match modifier {
        Modifier::A | Modifier::BA => vec![b.a_field],
        Modifier::B | Modifier::AB => vec![b.b_field],
        Modifier::F | Modifier::X | Modifier::I => {
            vec![b.a_field, b.b_field]
        }
    }
}

/// `JMZ` branches when every tested field is zero
fn jmz_op(inputs: &OpInputs) -> Vec<CoreAddr> {
    let zero = tested_fields(inputs.modifier, &inputs.b.target)
        .iter()
        .all(|&field| field == 0);
    if zero {
        vec![inputs.a.pointer]
    } else {
        vec![inputs.next_pc()]
    }
}

/// `JMN` branches when every tested field is nonzero; it falls through
/// when any tested field is zero, which is not the negation of `JMZ`
fn jmn_op(inputs: &OpInputs) -> Vec<CoreAddr> {
    let nonzero = tested_fields(inputs.modifier, &inputs.b.target)
        .iter()
        .all(|&field| field != 0);
    if nonzero {
        vec![inputs.a.pointer]
    } else {
        vec![inputs.next_pc()]
    }
}

/// `DJN` decrements the B-target fields selected by the modifier, then
/// branches unless the decremented B-value is all zero
fn djn_op(inputs: &mut OpInputs) -> Vec<CoreAddr> {
    let decremented: Vec<FieldValue> =
        tested_fields(inputs.modifier, &inputs.b.target)
            .iter()
            .map(|&field| inputs.core.offset(field, -1))
            .collect();
    let fields = match inputs.modifier {
        Modifier::A | Modifier::BA => vec![FieldSel::A],
        Modifier::B | Modifier::AB => vec![FieldSel::B],
        Modifier::F | Modifier::X | Modifier::I => {
            vec![FieldSel::A, FieldSel::B]
        }
    };
    for field in fields {
        inputs.core.bump_field(
            inputs.pc,
            inputs.b.pointer,
            field,
            -1,
            inputs.pid,
            inputs.tracer,
        );
    }
    if decremented.iter().any(|&field| field != 0) {
        vec![inputs.a.pointer]
    } else {
        vec![inputs.next_pc()]
    }
}

/// The compared `(a_value, b_value)` pairs for the skip instructions
fn compared_pairs(
    modifier: Modifier,
    a: &CompleteInstruction,
    b: &CompleteInstruction,
) -> Vec<(FieldValue, FieldValue)> {
    match modifier {
        Modifier::A => vec![(a.a_field, b.a_field)],
        Modifier::B => vec![(a.b_field, b.b_field)],
        Modifier::AB => vec![(a.a_field, b.b_field)],
        Modifier::BA => vec![(a.b_field, b.a_field)],
        Modifier::F | Modifier::I => vec![
            (a.a_field, b.a_field),
            (a.b_field, b.b_field),
        ],
        Modifier::X => vec![
            (a.a_field, b.b_field),
            (a.b_field, b.a_field),
        ],
    }
}

/// Skip helper: `pc + 2` when the condition holds, else `pc + 1`
fn skip_if(inputs: &OpInputs, condition: bool) -> Vec<CoreAddr> {
    let amount = if condition { 2 } else { 1 };
    vec![inputs.core.offset(inputs.pc, amount)]
}

/// `SEQ`/`CMP`: skip when equal.  `.I` compares the entire instruction,
/// opcode and modifier included
fn seq_op(inputs: &OpInputs) -> Vec<CoreAddr> {
    let equal = if inputs.modifier == Modifier::I {
        inputs.a.target == inputs.b.target
    } else {
        compared_pairs(inputs.modifier, &inputs.a.target, &inputs.b.target)
            .iter()
            .all(|&(a, b)| a == b)
    };
    skip_if(inputs, equal)
}

/// `SNE`: skip when any compared part differs
fn sne_op(inputs: &OpInputs) -> Vec<CoreAddr> {
    let unequal = if inputs.modifier == Modifier::I {
        inputs.a.target != inputs.b.target
    } else {
        compared_pairs(inputs.modifier, &inputs.a.target, &inputs.b.target)
            .iter()
            .any(|&(a, b)| a != b)
    };
    skip_if(inputs, unequal)
}

/// `SLT`: skip when every compared A part is less than its B counterpart.
/// `.I` has no whole-instruction ordering and behaves as `.F`
fn slt_op(inputs: &OpInputs) -> Vec<CoreAddr> {
    let less = compared_pairs(
        inputs.modifier,
        &inputs.a.target,
        &inputs.b.target,
    )
    .iter()
    .all(|&(a, b)| a < b);
    skip_if(inputs, less)
}
