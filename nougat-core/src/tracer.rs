use std::collections::{HashMap, VecDeque};

use redcode::CompleteInstruction;

use crate::core_memory::{CoreAddr, Pid};

/// Default bound for the global and per-PID trace rings
pub const DEFAULT_TRACE_CAPACITY: usize = 4096;

/// Execution observer passed explicitly through the executor and memory
/// core.
///
/// The tracer records information derived from execution; it never owns or
/// mutates core state.  The two variants make the no-op case free of
/// indirection and keep call sites honest about which observer is in play.
#[derive(Debug, Default)]
pub enum Tracer {
    /// Record nothing
    #[default]
    Null,
    /// Record bounded rings of per-instruction trace records
    Recording(RecordingTracer),
}

impl Tracer {
    /// Note the cycle number for subsequent records
    pub fn cycle(&mut self, cycle: u32) {
        if let Self::Recording(rec) = self {
            rec.cycle = cycle;
        }
    }

    /// Begin a record for the instruction about to execute, flushing the
    /// previous one
    pub fn begin_instruction(
        &mut self,
        address: CoreAddr,
        instruction: CompleteInstruction,
        pid: Pid,
    ) {
        if let Self::Recording(rec) = self {
            rec.flush();
            rec.current = Some(TraceRecord {
                cycle: rec.cycle,
                pid,
                address,
                instruction,
                ..TraceRecord::default()
            });
        }
    }

    /// Subsequent loads and stores belong to the A operand
    pub fn begin_a_operand(&mut self) {
        if let Self::Recording(rec) = self {
            rec.phase = Phase::A;
        }
    }

    /// Subsequent loads and stores belong to the B operand
    pub fn begin_b_operand(&mut self) {
        if let Self::Recording(rec) = self {
            rec.phase = Phase::B;
        }
    }

    /// Operand evaluation finished; `text` names the operation about to run
    /// and subsequent stores are opcode stores
    pub fn operation(&mut self, text: &str) {
        if let Self::Recording(rec) = self {
            rec.phase = Phase::Operation;
            if let Some(current) = &mut rec.current {
                current.operation = Some(text.to_owned());
            }
        }
    }

    /// Record a resolved operand: its pointer, the target snapshot the
    /// opcode will see, and the cell a deferred post-increment will touch
    pub fn log_operand(
        &mut self,
        pointer: CoreAddr,
        target: CompleteInstruction,
        postinc: Option<CompleteInstruction>,
    ) {
        if let Self::Recording(rec) = self {
            let Some(current) = &mut rec.current else { return };
            match rec.phase {
                Phase::A => {
                    current.a_pointer = Some(pointer);
                    current.a_target = Some(target);
                    current.a_postinc = postinc;
                }
                Phase::B | Phase::Operation => {
                    current.b_pointer = Some(pointer);
                    current.b_target = Some(target);
                    current.b_postinc = postinc;
                }
            }
        }
    }

    /// Record a core read made while resolving the current operand
    pub fn log_load(&mut self, addr: CoreAddr, instr: CompleteInstruction) {
        if let Self::Recording(rec) = self {
            let Some(current) = &mut rec.current else { return };
            let loads = match rec.phase {
                Phase::A => &mut current.a_loads,
                Phase::B | Phase::Operation => &mut current.b_loads,
            };
            if loads.len() < 2 {
                loads.push((addr, instr));
            }
        }
    }

    /// Record a core write: operand side effects while an operand phase is
    /// open, opcode stores afterwards
    pub fn log_store(&mut self, addr: CoreAddr, instr: CompleteInstruction) {
        if let Self::Recording(rec) = self {
            let Some(current) = &mut rec.current else { return };
            match rec.phase {
                Phase::A => current.a_store = Some((addr, instr)),
                Phase::B => current.b_store = Some((addr, instr)),
                Phase::Operation => {
                    if current.stores.len() < 2 {
                        current.stores.push((addr, instr));
                    }
                }
            }
        }
    }

    /// Record the executing warrior's queue after its successors were
    /// enqueued
    pub fn program_counters(&mut self, queue: &[CoreAddr]) {
        if let Self::Recording(rec) = self {
            if let Some(current) = &mut rec.current {
                current.pcs = queue.to_vec();
            }
        }
    }

    /// Push any in-progress record into the rings
    pub fn flush(&mut self) {
        if let Self::Recording(rec) = self {
            rec.flush();
        }
    }
}

/// Which part of the instruction the tracer is currently observing
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
enum Phase {
    /// Resolving the A operand
    #[default]
    A,
    /// Resolving the B operand
    B,
    /// Executing the opcode
    Operation,
}

/// Everything recorded about one executed instruction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TraceRecord {
    /// Cycle the instruction executed on
    pub cycle: u32,
    /// Executing warrior
    pub pid: Pid,
    /// Address of the executed instruction
    pub address: CoreAddr,
    /// The executed instruction as loaded
    pub instruction: CompleteInstruction,
    /// Name of the executed operation
    pub operation: Option<String>,
    /// Resolved A-operand target address
    pub a_pointer: Option<CoreAddr>,
    /// Loads performed while resolving the A operand (indirection cell,
    /// then target)
    pub a_loads: Vec<(CoreAddr, CompleteInstruction)>,
    /// The A-target snapshot handed to the opcode
    pub a_target: Option<CompleteInstruction>,
    /// Operand side-effect store for the A operand
    pub a_store: Option<(CoreAddr, CompleteInstruction)>,
    /// Cell a deferred A post-increment will touch, as seen at resolve time
    pub a_postinc: Option<CompleteInstruction>,
    /// Resolved B-operand target address
    pub b_pointer: Option<CoreAddr>,
    /// Loads performed while resolving the B operand
    pub b_loads: Vec<(CoreAddr, CompleteInstruction)>,
    /// The B-target snapshot handed to the opcode
    pub b_target: Option<CompleteInstruction>,
    /// Operand side-effect store for the B operand
    pub b_store: Option<(CoreAddr, CompleteInstruction)>,
    /// Cell a deferred B post-increment will touch, as seen at resolve time
    pub b_postinc: Option<CompleteInstruction>,
    /// Opcode stores, at most two
    pub stores: Vec<(CoreAddr, CompleteInstruction)>,
    /// The warrior's process queue after enqueueing successors
    pub pcs: Vec<CoreAddr>,
}

/// Bounded recorder of [`TraceRecord`]s, globally and per warrior.
#[derive(Debug)]
pub struct RecordingTracer {
    /// Ring capacity applied to the global ring and each per-PID ring
    capacity: usize,
    /// Cycle number stamped onto new records
    cycle: u32,
    /// Routing state for loads and stores
    phase: Phase,
    /// The record being assembled for the executing instruction
    current: Option<TraceRecord>,
    /// Most recent records across all warriors
    records: VecDeque<TraceRecord>,
    /// Most recent records per warrior
    per_pid: HashMap<Pid, VecDeque<TraceRecord>>,
}

impl Default for RecordingTracer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRACE_CAPACITY)
    }
}

impl RecordingTracer {
    /// A recorder whose rings keep at most `capacity` records each
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            cycle: 0,
            phase: Phase::A,
            current: None,
            records: VecDeque::new(),
            per_pid: HashMap::new(),
        }
    }

    /// Finish the in-progress record
    fn flush(&mut self) {
        if let Some(record) = self.current.take() {
            let per_pid = self.per_pid.entry(record.pid).or_default();
            push_bounded(per_pid, record.clone(), self.capacity);
            push_bounded(&mut self.records, record, self.capacity);
        }
        self.phase = Phase::A;
    }

    /// The retained records, oldest first
    pub fn records(&self) -> impl Iterator<Item = &TraceRecord> {
        self.records.iter()
    }

    /// The retained records for one warrior, oldest first
    pub fn records_for(
        &self,
        pid: Pid,
    ) -> impl Iterator<Item = &TraceRecord> {
        self.per_pid.get(&pid).into_iter().flatten()
    }

    /// Export the retained global records as semicolon-separated CSV, one
    /// row per executed instruction.
    #[must_use]
    pub fn export_csv(&self) -> String {
        let mut out = String::from(
            "Cycle;PID;Address;Instruction;\
             A-Pointer;A-Load1;A-Load2;A-Store;\
             B-Pointer;B-Load1;B-Load2;B-Store;\
             Store1;Store2;PCS\n",
        );
        for record in &self.records {
            out.push_str(&record.to_csv_row());
            out.push('\n');
        }
        out
    }
}

impl TraceRecord {
    /// One CSV row matching the exported header
    fn to_csv_row(&self) -> String {
        let opt_addr =
            |v: &Option<CoreAddr>| v.map_or(String::new(), |a| a.to_string());
        let opt_cell = |v: &Option<(CoreAddr, CompleteInstruction)>| {
            v.as_ref()
                .map_or(String::new(), |(_, instr)| instr.to_string())
        };
        let load =
            |loads: &[(CoreAddr, CompleteInstruction)], index: usize| {
                loads
                    .get(index)
                    .map_or(String::new(), |(_, instr)| instr.to_string())
            };
        let store = |index: usize| {
            self.stores
                .get(index)
                .map_or(String::new(), |(_, instr)| instr.to_string())
        };
        let pcs = self
            .pcs
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "{};{};{};{};{};{};{};{};{};{};{};{};{};{};{}",
            self.cycle,
            self.pid,
            self.address,
            self.instruction,
            opt_addr(&self.a_pointer),
            load(&self.a_loads, 0),
            load(&self.a_loads, 1),
            opt_cell(&self.a_store),
            opt_addr(&self.b_pointer),
            load(&self.b_loads, 0),
            load(&self.b_loads, 1),
            opt_cell(&self.b_store),
            store(0),
            store(1),
            pcs,
        )
    }
}

/// Push onto a ring, dropping the oldest entry at capacity
fn push_bounded<T>(ring: &mut VecDeque<T>, value: T, capacity: usize) {
    if ring.len() == capacity {
        ring.pop_front();
    }
    ring.push_back(value);
}
