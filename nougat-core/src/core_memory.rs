use redcode::{CompleteInstruction, FieldValue};
use thiserror::Error;

use crate::tracer::Tracer;

/// An address into the core, always in `[0, size)`
pub type CoreAddr = u32;

/// Warrior identifier; zero marks a cell nobody has written
pub type Pid = u32;

/// The standard core size
pub const DEFAULT_CORE_SIZE: u32 = 8000;

/// Errors constructing a [`Core`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// The requested size cannot back a core
    #[error("cannot create a core of size {0}")]
    InvalidCoreSize(u32),

    /// A read or write limit that does not evenly divide the core size
    #[error("limit {limit} does not divide the core size {size}")]
    InvalidLimit {
        /// The offending limit
        limit: u32,
        /// The configured core size
        size: u32,
    },
}

/// Which field of an instruction a partial store touches
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FieldSel {
    /// The A-field
    A,
    /// The B-field
    B,
}

/// One core cell: an instruction plus the PID of its most recent writer.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Cell {
    /// The stored instruction
    pub instr: CompleteInstruction,
    /// PID of the warrior that last wrote this cell; 0 until someone does
    pub owner: Pid,
}

/// The circular instruction memory.
///
/// Every address handed out by a `Core` is already folded into
/// `[0, size)`.  All mutation on behalf of a warrior goes through
/// [`Core::store`], [`Core::store_field`], or [`Core::bump_field`], which
/// enforce the write window, tag ownership, and report to the tracer.
#[derive(Debug, Clone)]
pub struct Core {
    /// The cells, initially `DAT.F $0, $0` owned by nobody
    cells: Vec<Cell>,
    /// Reads (jump targets) outside this window from the PC are dropped
    read_limit: u32,
    /// Writes outside this window from the PC are no-ops
    write_limit: u32,
}

impl Core {
    /// A core of `size` cells with the given read and write limits.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError`] when `size` is zero or too large for an
    /// address, or when a limit does not evenly divide `size`.
    pub fn new(
        size: u32,
        read_limit: u32,
        write_limit: u32,
    ) -> Result<Self, CoreError> {
        if size == 0 || size > i32::MAX as u32 {
            return Err(CoreError::InvalidCoreSize(size));
        }
        for limit in [read_limit, write_limit] {
            if limit == 0 || size % limit != 0 {
                return Err(CoreError::InvalidLimit { limit, size });
            }
        }
        Ok(Self {
            cells: vec![Cell::default(); size as usize],
            read_limit,
            write_limit,
        })
    }

    /// Number of cells in the core
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn size(&self) -> CoreAddr {
        self.cells.len() as CoreAddr
    }

    /// Fold any integer into a core address in `[0, size)`.
    ///
    /// Euclidean modulo, so negative offsets wrap to the top of the core
    /// and `fold(fold(x)) == fold(x)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn fold(&self, value: i64) -> CoreAddr {
        value.rem_euclid(i64::from(self.size())) as CoreAddr
    }

    /// The address `offset` cells past `base`
    #[must_use]
    pub fn offset(&self, base: CoreAddr, offset: i64) -> CoreAddr {
        self.fold(i64::from(base).wrapping_add(offset))
    }

    /// Borrow the cell at a (folded) address
    #[must_use]
    pub fn get(&self, addr: CoreAddr) -> &Cell {
        &self.cells[addr as usize % self.cells.len()]
    }

    /// Copy the instruction at an address, reporting the read to the
    /// tracer
    pub fn load(
        &self,
        addr: CoreAddr,
        tracer: &mut Tracer,
    ) -> CompleteInstruction {
        let instr = self.get(addr).instr;
        tracer.log_load(addr, instr);
        instr
    }

    /// Whether `target` lies within the read window centered on `pc`
    #[must_use]
    pub fn in_read_window(&self, pc: CoreAddr, target: CoreAddr) -> bool {
        self.in_window(self.read_limit, pc, target)
    }

    /// Whether `target` lies within the write window centered on `pc`
    #[must_use]
    pub fn in_write_window(&self, pc: CoreAddr, target: CoreAddr) -> bool {
        self.in_window(self.write_limit, pc, target)
    }

    /// A target is inside a window when it is within `limit / 2` of the PC
    /// in either direction around the ring
    fn in_window(&self, limit: u32, pc: CoreAddr, target: CoreAddr) -> bool {
        let forward =
            self.fold(i64::from(target).wrapping_sub(i64::from(pc)));
        let backward =
            self.fold(i64::from(pc).wrapping_sub(i64::from(target)));
        forward <= limit / 2 || backward <= limit / 2
    }

    /// Replace the whole instruction at `addr` on behalf of `pid`.
    ///
    /// Returns `false` (and leaves the core untouched) when `addr` is
    /// outside the write window from `pc`.
    pub fn store(
        &mut self,
        pc: CoreAddr,
        addr: CoreAddr,
        instr: CompleteInstruction,
        pid: Pid,
        tracer: &mut Tracer,
    ) -> bool {
        if !self.in_write_window(pc, addr) {
            return false;
        }
        let size = self.cells.len();
        let cell = &mut self.cells[addr as usize % size];
        cell.instr = instr;
        cell.owner = pid;
        tracer.log_store(addr, cell.instr);
        true
    }

    /// Replace one field of the instruction at `addr` on behalf of `pid`,
    /// subject to the write window.
    pub fn store_field(
        &mut self,
        pc: CoreAddr,
        addr: CoreAddr,
        field: FieldSel,
        value: FieldValue,
        pid: Pid,
        tracer: &mut Tracer,
    ) -> bool {
        if !self.in_write_window(pc, addr) {
            return false;
        }
        let size = self.cells.len();
        let cell = &mut self.cells[addr as usize % size];
        match field {
            FieldSel::A => cell.instr.a_field = value,
            FieldSel::B => cell.instr.b_field = value,
        }
        cell.owner = pid;
        tracer.log_store(addr, cell.instr);
        true
    }

    /// Add `delta` (folded) to one field of the instruction at `addr`, for
    /// pre-decrement and post-increment side effects.
    pub fn bump_field(
        &mut self,
        pc: CoreAddr,
        addr: CoreAddr,
        field: FieldSel,
        delta: i64,
        pid: Pid,
        tracer: &mut Tracer,
    ) -> bool {
        let current = match field {
            FieldSel::A => self.get(addr).instr.a_field,
            FieldSel::B => self.get(addr).instr.b_field,
        };
        let bumped = self.offset(current, delta);
        self.store_field(pc, addr, field, bumped, pid, tracer)
    }
}

#[cfg(test)]
mod tests {
    use quickcheck_macros::quickcheck;

    use super::*;

    /// An 8000-cell core with full windows
    fn core() -> Core {
        Core::new(8000, 8000, 8000).unwrap()
    }

    #[test]
    fn construction_validates_size_and_limits() {
        assert!(Core::new(0, 1, 1).is_err());
        assert!(Core::new(8000, 3000, 8000).is_err());
        assert!(Core::new(8000, 8000, 0).is_err());
        assert!(Core::new(8000, 4000, 2000).is_ok());
    }

    #[test]
    fn initial_fill_is_unowned_dat() {
        let core = core();
        let cell = core.get(1234);
        assert_eq!(cell.instr, CompleteInstruction::default());
        assert_eq!(cell.owner, 0);
    }

    #[quickcheck]
    fn fold_lands_in_range_and_is_idempotent(value: i64) -> bool {
        let core = core();
        let folded = core.fold(value);
        folded < core.size() && core.fold(i64::from(folded)) == folded
    }

    #[test]
    fn offset_wraps_both_directions() {
        let core = core();
        assert_eq!(core.offset(7999, 1), 0);
        assert_eq!(core.offset(0, -1), 7999);
        assert_eq!(core.offset(100, -8000), 100);
    }

    #[test]
    fn full_window_never_suppresses() {
        let core = core();
        for target in [0, 1, 3999, 4000, 4001, 7999] {
            assert!(core.in_read_window(0, target));
            assert!(core.in_write_window(0, target));
        }
    }

    #[test]
    fn narrow_window_suppresses_far_targets() {
        let core = Core::new(8000, 400, 400).unwrap();
        assert!(core.in_read_window(1000, 1200));
        assert!(core.in_read_window(1000, 800));
        assert!(!core.in_read_window(1000, 1201));
        assert!(!core.in_read_window(1000, 5000));
    }

    #[test]
    fn stores_tag_the_writer() {
        let mut core = core();
        let mut tracer = Tracer::Null;
        let imp = CompleteInstruction {
            a_field: 0,
            b_field: 1,
            ..CompleteInstruction::default()
        };
        assert!(core.store(0, 17, imp, 3, &mut tracer));
        assert_eq!(core.get(17).owner, 3);
        assert_eq!(core.get(17).instr, imp);

        assert!(core.store_field(0, 17, FieldSel::B, 9, 4, &mut tracer));
        assert_eq!(core.get(17).owner, 4);
        assert_eq!(core.get(17).instr.b_field, 9);
    }

    #[test]
    fn out_of_window_store_is_a_no_op() {
        let mut core = Core::new(8000, 8000, 400).unwrap();
        let mut tracer = Tracer::Null;
        let before = *core.get(4000);
        assert!(!core.store(
            0,
            4000,
            CompleteInstruction::default(),
            3,
            &mut tracer
        ));
        assert_eq!(*core.get(4000), before);
        assert_eq!(core.get(4000).owner, 0);
    }

    #[test]
    fn bump_field_folds_through_zero() {
        let mut core = core();
        let mut tracer = Tracer::Null;
        assert!(core.bump_field(0, 5, FieldSel::B, -1, 2, &mut tracer));
        assert_eq!(core.get(5).instr.b_field, 7999);
        assert!(core.bump_field(0, 5, FieldSel::B, 1, 2, &mut tracer));
        assert_eq!(core.get(5).instr.b_field, 0);
    }
}
