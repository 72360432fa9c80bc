use rand::{rngs::StdRng, Rng, SeedableRng};
use redcode::Program;
use thiserror::Error;
use tracing::debug;

use crate::{
    core_memory::{Core, CoreAddr, CoreError, Pid, DEFAULT_CORE_SIZE},
    execution,
    processes::ProcessQueue,
    tracer::Tracer,
};

/// The standard cycle budget before a round is declared a draw
pub const DEFAULT_MAX_CYCLES: u32 = 80_000;
/// The standard per-warrior process cap
pub const DEFAULT_MAX_PROCESSES: u32 = 8000;
/// The standard per-warrior instruction limit
pub const DEFAULT_MAX_LENGTH: u32 = 100;
/// The standard minimum separation between warrior bases
pub const DEFAULT_MIN_DISTANCE: u32 = 100;

/// Parameters for one round of simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarsConfig {
    /// Number of cells in the core
    pub core_size: u32,
    /// Cycle count at which a round ends in a draw
    pub max_cycles: u32,
    /// Per-warrior process cap; forks beyond it are dropped
    pub max_processes: u32,
    /// Maximum instructions per warrior
    pub max_length: u32,
    /// Minimum separation between any two warrior bases
    pub min_distance: u32,
    /// Read window; must divide `core_size`
    pub read_limit: u32,
    /// Write window; must divide `core_size`
    pub write_limit: u32,
}

impl Default for MarsConfig {
    fn default() -> Self {
        Self {
            core_size: DEFAULT_CORE_SIZE,
            max_cycles: DEFAULT_MAX_CYCLES,
            max_processes: DEFAULT_MAX_PROCESSES,
            max_length: DEFAULT_MAX_LENGTH,
            min_distance: DEFAULT_MIN_DISTANCE,
            read_limit: DEFAULT_CORE_SIZE,
            write_limit: DEFAULT_CORE_SIZE,
        }
    }
}

/// Errors configuring a round or loading warriors into it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MarsError {
    /// The core could not be constructed from this configuration
    #[error(transparent)]
    InvalidCore(#[from] CoreError),

    /// A configuration field other than the core shape is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The warrior exceeds the per-warrior instruction limit
    #[error("warrior has {len} instructions, more than the maximum {max}")]
    WarriorTooLong {
        /// Instructions in the offending warrior
        len: usize,
        /// Configured `max_length`
        max: u32,
    },

    /// The requested base would place the warrior too close to another
    #[error(
        "base {base} is within {min_distance} cells of another warrior"
    )]
    OverlappingPlacement {
        /// The rejected base address
        base: CoreAddr,
        /// Configured `min_distance`
        min_distance: u32,
    },

    /// No placement satisfying the separation constraints was found
    #[error("could not place {warriors} warriors in the core")]
    PlacementFailed {
        /// Number of warriors requested
        warriors: usize,
    },
}

/// How a round ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Exactly one warrior outlived the rest
    Win {
        /// The surviving warrior
        pid: Pid,
    },
    /// Everyone died, or the cycle budget ran out with several survivors
    Draw {
        /// Warriors still alive at the end; empty when all died
        survivors: Vec<Pid>,
    },
}

/// A finished round: its outcome and how many cycles it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundResult {
    /// How the round ended
    pub outcome: Outcome,
    /// Cycles executed before it ended
    pub cycles: u32,
}

/// One loaded warrior's runtime state
#[derive(Debug)]
struct WarriorSlot {
    /// The warrior's PID; cells it writes carry this tag
    pid: Pid,
    /// Display name from the program metadata
    name: String,
    /// Base address the program was copied to
    base: CoreAddr,
    /// Instructions occupied from `base`
    len: u32,
    /// FIFO of program counters
    queue: ProcessQueue,
    /// False once the queue has drained
    alive: bool,
}

/// The Memory Array Redcode Simulator: a core, the loaded warriors, and
/// the round-robin cycle loop.
///
/// One `Mars` runs one round.  Hosts that want battles of many rounds
/// construct a fresh `Mars` per round and aggregate outcomes; rounds
/// share no state.
#[derive(Debug)]
pub struct Mars {
    /// Round parameters
    config: MarsConfig,
    /// The circular memory
    core: Core,
    /// Loaded warriors in scheduling order
    warriors: Vec<WarriorSlot>,
    /// Cycles executed so far
    cycle: u32,
    /// Execution observer
    tracer: Tracer,
}

impl Mars {
    /// An empty core configured for one round.
    ///
    /// # Errors
    ///
    /// Returns [`MarsError`] when the configuration is unusable.
    pub fn new(config: MarsConfig) -> Result<Self, MarsError> {
        if config.max_cycles == 0 {
            return Err(MarsError::InvalidConfig(
                "max_cycles must be nonzero",
            ));
        }
        if config.max_processes == 0 {
            return Err(MarsError::InvalidConfig(
                "max_processes must be nonzero",
            ));
        }
        if config.max_length == 0 || config.max_length > config.core_size {
            return Err(MarsError::InvalidConfig(
                "max_length must be nonzero and fit in the core",
            ));
        }
        let core = Core::new(
            config.core_size,
            config.read_limit,
            config.write_limit,
        )?;
        Ok(Self {
            config,
            core,
            warriors: Vec::new(),
            cycle: 0,
            tracer: Tracer::Null,
        })
    }

    /// Replace the execution observer (a fresh round starts with
    /// [`Tracer::Null`]).
    pub fn set_tracer(&mut self, tracer: Tracer) {
        self.tracer = tracer;
    }

    /// The execution observer, for trace export after a round
    #[must_use]
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// The core, for inspection
    #[must_use]
    pub fn core(&self) -> &Core {
        &self.core
    }

    /// Cycles executed so far
    #[must_use]
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// PIDs of warriors that still have processes
    #[must_use]
    pub fn alive(&self) -> Vec<Pid> {
        self.warriors
            .iter()
            .filter(|slot| slot.alive)
            .map(|slot| slot.pid)
            .collect()
    }

    /// Number of processes a warrior currently has
    #[must_use]
    pub fn process_count(&self, pid: Pid) -> usize {
        self.warriors
            .iter()
            .find(|slot| slot.pid == pid)
            .map_or(0, |slot| slot.queue.len())
    }

    /// A warrior's queue in execution order, next process first
    #[must_use]
    pub fn process_queue(&self, pid: Pid) -> Vec<CoreAddr> {
        self.warriors
            .iter()
            .find(|slot| slot.pid == pid)
            .map_or_else(Vec::new, |slot| slot.queue.pcs())
    }

    /// Display name of a loaded warrior
    #[must_use]
    pub fn warrior_name(&self, pid: Pid) -> Option<&str> {
        self.warriors
            .iter()
            .find(|slot| slot.pid == pid)
            .map(|slot| slot.name.as_str())
    }

    /// Copy a program into the core at `base` and give it one process at
    /// its start offset.  PIDs are assigned 1, 2, ... in load order.
    ///
    /// # Errors
    ///
    /// Returns [`MarsError::WarriorTooLong`] when the program exceeds
    /// `max_length` and [`MarsError::OverlappingPlacement`] when `base`
    /// violates the separation constraint against a warrior already
    /// loaded.
    pub fn load(
        &mut self,
        program: &Program,
        base: CoreAddr,
    ) -> Result<Pid, MarsError> {
        let len = u32::try_from(program.len()).unwrap_or(u32::MAX);
        if program.is_empty() || len > self.config.max_length {
            return Err(MarsError::WarriorTooLong {
                len: program.len(),
                max: self.config.max_length,
            });
        }
        let base = self.core.fold(i64::from(base));
        if !self.placement_fits(base, len) {
            return Err(MarsError::OverlappingPlacement {
                base,
                min_distance: self.config.min_distance,
            });
        }

        #[allow(clippy::cast_possible_truncation)]
        let pid = self.warriors.len() as Pid + 1;
        for (offset, instr) in program.code.iter().enumerate() {
            let addr = self.core.offset(base, offset as i64);
            let normalized = instr.normalize(self.config.core_size);
            // Loading bypasses the write window; the loader is not a
            // process
            let size = self.core.size();
            debug_assert!(addr < size);
            self.core.store(
                addr,
                addr,
                normalized,
                pid,
                &mut Tracer::Null,
            );
        }

        let mut queue =
            ProcessQueue::new(self.config.max_processes as usize);
        queue.push(self.core.offset(base, i64::from(program.start)));
        let name = program
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| format!("warrior {pid}"));
        debug!(pid, base, len, name = %name, "loaded warrior");
        self.warriors.push(WarriorSlot {
            pid,
            name,
            base,
            len,
            queue,
            alive: true,
        });
        Ok(pid)
    }

    /// Choose bases for `programs` deterministically from `seed` and load
    /// them all.
    ///
    /// The first warrior sits at base 0; later bases are drawn uniformly
    /// and redrawn until every pair is separated by at least
    /// `min_distance` cells and no initial footprints overlap.
    ///
    /// # Errors
    ///
    /// Returns the first load error, or [`MarsError::PlacementFailed`]
    /// when no placement can be found.
    pub fn place_and_load(
        &mut self,
        programs: &[&Program],
        seed: u64,
    ) -> Result<Vec<Pid>, MarsError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pids = Vec::with_capacity(programs.len());
        for (index, program) in programs.iter().enumerate() {
            if index == 0 {
                pids.push(self.load(program, 0)?);
                continue;
            }
            let mut placed = None;
            for _attempt in 0..10_000 {
                let base = rng.gen_range(0..self.config.core_size);
                let len =
                    u32::try_from(program.len()).unwrap_or(u32::MAX);
                if self.placement_fits(base, len) {
                    placed = Some(self.load(program, base)?);
                    break;
                }
            }
            match placed {
                Some(pid) => pids.push(pid),
                None => {
                    return Err(MarsError::PlacementFailed {
                        warriors: programs.len(),
                    })
                }
            }
        }
        Ok(pids)
    }

    /// Whether a warrior of `len` instructions at `base` keeps the
    /// required distance from every warrior already loaded
    fn placement_fits(&self, base: CoreAddr, len: u32) -> bool {
        self.warriors.iter().all(|other| {
            let forward = self
                .core
                .fold(i64::from(base) - i64::from(other.base));
            let backward = self
                .core
                .fold(i64::from(other.base) - i64::from(base));
            forward >= other.len.max(self.config.min_distance)
                && backward >= len.max(self.config.min_distance)
        })
    }

    /// Run one cycle: each live warrior executes exactly one instruction,
    /// in load order.  Returns the round result once the round is over.
    pub fn step_cycle(&mut self) -> Option<RoundResult> {
        self.tracer.cycle(self.cycle);
        for index in 0..self.warriors.len() {
            let pid = self.warriors[index].pid;
            let Some(pc) = self.warriors[index].queue.pop() else {
                continue;
            };
            let successors =
                execution::execute(&mut self.core, pc, pid, &mut self.tracer);
            let slot = &mut self.warriors[index];
            for successor in successors {
                slot.queue.push(successor);
            }
            if slot.queue.is_empty() {
                slot.alive = false;
                debug!(pid, cycle = self.cycle, "warrior died");
            }
            let snapshot = slot.queue.pcs();
            self.tracer.program_counters(&snapshot);
        }
        self.cycle += 1;

        let survivors = self.alive();
        let finished = if self.warriors.len() > 1 && survivors.len() <= 1 {
            // A lone survivor wins; mutual destruction is a draw
            Some(survivors.first().map_or(
                Outcome::Draw {
                    survivors: Vec::new(),
                },
                |&pid| Outcome::Win { pid },
            ))
        } else if survivors.is_empty() {
            Some(Outcome::Draw {
                survivors: Vec::new(),
            })
        } else if self.cycle >= self.config.max_cycles {
            Some(Outcome::Draw { survivors })
        } else {
            None
        };
        finished.map(|outcome| RoundResult {
            outcome,
            cycles: self.cycle,
        })
    }

    /// Drive the round to completion.
    pub fn run(&mut self) -> RoundResult {
        loop {
            if let Some(result) = self.step_cycle() {
                debug!(
                    cycles = result.cycles,
                    outcome = ?result.outcome,
                    "round finished"
                );
                self.tracer.flush();
                return result;
            }
        }
    }
}
