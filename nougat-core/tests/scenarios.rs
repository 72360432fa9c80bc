//! End-to-end rounds over assembled warriors: the classic programs and
//! the termination, fairness, and windowing behavior they exercise.

use nougat_core::{Mars, MarsConfig, Outcome, RecordingTracer, Tracer};
use redcode::{Opcode, Program};

/// Assemble source or panic with the rendered diagnostic
fn assemble(source: &str) -> Program {
    redcode_asm::assemble("scenario.red", source)
        .unwrap_or_else(|e| panic!("{}", e.render(source)))
}

/// A small, fast configuration with full read/write windows
fn config() -> MarsConfig {
    MarsConfig {
        core_size: 8000,
        max_cycles: 80_000,
        max_processes: 8000,
        max_length: 100,
        min_distance: 100,
        read_limit: 8000,
        write_limit: 8000,
    }
}

/// Run `cycles` cycles, asserting the round does not end early
fn step(mars: &mut Mars, cycles: u32) {
    for _ in 0..cycles {
        assert!(mars.step_cycle().is_none(), "round ended early");
    }
}

#[test]
fn imp_marches_through_the_core() {
    let imp = assemble("MOV.I $0, $1");
    let mut mars = Mars::new(config()).unwrap();
    let pid = mars.load(&imp, 100).unwrap();

    let n = 250;
    step(&mut mars, n);

    // the single process sits at 100 + n
    assert_eq!(mars.process_queue(pid), vec![100 + n]);
    // every visited cell holds the imp, tagged with the imp's pid
    let expected = imp.code[0].normalize(8000);
    for addr in 100..=100 + n {
        let cell = mars.core().get(addr);
        assert_eq!(cell.instr, expected, "cell {addr}");
        assert_eq!(cell.owner, pid, "cell {addr}");
    }
    // and the cell ahead of the imp is still untouched core fill
    assert_eq!(mars.core().get(100 + n + 1).owner, 0);
}

#[test]
fn dwarf_bombs_every_fourth_cell() {
    let dwarf = assemble(
        "
        ADD.AB #4, $3
        MOV.AB #0, @2
        JMP    $-2
        DAT    #0, #0
        ",
    );
    let mut mars = Mars::new(config()).unwrap();
    let pid = mars.load(&dwarf, 100).unwrap();

    // one full pass: ADD, MOV, JMP
    step(&mut mars, 3);
    let pointer = mars.core().get(103).instr;
    assert_eq!(pointer.instr.opcode, Opcode::Dat);
    assert_eq!(pointer.a_field, 0);
    assert_eq!(pointer.b_field, 4);

    // second pass: the pointer advances and the first bomb has landed
    step(&mut mars, 3);
    assert_eq!(mars.core().get(103).instr.b_field, 8);
    let bombed = mars.core().get(107);
    assert_eq!(bombed.owner, pid);
    assert_eq!(bombed.instr.instr.opcode, Opcode::Dat);
    assert_eq!(bombed.instr.b_field, 0);

    // the dwarf itself keeps exactly one process
    assert_eq!(mars.process_queue(pid), vec![100]);
}

#[test]
fn division_by_zero_terminates_the_process() {
    let warrior = assemble("DIV.A #0, $1\nDAT #1, #1\n");
    let mut mars = Mars::new(config()).unwrap();
    let pid = mars.load(&warrior, 0).unwrap();

    let result = mars.step_cycle();
    // the only warrior died, so the round is over after one cycle
    assert_eq!(
        result.map(|r| r.outcome),
        Some(Outcome::Draw {
            survivors: Vec::new()
        })
    );
    assert!(mars.process_queue(pid).is_empty());
    // the DAT operand cell was not modified by the failed division
    let cell = mars.core().get(1);
    assert_eq!(cell.instr.a_field, 1);
    assert_eq!(cell.instr.b_field, 1);
}

#[test]
fn spl_grows_to_the_cap_while_a_bystander_runs_once_per_cycle() {
    let splitter = assemble("loop SPL loop\n     JMP loop\n");
    let imp = assemble("MOV.I $0, $1");
    let mut mars = Mars::new(MarsConfig {
        max_processes: 8,
        ..config()
    })
    .unwrap();
    let a = mars.load(&splitter, 10).unwrap();
    let b = mars.load(&imp, 4000).unwrap();

    assert_eq!(mars.process_count(a), 1);
    step(&mut mars, 1);
    assert_eq!(mars.process_count(a), 2);

    let mut previous = mars.process_count(a);
    for cycle in 2_u32..=40 {
        step(&mut mars, 1);
        let count = mars.process_count(a);
        // the queue never shrinks and never exceeds the cap
        assert!(count >= previous, "cycle {cycle}");
        assert!(count <= 8, "cycle {cycle}");
        previous = count;
        // the bystander still advances exactly one cell per cycle
        assert_eq!(mars.process_queue(b), vec![4000 + cycle]);
    }
    assert_eq!(previous, 8);
}

#[test]
fn seq_i_skips_over_the_next_instruction() {
    // cells 2 and 3 hold identical DATs: the comparison skips the MOV
    let skipper = assemble(
        "
        SEQ.I $2, $3
        MOV   #1, #1
        DAT   #0, #0
        DAT   #0, #0
        ",
    );
    let mut mars = Mars::new(config()).unwrap();
    let pid = mars.load(&skipper, 0).unwrap();
    step(&mut mars, 1);
    assert_eq!(mars.process_queue(pid), vec![2]);

    // comparing the MOV against a DAT does not skip
    let plodder = assemble(
        "
        SEQ.I $1, $2
        MOV   #1, #1
        DAT   #0, #0
        ",
    );
    let mut mars = Mars::new(config()).unwrap();
    let pid = mars.load(&plodder, 0).unwrap();
    step(&mut mars, 1);
    assert_eq!(mars.process_queue(pid), vec![1]);
}

#[test]
fn imp_gate_duel_ends_at_the_cycle_budget() {
    // two imps can't kill each other: the round runs to max_cycles and
    // both survive
    let imp = assemble("MOV.I $0, $1");
    let mut mars = Mars::new(MarsConfig {
        max_cycles: 500,
        ..config()
    })
    .unwrap();
    let a = mars.load(&imp, 0).unwrap();
    let b = mars.load(&imp, 4000).unwrap();
    let result = mars.run();
    assert_eq!(result.cycles, 500);
    assert_eq!(
        result.outcome,
        Outcome::Draw {
            survivors: vec![a, b]
        }
    );
}

#[test]
fn i_bombing_dwarf_kills_a_parked_opponent() {
    // this dwarf copies its whole DAT with MOV.I, so a victim on the
    // bombing stride ends up executing a DAT and dies
    let dwarf = assemble(
        "
        ADD.AB #4, $3
        MOV.I  $2, @2
        JMP    $-2
        DAT    #0, #0
        ",
    );
    let duck = assemble("JMP $0, $0");
    let mut mars = Mars::new(MarsConfig {
        max_cycles: 20_000,
        ..config()
    })
    .unwrap();
    let dwarf_pid = mars.load(&dwarf, 0).unwrap();
    // 207 = 3 + 4 * 51, on the dwarf's bombing stride from base 0
    mars.load(&duck, 207).unwrap();
    let result = mars.run();

    assert_eq!(result.outcome, Outcome::Win { pid: dwarf_pid });
    // the lethal cell carries the dwarf's bomb and ownership tag
    let cell = mars.core().get(207);
    assert_eq!(cell.owner, dwarf_pid);
    assert_eq!(cell.instr.instr.opcode, Opcode::Dat);
}

#[test]
fn recording_tracer_captures_the_dwarf_rows() {
    let dwarf = assemble(
        "
        ADD.AB #4, $3
        MOV.AB #0, @2
        JMP    $-2
        DAT    #0, #0
        ",
    );
    let mut mars = Mars::new(MarsConfig {
        max_cycles: 6,
        ..config()
    })
    .unwrap();
    mars.set_tracer(Tracer::Recording(RecordingTracer::default()));
    mars.load(&dwarf, 100).unwrap();
    mars.run();

    let Tracer::Recording(recording) = mars.tracer() else {
        panic!("expected the recording tracer back")
    };
    let records: Vec<_> = recording.records().collect();
    assert_eq!(records.len(), 6);
    // first record: the ADD at 100
    assert_eq!(records[0].cycle, 0);
    assert_eq!(records[0].address, 100);
    assert_eq!(records[0].operation.as_deref(), Some("Add"));
    assert_eq!(records[0].pcs, vec![101]);
    // its opcode store hit the pointer cell
    assert_eq!(records[0].stores.len(), 1);
    assert_eq!(records[0].stores[0].0, 103);
    // second record: the MOV resolved its B operand through cell 103 to
    // the first bomb target at 107
    assert_eq!(records[1].address, 101);
    assert_eq!(records[1].b_pointer, Some(107));
    assert_eq!(records[1].b_loads.len(), 2);
    assert_eq!(records[1].b_loads[0].0, 103);

    let csv = recording.export_csv();
    assert!(csv.starts_with("Cycle;PID;Address;Instruction;"));
    assert_eq!(csv.lines().count(), 7);
}
