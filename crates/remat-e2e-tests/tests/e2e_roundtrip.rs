mod common;

use common::{case, load, operand, shape, task, GIB};
use remat_analysis::{check_restored, restore_deallocs};
use remat_ir::write_case;

fn shared_case() -> String {
    case(
        vec![
            operand(0, GIB),
            operand(1, GIB), // alias of 0
            operand(2, GIB),
            operand(3, GIB),
        ],
        vec![
            task("conv", &[], &[0], 1_000.0),
            task(".share", &[0], &[1], 0.0),
            task("mul", &[1], &[2], 1_000.0),
            task(".dealloc", &[], &[1], 0.0),
            task("add", &[0, 2], &[3], 1_000.0),
            task(".dealloc", &[], &[2], 0.0),
            task(".dealloc", &[], &[0], 0.0),
        ],
    )
}

/// Aliases resolve to their source and the markers disappear from the
/// working stream.
#[test]
fn canonicalization_resolves_aliases() {
    let (common, schedule) = load(&shared_case());
    assert_eq!(
        shape(&common, &schedule),
        vec![
            ("conv".into(), vec![], vec![0]),
            ("mul".into(), vec![0], vec![2]),
            ("add".into(), vec![0, 2], vec![3]),
        ]
    );
    // The original trace ids survive on the task even though the slot
    // now points at the canonical storage.
    assert_eq!(schedule.tasks[1].name, "mul");
    assert_eq!(schedule.tasks[1].wire_ins, vec![1]);

    let survivors: Vec<u64> = common
        .not_dealloc
        .iter()
        .map(|&h| common.operands[h].id)
        .collect();
    assert_eq!(survivors, vec![3]);
}

/// Restoring release markers and re-canonicalizing reproduces the same
/// compute stream, and serialization is a fixed point.
#[test]
fn restore_and_reload_round_trip() {
    let (common, schedule) = load(&shared_case());

    let restored = restore_deallocs(&common, &schedule).unwrap();
    check_restored(&common, &restored).unwrap();
    let first = write_case(&common, &restored).unwrap();

    // The alias operand is gone from the emitted table.
    assert!(!first.contains("\"id\":1"));

    let (common2, schedule2) = load(&first);
    assert_eq!(shape(&common, &schedule), shape(&common2, &schedule2));

    let restored2 = restore_deallocs(&common2, &schedule2).unwrap();
    check_restored(&common2, &restored2).unwrap();
    let second = write_case(&common2, &restored2).unwrap();
    assert_eq!(first, second);
}

/// Release markers reappear exactly where lifetimes end.
#[test]
fn restored_markers_carry_the_dead_operands() {
    let (common, schedule) = load(&shared_case());
    let restored = restore_deallocs(&common, &schedule).unwrap();

    let shapes = shape(&common, &restored);
    assert_eq!(
        shapes,
        vec![
            ("conv".into(), vec![], vec![0]),
            ("mul".into(), vec![0], vec![2]),
            ("add".into(), vec![0, 2], vec![3]),
            (".dealloc".into(), vec![], vec![0, 2]),
        ]
    );
}
