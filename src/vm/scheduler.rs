//! The four-phase transfer scheduler and the driver loop that runs it to
//! quiescence. This is where the grid's synchronous byte transfers are
//! actually resolved: blocks never reach across to a neighbour directly,
//! they stage a request in phase 1 and this module settles it in phases
//! 2 and 3 before phase 4 lets every block act on the result.

use super::block::XferSide;
use super::grid::{Grid, Side};

/// Outcome of a bounded run: how many ticks elapsed and whether the grid
/// was still making progress when the budget ran out.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub ticks: u32,
    pub exhausted: bool,
}

/// Run `grid` until no block has outstanding work (`any_ticked` goes
/// false) or `max_ticks` is reached, whichever comes first.
pub fn run(grid: &mut Grid, max_ticks: u32) -> RunReport {
    let mut ticks = 0u32;
    loop {
        let any_ticked = tick(grid);
        if !any_ticked {
            return RunReport {
                ticks,
                exhausted: false,
            };
        }
        ticks += 1;
        if ticks >= max_ticks {
            return RunReport {
                ticks,
                exhausted: true,
            };
        }
    }
}

/// One full PRE/WRITE/READ/EXEC cycle across every block, in row-major
/// order. Returns whether any block still had bytecode running.
fn tick(grid: &mut Grid) -> bool {
    let n = grid.total_blocks();
    let mut any_ticked = false;

    for idx in 0..n {
        if grid.blocks_mut()[idx].pre() {
            any_ticked = true;
        }
    }

    for idx in 0..n {
        phase_write(grid, idx);
    }

    for idx in 0..n {
        phase_read(grid, idx);
    }

    for idx in 0..n {
        grid.blocks_mut()[idx].exec();
    }

    any_ticked
}

fn edge_local_index(x: u8, y: u8, side: Side) -> u8 {
    match side {
        Side::Up | Side::Down => x,
        Side::Left | Side::Right => y,
    }
}

/// Try to write `value` to the edge slot on `side` from `(x, y)`.
/// `None` means `side` has an on-grid neighbour — not an edge at all, so
/// phase 2 doesn't touch it (peers are only settled from phase 3). `Some`
/// carries whether the write actually landed.
fn try_write_edge(grid: &mut Grid, x: u8, y: u8, side: Side, value: u8) -> Option<bool> {
    if grid.neighbour(x, y, side).is_some() {
        return None;
    }
    let local = edge_local_index(x, y, side);
    match grid.slot_at_mut(side, local) {
        Some(slot) if !slot.is_input() => Some(slot.write_byte(value)),
        _ => Some(false),
    }
}

fn unlock_writer(grid: &mut Grid, idx: usize, success: bool) {
    let b = &mut grid.blocks_mut()[idx];
    b.waiting_for_io = false;
    b.transferred = success;
    if !success {
        b.overflow = true;
    } else {
        b.overflow = false;
    }
}

fn phase_write(grid: &mut Grid, idx: usize) {
    let b = grid.block_at(idx);
    if !(b.waiting_for_io && b.waiting_write) {
        return;
    }
    let (x, y) = grid.coords_of(idx);
    match b.xfer_side {
        Some(XferSide::Dir(side)) => match try_write_edge(grid, x, y, side, b.xfer_value) {
            None => {} // on-grid: the reader's phase 3 settles this
            Some(success) => unlock_writer(grid, idx, success),
        },
        Some(XferSide::Any) => {
            for side in Side::ALL {
                if let Some(true) = try_write_edge(grid, x, y, side, b.xfer_value) {
                    unlock_writer(grid, idx, true);
                    return;
                }
            }
            // No writable edge this tick. ANY only considers edges in
            // phase 2 (peers are reached via the reader's phase 3), so a
            // miss here just defers to next tick.
        }
        None => {}
    }
}

fn phase_read(grid: &mut Grid, idx: usize) {
    let b = grid.block_at(idx);
    if !(b.waiting_for_io && !b.waiting_write) {
        return;
    }
    let (x, y) = grid.coords_of(idx);
    match b.xfer_side {
        Some(XferSide::Dir(side)) => {
            try_read_side(grid, idx, x, y, side);
        }
        Some(XferSide::Any) => {
            for side in Side::ALL {
                if try_read_side(grid, idx, x, y, side) {
                    return;
                }
            }
            // No ready partner this revolution; stay blocked, retry
            // next tick (bounded by the driver's tick budget).
        }
        None => {}
    }
}

/// Attempt to satisfy block `idx`'s read from `side`. Returns whether the
/// read resolved this phase (success or hard failure) — `false` means
/// stay blocked and retry.
fn try_read_side(grid: &mut Grid, idx: usize, x: u8, y: u8, side: Side) -> bool {
    match grid.neighbour(x, y, side) {
        None => {
            let local = edge_local_index(x, y, side);
            let outcome = match grid.slot_at_mut(side, local) {
                Some(slot) if slot.is_input() => slot.read_byte(),
                _ => None,
            };
            match outcome {
                Some(value) => {
                    let b = &mut grid.blocks_mut()[idx];
                    b.xfer_value = value;
                    b.waiting_for_io = false;
                    b.transferred = true;
                    b.overflow = false;
                }
                None => {
                    let b = &mut grid.blocks_mut()[idx];
                    b.waiting_for_io = false;
                    b.transferred = false;
                    b.overflow = true;
                }
            }
            true
        }
        Some((nx, ny)) => {
            let n_idx = grid.block_index(nx, ny);
            let neighbour = grid.block_at(n_idx);
            if neighbour.halted {
                let b = &mut grid.blocks_mut()[idx];
                b.waiting_for_io = false;
                b.transferred = false;
                b.overflow = true;
                true
            } else if neighbour.waiting_for_io && neighbour.waiting_write {
                let value = neighbour.xfer_value;
                {
                    let b = &mut grid.blocks_mut()[idx];
                    b.xfer_value = value;
                    b.waiting_for_io = false;
                    b.transferred = true;
                    b.overflow = false;
                }
                let nb = &mut grid.blocks_mut()[n_idx];
                nb.waiting_for_io = false;
                nb.transferred = true;
                nb.overflow = false;
                true
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Instruction as Ins, Opcode as Op, Target as Tg};

    // loop: GET UP; ADD 1; PUT DWN; JMP loop; HALT
    fn echo_increment_program() -> Vec<u8> {
        vec![
            Ins::pack(Op::Get, Tg::Up).0,
            Ins::pack(Op::Add, Tg::Adj).0,
            1,
            Ins::pack(Op::Put, Tg::Dwn).0,
            Ins::pack(Op::Jmp, Tg::Adj).0,
            0,
            Ins::pack(Op::Halt, Tg::Nil).0,
        ]
    }

    #[test]
    fn s1_echo_with_increment() {
        // The loop never reaches its trailing HALT, so the driver only
        // stops once the tick budget runs out — not on quiescence.
        let code = echo_increment_program();
        let mut grid = Grid::new(1, 1).unwrap();
        grid.load(0, 0, &code);
        let input = [1u8, 2, 3, 4];
        let mut output = [0u8; 4];
        grid.attach_input(Side::Up, 0, &input);
        grid.attach_output(Side::Down, 0, &mut output);
        let report = run(&mut grid, 32);
        assert!(report.exhausted);
        assert_eq!(output, [2, 3, 4, 5]);
    }

    #[test]
    fn s2_overflow_detection() {
        // GET UP; ADD 1; JOF of; PUT DWN; HALT; of: GET 99; PUT DWN; HALT
        let code = vec![
            Ins::pack(Op::Get, Tg::Up).0,
            Ins::pack(Op::Add, Tg::Adj).0,
            1,
            Ins::pack(Op::Jof, Tg::Adj).0,
            7,
            Ins::pack(Op::Put, Tg::Dwn).0,
            Ins::pack(Op::Halt, Tg::Nil).0,
            Ins::pack(Op::Get, Tg::Adj).0,
            99,
            Ins::pack(Op::Put, Tg::Dwn).0,
            Ins::pack(Op::Halt, Tg::Nil).0,
        ];
        let mut grid = Grid::new(1, 1).unwrap();
        grid.load(0, 0, &code);
        let input = [255u8, 0];
        let mut output = [0u8; 2];
        grid.attach_input(Side::Up, 0, &input);
        grid.attach_output(Side::Down, 0, &mut output);
        let report = run(&mut grid, 64);
        assert!(!report.exhausted);
        assert_eq!(output[0], 99);
    }

    #[test]
    fn s3_stack_reversal() {
        let code = vec![
            Ins::pack(Op::Get, Tg::Up).0,
            Ins::pack(Op::Push, Tg::Acc).0,
            Ins::pack(Op::Get, Tg::Up).0,
            Ins::pack(Op::Push, Tg::Acc).0,
            Ins::pack(Op::Get, Tg::Up).0,
            Ins::pack(Op::Push, Tg::Acc).0,
            Ins::pack(Op::Pop, Tg::Dwn).0,
            Ins::pack(Op::Pop, Tg::Dwn).0,
            Ins::pack(Op::Pop, Tg::Dwn).0,
            Ins::pack(Op::Halt, Tg::Nil).0,
        ];
        let mut grid = Grid::new(1, 1).unwrap();
        grid.load(0, 0, &code);
        let input = [1u8, 2, 3];
        let mut output = [0u8; 3];
        grid.attach_input(Side::Up, 0, &input);
        grid.attach_output(Side::Down, 0, &mut output);
        let report = run(&mut grid, 64);
        assert!(!report.exhausted);
        assert_eq!(output, [3, 2, 1]);
    }

    #[test]
    fn s5_two_block_rendezvous() {
        // upper (0,0): GET UP; PUT DWN; HALT, fed [7] from the top edge.
        // lower (0,1): GET UP; PUT DWN; HALT, draining to the bottom edge.
        let upper = vec![
            Ins::pack(Op::Get, Tg::Up).0,
            Ins::pack(Op::Put, Tg::Dwn).0,
            Ins::pack(Op::Halt, Tg::Nil).0,
        ];
        let lower = upper.clone();
        let mut grid = Grid::new(1, 2).unwrap();
        grid.load(0, 0, &upper);
        grid.load(0, 1, &lower);
        let input = [7u8];
        let mut output = [0u8; 1];
        grid.attach_input(Side::Up, 0, &input);
        grid.attach_output(Side::Down, 0, &mut output);
        let report = run(&mut grid, 8);
        assert!(!report.exhausted);
        assert_eq!(output, [7]);
        assert!(report.ticks <= 4);
    }

    #[test]
    fn write_to_full_output_slot_fails_with_overflow() {
        let code = vec![
            Ins::pack(Op::Get, Tg::Adj).0,
            5,
            Ins::pack(Op::Put, Tg::Dwn).0,
            Ins::pack(Op::Jof, Tg::Adj).0,
            6,
            Ins::pack(Op::Halt, Tg::Nil).0,
            Ins::pack(Op::Halt, Tg::Nil).0,
        ];
        let mut grid = Grid::new(1, 1).unwrap();
        grid.load(0, 0, &code);
        let mut output: [u8; 0] = [];
        grid.attach_output(Side::Down, 0, &mut output);
        let report = run(&mut grid, 16);
        assert!(!report.exhausted);
        assert!(grid.block(0, 0).halted);
    }
}
