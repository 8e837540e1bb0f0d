use std::{env, fs, io::Write, process};

use blocklang::logging::{error, trace_tick};
use blocklang::objfile;
use blocklang::vm::{Grid, Side};

const DEFAULT_TICK_BUDGET: u32 = 1024;
const SLOT_CAPACITY: usize = 255;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} -f <object-file> [-i <input-file>] [-d]");
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut object_file: Option<String> = None;
    let mut input_file: Option<String> = None;
    let mut debug = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-f" => {
                i += 1;
                object_file = args.get(i).cloned();
            }
            "-i" => {
                i += 1;
                input_file = args.get(i).cloned();
            }
            "-d" => debug = true,
            _ => usage(&args[0]),
        }
        i += 1;
    }

    let Some(object_file) = object_file else {
        usage(&args[0]);
    };

    let bytes = fs::read(&object_file).unwrap_or_else(|e| {
        error(format!("failed to read object file {object_file}: {e}"));
        process::exit(1);
    });

    let object = objfile::read(&bytes).unwrap_or_else(|e| {
        error(format!("failed to parse object file: {e}"));
        process::exit(2);
    });

    if debug && object.source.is_none() {
        error("-d requires an object file assembled with debug info".to_string());
        process::exit(2);
    }

    let mut in_buffer = [0u8; SLOT_CAPACITY];
    if let Some(path) = input_file {
        let data = fs::read(&path).unwrap_or_else(|e| {
            error(format!("failed to read input file {path}: {e}"));
            process::exit(1);
        });
        let n = data.len().min(SLOT_CAPACITY);
        in_buffer[..n].copy_from_slice(&data[..n]);
    }
    let mut out_buffer = [0u8; SLOT_CAPACITY];

    let mut grid = Grid::new(1, 1).unwrap_or_else(|e| {
        error(e.to_string());
        process::exit(2);
    });
    grid.attach_input(Side::Up, 0, &in_buffer);
    grid.attach_output(Side::Down, 0, &mut out_buffer);
    grid.load(0, 0, &object.bytecode);

    if debug {
        let line_table = object.line_table.as_deref();
        run_with_trace(&mut grid, line_table, DEFAULT_TICK_BUDGET);
    } else {
        blocklang::vm::run(&mut grid, DEFAULT_TICK_BUDGET);
    }

    let slot = grid.slot(Side::Down, 0).expect("attached above");
    let written = &out_buffer[..slot.cur()];
    std::io::stdout().write_all(written).unwrap_or_else(|e| {
        error(format!("failed to write output: {e}"));
        process::exit(1);
    });
}

/// Like [`blocklang::vm::run`], but prints a `-d` trace line before every
/// tick that shows the source line the block is about to execute.
fn run_with_trace(grid: &mut Grid, line_table: Option<&[u16]>, max_ticks: u32) {
    let mut tick = 0u32;
    loop {
        let pc = grid.block(0, 0).pc as usize;
        let source_line = line_table.and_then(|t| t.get(pc)).copied();
        trace_tick(tick, 0, 0, source_line);

        let report = blocklang::vm::run(grid, 1);
        tick += 1;
        if report.ticks == 0 || tick >= max_ticks {
            break;
        }
    }
}
