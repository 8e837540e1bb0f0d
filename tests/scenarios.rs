//! End-to-end scenarios driving the assembler and the VM through their
//! public APIs together, the way a real toolchain invocation would.

use blocklang::assembler;
use blocklang::encoding::{Instruction, Target};
use blocklang::objfile;
use blocklang::vm::{Grid, Side};

fn assemble_and_run(
    source: &str,
    width: u8,
    height: u8,
    input: &[u8],
    output_len: usize,
    max_ticks: u32,
) -> (Vec<u8>, blocklang::vm::RunReport) {
    let assembled = assembler::assemble(source).expect("source assembles");
    let mut grid = Grid::new(width, height).unwrap();
    grid.load(0, 0, &assembled.bytecode);
    let mut output = vec![0u8; output_len];
    grid.attach_input(Side::Up, 0, input);
    grid.attach_output(Side::Down, 0, &mut output);
    let report = blocklang::vm::run(&mut grid, max_ticks);
    (output, report)
}

#[test]
fn s1_echo_with_increment() {
    let source = "loop: get UP\nadd 1\nput DWN\njmp loop\nhalt";
    let (output, report) = assemble_and_run(source, 1, 1, &[1, 2, 3, 4], 4, 32);
    assert!(report.exhausted); // the loop never reaches its trailing halt
    assert_eq!(output, vec![2, 3, 4, 5]);
}

#[test]
fn s2_overflow_detection() {
    let source = "\
get UP
add 1
jof of
put DWN
halt
of: get 99
put DWN
halt
";
    let (output, report) = assemble_and_run(source, 1, 1, &[255, 0], 2, 32);
    assert!(!report.exhausted);
    assert_eq!(output[0], 99);
}

#[test]
fn s3_stack_reversal() {
    let source = "\
get UP
push ACC
get UP
push ACC
get UP
push ACC
pop DWN
pop DWN
pop DWN
halt
";
    let (output, report) = assemble_and_run(source, 1, 1, &[1, 2, 3], 3, 32);
    assert!(!report.exhausted);
    assert_eq!(output, vec![3, 2, 1]);
}

#[test]
fn s4_labels_and_strings() {
    let source = "msg: .\"HI\"\nget msg\nput DWN\nhalt";
    let assembled = assembler::assemble(source).unwrap();
    assert_eq!(&assembled.bytecode[0..3], &[b'H', b'I', 0]);

    let ins = Instruction(assembled.bytecode[3]);
    assert_eq!(ins.target().unwrap(), Target::Adj);
    assert_eq!(assembled.bytecode[4], 0); // msg resolves to address 0

    // every emitted byte has a line-table entry
    assert_eq!(assembled.line_table.len(), assembled.bytecode.len());
}

#[test]
fn s5_two_block_rendezvous() {
    let source = "get UP\nput DWN\nhalt";
    let assembled = assembler::assemble(source).unwrap();
    let mut grid = Grid::new(1, 2).unwrap();
    grid.load(0, 0, &assembled.bytecode);
    grid.load(0, 1, &assembled.bytecode);
    let input = [7u8];
    let mut output = [0u8; 1];
    grid.attach_input(Side::Up, 0, &input);
    grid.attach_output(Side::Down, 0, &mut output);
    let report = blocklang::vm::run(&mut grid, 8);
    assert!(!report.exhausted);
    assert_eq!(output, [7]);
    assert!(report.ticks <= 4);
}

#[test]
fn s6_object_file_round_trip() {
    let source = "loop: get UP\nadd 1\nput DWN\njmp loop\nhalt";
    let assembled = assembler::assemble(source).unwrap();

    let mut buf = Vec::new();
    objfile::write_debug(
        &mut buf,
        &assembled.source,
        &assembled.bytecode,
        &assembled.line_table,
    )
    .unwrap();

    let read_back = objfile::read(&buf).unwrap();
    assert_eq!(read_back.bytecode, assembled.bytecode);
    assert_eq!(read_back.line_table.as_deref(), Some(assembled.line_table.as_slice()));

    let reassembled = assembler::assemble(read_back.source.as_deref().unwrap()).unwrap();
    assert_eq!(reassembled.bytecode, assembled.bytecode);
    assert_eq!(reassembled.line_table, assembled.line_table);
}
