use std::{env, fs, process};

use blocklang::assembler::{self, tokenizer};
use blocklang::logging::error;
use blocklang::objfile;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} -f <input-source> -o <output-object> [-d]");
    process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut input_file: Option<String> = None;
    let mut output_file: Option<String> = None;
    let mut debug = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-f" => {
                i += 1;
                input_file = args.get(i).cloned();
            }
            "-o" => {
                i += 1;
                output_file = args.get(i).cloned();
            }
            "-d" => debug = true,
            _ => usage(&args[0]),
        }
        i += 1;
    }

    let (Some(input_file), Some(output_file)) = (input_file, output_file) else {
        usage(&args[0]);
    };

    let source = fs::read_to_string(&input_file).unwrap_or_else(|e| {
        error(format!("failed to read source file {input_file}: {e}"));
        process::exit(1);
    });

    let assembled = assembler::assemble(&source).unwrap_or_else(|e| {
        error(e.to_string());
        eprintln!("all recognized tokens:");
        eprintln!("{}", tokenizer::dump(&source));
        process::exit(2);
    });

    let mut out = fs::File::create(&output_file).unwrap_or_else(|e| {
        error(format!("failed to open output file {output_file}: {e}"));
        process::exit(3);
    });

    let write_result = if debug {
        objfile::write_debug(
            &mut out,
            &assembled.source,
            &assembled.bytecode,
            &assembled.line_table,
        )
    } else {
        objfile::write_raw(&mut out, &assembled.bytecode)
    };

    write_result.unwrap_or_else(|e| {
        error(format!("failed to write object file: {e}"));
        process::exit(3);
    });

    println!("assembled {} bytes -> {output_file}", assembled.bytecode.len());
}
