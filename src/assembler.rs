//! Two-pass assembler: source text -> (bytecode, line table).

pub mod directives;
pub mod label_table;
pub mod tokenizer;

use std::fmt;
use std::fs;
use std::path::Path;

use crate::encoding::Opcode;
use label_table::{LabelTable, MAX_LABEL_NAME_LEN};
use tokenizer::{Token, TokenKind, Tokenizer, classify};

pub const BYTECODE_LIMIT: usize = 255;

#[derive(Debug)]
pub enum Error {
    Lex {
        line: u32,
        message: String,
    },
    UnexpectedToken {
        line: u32,
        expected: &'static str,
        found: String,
    },
    UndefinedLabel {
        line: u32,
        name: String,
    },
    LabelTooLong {
        line: u32,
        name: String,
    },
    LengthOverflow {
        line: u32,
    },
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex { line, message } => write!(f, "line {line}: {message}"),
            Error::UnexpectedToken {
                line,
                expected,
                found,
            } => write!(f, "line {line}: expected {expected}, got {found}"),
            Error::UndefinedLabel { line, name } => {
                write!(f, "line {line}: undefined label \"{name}\"")
            }
            Error::LabelTooLong { line, name } => write!(
                f,
                "line {line}: label \"{name}\" cannot be longer than {MAX_LABEL_NAME_LEN} bytes"
            ),
            Error::LengthOverflow { line } => write!(
                f,
                "line {line}: bytecode length exceeds the limit of {BYTECODE_LIMIT} bytes"
            ),
            Error::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// The result of a successful assembly: the byte-for-byte bytecode, a
/// parallel per-byte source-line table, and the original source text.
pub struct Assembled {
    pub bytecode: Vec<u8>,
    pub line_table: Vec<u16>,
    pub source: String,
}

fn next(tok: &mut Tokenizer) -> Result<Token, Error> {
    tok.next()
        .map(classify)
        .map_err(|e| Error::Lex {
            line: e.line,
            message: e.message,
        })
}

fn unexpected(t: &Token, expected: &'static str) -> Error {
    Error::UnexpectedToken {
        line: t.line,
        expected,
        found: format!("{}", t.kind_display()),
    }
}

impl Token {
    fn kind_display(&self) -> String {
        format!("{self}")
    }
}

fn check_overflow(length: usize, line: u32) -> Result<(), Error> {
    if length > BYTECODE_LIMIT {
        Err(Error::LengthOverflow { line })
    } else {
        Ok(())
    }
}

/// Assemble `source`, performing pass 1 (sizing + label collection) and
/// pass 2 (emission) as two independent traversals of the token stream.
pub fn assemble(source: &str) -> Result<Assembled, Error> {
    let mut labels = LabelTable::new();
    let mut length: usize = 0;

    {
        let mut tok = Tokenizer::new(source);
        loop {
            let t = next(&mut tok)?;
            match &t.kind {
                TokenKind::Eof => break,
                TokenKind::Label(name) => {
                    if name.len() > MAX_LABEL_NAME_LEN {
                        return Err(Error::LabelTooLong {
                            line: t.line,
                            name: name.clone(),
                        });
                    }
                    labels.define(name, length as u8, t.line);
                }
                TokenKind::Opcode(name) => {
                    length += 1;
                    check_overflow(length, t.line)?;
                    if name == "halt" || name == "nop" {
                        continue;
                    }
                    let opcode = Opcode::from_name(name).expect("classified as opcode");
                    let operand = next(&mut tok)?;
                    if opcode.is_jump() {
                        match &operand.kind {
                            TokenKind::Label(_) | TokenKind::Number(_) => {
                                length += 1;
                            }
                            TokenKind::Target(_) => {}
                            _ => {
                                return Err(unexpected(
                                    &operand,
                                    "a label, number, or target after a jump opcode",
                                ));
                            }
                        }
                    } else {
                        match &operand.kind {
                            TokenKind::Number(_) | TokenKind::CharLiteral(_) | TokenKind::Label(_) => {
                                length += 1;
                            }
                            TokenKind::Target(_) => {}
                            _ => {
                                return Err(unexpected(&operand, "a target or a number after opcode"));
                            }
                        }
                    }
                }
                TokenKind::Comment => {}
                TokenKind::Punct(p) if p == "." => {
                    let directive = next(&mut tok)?;
                    match &directive.kind {
                        TokenKind::Str(s) => {
                            length += directives::string_size(s);
                        }
                        TokenKind::Punct(b) if b == "[" => loop {
                            let item = next(&mut tok)?;
                            match &item.kind {
                                TokenKind::Number(_) => length += 1,
                                TokenKind::Punct(c) if c == "]" => break,
                                _ => {
                                    return Err(unexpected(
                                        &item,
                                        "a number or ] to close an array of numbers",
                                    ));
                                }
                            }
                        },
                        _ => {
                            return Err(unexpected(&directive, "a string or an array of numbers after '.'"));
                        }
                    }
                }
                _ => return Err(unexpected(&t, "a label, opcode, directive, or comment")),
            }
            check_overflow(length, t.line)?;
        }
    }

    let mut bytecode = Vec::with_capacity(length);
    let mut line_table = Vec::with_capacity(length);

    {
        let mut tok = Tokenizer::new(source);
        loop {
            let t = next(&mut tok)?;
            match &t.kind {
                TokenKind::Eof => break,
                TokenKind::Label(_) | TokenKind::Comment => {}
                TokenKind::Punct(p) if p == "." => {
                    let directive = next(&mut tok)?;
                    match &directive.kind {
                        TokenKind::Str(s) => {
                            directives::emit_string(&mut bytecode, &mut line_table, t.line, s);
                        }
                        TokenKind::Punct(b) if b == "[" => loop {
                            let item = next(&mut tok)?;
                            match &item.kind {
                                TokenKind::Number(v) => {
                                    if *v > 0xff {
                                        crate::logging::warning(
                                            format!("number will not fit in a byte: {v}"),
                                            t.line as usize,
                                        );
                                    }
                                    directives::emit_array_entry(&mut bytecode, &mut line_table, t.line, *v);
                                }
                                TokenKind::Punct(c) if c == "]" => break,
                                _ => unreachable!("validated in pass 1"),
                            }
                        },
                        _ => unreachable!("validated in pass 1"),
                    }
                }
                TokenKind::Opcode(name) => {
                    let opcode = Opcode::from_name(name).expect("classified as opcode");
                    if name == "halt" || name == "nop" {
                        write_instruction_nil(&mut bytecode, &mut line_table, t.line, opcode);
                        continue;
                    }

                    let operand = next(&mut tok)?;

                    if opcode.is_jump() {
                        match &operand.kind {
                            TokenKind::Label(label) => {
                                let addr = labels.resolve(label).ok_or_else(|| Error::UndefinedLabel {
                                    line: operand.line,
                                    name: label.clone(),
                                })?;
                                write_instruction_adj(&mut bytecode, &mut line_table, t.line, opcode, addr);
                            }
                            TokenKind::Number(v) => {
                                warn_if_truncated(*v, operand.line);
                                write_instruction_adj(
                                    &mut bytecode,
                                    &mut line_table,
                                    t.line,
                                    opcode,
                                    (*v & 0xff) as u8,
                                );
                            }
                            TokenKind::Target(name) => {
                                let target = crate::encoding::Target::from_name(name)
                                    .expect("classified as target");
                                write_instruction(&mut bytecode, &mut line_table, t.line, opcode, target);
                            }
                            _ => unreachable!("validated in pass 1"),
                        }
                        continue;
                    }

                    match &operand.kind {
                        TokenKind::CharLiteral(b) => {
                            write_instruction_adj(&mut bytecode, &mut line_table, t.line, opcode, *b);
                        }
                        TokenKind::Label(label) => {
                            let addr = labels.resolve(label).ok_or_else(|| Error::UndefinedLabel {
                                line: operand.line,
                                name: label.clone(),
                            })?;
                            write_instruction_adj(&mut bytecode, &mut line_table, t.line, opcode, addr);
                        }
                        TokenKind::Number(v) => {
                            warn_if_truncated(*v, operand.line);
                            write_instruction_adj(
                                &mut bytecode,
                                &mut line_table,
                                t.line,
                                opcode,
                                (*v & 0xff) as u8,
                            );
                        }
                        TokenKind::Target(name) => {
                            let target =
                                crate::encoding::Target::from_name(name).expect("classified as target");
                            write_instruction(&mut bytecode, &mut line_table, t.line, opcode, target);
                        }
                        _ => unreachable!("validated in pass 1"),
                    }
                }
                _ => unreachable!("validated in pass 1"),
            }
        }
    }

    for label in labels.unused() {
        crate::logging::warning(
            format!("unused label {}", label.name),
            label.def_line as usize,
        );
    }

    Ok(Assembled {
        bytecode,
        line_table,
        source: source.to_string(),
    })
}

fn warn_if_truncated(value: i64, line: u32) {
    if value > 0xff {
        crate::logging::warning(
            format!("number will not fit in a byte: {value}"),
            line as usize,
        );
    }
}

fn write_instruction(
    bytecode: &mut Vec<u8>,
    line_table: &mut Vec<u16>,
    line: u32,
    opcode: Opcode,
    target: crate::encoding::Target,
) {
    bytecode.push(crate::encoding::Instruction::pack(opcode, target).0);
    line_table.push(line as u16);
}

fn write_instruction_nil(bytecode: &mut Vec<u8>, line_table: &mut Vec<u16>, line: u32, opcode: Opcode) {
    write_instruction(bytecode, line_table, line, opcode, crate::encoding::Target::Nil);
}

fn write_instruction_adj(
    bytecode: &mut Vec<u8>,
    line_table: &mut Vec<u16>,
    line: u32,
    opcode: Opcode,
    operand: u8,
) {
    write_instruction(bytecode, line_table, line, opcode, crate::encoding::Target::Adj);
    bytecode.push(operand);
    line_table.push(line as u16);
}

pub fn assemble_from_file(path: impl AsRef<Path>) -> Result<Assembled, Error> {
    let source = fs::read_to_string(path)?;
    assemble(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::{Instruction, Opcode as Op, Target as Tg};

    #[test]
    fn halt_and_nop_are_single_byte() {
        let a = assemble("nop\nhalt").unwrap();
        assert_eq!(a.bytecode.len(), 2);
        assert_eq!(a.line_table, vec![1, 2]);
    }

    #[test]
    fn opcode_with_target_is_single_byte() {
        let a = assemble("add RG0").unwrap();
        assert_eq!(a.bytecode.len(), 1);
        let ins = Instruction(a.bytecode[0]);
        assert_eq!(ins.opcode().unwrap(), Op::Add);
        assert_eq!(ins.target().unwrap(), Tg::Rg0);
    }

    #[test]
    fn opcode_with_number_is_two_bytes_adj() {
        let a = assemble("add 5").unwrap();
        assert_eq!(a.bytecode.len(), 2);
        let ins = Instruction(a.bytecode[0]);
        assert_eq!(ins.target().unwrap(), Tg::Adj);
        assert_eq!(a.bytecode[1], 5);
    }

    #[test]
    fn labels_resolve_to_addresses() {
        let a = assemble("loop: add 1\njmp loop").unwrap();
        // add 1 -> 2 bytes (offset 0,1); jmp loop -> ADJ + addr (offset 2,3)
        assert_eq!(a.bytecode[3], 0);
    }

    #[test]
    fn undefined_label_is_an_error() {
        let err = assemble("jmp nowhere").unwrap_err();
        assert!(matches!(err, Error::UndefinedLabel { .. }));
    }

    #[test]
    fn string_directive_is_nul_terminated() {
        let a = assemble("msg: .\"HI\"\nget msg\nput DWN\nhalt").unwrap();
        assert_eq!(&a.bytecode[0..3], &[b'H', b'I', 0]);
    }

    #[test]
    fn array_directive_emits_each_number() {
        let a = assemble(".[1 2 3]").unwrap();
        assert_eq!(a.bytecode, vec![1, 2, 3]);
    }

    #[test]
    fn length_overflow_is_fatal() {
        let src = "halt\n".repeat(256);
        let err = assemble(&src).unwrap_err();
        assert!(matches!(err, Error::LengthOverflow { .. }));
    }
}
