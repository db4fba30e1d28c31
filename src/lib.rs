//! Interpreter for AReg, a small esoteric language running on a circular tape of byte
//! registers plus one extra accumulator, the "A Register".
//!
//! # Commands
//!
//! | Command | Effect |
//! |---------|--------|
//! | `>` `<` | Move the memory pointer right / left, wrapping around the tape. |
//! | `+` `-` | Increment / decrement the target register (mod 256). |
//! | `,`     | Read one input character into the target register, `0` if not representable. |
//! | `.`     | Write the target register as a raw byte. |
//! | `!`     | Write the target register as a decimal number. |
//! | `_`     | Write a newline. |
//! | `^`     | Flip the target between the current cell and the A Register. |
//! | `;`     | Copy the A Register into the cell, or the cell into the A Register in A mode. |
//! | `:`     | Swap the A Register and the current cell. |
//! | `[` `]` | Loop while the current cell is not zero. |
//! | `(` `)` | Loop while the current cell differs from the A Register. |
//!
//! `#` starts a comment running to the end of the line. Every other character is ignored.
//!
//! Unbalanced brackets are not an error: an opener without a partner jumps to the end of the
//! program, and a closer without a partner jumps back to the start.

mod error;
mod input;
pub mod parser;
pub mod vm;

pub use error::AregError;
pub use input::LineInput;
pub use parser::{Instruction, Opcode, Program};
pub use vm::{Mode, Vm, execute};

/// Tape length used when none is configured.
pub const DEFAULT_TAPE_LENGTH: usize = 128;

#[cfg(test)]
fn run_source(source: &str, tape_length: usize, input: &[u8]) -> anyhow::Result<Vec<u8>> {
    let input = std::io::BufReader::new(input);
    let mut output = vec![];
    execute(Program::parse(source), tape_length, input, &mut output)?;
    Ok(output)
}

#[test]
fn test_echo() -> anyhow::Result<()> {
    assert_eq!(run_source(",[.,]", 1, b"14235\n23")?, b"14235\n23");
    Ok(())
}

#[test]
fn test_reverse() -> anyhow::Result<()> {
    let output = run_source(">,[>,]<[.<]", 16, b"1423523")?;
    assert_eq!(output, b"3253241");
    Ok(())
}

#[test]
fn test_hello_world() -> anyhow::Result<()> {
    let output = run_source(
        "++++++++++[>+++++++>++++++++++>+++>++++<
<<<-]>++.>+.+++++++..+++.>>++++.<++.<+++
+++++.--------.+++.------.--------.>+.",
        DEFAULT_TAPE_LENGTH,
        &[],
    )?;
    assert_eq!(output, b"Hello, world!");
    Ok(())
}

#[test]
fn test_sum_n() -> anyhow::Result<()> {
    let output = run_source(",[[->>+>+<<<]>>>[-<<<+>>>]<[-<+>]<<-]>.", 8, &[3])?;
    assert_eq!(output, [6]);
    Ok(())
}

#[test]
fn test_sum_n_with_accumulator() -> anyhow::Result<()> {
    // same sum, adding each counter value through the A Register
    let output = run_source(",[^;^>>(+<+>)[-]<<-]>!", 4, &[4])?;
    assert_eq!(output, b"10");
    Ok(())
}

#[test]
fn test_comments_and_text_are_inert() -> anyhow::Result<()> {
    let source = "
        # prints 2
        add two ++ then print !
    ";
    assert_eq!(run_source(source, 1, &[])?, b"2");
    Ok(())
}
