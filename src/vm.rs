use std::io::{BufRead, Write};

use crate::{
    error::AregError,
    input::LineInput,
    parser::{Opcode, Program},
};

#[cfg(windows)]
const NEWLINE: &[u8] = b"\r\n";
#[cfg(not(windows))]
const NEWLINE: &[u8] = b"\n";

/// Which register the mode sensitive instructions act on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Tape,
    Accumulator,
}

impl Mode {
    pub fn flip(self) -> Self {
        match self {
            Self::Tape => Self::Accumulator,
            Self::Accumulator => Self::Tape,
        }
    }
}

#[derive(Debug)]
pub struct Vm<I, O> {
    program: Program,
    program_counter: usize,
    tape: Vec<u8>,
    pointer: usize,
    accumulator: u8,
    mode: Mode,
    input: LineInput<I>,
    output: O,
}

impl<I, O> Vm<I, O>
where
    I: BufRead,
    O: Write,
{
    pub fn new(
        program: Program,
        tape_length: usize,
        input: I,
        output: O,
    ) -> Result<Self, AregError> {
        if tape_length == 0 {
            return Err(AregError::EmptyTape);
        }
        Ok(Self {
            program,
            program_counter: 0,
            tape: vec![0; tape_length],
            pointer: 0,
            accumulator: 0,
            mode: Mode::default(),
            input: LineInput::new(input),
            output,
        })
    }

    pub fn is_end(&self) -> bool {
        self.program_counter >= self.program.len()
    }

    pub fn program_counter(&self) -> usize {
        self.program_counter
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn accumulator(&self) -> u8 {
        self.accumulator
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn tape(&self) -> &[u8] {
        &self.tape
    }

    pub fn head_value(&self) -> u8 {
        self.tape[self.pointer]
    }

    fn head_value_mut(&mut self) -> &mut u8 {
        &mut self.tape[self.pointer]
    }

    /// Register selected by the current mode.
    fn target(&self) -> u8 {
        match self.mode {
            Mode::Tape => self.head_value(),
            Mode::Accumulator => self.accumulator,
        }
    }

    fn target_mut(&mut self) -> &mut u8 {
        match self.mode {
            Mode::Tape => self.head_value_mut(),
            Mode::Accumulator => &mut self.accumulator,
        }
    }

    /// Next counter for a conditional jump. An unmatched bracket jumps to `fallback`.
    fn jump_if(&self, condition: bool, target: Option<usize>, fallback: usize) -> usize {
        if condition {
            target.unwrap_or(fallback)
        } else {
            self.program_counter + 1
        }
    }

    /// Executes the instruction under the program counter. Does nothing at the end.
    pub fn step(&mut self) -> Result<(), AregError> {
        let Some(&instruction) = self.program.get(self.program_counter) else {
            return Ok(());
        };
        let next = self.program_counter + 1;
        let end = self.program.len();
        let next = match instruction.opcode {
            Opcode::MoveRight => {
                self.pointer = (self.pointer + 1) % self.tape.len();
                next
            }
            Opcode::MoveLeft => {
                self.pointer = self.pointer.checked_sub(1).unwrap_or(self.tape.len() - 1);
                next
            }
            Opcode::Increment => {
                let target = self.target_mut();
                *target = target.wrapping_add(1);
                next
            }
            Opcode::Decrement => {
                let target = self.target_mut();
                *target = target.wrapping_sub(1);
                next
            }
            Opcode::Read => {
                let byte = self.input.next_byte()?;
                if self.input.is_exhausted() {
                    tracing::trace!(pc = self.program_counter, "read past end of input");
                }
                *self.target_mut() = byte;
                next
            }
            Opcode::Write => {
                let value = self.target();
                self.output.write_all(&[value])?;
                next
            }
            Opcode::WriteNumber => {
                let value = self.target();
                write!(self.output, "{value}")?;
                next
            }
            Opcode::Newline => {
                self.output.write_all(NEWLINE)?;
                next
            }
            Opcode::Flip => {
                self.mode = self.mode.flip();
                next
            }
            Opcode::Copy => {
                match self.mode {
                    Mode::Tape => self.tape[self.pointer] = self.accumulator,
                    Mode::Accumulator => self.accumulator = self.head_value(),
                }
                next
            }
            Opcode::Swap => {
                let pointer = self.pointer;
                std::mem::swap(&mut self.tape[pointer], &mut self.accumulator);
                next
            }
            Opcode::ZeroLoopStart => {
                self.jump_if(self.head_value() == 0, instruction.jump_target, end)
            }
            Opcode::ZeroLoopEnd => self.jump_if(self.head_value() != 0, instruction.jump_target, 0),
            Opcode::AccLoopStart => self.jump_if(
                self.head_value() == self.accumulator,
                instruction.jump_target,
                end,
            ),
            Opcode::AccLoopEnd => self.jump_if(
                self.head_value() != self.accumulator,
                instruction.jump_target,
                0,
            ),
        };
        tracing::trace!(
            pc = self.program_counter,
            op = instruction.opcode.name(),
            symbol = %instruction.opcode.symbol(),
            target = ?instruction.opcode.is_mode_sensitive().then_some(self.mode),
            next,
            pointer = self.pointer,
            cell = self.head_value(),
            acc = self.accumulator,
            mode = ?self.mode,
            "step"
        );
        self.program_counter = next;
        Ok(())
    }

    pub fn execute(mut self) -> Result<(), AregError> {
        tracing::debug!(
            instructions = self.program.len(),
            tape_length = self.tape.len(),
            "starting execution"
        );
        while !self.is_end() {
            self.step()?;
        }
        self.output.flush()?;
        tracing::debug!(tape = ?self.tape, "finished");
        Ok(())
    }
}

/// Runs `program` to completion on a fresh tape of `tape_length` cells.
pub fn execute<I, O>(
    program: Program,
    tape_length: usize,
    input: I,
    output: O,
) -> Result<(), AregError>
where
    I: BufRead,
    O: Write,
{
    Vm::new(program, tape_length, input, output)?.execute()
}

#[cfg(test)]
fn run(source: &str, tape_length: usize, input: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut output = vec![];
    execute(
        Program::parse(source),
        tape_length,
        std::io::BufReader::new(input),
        &mut output,
    )?;
    Ok(output)
}

#[cfg(test)]
fn vm_for(source: &str, tape_length: usize) -> anyhow::Result<Vm<&'static [u8], Vec<u8>>> {
    Ok(Vm::new(Program::parse(source), tape_length, &[][..], vec![])?)
}

#[test]
fn test_write_raw_byte() -> anyhow::Result<()> {
    assert_eq!(run("+++.", 1, &[])?, [3]);
    Ok(())
}

#[test]
fn test_write_number() -> anyhow::Result<()> {
    assert_eq!(run("+++!", 1, &[])?, b"3");
    Ok(())
}

#[test]
fn test_zero_loop_counts_down() -> anyhow::Result<()> {
    assert_eq!(run("+[-]!", 1, &[])?, b"0");
    Ok(())
}

#[test]
fn test_flip_targets_accumulator() -> anyhow::Result<()> {
    assert_eq!(run("^+++^!", 1, &[])?, b"0");
    assert_eq!(run("^+++!", 1, &[])?, b"3");
    Ok(())
}

#[test]
fn test_newline() -> anyhow::Result<()> {
    assert_eq!(run("+!_!", 1, &[])?, [&b"1"[..], NEWLINE, &b"1"[..]].concat());
    Ok(())
}

#[test]
fn test_empty_tape_is_rejected() {
    let res = Vm::new(Program::parse("+"), 0, &[][..], vec![]);
    let err = res.expect_err("zero length tape must be rejected");
    assert!(matches!(err, AregError::EmptyTape));
}

#[test]
fn test_empty_program() -> anyhow::Result<()> {
    assert!(run("just words", 4, &[])?.is_empty());
    Ok(())
}

#[test]
fn test_pointer_wraps_around() -> anyhow::Result<()> {
    let mut vm = vm_for("<<>>>>>", 3)?;
    let expected = [2, 1, 2, 0, 1, 2, 0];
    for pointer in expected {
        vm.step()?;
        assert_eq!(vm.pointer(), pointer);
        assert!(vm.pointer() < vm.tape().len());
    }
    Ok(())
}

#[test]
fn test_single_cell_tape_pointer() -> anyhow::Result<()> {
    let mut vm = vm_for("><+", 1)?;
    while !vm.is_end() {
        vm.step()?;
        assert_eq!(vm.pointer(), 0);
    }
    assert_eq!(vm.head_value(), 1);
    Ok(())
}

#[test]
fn test_registers_wrap() -> anyhow::Result<()> {
    let source = format!("-{}^-{}", "+".repeat(300), "-".repeat(2));
    let mut vm = vm_for(&source, 1)?;
    while !vm.is_end() {
        vm.step()?;
    }
    // 255 + 300 = 555 = 43 mod 256
    assert_eq!(vm.head_value(), 43);
    // 0 - 3 = 253 mod 256
    assert_eq!(vm.accumulator(), 253);
    Ok(())
}

#[test]
fn test_swap_is_its_own_inverse() -> anyhow::Result<()> {
    let mut vm = vm_for("+++^+:", 1)?;
    for _ in 0..5 {
        vm.step()?;
    }
    assert_eq!((vm.accumulator(), vm.head_value()), (1, 3));
    vm.step()?;
    assert_eq!((vm.accumulator(), vm.head_value()), (3, 1));

    let mut vm = vm_for("+++^+::", 1)?;
    while !vm.is_end() {
        vm.step()?;
    }
    assert_eq!((vm.accumulator(), vm.head_value()), (1, 3));
    Ok(())
}

#[test]
fn test_swap_ignores_mode() -> anyhow::Result<()> {
    let mut vm = vm_for("++^+++^:", 1)?;
    while !vm.is_end() {
        vm.step()?;
    }
    assert_eq!((vm.accumulator(), vm.head_value()), (2, 3));
    Ok(())
}

#[test]
fn test_copy_direction_follows_mode() -> anyhow::Result<()> {
    // tape mode: accumulator -> cell
    let mut vm = vm_for("++^+++++^;", 1)?;
    while !vm.is_end() {
        vm.step()?;
    }
    assert_eq!((vm.accumulator(), vm.head_value()), (5, 5));

    // accumulator mode: cell -> accumulator
    let mut vm = vm_for("++^+++++;", 1)?;
    while !vm.is_end() {
        vm.step()?;
    }
    assert_eq!((vm.accumulator(), vm.head_value()), (2, 2));
    Ok(())
}

#[test]
fn test_copy_then_copy_back() -> anyhow::Result<()> {
    let mut vm = vm_for("+++++++^--;^;", 1)?;
    while !vm.is_end() {
        vm.step()?;
    }
    assert_eq!(vm.accumulator(), vm.head_value());
    assert_eq!(vm.head_value(), 7);
    assert_eq!(vm.mode(), Mode::Tape);
    Ok(())
}

#[test]
fn test_read_targets_mode_register() -> anyhow::Result<()> {
    let output = run(",^,^.^.", 1, b"AB")?;
    assert_eq!(output, b"AB");
    Ok(())
}

#[test]
fn test_read_past_end_yields_zero() -> anyhow::Result<()> {
    assert_eq!(run(",!,!,!", 1, b"a")?, b"9700");
    Ok(())
}

#[test]
fn test_echo_line() -> anyhow::Result<()> {
    // prints characters until the newline terminator
    let output = run("^++++++++++^,(.,)", 1, b"hello\nrest")?;
    assert_eq!(output, b"hello");
    Ok(())
}

#[test]
fn test_accumulator_loop_counts_up() -> anyhow::Result<()> {
    // count the cell up to the accumulator
    let output = run("^+++++^(+!)", 1, &[])?;
    assert_eq!(output, b"12345");
    Ok(())
}

#[test]
fn test_nested_loops() -> anyhow::Result<()> {
    // 3 * 4 into the second cell
    let output = run("+++[>++++<-]>!", 2, &[])?;
    assert_eq!(output, b"12");
    Ok(())
}

#[test]
fn test_unmatched_opener_exits_program() -> anyhow::Result<()> {
    assert_eq!(run("![+!", 1, &[])?, b"0");
    assert_eq!(run("^+^+!(+!", 1, &[])?, b"1");
    Ok(())
}

#[test]
fn test_unmatched_opener_not_taken_continues() -> anyhow::Result<()> {
    assert_eq!(run("+[!", 1, &[])?, b"1");
    Ok(())
}

#[test]
fn test_unmatched_closer_restarts_program() -> anyhow::Result<()> {
    let mut vm = vm_for("+]", 1)?;
    for round in 1..=3u8 {
        vm.step()?;
        assert_eq!(vm.head_value(), round);
        assert_eq!(vm.program_counter(), 1);
        vm.step()?;
        assert_eq!(vm.program_counter(), 0);
    }
    assert!(!vm.is_end());
    Ok(())
}

#[test]
fn test_unmatched_acc_closer_restarts_program() -> anyhow::Result<()> {
    let mut vm = vm_for("+)", 1)?;
    for round in 1..=3u8 {
        vm.step()?;
        assert_eq!(vm.head_value(), round);
        assert_ne!(vm.head_value(), vm.accumulator());
        vm.step()?;
        assert_eq!(vm.program_counter(), 0);
    }
    assert!(!vm.is_end());
    Ok(())
}

#[test]
fn test_invalid_utf8_input_reads_as_zero() -> anyhow::Result<()> {
    assert_eq!(run(",!,!", 1, &[0xff, b'A', b'\n'])?, b"0065");
    Ok(())
}

#[test]
fn test_unmatched_acc_closer_falls_through_when_equal() -> anyhow::Result<()> {
    assert_eq!(run(")!", 1, &[])?, b"0");
    Ok(())
}

#[test]
fn test_hello() -> anyhow::Result<()> {
    let source = "
        # 8 * 9 = 72 'H', then 'i'
        ++++++++[>+++++++++<-]>.
        +++++++++++++++++++++++++++++++++.
        _
    ";
    assert_eq!(run(source, 128, &[])?, [&b"Hi"[..], NEWLINE].concat());
    Ok(())
}
