use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    MoveRight,
    MoveLeft,
    Increment,
    Decrement,
    Read,
    Write,
    ZeroLoopStart,
    ZeroLoopEnd,
    AccLoopStart,
    AccLoopEnd,
    Flip,
    Copy,
    Swap,
    WriteNumber,
    Newline,
}

impl Opcode {
    pub fn from_char(code: char) -> Option<Self> {
        let opcode = match code {
            '>' => Self::MoveRight,
            '<' => Self::MoveLeft,
            '+' => Self::Increment,
            '-' => Self::Decrement,
            ',' => Self::Read,
            '.' => Self::Write,
            '[' => Self::ZeroLoopStart,
            ']' => Self::ZeroLoopEnd,
            '(' => Self::AccLoopStart,
            ')' => Self::AccLoopEnd,
            '^' => Self::Flip,
            ';' => Self::Copy,
            ':' => Self::Swap,
            '!' => Self::WriteNumber,
            '_' => Self::Newline,
            _ => return None,
        };
        Some(opcode)
    }

    pub fn symbol(self) -> char {
        match self {
            Self::MoveRight => '>',
            Self::MoveLeft => '<',
            Self::Increment => '+',
            Self::Decrement => '-',
            Self::Read => ',',
            Self::Write => '.',
            Self::ZeroLoopStart => '[',
            Self::ZeroLoopEnd => ']',
            Self::AccLoopStart => '(',
            Self::AccLoopEnd => ')',
            Self::Flip => '^',
            Self::Copy => ';',
            Self::Swap => ':',
            Self::WriteNumber => '!',
            Self::Newline => '_',
        }
    }

    /// Short mnemonic used in program listings and trace logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::MoveRight => "mov_r",
            Self::MoveLeft => "mov_l",
            Self::Increment => "incr",
            Self::Decrement => "decr",
            Self::Read => "read",
            Self::Write => "write",
            Self::ZeroLoopStart => "jmpf0",
            Self::ZeroLoopEnd => "jmpb0",
            Self::AccLoopStart => "jmpfa",
            Self::AccLoopEnd => "jmpba",
            Self::Flip => "flip",
            Self::Copy => "copy",
            Self::Swap => "swap",
            Self::WriteNumber => "wrnum",
            Self::Newline => "newl",
        }
    }

    pub fn is_forward_jump(self) -> bool {
        matches!(self, Self::ZeroLoopStart | Self::AccLoopStart)
    }

    pub fn is_backward_jump(self) -> bool {
        matches!(self, Self::ZeroLoopEnd | Self::AccLoopEnd)
    }

    /// Whether the opcode touches the accumulator or the current cell depending on the mode.
    pub fn is_mode_sensitive(self) -> bool {
        matches!(
            self,
            Self::Increment
                | Self::Decrement
                | Self::Read
                | Self::Write
                | Self::WriteNumber
                | Self::Copy
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Index of the partner bracket. `None` on a jump opcode means the bracket was unmatched.
    pub jump_target: Option<usize>,
}

impl Instruction {
    fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            jump_target: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LoopFamily {
    Zero,
    Accumulator,
}

#[derive(Debug, Default)]
struct LoopStacks {
    zero: Vec<usize>,
    accumulator: Vec<usize>,
}

impl LoopStacks {
    fn get_mut(&mut self, family: LoopFamily) -> &mut Vec<usize> {
        match family {
            LoopFamily::Zero => &mut self.zero,
            LoopFamily::Accumulator => &mut self.accumulator,
        }
    }
}

fn loop_family(opcode: Opcode) -> Option<LoopFamily> {
    match opcode {
        Opcode::ZeroLoopStart | Opcode::ZeroLoopEnd => Some(LoopFamily::Zero),
        Opcode::AccLoopStart | Opcode::AccLoopEnd => Some(LoopFamily::Accumulator),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    /// Parses source text into a program. Never fails: unmatched brackets are kept
    /// without a jump target and resolved when executed.
    pub fn parse(source: &str) -> Self {
        let mut instructions: Vec<Instruction> = vec![];
        let mut stacks = LoopStacks::default();
        let mut in_comment = false;
        for code in source.chars() {
            if in_comment {
                if code == '\n' || code == '\r' {
                    in_comment = false;
                }
                continue;
            }
            if code == '#' {
                in_comment = true;
                continue;
            }
            let Some(opcode) = Opcode::from_char(code) else {
                continue;
            };
            match loop_family(opcode) {
                Some(family) if opcode.is_forward_jump() => {
                    stacks.get_mut(family).push(instructions.len());
                    instructions.push(Instruction::new(opcode));
                }
                Some(family) if opcode.is_backward_jump() => {
                    let ending = instructions.len();
                    match stacks.get_mut(family).pop() {
                        Some(beginning) => {
                            instructions.push(Instruction {
                                opcode,
                                jump_target: Some(beginning),
                            });
                            instructions[beginning].jump_target = Some(ending);
                        }
                        // unmatched closer, restarts the program when taken
                        None => instructions.push(Instruction::new(opcode)),
                    }
                }
                _ => instructions.push(Instruction::new(opcode)),
            }
        }
        tracing::debug!(
            instructions = instructions.len(),
            unmatched_zero_loops = stacks.zero.len(),
            unmatched_acc_loops = stacks.accumulator.len(),
            "parsed program"
        );
        Self { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }
}

impl<'a> IntoIterator for &'a Program {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Code ---")?;
        for (index, instruction) in self.iter().enumerate() {
            match instruction.jump_target {
                Some(target) => writeln!(f, "{index} {} {target}", instruction.opcode.name())?,
                None => writeln!(f, "{index} {}", instruction.opcode.name())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
fn opcodes(program: &Program) -> Vec<Opcode> {
    program.iter().map(|instruction| instruction.opcode).collect()
}

#[test]
fn test_ignores_unknown_characters() {
    let program = Program::parse("hello +> world\t<-");
    assert_eq!(
        opcodes(&program),
        [
            Opcode::Increment,
            Opcode::MoveRight,
            Opcode::MoveLeft,
            Opcode::Decrement
        ]
    );
}

#[test]
fn test_line_comments() {
    let program = Program::parse("+# comment with +-[]\n-#another\r.# unterminated ,");
    assert_eq!(
        opcodes(&program),
        [Opcode::Increment, Opcode::Decrement, Opcode::Write]
    );
}

#[test]
fn test_symbol_round_trips_through_from_char() {
    for code in "><+-,.[]()^;:!_".chars() {
        let opcode = Opcode::from_char(code).expect("command character must parse");
        assert_eq!(opcode.symbol(), code);
    }
    assert_eq!(Opcode::from_char('#'), None);
    assert_eq!(Opcode::from_char('a'), None);
}

#[test]
fn test_matched_pairs_point_at_each_other() {
    let program = Program::parse("+[>(-[+])<]");
    let pairs = [(1, 10), (3, 8), (5, 7)];
    for (open, close) in pairs {
        assert_eq!(program.get(open).unwrap().jump_target, Some(close));
        assert_eq!(program.get(close).unwrap().jump_target, Some(open));
    }
    for index in [0, 2, 4, 6, 9] {
        assert_eq!(program.get(index).unwrap().jump_target, None);
    }
}

#[test]
fn test_loop_families_are_independent() {
    // [ ( ] ) interleaved
    let program = Program::parse("[(])");
    assert_eq!(program.get(0).unwrap().jump_target, Some(2));
    assert_eq!(program.get(2).unwrap().jump_target, Some(0));
    assert_eq!(program.get(1).unwrap().jump_target, Some(3));
    assert_eq!(program.get(3).unwrap().jump_target, Some(1));
}

#[test]
fn test_closer_does_not_match_other_family() {
    let program = Program::parse("[)");
    assert_eq!(program.get(0).unwrap().jump_target, None);
    assert_eq!(program.get(1).unwrap().jump_target, None);
}

#[test]
fn test_unmatched_brackets_are_lenient() {
    let program = Program::parse("]+[(");
    assert_eq!(program.len(), 4);
    assert!(program.iter().all(|instruction| instruction.jump_target.is_none()));
}

#[test]
fn test_empty_source() {
    let program = Program::parse("# nothing here");
    assert!(program.is_empty());
}

#[test]
fn test_listing() {
    let program = Program::parse("+[-]");
    assert_eq!(
        program.to_string(),
        "--- Code ---\n0 incr\n1 jmpf0 3\n2 decr\n3 jmpb0 1\n"
    );
}

#[test]
fn test_mode_sensitive_opcodes() {
    let sensitive: String = "><+-,.[]()^;:!_"
        .chars()
        .filter(|&code| Opcode::from_char(code).is_some_and(Opcode::is_mode_sensitive))
        .collect();
    assert_eq!(sensitive, "+-,.;!");
}
