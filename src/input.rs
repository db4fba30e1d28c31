use std::io::BufRead;

/// Line buffered character source for the read instruction.
///
/// A whole line (terminator included) is pulled from the reader whenever the buffer runs
/// dry, then handed out one character at a time. Characters above `u8::MAX` and invalid
/// UTF-8 read as `0`, and so does every read after the reader is exhausted.
#[derive(Debug)]
pub struct LineInput<R> {
    reader: R,
    line: Vec<char>,
    position: usize,
    exhausted: bool,
}

impl<R: BufRead> LineInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: vec![],
            position: 0,
            exhausted: false,
        }
    }

    pub fn next_byte(&mut self) -> std::io::Result<u8> {
        if self.position >= self.line.len() && !self.refill()? {
            return Ok(0);
        }
        let code = self.line[self.position];
        self.position += 1;
        Ok(u8::try_from(u32::from(code)).unwrap_or(0))
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.exhausted && self.position >= self.line.len()
    }

    fn refill(&mut self) -> std::io::Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let mut buf = vec![];
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            tracing::debug!("input exhausted, reads yield 0 from now on");
            self.exhausted = true;
            return Ok(false);
        }
        // undecodable bytes become U+FFFD and read as 0
        self.line = String::from_utf8_lossy(&buf).chars().collect();
        self.position = 0;
        Ok(true)
    }
}

#[test]
fn test_yields_line_with_terminator() -> anyhow::Result<()> {
    let mut input = LineInput::new(std::io::BufReader::new(&b"ab\ncd"[..]));
    let mut read = vec![];
    for _ in 0..5 {
        read.push(input.next_byte()?);
    }
    assert_eq!(read, b"ab\ncd");
    Ok(())
}

#[test]
fn test_zero_after_end_of_stream() -> anyhow::Result<()> {
    let mut input = LineInput::new(std::io::BufReader::new(&b"x"[..]));
    assert_eq!(input.next_byte()?, b'x');
    assert!(!input.is_exhausted());
    for _ in 0..3 {
        assert_eq!(input.next_byte()?, 0);
    }
    assert!(input.is_exhausted());
    Ok(())
}

#[test]
fn test_wide_characters_clamp_to_zero() -> anyhow::Result<()> {
    let mut input = LineInput::new(std::io::BufReader::new("é€!".as_bytes()));
    assert_eq!(input.next_byte()?, 0xe9);
    assert_eq!(input.next_byte()?, 0);
    assert_eq!(input.next_byte()?, b'!');
    Ok(())
}

#[test]
fn test_invalid_utf8_clamps_to_zero() -> anyhow::Result<()> {
    let mut input = LineInput::new(std::io::BufReader::new(&[0xff, b'A', b'\n'][..]));
    assert_eq!(input.next_byte()?, 0);
    assert_eq!(input.next_byte()?, b'A');
    assert_eq!(input.next_byte()?, b'\n');
    Ok(())
}
