//! Content-stream tokenizer for PDF operator/operand parsing.
//!
//! Parses raw PDF content-stream bytes into a sequence of [`Content`]
//! items: ordinary [`Operator`]s carrying their [`Operand`] arguments, and
//! [`InlineImage`]s captured from `BI … ID … EI` sequences. This is the
//! foundation for the content-stream walker.

use crate::error::BackendError;

/// A PDF content-stream operand value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Integer number (e.g., `42`, `-7`).
    Integer(i64),
    /// Real (floating-point) number (e.g., `3.14`, `.5`).
    Real(f64),
    /// Name object (e.g., `/Im1`). Stored without the leading `/`.
    Name(String),
    /// Literal string delimited by parentheses, stored as raw bytes.
    LiteralString(Vec<u8>),
    /// Hexadecimal string delimited by angle brackets, stored decoded.
    HexString(Vec<u8>),
    /// Array of operands (e.g., `[1 2 3]`).
    Array(Vec<Operand>),
    /// Dictionary (`<< /Key value … >>`), in declaration order.
    Dictionary(Vec<(String, Operand)>),
    /// Boolean value (`true` or `false`).
    Boolean(bool),
    /// The null object.
    Null,
}

impl Operand {
    /// Numeric value of an Integer or Real operand.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Integer(i) => Some(*i as f64),
            Operand::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Integer value, truncating reals.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Operand::Integer(i) => Some(*i),
            Operand::Real(f) => Some(*f as i64),
            _ => None,
        }
    }

    /// Name payload of a Name operand.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }
}

/// A PDF content-stream operator with its preceding operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    /// Operator name (e.g., `"q"`, `"cm"`, `"Do"`).
    pub name: String,
    /// Operands that preceded this operator on the operand stack.
    pub operands: Vec<Operand>,
}

/// An inline image captured from a `BI … ID … EI` sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// Dictionary entries between `BI` and `ID`, in order.
    pub dict: Vec<(String, Operand)>,
    /// Raw payload bytes between `ID` and `EI`.
    pub data: Vec<u8>,
}

/// One item of a tokenized content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// An ordinary operator.
    Op(Operator),
    /// An inline image.
    Inline(InlineImage),
}

/// Parse content-stream bytes into operators and inline images.
///
/// Each operator collects the operands that preceded it on the operand
/// stack. Comments (`%` to end of line) are stripped.
///
/// # Errors
///
/// Returns [`BackendError::ContentStream`] for unrecoverable syntax
/// errors (unterminated strings, arrays or inline images).
pub fn tokenize(input: &[u8]) -> Result<Vec<Content>, BackendError> {
    let mut scanner = Scanner { input, pos: 0 };
    let mut items = Vec::new();
    let mut operand_stack: Vec<Operand> = Vec::new();

    loop {
        scanner.skip_whitespace_and_comments();
        let b = match scanner.peek() {
            Some(b) => b,
            None => break,
        };

        match b {
            b'(' => operand_stack.push(Operand::LiteralString(scanner.literal_string()?)),
            b'<' => {
                if scanner.peek_at(1) == Some(b'<') {
                    operand_stack.push(Operand::Dictionary(scanner.dictionary()?));
                } else {
                    operand_stack.push(Operand::HexString(scanner.hex_string()?));
                }
            }
            b'[' => {
                scanner.pos += 1;
                operand_stack.push(Operand::Array(scanner.array()?));
            }
            b'/' => operand_stack.push(Operand::Name(scanner.name())),
            b'0'..=b'9' | b'+' | b'-' | b'.' => operand_stack.push(scanner.number()?),
            b'a'..=b'z' | b'A'..=b'Z' | b'*' | b'\'' | b'"' => {
                let keyword = scanner.keyword();
                match keyword.as_str() {
                    "true" => operand_stack.push(Operand::Boolean(true)),
                    "false" => operand_stack.push(Operand::Boolean(false)),
                    "null" => operand_stack.push(Operand::Null),
                    "BI" => {
                        operand_stack.clear();
                        items.push(Content::Inline(scanner.inline_image()?));
                    }
                    _ => items.push(Content::Op(Operator {
                        name: keyword,
                        operands: std::mem::take(&mut operand_stack),
                    })),
                }
            }
            b']' => {
                return Err(BackendError::ContentStream(
                    "unexpected ']' outside array".to_string(),
                ));
            }
            _ => scanner.pos += 1, // skip unknown bytes
        }
    }

    Ok(items)
}

/// Returns `true` if `b` is a PDF whitespace character.
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

/// Returns `true` if `b` is a PDF delimiter character.
pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.pos + ahead).copied()
    }

    fn err(&self, msg: &str) -> BackendError {
        BackendError::ContentStream(msg.to_string())
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(b) = self.peek() {
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Parse a literal string `(...)` with balanced parentheses and escapes.
    fn literal_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1; // skip '('
        let mut result = Vec::new();
        let mut depth = 1u32;

        while let Some(b) = self.peek() {
            match b {
                b'(' => {
                    depth += 1;
                    result.push(b);
                    self.pos += 1;
                }
                b')' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(result);
                    }
                    result.push(b);
                }
                b'\\' => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.err("unterminated escape in literal string"))?;
                    self.pos += 1;
                    match escaped {
                        b'n' => result.push(b'\n'),
                        b'r' => result.push(b'\r'),
                        b't' => result.push(b'\t'),
                        b'b' => result.push(0x08),
                        b'f' => result.push(0x0C),
                        b'(' | b')' | b'\\' => result.push(escaped),
                        b'\r' => {
                            // Line continuation: swallow an optional LF
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            // Octal escape, up to three digits
                            let mut value = escaped - b'0';
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value.wrapping_mul(8).wrapping_add(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            result.push(value);
                        }
                        other => result.push(other),
                    }
                }
                _ => {
                    result.push(b);
                    self.pos += 1;
                }
            }
        }

        Err(self.err("unterminated literal string"))
    }

    /// Parse a hex string `<...>`.
    fn hex_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1; // skip '<'
        let mut digits = Vec::new();
        loop {
            match self.peek() {
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b) if is_whitespace(b) => self.pos += 1,
                Some(b) => {
                    digits.push(hex_digit(b).ok_or_else(|| self.err("invalid hex digit"))?);
                    self.pos += 1;
                }
                None => return Err(self.err("unterminated hex string")),
            }
        }
        if digits.len() % 2 != 0 {
            digits.push(0);
        }
        Ok(digits.chunks_exact(2).map(|d| (d[0] << 4) | d[1]).collect())
    }

    /// Parse a `/Name` token with `#XX` escapes. Assumes the `/` is current.
    fn name(&mut self) -> String {
        self.pos += 1; // skip '/'
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        let mut name = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_digit(raw[i + 1]), hex_digit(raw[i + 2])) {
                    name.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            name.push(raw[i]);
            i += 1;
        }
        String::from_utf8_lossy(&name).into_owned()
    }

    /// Parse a number (integer or real).
    fn number(&mut self) -> Result<Operand, BackendError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.pos += 1;
        }
        let mut has_dot = false;
        while let Some(b) = self.peek() {
            if b == b'.' {
                if has_dot {
                    break;
                }
                has_dot = true;
                self.pos += 1;
            } else if b.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }

        let token = std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| self.err("invalid number token"))?;
        if has_dot {
            token
                .parse::<f64>()
                .map(Operand::Real)
                .map_err(|_| self.err("invalid real number"))
        } else {
            token
                .parse::<i64>()
                .map(Operand::Integer)
                .map_err(|_| self.err("invalid integer"))
        }
    }

    /// Parse a keyword (alphabetic plus `*`, `'`, `"`).
    fn keyword(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_alphabetic() || matches!(b, b'*' | b'\'' | b'"') {
                self.pos += 1;
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Parse an array until `]`. Assumes `[` already consumed.
    fn array(&mut self) -> Result<Vec<Operand>, BackendError> {
        let mut elements = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(self.err("unterminated array")),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(elements);
                }
                Some(_) => elements.push(self.object()?),
            }
        }
    }

    /// Parse a dictionary `<< /Key value … >>`. Assumes `<<` is current.
    fn dictionary(&mut self) -> Result<Vec<(String, Operand)>, BackendError> {
        self.pos += 2; // skip '<<'
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            if self.peek() == Some(b'>') && self.peek_at(1) == Some(b'>') {
                self.pos += 2;
                return Ok(entries);
            }
            match self.peek() {
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace_and_comments();
                    let value = self.object()?;
                    entries.push((key, value));
                }
                Some(_) => return Err(self.err("expected name key in dictionary")),
                None => return Err(self.err("unterminated dictionary")),
            }
        }
    }

    /// Parse a single object: the common element of arrays, dictionaries
    /// and inline-image values.
    fn object(&mut self) -> Result<Operand, BackendError> {
        match self.peek().ok_or_else(|| self.err("unexpected end of stream"))? {
            b'/' => Ok(Operand::Name(self.name())),
            b'(' => Ok(Operand::LiteralString(self.literal_string()?)),
            b'<' => {
                if self.peek_at(1) == Some(b'<') {
                    Ok(Operand::Dictionary(self.dictionary()?))
                } else {
                    Ok(Operand::HexString(self.hex_string()?))
                }
            }
            b'[' => {
                self.pos += 1;
                Ok(Operand::Array(self.array()?))
            }
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' => {
                let kw = self.keyword();
                match kw.as_str() {
                    "true" => Ok(Operand::Boolean(true)),
                    "false" => Ok(Operand::Boolean(false)),
                    "null" => Ok(Operand::Null),
                    _ => Ok(Operand::Name(kw)),
                }
            }
            other => Err(self.err(&format!("unexpected byte 0x{other:02X}"))),
        }
    }

    /// Parse `BI <dict> ID <payload> EI`. Called after the `BI` keyword.
    ///
    /// The payload length comes from `/L` (or `/Length`) when the
    /// dictionary carries one — avoiding false `EI` matches inside
    /// compressed payloads — and otherwise from scanning for the first
    /// `EI` that is preceded by a whitespace byte and followed by
    /// whitespace, a delimiter or end of stream.
    fn inline_image(&mut self) -> Result<InlineImage, BackendError> {
        let mut dict = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(self.err("unterminated inline image (missing ID)")),
                Some(b'I')
                    if self.peek_at(1) == Some(b'D')
                        && self.peek_at(2).map_or(true, is_whitespace) =>
                {
                    self.pos += 2;
                    // One whitespace byte separates ID from the payload
                    if self.peek().is_some_and(is_whitespace) {
                        self.pos += 1;
                    }
                    break;
                }
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace_and_comments();
                    let value = self.object()?;
                    dict.push((key, value));
                }
                Some(_) => {
                    return Err(self.err("expected name key in inline image dictionary"));
                }
            }
        }

        let declared_len = dict
            .iter()
            .find(|(k, _)| k == "L" || k == "Length")
            .and_then(|(_, v)| v.as_i64())
            .and_then(|l| usize::try_from(l).ok());

        let data = match declared_len {
            Some(len) if self.pos + len <= self.input.len() => {
                let data = self.input[self.pos..self.pos + len].to_vec();
                self.pos += len;
                // Step over trailing whitespace and the EI keyword
                while self.peek().is_some_and(is_whitespace) {
                    self.pos += 1;
                }
                if self.peek() == Some(b'E') && self.peek_at(1) == Some(b'I') {
                    self.pos += 2;
                }
                data
            }
            _ => self.scan_to_ei()?,
        };

        Ok(InlineImage { dict, data })
    }

    /// Scan forward to a whitespace-delimited `EI`, returning the payload.
    fn scan_to_ei(&mut self) -> Result<Vec<u8>, BackendError> {
        let start = self.pos;
        while self.pos < self.input.len() {
            let preceded = self.pos == start || is_whitespace(self.input[self.pos - 1]);
            if preceded
                && self.peek() == Some(b'E')
                && self.peek_at(1) == Some(b'I')
                && self
                    .peek_at(2)
                    .map_or(true, |b| is_whitespace(b) || is_delimiter(b))
            {
                let mut data = self.input[start..self.pos].to_vec();
                if data.last().is_some_and(|&b| is_whitespace(b)) {
                    data.pop();
                }
                self.pos += 2;
                return Ok(data);
            }
            self.pos += 1;
        }
        Err(self.err("unterminated inline image (missing EI)"))
    }
}

/// Convert a hex digit character to its value.
fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
