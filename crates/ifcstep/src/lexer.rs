//! Part 21 lexical layer.
//!
//! Three levels, each a pure function of its input:
//! - [`scan_records`] cuts a whole file into `;`-terminated records and sorts
//!   them into the HEADER and DATA sections.
//! - [`split_arguments`] cuts one record's parameter text on top-level commas.
//! - [`Lexer`] tokenizes a single argument (or a record prefix) for the codec.
//!
//! Strings (`'...'` with `''` doubling), binaries (`"..."`) and `/* */`
//! comments are skipped as opaque spans at every level, so a `;`, `,` or
//! parenthesis inside them never delimits anything.

use std::fmt::Write as _;

use crate::error::{StepError, ValueError};
use crate::value::EntityId;

/// A token of an argument or record prefix.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Keyword or type name, upper-cased.
    Keyword(String),
    /// `#123`
    EntityRef(EntityId),
    /// String literal, quotes removed and escapes decoded.
    String(String),
    /// Binary literal, hex digits without quotes.
    Binary(String),
    /// Real literal.
    Real(f64),
    /// Integer literal.
    Integer(i64),
    /// `.NAME.` without dots.
    Enum(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `=`
    Equals,
    /// `*`
    Asterisk,
    /// `$`
    Dollar,
}

/// Position in the lexed text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-indexed).
    pub line: usize,
    /// Column number (1-indexed).
    pub col: usize,
    /// Byte offset.
    pub offset: usize,
}

/// A token with its start position.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Where the token starts.
    pub pos: Position,
}

/// Byte-cursor tokenizer.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(&mut self) -> Result<Vec<SpannedToken>, ValueError> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.next_token()? {
            tokens.push(tok);
        }
        Ok(tokens)
    }

    /// Current position, after any tokens already read.
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            col: self.col,
            offset: self.pos,
        }
    }

    /// Get the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, ValueError> {
        self.skip_whitespace_and_comments()?;

        let Some(ch) = self.peek_char() else {
            return Ok(None);
        };
        let start = self.position();

        let token = match ch {
            b'(' => self.single(Token::LParen),
            b')' => self.single(Token::RParen),
            b',' => self.single(Token::Comma),
            b';' => self.single(Token::Semicolon),
            b'=' => self.single(Token::Equals),
            b'*' => self.single(Token::Asterisk),
            b'$' => self.single(Token::Dollar),
            b'#' => self.read_entity_ref()?,
            b'\'' => self.read_string()?,
            b'"' => self.read_binary()?,
            b'.' => self.read_enum()?,
            b'-' | b'+' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number()?
            }
            b'0'..=b'9' => self.read_number()?,
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.read_keyword(),
            _ => {
                return Err(self.error(start, format!("unexpected character '{}'", ch as char)));
            }
        };

        Ok(Some(SpannedToken { token, pos: start }))
    }

    fn error(&self, at: Position, message: impl std::fmt::Display) -> ValueError {
        ValueError::Malformed(format!("{} at {}:{}", message, at.line, at.col))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance();
        token
    }

    fn peek_char(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.input.get(self.pos + ahead).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), ValueError> {
        loop {
            while self.peek_char().is_some_and(|c| c.is_ascii_whitespace()) {
                self.advance();
            }

            if self.peek_char() == Some(b'/') && self.peek_at(1) == Some(b'*') {
                let start = self.position();
                self.advance();
                self.advance();
                loop {
                    match (self.peek_char(), self.peek_at(1)) {
                        (Some(b'*'), Some(b'/')) => {
                            self.advance();
                            self.advance();
                            break;
                        }
                        (Some(_), _) => {
                            self.advance();
                        }
                        (None, _) => return Err(self.error(start, "unterminated comment")),
                    }
                }
                continue;
            }

            return Ok(());
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek_char().is_some_and(&pred) {
            self.advance();
        }
        let input = self.input;
        // every caller's predicate accepts ASCII bytes only
        std::str::from_utf8(&input[start..self.pos]).unwrap_or_default()
    }

    fn read_entity_ref(&mut self) -> Result<Token, ValueError> {
        let start = self.position();
        self.advance(); // '#'

        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(self.error(start, "expected digits after '#'"));
        }
        let id = digits
            .parse()
            .map_err(|_| self.error(start, format!("invalid entity id #{}", digits)))?;
        Ok(Token::EntityRef(id))
    }

    fn read_string(&mut self) -> Result<Token, ValueError> {
        let start = self.position();
        self.advance(); // opening quote

        let mut content = Vec::new();
        loop {
            match self.advance() {
                None => return Err(self.error(start, "unterminated string")),
                Some(b'\'') => {
                    if self.peek_char() == Some(b'\'') {
                        content.push(b'\'');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(ch) => content.push(ch),
            }
        }

        let raw = String::from_utf8_lossy(&content);
        let decoded = decode_string(&raw).map_err(|e| self.error(start, e))?;
        Ok(Token::String(decoded))
    }

    fn read_binary(&mut self) -> Result<Token, ValueError> {
        let start = self.position();
        self.advance(); // opening '"'

        let hex = self.take_while(|c| c.is_ascii_hexdigit()).to_ascii_uppercase();
        if self.advance() != Some(b'"') {
            return Err(self.error(start, "unterminated binary"));
        }
        if hex.is_empty() {
            return Err(self.error(start, "empty binary"));
        }
        Ok(Token::Binary(hex))
    }

    fn read_enum(&mut self) -> Result<Token, ValueError> {
        let start = self.position();
        self.advance(); // opening '.'

        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        if self.advance() != Some(b'.') {
            return Err(self.error(start, "unterminated enumeration"));
        }
        if name.is_empty() {
            return Err(self.error(start, "empty enumeration"));
        }
        Ok(Token::Enum(name.to_ascii_uppercase()))
    }

    fn read_number(&mut self) -> Result<Token, ValueError> {
        let start = self.position();
        let begin = self.pos;
        let mut is_real = false;

        if matches!(self.peek_char(), Some(b'-' | b'+')) {
            self.advance();
        }
        self.take_while(|c| c.is_ascii_digit());

        // "1." is a complete real
        if self.peek_char() == Some(b'.') {
            is_real = true;
            self.advance();
            self.take_while(|c| c.is_ascii_digit());
        }

        if matches!(self.peek_char(), Some(b'E' | b'e')) {
            is_real = true;
            self.advance();
            if matches!(self.peek_char(), Some(b'-' | b'+')) {
                self.advance();
            }
            if self.take_while(|c| c.is_ascii_digit()).is_empty() {
                return Err(self.error(start, "missing exponent digits"));
            }
        }

        let text = std::str::from_utf8(&self.input[begin..self.pos]).unwrap_or_default();
        if is_real {
            text.parse()
                .map(Token::Real)
                .map_err(|_| self.error(start, format!("invalid real number {}", text)))
        } else {
            text.parse()
                .map(Token::Integer)
                .map_err(|_| self.error(start, format!("invalid integer {}", text)))
        }
    }

    fn read_keyword(&mut self) -> Token {
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-');
        Token::Keyword(name.to_ascii_uppercase())
    }
}

/// One `;`-terminated statement of a file, without the `;`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRecord<'a> {
    /// Line on which the statement starts.
    pub line: usize,
    /// Statement text, trimmed.
    pub text: &'a str,
}

/// A file cut into its HEADER and DATA statements.
#[derive(Debug, Default)]
pub struct ScannedFile<'a> {
    /// Statements of the HEADER section.
    pub header: Vec<RawRecord<'a>>,
    /// Statements of the DATA section(s).
    pub data: Vec<RawRecord<'a>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    Header,
    Data,
}

/// Split a whole file into header and data records.
///
/// Fails only when record boundaries cannot be found: an unterminated string
/// or comment, or no DATA section at all.
pub fn scan_records(input: &str) -> Result<ScannedFile<'_>, StepError> {
    let statements = split_statements(input)?;

    let mut file = ScannedFile::default();
    let mut section = Section::Outside;
    let mut saw_data = false;

    for record in statements {
        if record.text.starts_with('#') {
            match section {
                Section::Data => file.data.push(record),
                _ => {
                    return Err(StepError::stream(
                        record.line,
                        "entity record outside the DATA section",
                    ))
                }
            }
            continue;
        }

        let keyword = statement_keyword(record.text);
        match keyword.as_str() {
            "ISO-10303-21" => {}
            "END-ISO-10303-21" => break,
            "HEADER" => section = Section::Header,
            "DATA" => {
                section = Section::Data;
                saw_data = true;
            }
            "ENDSEC" => section = Section::Outside,
            _ if section == Section::Header => file.header.push(record),
            _ => {
                tracing::debug!(line = record.line, "skipping stray statement {}", keyword);
            }
        }
    }

    if !saw_data {
        return Err(StepError::stream(1, "no DATA section"));
    }
    Ok(file)
}

fn statement_keyword(text: &str) -> String {
    text.bytes()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == b'_' || *c == b'-')
        .map(|c| c.to_ascii_uppercase() as char)
        .collect()
}

fn split_statements(input: &str) -> Result<Vec<RawRecord<'_>>, StepError> {
    let bytes = input.as_bytes();
    let mut statements = Vec::new();
    let mut start: Option<(usize, usize)> = None;
    let mut line = 1;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                line += 1;
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let open_line = line;
                i += 2;
                loop {
                    match (bytes.get(i), bytes.get(i + 1)) {
                        (Some(b'*'), Some(b'/')) => {
                            i += 2;
                            break;
                        }
                        (Some(c), _) => {
                            if *c == b'\n' {
                                line += 1;
                            }
                            i += 1;
                        }
                        (None, _) => {
                            return Err(StepError::stream(open_line, "unterminated comment"))
                        }
                    }
                }
            }
            quote @ (b'\'' | b'"') => {
                start.get_or_insert((i, line));
                let open_line = line;
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(StepError::stream(open_line, "unterminated string")),
                        Some(&c) if c == quote => {
                            if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                                i += 2;
                                continue;
                            }
                            i += 1;
                            break;
                        }
                        Some(&c) => {
                            if c == b'\n' {
                                line += 1;
                            }
                            i += 1;
                        }
                    }
                }
            }
            b';' => {
                if let Some((s, l)) = start.take() {
                    statements.push(RawRecord {
                        line: l,
                        text: input[s..i].trim_end(),
                    });
                }
                i += 1;
            }
            c if c.is_ascii_whitespace() => i += 1,
            _ => {
                start.get_or_insert((i, line));
                i += 1;
            }
        }
    }

    if let Some((s, l)) = start {
        let text = input[s..].trim_end();
        if !text.eq_ignore_ascii_case("END-ISO-10303-21") {
            statements.push(RawRecord { line: l, text });
        }
    }
    Ok(statements)
}

/// Split the text between a record's outer parentheses on top-level commas.
///
/// Arguments are returned trimmed. An empty parameter list yields no arguments.
pub fn split_arguments(text: &str) -> Result<Vec<&str>, ValueError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let bytes = text.as_bytes();
    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ValueError::Malformed("unbalanced ')'".into()))?;
            }
            b',' if depth == 0 => {
                args.push(text[start..i].trim());
                start = i + 1;
            }
            _ => i = skip_literal(text, i)?,
        }
        i += 1;
    }

    if depth != 0 {
        return Err(ValueError::Malformed("unbalanced '('".into()));
    }
    args.push(text[start..].trim());
    Ok(args)
}

/// Offset of the `)` closing the `(` at `open`, skipping strings, binaries and comments.
pub(crate) fn closing_paren(text: &str, open: usize) -> Result<usize, ValueError> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ValueError::Malformed("unbalanced ')'".into()))?;
                if depth == 0 {
                    return Ok(i);
                }
            }
            _ => i = skip_literal(text, i)?,
        }
        i += 1;
    }
    Err(ValueError::Malformed("unbalanced '('".into()))
}

/// If a string, binary or comment starts at `i`, the offset of its last byte; else `i`.
fn skip_literal(text: &str, mut i: usize) -> Result<usize, ValueError> {
    let bytes = text.as_bytes();
    match bytes[i] {
        b'\'' => {
            i += 1;
            loop {
                match bytes.get(i) {
                    None => return Err(ValueError::Malformed("unterminated string".into())),
                    Some(b'\'') if bytes.get(i + 1) == Some(&b'\'') => i += 2,
                    Some(b'\'') => return Ok(i),
                    Some(_) => i += 1,
                }
            }
        }
        b'"' => match text[i + 1..].find('"') {
            Some(end) => Ok(i + 1 + end),
            None => Err(ValueError::Malformed("unterminated binary".into())),
        },
        b'/' if bytes.get(i + 1) == Some(&b'*') => match text[i + 2..].find("*/") {
            Some(end) => Ok(i + end + 3),
            None => Err(ValueError::Malformed("unterminated comment".into())),
        },
        _ => Ok(i),
    }
}

/// Decode the escape sequences of a string literal's content.
///
/// Handles `\\`, `\X\hh` (ISO 8859-1), `\X2\...\X0\` (UTF-16),
/// `\X4\...\X0\` (UCS-4), `\S\c` (upper half of the code page),
/// `\N\` (newline) and ignores `\P?\` code page switches.
/// Doubled quotes must already be collapsed.
pub fn decode_string(raw: &str) -> Result<String, String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some(r) = rest.strip_prefix("\\\\") {
            out.push('\\');
            rest = r;
        } else if let Some(r) = rest.strip_prefix("\\X2\\") {
            let end = r.find("\\X0\\").ok_or("unterminated \\X2\\ escape")?;
            let units = hex_units(&r[..end], 4)?
                .into_iter()
                .map(|u| u as u16)
                .collect::<Vec<_>>();
            for c in char::decode_utf16(units) {
                out.push(c.map_err(|_| "invalid UTF-16 in \\X2\\ escape")?);
            }
            rest = &r[end + 4..];
        } else if let Some(r) = rest.strip_prefix("\\X4\\") {
            let end = r.find("\\X0\\").ok_or("unterminated \\X4\\ escape")?;
            for u in hex_units(&r[..end], 8)? {
                out.push(char::from_u32(u).ok_or("invalid code point in \\X4\\ escape")?);
            }
            rest = &r[end + 4..];
        } else if let Some(r) = rest.strip_prefix("\\X\\") {
            let hex = r.get(..2).ok_or("truncated \\X\\ escape")?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| "invalid \\X\\ escape")?;
            out.push(char::from(byte));
            rest = &r[2..];
        } else if let Some(r) = rest.strip_prefix("\\S\\") {
            let c = r.chars().next().ok_or("truncated \\S\\ escape")?;
            if !c.is_ascii() {
                return Err("invalid \\S\\ escape".into());
            }
            out.push(char::from(c as u8 + 128));
            rest = &r[1..];
        } else if let Some(r) = rest.strip_prefix("\\N\\") {
            out.push('\n');
            rest = r;
        } else if rest.len() >= 4
            && rest.as_bytes()[1] == b'P'
            && rest.as_bytes()[2].is_ascii_uppercase()
            && rest.as_bytes()[3] == b'\\'
        {
            rest = &rest[4..];
        } else {
            out.push('\\');
            rest = &rest[1..];
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn hex_units(hex: &str, width: usize) -> Result<Vec<u32>, String> {
    if !hex.is_ascii() || hex.len() % width != 0 {
        return Err(format!("escape needs groups of {} hex digits", width));
    }
    (0..hex.len())
        .step_by(width)
        .map(|i| {
            u32::from_str_radix(&hex[i..i + width], 16)
                .map_err(|_| format!("invalid hex digits '{}'", &hex[i..i + width]))
        })
        .collect()
}

/// Quote and escape a string for output.
///
/// Non-ASCII runs become `\X2\` (or `\X4\` outside the BMP), control
/// characters become `\X\hh`.
pub fn encode_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => out.push_str("''"),
            '\\' => out.push_str("\\\\"),
            c if c.is_ascii_control() => {
                let _ = write!(out, "\\X\\{:02X}", c as u32);
            }
            c if c.is_ascii() => out.push(c),
            c => {
                let mut run = vec![c];
                while let Some(&next) = chars.peek() {
                    if next.is_ascii() {
                        break;
                    }
                    run.push(next);
                    chars.next();
                }
                if run.iter().all(|c| (*c as u32) <= 0xFFFF) {
                    out.push_str("\\X2\\");
                    for c in run {
                        let _ = write!(out, "{:04X}", c as u32);
                    }
                } else {
                    out.push_str("\\X4\\");
                    for c in run {
                        let _ = write!(out, "{:08X}", c as u32);
                    }
                }
                out.push_str("\\X0\\");
            }
        }
    }
    out.push('\'');
    out
}
