//! A data-only evaluator for JavaScript object and array literals.
//!
//! Accepts comments, unquoted and numeric keys, single-quoted strings, JS escapes, hex and
//! signed numbers, trailing commas and array holes. Anything resembling an expression is a
//! syntax error.

use serde_json::{Map, Number, Value};

const MAX_DEPTH: usize = 64;

pub(super) fn evaluate(text: &str) -> Result<Value, String> {
    let mut parser = LiteralParser {
        chars: text.chars().collect(),
        pos: 0,
    };
    parser.skip_trivia()?;
    let value = parser.value(0)?;
    parser.skip_trivia()?;
    if parser.pos < parser.chars.len() {
        return Err(format!("unexpected trailing content at offset {}", parser.pos));
    }

    match value {
        Value::Object(_) | Value::Array(_) => Ok(value),
        _ => Err("literal is not an object or array".to_string()),
    }
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(format!("expected `{expected}` but found `{c}` at offset {}", self.pos - 1)),
            None => Err(format!("expected `{expected}` but reached end of input")),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), String> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => self.pos += 1,
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    loop {
                        match (self.bump(), self.peek()) {
                            (Some('*'), Some('/')) => {
                                self.pos += 1;
                                break;
                            }
                            (Some(_), _) => {}
                            (None, _) => return Err("unterminated block comment".to_string()),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, String> {
        if depth > MAX_DEPTH {
            return Err("literal is nested too deeply".to_string());
        }
        match self.peek() {
            Some('{') => self.object(depth),
            Some('[') => self.array(depth),
            Some(q @ ('"' | '\'')) => self.string(q).map(Value::String),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.number(),
            Some(c) if is_identifier_start(c) => {
                let start = self.pos;
                let word = self.identifier();
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" | "undefined" | "NaN" | "Infinity" => Ok(Value::Null),
                    _ => Err(format!("unexpected identifier `{word}` at offset {start}")),
                }
            }
            Some(c) => Err(format!("unexpected `{c}` at offset {}", self.pos)),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, String> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_trivia()?;
            let key = match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                }
                Some(q @ ('"' | '\'')) => self.string(q)?,
                Some(c) if c.is_ascii_digit() => self.number()?.to_string(),
                Some(c) if is_identifier_start(c) => self.identifier(),
                Some(c) => return Err(format!("unexpected `{c}` in object key at offset {}", self.pos)),
                None => return Err("unterminated object".to_string()),
            };
            self.skip_trivia()?;
            self.expect(':')?;
            self.skip_trivia()?;
            let value = self.value(depth + 1)?;
            map.insert(key, value);
            self.skip_trivia()?;
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => return Err(format!("expected `,` or `}}` but found `{c}` at offset {}", self.pos - 1)),
                None => return Err("unterminated object".to_string()),
            }
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, String> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some(']') => {
                    self.pos += 1;
                    return Ok(Value::Array(items));
                }
                Some(',') => {
                    // Array hole
                    self.pos += 1;
                    items.push(Value::Null);
                    continue;
                }
                None => return Err("unterminated array".to_string()),
                _ => {}
            }
            items.push(self.value(depth + 1)?);
            self.skip_trivia()?;
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                Some(c) => return Err(format!("expected `,` or `]` but found `{c}` at offset {}", self.pos - 1)),
                None => return Err("unterminated array".to_string()),
            }
        }
    }

    fn identifier(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if is_identifier_start(c) || c.is_ascii_digit() {
                word.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        word
    }

    fn string(&mut self, quote: char) -> Result<String, String> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or("unterminated string")?;
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let escape = self.bump().ok_or("unterminated escape sequence")?;
            match escape {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                'v' => out.push('\u{b}'),
                '0' => out.push('\0'),
                'x' => {
                    let code = self.hex_digits(2)?;
                    out.push(char::from_u32(code).ok_or("invalid \\x escape")?);
                }
                'u' => out.push(self.unicode_escape()?),
                // Line continuation
                '\n' => {}
                other => out.push(other),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, String> {
        if self.peek() == Some('{') {
            self.pos += 1;
            let mut code = 0u32;
            loop {
                match self.bump() {
                    Some('}') => break,
                    Some(c) => {
                        let digit = c.to_digit(16).ok_or("invalid \\u{...} escape")?;
                        code = code
                            .checked_mul(16)
                            .and_then(|v| v.checked_add(digit))
                            .ok_or("\\u{...} escape out of range")?;
                    }
                    None => return Err("unterminated \\u{...} escape".to_string()),
                }
            }
            return char::from_u32(code).ok_or_else(|| "invalid code point".to_string());
        }

        let high = self.hex_digits(4)?;
        if (0xD800..0xDC00).contains(&high) && self.peek() == Some('\\') && self.peek_at(1) == Some('u') {
            self.pos += 2;
            let low = self.hex_digits(4)?;
            let combined = 0x10000 + ((high - 0xD800) << 10) + (low.wrapping_sub(0xDC00) & 0x3FF);
            return Ok(char::from_u32(combined).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
        Ok(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, String> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or("invalid hexadecimal escape")?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        let negative = match self.peek() {
            Some('-') => {
                self.pos += 1;
                true
            }
            Some('+') => {
                self.pos += 1;
                false
            }
            _ => false,
        };

        if self.peek().is_some_and(is_identifier_start) {
            return match self.identifier().as_str() {
                "Infinity" => Ok(Value::Null),
                other => Err(format!("unexpected `{other}` after sign at offset {start}")),
            };
        }

        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let mut digits = String::new();
                while let Some(c) = self.peek().filter(|c| c.is_digit(radix)) {
                    digits.push(c);
                    self.pos += 1;
                }
                let magnitude = i64::from_str_radix(&digits, radix)
                    .map_err(|e| format!("invalid number at offset {start}: {e}"))?;
                return Ok(Value::Number(Number::from(if negative { -magnitude } else { magnitude })));
            }
        }

        let mut literal = String::new();
        if negative {
            literal.push('-');
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => literal.push(c),
                '.' => {
                    is_float = true;
                    literal.push(c);
                }
                'e' | 'E' => {
                    is_float = true;
                    literal.push(c);
                    if let Some(sign @ ('+' | '-')) = self.peek_at(1) {
                        literal.push(sign);
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        if !is_float {
            if let Ok(integer) = literal.parse::<i64>() {
                return Ok(Value::Number(Number::from(integer)));
            }
        }
        let float: f64 = literal
            .parse()
            .map_err(|_| format!("invalid number `{literal}` at offset {start}"))?;
        Ok(Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null))
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}
