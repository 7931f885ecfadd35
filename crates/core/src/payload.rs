//! Session payload decoding.
//!
//! Stored payloads are base64 over PHP-serialized data. The inner layer is
//! either `serialize()` output (`a:2:{...}`) or PHP session encoding
//! (`key|<serialized>key|<serialized>`). Both decode into the same nested
//! mapping. Any failure yields an empty mapping from [`decode`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Decoded session variables.
pub type Vars = Map<String, Value>;

/// Maximum nesting accepted from a payload.
const MAX_DEPTH: usize = 64;

/// Decodes a stored payload. Never fails; malformed input yields an empty map.
pub fn decode(blob: &str) -> Vars {
    try_decode(blob).unwrap_or_default()
}

/// Decodes a stored payload, reporting why it failed.
pub fn try_decode(blob: &str) -> Result<Vars> {
    let trimmed = blob.trim();
    if trimmed.is_empty() {
        return Err(Error::decode("empty payload"));
    }

    let bytes = STANDARD
        .decode(trimmed)
        .map_err(|e| Error::decode(format!("invalid base64: {}", e)))?;

    unserialize_vars(&bytes)
}

/// Encodes variables into the stored payload form.
pub fn encode(vars: &Vars) -> String {
    let mut out = Vec::new();
    write_object(vars, &mut out);
    STANDARD.encode(out)
}

/// Parses the inner layer, trying `serialize()` output first.
pub fn unserialize_vars(bytes: &[u8]) -> Result<Vars> {
    match Parser::new(bytes).parse_document() {
        Ok(vars) => Ok(vars),
        Err(serialize_err) => Parser::new(bytes)
            .parse_session_document()
            .map_err(|session_err| {
                Error::decode(format!(
                    "not serialized data ({}) nor session data ({})",
                    serialize_err, session_err
                ))
            }),
    }
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_document(&mut self) -> Result<Vars> {
        let value = self.parse_value(0)?;
        if self.pos != self.input.len() {
            return Err(self.error("trailing data"));
        }
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(Error::decode("top-level value is not an array")),
        }
    }

    fn parse_session_document(&mut self) -> Result<Vars> {
        let mut vars = Vars::new();
        while self.pos < self.input.len() {
            let key = self.take_until(b'|')?;
            if key.is_empty() {
                return Err(self.error("empty session key"));
            }
            let key = String::from_utf8_lossy(key).into_owned();
            let value = self.parse_value(0)?;
            vars.insert(key, value);
        }
        if vars.is_empty() {
            return Err(Error::decode("no session variables"));
        }
        Ok(vars)
    }

    fn parse_value(&mut self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }

        let tag = self.next()?;
        match tag {
            b'N' => {
                self.expect(b';')?;
                Ok(Value::Null)
            }
            b'b' => {
                self.expect(b':')?;
                let raw = self.take_until(b';')?;
                match raw {
                    b"0" => Ok(Value::Bool(false)),
                    b"1" => Ok(Value::Bool(true)),
                    _ => Err(self.error("invalid boolean")),
                }
            }
            b'i' => {
                self.expect(b':')?;
                let n: i64 = self.parse_number(b';')?;
                Ok(Value::Number(n.into()))
            }
            b'd' => {
                self.expect(b':')?;
                let f: f64 = self.parse_number(b';')?;
                Ok(Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null))
            }
            b's' => {
                self.expect(b':')?;
                let s = self.parse_string_body()?;
                self.expect(b';')?;
                Ok(Value::String(s))
            }
            b'a' => {
                self.expect(b':')?;
                let map = self.parse_members(depth)?;
                Ok(Value::Object(map))
            }
            b'O' => {
                // Objects decode to their properties; the class name is dropped.
                self.expect(b':')?;
                self.parse_string_body()?;
                self.expect(b':')?;
                let map = self.parse_members(depth)?;
                Ok(Value::Object(map))
            }
            b'r' | b'R' => {
                self.expect(b':')?;
                let _: i64 = self.parse_number(b';')?;
                Ok(Value::Null)
            }
            _ => Err(self.error("unknown type tag")),
        }
    }

    /// `N:{key value ...}`
    fn parse_members(&mut self, depth: usize) -> Result<Vars> {
        let count: usize = self.parse_number(b':')?;
        self.expect(b'{')?;

        let mut map = Vars::new();
        for _ in 0..count {
            let key = match self.parse_value(depth + 1)? {
                Value::String(s) => strip_visibility(s),
                Value::Number(n) => n.to_string(),
                _ => return Err(self.error("invalid array key")),
            };
            let value = self.parse_value(depth + 1)?;
            map.insert(key, value);
        }

        self.expect(b'}')?;
        Ok(map)
    }

    /// `LEN:"bytes"`, where LEN counts bytes.
    fn parse_string_body(&mut self) -> Result<String> {
        let len: usize = self.parse_number(b':')?;
        self.expect(b'"')?;
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.input.len())
            .ok_or_else(|| self.error("string length out of bounds"))?;
        let input = self.input;
        let bytes = &input[self.pos..end];
        self.pos = end;
        self.expect(b'"')?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn parse_number<T: std::str::FromStr>(&mut self, terminator: u8) -> Result<T> {
        let raw = self.take_until(terminator)?;
        std::str::from_utf8(raw)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("invalid number"))
    }

    /// Returns bytes up to `delim` and consumes the delimiter.
    fn take_until(&mut self, delim: u8) -> Result<&'a [u8]> {
        let input = self.input;
        let rest = &input[self.pos..];
        let offset = rest
            .iter()
            .position(|b| *b == delim)
            .ok_or_else(|| self.error("unterminated token"))?;
        self.pos += offset + 1;
        Ok(&rest[..offset])
    }

    fn next(&mut self) -> Result<u8> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.next()? == byte {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    fn error(&self, msg: &str) -> Error {
        Error::decode(format!("{} at byte {}", msg, self.pos))
    }
}

/// Protected/private property names carry a `\0...\0` prefix.
fn strip_visibility(key: String) -> String {
    if key.starts_with('\0') {
        if let Some(idx) = key[1..].find('\0') {
            return key[idx + 2..].to_string();
        }
    }
    key
}

fn write_object(map: &Vars, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("a:{}:{{", map.len()).as_bytes());
    for (key, value) in map {
        write_string(key, out);
        write_value(value, out);
    }
    out.push(b'}');
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("s:{}:\"", s.len()).as_bytes());
    out.extend_from_slice(s.as_bytes());
    out.extend_from_slice(b"\";");
}

fn write_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"N;"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"b:1;" } else { b"b:0;" }),
        Value::Number(n) => {
            let encoded = if n.is_f64() {
                format!("d:{};", n.as_f64().unwrap_or_default())
            } else {
                format!("i:{};", n)
            };
            out.extend_from_slice(encoded.as_bytes());
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.extend_from_slice(format!("a:{}:{{", items.len()).as_bytes());
            for (idx, item) in items.iter().enumerate() {
                out.extend_from_slice(format!("i:{};", idx).as_bytes());
                write_value(item, out);
            }
            out.push(b'}');
        }
        Value::Object(map) => write_object(map, out),
    }
}
