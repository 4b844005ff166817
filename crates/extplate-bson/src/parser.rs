//! Relaxed Extended JSON reader.
//!
//! Parsing runs in two layers: a [`Tokenizer`] that yields punctuation,
//! quoted strings, numbers and bare words, and a recursive [`Parser`] that
//! assembles them into a [`Node`] tree. After an object is read, it is
//! checked for an Extended JSON wrapper (`{"$oid": ...}` and friends) and
//! collapsed into the typed leaf it stands for.
//!
//! Accepted beyond strict JSON:
//!
//! - single-quoted strings and unquoted identifier keys (`{ k1: 'v' }`)
//! - `NaN`, `Infinity`, `-Infinity`
//! - shell constructors: `ObjectId("..")`, `NumberInt(..)`, `NumberLong(..)`,
//!   `ISODate("..")`, `UUID("..")`, `new Date(..)`

use base64::Engine as _;
use bson::oid::ObjectId;
use bson::spec::BinarySubtype;
use bson::{Binary, Bson, DateTime, Document, Regex, Timestamp};

use crate::error::ParseError;
use crate::node::Node;

/// Nesting depth [`Parser`] accepts unless told otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Parses Extended JSON text into a value. Any value is accepted at the root.
///
/// ```
/// use extplate_bson::parse;
///
/// let value = parse("[1, 'two', { three: 3.0 }]").unwrap();
/// assert!(value.as_array().is_some());
/// ```
pub fn parse(text: &str) -> Result<Bson, ParseError> {
    Parser::new(text).parse()
}

/// Parses Extended JSON text whose top-level value is a document.
///
/// ```
/// use extplate_bson::parse_document;
///
/// let doc = parse_document("{ k1: 1, 'k2': [true] }").unwrap();
/// assert_eq!(doc.get_i32("k1").unwrap(), 1);
/// ```
pub fn parse_document(text: &str) -> Result<Document, ParseError> {
    match parse(text)? {
        Bson::Document(doc) => Ok(doc),
        other => Err(ParseError::new(
            1,
            1,
            format!("expected a document at top level, found {:?}", other.element_type()),
        )),
    }
}

/// Token types produced by the tokenizer.
#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Colon,
    Comma,
    /// Quoted string, escapes already resolved.
    String(String),
    /// Raw numeric text, including `-Infinity`.
    Number(&'a str),
    /// Bare word: literals, identifier keys, constructor names.
    Word(&'a str),
    Eof,
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::LParen => "'('".to_string(),
            Token::RParen => "')'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Comma => "','".to_string(),
            Token::String(s) => format!("string {:?}", s),
            Token::Number(n) => format!("number {}", n),
            Token::Word(w) => format!("'{}'", w),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// Tokenizer over Extended JSON text.
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> ParseError {
        let before = &self.input[..pos];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        ParseError::new(line, column, message)
    }

    fn is_word_start(ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
    }

    fn is_word_continue(ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
    }

    /// Returns the next token and the byte offset where it starts.
    fn next_token(&mut self) -> Result<(Token<'a>, usize), ParseError> {
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.bump();
        }

        let start = self.pos;
        let Some(ch) = self.bump() else {
            return Ok((Token::Eof, start));
        };

        let token = match ch {
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ':' => Token::Colon,
            ',' => Token::Comma,
            '"' | '\'' => Token::String(self.string(ch, start)?),
            '-' | '0'..='9' => self.number(start)?,
            c if Self::is_word_start(c) => {
                while self.peek_char().is_some_and(Self::is_word_continue) {
                    self.bump();
                }
                Token::Word(&self.input[start..self.pos])
            }
            other => {
                return Err(self.error_at(start, format!("unexpected character {:?}", other)));
            }
        };
        Ok((token, start))
    }

    fn number(&mut self, start: usize) -> Result<Token<'a>, ParseError> {
        if self.input[start..].starts_with("-Infinity") {
            self.pos = start + "-Infinity".len();
            return Ok(Token::Number(&self.input[start..self.pos]));
        }
        while self
            .peek_char()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        {
            self.bump();
        }
        let raw = &self.input[start..self.pos];
        if raw == "-" {
            return Err(self.error_at(start, "expected digits after '-'"));
        }
        Ok(Token::Number(raw))
    }

    fn string(&mut self, quote: char, start: usize) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            let Some(ch) = self.bump() else {
                return Err(self.error_at(start, "unterminated string"));
            };
            match ch {
                c if c == quote => return Ok(out),
                '\\' => {
                    let escape_pos = self.pos - 1;
                    let Some(escaped) = self.bump() else {
                        return Err(self.error_at(start, "unterminated string"));
                    };
                    match escaped {
                        '"' => out.push('"'),
                        '\'' => out.push('\''),
                        '\\' => out.push('\\'),
                        '/' => out.push('/'),
                        'b' => out.push('\u{0008}'),
                        'f' => out.push('\u{000C}'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => out.push(self.unicode_escape(escape_pos)?),
                        other => {
                            return Err(self.error_at(
                                escape_pos,
                                format!("invalid escape sequence '\\{}'", other),
                            ));
                        }
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn hex4(&mut self, escape_pos: usize) -> Result<u32, ParseError> {
        let digits = self.input.get(self.pos..self.pos + 4);
        match digits.and_then(|d| u32::from_str_radix(d, 16).ok()) {
            Some(code) if digits.is_some_and(|d| d.bytes().all(|b| b.is_ascii_hexdigit())) => {
                self.pos += 4;
                Ok(code)
            }
            _ => Err(self.error_at(escape_pos, "invalid \\u escape")),
        }
    }

    fn unicode_escape(&mut self, escape_pos: usize) -> Result<char, ParseError> {
        let high = self.hex4(escape_pos)?;
        if (0xD800..0xDC00).contains(&high) {
            if !self.input[self.pos..].starts_with("\\u") {
                return Err(self.error_at(escape_pos, "unpaired surrogate in \\u escape"));
            }
            self.pos += 2;
            let low = self.hex4(escape_pos)?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(self.error_at(escape_pos, "unpaired surrogate in \\u escape"));
            }
            let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(combined)
                .ok_or_else(|| self.error_at(escape_pos, "invalid \\u escape"));
        }
        char::from_u32(high).ok_or_else(|| self.error_at(escape_pos, "unpaired surrogate in \\u escape"))
    }
}

/// Recursive-descent reader.
///
/// [`parse`](Parser::parse) returns a [`Bson`] value in which a key repeated
/// within one object keeps its first position and takes the last value.
/// [`parse_node`](Parser::parse_node) returns the raw [`Node`] tree with
/// every entry kept, for callers that rewrite keys after parsing.
///
/// Containers nested deeper than [`max_depth`](Parser::max_depth) are a
/// syntax error, so hostile input cannot exhaust the stack.
pub struct Parser<'a> {
    tokens: Tokenizer<'a>,
    peeked: Option<(Token<'a>, usize)>,
    max_depth: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            tokens: Tokenizer::new(input),
            peeked: None,
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
        }
    }

    /// Sets how many arrays and objects may be nested inside each other.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parses one value and requires the input to end after it.
    pub fn parse(self) -> Result<Bson, ParseError> {
        self.parse_node().map(Node::into_bson)
    }

    /// Parses one value into the raw tree, keeping repeated keys.
    pub fn parse_node(mut self) -> Result<Node, ParseError> {
        let value = self.value()?;
        let (token, pos) = self.next()?;
        if token != Token::Eof {
            return Err(self.unexpected(&token, pos, "end of input"));
        }
        Ok(value)
    }

    fn next(&mut self) -> Result<(Token<'a>, usize), ParseError> {
        match self.peeked.take() {
            Some(peeked) => Ok(peeked),
            None => self.tokens.next_token(),
        }
    }

    fn peek(&mut self) -> Result<&Token<'a>, ParseError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.tokens.next_token()?);
        }
        match &self.peeked {
            Some((token, _)) => Ok(token),
            None => unreachable!("peeked was just filled"),
        }
    }

    fn expect(&mut self, expected: Token<'a>) -> Result<(), ParseError> {
        let (token, pos) = self.next()?;
        if token == expected {
            Ok(())
        } else {
            Err(self.unexpected(&token, pos, &expected.describe()))
        }
    }

    fn unexpected(&self, token: &Token<'_>, pos: usize, wanted: &str) -> ParseError {
        self.tokens.error_at(
            pos,
            format!("expected {}, found {}", wanted, token.describe()),
        )
    }

    fn enter(&mut self, pos: usize) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.tokens.error_at(
                pos,
                format!("nesting exceeds the maximum depth of {}", self.max_depth),
            ));
        }
        Ok(())
    }

    fn value(&mut self) -> Result<Node, ParseError> {
        let (token, pos) = self.next()?;
        let leaf = match token {
            Token::LBrace => return self.document(pos),
            Token::LBracket => return self.array(pos),
            Token::String(s) => Bson::String(s),
            Token::Number(raw) => self.number(raw, pos)?,
            Token::Word("true") => Bson::Boolean(true),
            Token::Word("false") => Bson::Boolean(false),
            Token::Word("null") => Bson::Null,
            Token::Word("NaN") => Bson::Double(f64::NAN),
            Token::Word("Infinity") => Bson::Double(f64::INFINITY),
            Token::Word("new") => match self.next()? {
                (Token::Word(name), name_pos) => self.constructor(name, name_pos)?,
                (other, other_pos) => {
                    return Err(self.unexpected(&other, other_pos, "constructor name"))
                }
            },
            Token::Word(name) if *self.peek()? == Token::LParen => self.constructor(name, pos)?,
            other => return Err(self.unexpected(&other, pos, "a value")),
        };
        Ok(Node::Value(leaf))
    }

    fn array(&mut self, open_pos: usize) -> Result<Node, ParseError> {
        self.enter(open_pos)?;
        let mut items = Vec::new();
        if *self.peek()? == Token::RBracket {
            self.next()?;
        } else {
            loop {
                items.push(self.value()?);
                match self.next()? {
                    (Token::Comma, _) => continue,
                    (Token::RBracket, _) => break,
                    (other, pos) => return Err(self.unexpected(&other, pos, "',' or ']'")),
                }
            }
        }
        self.depth -= 1;
        Ok(Node::Array(items))
    }

    fn document(&mut self, open_pos: usize) -> Result<Node, ParseError> {
        self.enter(open_pos)?;
        let mut entries = Vec::new();
        if *self.peek()? == Token::RBrace {
            self.next()?;
        } else {
            loop {
                let key = match self.next()? {
                    (Token::String(s), _) => s,
                    (Token::Word(w), _) => w.to_string(),
                    (other, pos) => return Err(self.unexpected(&other, pos, "a key")),
                };
                self.expect(Token::Colon)?;
                entries.push((key, self.value()?));
                match self.next()? {
                    (Token::Comma, _) => continue,
                    (Token::RBrace, _) => break,
                    (other, pos) => return Err(self.unexpected(&other, pos, "',' or '}'")),
                }
            }
        }
        self.depth -= 1;

        match extended_wrapper(&entries) {
            Ok(Some(leaf)) => Ok(Node::Value(leaf)),
            Ok(None) => Ok(Node::Document(entries)),
            Err(message) => Err(self.tokens.error_at(open_pos, message)),
        }
    }

    fn number(&self, raw: &str, pos: usize) -> Result<Bson, ParseError> {
        parse_number(raw).ok_or_else(|| self.tokens.error_at(pos, format!("invalid number {}", raw)))
    }

    fn constructor(&mut self, name: &str, pos: usize) -> Result<Bson, ParseError> {
        self.expect(Token::LParen)?;
        let arg = if *self.peek()? == Token::RParen {
            None
        } else {
            Some(self.value()?)
        };
        self.expect(Token::RParen)?;

        let result = match (name, arg) {
            ("ObjectId", Some(Node::Value(Bson::String(hex)))) => object_id(&hex),
            ("NumberInt", Some(arg)) => int_arg(&arg).and_then(|n| {
                i32::try_from(n)
                    .map(Bson::Int32)
                    .map_err(|_| format!("NumberInt out of range: {}", n))
            }),
            ("NumberLong", Some(arg)) => int_arg(&arg).map(Bson::Int64),
            ("ISODate", Some(Node::Value(Bson::String(s))))
            | ("Date", Some(Node::Value(Bson::String(s)))) => iso_date(&s),
            ("Date", Some(Node::Value(Bson::Int32(n)))) => {
                Ok(Bson::DateTime(DateTime::from_millis(i64::from(n))))
            }
            ("Date", Some(Node::Value(Bson::Int64(n)))) => Ok(Bson::DateTime(DateTime::from_millis(n))),
            ("UUID", Some(Node::Value(Bson::String(s)))) => uuid_binary(&s),
            (other, _) => Err(format!("unsupported constructor {}(...)", other)),
        };
        result.map_err(|message| self.tokens.error_at(pos, message))
    }
}

fn parse_number(raw: &str) -> Option<Bson> {
    if raw == "-Infinity" {
        return Some(Bson::Double(f64::NEG_INFINITY));
    }
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if raw.contains(['.', 'e', 'E']) {
        return raw.parse::<f64>().ok().map(Bson::Double);
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    match raw.parse::<i64>() {
        Ok(n) => Some(i32::try_from(n).map_or(Bson::Int64(n), Bson::Int32)),
        Err(_) => raw.parse::<f64>().ok().map(Bson::Double),
    }
}

fn object_id(hex: &str) -> Result<Bson, String> {
    ObjectId::parse_str(hex)
        .map(Bson::ObjectId)
        .map_err(|e| format!("invalid ObjectId {:?}: {}", hex, e))
}

fn iso_date(s: &str) -> Result<Bson, String> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| Bson::DateTime(DateTime::from_millis(dt.timestamp_millis())))
        .map_err(|e| format!("invalid date {:?}: {}", s, e))
}

fn uuid_binary(s: &str) -> Result<Bson, String> {
    let uuid = bson::Uuid::parse_str(s).map_err(|_| format!("invalid uuid {:?}", s))?;
    Ok(Bson::Binary(Binary::from_uuid(uuid)))
}

fn int_arg(arg: &Node) -> Result<i64, String> {
    match arg {
        Node::Value(Bson::Int32(n)) => Ok(i64::from(*n)),
        Node::Value(Bson::Int64(n)) => Ok(*n),
        Node::Value(Bson::String(s)) => s.parse().map_err(|_| format!("invalid integer {:?}", s)),
        other => Err(format!("expected an integer, found {:?}", other.element_type())),
    }
}

fn single<'n>(entries: &'n [(String, Node)], key: &str) -> Option<&'n Node> {
    match entries {
        [(k, value)] if k == key => Some(value),
        _ => None,
    }
}

fn str_field<'n>(node: &'n Node, key: &str) -> Option<&'n str> {
    node.get(key).and_then(Node::as_str)
}

/// Recognizes an Extended JSON wrapper object.
///
/// Returns `Ok(None)` for ordinary objects, including ones whose `$` keys
/// are query operators rather than type wrappers.
fn extended_wrapper(entries: &[(String, Node)]) -> Result<Option<Bson>, String> {
    let Some((first, _)) = entries.first() else {
        return Ok(None);
    };
    if !first.starts_with('$') {
        return Ok(None);
    }

    if let Some(value) = single(entries, "$oid") {
        let hex = value.as_str().ok_or("$oid must be a string")?;
        return object_id(hex).map(Some);
    }
    if let Some(value) = single(entries, "$numberInt") {
        let s = value.as_str().ok_or("$numberInt must be a string")?;
        return s
            .parse::<i32>()
            .map(|n| Some(Bson::Int32(n)))
            .map_err(|_| format!("invalid $numberInt {:?}", s));
    }
    if let Some(value) = single(entries, "$numberLong") {
        let s = value.as_str().ok_or("$numberLong must be a string")?;
        return s
            .parse::<i64>()
            .map(|n| Some(Bson::Int64(n)))
            .map_err(|_| format!("invalid $numberLong {:?}", s));
    }
    if let Some(value) = single(entries, "$numberDouble") {
        let s = value.as_str().ok_or("$numberDouble must be a string")?;
        let n = match s {
            "Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            "NaN" => f64::NAN,
            other => other
                .parse::<f64>()
                .map_err(|_| format!("invalid $numberDouble {:?}", other))?,
        };
        return Ok(Some(Bson::Double(n)));
    }
    if let Some(value) = single(entries, "$date") {
        return match value {
            Node::Value(Bson::String(s)) => iso_date(s).map(Some),
            Node::Value(Bson::Int32(n)) => Ok(Some(Bson::DateTime(DateTime::from_millis(i64::from(*n))))),
            Node::Value(Bson::Int64(n)) => Ok(Some(Bson::DateTime(DateTime::from_millis(*n)))),
            other => Err(format!("invalid $date value of type {:?}", other.element_type())),
        };
    }
    if let Some(value) = single(entries, "$binary") {
        if value.entries().is_none() {
            return Err("$binary must be a document with base64 and subType".to_string());
        }
        let data = str_field(value, "base64").ok_or("$binary is missing base64")?;
        let subtype = str_field(value, "subType").ok_or("$binary is missing subType")?;
        return binary(data, subtype).map(Some);
    }
    if let [(k1, v1), (k2, v2)] = entries {
        let (data, subtype) = match (k1.as_str(), k2.as_str()) {
            ("$binary", "$type") => (v1.as_str(), v2.as_str()),
            ("$type", "$binary") => (v2.as_str(), v1.as_str()),
            _ => (None, None),
        };
        if let (Some(data), Some(subtype)) = (data, subtype) {
            return binary(data, subtype).map(Some);
        }
    }
    if let Some(value) = single(entries, "$uuid") {
        let s = value.as_str().ok_or("$uuid must be a string")?;
        return uuid_binary(s).map(Some);
    }
    if let Some(value) = single(entries, "$timestamp") {
        if value.entries().is_none() {
            return Err("$timestamp must be a document".to_string());
        }
        let time = u32_field(value, "t")?;
        let increment = u32_field(value, "i")?;
        return Ok(Some(Bson::Timestamp(Timestamp { time, increment })));
    }
    if let Some(value) = single(entries, "$regularExpression") {
        if value.entries().is_none() {
            return Err("$regularExpression must be a document".to_string());
        }
        let pattern = str_field(value, "pattern").ok_or("$regularExpression is missing pattern")?;
        let options = str_field(value, "options").unwrap_or("");
        return Ok(Some(Bson::RegularExpression(regex(pattern, options))));
    }
    if single(entries, "$minKey").is_some() {
        return Ok(Some(Bson::MinKey));
    }
    if single(entries, "$maxKey").is_some() {
        return Ok(Some(Bson::MaxKey));
    }
    Ok(None)
}

fn binary(data: &str, subtype: &str) -> Result<Bson, String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| format!("invalid base64 in $binary: {}", e))?;
    let tag = u8::from_str_radix(subtype, 16)
        .map_err(|_| format!("invalid binary subType {:?}", subtype))?;
    Ok(Bson::Binary(Binary {
        subtype: BinarySubtype::from(tag),
        bytes,
    }))
}

/// Regex options are stored sorted.
fn regex(pattern: &str, options: &str) -> Regex {
    let mut flags: Vec<char> = options.chars().collect();
    flags.sort_unstable();
    Regex {
        pattern: pattern.to_string(),
        options: flags.into_iter().collect(),
    }
}

fn u32_field(node: &Node, key: &str) -> Result<u32, String> {
    let n = match node.get(key) {
        Some(Node::Value(Bson::Int32(n))) => i64::from(*n),
        Some(Node::Value(Bson::Int64(n))) => *n,
        _ => return Err(format!("$timestamp.{} must be an integer", key)),
    };
    u32::try_from(n).map_err(|_| format!("$timestamp.{} out of range: {}", key, n))
}
