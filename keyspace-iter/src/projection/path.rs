use serde_json::Value;

use super::ProjectionError;

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    /// `.name` or `['name']`
    Child(String),
    /// `[n]`, negative counts from the end
    Index(i64),
    /// `.*` or `[*]`
    Wildcard,
    /// `..name`
    DescendantChild(String),
    /// `..*`
    DescendantWildcard,
}

impl Segment {
    fn is_definite(&self) -> bool {
        matches!(self, Segment::Child(_) | Segment::Index(_))
    }

    fn select<'a>(&self, value: &'a Value, out: &mut Vec<&'a Value>) {
        match self {
            Segment::Child(name) => out.extend(value.as_object().and_then(|obj| obj.get(name))),
            Segment::Index(idx) => {
                if let Some(array) = value.as_array() {
                    let idx = if *idx < 0 {
                        array.len() as i64 + idx
                    } else {
                        *idx
                    };
                    if idx >= 0 {
                        out.extend(array.get(idx as usize));
                    }
                }
            }
            Segment::Wildcard => children(value, out),
            Segment::DescendantChild(name) => {
                let mut nodes = vec![value];
                descendants(value, &mut nodes);
                for node in nodes {
                    out.extend(node.as_object().and_then(|obj| obj.get(name)));
                }
            }
            Segment::DescendantWildcard => descendants(value, out),
        }
    }
}

fn children<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(obj) => out.extend(obj.values()),
        Value::Array(array) => out.extend(array.iter()),
        _ => {}
    }
}

/// Pre-order walk of everything below `value`.
fn descendants<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    let mut direct = Vec::new();
    children(value, &mut direct);
    for child in direct {
        out.push(child);
        descendants(child, out);
    }
}

/// A compiled JSONPath expression.
///
/// Supports the root `$`, child access by `.name` or `['name']`, array
/// indexes, wildcards and recursive descent (`..name`, `..*`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, ProjectionError> {
        Parser {
            path,
            chars: path.chars().collect(),
            pos: 0,
        }
        .parse()
    }

    /// Whether the path can address at most one value.
    pub fn is_definite(&self) -> bool {
        self.segments.iter().all(Segment::is_definite)
    }

    /// All values addressed by the path, in document order.
    pub fn select<'a>(&self, doc: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![doc];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                segment.select(value, &mut next);
            }
            current = next;
        }
        current
    }

    /// Evaluate the path for projection.
    ///
    /// A definite path yields the addressed value, or `null` when it does not
    /// resolve. An indefinite one yields an array of all matches, possibly
    /// empty.
    pub fn query(&self, doc: &Value) -> Value {
        let matches = self.select(doc);
        if self.is_definite() {
            return matches.first().map_or(Value::Null, |value| (*value).clone());
        }
        Value::Array(matches.into_iter().cloned().collect())
    }
}

struct Parser<'a> {
    path: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &'static str) -> ProjectionError {
        ProjectionError::InvalidPath {
            path: self.path.to_string(),
            reason,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> Result<JsonPath, ProjectionError> {
        if !self.eat('$') {
            return Err(self.error("path must start with '$'"));
        }
        let mut segments = Vec::new();
        while let Some(ch) = self.peek() {
            self.pos += 1;
            let segment = match ch {
                '.' if self.eat('.') => {
                    if self.eat('*') {
                        Segment::DescendantWildcard
                    } else {
                        Segment::DescendantChild(self.name()?)
                    }
                }
                '.' => {
                    if self.eat('*') {
                        Segment::Wildcard
                    } else {
                        Segment::Child(self.name()?)
                    }
                }
                '[' => self.bracket()?,
                _ => return Err(self.error("expected '.' or '['")),
            };
            segments.push(segment);
        }
        Ok(JsonPath { segments })
    }

    fn name(&mut self) -> Result<String, ProjectionError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch == '.' || ch == '[' {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("empty member name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn bracket(&mut self) -> Result<Segment, ProjectionError> {
        self.skip_spaces();
        let segment = match self.peek() {
            Some('*') => {
                self.pos += 1;
                Segment::Wildcard
            }
            Some(quote @ ('\'' | '"')) => {
                self.pos += 1;
                Segment::Child(self.quoted(quote)?)
            }
            Some(_) => Segment::Index(self.index()?),
            None => return Err(self.error("unclosed '['")),
        };
        self.skip_spaces();
        if !self.eat(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(segment)
    }

    fn quoted(&mut self, quote: char) -> Result<String, ProjectionError> {
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("unterminated string"))?;
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(ch) if ch == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(ch) => {
                    out.push(ch);
                    self.pos += 1;
                }
            }
        }
    }

    fn index(&mut self) -> Result<i64, ProjectionError> {
        let start = self.pos;
        self.eat('-');
        while self.peek().is_some_and(|ch| ch.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse()
            .map_err(|_| self.error("expected an array index, '*' or a quoted name"))
    }
}
