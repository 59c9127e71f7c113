//! Reasoning templates: literal text with `{expr[:spec]}` placeholders.
//!
//! Placeholders are rule expressions. Bare names fall back to the row
//! field and then the settings key, so `{total_connections}` reads the
//! row. Supported format specs: `,` (thousands), `.Nf`, `.N%`, `d`, and
//! combinations such as `,.2f`. `{{` and `}}` are literal braces.

use serde_json::Value;
use tracing::warn;

use dbpulse_core::errors::{ExpressionError, TemplateError};

use crate::expression::value::{py_str, Num};
use crate::expression::{Expression, Scope};

#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningTemplate {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder {
        /// Original `{...}` text, emitted verbatim when evaluation fails.
        raw: String,
        expr: Expression,
        spec: FormatSpec,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Plain,
    Fixed,
    Percent,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FormatSpec {
    thousands: bool,
    precision: Option<usize>,
    kind: Kind,
}

impl FormatSpec {
    const PLAIN: FormatSpec = FormatSpec {
        thousands: false,
        precision: None,
        kind: Kind::Plain,
    };

    fn parse(spec: &str) -> Result<Self, TemplateError> {
        let unsupported = || TemplateError::UnsupportedFormat(spec.to_string());
        let mut rest = spec;

        let thousands = rest.starts_with(',');
        if thousands {
            rest = &rest[1..];
        }

        let mut precision = None;
        if let Some(after_dot) = rest.strip_prefix('.') {
            let digits = after_dot.chars().take_while(char::is_ascii_digit).count();
            if digits == 0 {
                return Err(unsupported());
            }
            precision = Some(after_dot[..digits].parse().map_err(|_| unsupported())?);
            rest = &after_dot[digits..];
        }

        let kind = match rest {
            "" => Kind::Plain,
            "f" | "F" => Kind::Fixed,
            "%" => Kind::Percent,
            "d" if precision.is_none() => Kind::Integer,
            _ => return Err(unsupported()),
        };

        Ok(Self {
            thousands,
            precision,
            kind,
        })
    }

    fn apply(&self, value: &Value) -> Result<String, ExpressionError> {
        let number = || {
            Num::from_value(value).ok_or_else(|| {
                ExpressionError::Type(format!("cannot format {value} as a number"))
            })
        };

        let text = match self.kind {
            Kind::Plain => match (self.precision, Num::from_value(value)) {
                (Some(p), Some(n)) => format!("{:.p$}", n.as_f64()),
                (Some(_), None) => {
                    return Err(ExpressionError::Type(format!(
                        "precision given for non-numeric {value}"
                    )))
                }
                (None, _) => py_str(value),
            },
            Kind::Fixed => format!("{:.*}", self.precision.unwrap_or(6), number()?.as_f64()),
            Kind::Percent => format!(
                "{:.*}%",
                self.precision.unwrap_or(6),
                number()?.as_f64() * 100.0
            ),
            Kind::Integer => match number()? {
                Num::Int(i) => i.to_string(),
                Num::Float(_) => {
                    return Err(ExpressionError::Type(
                        "format code 'd' requires an integer".to_string(),
                    ))
                }
            },
        };

        if self.thousands && Num::from_value(value).is_some() {
            Ok(group_thousands(&text))
        } else {
            Ok(text)
        }
    }
}

/// Insert `,` separators into the integer part of a formatted number.
fn group_thousands(text: &str) -> String {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };
    let split = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());
    let (digits, tail) = unsigned.split_at(split);

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}{tail}")
}

impl ReasoningTemplate {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '}' => return Err(TemplateError::UnmatchedBrace { offset }),
                '{' => {
                    let end = find_placeholder_end(source, offset)?;
                    let raw = &source[offset..=end];
                    let inner = &source[offset + 1..end];
                    let (expr_src, spec) = split_format_spec(inner);
                    if expr_src.trim().is_empty() {
                        return Err(TemplateError::EmptyPlaceholder { offset });
                    }
                    let spec = match spec {
                        Some(spec) => FormatSpec::parse(spec)?,
                        None => FormatSpec::PLAIN,
                    };
                    let expr = Expression::parse(expr_src.trim())?;

                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder {
                        raw: raw.to_string(),
                        expr,
                        spec,
                    });
                    while matches!(chars.peek(), Some((i, _)) if *i <= end) {
                        chars.next();
                    }
                }
                other => literal.push(other),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// A template that renders `source` unchanged.
    pub fn literal(source: &str) -> Self {
        Self {
            source: source.to_string(),
            segments: vec![Segment::Literal(source.to_string())],
        }
    }

    /// Parse, falling back to the literal text when the template is
    /// malformed. `context` names the rule for the log line.
    pub fn parse_or_literal(source: &str, context: &str) -> Self {
        Self::parse(source).unwrap_or_else(|e| {
            warn!(rule = context, error = %e, "Reasoning template does not parse; using it verbatim");
            Self::literal(source)
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether any placeholder reads `all_structured_findings`.
    pub fn references_findings(&self) -> bool {
        self.segments.iter().any(|s| match s {
            Segment::Placeholder { expr, .. } => expr.references_findings(),
            Segment::Literal(_) => false,
        })
    }

    /// Render against `scope`. Bare-name fallback is enabled here; a
    /// placeholder that fails is emitted verbatim.
    pub fn render(&self, scope: &Scope<'_>) -> String {
        let scope = scope.with_field_fallback();
        let mut out = String::with_capacity(self.source.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder { raw, expr, spec } => {
                    match expr.evaluate(&scope).and_then(|v| spec.apply(&v)) {
                        Ok(text) => out.push_str(&text),
                        Err(e) => {
                            warn!(placeholder = %raw, error = %e, "Reasoning placeholder failed; left verbatim");
                            out.push_str(raw);
                        }
                    }
                }
            }
        }
        out
    }
}

/// Byte offset of the `}` closing the placeholder opened at `open`.
/// Braces inside string literals do not count.
fn find_placeholder_end(source: &str, open: usize) -> Result<usize, TemplateError> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in source[open + 1..].char_indices() {
        let at = open + 1 + i;
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '}' => return Ok(at),
            '{' => return Err(TemplateError::UnclosedPlaceholder { offset: open }),
            _ => {}
        }
    }
    Err(TemplateError::UnclosedPlaceholder { offset: open })
}

/// Split `expr:spec` on the last top-level colon.
fn split_format_spec(inner: &str) -> (&str, Option<&str>) {
    let mut quote: Option<char> = None;
    let mut depth = 0i32;
    let mut split = None;

    for (i, ch) in inner.char_indices() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' | '[' => depth += 1,
            ')' | ']' => depth -= 1,
            ':' if depth == 0 => split = Some(i),
            _ => {}
        }
    }

    match split {
        Some(i) => (&inner[..i], Some(&inner[i + 1..])),
        None => (inner, None),
    }
}
