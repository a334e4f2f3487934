//! Format templates: literal text with `{expression!conversion:spec}` fields.
//!
//! `{{` and `}}` are literal braces. The spec follows the usual
//! `[[fill]align][sign][#][0][width][,|_][.precision][type]` mini-language.

use super::ops::{too_large, EvalResult, MAX_ELEMENTS};
use crate::data::{format_float, Value};
use crate::error::{HdfScanError, Result};

/// Part of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    /// Literal text with `{{`/`}}` already unescaped.
    Text(String),
    /// A `{...}` replacement field.
    Field(Field),
}

/// A replacement field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Expression text between the braces.
    pub expression: String,
    /// Byte offset of the expression within the template.
    pub offset: usize,
    /// `r`, `s` or `a` after `!`.
    pub conversion: Option<char>,
    /// Text after `:`.
    pub spec: String,
}

/// Split a template into literal text and replacement fields.
pub fn parse_template(template: &str) -> Result<Vec<Piece>> {
    let chars: Vec<(usize, char)> = template.char_indices().collect();
    let char_at = |i: usize| chars.get(i).map(|&(_, c)| c);
    let mut pieces = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];
        match c {
            '{' if char_at(i + 1) == Some('{') => {
                text.push('{');
                i += 2;
            },
            '}' if char_at(i + 1) == Some('}') => {
                text.push('}');
                i += 2;
            },
            '}' => {
                return Err(HdfScanError::syntax(template, pos, "single '}' is not allowed"));
            },
            '{' => {
                if !text.is_empty() {
                    pieces.push(Piece::Text(std::mem::take(&mut text)));
                }
                let (field, next) = parse_field(template, &chars, i)?;
                pieces.push(Piece::Field(field));
                i = next;
            },
            _ => {
                text.push(c);
                i += 1;
            },
        }
    }
    if !text.is_empty() {
        pieces.push(Piece::Text(text));
    }
    Ok(pieces)
}

/// Parse the field opening at `chars[open]`; returns it and the index after `}`.
fn parse_field(template: &str, chars: &[(usize, char)], open: usize) -> Result<(Field, usize)> {
    let open_pos = chars[open].0;
    let unterminated = || HdfScanError::syntax(template, open_pos, "expecting '}'");
    let char_at = |i: usize| chars.get(i).map(|&(_, c)| c);
    let byte_at = |i: usize| chars.get(i).map(|&(p, _)| p).unwrap_or(template.len());

    let start = open + 1;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut j = start;
    loop {
        let c = char_at(j).ok_or_else(unterminated)?;
        if let Some(q) = quote {
            if c == '\\' {
                j += 1;
            } else if c == q {
                quote = None;
            }
            j += 1;
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' if depth > 0 => depth -= 1,
            '}' => break,
            '!' if depth == 0 && char_at(j + 1) != Some('=') => break,
            ':' if depth == 0 => break,
            _ => {},
        }
        j += 1;
    }

    let expression = template[byte_at(start)..byte_at(j)].to_string();
    if expression.trim().is_empty() {
        return Err(HdfScanError::syntax(
            template,
            open_pos,
            "empty expression not allowed",
        ));
    }

    let mut conversion = None;
    if char_at(j) == Some('!') {
        let c = char_at(j + 1).ok_or_else(unterminated)?;
        if !matches!(c, 'r' | 's' | 'a') {
            return Err(HdfScanError::syntax(
                template,
                byte_at(j + 1),
                "conversion must be one of 'r', 's' or 'a'",
            ));
        }
        conversion = Some(c);
        j += 2;
    }

    let mut spec = String::new();
    if char_at(j) == Some(':') {
        j += 1;
        loop {
            match char_at(j).ok_or_else(unterminated)? {
                '}' => break,
                '{' => {
                    return Err(HdfScanError::syntax(
                        template,
                        byte_at(j),
                        "nested replacement fields are not supported",
                    ))
                },
                c => spec.push(c),
            }
            j += 1;
        }
    }

    if char_at(j) != Some('}') {
        return Err(HdfScanError::syntax(template, byte_at(j), "expecting '}'"));
    }
    let field = Field {
        expression,
        offset: byte_at(start),
        conversion,
        spec,
    };
    Ok((field, j + 1))
}

/// Apply a `!r` / `!s` conversion.
pub fn convert(value: Value, conversion: Option<char>) -> Value {
    match conversion {
        Some('r') | Some('a') => Value::Str(value.repr()),
        Some('s') => Value::Str(value.to_string()),
        _ => value,
    }
}

/// Render `value` according to a format spec.
pub fn format_value(value: &Value, spec: &str) -> EvalResult<String> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    let spec = FormatSpec::parse(spec)?;
    match value {
        Value::Str(s) => spec.format_str(s),
        Value::Int(i) => spec.format_int(*i),
        Value::Bool(b) => spec.format_int(*b as i64),
        Value::Float(f) => spec.format_float(*f),
        other if spec.is_layout_only() => Ok(spec.pad("", &other.to_string(), false)),
        other => Err(format!(
            "unsupported format string passed to {}.__format__",
            other.type_name()
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FormatSpec {
    fill: char,
    align: Option<char>,
    sign: char,
    alternate: bool,
    zero: bool,
    width: usize,
    grouping: Option<char>,
    precision: Option<usize>,
    ty: Option<char>,
}

impl FormatSpec {
    fn parse(spec: &str) -> EvalResult<Self> {
        let invalid = || format!("Invalid format specifier '{}'", spec);
        let chars: Vec<char> = spec.chars().collect();
        let at = |i: usize| chars.get(i).copied();
        let is_align = |c: Option<char>| matches!(c, Some('<' | '>' | '^' | '='));

        let mut parsed = FormatSpec {
            fill: ' ',
            align: None,
            sign: '-',
            alternate: false,
            zero: false,
            width: 0,
            grouping: None,
            precision: None,
            ty: None,
        };
        let mut i = 0;
        if is_align(at(1)) {
            parsed.fill = chars[0];
            parsed.align = at(1);
            i = 2;
        } else if is_align(at(0)) {
            parsed.align = at(0);
            i = 1;
        }
        if let Some(c @ ('+' | '-' | ' ')) = at(i) {
            parsed.sign = c;
            i += 1;
        }
        if at(i) == Some('#') {
            parsed.alternate = true;
            i += 1;
        }
        if at(i) == Some('0') {
            parsed.zero = true;
            i += 1;
        }
        let digits = |i: &mut usize| -> EvalResult<Option<usize>> {
            let begin = *i;
            while at(*i).is_some_and(|c| c.is_ascii_digit()) {
                *i += 1;
            }
            if begin == *i {
                return Ok(None);
            }
            match chars[begin..*i].iter().collect::<String>().parse::<usize>() {
                Ok(n) if n <= MAX_ELEMENTS => Ok(Some(n)),
                _ => Err(too_large("format width or precision")),
            }
        };
        parsed.width = digits(&mut i)?.unwrap_or(0);
        if let Some(c @ (',' | '_')) = at(i) {
            parsed.grouping = Some(c);
            i += 1;
        }
        if at(i) == Some('.') {
            i += 1;
            parsed.precision = Some(digits(&mut i)?.ok_or("Format specifier missing precision")?);
        }
        if let Some(c) = at(i) {
            if !"bcdeEfFgGnosxX%".contains(c) {
                return Err(invalid());
            }
            parsed.ty = Some(c);
            i += 1;
        }
        if i != chars.len() {
            return Err(invalid());
        }
        Ok(parsed)
    }

    fn is_layout_only(&self) -> bool {
        self.sign == '-'
            && !self.alternate
            && !self.zero
            && self.grouping.is_none()
            && self.precision.is_none()
            && self.ty.is_none()
    }

    fn sign_prefix(&self, negative: bool) -> &'static str {
        match (negative, self.sign) {
            (true, _) => "-",
            (false, '+') => "+",
            (false, ' ') => " ",
            _ => "",
        }
    }

    fn pad(&self, sign: &str, body: &str, numeric: bool) -> String {
        let len = sign.chars().count() + body.chars().count();
        if len >= self.width {
            return format!("{}{}", sign, body);
        }
        let n = self.width - len;
        let (fill, align) = if self.zero && self.align.is_none() && numeric {
            ('0', '=')
        } else {
            (self.fill, self.align.unwrap_or(if numeric { '>' } else { '<' }))
        };
        let fill_str = |count: usize| fill.to_string().repeat(count);
        match align {
            '<' => format!("{}{}{}", sign, body, fill_str(n)),
            '^' => format!("{}{}{}{}", fill_str(n / 2), sign, body, fill_str(n - n / 2)),
            '=' => format!("{}{}{}", sign, fill_str(n), body),
            _ => format!("{}{}{}", fill_str(n), sign, body),
        }
    }

    fn format_str(&self, s: &str) -> EvalResult<String> {
        match self.ty {
            None | Some('s') => {},
            Some(c) => return Err(format!("Unknown format code '{}' for object of type 'str'", c)),
        }
        if self.sign != '-' {
            return Err("Sign not allowed in string format specifier".to_string());
        }
        if self.align == Some('=') {
            return Err("'=' alignment not allowed in string format specifier".to_string());
        }
        let body: String = match self.precision {
            Some(p) => s.chars().take(p).collect(),
            None => s.to_string(),
        };
        Ok(self.pad("", &body, false))
    }

    fn format_int(&self, value: i64) -> EvalResult<String> {
        let sign = self.sign_prefix(value < 0);
        let magnitude = value.unsigned_abs();
        let body = match self.ty {
            None | Some('d') | Some('n') => {
                if self.precision.is_some() {
                    return Err("Precision not allowed in integer format specifier".to_string());
                }
                group_digits(&magnitude.to_string(), self.grouping)
            },
            Some('x') => self.prefixed("0x", format!("{:x}", magnitude)),
            Some('X') => self.prefixed("0X", format!("{:X}", magnitude)),
            Some('o') => self.prefixed("0o", format!("{:o}", magnitude)),
            Some('b') => self.prefixed("0b", format!("{:b}", magnitude)),
            Some('c') => char::from_u32(value as u32)
                .map(String::from)
                .ok_or("%c arg not in range(0x110000)")?,
            Some('e' | 'E' | 'f' | 'F' | 'g' | 'G' | '%') => return self.format_float(value as f64),
            Some(c) => return Err(format!("Unknown format code '{}' for object of type 'int'", c)),
        };
        Ok(self.pad(sign, &body, true))
    }

    fn prefixed(&self, prefix: &str, digits: String) -> String {
        if self.alternate {
            format!("{}{}", prefix, digits)
        } else {
            digits
        }
    }

    fn format_float(&self, value: f64) -> EvalResult<String> {
        let negative = value < 0.0 || (value == 0.0 && value.is_sign_negative());
        let sign = self.sign_prefix(negative);
        let v = value.abs();
        let upper = matches!(self.ty, Some('E' | 'F' | 'G'));

        let body = if !v.is_finite() {
            let text = if v.is_nan() { "nan" } else { "inf" };
            let text = if upper { text.to_uppercase() } else { text.to_string() };
            if self.ty == Some('%') {
                format!("{}%", text)
            } else {
                text
            }
        } else {
            match self.ty {
                Some('f' | 'F') => fixed(v, self.precision.unwrap_or(6)),
                Some('e' | 'E') => exponent(v, self.precision.unwrap_or(6)),
                Some('g' | 'G') => general(v, self.precision.unwrap_or(6), self.alternate),
                Some('%') => format!("{}%", fixed(v * 100.0, self.precision.unwrap_or(6))),
                Some('n') | None => match self.precision {
                    Some(p) => {
                        let text = general(v, p, self.alternate);
                        if text.contains(['.', 'e']) {
                            text
                        } else {
                            format!("{}.0", text)
                        }
                    },
                    None => format_float(v),
                },
                Some(c) => {
                    return Err(format!(
                        "Unknown format code '{}' for object of type 'float'",
                        c
                    ))
                },
            }
        };
        let body = if upper { body.to_uppercase() } else { body };
        let body = match self.grouping {
            Some(_) => {
                let split = body.find(|c: char| !c.is_ascii_digit()).unwrap_or(body.len());
                format!("{}{}", group_digits(&body[..split], self.grouping), &body[split..])
            },
            None => body,
        };
        Ok(self.pad(sign, &body, true))
    }
}

fn group_digits(digits: &str, separator: Option<char>) -> String {
    let Some(separator) = separator else {
        return digits.to_string();
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

fn fixed(v: f64, precision: usize) -> String {
    format!("{:.*}", precision, v)
}

/// `1.234560e+05` style: at least two exponent digits, always signed.
fn exponent(v: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, v);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        },
        None => text,
    }
}

fn general(v: f64, precision: usize, alternate: bool) -> String {
    let precision = precision.max(1);
    let exp = if v == 0.0 {
        0
    } else {
        format!("{:.*e}", precision - 1, v)
            .split_once('e')
            .and_then(|(_, e)| e.parse::<i32>().ok())
            .unwrap_or(0)
    };
    let text = if -4 <= exp && exp < precision as i32 {
        fixed(v, (precision as i32 - 1 - exp) as usize)
    } else {
        exponent(v, precision - 1)
    };
    if alternate {
        return text;
    }
    match text.split_once('e') {
        Some((mantissa, exp)) => format!("{}e{}", strip_zeros(mantissa), exp),
        None => strip_zeros(&text),
    }
}

fn strip_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(expression: &str, offset: usize, conversion: Option<char>, spec: &str) -> Piece {
        Piece::Field(Field {
            expression: expression.to_string(),
            offset,
            conversion,
            spec: spec.to_string(),
        })
    }

    #[test]
    fn test_parse_template() {
        assert_eq!(
            parse_template("{title}: {eta.shape}").unwrap(),
            vec![
                field("title", 1, None, ""),
                Piece::Text(": ".to_string()),
                field("eta.shape", 10, None, ""),
            ]
        );
    }

    #[test]
    fn test_parse_conversion_spec_and_escapes() {
        assert_eq!(
            parse_template("{{x}} {a[1:2]!r:>10}").unwrap(),
            vec![
                Piece::Text("{x} ".to_string()),
                field("a[1:2]", 7, Some('r'), ">10"),
            ]
        );
        assert_eq!(
            parse_template("{a != b}").unwrap(),
            vec![field("a != b", 1, None, "")]
        );
        assert_eq!(
            parse_template("{d['k:v']:.2f}").unwrap(),
            vec![field("d['k:v']", 1, None, ".2f")]
        );
    }

    #[test]
    fn test_template_errors() {
        assert!(matches!(
            parse_template("a } b"),
            Err(HdfScanError::Syntax { position: 2, .. })
        ));
        assert!(matches!(
            parse_template("{eta"),
            Err(HdfScanError::Syntax { position: 0, .. })
        ));
        assert!(parse_template("{}").is_err());
        assert!(parse_template("{x!q}").is_err());
        assert!(parse_template("{x:{w}}").is_err());
    }

    #[test]
    fn test_float_specs() {
        assert_eq!(format_value(&Value::Float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(format_value(&Value::Float(1234.5), "e").unwrap(), "1.234500e+03");
        assert_eq!(format_value(&Value::Float(0.0001234), ".3g").unwrap(), "0.000123");
        assert_eq!(format_value(&Value::Float(1234567.0), ".3g").unwrap(), "1.23e+06");
        assert_eq!(format_value(&Value::Float(0.5), ".1%").unwrap(), "50.0%");
        assert_eq!(format_value(&Value::Float(1.0), ".3").unwrap(), "1.0");
        assert_eq!(format_value(&Value::Float(-2.5), "+08.2f").unwrap(), "-0002.50");
        assert_eq!(format_value(&Value::Float(1234567.891), ",.2f").unwrap(), "1,234,567.89");
    }

    #[test]
    fn test_int_and_str_specs() {
        assert_eq!(format_value(&Value::Int(42), "5d").unwrap(), "   42");
        assert_eq!(format_value(&Value::Int(42), "<5").unwrap(), "42   ");
        assert_eq!(format_value(&Value::Int(255), "#x").unwrap(), "0xff");
        assert_eq!(format_value(&Value::Int(1234567), "_").unwrap(), "1_234_567");
        assert_eq!(format_value(&Value::Int(7), ".2f").unwrap(), "7.00");
        assert_eq!(format_value(&Value::from("scan"), "*^8").unwrap(), "**scan**");
        assert_eq!(format_value(&Value::from("scan"), ".2").unwrap(), "sc");
        assert!(format_value(&Value::from("scan"), "d").is_err());
        assert!(format_value(&Value::Float(1.5), "d").is_err());
    }

    #[test]
    fn test_huge_width_and_precision_are_refused() {
        assert!(format_value(&Value::Int(1), ">99999999999").is_err());
        assert!(format_value(&Value::Float(1.0), ".999999999f").is_err());
        assert!(format_value(&Value::from("x"), ">99999999999999999999999").is_err());
    }

    #[test]
    fn test_other_values_accept_layout_only() {
        let shape = Value::shape_tuple(&[5]);
        assert_eq!(format_value(&shape, ">6").unwrap(), "  (5,)");
        assert!(format_value(&shape, ".2f").is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(convert(Value::from("a"), Some('r')), Value::from("'a'"));
        assert_eq!(convert(Value::Int(1), Some('s')), Value::from("1"));
        assert_eq!(convert(Value::Int(1), None), Value::Int(1));
    }
}
