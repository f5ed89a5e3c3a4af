//! printf-style formatting of nonce actions.
//!
//! An action template such as `"delete-post-%d"` is expanded with an ordered list of
//! [`Arg`] values. The supported subset covers what action names need:
//! - `%%` for a literal percent sign.
//! - Conversions `s`, `d`, `u`, `x`, `X`, `o`, `b` and `c`.
//! - An explicit argument number (`%2$s`), 1-based.
//! - Flags `-`, `+`, `0`, space and `'c` (custom padding character), a width and a
//!   `.precision` that truncates strings.
//!
//! Formatting is strict: the number of arguments must match the template and numeric
//! conversions only accept integers.
use std::{fmt, iter::Peekable, str::Chars};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A single value substituted into an action template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Int(i64),
    Str(String),
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Int(v) => write!(f, "{}", v),
            Arg::Str(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for Arg {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

#[derive(Debug, Default)]
struct Spec {
    argnum: Option<usize>,
    left: bool,
    plus: bool,
    pad: Option<char>,
    width: usize,
    precision: Option<usize>,
    conversion: char,
}

impl Spec {
    /// Parses everything after a `%` up to and including the conversion character.
    fn parse(chars: &mut Peekable<Chars<'_>>) -> Result<Self, Error> {
        let mut spec = Spec::default();

        let mut probe = chars.clone();
        let digits = take_digits(&mut probe);
        if !digits.is_empty() && probe.peek() == Some(&'$') {
            probe.next();
            let argnum: usize = digits
                .parse()
                .map_err(|_| Error::FormatSpec(format!("argument number `{}`", digits)))?;
            if argnum == 0 {
                return Err(Error::FormatSpec("argument number must be greater than zero".to_string()));
            }
            spec.argnum = Some(argnum);
            *chars = probe;
        }

        while let Some(&c) = chars.peek() {
            match c {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                '0' | ' ' => spec.pad = Some(c),
                '\'' => {
                    chars.next();
                    let pad = chars
                        .peek()
                        .copied()
                        .ok_or_else(|| Error::FormatSpec("missing padding character".to_string()))?;
                    spec.pad = Some(pad);
                }
                _ => break,
            }
            chars.next();
        }

        let width = take_digits(chars);
        if !width.is_empty() {
            spec.width = width
                .parse()
                .map_err(|_| Error::FormatSpec(format!("width `{}`", width)))?;
        }

        if chars.peek() == Some(&'.') {
            chars.next();
            let precision = take_digits(chars);
            spec.precision = Some(precision.parse().unwrap_or(0));
        }

        spec.conversion = chars
            .next()
            .ok_or_else(|| Error::FormatSpec("dangling `%` at end of format".to_string()))?;
        Ok(spec)
    }

    fn render(&self, position: usize, arg: &Arg) -> Result<String, Error> {
        let mismatch = || Error::FormatType {
            position,
            conversion: self.conversion,
        };
        let int = || match arg {
            Arg::Int(v) => Ok(*v),
            Arg::Str(_) => Err(mismatch()),
        };

        let body = match self.conversion {
            's' => {
                let text = arg.to_string();
                match self.precision {
                    Some(p) => text.chars().take(p).collect(),
                    None => text,
                }
            }
            'd' => {
                let v = int()?;
                if self.plus && v >= 0 {
                    format!("+{}", v)
                } else {
                    v.to_string()
                }
            }
            'u' => (int()? as u64).to_string(),
            'x' => format!("{:x}", int()? as u64),
            'X' => format!("{:X}", int()? as u64),
            'o' => format!("{:o}", int()? as u64),
            'b' => format!("{:b}", int()? as u64),
            'c' => {
                let v = int()?;
                let c = u32::try_from(v)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(mismatch)?;
                // %c ignores width and padding
                return Ok(c.to_string());
            }
            other => return Err(Error::FormatSpec(format!("unknown conversion `%{}`", other))),
        };

        Ok(self.pad_to_width(body))
    }

    fn pad_to_width(&self, body: String) -> String {
        let len = body.chars().count();
        if len >= self.width {
            return body;
        }
        let pad = self.pad.unwrap_or(' ');
        let fill: String = std::iter::repeat_n(pad, self.width - len).collect();

        if self.left {
            return body + &fill;
        }
        // zero padding goes between the sign and the digits
        if pad == '0' && self.conversion == 'd' && (body.starts_with('-') || body.starts_with('+')) {
            let (sign, digits) = body.split_at(1);
            return format!("{}{}{}", sign, fill, digits);
        }
        fill + &body
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

/// Expands `format` with `args`.
///
/// Returns `Error::FormatArity` when the template references more arguments than
/// given or leaves given arguments unused, `Error::FormatType` when a numeric
/// conversion receives a string and `Error::FormatSpec` for malformed templates.
pub fn format_action(format: &str, args: &[Arg]) -> Result<String, Error> {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next = 0;
    let mut expected = 0;
    let mut used = vec![false; args.len()];

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let spec = Spec::parse(&mut chars)?;
        let index = match spec.argnum {
            Some(n) => n - 1,
            None => {
                next += 1;
                next - 1
            }
        };
        expected = expected.max(index + 1);

        // keep scanning so the arity error reports the full count
        if let Some(arg) = args.get(index) {
            used[index] = true;
            out.push_str(&spec.render(index + 1, arg)?);
        }
    }

    if expected > args.len() {
        return Err(Error::FormatArity {
            expected,
            given: args.len(),
        });
    }
    // numbered placeholders may skip positions
    if used.contains(&false) {
        return Err(Error::FormatArity {
            expected: used.iter().filter(|u| **u).count(),
            given: args.len(),
        });
    }
    Ok(out)
}

// ==========Tests==========
#[cfg(test)]
mod tests {
    use super::{Arg, format_action};
    use crate::error::Error;

    #[test]
    fn test_format_string_and_int() {
        let args = [Arg::from("caleb"), Arg::from(15)];
        assert_eq!(format_action("qwerty %s %d", &args).unwrap(), "qwerty caleb 15");
    }

    #[test]
    fn test_format_literal_percent() {
        let args = [Arg::from(50)];
        assert_eq!(format_action("discount-%d%%", &args).unwrap(), "discount-50%");
    }

    #[test]
    fn test_format_argnum_reuse() {
        let args = [Arg::from("post"), Arg::from(7)];
        assert_eq!(
            format_action("edit-%1$s-%2$d-%1$s", &args).unwrap(),
            "edit-post-7-post"
        );
    }

    #[test]
    fn test_format_padding_and_precision() {
        assert_eq!(format_action("%05d", &[Arg::from(42)]).unwrap(), "00042");
        assert_eq!(format_action("%05d", &[Arg::from(-42)]).unwrap(), "-0042");
        assert_eq!(format_action("%-4s|", &[Arg::from("ab")]).unwrap(), "ab  |");
        assert_eq!(format_action("%'*6s", &[Arg::from("ab")]).unwrap(), "****ab");
        assert_eq!(format_action("%.3s", &[Arg::from("abcdef")]).unwrap(), "abc");
        assert_eq!(format_action("%+d", &[Arg::from(3)]).unwrap(), "+3");
    }

    #[test]
    fn test_format_numeric_bases() {
        let args = [Arg::from(255), Arg::from(255), Arg::from(8), Arg::from(5), Arg::from(65)];
        assert_eq!(
            format_action("%x %X %o %b %c", &args).unwrap(),
            "ff FF 10 101 A"
        );
        assert_eq!(
            format_action("%u", &[Arg::from(-1)]).unwrap(),
            u64::MAX.to_string()
        );
    }

    #[test]
    fn test_format_int_as_string() {
        assert_eq!(format_action("user-%s", &[Arg::from(12)]).unwrap(), "user-12");
    }

    #[test]
    fn test_format_too_few_args() {
        let result = format_action("qwerty %s %d", &[Arg::from("caleb")]);
        assert_eq!(
            result,
            Err(Error::FormatArity {
                expected: 2,
                given: 1
            })
        );
    }

    #[test]
    fn test_format_too_many_args() {
        let result = format_action("post-%d", &[Arg::from(1), Arg::from(2)]);
        assert_eq!(
            result,
            Err(Error::FormatArity {
                expected: 1,
                given: 2
            })
        );
    }

    #[test]
    fn test_format_skipped_argnum() {
        let result = format_action("post-%2$s", &[Arg::from("unused"), Arg::from("x")]);
        assert_eq!(
            result,
            Err(Error::FormatArity {
                expected: 1,
                given: 2
            })
        );
        assert_eq!(
            format_action("post-%2$s-%1$s", &[Arg::from("a"), Arg::from("b")]).unwrap(),
            "post-b-a"
        );
    }

    #[test]
    fn test_format_type_mismatch() {
        let result = format_action("post-%d", &[Arg::from("five")]);
        assert_eq!(
            result,
            Err(Error::FormatType {
                position: 1,
                conversion: 'd'
            })
        );
    }

    #[test]
    fn test_format_invalid_specs() {
        assert!(matches!(
            format_action("post-%q", &[Arg::from(1)]),
            Err(Error::FormatSpec(_))
        ));
        assert!(matches!(
            format_action("post-%", &[Arg::from(1)]),
            Err(Error::FormatSpec(_))
        ));
        assert!(matches!(
            format_action("post-%0$s", &[Arg::from(1)]),
            Err(Error::FormatSpec(_))
        ));
    }

    #[test]
    fn test_arg_deserialize_untagged() {
        let args: Vec<Arg> = serde_json::from_str(r#"["caleb", 15]"#).unwrap();
        assert_eq!(args, vec![Arg::from("caleb"), Arg::from(15)]);
    }
}
