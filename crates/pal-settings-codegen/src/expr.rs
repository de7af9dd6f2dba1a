//! Integer expression evaluation for enum member values.
//!
//! Members may be written as C-style constant expressions over literals and
//! previously defined names, e.g. `"(1 << 4) | Fast"` or
//! `"Mode::Fast + 2"`. Operators and precedence follow C:
//!
//! | precedence | operators |
//! |------------|-----------|
//! | highest    | unary `~` `-` `+`, parentheses |
//! |            | `*` `/` `%` |
//! |            | `+` `-` |
//! |            | `<<` `>>` |
//! |            | `&` |
//! |            | `^` |
//! | lowest     | `\|` |
//!
//! Arithmetic is checked over `i128`; overflow and division by zero are
//! errors rather than wrapping.

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(i128),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

/// Parse an integer literal: decimal, `0x` hex, or `0b` binary, with an
/// optional sign and C integer suffixes (`u`, `l`, `ull`, ...).
pub fn parse_int_literal(text: &str) -> Option<i128> {
    let text = text.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let body = body.trim_end_matches(['u', 'U', 'l', 'L']);

    let magnitude = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        i128::from_str_radix(bin, 2).ok()?
    } else if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
        body.parse::<i128>().ok()?
    } else {
        return None;
    };

    Some(if negative { -magnitude } else { magnitude })
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && (bytes[i] as char).is_ascii_alphanumeric() {
                i += 1;
            }
            let text = &expr[start..i];
            let value =
                parse_int_literal(text).ok_or_else(|| format!("invalid number \"{text}\""))?;
            tokens.push(Token::Num(value));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() {
                let ch = bytes[i] as char;
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    i += 1;
                } else if ch == ':' && bytes.get(i + 1) == Some(&b':') {
                    i += 2;
                } else {
                    break;
                }
            }
            tokens.push(Token::Ident(expr[start..i].to_string()));
        } else {
            let two = expr.get(i..i + 2);
            let op = match (c, two) {
                (_, Some("<<")) => "<<",
                (_, Some(">>")) => ">>",
                ('|', _) => "|",
                ('^', _) => "^",
                ('&', _) => "&",
                ('+', _) => "+",
                ('-', _) => "-",
                ('*', _) => "*",
                ('/', _) => "/",
                ('%', _) => "%",
                ('~', _) => "~",
                ('(', _) => {
                    tokens.push(Token::LParen);
                    i += 1;
                    continue;
                }
                (')', _) => {
                    tokens.push(Token::RParen);
                    i += 1;
                    continue;
                }
                _ => return Err(format!("unexpected character '{c}'")),
            };
            tokens.push(Token::Op(op));
            i += op.len();
        }
    }

    Ok(tokens)
}

/// Deepest nesting of parentheses and prefix operators accepted.
pub const MAX_NESTING: usize = 256;

struct Parser<'a, F> {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    lookup: &'a F,
}

impl<'a, F> Parser<'a, F>
where
    F: Fn(&str) -> Option<i128>,
{
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(op),
            _ => None,
        }
    }

    fn binary(
        &mut self,
        level: usize,
    ) -> Result<i128, String> {
        const LEVELS: [&[&str]; 6] = [
            &["|"],
            &["^"],
            &["&"],
            &["<<", ">>"],
            &["+", "-"],
            &["*", "/", "%"],
        ];

        if level == LEVELS.len() {
            return self.unary();
        }

        let mut lhs = self.binary(level + 1)?;
        while let Some(op) = self.peek_op().filter(|op| LEVELS[level].contains(op)) {
            self.pos += 1;
            let rhs = self.binary(level + 1)?;
            lhs = apply(op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i128, String> {
        if self.depth == MAX_NESTING {
            return Err(format!("expression nested deeper than {MAX_NESTING} levels"));
        }
        self.depth += 1;
        let value = self.operand();
        self.depth -= 1;
        value
    }

    fn operand(&mut self) -> Result<i128, String> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Op("~")) => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some(Token::Op("-")) => {
                self.pos += 1;
                self.unary()?
                    .checked_neg()
                    .ok_or_else(|| "integer overflow".to_string())
            }
            Some(Token::Op("+")) => {
                self.pos += 1;
                self.unary()
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let value = self.binary(0)?;
                match self.tokens.get(self.pos) {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(value)
                    }
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(Token::Num(n)) => {
                self.pos += 1;
                Ok(n)
            }
            Some(Token::Ident(name)) => {
                self.pos += 1;
                (self.lookup)(&name).ok_or_else(|| format!("unknown name \"{name}\""))
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

fn apply(op: &str, lhs: i128, rhs: i128) -> Result<i128, String> {
    let overflow = || format!("integer overflow in {lhs} {op} {rhs}");
    match op {
        "|" => Ok(lhs | rhs),
        "^" => Ok(lhs ^ rhs),
        "&" => Ok(lhs & rhs),
        "<<" | ">>" => {
            let shift = u32::try_from(rhs)
                .ok()
                .filter(|s| *s < 128)
                .ok_or_else(|| format!("invalid shift amount {rhs}"))?;
            if op == "<<" {
                lhs.checked_shl(shift)
                    .filter(|v| v >> shift == lhs)
                    .ok_or_else(overflow)
            } else {
                Ok(lhs >> shift)
            }
        }
        "+" => lhs.checked_add(rhs).ok_or_else(overflow),
        "-" => lhs.checked_sub(rhs).ok_or_else(overflow),
        "*" => lhs.checked_mul(rhs).ok_or_else(overflow),
        "/" | "%" if rhs == 0 => Err("division by zero".to_string()),
        "/" => lhs.checked_div(rhs).ok_or_else(overflow),
        "%" => lhs.checked_rem(rhs).ok_or_else(overflow),
        other => Err(format!("unknown operator {other}")),
    }
}

/// Evaluate `expr`, resolving identifiers through `lookup`.
///
/// Identifiers are passed to `lookup` exactly as written, including any
/// `Scope::` prefix.
pub fn evaluate<F>(expr: &str, lookup: &F) -> Result<i128, String>
where
    F: Fn(&str) -> Option<i128>,
{
    let tokens = tokenize(expr)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        lookup,
    };
    let value = parser.binary(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(format!(
            "unexpected trailing input after token {}",
            parser.pos
        ));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_names(_: &str) -> Option<i128> {
        None
    }

    fn eval(expr: &str) -> Result<i128, String> {
        evaluate(expr, &no_names)
    }

    #[test]
    fn literals() {
        assert_eq!(parse_int_literal("42"), Some(42));
        assert_eq!(parse_int_literal("0x10"), Some(16));
        assert_eq!(parse_int_literal("0XfF"), Some(255));
        assert_eq!(parse_int_literal("0b101"), Some(5));
        assert_eq!(parse_int_literal("-0x5"), Some(-5));
        assert_eq!(parse_int_literal("0xFFFFFFFFull"), Some(0xFFFF_FFFF));
        assert_eq!(parse_int_literal("12abc"), None);
        assert_eq!(parse_int_literal(""), None);
        assert_eq!(parse_int_literal("Fast"), None);
    }

    #[test]
    fn precedence_follows_c() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), 7);
        assert_eq!(eval("1 << 2 + 1").unwrap(), 8);
        assert_eq!(eval("1 | 2 & 3").unwrap(), 3);
        assert_eq!(eval("6 ^ 3 | 8").unwrap(), 13);
        assert_eq!(eval("(1 + 2) * 3").unwrap(), 9);
        assert_eq!(eval("~0 & 0xFF").unwrap(), 255);
        assert_eq!(eval("-3 + 10 % 4").unwrap(), -1);
    }

    #[test]
    fn identifiers_resolve_through_lookup() {
        let lookup = |name: &str| match name {
            "Fast" => Some(2),
            "Mode::Slow" => Some(4),
            _ => None,
        };
        assert_eq!(evaluate("Fast | Mode::Slow", &lookup).unwrap(), 6);
        assert_eq!(evaluate("(1 << 4) | Fast", &lookup).unwrap(), 18);
        assert!(evaluate("Missing", &lookup).unwrap_err().contains("Missing"));
    }

    #[test]
    fn errors() {
        assert!(eval("").is_err());
        assert!(eval("1 +").is_err());
        assert!(eval("(1").is_err());
        assert!(eval("1 2").is_err());
        assert!(eval("1 / 0").unwrap_err().contains("division by zero"));
        assert!(eval("1 << 200").is_err());
        assert!(eval("1 $ 2").is_err());
    }

    #[test]
    fn deep_nesting_is_an_error_not_a_crash() {
        let ok = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(eval(&ok), Ok(1));

        let deep = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
        assert!(eval(&deep).unwrap_err().contains("nested deeper"));
        assert!(eval(&"~".repeat(20_000)).unwrap_err().contains("nested deeper"));
    }
}
