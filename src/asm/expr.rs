//! Operand expressions.
//!
//! ```text
//! expr  := or
//! or    := and ('|' and)*
//! and   := shift ('&' shift)*
//! shift := sum (('<<' | '>>') sum)*
//! sum   := unary (('+' | '-') unary)*
//! unary := ('~' | '-') unary | atom
//! atom  := number | symbol | '(' expr ')'
//! ```
//!
//! Numbers are decimal, `0x` hex or `0b` binary. All arithmetic wraps at
//! 32 bits.

use thiserror::Error;

/// Errors that can occur while evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("{0}")]
    Syntax(String),

    #[error("undefined symbol: {0}")]
    Undefined(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Number(u32),
    Symbol(String),
    Or,
    And,
    Shl,
    Shr,
    Plus,
    Minus,
    Not,
    Open,
    Close,
}

/// Evaluate `text`, resolving symbols through `lookup`.
pub fn evaluate<F>(text: &str, lookup: F) -> Result<u32, ExprError>
where
    F: Fn(&str) -> Option<u32>,
{
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Err(ExprError::Syntax("missing operand".into()));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        lookup,
    };
    let value = parser.or()?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(ExprError::Syntax(format!("unexpected {:?}", token))),
    }
}

/// True if `name` can be used as a label or EQU name.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn tokenize(text: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '|' => {
                tokens.push(Token::Or);
                i += 1;
            }
            '&' => {
                tokens.push(Token::And);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '~' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '<' | '>' => {
                if chars.get(i + 1) != Some(&c) {
                    return Err(ExprError::Syntax(format!("expected '{}{}'", c, c)));
                }
                tokens.push(if c == '<' { Token::Shl } else { Token::Shr });
                i += 2;
            }
            _ if c.is_ascii_alphanumeric() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                if c.is_ascii_digit() {
                    tokens.push(Token::Number(parse_number(&word)?));
                } else {
                    tokens.push(Token::Symbol(word));
                }
            }
            _ => return Err(ExprError::Syntax(format!("unexpected character '{}'", c))),
        }
    }

    Ok(tokens)
}

/// Parse a decimal, `0x` hex or `0b` binary number.
pub fn parse_number(word: &str) -> Result<u32, ExprError> {
    let lower = word.to_ascii_lowercase();
    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u32::from_str_radix(bin, 2)
    } else {
        lower.parse::<u32>()
    };
    parsed.map_err(|_| ExprError::Syntax(format!("invalid number '{}'", word)))
}

struct Parser<F> {
    tokens: Vec<Token>,
    pos: usize,
    lookup: F,
}

impl<F> Parser<F>
where
    F: Fn(&str) -> Option<u32>,
{
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<u32, ExprError> {
        let mut value = self.and()?;
        while self.eat(&Token::Or) {
            value |= self.and()?;
        }
        Ok(value)
    }

    fn and(&mut self) -> Result<u32, ExprError> {
        let mut value = self.shift()?;
        while self.eat(&Token::And) {
            value &= self.shift()?;
        }
        Ok(value)
    }

    fn shift(&mut self) -> Result<u32, ExprError> {
        let mut value = self.sum()?;
        loop {
            if self.eat(&Token::Shl) {
                value = value.checked_shl(self.sum()?).unwrap_or(0);
            } else if self.eat(&Token::Shr) {
                value = value.checked_shr(self.sum()?).unwrap_or(0);
            } else {
                return Ok(value);
            }
        }
    }

    fn sum(&mut self) -> Result<u32, ExprError> {
        let mut value = self.unary()?;
        loop {
            if self.eat(&Token::Plus) {
                value = value.wrapping_add(self.unary()?);
            } else if self.eat(&Token::Minus) {
                value = value.wrapping_sub(self.unary()?);
            } else {
                return Ok(value);
            }
        }
    }

    fn unary(&mut self) -> Result<u32, ExprError> {
        if self.eat(&Token::Not) {
            Ok(!self.unary()?)
        } else if self.eat(&Token::Minus) {
            Ok(self.unary()?.wrapping_neg())
        } else {
            self.atom()
        }
    }

    fn atom(&mut self) -> Result<u32, ExprError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Symbol(name)) => {
                (self.lookup)(&name).ok_or(ExprError::Undefined(name))
            }
            Some(Token::Open) => {
                let value = self.or()?;
                if self.eat(&Token::Close) {
                    Ok(value)
                } else {
                    Err(ExprError::Syntax("missing ')'".into()))
                }
            }
            Some(token) => Err(ExprError::Syntax(format!("unexpected {:?}", token))),
            None => Err(ExprError::Syntax("unexpected end of expression".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(text: &str) -> Result<u32, ExprError> {
        evaluate(text, |name| match name {
            "LED1" => Some(0),
            "BUTTON1" => Some(5),
            _ => None,
        })
    }

    #[test]
    fn test_numbers() {
        assert_eq!(eval("42"), Ok(42));
        assert_eq!(eval("0x2A"), Ok(42));
        assert_eq!(eval("0b101010"), Ok(42));
        assert!(eval("0xZZ").is_err());
        assert!(eval("4294967296").is_err());
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0X1f"), Ok(0x1F));
        assert_eq!(parse_number("0b11"), Ok(3));
        assert_eq!(parse_number("17"), Ok(17));
        assert_eq!(
            parse_number("zz").unwrap_err().to_string(),
            "invalid number 'zz'"
        );
        assert_eq!(
            ExprError::Undefined("LED9".into()).to_string(),
            "undefined symbol: LED9"
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(eval("(1 << BUTTON1)"), Ok(32));
        assert_eq!(eval("~(1<<LED1)"), Ok(0xFFFF_FFFE));
        assert_eq!(eval("1 | 2 | 4"), Ok(7));
        assert_eq!(eval("0xF0 & 0x3C"), Ok(0x30));
        assert_eq!(eval("-1"), Ok(u32::MAX));
        assert_eq!(eval("10 - 3 + 1"), Ok(8));
        assert_eq!(eval("1 << 40"), Ok(0));
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 | 1 << 4"), Ok(0x11));
        assert_eq!(eval("1 << 2 + 1"), Ok(8));
    }

    #[test]
    fn test_errors() {
        assert_eq!(eval("UNKNOWN"), Err(ExprError::Undefined("UNKNOWN".into())));
        assert!(matches!(eval("(1"), Err(ExprError::Syntax(_))));
        assert!(matches!(eval("1 <"), Err(ExprError::Syntax(_))));
        assert!(matches!(eval(""), Err(ExprError::Syntax(_))));
        assert!(matches!(eval("1 2"), Err(ExprError::Syntax(_))));
    }

    #[test]
    fn test_identifiers() {
        assert!(is_identifier("ISR_PCINT0"));
        assert!(is_identifier("_tmp"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("a-b"));
    }
}
