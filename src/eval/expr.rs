//! 纯数字算术表达式求值：手写分词器 + 递归下降
//!
//! 只接受 + - * / ( )、数字字面量与一元负号。公式在此之前已把
//! 引用与 SUM 调用重写成数字，因此这里不存在任何动态代码执行面。

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        match ch {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| format!("bad number literal: {}", text))?;
                tokens.push(Token::Num(n));
            }
            other => return Err(format!("unexpected character: {}", other)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.peek();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    acc += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    acc -= self.term()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<f64, String> {
        let mut acc = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    acc *= self.factor()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    acc /= self.factor()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    // factor := '-' factor | number | '(' expr ')'
    fn factor(&mut self) -> Result<f64, String> {
        match self.bump() {
            Some(Token::Minus) => Ok(-self.factor()?),
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            other => Err(format!("unexpected token: {:?}", other)),
        }
    }
}

/// 求值入口；任何词法 / 语法错误都以 Err 返回，调用方统一映射为 #ERROR!
pub fn eval_expr(input: &str) -> Result<f64, String> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err("trailing tokens".to_string());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_arithmetic() {
        assert_eq!(eval_expr("1+2*3").unwrap(), 7.0);
        assert_eq!(eval_expr("(1+2)*3").unwrap(), 9.0);
        assert_eq!(eval_expr("10/4").unwrap(), 2.5);
        assert_eq!(eval_expr(" 2 - 5 ").unwrap(), -3.0);
    }

    #[test]
    fn unary_minus() {
        assert_eq!(eval_expr("-3").unwrap(), -3.0);
        assert_eq!(eval_expr("2*-3").unwrap(), -6.0);
        assert_eq!(eval_expr("-(1+2)").unwrap(), -3.0);
        assert_eq!(eval_expr("--4").unwrap(), 4.0);
    }

    #[test]
    fn decimals() {
        assert_eq!(eval_expr("0.5+.25").unwrap(), 0.75);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(eval_expr("").is_err());
        assert!(eval_expr("1+").is_err());
        assert!(eval_expr("(1+2").is_err());
        assert!(eval_expr("1 2").is_err());
        assert!(eval_expr("2^3").is_err());
        assert!(eval_expr("1.2.3").is_err());
        assert!(eval_expr("hello").is_err());
    }

    #[test]
    fn division_by_zero_is_non_finite_not_err() {
        // 非有限值由上层统一映射为 #ERROR!
        assert!(eval_expr("1/0").unwrap().is_infinite());
    }
}
