// Expression parser - converts a substituted formula expression into an AST
// Input is formula text after references and string literals have been
// replaced by parameter names (CELL_A1, STR_LITERAL_0).
// Supports: numbers, parameters, TRUE/FALSE, function calls, + - * / % ^ **,
// unary - and !, comparisons, && ||, & concatenation, ?: ternary

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Boolean(bool),
    /// Named parameter resolved from the evaluation environment
    Param(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    // Comparison
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
    // Logical
    And,
    Or,
    // String
    Concat,
}

pub fn parse(expression: &str) -> Result<Expr, String> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("Empty formula".to_string());
    }
    let (expr, pos) = parse_ternary(&tokens, 0)?;
    if pos < tokens.len() {
        return Err(format!("Unexpected token after expression: {:?}", tokens[pos]));
    }
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
    Comma,
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
    AndAnd,
    OrOr,
    Bang,
    Ampersand,
    Question,
    Colon,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => { chars.next(); }
            '+' => { tokens.push(Token::Plus); chars.next(); }
            '-' => { tokens.push(Token::Minus); chars.next(); }
            '/' => { tokens.push(Token::Slash); chars.next(); }
            '%' => { tokens.push(Token::Percent); chars.next(); }
            '^' => { tokens.push(Token::Caret); chars.next(); }
            '(' => { tokens.push(Token::LParen); chars.next(); }
            ')' => { tokens.push(Token::RParen); chars.next(); }
            ',' => { tokens.push(Token::Comma); chars.next(); }
            '?' => { tokens.push(Token::Question); chars.next(); }
            ':' => { tokens.push(Token::Colon); chars.next(); }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::StarStar);
                } else {
                    tokens.push(Token::Star);
                }
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => { tokens.push(Token::LtEq); chars.next(); }
                    Some('>') => { tokens.push(Token::NotEq); chars.next(); }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::GtEq);
                    chars.next();
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '=' => {
                // Both = and == compare
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::NotEq);
                    chars.next();
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    tokens.push(Token::AndAnd);
                    chars.next();
                } else {
                    tokens.push(Token::Ampersand);
                }
            }
            '|' => {
                chars.next();
                if chars.next() != Some('|') {
                    return Err("Expected ||".to_string());
                }
                tokens.push(Token::OrOr);
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Exponent: 1E3, 2.5E-4
                if matches!(chars.peek(), Some('E') | Some('e')) {
                    let mut lookahead = chars.clone();
                    lookahead.next();
                    let mut exponent = String::from("E");
                    if let Some(&sign) = lookahead.peek() {
                        if sign == '+' || sign == '-' {
                            exponent.push(sign);
                            lookahead.next();
                        }
                    }
                    let mut digits = String::new();
                    while let Some(&d) = lookahead.peek() {
                        if d.is_ascii_digit() {
                            digits.push(d);
                            lookahead.next();
                        } else {
                            break;
                        }
                    }
                    if !digits.is_empty() {
                        num_str.push_str(&exponent);
                        num_str.push_str(&digits);
                        chars = lookahead;
                    }
                }
                let num: f64 = num_str.parse().map_err(|_| format!("Invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident.to_ascii_uppercase()));
            }
            _ => return Err(format!("Unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

// Lowest precedence: cond ? a : b (right-associative)
fn parse_ternary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (condition, pos) = parse_or(tokens, pos)?;

    if let Some(Token::Question) = tokens.get(pos) {
        let (then, pos) = parse_ternary(tokens, pos + 1)?;
        match tokens.get(pos) {
            Some(Token::Colon) => {}
            _ => return Err("Expected : in conditional expression".to_string()),
        }
        let (otherwise, pos) = parse_ternary(tokens, pos + 1)?;
        return Ok((
            Expr::Ternary {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            pos,
        ));
    }

    Ok((condition, pos))
}

fn parse_or(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_and(tokens, pos)?;

    while let Some(Token::OrOr) = tokens.get(pos) {
        let (right, new_pos) = parse_and(tokens, pos + 1)?;
        left = binary(Op::Or, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_and(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_comparison(tokens, pos)?;

    while let Some(Token::AndAnd) = tokens.get(pos) {
        let (right, new_pos) = parse_comparison(tokens, pos + 1)?;
        left = binary(Op::And, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_comparison(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_concat(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Lt => Op::Lt,
            Token::Gt => Op::Gt,
            Token::Eq => Op::Eq,
            Token::LtEq => Op::LtEq,
            Token::GtEq => Op::GtEq,
            Token::NotEq => Op::NotEq,
            _ => break,
        };
        let (right, new_pos) = parse_concat(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

// String concatenation (&)
fn parse_concat(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_add_sub(tokens, pos)?;

    while let Some(Token::Ampersand) = tokens.get(pos) {
        let (right, new_pos) = parse_add_sub(tokens, pos + 1)?;
        left = binary(Op::Concat, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_unary(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            Token::Percent => Op::Mod,
            _ => break,
        };
        let (right, new_pos) = parse_unary(tokens, pos + 1)?;
        left = binary(op, left, right);
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_unary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    match tokens.get(pos) {
        Some(Token::Minus) => {
            let (operand, pos) = parse_unary(tokens, pos + 1)?;
            Ok((Expr::Unary { op: UnaryOp::Neg, operand: Box::new(operand) }, pos))
        }
        Some(Token::Bang) => {
            let (operand, pos) = parse_unary(tokens, pos + 1)?;
            Ok((Expr::Unary { op: UnaryOp::Not, operand: Box::new(operand) }, pos))
        }
        // Unary plus is a no-op
        Some(Token::Plus) => parse_unary(tokens, pos + 1),
        _ => parse_power(tokens, pos),
    }
}

// Exponentiation (^ or **) - right-associative, binds tighter than unary minus
fn parse_power(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (base, pos) = parse_primary(tokens, pos)?;

    if let Some(Token::Caret | Token::StarStar) = tokens.get(pos) {
        let (exponent, new_pos) = parse_unary(tokens, pos + 1)?;
        return Ok((binary(Op::Pow, base, exponent), new_pos));
    }

    Ok((base, pos))
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let Some(token) = tokens.get(pos) else {
        return Err("Unexpected end of expression".to_string());
    };

    match token {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::Ident(name) => {
            if let Some(Token::LParen) = tokens.get(pos + 1) {
                let (args, new_pos) = parse_function_args(tokens, pos + 2)?;
                return Ok((Expr::Function { name: name.clone(), args }, new_pos));
            }
            match name.as_str() {
                "TRUE" => Ok((Expr::Boolean(true), pos + 1)),
                "FALSE" => Ok((Expr::Boolean(false), pos + 1)),
                _ => Ok((Expr::Param(name.clone()), pos + 1)),
            }
        }
        Token::LParen => {
            let (expr, pos) = parse_ternary(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                Some(_) => Err("Expected closing parenthesis".to_string()),
                None => Err("Missing closing parenthesis".to_string()),
            }
        }
        _ => Err(format!("Unexpected token at position {}", pos)),
    }
}

fn parse_function_args(tokens: &[Token], pos: usize) -> Result<(Vec<Expr>, usize), String> {
    let mut args = Vec::new();
    let mut pos = pos;

    // Empty call: PI()
    if let Some(Token::RParen) = tokens.get(pos) {
        return Ok((args, pos + 1));
    }

    loop {
        let (arg, new_pos) = parse_ternary(tokens, pos)?;
        args.push(arg);
        pos = new_pos;

        match tokens.get(pos) {
            Some(Token::RParen) => return Ok((args, pos + 1)),
            Some(Token::Comma) => pos += 1,
            Some(_) => return Err("Expected comma or closing parenthesis".to_string()),
            None => return Err("Missing closing parenthesis in function call".to_string()),
        }
    }
}

fn binary(op: Op, left: Expr, right: Expr) -> Expr {
    Expr::BinaryOp {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
