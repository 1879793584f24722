#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
    Not,
    Contains,
    Startswith,
    Endswith,
    Has,
    In,
    LParen,
    RParen,
    Comma,
    Star,
    Eof,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer { chars: src.char_indices().peekable(), src }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(&(start, c)) = self.chars.peek() else {
                tokens.push(Token::Eof);
                break;
            };
            if c == '"' {
                tokens.push(Token::Str(self.read_string()?));
            } else if c.is_ascii_digit() || (c == '-' && self.peek_is_digit_after_minus()) {
                tokens.push(Token::Int(self.read_int()?));
            } else if c.is_alphabetic() || c == '_' || c == '@' {
                let ident = self.read_ident();
                tokens.push(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "contains" => Token::Contains,
                    "startswith" => Token::Startswith,
                    "endswith" => Token::Endswith,
                    "has" => Token::Has,
                    "in" => Token::In,
                    _ => Token::Ident(ident),
                });
            } else {
                match c {
                    '(' => {
                        self.chars.next();
                        tokens.push(Token::LParen);
                    }
                    ')' => {
                        self.chars.next();
                        tokens.push(Token::RParen);
                    }
                    ',' => {
                        self.chars.next();
                        tokens.push(Token::Comma);
                    }
                    '*' => {
                        self.chars.next();
                        tokens.push(Token::Star);
                    }
                    '=' => {
                        self.chars.next();
                        if self.eat('=') {
                            tokens.push(Token::Eq);
                        } else {
                            return Err(format!("unexpected '=' at {start}"));
                        }
                    }
                    '!' => {
                        self.chars.next();
                        if self.eat('=') {
                            tokens.push(Token::Ne);
                        } else {
                            return Err(format!("unexpected '!' at {start}"));
                        }
                    }
                    '>' => {
                        self.chars.next();
                        if self.eat('=') {
                            tokens.push(Token::Gte);
                        } else {
                            tokens.push(Token::Gt);
                        }
                    }
                    '<' => {
                        self.chars.next();
                        if self.eat('=') {
                            tokens.push(Token::Lte);
                        } else {
                            tokens.push(Token::Lt);
                        }
                    }
                    other => return Err(format!("unexpected character '{other}' at {start}")),
                }
            }
        }
        Ok(tokens)
    }

    fn peek_is_digit_after_minus(&mut self) -> bool {
        let mut clone = self.chars.clone();
        clone.next();
        matches!(clone.peek(), Some((_, c)) if c.is_ascii_digit())
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some((_, c)) if *c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn read_string(&mut self) -> Result<String, String> {
        self.chars.next();
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(s),
                Some((_, '\\')) => {
                    if let Some((_, escaped)) = self.chars.next() {
                        s.push(escaped);
                    }
                }
                Some((_, c)) => s.push(c),
                None => return Err("unterminated string literal".into()),
            }
        }
    }

    fn read_int(&mut self) -> Result<i64, String> {
        let start = self.chars.peek().unwrap().0;
        if matches!(self.chars.peek(), Some((_, '-'))) {
            self.chars.next();
        }
        let mut end = start + 1;
        while matches!(self.chars.peek(), Some((_, c)) if c.is_ascii_digit()) {
            end = self.chars.next().unwrap().0 + 1;
        }
        self.src[start..end].parse().map_err(|_| "invalid integer literal".to_string())
    }

    fn read_ident(&mut self) -> String {
        let start = self.chars.peek().unwrap().0;
        let mut end = start;
        while matches!(self.chars.peek(), Some((_, c)) if c.is_alphanumeric() || *c == '_' || *c == '.' || *c == '@') {
            end = self.chars.next().unwrap().0 + 1;
        }
        self.src[start..end].to_string()
    }
}
