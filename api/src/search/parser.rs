use super::error::SearchError;
use super::types::{Comparator, FilterNode, Join, Node, ParsedFilter, RawCondition, RawValue};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Comparator(Comparator),
    Value(RawValue),
    LParen,
    RParen,
    And,
    Or,
}

/// What the tokenizer accepts next. Comparators are recognized before
/// anything else on a condition so `(`, `)` and `&&` inside values are never
/// mistaken for structure.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Expect {
    Term,
    Comparator,
    Value(Comparator),
    Connective,
}

struct Tokenizer {
    input: Vec<char>,
    pos: usize,
}

impl Tokenizer {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_while<F>(&mut self, predicate: F) -> String
    where
        F: Fn(char) -> bool,
    {
        let mut result = String::new();
        while let Some(ch) = self.peek() {
            if predicate(ch) {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn at_connective(&self) -> bool {
        matches!(
            (self.peek(), self.peek_at(1)),
            (Some('&'), Some('&')) | (Some('|'), Some('|'))
        )
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        let mut expect = Expect::Term;

        loop {
            self.skip_whitespace();
            let Some(ch) = self.peek() else {
                break;
            };

            match expect {
                Expect::Term => {
                    if ch == '(' {
                        self.advance();
                        tokens.push(Token::LParen);
                        continue;
                    }
                    let field = self.read_while(|c| c.is_alphanumeric() || c == '_' || c == '.');
                    if field.is_empty() {
                        return Err(format!("Expected field name or '(' but found '{}'", ch));
                    }
                    tokens.push(Token::Field(field));
                    expect = Expect::Comparator;
                }
                Expect::Comparator => {
                    let comparator = self.read_comparator()?;
                    tokens.push(Token::Comparator(comparator));
                    expect = Expect::Value(comparator);
                }
                Expect::Value(comparator) => {
                    let value = if comparator.is_list() {
                        RawValue::List(self.read_list()?)
                    } else {
                        RawValue::Single(self.read_value(false)?)
                    };
                    tokens.push(Token::Value(value));
                    expect = Expect::Connective;
                }
                Expect::Connective => {
                    if ch == ')' {
                        self.advance();
                        tokens.push(Token::RParen);
                    } else if self.at_connective() {
                        self.advance();
                        self.advance();
                        tokens.push(if ch == '&' { Token::And } else { Token::Or });
                        expect = Expect::Term;
                    } else {
                        return Err(format!("Expected '&&', '||' or ')' but found '{}'", ch));
                    }
                }
            }
        }

        match expect {
            Expect::Comparator => Err("Expected comparator after field name".to_string()),
            Expect::Value(_) => Err("Expected value after comparator".to_string()),
            Expect::Term if !tokens.is_empty() => {
                Err("Expected condition after connective".to_string())
            }
            _ => Ok(tokens),
        }
    }

    fn read_comparator(&mut self) -> Result<Comparator, String> {
        let comparator = match (self.peek(), self.peek_at(1)) {
            (Some('!'), Some('=')) => Some((Comparator::NotEq, 2)),
            (Some('>'), Some('=')) => Some((Comparator::Gte, 2)),
            (Some('<'), Some('=')) => Some((Comparator::Lte, 2)),
            (Some('='), _) => Some((Comparator::Eq, 1)),
            (Some('>'), _) => Some((Comparator::Gt, 1)),
            (Some('<'), _) => Some((Comparator::Lt, 1)),
            _ => None,
        };
        if let Some((comparator, len)) = comparator {
            self.pos += len;
            return Ok(comparator);
        }

        // Natural-language operators reduce to their symbolic forms
        let word = self.read_while(|c| c.is_alphabetic());
        match word.to_lowercase().as_str() {
            "like" => Ok(Comparator::Like),
            "in" => Ok(Comparator::In),
            "not" => {
                self.skip_whitespace();
                let next = self.read_while(|c| c.is_alphabetic());
                if next.eq_ignore_ascii_case("in") {
                    Ok(Comparator::NotIn)
                } else {
                    Err(format!("Expected 'in' after 'not' but found '{}'", next))
                }
            }
            "" => Err(format!(
                "Expected comparator but found '{}'",
                self.peek().map(String::from).unwrap_or_default()
            )),
            other => Err(format!("Unknown comparator: {}", other)),
        }
    }

    fn read_list(&mut self) -> Result<Vec<String>, String> {
        let mut values = vec![self.read_value(true)?];
        loop {
            self.skip_whitespace();
            if self.peek() == Some(',') {
                self.advance();
                values.push(self.read_value(true)?);
            } else {
                return Ok(values);
            }
        }
    }

    /// Read one value. Bare values run up to the next connective, an
    /// unbalanced `)` or the end of input (and a `,` inside lists), which
    /// quotes values containing spaces or parentheses implicitly.
    fn read_value(&mut self, in_list: bool) -> Result<String, String> {
        self.skip_whitespace();
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.advance();
                let value = self.read_quoted(quote)?;
                self.skip_whitespace();
                let terminated = self.peek().is_none()
                    || self.peek() == Some(')')
                    || self.at_connective()
                    || (in_list && self.peek() == Some(','));
                if !terminated {
                    return Err(format!("Unexpected text after quoted value '{}'", value));
                }
                Ok(value)
            }
            _ => {
                let mut value = String::new();
                let mut depth = 0usize;
                while let Some(ch) = self.peek() {
                    if self.at_connective() || (in_list && ch == ',' && depth == 0) {
                        break;
                    }
                    if ch == ')' {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                    } else if ch == '(' {
                        depth += 1;
                    }
                    value.push(ch);
                    self.advance();
                }
                let value = value.trim().to_string();
                if value.is_empty() {
                    return Err("Expected value".to_string());
                }
                Ok(value)
            }
        }
    }

    fn read_quoted(&mut self, quote: char) -> Result<String, String> {
        let mut value = String::new();
        while let Some(ch) = self.advance() {
            match ch {
                '\\' if matches!(self.peek(), Some(c) if c == quote || c == '\\') => {
                    if let Some(escaped) = self.advance() {
                        value.push(escaped);
                    }
                }
                c if c == quote => return Ok(value),
                c => value.push(c),
            }
        }
        Err("Unterminated quoted value".to_string())
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn parse(&mut self) -> Result<ParsedFilter, String> {
        if self.tokens.is_empty() {
            return Ok(Vec::new());
        }
        let nodes = self.parse_expr()?;
        match self.peek() {
            None => Ok(nodes),
            Some(Token::RParen) => Err("Unbalanced closing parenthesis".to_string()),
            Some(token) => Err(format!("Unexpected token {:?}", token)),
        }
    }

    /// Sibling list at one nesting level; each node keeps the connective
    /// that precedes it
    fn parse_expr(&mut self) -> Result<Vec<FilterNode<RawCondition>>, String> {
        let mut nodes = Vec::new();
        let mut join = Join::And;

        loop {
            let node = self.parse_term()?;
            nodes.push(FilterNode { join, node });

            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                    join = Join::And;
                }
                Some(Token::Or) => {
                    self.advance();
                    join = Join::Or;
                }
                _ => return Ok(nodes),
            }
        }
    }

    fn parse_term(&mut self) -> Result<Node<RawCondition>, String> {
        match self.advance() {
            Some(Token::LParen) => {
                if matches!(self.peek(), Some(Token::RParen)) {
                    return Err("Empty parentheses".to_string());
                }
                let children = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(Node::Group(children)),
                    _ => Err("Expected closing parenthesis".to_string()),
                }
            }
            Some(Token::Field(field)) => {
                let comparator = match self.advance() {
                    Some(Token::Comparator(c)) => c,
                    _ => return Err(format!("Expected comparator after '{}'", field)),
                };
                let value = match self.advance() {
                    Some(Token::Value(v)) => v,
                    _ => return Err(format!("Expected value for '{}'", field)),
                };
                Ok(Node::Condition(RawCondition {
                    field,
                    comparator,
                    value,
                }))
            }
            Some(token) => Err(format!("Expected condition but found {:?}", token)),
            None => Err("Unexpected end of filter".to_string()),
        }
    }
}

/// Parse a filter string into its node forest. Field names and values are
/// not validated here.
pub fn parse_filter(filter: &str) -> Result<ParsedFilter, SearchError> {
    let mut tokenizer = Tokenizer::new(filter);
    let tokens = tokenizer
        .tokenize()
        .map_err(|reason| SearchError::expression(filter, reason))?;
    let mut parser = Parser::new(tokens);
    parser
        .parse()
        .map_err(|reason| SearchError::expression(filter, reason))
}
