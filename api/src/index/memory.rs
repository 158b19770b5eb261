//! In-process index speaking the same filter and sort dialect as the remote
//! engine. Used by single-process deployments and tests.

use super::{IndexClient, IndexSearchRequest, IndexSearchResponse, TaskDocument};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

type Collection = BTreeMap<i64, Value>;

#[derive(Default)]
pub struct MemoryIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl std::fmt::Debug for MemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.collections.read().map(|c| c.len()).unwrap_or_default();
        f.debug_struct("MemoryIndex")
            .field("collections", &count)
            .finish()
    }
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection, `None` if it does not exist
    pub fn document_count(&self, collection: &str) -> Option<usize> {
        self.collections
            .read()
            .ok()
            .and_then(|c| c.get(collection).map(|docs| docs.len()))
    }

    /// Stored document of a task, as JSON
    pub fn document(&self, collection: &str, task_id: i64) -> Option<Value> {
        self.collections
            .read()
            .ok()
            .and_then(|c| c.get(collection).and_then(|docs| docs.get(&task_id).cloned()))
    }

    fn write<T>(&self, f: impl FnOnce(&mut HashMap<String, Collection>) -> Result<T>) -> Result<T> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| anyhow!("Memory index lock poisoned"))?;
        f(&mut collections)
    }
}

#[async_trait]
impl IndexClient for MemoryIndex {
    async fn ensure_collection(&self, collection: &str) -> Result<()> {
        self.write(|c| {
            c.entry(collection.to_string()).or_default();
            Ok(())
        })
    }

    async fn recreate_collection(&self, collection: &str) -> Result<()> {
        self.write(|c| {
            c.insert(collection.to_string(), Collection::new());
            Ok(())
        })
    }

    async fn upsert_documents(&self, collection: &str, documents: &[TaskDocument]) -> Result<()> {
        let values = documents
            .iter()
            .map(|doc| serde_json::to_value(doc).map(|value| (doc.task_id, value)))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to serialize task document")?;
        self.write(|c| {
            let docs = c
                .get_mut(collection)
                .ok_or_else(|| anyhow!("Collection {} does not exist", collection))?;
            docs.extend(values);
            Ok(())
        })
    }

    async fn delete_documents(&self, collection: &str, task_ids: &[i64]) -> Result<()> {
        self.write(|c| {
            if let Some(docs) = c.get_mut(collection) {
                for id in task_ids {
                    docs.remove(id);
                }
            }
            Ok(())
        })
    }

    async fn search(
        &self,
        collection: &str,
        request: &IndexSearchRequest,
    ) -> Result<IndexSearchResponse> {
        let filter = if request.filter_by.trim().is_empty() {
            None
        } else {
            Some(FilterParser::new(&request.filter_by).parse()?)
        };
        let sort = parse_sort(&request.sort_by)?;
        let query = request.q.trim().to_ascii_lowercase();

        let collections = self
            .collections
            .read()
            .map_err(|_| anyhow!("Memory index lock poisoned"))?;
        let docs = collections
            .get(collection)
            .ok_or_else(|| anyhow!("Collection {} does not exist", collection))?;

        let mut hits: Vec<&Value> = docs
            .values()
            .filter(|doc| filter.as_ref().map_or(true, |f| f.matches(doc)))
            .filter(|doc| matches_query(doc, &query, &request.query_by))
            .collect();
        hits.sort_by(|a, b| compare_documents(a, b, &sort));

        let found = hits.len() as i64;
        let per_page = request.per_page.max(1);
        let offset = (request.page.max(1) - 1).saturating_mul(per_page) as usize;
        let ids = hits
            .into_iter()
            .skip(offset)
            .take(per_page as usize)
            .filter_map(|doc| doc.get("task_id").and_then(Value::as_i64))
            .collect();

        Ok(IndexSearchResponse { ids, found })
    }
}

fn matches_query(doc: &Value, query: &str, query_by: &[String]) -> bool {
    if query.is_empty() || query == "*" {
        return true;
    }
    query_by.iter().any(|field| {
        doc.get(field)
            .and_then(Value::as_str)
            .is_some_and(|text| text.to_ascii_lowercase().contains(query))
    })
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Literal {
    fn bare(token: &str) -> Self {
        match token {
            "true" => Literal::Bool(true),
            "false" => Literal::Bool(false),
            _ => token
                .parse::<f64>()
                .map(Literal::Number)
                .unwrap_or_else(|_| Literal::Text(token.to_string())),
        }
    }

    fn equals(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Text(s), Value::String(v)) => s == v,
            (Literal::Number(n), Value::Number(v)) => v.as_f64() == Some(*n),
            (Literal::Bool(b), Value::Bool(v)) => b == v,
            _ => false,
        }
    }

    fn compare(&self, value: &Value) -> Option<Ordering> {
        match (self, value) {
            (Literal::Number(n), Value::Number(v)) => v.as_f64()?.partial_cmp(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Condition {
        path: String,
        op: Op,
        values: Vec<Literal>,
    },
}

impl Filter {
    fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::And(l, r) => l.matches(doc) && r.matches(doc),
            Filter::Or(l, r) => l.matches(doc) || r.matches(doc),
            Filter::Condition { path, op, values } => {
                let leaves = resolve_path(doc, path);
                let any = |pred: &dyn Fn(&Literal, &Value) -> bool| {
                    leaves.iter().any(|leaf| values.iter().any(|lit| pred(lit, *leaf)))
                };
                match op {
                    Op::Eq => any(&|lit, leaf| lit.equals(leaf)),
                    Op::NotEq => !any(&|lit, leaf| lit.equals(leaf)),
                    Op::Gt => any(&|lit, leaf| lit.compare(leaf) == Some(Ordering::Greater)),
                    Op::Gte => any(&|lit, leaf| {
                        matches!(lit.compare(leaf), Some(Ordering::Greater | Ordering::Equal))
                    }),
                    Op::Lt => any(&|lit, leaf| lit.compare(leaf) == Some(Ordering::Less)),
                    Op::Lte => any(&|lit, leaf| {
                        matches!(lit.compare(leaf), Some(Ordering::Less | Ordering::Equal))
                    }),
                    Op::Contains => any(&|lit, leaf| match (lit, leaf) {
                        (Literal::Text(s), Value::String(v)) => {
                            v.to_ascii_lowercase().contains(&s.to_ascii_lowercase())
                        }
                        (lit, leaf) => lit.equals(leaf),
                    }),
                }
            }
        }
    }
}

/// Every scalar reachable through a dotted path, descending into arrays
fn resolve_path<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Array(items) => next.extend(items.iter().filter_map(|i| i.get(segment))),
                other => next.extend(other.get(segment)),
            }
        }
        current = next;
    }

    current
        .into_iter()
        .flat_map(|v| match v {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .filter(|v| !v.is_null())
        .collect()
}

/// `&&` binds tighter than `||`
struct FilterParser {
    input: Vec<char>,
    pos: usize,
}

impl FilterParser {
    fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
        }
    }

    fn parse(mut self) -> Result<Filter> {
        let filter = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            bail!("Unexpected input at position {} in filter", self.pos);
        }
        Ok(filter)
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_whitespace();
        let matches = token
            .chars()
            .enumerate()
            .all(|(i, c)| self.input.get(self.pos + i) == Some(&c));
        if matches {
            self.pos += token.chars().count();
        }
        matches
    }

    fn parse_or(&mut self) -> Result<Filter> {
        let mut left = self.parse_and()?;
        while self.eat("||") {
            let right = self.parse_and()?;
            left = Filter::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Filter> {
        let mut left = self.parse_primary()?;
        while self.eat("&&") {
            let right = self.parse_primary()?;
            left = Filter::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Filter> {
        if self.eat("(") {
            let inner = self.parse_or()?;
            if !self.eat(")") {
                bail!("Expected ')' at position {} in filter", self.pos);
            }
            return Ok(inner);
        }
        self.parse_condition()
    }

    fn parse_condition(&mut self) -> Result<Filter> {
        self.skip_whitespace();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.pos += 1;
        }
        let path: String = self.input[start..self.pos].iter().collect();
        if path.is_empty() || !self.eat(":") {
            bail!("Expected 'field:' at position {} in filter", start);
        }

        let op = if self.eat("!=") {
            Op::NotEq
        } else if self.eat(">=") {
            Op::Gte
        } else if self.eat("<=") {
            Op::Lte
        } else if self.eat("=") {
            Op::Eq
        } else if self.eat(">") {
            Op::Gt
        } else if self.eat("<") {
            Op::Lt
        } else {
            Op::Contains
        };

        let values = if self.eat("[") {
            let mut values = vec![self.parse_literal()?];
            while self.eat(",") {
                values.push(self.parse_literal()?);
            }
            if !self.eat("]") {
                bail!("Expected ']' at position {} in filter", self.pos);
            }
            values
        } else {
            vec![self.parse_literal()?]
        };

        Ok(Filter::Condition { path, op, values })
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        self.skip_whitespace();
        if self.peek() == Some('`') {
            self.pos += 1;
            let start = self.pos;
            while self.peek().is_some_and(|c| c != '`') {
                self.pos += 1;
            }
            if self.peek().is_none() {
                bail!("Unterminated string in filter");
            }
            let text: String = self.input[start..self.pos].iter().collect();
            self.pos += 1;
            return Ok(Literal::Text(text));
        }

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, ',' | ']' | ')' | '&' | '|'))
        {
            self.pos += 1;
        }
        if start == self.pos {
            bail!("Expected value at position {} in filter", start);
        }
        let token: String = self.input[start..self.pos].iter().collect();
        Ok(Literal::bare(&token))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct SortKey {
    path: String,
    descending: bool,
}

/// Parse `field(missing_values: last):asc,other:desc`. Missing values
/// always sort last.
fn parse_sort(sort_by: &str) -> Result<Vec<SortKey>> {
    sort_by
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (field, direction) = entry
                .rsplit_once(':')
                .ok_or_else(|| anyhow!("Invalid sort entry '{}'", entry))?;
            let path = field.split('(').next().unwrap_or(field).trim().to_string();
            let descending = match direction.trim() {
                "asc" => false,
                "desc" => true,
                other => bail!("Invalid sort direction '{}'", other),
            };
            Ok(SortKey { path, descending })
        })
        .collect()
}

fn compare_documents(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = a.get(&key.path).filter(|v| !v.is_null());
        let right = b.get(&key.path).filter(|v| !v.is_null());
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) => {
                let ordering = compare_values(l, r);
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests;
