use super::error::SearchError;
use super::types::{Condition, FilterNode, Join, Node};

/// Target representation a filter tree is compiled into
pub trait FoldTarget {
    type Expr;

    fn leaf(&mut self, condition: &Condition) -> Result<Self::Expr, SearchError>;
    fn and(&mut self, left: Self::Expr, right: Self::Expr) -> Self::Expr;
    fn or(&mut self, left: Self::Expr, right: Self::Expr) -> Self::Expr;
}

/// Strict left-to-right fold of one sibling list. Every node is combined
/// with the accumulated result exactly once, using its own join; nested
/// groups fold first. Returns `None` for an empty list.
pub fn fold<T: FoldTarget>(
    nodes: &[FilterNode<Condition>],
    target: &mut T,
) -> Result<Option<T::Expr>, SearchError> {
    let mut result: Option<T::Expr> = None;

    for node in nodes {
        let compiled = match &node.node {
            Node::Condition(condition) => Some(target.leaf(condition)?),
            Node::Group(children) => fold(children, target)?,
        };
        let Some(compiled) = compiled else {
            continue;
        };

        result = Some(match result {
            None => compiled,
            Some(acc) => match node.join {
                Join::And => target.and(acc, compiled),
                Join::Or => target.or(acc, compiled),
            },
        });
    }

    Ok(result)
}
