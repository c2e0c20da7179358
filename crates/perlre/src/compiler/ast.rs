// Pattern syntax tree
use crate::program::{CharSet, Look, RepeatMode};
use crate::regex_limits::MAX_LOOKBEHIND;
use smol_str::SmolStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Empty,
    Literal(char),
    Any { dotall: bool },
    Class(CharSet),
    Assert(Look),
    Group { kind: GroupKind, node: Box<Node> },
    Concat(Vec<Node>),
    Alternate(Vec<Node>),
    Repeat {
        node: Box<Node>,
        min: u32,
        max: Option<u32>,
        mode: RepeatMode,
        offset: usize,
    },
    Backref {
        target: BackrefTarget,
        caseless: bool,
        offset: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupKind {
    Capture(u32),
    NonCapture,
    Atomic,
    LookAhead { negate: bool },
    LookBehind { negate: bool, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackrefTarget {
    Number(u32),
    Name(SmolStr),
}

impl Node {
    pub fn group(kind: GroupKind, node: Node) -> Node {
        Node::Group {
            kind,
            node: Box::new(node),
        }
    }

    /// Collapse single-element sequences.
    pub fn concat(mut nodes: Vec<Node>) -> Node {
        match nodes.len() {
            0 => Node::Empty,
            1 => nodes.pop().unwrap_or(Node::Empty),
            _ => Node::Concat(nodes),
        }
    }

    pub fn alternate(mut nodes: Vec<Node>) -> Node {
        if nodes.len() == 1 {
            nodes.pop().unwrap_or(Node::Empty)
        } else {
            Node::Alternate(nodes)
        }
    }

    /// True when the node can match without consuming input.
    pub fn can_be_empty(&self) -> bool {
        match self {
            Node::Empty | Node::Assert(_) | Node::Backref { .. } => true,
            Node::Literal(_) | Node::Any { .. } | Node::Class(_) => false,
            Node::Group { kind, node } => match kind {
                GroupKind::LookAhead { .. } | GroupKind::LookBehind { .. } => true,
                _ => node.can_be_empty(),
            },
            Node::Concat(nodes) => nodes.iter().all(Node::can_be_empty),
            Node::Alternate(nodes) => nodes.iter().any(Node::can_be_empty),
            Node::Repeat { node, min, .. } => *min == 0 || node.can_be_empty(),
        }
    }

    /// Length in characters of every string the node matches, when that
    /// length is fixed.
    pub fn fixed_len(&self) -> Option<u32> {
        let len = match self {
            Node::Empty | Node::Assert(_) => 0,
            Node::Literal(_) | Node::Any { .. } | Node::Class(_) => 1,
            Node::Backref { .. } => return None,
            Node::Group { kind, node } => match kind {
                GroupKind::LookAhead { .. } | GroupKind::LookBehind { .. } => 0,
                _ => node.fixed_len()?,
            },
            Node::Concat(nodes) => {
                let mut total = 0u32;
                for n in nodes {
                    total = total.checked_add(n.fixed_len()?)?;
                }
                total
            }
            Node::Alternate(nodes) => {
                let first = nodes.first()?.fixed_len()?;
                for n in &nodes[1..] {
                    if n.fixed_len()? != first {
                        return None;
                    }
                }
                first
            }
            Node::Repeat { node, min, max, .. } => {
                if *max != Some(*min) {
                    return None;
                }
                node.fixed_len()?.checked_mul(*min)?
            }
        };
        (len <= MAX_LOOKBEHIND).then_some(len)
    }

    /// True when every match must begin at the start offset.
    pub fn is_anchored(&self) -> bool {
        match self {
            Node::Assert(Look::StartText)
            | Node::Assert(Look::StartOffset)
            | Node::Assert(Look::StartLine { multiline: false }) => true,
            Node::Group { kind, node } => match kind {
                GroupKind::Capture(_) | GroupKind::NonCapture | GroupKind::Atomic => {
                    node.is_anchored()
                }
                _ => false,
            },
            Node::Concat(nodes) => nodes.first().is_some_and(Node::is_anchored),
            Node::Alternate(nodes) => nodes.iter().all(Node::is_anchored),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_len() {
        let abc = Node::Concat(vec![
            Node::Literal('a'),
            Node::Any { dotall: false },
            Node::Assert(Look::StartText),
        ]);
        assert_eq!(abc.fixed_len(), Some(2));
        let alt = Node::Alternate(vec![Node::Literal('a'), Node::Empty]);
        assert_eq!(alt.fixed_len(), None);
        let rep = Node::Repeat {
            node: Box::new(Node::Literal('x')),
            min: 3,
            max: Some(3),
            mode: RepeatMode::Greedy,
            offset: 0,
        };
        assert_eq!(rep.fixed_len(), Some(3));
    }

    #[test]
    fn test_can_be_empty() {
        assert!(Node::Empty.can_be_empty());
        assert!(!Node::Literal('a').can_be_empty());
        let star = Node::Repeat {
            node: Box::new(Node::Literal('a')),
            min: 0,
            max: None,
            mode: RepeatMode::Greedy,
            offset: 0,
        };
        assert!(star.can_be_empty());
    }
}
