//! Compiles pattern ASTs into an arena of match states.
//!
//! Nodes are addressed by index, so quantifier back-edges and the
//! zero-width sub-graphs of lookahead groups need no shared ownership.
//! A graph is immutable once [`Graph::compile`] returns.

use std::collections::HashSet;

use super::ast::*;

/// Index of a node within its [`Graph`].
pub type NodeId = usize;

/// The predicate attached to a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// Always succeeds without consuming input.
    Empty,
    Any,
    Literal(char),
    CharSet(CharSet),
    Shorthand(Shorthand),
    EndOfInput,
    /// Succeeds without consuming input when the sub-graph rooted at the
    /// given node reaches its accepting node.
    Lookahead(NodeId),
    Identifier(String),
}

impl Matcher {
    pub fn consumes(&self) -> bool {
        !matches!(
            self,
            Matcher::Empty | Matcher::EndOfInput | Matcher::Lookahead(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub matcher: Matcher,
    pub target: NodeId,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateNode {
    pub connections: Vec<Connection>,
    /// Capture groups that record whatever is consumed on arrival here.
    pub captures: Vec<CaptureName>,
    /// Repetition counter bumped on arrival (non-greedy quantifiers only).
    pub counter: Option<usize>,
    pub accepting: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    nodes: Vec<StateNode>,
    entry: NodeId,
    exit: NodeId,
    counter_slots: usize,
}

impl Graph {
    /// Build and compress the graph for a sequence of items.
    pub fn compile(items: &[Item]) -> Self {
        let mut builder = Builder::default();
        let exit = builder.add_node();
        builder.nodes[exit].accepting = true;
        let entry = builder.build_members(items, exit);

        let mut graph = Self {
            nodes: builder.nodes,
            entry,
            exit,
            counter_slots: builder.next_counter,
        };
        graph.compress();
        graph
    }

    pub fn entry(&self) -> NodeId {
        self.entry
    }

    pub fn exit(&self) -> NodeId {
        self.exit
    }

    pub fn node(&self, id: NodeId) -> &StateNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of repetition counters a simulation state must carry.
    pub fn counter_slots(&self) -> usize {
        self.counter_slots
    }

    /// Every identifier referenced anywhere in the graph.
    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .flat_map(|node| &node.connections)
            .filter_map(|conn| match &conn.matcher {
                Matcher::Identifier(name) => Some(name.as_str()),
                _ => None,
            })
    }

    /// Replace empty transitions into non-accepting nodes with the target's
    /// own transitions.
    fn compress(&mut self) {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![self.entry];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut visited[id], true) {
                continue;
            }
            self.splice_empty(id);
            for conn in &self.nodes[id].connections {
                stack.push(conn.target);
                if let Matcher::Lookahead(entry) = conn.matcher {
                    stack.push(entry);
                }
            }
        }
    }

    fn splice_empty(&mut self, id: NodeId) {
        // Each target is spliced at most once, which also cuts empty cycles.
        let mut spliced = HashSet::from([id]);
        let mut i = 0;
        while i < self.nodes[id].connections.len() {
            let conn = &self.nodes[id].connections[i];
            if conn.matcher != Matcher::Empty || self.nodes[conn.target].accepting {
                i += 1;
                continue;
            }
            let target = conn.target;
            self.nodes[id].connections.remove(i);
            if spliced.insert(target) {
                let inherited = self.nodes[target].connections.clone();
                self.nodes[id].connections.extend(inherited);
            }
        }
    }
}

/// Compilation context: the growing node arena and the next free counter slot.
#[derive(Default)]
struct Builder {
    nodes: Vec<StateNode>,
    next_counter: usize,
}

impl Builder {
    fn add_node(&mut self) -> NodeId {
        self.nodes.push(StateNode::default());
        self.nodes.len() - 1
    }

    fn connect(&mut self, from: NodeId, matcher: Matcher, to: NodeId) {
        self.nodes[from].connections.push(Connection {
            matcher,
            target: to,
        });
    }

    /// Build `items` in sequence, ending in `end`. Returns the entry node.
    fn build_members(&mut self, items: &[Item], end: NodeId) -> NodeId {
        let entry = self.add_node();
        let mut previous = vec![entry];
        for item in items {
            previous = self.build_item(item, &previous);
        }
        for node in previous {
            self.connect(node, Matcher::Empty, end);
        }
        entry
    }

    /// Wire one quantified item after `previous`, returning the nodes that
    /// the next item continues from.
    fn build_item(&mut self, item: &Item, previous: &[NodeId]) -> Vec<NodeId> {
        let (matcher, entry, exit) = self.build_element(&item.element);
        if item.is_lazy() {
            let slot = self.next_counter;
            self.next_counter += 1;
            for id in self.reachable(entry) {
                self.nodes[id].counter = Some(slot);
            }
        }

        for &node in previous {
            self.connect(node, matcher.clone(), entry);
        }
        let mut next = vec![exit];
        if matches!(item.quantifier, Quantifier::ZeroOrOne | Quantifier::ZeroOrMore) {
            let bypass = self.add_node();
            for &node in previous {
                self.connect(node, Matcher::Empty, bypass);
            }
            next.push(bypass);
        }
        if matches!(item.quantifier, Quantifier::ZeroOrMore | Quantifier::OneOrMore) {
            self.connect(exit, matcher, entry);
        }
        next
    }

    /// Returns the matcher leading into the element with its entry and exit
    /// nodes. Single-unit elements enter and exit at the same node.
    fn build_element(&mut self, element: &Element) -> (Matcher, NodeId, NodeId) {
        let matcher = match element {
            Element::Group(group) if group.kind == GroupKind::Lookahead => {
                let exit = self.add_node();
                self.nodes[exit].accepting = true;
                let entry = self.build_members(&group.members, exit);
                Matcher::Lookahead(entry)
            }
            Element::Group(group) => {
                let end = self.add_node();
                let entry = self.build_members(&group.members, end);
                for id in self.reachable(entry) {
                    let node = &mut self.nodes[id];
                    for capture in &group.captures {
                        if !node.captures.contains(capture) {
                            node.captures.push(capture.clone());
                        }
                    }
                }
                return (Matcher::Empty, entry, end);
            }
            Element::Alternation { left, right } => {
                let entry = self.add_node();
                let end = self.add_node();
                for branch in [left, right] {
                    let branch_entry = self.build_members(branch, end);
                    self.connect(entry, Matcher::Empty, branch_entry);
                }
                return (Matcher::Empty, entry, end);
            }
            Element::Literal(c) => Matcher::Literal(*c),
            Element::Any => Matcher::Any,
            Element::EndOfInput => Matcher::EndOfInput,
            Element::CharSet(cs) => Matcher::CharSet(cs.clone()),
            Element::Shorthand(s) => Matcher::Shorthand(*s),
            Element::Identifier(name) => Matcher::Identifier(name.clone()),
        };
        let node = self.add_node();
        (matcher, node, node)
    }

    fn reachable(&self, from: NodeId) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        let mut found = Vec::new();
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id], true) {
                continue;
            }
            found.push(id);
            stack.extend(self.nodes[id].connections.iter().map(|c| c.target));
        }
        found
    }
}
