use std::collections::HashSet;

use tracing::{debug, trace};
use vipt_core::{ChainId, Ruleset};

use crate::graph::{EdgeKind, FlowGraph, VertexId, VertexKind};
use crate::hooks::{PacketOrigin, tables_for_hook};

/// Walks an imported ruleset the way netfilter would for a given packet origin.
///
/// Match conditions are ignored; every rule that can redirect the packet is
/// assumed to do so, so the result shows all possible paths.
pub struct FlowSimulator<'a> {
    ruleset: &'a Ruleset,
}

impl<'a> FlowSimulator<'a> {
    pub fn new(ruleset: &'a Ruleset) -> Self {
        Self { ruleset }
    }

    /// Base chains visited for `origin`, in traversal order.
    ///
    /// Tables that do not declare a hook's chain are skipped.
    pub fn default_flow(&self, origin: PacketOrigin) -> Vec<ChainId> {
        let mut flow = Vec::new();

        for hook in origin.hooks() {
            for table_name in tables_for_hook(hook) {
                let Some(table) = self.ruleset.table_by_name(table_name) else {
                    continue;
                };
                if let Some(chain) = self.ruleset.find_chain(table, hook) {
                    flow.push(chain);
                }
            }
        }

        flow
    }

    /// Build the traversal graph for `origin`
    pub fn simulate(&self, origin: PacketOrigin) -> FlowGraph {
        let flow = self.default_flow(origin);
        debug!(%origin, chains = flow.len(), "simulating packet");

        let mut graph = FlowGraph::new();
        let chain_vertices: Vec<VertexId> = flow
            .iter()
            .map(|chain| self.add_chain_vertex(&mut graph, *chain, false))
            .collect();

        for (i, chain) in flow.iter().enumerate() {
            let vertex = chain_vertices[i];
            let exit = if self.ruleset.chain(*chain).has_rules() {
                let mut path = HashSet::from([*chain]);
                let subgraph = self.add_rules_vertex(&mut graph, *chain, &mut path);
                graph.add_edge(vertex, subgraph, EdgeKind::Rules);
                subgraph
            } else {
                vertex
            };

            if let Some(next) = chain_vertices.get(i + 1) {
                graph.add_edge(exit, *next, EdgeKind::Next);
            }
        }

        graph
    }

    fn add_chain_vertex(&self, graph: &mut FlowGraph, chain: ChainId, truncated: bool) -> VertexId {
        graph.add_vertex(
            self.ruleset.chain_label(chain),
            VertexKind::Chain {
                chain,
                special: self.ruleset.chain(chain).is_special(),
                truncated,
            },
        )
    }

    /// Add a vertex wrapping the rule graph of `chain`.
    ///
    /// `path` holds every chain currently being expanded above this one.
    fn add_rules_vertex(
        &self,
        graph: &mut FlowGraph,
        chain: ChainId,
        path: &mut HashSet<ChainId>,
    ) -> VertexId {
        let rules = self.expand_rules(chain, path);
        graph.add_vertex(
            format!("rules: {}", self.ruleset.chain_label(chain)),
            VertexKind::RuleSubgraph {
                chain,
                graph: rules,
            },
        )
    }

    fn expand_rules(&self, chain: ChainId, path: &mut HashSet<ChainId>) -> FlowGraph {
        let mut graph = FlowGraph::new();
        let mut previous: Option<VertexId> = None;

        for (rule_id, rule) in self.ruleset.rules_of(chain) {
            let vertex = graph.add_vertex(
                self.ruleset.rule_label(rule_id),
                VertexKind::Rule { rule: rule_id },
            );
            if let Some(previous) = previous {
                graph.add_edge(previous, vertex, EdgeKind::Next);
            }
            previous = Some(vertex);

            if let Some(target) = rule.jump_target() {
                self.expand_target(&mut graph, vertex, target, EdgeKind::Jump, path);
            }
            if let Some(target) = rule.goto_target() {
                self.expand_target(&mut graph, vertex, target, EdgeKind::Goto, path);
            }
        }

        graph
    }

    fn expand_target(
        &self,
        graph: &mut FlowGraph,
        from: VertexId,
        target: ChainId,
        kind: EdgeKind,
        path: &mut HashSet<ChainId>,
    ) {
        let chain = self.ruleset.chain(target);
        let on_path = path.contains(&target);
        if on_path {
            trace!(chain = chain.name(), "chain already on expansion path");
        }

        let vertex = self.add_chain_vertex(graph, target, on_path);
        graph.add_edge(from, vertex, kind);

        if chain.is_special() || on_path || !chain.has_rules() {
            return;
        }

        path.insert(target);
        let subgraph = self.add_rules_vertex(graph, target, path);
        path.remove(&target);
        graph.add_edge(vertex, subgraph, EdgeKind::Rules);
    }
}
