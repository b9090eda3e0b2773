// Renderers for the flow graph: Graphviz DOT and JSON.
use anyhow::Result;
use serde::Serialize;
use std::fmt::Write;
use vipt_core::Ruleset;
use vipt_flow::{EdgeKind, FlowGraph, PacketOrigin, VertexClass, VertexKind};

#[derive(Serialize)]
struct FlowDocument<'a> {
    origin: PacketOrigin,
    default_flow: Vec<String>,
    graph: &'a FlowGraph,
}

pub fn render_json(
    graph: &FlowGraph,
    origin: PacketOrigin,
    default_flow: Vec<String>,
) -> Result<String> {
    let doc = FlowDocument {
        origin,
        default_flow,
        graph,
    };
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Render as a `digraph`; every rule subgraph becomes a cluster
pub struct DotRenderer<'a> {
    ruleset: &'a Ruleset,
}

impl<'a> DotRenderer<'a> {
    pub fn new(ruleset: &'a Ruleset) -> Self {
        Self { ruleset }
    }

    pub fn render(&self, graph: &FlowGraph, origin: PacketOrigin) -> String {
        let mut out = String::new();
        out.push_str("digraph flow {\n");
        out.push_str("  compound=true;\n");
        let _ = writeln!(out, "  label=\"packet origin: {}\";", origin);
        out.push_str("  node [fontname=\"monospace\"];\n");
        self.write_graph(&mut out, graph, "v", 1);
        out.push_str("}\n");
        out
    }

    fn write_graph(&self, out: &mut String, graph: &FlowGraph, prefix: &str, depth: usize) {
        let pad = "  ".repeat(depth);

        for (id, vertex) in graph.vertices() {
            let node = format!("{}_{}", prefix, id.index());
            match vertex.kind() {
                VertexKind::Chain {
                    special, truncated, ..
                } => {
                    let shape = if *special { "octagon" } else { "box" };
                    let style = if *truncated { ", style=dashed" } else { "" };
                    let _ = writeln!(
                        out,
                        "{}{} [shape={}{}, label=\"{}\"];",
                        pad,
                        node,
                        shape,
                        style,
                        escape(vertex.name())
                    );
                }
                VertexKind::Rule { rule } => {
                    let rule = self.ruleset.rule(*rule);
                    let label = format!(
                        "⇒{}|{}|{}⇒",
                        escape_record(rule.in_interface(), false),
                        escape_record(vertex.name(), true),
                        escape_record(rule.out_interface(), false)
                    );
                    let tooltip = rule
                        .comment()
                        .map(|c| format!(", tooltip=\"{}\"", escape(c)))
                        .unwrap_or_default();
                    let _ = writeln!(
                        out,
                        "{}{} [shape=record, style=filled, fillcolor=beige, label=\"{}\"{}];",
                        pad, node, label, tooltip
                    );
                }
                VertexKind::RuleSubgraph { graph: inner, .. } => {
                    let _ = writeln!(out, "{}subgraph cluster_{} {{", pad, node);
                    let _ = writeln!(out, "{}  label=\"{}\";", pad, escape(vertex.name()));
                    out.push_str(&pad);
                    out.push_str("  style=dashed;\n");
                    // anchor for edges that enter or leave the cluster
                    let _ = writeln!(out, "{}  {} [shape=point, style=invis];", pad, node);
                    self.write_graph(out, inner, &node, depth + 1);
                    let _ = writeln!(out, "{}}}", pad);
                }
            }
        }

        for edge in graph.edges() {
            let from = format!("{}_{}", prefix, edge.from.index());
            let to = format!("{}_{}", prefix, edge.to.index());

            let mut attrs = Vec::new();
            if graph.vertex(edge.from).class() == VertexClass::RuleSubgraph {
                attrs.push(format!("ltail=cluster_{}", from));
            }
            if graph.vertex(edge.to).class() == VertexClass::RuleSubgraph {
                attrs.push(format!("lhead=cluster_{}", to));
            }
            match edge.kind {
                EdgeKind::Next => {}
                EdgeKind::Rules => attrs.push("arrowhead=empty".to_string()),
                EdgeKind::Jump => attrs.push("label=\"jump\", color=blue".to_string()),
                EdgeKind::Goto => attrs.push("label=\"goto\", color=darkgreen, style=dashed".to_string()),
            }

            if attrs.is_empty() {
                let _ = writeln!(out, "{}{} -> {};", pad, from, to);
            } else {
                let _ = writeln!(out, "{}{} -> {} [{}];", pad, from, to, attrs.join(", "));
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

// Record labels treat `{ } < > |` as structure; `|` in rule names is kept as
// a field separator on purpose.
fn escape_record(text: &str, keep_fields: bool) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '|' if keep_fields => escaped.push(c),
            '{' | '}' | '<' | '>' | '|' | '"' | '\\' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}
