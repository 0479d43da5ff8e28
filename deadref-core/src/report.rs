//! Output formatting - plaintext, JSON, and Graphviz DOT.

use std::collections::HashSet;

use serde_json::json;

use crate::builder::AnalysisResult;
use crate::manager::GraphManager;
use crate::names;

/// Prints an analysis result in plain text format.
pub fn print_plain(result: &AnalysisResult) {
    if result.dead.is_empty() {
        println!("No dead declarations found.");
    } else {
        println!("DEAD DECLARATIONS ({}):", result.dead.len());
        for item in &result.dead {
            println!("- {} {} ({})", item.kind, item.name, item.reason);
        }
    }
    if !result.can_be_static.is_empty() {
        println!("CAN BE STATIC ({}):", result.can_be_static.len());
        for s in &result.can_be_static {
            println!("- {} {}", s.kind, s.name);
        }
    }
    if !result.can_be_final.is_empty() {
        println!("CAN BE FINAL ({}):", result.can_be_final.len());
        for s in &result.can_be_final {
            println!("- {} {}", s.kind, s.name);
        }
    }
}

/// Prints an analysis result in JSON format.
///
/// Falls back to a minimal summary if serialization fails (should never
/// happen with these types, but all cases are handled).
pub fn print_json(result: &AnalysisResult) {
    let value = json!({
        "stats": result.stats,
        "dead": result.dead,
        "can_be_static": result.can_be_static,
        "can_be_final": result.can_be_final,
    });
    match serde_json::to_string_pretty(&value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("[WARN] JSON serialization failed: {}", e);
            println!("{{\"dead_count\": {}}}", result.dead.len());
        }
    }
}

/// Export the reference graph in DOT (Graphviz) format.
///
/// Dead declarations are filled red; entry points light blue.
pub fn to_dot(g: &GraphManager, dead_names: &HashSet<String>) -> String {
    let mut dot = String::from("digraph RefGraph {\n");
    dot.push_str("    rankdir=LR;\n");
    dot.push_str("    node [shape=box, fontname=\"monospace\"];\n\n");

    let mut nodes: Vec<_> = g
        .iter()
        .filter_map(|(id, node)| Some((names::external_name(g, id)?, id, node)))
        .collect();
    nodes.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, _, node) in &nodes {
        let color = if dead_names.contains(name.as_str()) {
            "salmon"
        } else if node.is_entry() {
            "lightblue"
        } else {
            "white"
        };
        dot.push_str(&format!(
            "    \"{}\" [style=filled fillcolor={}];\n",
            name, color
        ));
    }

    dot.push('\n');

    for (name, _, node) in &nodes {
        let mut targets: Vec<String> = node
            .out_edges
            .iter()
            .filter_map(|&t| names::external_name(g, t))
            .collect();
        targets.sort();
        for target in targets {
            dot.push_str(&format!("    \"{}\" -> \"{}\";\n", name, target));
        }
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Deadref;
    use crate::model::{Access, ModelBuilder};

    fn sample() -> Deadref {
        let mut b = ModelBuilder::new();
        let pkg = b.package("p");
        let class = b.class(pkg, "A");
        let main = b.method(class, "main");
        b.method_mut(main).main_like = true;
        let used = b.method(class, "used");
        b.access(main, Access::call(used));
        let _dead = b.method(class, "dead");
        Deadref::new(b.finish())
    }

    #[test]
    fn test_to_dot_structure() {
        let deadref = sample();
        let g = deadref.graph();
        let result = deadref.analyze().unwrap();
        let dead_names: HashSet<String> = result.dead.iter().map(|d| d.name.clone()).collect();
        let dot = to_dot(&g, &dead_names);

        assert!(dot.contains("digraph RefGraph"));
        assert!(dot.contains("\"p.A.main()\" -> \"p.A.used()\";"));
        assert!(dot.contains("\"p.A.dead()\" [style=filled fillcolor=salmon];"));
        assert!(dot.ends_with("}\n"));
    }

    #[test]
    fn test_json_report_shape() {
        let result = sample().analyze().unwrap();
        let value = json!({
            "stats": result.stats,
            "dead": result.dead,
        });
        assert!(value["dead"].is_array());
        assert!(value["stats"]["total_nodes"].as_u64().unwrap() > 0);
    }
}
