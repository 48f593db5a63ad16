use std::collections::HashSet;
use std::io;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::query::QueryResult;

const GRAPHML_NS: &str = "http://graphml.graphdrawing.org/xmlns";

/// (key id, domain) pairs declared in the header; every value is a string.
const KEYS: &[(&str, &str)] = &[
    ("kind", "node"),
    ("qualified_name", "node"),
    ("language", "node"),
    ("file", "node"),
    ("line", "node"),
    ("http_method", "node"),
    ("http_path", "node"),
    ("edge_kind", "edge"),
];

/// Render a query result as a GraphML document for yEd, Gephi and friends.
///
/// Node ids are the graph's stable ids. Edges leaving the result are skipped.
pub fn render_graphml(result: &QueryResult) -> io::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(
        BytesStart::new("graphml").with_attributes([("xmlns", GRAPHML_NS)]),
    ))?;
    for (id, domain) in KEYS {
        writer.write_event(Event::Empty(BytesStart::new("key").with_attributes([
            ("id", *id),
            ("for", *domain),
            ("attr.name", *id),
            ("attr.type", "string"),
        ])))?;
    }
    writer.write_event(Event::Start(
        BytesStart::new("graph").with_attributes([("id", "G"), ("edgedefault", "directed")]),
    ))?;

    let mut ids: HashSet<&str> = HashSet::new();
    for node in &result.nodes {
        ids.insert(node.id.as_str());
        writer.write_event(Event::Start(
            BytesStart::new("node").with_attributes([("id", node.id.as_str())]),
        ))?;
        data(&mut writer, "kind", node.kind.as_str())?;
        data(&mut writer, "qualified_name", &node.qualified_name)?;
        data(&mut writer, "language", node.language.as_str())?;
        data(&mut writer, "file", &node.file)?;
        data(&mut writer, "line", &node.span.start_line.to_string())?;
        if let Some(http) = &node.extras.http {
            data(&mut writer, "http_method", &http.method)?;
            data(&mut writer, "http_path", &http.path)?;
        }
        writer.write_event(Event::End(BytesEnd::new("node")))?;
    }

    let edges = result
        .edges
        .iter()
        .filter(|e| ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()));
    for (i, edge) in edges.enumerate() {
        let id = format!("e{i}");
        writer.write_event(Event::Start(BytesStart::new("edge").with_attributes([
            ("id", id.as_str()),
            ("source", edge.source.as_str()),
            ("target", edge.target.as_str()),
        ])))?;
        data(&mut writer, "edge_kind", edge.kind.as_str())?;
        writer.write_event(Event::End(BytesEnd::new("edge")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("graph")))?;
    writer.write_event(Event::End(BytesEnd::new("graphml")))?;
    String::from_utf8(writer.into_inner()).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn data(writer: &mut Writer<Vec<u8>>, key: &str, value: &str) -> io::Result<()> {
    writer.write_event(Event::Start(
        BytesStart::new("data").with_attributes([("key", key)]),
    ))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new("data")))
}
