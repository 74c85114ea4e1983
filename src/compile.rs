mod parse;

pub use parse::Parser;

use crate::{
    dom::{Dom, NodeId, NodeKind, Walk},
    log::{error_malformed_binding, Error, INVALID_BINDING, UNEXPECTED_MARKUP},
    marker::{Marker, BOUND_ATTRIBUTE_SUFFIX, LAST_ATTRIBUTE_NAME},
    template::{Description, MarkupKind, Strings},
};

/// A template compiled to a detached tree and the locations of its bindings.
///
/// The tree is never rendered directly; each render imports a fresh copy
/// into the live tree and binds parts at the recorded walk positions.
#[derive(Debug)]
pub struct CompiledTemplate {
    /// The arena holding the prototype tree.
    pub dom: Dom,
    /// The root fragment of the prototype tree.
    pub root: NodeId,
    /// Binding locations in document order.
    pub parts: Vec<StaticPart>,
    /// The chunks this template was compiled from, kept so the shared
    /// allocation stays pinned for identity caching.
    pub strings: Strings,
}

/// The location and shape of one binding in a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticPart {
    /// Position of the anchor node in a depth-first walk of the tree, or
    /// `None` when the binding is inactive and consumes a value without
    /// rendering it.
    pub index: Option<usize>,
    pub kind: StaticPartKind,
}

/// Distinguishes bindings at node position from bindings inside a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum StaticPartKind {
    /// The binding controls content between two nodes.
    Node,
    /// The binding controls an attribute of an element.
    Attribute {
        /// The authored attribute name, case preserved.
        name: String,
        /// The literal pieces around each binding in the value.
        strings: Vec<String>,
    },
}

impl StaticPart {
    fn node(index: usize) -> Self {
        Self {
            index: Some(index),
            kind: StaticPartKind::Node,
        }
    }

    fn inactive() -> Self {
        Self {
            index: None,
            kind: StaticPartKind::Node,
        }
    }
}

/// Compile the given description's static chunks into a prototype tree.
///
/// # Errors
///
/// Returns an [`Error`] when the joined source does not parse, or when a
/// binding cannot be located in the parsed tree.
pub fn compile(description: &Description) -> Result<CompiledTemplate, Error> {
    let source = joined_source(&description.strings);
    let (mut dom, root) = match description.kind {
        MarkupKind::Markup => Parser::new(&source).parse()?,
        MarkupKind::Vector => {
            let wrapped = format!("<svg>{source}</svg>");
            let (mut dom, root) = Parser::new(&wrapped).parse()?;
            unwrap_vector(&mut dom, root);

            (dom, root)
        }
    };
    let parts = record_parts(
        &mut dom,
        root,
        &description.strings,
        description.values.len(),
        &source,
    )?;
    tracing::trace!(bindings = parts.len(), "recorded template bindings");

    Ok(CompiledTemplate {
        dom,
        root,
        parts,
        strings: description.strings.clone(),
    })
}

/// Join static chunks into parseable source, substituting a marker at
/// each binding position.
///
/// A chunk ending inside an attribute assignment gets the bare token at
/// the end of a suffixed attribute name, a chunk ending inside an open
/// comment gets the padded token, and every other chunk gets the token
/// wrapped in a comment node.
pub fn joined_source(strings: &Strings) -> String {
    let marker = Marker::get();
    let chunks = strings.chunks();
    let Some((last, rest)) = chunks.split_last() else {
        return String::new();
    };

    let mut source = String::new();
    let mut in_comment = false;
    for chunk in rest {
        let open = chunk.rfind("<!--");
        let search_from = open.map_or(0, |at| at + 1);
        in_comment = (open.is_some() || in_comment) && !chunk[search_from..].contains("-->");

        match LAST_ATTRIBUTE_NAME.captures(chunk) {
            Some(captures) => {
                let whole = captures.get(0).expect("capture zero is the whole match");
                source.push_str(&chunk[..whole.start()]);
                source.push_str(&captures[1]);
                source.push_str(&captures[2]);
                source.push_str(BOUND_ATTRIBUTE_SUFFIX);
                source.push_str(&captures[3]);
                source.push_str(marker.token());
            }
            None => {
                source.push_str(chunk);
                source.push_str(if in_comment {
                    marker.comment()
                } else {
                    marker.node()
                });
            }
        }
    }
    source.push_str(last);

    source
}

/// Lift the children of the vector wrapper element up to the root and
/// discard the wrapper.
fn unwrap_vector(dom: &mut Dom, root: NodeId) {
    let wrapper = dom
        .first_child(root)
        .expect("vector source parses inside a wrapper element");
    while let Some(child) = dom.first_child(wrapper) {
        dom.insert_before(root, child, Some(wrapper));
    }
    dom.remove(wrapper);
}

enum Visited {
    Element,
    Text(String),
    Comment(String),
}

/// Walk the parsed tree and record a [`StaticPart`] for every marker,
/// rewriting marker nodes into stable anchors as it goes.
fn record_parts(
    dom: &mut Dom,
    root: NodeId,
    strings: &Strings,
    value_count: usize,
    source: &str,
) -> Result<Vec<StaticPart>, Error> {
    let marker = Marker::get();
    let chunks = strings.chunks();
    let mut parts = Vec::new();
    let mut to_remove = Vec::new();
    let mut walk = Walk::new(root);

    // Walk position of the current node; inserted anchors shift it so it
    // always reflects a walk of the finished tree.
    let mut index: isize = -1;
    // Walk position of the most recent node binding's anchor.
    let mut last_part_index: isize = 0;
    // Bindings located so far, and the next chunk of interest.
    let mut part_index = 0;

    while part_index < value_count {
        let Some(node) = walk.next(dom) else {
            return Err(Error::build(UNEXPECTED_MARKUP)
                .with_pointer(source, 0..source.len().min(1))
                .with_help(
                    "the tree ended before every binding was located, are bindings \
                    placed in unparsed positions such as tag names?",
                ));
        };
        index += 1;

        let visited = match dom.kind(node) {
            NodeKind::Element(_) => Visited::Element,
            NodeKind::Text(data) => Visited::Text(data.clone()),
            NodeKind::Comment(data) => Visited::Comment(data.clone()),
            NodeKind::Fragment => continue,
        };

        match visited {
            Visited::Element => {
                let mut count = dom
                    .attributes(node)
                    .iter()
                    .filter(|(name, _)| name.ends_with(BOUND_ATTRIBUTE_SUFFIX))
                    .count();
                while count > 0 {
                    count -= 1;
                    let chunk = &chunks[part_index];
                    let captures = LAST_ATTRIBUTE_NAME
                        .captures(chunk)
                        .ok_or_else(|| error_malformed_binding(chunk))?;
                    let name = captures[2].to_string();
                    let lookup = format!("{}{BOUND_ATTRIBUTE_SUFFIX}", name.to_ascii_lowercase());
                    let value = dom
                        .attribute(node, &lookup)
                        .map(str::to_string)
                        .ok_or_else(|| error_malformed_binding(chunk))?;
                    dom.remove_attribute(node, &lookup);

                    let statics = marker.split_text(&value);
                    if statics.len() < 2 {
                        return Err(Error::build(INVALID_BINDING).with_help(format!(
                            "attribute `{name}` lost its binding while parsing"
                        )));
                    }
                    part_index += statics.len() - 1;
                    parts.push(StaticPart {
                        index: Some(index as usize),
                        kind: StaticPartKind::Attribute {
                            name,
                            strings: statics,
                        },
                    });
                }
            }
            Visited::Text(data) => {
                if !marker.is_in(&data) {
                    continue;
                }
                let parent = dom.parent(node).expect("walked nodes have parents");
                let pieces = marker.split_text(&data);
                let last = pieces.len() - 1;
                for piece in &pieces[..last] {
                    let insert = if piece.is_empty() {
                        dom.create_comment("")
                    } else {
                        let restored = restore_authored_text(piece);
                        dom.create_text(&restored)
                    };
                    dom.insert_before(parent, insert, Some(node));
                    index += 1;
                    parts.push(StaticPart::node(index as usize));
                }
                if pieces[last].is_empty() {
                    let anchor = dom.create_comment("");
                    dom.insert_before(parent, anchor, Some(node));
                    to_remove.push(node);
                } else {
                    dom.set_text(node, &pieces[last]);
                }
                part_index += last;
            }
            Visited::Comment(data) => {
                if data == marker.token() {
                    let parent = dom.parent(node).expect("walked nodes have parents");
                    if dom.previous_sibling(node).is_none() || index == last_part_index {
                        index += 1;
                        let anchor = dom.create_comment("");
                        dom.insert_before(parent, anchor, Some(node));
                    }
                    last_part_index = index;
                    parts.push(StaticPart::node(index as usize));

                    // A trailing marker doubles as its own end anchor, any
                    // other is removed once the walk no longer needs it.
                    if dom.next_sibling(node).is_none() {
                        dom.set_text(node, "");
                    } else {
                        to_remove.push(node);
                        index -= 1;
                    }
                    part_index += 1;
                } else {
                    for _ in 0..data.matches(marker.token()).count() {
                        parts.push(StaticPart::inactive());
                        part_index += 1;
                    }
                }
            }
        }
    }

    for node in to_remove {
        dom.remove(node);
    }

    Ok(parts)
}

/// Undo the attribute name suffixing inside raw text, where the joined
/// source substitution applies but no attribute exists.
fn restore_authored_text(piece: &str) -> String {
    match LAST_ATTRIBUTE_NAME.captures(piece) {
        Some(captures) if captures[2].ends_with(BOUND_ATTRIBUTE_SUFFIX) => {
            let whole = captures.get(0).expect("capture zero is the whole match");
            let name = &captures[2];
            let stripped = &name[..name.len() - BOUND_ATTRIBUTE_SUFFIX.len()];

            format!(
                "{}{}{stripped}{}",
                &piece[..whole.start()],
                &captures[1],
                &captures[3]
            )
        }
        _ => piece.to_string(),
    }
}
