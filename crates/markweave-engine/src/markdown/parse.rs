use std::ops::Range;

use pulldown_cmark::{CodeBlockKind, Event, LinkType, Options, Parser, Tag};
use tracing::warn;

use crate::error::ParseAbort;
use crate::model::{attrs, AttrValue, Attrs, Mark, Node};
use crate::schema::Schema;

/// Upper bound on constructed nodes per parse. Exhausting it triggers the
/// catastrophic fallback instead of an unbounded allocation; tests use a tiny
/// budget to force that path.
pub const DEFAULT_NODE_BUDGET: usize = 1_000_000;

/// Parse markdown text into a document tree. Never fails: inputs the
/// assembler cannot handle come back as the warning-plus-code-block fallback
/// document with the original text intact.
pub fn parse(schema: &Schema, text: &str) -> Node {
    parse_with_budget(schema, text, DEFAULT_NODE_BUDGET)
}

/// [`parse`] with an explicit node budget.
pub fn parse_with_budget(schema: &Schema, text: &str, budget: usize) -> Node {
    match try_parse(schema, text, budget) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(%err, "markdown parse failed, preserving original text verbatim");
            fallback_document(schema, text)
        }
    }
}

/// The recovery document: a warning heading followed by one code block
/// holding the unmodified input.
fn fallback_document(schema: &Schema, text: &str) -> Node {
    let heading = schema
        .node(
            "heading",
            Some(attrs([("level", 1)])),
            vec![schema.text("Unable to parse document, original text preserved below")],
            vec![],
        )
        .expect("fallback heading is schema-valid");
    let code = schema
        .node("code_block", None, vec![schema.text(text)], vec![])
        .expect("fallback code block is schema-valid");
    schema
        .node("doc", None, vec![heading, code], vec![])
        .expect("fallback document is schema-valid")
}

fn try_parse(schema: &Schema, text: &str, budget: usize) -> Result<Node, ParseAbort> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut builder = TreeBuilder {
        schema,
        source: text,
        openers: Vec::new(),
        doc_children: Vec::new(),
        budget,
        budget_limit: budget,
    };
    for (event, range) in Parser::new_ext(text, options).into_offset_iter() {
        builder.event(event, range)?;
    }
    builder.finish()
}

/// A block node under construction.
struct Frame {
    type_name: String,
    attrs: Attrs,
    children: Vec<Node>,
    /// Frames the builder conjured itself (paragraphs in tight list items,
    /// the table body wrapper) close automatically when their host ends.
    implicit: bool,
    /// Accumulated literal text for code and raw-HTML blocks.
    literal: String,
    /// Source item numbers observed in an ordered list.
    numbers: Vec<i64>,
    /// Per-column alignment for a table, from the separator row.
    aligns: Vec<String>,
    tight: bool,
}

impl Frame {
    fn new(type_name: &str) -> Self {
        Frame {
            type_name: type_name.to_string(),
            attrs: Attrs::new(),
            children: Vec::new(),
            implicit: false,
            literal: String::new(),
            numbers: Vec::new(),
            aligns: Vec::new(),
            tight: true,
        }
    }

    fn implicit(type_name: &str) -> Self {
        Frame {
            implicit: true,
            ..Frame::new(type_name)
        }
    }
}

/// An image whose alt text is still being collected.
struct ImageFrame {
    attrs: Attrs,
    alt: String,
}

enum Opener {
    Frame(Frame),
    Mark(Mark),
    Image(ImageFrame),
}

struct TreeBuilder<'a> {
    schema: &'a Schema,
    source: &'a str,
    openers: Vec<Opener>,
    doc_children: Vec<Node>,
    budget: usize,
    budget_limit: usize,
}

impl TreeBuilder<'_> {
    fn event(&mut self, event: Event<'_>, range: Range<usize>) -> Result<(), ParseAbort> {
        match event {
            Event::Start(tag) => self.start(tag, range),
            Event::End(_) => self.end(),
            Event::Text(text) => self.text(&text),
            Event::Code(text) => self.code_span(&text, range),
            Event::Html(html) => {
                if let Some(frame) = self.nearest_frame_mut() {
                    frame.literal.push_str(&html);
                }
                Ok(())
            }
            Event::InlineHtml(html) => {
                self.ensure_inline_host()?;
                let marks = self.active_marks();
                let node = self.make_node(
                    "html_inline",
                    Some(attrs([("html", &*html)])),
                    vec![],
                    marks,
                )?;
                self.attach(node)
            }
            Event::SoftBreak => {
                self.ensure_inline_host()?;
                let marks = self.active_marks();
                self.charge()?;
                self.attach(self.schema.text_marked("\n", marks))
            }
            Event::HardBreak => {
                self.ensure_inline_host()?;
                let markup = if self.source[range].contains('\\') {
                    "\\"
                } else {
                    "spaces"
                };
                let marks = self.active_marks();
                let node =
                    self.make_node("hard_break", Some(attrs([("markup", markup)])), vec![], marks)?;
                self.attach(node)
            }
            Event::Rule => {
                self.close_implicit_paragraphs()?;
                let markup = self.source[range].trim().to_string();
                let node = self.make_node(
                    "horizontal_rule",
                    Some(attrs([("markup", markup.as_str())])),
                    vec![],
                    vec![],
                )?;
                self.attach(node)
            }
            // Extensions that are not enabled cannot produce events; anything
            // unexpected aborts into the fallback document.
            _ => Err(ParseAbort::Unbalanced),
        }
    }

    fn start(&mut self, tag: Tag<'_>, range: Range<usize>) -> Result<(), ParseAbort> {
        match tag {
            Tag::Paragraph => {
                self.close_implicit_paragraphs()?;
                self.mark_enclosing_list_loose();
                self.openers.push(Opener::Frame(Frame::new("paragraph")));
            }
            Tag::Heading { level, .. } => {
                self.close_implicit_paragraphs()?;
                let markup = if self.source[range].starts_with('#') {
                    "atx"
                } else {
                    "setext"
                };
                let mut frame = Frame::new("heading");
                frame.attrs = attrs([
                    ("level", AttrValue::Int(level as i64)),
                    ("markup", AttrValue::from(markup)),
                ]);
                self.openers.push(Opener::Frame(frame));
            }
            Tag::BlockQuote(_) => {
                self.close_implicit_paragraphs()?;
                self.openers.push(Opener::Frame(Frame::new("blockquote")));
            }
            Tag::CodeBlock(kind) => {
                self.close_implicit_paragraphs()?;
                let mut frame = Frame::new("code_block");
                frame.attrs = match kind {
                    CodeBlockKind::Fenced(info) => {
                        let fence: String = self.source[range]
                            .chars()
                            .take_while(|&c| c == '`' || c == '~')
                            .collect();
                        attrs([("info", &*info), ("markup", fence.as_str())])
                    }
                    CodeBlockKind::Indented => attrs([("info", ""), ("markup", "indent")]),
                };
                self.openers.push(Opener::Frame(frame));
            }
            Tag::List(start) => {
                self.close_implicit_paragraphs()?;
                let mut frame = match start {
                    Some(n) => {
                        let mut f = Frame::new("ordered_list");
                        f.attrs.insert("start".into(), AttrValue::Int(n as i64));
                        f
                    }
                    None => Frame::new("bullet_list"),
                };
                frame.tight = true;
                self.openers.push(Opener::Frame(frame));
            }
            Tag::Item => {
                self.close_implicit_paragraphs()?;
                let src = &self.source[range];
                if let Some(Opener::Frame(list)) = self.openers.last_mut() {
                    if list.type_name == "ordered_list" {
                        let digits: String =
                            src.chars().take_while(char::is_ascii_digit).collect();
                        if let Ok(n) = digits.parse::<i64>() {
                            list.numbers.push(n);
                        }
                        if list.numbers.len() == 1 {
                            let delim = src[digits.len()..].chars().next().unwrap_or('.');
                            list.attrs
                                .insert("delim".into(), AttrValue::from(delim.to_string()));
                        }
                    } else if list.type_name == "bullet_list" && list.children.is_empty() {
                        let bullet = src.chars().next().unwrap_or('-');
                        list.attrs
                            .insert("bullet".into(), AttrValue::from(bullet.to_string()));
                    }
                }
                self.openers.push(Opener::Frame(Frame::new("list_item")));
            }
            Tag::Table(aligns) => {
                self.close_implicit_paragraphs()?;
                let mut frame = Frame::new("table");
                frame.aligns = aligns
                    .iter()
                    .map(|a| {
                        match a {
                            pulldown_cmark::Alignment::Left => "left",
                            pulldown_cmark::Alignment::Center => "center",
                            pulldown_cmark::Alignment::Right => "right",
                            pulldown_cmark::Alignment::None => "",
                        }
                        .to_string()
                    })
                    .collect();
                self.openers.push(Opener::Frame(frame));
            }
            Tag::TableHead => {
                self.openers.push(Opener::Frame(Frame::new("table_head")));
            }
            Tag::TableRow => {
                if self
                    .nearest_frame()
                    .is_some_and(|f| f.type_name == "table")
                {
                    self.openers
                        .push(Opener::Frame(Frame::implicit("table_body")));
                }
                self.openers.push(Opener::Frame(Frame::new("table_row")));
            }
            Tag::TableCell => {
                let in_head = self
                    .nearest_frame()
                    .is_some_and(|f| f.type_name == "table_head");
                let index = self.nearest_frame().map(|f| f.children.len()).unwrap_or(0);
                let align = self
                    .table_aligns()
                    .get(index)
                    .cloned()
                    .unwrap_or_default();
                let mut frame = Frame::new(if in_head { "table_header" } else { "table_cell" });
                frame.attrs.insert("align".into(), AttrValue::from(align));
                self.openers.push(Opener::Frame(frame));
            }
            Tag::HtmlBlock => {
                self.close_implicit_paragraphs()?;
                self.openers.push(Opener::Frame(Frame::new("html_block")));
            }
            Tag::Emphasis => {
                self.ensure_inline_host()?;
                let markup = self.source[range].chars().next().unwrap_or('*').to_string();
                let mark = self
                    .schema
                    .mark("em", Some(attrs([("markup", markup.as_str())])))?;
                self.openers.push(Opener::Mark(mark));
            }
            Tag::Strong => {
                self.ensure_inline_host()?;
                let markup: String = self.source[range].chars().take(2).collect();
                let mark = self
                    .schema
                    .mark("strong", Some(attrs([("markup", markup.as_str())])))?;
                self.openers.push(Opener::Mark(mark));
            }
            Tag::Strikethrough => {
                self.ensure_inline_host()?;
                let mark = self.schema.mark("strike", None)?;
                self.openers.push(Opener::Mark(mark));
            }
            Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            } => {
                self.ensure_inline_host()?;
                let mark = self.schema.mark(
                    "link",
                    Some(attrs([
                        ("href", &*dest_url),
                        ("title", &*title),
                        ("markup", link_markup(link_type)),
                        ("ref_label", &*id),
                    ])),
                )?;
                self.openers.push(Opener::Mark(mark));
            }
            Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            } => {
                self.ensure_inline_host()?;
                self.openers.push(Opener::Image(ImageFrame {
                    attrs: attrs([
                        ("src", &*dest_url),
                        ("title", &*title),
                        ("markup", link_markup(link_type)),
                        ("ref_label", &*id),
                    ]),
                    alt: String::new(),
                }));
            }
            _ => return Err(ParseAbort::Unbalanced),
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), ParseAbort> {
        self.close_implicit_paragraphs()?;
        while matches!(self.openers.last(), Some(Opener::Frame(f)) if f.implicit) {
            self.close_frame()?;
        }
        match self.openers.last() {
            Some(Opener::Frame(_)) => self.close_frame(),
            Some(Opener::Mark(_)) => {
                self.openers.pop();
                Ok(())
            }
            Some(Opener::Image(_)) => {
                let Some(Opener::Image(image)) = self.openers.pop() else {
                    unreachable!()
                };
                let mut image_attrs = image.attrs;
                image_attrs.insert("alt".into(), AttrValue::from(image.alt));
                let marks = self.active_marks();
                let node = self.make_node("image", Some(image_attrs), vec![], marks)?;
                self.attach(node)
            }
            None => Err(ParseAbort::Unbalanced),
        }
    }

    /// Pop the top frame, finish its node, and attach it to its parent.
    fn close_frame(&mut self) -> Result<(), ParseAbort> {
        let Some(Opener::Frame(frame)) = self.openers.pop() else {
            return Err(ParseAbort::Unbalanced);
        };
        let node = match frame.type_name.as_str() {
            "code_block" => {
                let mut literal = frame.literal;
                if literal.ends_with('\n') {
                    literal.pop();
                }
                let text = if literal.is_empty() {
                    vec![]
                } else {
                    self.charge()?;
                    vec![self.schema.text(literal)]
                };
                self.make_node("code_block", Some(frame.attrs), text, vec![])?
            }
            "html_block" => {
                let literal = frame.literal.trim_end_matches('\n').to_string();
                self.make_node(
                    "html_block",
                    Some(attrs([("html", literal.as_str())])),
                    vec![],
                    vec![],
                )?
            }
            "table_head" => {
                // The head's cells arrive without a row wrapper.
                let row = self.make_node("table_row", None, frame.children, vec![])?;
                self.make_node("table_head", None, vec![row], vec![])?
            }
            "table_row" => {
                let width = self.table_aligns().len();
                let mut cells = frame.children;
                cells.truncate(width.max(1));
                while cells.len() < width {
                    self.charge()?;
                    cells.push(
                        self.schema
                            .make_default("table_cell")
                            .map_err(ParseAbort::Model)?,
                    );
                }
                self.make_node("table_row", None, cells, vec![])?
            }
            "list_item" => {
                let mut children = frame.children;
                if children.is_empty() {
                    self.charge()?;
                    children.push(
                        self.schema
                            .make_default("paragraph")
                            .map_err(ParseAbort::Model)?,
                    );
                }
                self.make_node("list_item", None, children, vec![])?
            }
            "ordered_list" => {
                let mut list_attrs = frame.attrs;
                let repeated = frame.numbers.len() > 1
                    && frame.numbers.windows(2).all(|w| w[0] == w[1]);
                list_attrs.insert(
                    "numbering".into(),
                    AttrValue::from(if repeated { "repeat" } else { "sequence" }),
                );
                list_attrs.insert("tight".into(), AttrValue::Bool(frame.tight));
                self.make_node("ordered_list", Some(list_attrs), frame.children, vec![])?
            }
            "bullet_list" => {
                let mut list_attrs = frame.attrs;
                list_attrs.insert("tight".into(), AttrValue::Bool(frame.tight));
                self.make_node("bullet_list", Some(list_attrs), frame.children, vec![])?
            }
            other => {
                let type_name = other.to_string();
                self.make_node(&type_name, Some(frame.attrs), frame.children, vec![])?
            }
        };
        self.attach(node)
    }

    fn text(&mut self, text: &str) -> Result<(), ParseAbort> {
        if let Some(image) = self.innermost_image_mut() {
            image.alt.push_str(text);
            return Ok(());
        }
        if self
            .nearest_frame()
            .is_some_and(|f| matches!(f.type_name.as_str(), "code_block" | "html_block"))
        {
            if let Some(frame) = self.nearest_frame_mut() {
                frame.literal.push_str(text);
            }
            return Ok(());
        }
        self.ensure_inline_host()?;
        let marks = self.active_marks();
        self.charge()?;
        self.attach(self.schema.text_marked(text, marks))
    }

    fn code_span(&mut self, text: &str, range: Range<usize>) -> Result<(), ParseAbort> {
        if let Some(image) = self.innermost_image_mut() {
            image.alt.push_str(text);
            return Ok(());
        }
        self.ensure_inline_host()?;
        let fence: String = self.source[range]
            .chars()
            .take_while(|&c| c == '`')
            .collect();
        let mut marks = self.active_marks();
        marks.push(
            self.schema
                .mark("code", Some(attrs([("markup", fence.as_str())])))?,
        );
        self.charge()?;
        self.attach(self.schema.text_marked(text, marks))
    }

    /// Conjure a paragraph when inline content arrives inside a block
    /// container that only takes block children (tight list items).
    fn ensure_inline_host(&mut self) -> Result<(), ParseAbort> {
        let accepts = self.nearest_frame().is_some_and(|f| {
            matches!(
                f.type_name.as_str(),
                "paragraph" | "heading" | "table_cell" | "table_header" | "code_block"
            )
        });
        if !accepts {
            self.openers
                .push(Opener::Frame(Frame::implicit("paragraph")));
        }
        Ok(())
    }

    fn close_implicit_paragraphs(&mut self) -> Result<(), ParseAbort> {
        while matches!(
            self.openers.last(),
            Some(Opener::Frame(f)) if f.implicit && f.type_name == "paragraph"
        ) {
            self.close_frame()?;
        }
        Ok(())
    }

    /// A paragraph event inside a list item means the tokenizer saw a loose
    /// list.
    fn mark_enclosing_list_loose(&mut self) {
        let mut above_item = false;
        for opener in self.openers.iter_mut().rev() {
            if let Opener::Frame(frame) = opener {
                if !above_item {
                    if frame.type_name == "list_item" {
                        above_item = true;
                        continue;
                    }
                    return;
                }
                if frame.type_name == "bullet_list" || frame.type_name == "ordered_list" {
                    frame.tight = false;
                }
                return;
            }
        }
    }

    fn nearest_frame(&self) -> Option<&Frame> {
        self.openers.iter().rev().find_map(|o| match o {
            Opener::Frame(f) => Some(f),
            _ => None,
        })
    }

    fn nearest_frame_mut(&mut self) -> Option<&mut Frame> {
        self.openers.iter_mut().rev().find_map(|o| match o {
            Opener::Frame(f) => Some(f),
            _ => None,
        })
    }

    fn innermost_image_mut(&mut self) -> Option<&mut ImageFrame> {
        for opener in self.openers.iter_mut().rev() {
            match opener {
                Opener::Mark(_) => continue,
                Opener::Image(image) => return Some(image),
                Opener::Frame(_) => return None,
            }
        }
        None
    }

    /// Aligns of the innermost open table.
    fn table_aligns(&self) -> Vec<String> {
        self.openers
            .iter()
            .rev()
            .find_map(|o| match o {
                Opener::Frame(f) if f.type_name == "table" => Some(f.aligns.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Open marks, outermost first, preserving the source nesting order.
    fn active_marks(&self) -> Vec<Mark> {
        self.openers
            .iter()
            .filter_map(|o| match o {
                Opener::Mark(mark) => Some(mark.clone()),
                _ => None,
            })
            .collect()
    }

    fn make_node(
        &mut self,
        type_name: &str,
        node_attrs: Option<Attrs>,
        children: Vec<Node>,
        marks: Vec<Mark>,
    ) -> Result<Node, ParseAbort> {
        self.charge()?;
        Ok(self.schema.node(type_name, node_attrs, children, marks)?)
    }

    fn charge(&mut self) -> Result<(), ParseAbort> {
        if self.budget == 0 {
            return Err(ParseAbort::BudgetExhausted(self.budget_limit));
        }
        self.budget -= 1;
        Ok(())
    }

    fn attach(&mut self, node: Node) -> Result<(), ParseAbort> {
        match self.nearest_frame_mut() {
            Some(frame) => frame.children.push(node),
            None => self.doc_children.push(node),
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Node, ParseAbort> {
        self.close_implicit_paragraphs()?;
        if !self.openers.is_empty() {
            return Err(ParseAbort::Unbalanced);
        }
        let mut children = std::mem::take(&mut self.doc_children);
        if children.is_empty() {
            self.charge()?;
            children.push(
                self.schema
                    .make_default("paragraph")
                    .map_err(ParseAbort::Model)?,
            );
        }
        self.charge()?;
        Ok(self.schema.node("doc", None, children, vec![])?)
    }
}

fn link_markup(link_type: LinkType) -> &'static str {
    match link_type {
        LinkType::Inline => "inline",
        LinkType::Reference | LinkType::ReferenceUnknown => "reference",
        LinkType::Collapsed | LinkType::CollapsedUnknown => "collapsed",
        LinkType::Shortcut | LinkType::ShortcutUnknown => "shortcut",
        LinkType::Autolink => "autolink",
        LinkType::Email => "email",
        _ => "inline",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::markdown_schema;
    use pretty_assertions::assert_eq;

    #[test]
    fn paragraph_with_emphasis_records_markup() {
        let schema = markdown_schema();
        let doc = parse(&schema, "some _emphasis_ here\n");
        let para = doc.child(0).unwrap();
        assert_eq!(para.type_name(), "paragraph");
        let marked = para.child(1).unwrap();
        assert_eq!(marked.text(), Some("emphasis"));
        assert_eq!(
            marked.marks()[0].attr("markup").and_then(AttrValue::as_str),
            Some("_")
        );
    }

    #[test]
    fn strong_markup_distinguishes_asterisks_from_underscores() {
        let schema = markdown_schema();
        let doc = parse(&schema, "__bold__\n");
        let marked = doc.child(0).unwrap().child(0).unwrap();
        assert_eq!(
            marked.marks()[0].attr("markup").and_then(AttrValue::as_str),
            Some("__")
        );
    }

    #[test]
    fn setext_heading_is_detected() {
        let schema = markdown_schema();
        let doc = parse(&schema, "Title\n=====\n");
        let heading = doc.child(0).unwrap();
        assert_eq!(heading.type_name(), "heading");
        assert_eq!(heading.attr("level"), Some(&AttrValue::Int(1)));
        assert_eq!(heading.attr_str("markup"), "setext");
    }

    #[test]
    fn ordered_list_captures_start_delim_and_tightness() {
        let schema = markdown_schema();
        let doc = parse(&schema, "3) three\n4) four\n");
        let list = doc.child(0).unwrap();
        assert_eq!(list.type_name(), "ordered_list");
        assert_eq!(list.attr("start"), Some(&AttrValue::Int(3)));
        assert_eq!(list.attr_str("delim"), ")");
        assert_eq!(list.attr("tight"), Some(&AttrValue::Bool(true)));
        assert_eq!(list.attr_str("numbering"), "sequence");
    }

    #[test]
    fn repeated_item_numbers_are_flagged() {
        let schema = markdown_schema();
        let doc = parse(&schema, "1. a\n1. b\n1. c\n");
        let list = doc.child(0).unwrap();
        assert_eq!(list.attr_str("numbering"), "repeat");
    }

    #[test]
    fn loose_list_is_detected_from_blank_lines() {
        let schema = markdown_schema();
        let doc = parse(&schema, "- a\n\n- b\n");
        let list = doc.child(0).unwrap();
        assert_eq!(list.attr("tight"), Some(&AttrValue::Bool(false)));
    }

    #[test]
    fn tight_item_content_is_wrapped_in_a_paragraph() {
        let schema = markdown_schema();
        let doc = parse(&schema, "- item text\n");
        let item = doc.child(0).unwrap().child(0).unwrap();
        assert_eq!(item.type_name(), "list_item");
        assert_eq!(item.child(0).unwrap().type_name(), "paragraph");
    }

    #[test]
    fn table_rows_are_padded_to_header_width() {
        let schema = markdown_schema();
        let doc = parse(&schema, "| a | b |\n| --- | --- |\n| only |\n");
        let table = doc.child(0).unwrap();
        assert_eq!(table.type_name(), "table");
        let body = table.child(1).unwrap();
        let row = body.child(0).unwrap();
        assert_eq!(row.child_count(), 2);
        assert_eq!(row.child(1).unwrap().text_content(), "");
    }

    #[test]
    fn table_header_cells_carry_alignment() {
        let schema = markdown_schema();
        let doc = parse(&schema, "| a | b |\n| :--- | ---: |\n| 1 | 2 |\n");
        let head_row = doc.child(0).unwrap().child(0).unwrap().child(0).unwrap();
        assert_eq!(head_row.child(0).unwrap().attr_str("align"), "left");
        assert_eq!(head_row.child(1).unwrap().attr_str("align"), "right");
        assert_eq!(head_row.child(0).unwrap().type_name(), "table_header");
    }

    #[test]
    fn raw_html_becomes_opaque_nodes() {
        let schema = markdown_schema();
        let doc = parse(&schema, "<div class=\"x\">\nstuff\n</div>\n\ntext <b>inline</b>\n");
        assert_eq!(doc.child(0).unwrap().type_name(), "html_block");
        let para = doc.child(1).unwrap();
        assert_eq!(para.child(1).unwrap().type_name(), "html_inline");
        assert_eq!(para.child(1).unwrap().attr_str("html"), "<b>");
    }

    #[test]
    fn reference_link_keeps_its_label() {
        let schema = markdown_schema();
        let doc = parse(&schema, "[text][label]\n\n[label]: https://example.com\n");
        let marked = doc.child(0).unwrap().child(0).unwrap();
        let link = &marked.marks()[0];
        assert_eq!(link.attr("markup").and_then(AttrValue::as_str), Some("reference"));
        assert_eq!(link.attr("ref_label").and_then(AttrValue::as_str), Some("label"));
        assert_eq!(
            link.attr("href").and_then(AttrValue::as_str),
            Some("https://example.com")
        );
    }

    #[test]
    fn unresolved_reference_stays_literal_text() {
        let schema = markdown_schema();
        let doc = parse(&schema, "[text][nowhere]\n");
        let para = doc.child(0).unwrap();
        assert!(para.content().children().iter().all(|c| c.marks().is_empty()));
        assert_eq!(para.text_content(), "[text][nowhere]");
    }

    #[test]
    fn empty_input_yields_an_empty_paragraph_document() {
        let schema = markdown_schema();
        let doc = parse(&schema, "");
        assert_eq!(doc.child_count(), 1);
        assert_eq!(doc.child(0).unwrap().type_name(), "paragraph");
    }

    #[test]
    fn exhausted_budget_falls_back_to_literal_document() {
        let schema = markdown_schema();
        let input = "*text* **more**";
        let doc = parse_with_budget(&schema, input, 2);
        assert_eq!(doc.child_count(), 2);
        assert_eq!(doc.child(0).unwrap().type_name(), "heading");
        let code = doc.child(1).unwrap();
        assert_eq!(code.type_name(), "code_block");
        assert_eq!(code.text_content(), input);
    }

    #[test]
    fn code_block_captures_fence_and_info() {
        let schema = markdown_schema();
        let doc = parse(&schema, "```rust\nfn main() {}\n```\n");
        let code = doc.child(0).unwrap();
        assert_eq!(code.type_name(), "code_block");
        assert_eq!(code.attr_str("info"), "rust");
        assert_eq!(code.attr_str("markup"), "```");
        assert_eq!(code.text_content(), "fn main() {}");
    }
}
