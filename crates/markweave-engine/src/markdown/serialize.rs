use std::mem;

use crate::error::SerializeError;
use crate::markdown::escape;
use crate::model::{AttrValue, Mark, Node};
use crate::schema::{Schema, SchemaBuilder};

/// Serializer for one node type, dispatched through the schema's table.
pub type NodeSerializerFn = fn(&mut MarkdownWriter<'_>, &Node) -> Result<(), SerializeError>;

/// Produces the opening (`open == true`) or closing delimiter for a mark.
/// Reference-style links register their definition on the writer as a side
/// effect of closing.
pub type MarkDelimFn = fn(&mut MarkdownWriter<'_>, &Mark, bool) -> String;

/// Serialize a document tree back to markdown text.
pub fn serialize(schema: &Schema, doc: &Node) -> Result<String, SerializeError> {
    let mut writer = MarkdownWriter::new(schema);
    writer.render_content(doc)?;
    writer.finish()
}

#[derive(Debug, Clone)]
struct RefDef {
    label: String,
    url: String,
    title: String,
}

/// Depth-first markdown emitter.
///
/// Carries the cross-cutting state a single walk needs: the current block
/// prefix (quote markers, list indentation), pending block separation, list
/// tightness, and the reference definitions collected along the way.
pub struct MarkdownWriter<'a> {
    schema: &'a Schema,
    out: String,
    delim: String,
    closed: bool,
    tight: bool,
    refs: Vec<RefDef>,
}

impl<'a> MarkdownWriter<'a> {
    fn new(schema: &'a Schema) -> Self {
        MarkdownWriter {
            schema,
            out: String::new(),
            delim: String::new(),
            closed: false,
            tight: false,
            refs: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        self.schema
    }

    fn at_line_start(&self) -> bool {
        self.out.is_empty() || self.out.ends_with('\n')
    }

    fn flush_close(&mut self) {
        if !self.closed {
            return;
        }
        if !self.at_line_start() {
            self.out.push('\n');
        }
        if !self.tight {
            let trimmed = self.delim.trim_end().to_string();
            self.out.push_str(&trimmed);
            self.out.push('\n');
        }
        self.closed = false;
    }

    /// Write a piece of a block line, emitting any pending separator and the
    /// current prefix first.
    pub fn write(&mut self, content: &str) {
        self.flush_close();
        if self.at_line_start() && !self.delim.is_empty() {
            let delim = self.delim.clone();
            self.out.push_str(&delim);
        }
        self.out.push_str(content);
    }

    /// Start a fresh line under the current prefix.
    pub fn new_line(&mut self) {
        self.out.push('\n');
        if !self.delim.is_empty() {
            let delim = self.delim.clone();
            self.out.push_str(&delim);
        }
    }

    /// Mark the current block as finished; the next write separates itself.
    pub fn close_block(&mut self) {
        self.closed = true;
    }

    /// Write inline text, handling embedded newlines (soft breaks) and
    /// escaping where requested.
    pub fn text(&mut self, text: &str, escape_text: bool) {
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                self.new_line();
            }
            let start_of_line = self.closed || self.at_line_start();
            let piece = if escape_text {
                escape::escape_inline(line, start_of_line)
            } else {
                line.to_string()
            };
            self.write(&piece);
        }
    }

    /// Render a sub-block under an extended prefix. `first` replaces the
    /// prefix on the opening line (a list marker); later lines get `delim`.
    pub fn wrap_block<F>(
        &mut self,
        delim: &str,
        first: Option<&str>,
        f: F,
    ) -> Result<(), SerializeError>
    where
        F: FnOnce(&mut Self) -> Result<(), SerializeError>,
    {
        let old = self.delim.clone();
        self.write(first.unwrap_or(delim));
        self.delim.push_str(delim);
        f(self)?;
        self.delim = old;
        self.close_block();
        Ok(())
    }

    /// Dispatch one block node through the schema's serializer table.
    pub fn render(&mut self, node: &Node) -> Result<(), SerializeError> {
        let f = self
            .schema
            .node_serializer(node.type_name())
            .ok_or_else(|| SerializeError::UnknownNode(node.type_name().to_string()))?;
        f(self, node)
    }

    /// Render every child block of a node.
    pub fn render_content(&mut self, parent: &Node) -> Result<(), SerializeError> {
        for child in parent.content().children() {
            self.render(child)?;
        }
        Ok(())
    }

    /// Render a node's inline children, opening and closing mark delimiters
    /// at run boundaries.
    pub fn render_inline(&mut self, parent: &Node) -> Result<(), SerializeError> {
        let children: Vec<Node> = parent.content().children().to_vec();
        let mut active: Vec<Mark> = Vec::new();
        let mut code_close: Option<String> = None;
        for i in 0..=children.len() {
            let child = children.get(i);
            let marks: Vec<Mark> = child.map(|c| c.marks().to_vec()).unwrap_or_default();
            let keep = active
                .iter()
                .zip(marks.iter())
                .take_while(|(a, b)| a == b)
                .count();
            for mark in active[keep..].to_vec().iter().rev() {
                if mark.type_name() == "code" {
                    let close = code_close.take().unwrap_or_else(|| "`".to_string());
                    self.write(&close);
                } else {
                    let delim = self.mark_delim(mark, false)?;
                    self.write(&delim);
                }
            }
            for mark in marks[keep..].to_vec() {
                if mark.type_name() == "code" {
                    // Code fences depend on the span text, so they bypass the
                    // delimiter table.
                    let run: String = children[i..]
                        .iter()
                        .take_while(|c| c.marks().iter().any(|m| m.type_name() == "code"))
                        .filter_map(|c| c.text())
                        .collect();
                    let recorded = mark.attr("markup").and_then(AttrValue::as_str).unwrap_or("`");
                    let fence = escape::code_span_delim(&run, recorded);
                    let pad = escape::code_span_needs_padding(&run);
                    self.write(&fence);
                    if pad {
                        self.write(" ");
                    }
                    code_close = Some(if pad {
                        format!(" {fence}")
                    } else {
                        fence
                    });
                } else {
                    let delim = self.mark_delim(&mark, true)?;
                    self.write(&delim);
                }
            }
            active = marks;
            if let Some(child) = child {
                if let Some(text) = child.text() {
                    let in_code = active.iter().any(|m| m.type_name() == "code");
                    self.text(text, !in_code);
                } else {
                    self.render(child)?;
                }
            }
        }
        Ok(())
    }

    fn mark_delim(&mut self, mark: &Mark, open: bool) -> Result<String, SerializeError> {
        let f = self
            .schema
            .mark_serializer(mark.type_name())
            .ok_or_else(|| SerializeError::UnknownMark(mark.type_name().to_string()))?;
        Ok(f(self, mark, open))
    }

    /// Render a node's inline content into a standalone single-line string
    /// (table cells).
    pub fn render_inline_to_string(&mut self, node: &Node) -> Result<String, SerializeError> {
        let saved_out = mem::take(&mut self.out);
        let saved_delim = mem::take(&mut self.delim);
        let saved_closed = mem::replace(&mut self.closed, false);
        let result = self.render_inline(node);
        let cell = mem::replace(&mut self.out, saved_out);
        self.delim = saved_delim;
        self.closed = saved_closed;
        result?;
        Ok(escape::escape_table_cell(&cell).replace('\n', " "))
    }

    /// Render list items with their markers, tracking tightness.
    pub fn render_list<F>(
        &mut self,
        list: &Node,
        tight: bool,
        marker: F,
    ) -> Result<(), SerializeError>
    where
        F: Fn(usize) -> String,
    {
        // Separation from the previous block belongs to the surrounding
        // context, not to this list's tightness.
        self.flush_close();
        let old_tight = mem::replace(&mut self.tight, tight);
        for (i, item) in list.content().children().iter().enumerate() {
            let m = marker(i);
            let indent = " ".repeat(m.chars().count());
            self.wrap_block(&indent, Some(&m), |w| w.render_content(item))?;
        }
        self.tight = old_tight;
        Ok(())
    }

    /// Record a reference-style link definition for the trailing block.
    pub fn add_ref(&mut self, label: &str, url: &str, title: &str) {
        self.refs.push(RefDef {
            label: label.to_string(),
            url: url.to_string(),
            title: title.to_string(),
        });
    }

    fn finish(mut self) -> Result<String, SerializeError> {
        if !self.refs.is_empty() {
            let defs = collect_refs(mem::take(&mut self.refs));
            self.close_block();
            self.tight = false;
            for def in defs {
                let title = if def.title.is_empty() {
                    String::new()
                } else {
                    format!(" \"{}\"", def.title)
                };
                self.write(&format!("[{}]: {}{}", def.label, def.url, title));
                self.out.push('\n');
                self.closed = false;
            }
        }
        let mut out = self.out;
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}

/// Deduplicate collected reference definitions (first definition wins) and
/// sort them: all-numeric labels numerically first, then named labels by
/// case-normalized key.
fn collect_refs(refs: Vec<RefDef>) -> Vec<RefDef> {
    let mut seen: Vec<String> = Vec::new();
    let mut unique: Vec<RefDef> = Vec::new();
    for def in refs {
        let key = def.label.to_lowercase();
        if !seen.contains(&key) {
            seen.push(key);
            unique.push(def);
        }
    }
    unique.sort_by_key(|def| {
        let numeric: Option<u64> = if !def.label.is_empty()
            && def.label.chars().all(|c| c.is_ascii_digit())
        {
            def.label.parse().ok()
        } else {
            None
        };
        match numeric {
            Some(n) => (0u8, n, String::new()),
            None => (1u8, 0, def.label.to_lowercase()),
        }
    });
    unique
}

fn attr_str<'n>(node: &'n Node, name: &str, fallback: &'n str) -> &'n str {
    match node.attr(name).and_then(AttrValue::as_str) {
        Some(s) if !s.is_empty() => s,
        _ => fallback,
    }
}

fn serialize_paragraph(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    w.render_inline(node)?;
    w.close_block();
    Ok(())
}

fn serialize_heading(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    let level = node
        .attr("level")
        .and_then(AttrValue::as_int)
        .unwrap_or(1)
        .clamp(1, 6);
    if attr_str(node, "markup", "atx") == "setext" && level <= 2 {
        w.render_inline(node)?;
        w.new_line();
        w.write(if level == 1 { "===" } else { "---" });
    } else {
        w.write(&format!("{} ", "#".repeat(level as usize)));
        w.render_inline(node)?;
    }
    w.close_block();
    Ok(())
}

fn serialize_blockquote(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    w.wrap_block("> ", None, |w| w.render_content(node))
}

fn serialize_code_block(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    let content = node.text_content();
    let markup = attr_str(node, "markup", "```");
    if markup == "indent" {
        w.wrap_block("    ", None, |w| {
            w.text(&content, false);
            Ok(())
        })
    } else {
        let mut fence = markup.to_string();
        let fence_char = fence.chars().next().unwrap_or('`');
        // Grow the fence past any run of the same character in the content.
        let mut run = 0usize;
        let mut longest = 0usize;
        for c in content.chars() {
            if c == fence_char {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
        }
        if longest >= fence.chars().count() {
            fence = fence_char.to_string().repeat(longest + 1);
        }
        w.write(&fence);
        w.write(attr_str(node, "info", ""));
        if !content.is_empty() {
            w.new_line();
            w.text(&content, false);
        }
        w.new_line();
        w.write(&fence);
        w.close_block();
        Ok(())
    }
}

fn serialize_bullet_list(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    let bullet = attr_str(node, "bullet", "-").to_string();
    let tight = node
        .attr("tight")
        .and_then(AttrValue::as_bool)
        .unwrap_or(true);
    w.render_list(node, tight, |_| format!("{bullet} "))
}

fn serialize_ordered_list(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    let start = node.attr("start").and_then(AttrValue::as_int).unwrap_or(1);
    let delim = attr_str(node, "delim", ".").to_string();
    let tight = node
        .attr("tight")
        .and_then(AttrValue::as_bool)
        .unwrap_or(true);
    let repeat = attr_str(node, "numbering", "sequence") == "repeat";
    w.render_list(node, tight, |i| {
        let number = if repeat { start } else { start + i as i64 };
        format!("{number}{delim} ")
    })
}

fn serialize_table(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    let mut lines: Vec<String> = Vec::new();
    let mut aligns: Vec<String> = Vec::new();
    for section in node.content().children() {
        for row in section.content().children() {
            let mut cells = Vec::new();
            for cell in row.content().children() {
                if section.type_name() == "table_head" {
                    aligns.push(attr_str(cell, "align", "").to_string());
                }
                cells.push(w.render_inline_to_string(cell)?);
            }
            lines.push(format!("| {} |", cells.join(" | ")));
            if section.type_name() == "table_head" {
                let seps: Vec<&str> = aligns
                    .iter()
                    .map(|a| match a.as_str() {
                        "left" => ":---",
                        "center" => ":---:",
                        "right" => "---:",
                        _ => "---",
                    })
                    .collect();
                lines.push(format!("| {} |", seps.join(" | ")));
            }
        }
    }
    w.text(&lines.join("\n"), false);
    w.close_block();
    Ok(())
}

fn serialize_horizontal_rule(
    w: &mut MarkdownWriter<'_>,
    node: &Node,
) -> Result<(), SerializeError> {
    w.write(attr_str(node, "markup", "---"));
    w.close_block();
    Ok(())
}

fn serialize_html_block(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    w.text(attr_str(node, "html", ""), false);
    w.close_block();
    Ok(())
}

fn serialize_html_inline(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    let html = attr_str(node, "html", "").to_string();
    w.write(&html);
    Ok(())
}

fn serialize_image(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    let alt = attr_str(node, "alt", "").to_string();
    let src = attr_str(node, "src", "").to_string();
    let title = attr_str(node, "title", "").to_string();
    let label = attr_str(node, "ref_label", &alt).to_string();
    match attr_str(node, "markup", "inline") {
        "reference" => {
            w.add_ref(&label, &src, &title);
            w.write(&format!("![{alt}][{label}]"));
        }
        "collapsed" => {
            w.add_ref(&alt, &src, &title);
            w.write(&format!("![{alt}][]"));
        }
        "shortcut" => {
            w.add_ref(&alt, &src, &title);
            w.write(&format!("![{alt}]"));
        }
        _ => {
            let title_part = if title.is_empty() {
                String::new()
            } else {
                format!(" \"{title}\"")
            };
            w.write(&format!("![{alt}]({src}{title_part})"));
        }
    }
    Ok(())
}

fn serialize_hard_break(w: &mut MarkdownWriter<'_>, node: &Node) -> Result<(), SerializeError> {
    if attr_str(node, "markup", "\\") == "spaces" {
        w.write("  ");
    } else {
        w.write("\\");
    }
    w.new_line();
    Ok(())
}

fn mark_delim_simple(_w: &mut MarkdownWriter<'_>, mark: &Mark, _open: bool) -> String {
    mark.attr("markup")
        .and_then(AttrValue::as_str)
        .unwrap_or("*")
        .to_string()
}

fn mark_delim_link(w: &mut MarkdownWriter<'_>, mark: &Mark, open: bool) -> String {
    let markup = mark
        .attr("markup")
        .and_then(AttrValue::as_str)
        .unwrap_or("inline");
    let href = mark.attr("href").and_then(AttrValue::as_str).unwrap_or("");
    let title = mark.attr("title").and_then(AttrValue::as_str).unwrap_or("");
    let label = mark
        .attr("ref_label")
        .and_then(AttrValue::as_str)
        .unwrap_or("");
    if open {
        return match markup {
            "autolink" | "email" => "<".to_string(),
            _ => "[".to_string(),
        };
    }
    match markup {
        "autolink" | "email" => ">".to_string(),
        "reference" => {
            w.add_ref(label, href, title);
            format!("][{label}]")
        }
        "collapsed" => {
            w.add_ref(label, href, title);
            "][]".to_string()
        }
        "shortcut" => {
            w.add_ref(label, href, title);
            "]".to_string()
        }
        _ => {
            if title.is_empty() {
                format!("]({href})")
            } else {
                format!("]({href} \"{title}\")")
            }
        }
    }
}

/// Install the markdown dialect's serializer functions on a schema builder.
pub(crate) fn register_default_serializers(builder: SchemaBuilder) -> SchemaBuilder {
    builder
        .node_serializer("paragraph", serialize_paragraph)
        .node_serializer("heading", serialize_heading)
        .node_serializer("blockquote", serialize_blockquote)
        .node_serializer("code_block", serialize_code_block)
        .node_serializer("bullet_list", serialize_bullet_list)
        .node_serializer("ordered_list", serialize_ordered_list)
        .node_serializer("table", serialize_table)
        .node_serializer("horizontal_rule", serialize_horizontal_rule)
        .node_serializer("html_block", serialize_html_block)
        .node_serializer("html_inline", serialize_html_inline)
        .node_serializer("image", serialize_image)
        .node_serializer("hard_break", serialize_hard_break)
        .mark_serializer("em", mark_delim_simple)
        .mark_serializer("strong", mark_delim_simple)
        .mark_serializer("strike", mark_delim_simple)
        .mark_serializer("code", mark_delim_simple)
        .mark_serializer("link", mark_delim_link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attrs;
    use crate::schema::markdown_schema;
    use pretty_assertions::assert_eq;

    fn doc(schema: &Schema, children: Vec<Node>) -> Node {
        schema.node("doc", None, children, vec![]).unwrap()
    }

    #[test]
    fn paragraph_and_heading() {
        let schema = markdown_schema();
        let d = doc(
            &schema,
            vec![
                schema
                    .node(
                        "heading",
                        Some(attrs([("level", 2)])),
                        vec![schema.text("Title")],
                        vec![],
                    )
                    .unwrap(),
                schema
                    .node("paragraph", None, vec![schema.text("Body text.")], vec![])
                    .unwrap(),
            ],
        );
        assert_eq!(serialize(&schema, &d).unwrap(), "## Title\n\nBody text.\n");
    }

    #[test]
    fn strong_mark_uses_recorded_markup() {
        let schema = markdown_schema();
        let strong = schema
            .mark("strong", Some(attrs([("markup", "__")])))
            .unwrap();
        let d = doc(
            &schema,
            vec![schema
                .node(
                    "paragraph",
                    None,
                    vec![schema.text_marked("bold", vec![strong])],
                    vec![],
                )
                .unwrap()],
        );
        assert_eq!(serialize(&schema, &d).unwrap(), "__bold__\n");
    }

    #[test]
    fn nested_blockquote_prefixes_every_line() {
        let schema = markdown_schema();
        let inner = schema
            .node("paragraph", None, vec![schema.text("quoted")], vec![])
            .unwrap();
        let quote = schema
            .node("blockquote", None, vec![inner], vec![])
            .unwrap();
        let d = doc(&schema, vec![quote]);
        assert_eq!(serialize(&schema, &d).unwrap(), "> quoted\n");
    }

    #[test]
    fn tight_list_has_no_blank_lines() {
        let schema = markdown_schema();
        let item = |text: &str| {
            let para = schema
                .node("paragraph", None, vec![schema.text(text)], vec![])
                .unwrap();
            schema.node("list_item", None, vec![para], vec![]).unwrap()
        };
        let list = schema
            .node("bullet_list", None, vec![item("one"), item("two")], vec![])
            .unwrap();
        let d = doc(&schema, vec![list]);
        assert_eq!(serialize(&schema, &d).unwrap(), "- one\n- two\n");
    }

    #[test]
    fn ordered_list_renumbers_from_start() {
        let schema = markdown_schema();
        let item = |text: &str| {
            let para = schema
                .node("paragraph", None, vec![schema.text(text)], vec![])
                .unwrap();
            schema.node("list_item", None, vec![para], vec![]).unwrap()
        };
        let list = schema
            .node(
                "ordered_list",
                Some(attrs([("start", 3)])),
                vec![item("a"), item("b")],
                vec![],
            )
            .unwrap();
        let d = doc(&schema, vec![list]);
        assert_eq!(serialize(&schema, &d).unwrap(), "3. a\n4. b\n");
    }

    #[test]
    fn repeated_numbering_is_preserved() {
        let schema = markdown_schema();
        let item = |text: &str| {
            let para = schema
                .node("paragraph", None, vec![schema.text(text)], vec![])
                .unwrap();
            schema.node("list_item", None, vec![para], vec![]).unwrap()
        };
        let list = schema
            .node(
                "ordered_list",
                Some(attrs([
                    ("start", crate::model::AttrValue::Int(1)),
                    ("numbering", crate::model::AttrValue::from("repeat")),
                ])),
                vec![item("a"), item("b")],
                vec![],
            )
            .unwrap();
        let d = doc(&schema, vec![list]);
        assert_eq!(serialize(&schema, &d).unwrap(), "1. a\n1. b\n");
    }

    #[test]
    fn reference_links_collect_sorted_definitions() {
        let schema = markdown_schema();
        let link = |label: &str, href: &str| {
            schema
                .mark(
                    "link",
                    Some(attrs([
                        ("href", href),
                        ("markup", "reference"),
                        ("ref_label", label),
                    ])),
                )
                .unwrap()
        };
        let d = doc(
            &schema,
            vec![schema
                .node(
                    "paragraph",
                    None,
                    vec![
                        schema.text_marked("beta", vec![link("zeta", "https://z.example")]),
                        schema.text(" "),
                        schema.text_marked("ten", vec![link("10", "https://ten.example")]),
                        schema.text(" "),
                        schema.text_marked("two", vec![link("2", "https://two.example")]),
                    ],
                    vec![],
                )
                .unwrap()],
        );
        let out = serialize(&schema, &d).unwrap();
        assert_eq!(
            out,
            "[beta][zeta] [ten][10] [two][2]\n\n[2]: https://two.example\n[10]: https://ten.example\n[zeta]: https://z.example\n"
        );
    }

    #[test]
    fn table_renders_alignment_row() {
        let schema = markdown_schema();
        let cell = |ty: &str, text: &str, align: &str| {
            schema
                .node(
                    ty,
                    Some(attrs([("align", align)])),
                    vec![schema.text(text)],
                    vec![],
                )
                .unwrap()
        };
        let head_row = schema
            .node(
                "table_row",
                None,
                vec![
                    cell("table_header", "a", "left"),
                    cell("table_header", "b", "center"),
                ],
                vec![],
            )
            .unwrap();
        let body_row = schema
            .node(
                "table_row",
                None,
                vec![cell("table_cell", "1", ""), cell("table_cell", "2", "")],
                vec![],
            )
            .unwrap();
        let head = schema
            .node("table_head", None, vec![head_row], vec![])
            .unwrap();
        let body = schema
            .node("table_body", None, vec![body_row], vec![])
            .unwrap();
        let table = schema.node("table", None, vec![head, body], vec![]).unwrap();
        let d = doc(&schema, vec![table]);
        assert_eq!(
            serialize(&schema, &d).unwrap(),
            "| a | b |\n| :--- | :---: |\n| 1 | 2 |\n"
        );
    }

    #[test]
    fn code_span_fence_grows_past_backticks() {
        let schema = markdown_schema();
        let code = schema.mark("code", None).unwrap();
        let d = doc(
            &schema,
            vec![schema
                .node(
                    "paragraph",
                    None,
                    vec![schema.text_marked("a ` b", vec![code])],
                    vec![],
                )
                .unwrap()],
        );
        assert_eq!(serialize(&schema, &d).unwrap(), "``a ` b``\n");
    }
}
