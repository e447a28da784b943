use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Elements whose content is never visible text.
const INVISIBLE_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "iframe", "svg", "canvas", "object", "head",
];

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "header", "footer", "nav", "aside", "figure",
    "figcaption", "table", "tr", "blockquote", "address", "dl", "dt", "dd", "pre", "form",
    "fieldset", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol",
];

/// Render an element subtree as plain text, one block per line.
///
/// `skip` is consulted for every descendant element; a `true` drops the whole
/// sub-tree.
pub fn element_text<F>(element: ElementRef<'_>, skip: F) -> String
where
    F: Fn(ElementRef<'_>) -> bool,
{
    let mut ctx = TextContext::default();
    visit_children(*element, &skip, &mut ctx);
    ctx.finish()
}

/// Plain text of a markup fragment, e.g. an HTML description string.
pub fn fragment_text(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    element_text(parsed.root_element(), |_| false)
}

/// Character count of visible text under `element`.
pub fn visible_len(element: ElementRef<'_>) -> usize {
    element_text(element, |_| false).chars().count()
}

/// Share of the visible text that sits inside links.
pub fn link_density(element: ElementRef<'_>) -> f64 {
    let total = visible_len(element);
    if total == 0 {
        return 0.0;
    }
    let Ok(anchor) = Selector::parse("a") else {
        return 0.0;
    };
    let linked: usize = element
        .select(&anchor)
        .map(|link| link.text().map(|t| t.trim().chars().count()).sum::<usize>())
        .sum();
    (linked as f64 / total as f64).min(1.0)
}

pub(crate) fn is_invisible(tag: &str) -> bool {
    INVISIBLE_TAGS.contains(&tag)
}

fn visit_node<F>(node: NodeRef<'_, Node>, skip: &F, ctx: &mut TextContext)
where
    F: Fn(ElementRef<'_>) -> bool,
{
    match node.value() {
        Node::Text(text) => ctx.append_text(text),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, skip, ctx);
            }
        }
        _ => visit_children(node, skip, ctx),
    }
}

fn visit_element<F>(element: ElementRef<'_>, skip: &F, ctx: &mut TextContext)
where
    F: Fn(ElementRef<'_>) -> bool,
{
    let tag = element.value().name().to_ascii_lowercase();
    if is_invisible(&tag) || skip(element) {
        return;
    }
    match tag.as_str() {
        "br" => ctx.ensure_newline(),
        "li" => {
            ctx.ensure_newline();
            ctx.append_text("- ");
            visit_children(*element, skip, ctx);
            ctx.ensure_newline();
        }
        "td" | "th" => {
            ctx.append_text(" ");
            visit_children(*element, skip, ctx);
            ctx.append_text(" ");
        }
        block if BLOCK_TAGS.contains(&block) => {
            ctx.ensure_newline();
            visit_children(*element, skip, ctx);
            ctx.ensure_newline();
        }
        _ => visit_children(*element, skip, ctx),
    }
}

fn visit_children<F>(node: NodeRef<'_, Node>, skip: &F, ctx: &mut TextContext)
where
    F: Fn(ElementRef<'_>) -> bool,
{
    for child in node.children() {
        visit_node(child, skip, ctx);
    }
}

#[derive(Default)]
struct TextContext {
    builder: String,
    last_char: Option<char>,
}

impl TextContext {
    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                if matches!(self.last_char, None | Some(' ') | Some('\n')) {
                    continue;
                }
                self.push_char(' ');
            } else {
                self.push_char(ch);
            }
        }
    }

    fn ensure_newline(&mut self) {
        if self.last_char == Some(' ') {
            self.builder.pop();
            self.last_char = self.builder.chars().next_back();
        }
        if self.last_char == Some('\n') || self.builder.is_empty() {
            return;
        }
        self.push_char('\n');
    }

    fn push_char(&mut self, ch: char) {
        self.builder.push(ch);
        self.last_char = Some(ch);
    }

    fn finish(self) -> String {
        self.builder
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
