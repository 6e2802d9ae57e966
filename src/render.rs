use once_cell::sync::Lazy;
use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use regex::Regex;

// The completion API has a habit of emitting `\,` spacing commands and a
// stray comma after inline-math dollars. Both get stripped before rendering.
static SLASH_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\,\s?").expect("valid regex"));
static DOLLAR_COMMA: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$,\s?").expect("valid regex"));

/// Fixed cleanup applied to every reply before rendering: drop literal `\,`
/// plus one optional following whitespace, and collapse literal `$,` plus one
/// optional following whitespace into `$`.
pub fn clean_response(text: &str) -> String {
    let text = SLASH_COMMA.replace_all(text, "");
    DOLLAR_COMMA.replace_all(&text, "$$").into_owned()
}

pub fn has_mermaid(text: &str) -> bool {
    text.contains("```mermaid")
}

/// Markdown to plain terminal text. Headings get underlined, lists get
/// bullets, fenced code blocks (mermaid included) are kept verbatim so the
/// reader can still paste them somewhere that renders them. Inline math is
/// left exactly as written.
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(text, options);

    let mut out = String::new();
    let mut heading_start = 0;
    // One entry per open list: None for bullets, Some(n) for the next number
    let mut list_stack: Vec<Option<u64>> = Vec::new();

    for event in parser {
        match event {
            Event::Start(Tag::Heading(..)) => {
                ensure_blank_line(&mut out);
                heading_start = out.len();
            }
            Event::End(Tag::Heading(..)) => {
                let width = out[heading_start..].chars().count().max(1);
                out.push('\n');
                out.extend(std::iter::repeat('─').take(width));
                out.push('\n');
            }
            Event::Start(Tag::Paragraph) => ensure_blank_line(&mut out),
            Event::End(Tag::Paragraph) => out.push('\n'),
            Event::Start(Tag::List(start)) => {
                if list_stack.is_empty() {
                    ensure_blank_line(&mut out);
                }
                list_stack.push(start);
            }
            Event::End(Tag::List(_)) => {
                list_stack.pop();
            }
            Event::Start(Tag::Item) => {
                let depth = list_stack.len().saturating_sub(1);
                out.extend(std::iter::repeat(' ').take(depth * 2));
                match list_stack.last_mut() {
                    Some(Some(n)) => {
                        out.push_str(&format!("{}. ", n));
                        *n += 1;
                    }
                    _ => out.push_str("• "),
                }
            }
            Event::End(Tag::Item) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Start(Tag::CodeBlock(kind)) => {
                ensure_blank_line(&mut out);
                match kind {
                    CodeBlockKind::Fenced(lang) => {
                        if lang.as_ref() == "mermaid" {
                            out.push_str("[mermaid diagram]\n");
                        }
                        out.push_str("```");
                        out.push_str(&lang);
                        out.push('\n');
                    }
                    CodeBlockKind::Indented => out.push_str("```\n"),
                }
            }
            Event::End(Tag::CodeBlock(_)) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("```\n");
            }
            Event::End(Tag::Link(_, dest, _)) => {
                if !dest.is_empty() {
                    out.push_str(&format!(" ({})", dest));
                }
            }
            Event::Start(Tag::BlockQuote) => {
                ensure_blank_line(&mut out);
                out.push_str("> ");
            }
            Event::End(Tag::BlockQuote) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Text(t) => out.push_str(&t),
            Event::Code(t) => {
                out.push('`');
                out.push_str(&t);
                out.push('`');
            }
            Event::Html(t) => out.push_str(&t),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Rule => {
                ensure_blank_line(&mut out);
                out.push_str("────────────────────\n");
            }
            Event::TaskListMarker(checked) => {
                out.push_str(if checked { "[x] " } else { "[ ] " });
            }
            _ => {}
        }
    }

    let trimmed = out.trim_end();
    let mut rendered = trimmed.to_string();
    rendered.push('\n');
    rendered
}

fn ensure_blank_line(out: &mut String) {
    if out.is_empty() {
        return;
    }
    while !out.ends_with("\n\n") {
        out.push('\n');
    }
}
