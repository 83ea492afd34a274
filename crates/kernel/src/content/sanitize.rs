//! Rich-text and plain-text sanitization.
//!
//! Untrusted markup goes through two stages:
//!
//! 1. ammonia parses the fragment with html5ever, drops everything outside the
//!    allow-list and serializes a canonical fragment (double-quoted
//!    attributes, escaped text, balanced tags). Anchor `href`s with a denied
//!    protocol are not removed here; they are replaced with [`DENIED_HREF`] so
//!    the next stage can see which anchors carried one.
//! 2. A single walk over that canonical fragment applies the anchor policy:
//!    anchors with a denied `href` are removed together with their content,
//!    anchors without any `href` are unwrapped and surviving anchors get
//!    `rel="noopener noreferrer"` merged into whatever `rel` they carry.
//!
//! Both stages are structural, so sanitizing already sanitized output is a
//! no-op.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use ammonia::{Builder, UrlRelative};
use regex::{Captures, Regex};

/// Elements kept by [`sanitize_rich_text`].
const RICH_TEXT_TAGS: &[&str] = &[
    "p",
    "br",
    "strong",
    "b",
    "em",
    "i",
    "u",
    "s",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "li",
    "blockquote",
    "a",
    "img",
    "code",
    "pre",
    "span",
    "div",
    "table",
    "thead",
    "tbody",
    "tfoot",
    "tr",
    "th",
    "td",
    "hr",
];

/// Attributes kept on any permitted element.
const RICH_TEXT_ATTRIBUTES: &[&str] = &[
    "href", "title", "alt", "src", "width", "height", "class", "id", "target", "rel",
];

/// Elements removed together with everything inside them.
const STRIPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "form", "input", "button", "textarea",
    "select", "noscript", "template",
];

/// Schemes accepted in `href` and `src`. `data` gets an extra check in
/// [`is_allowed_url`].
const URL_SCHEMES: &[&str] = &[
    "http", "https", "mailto", "tel", "callto", "sms", "cid", "xmpp", "data",
];

/// Tokens every surviving anchor must carry in its `rel` attribute.
const REQUIRED_REL_TOKENS: &[&str] = &["noopener", "noreferrer"];

/// Stand-in written for an anchor `href` that failed [`is_allowed_url`].
const DENIED_HREF: &str = "about:invalid";

/// Elements the serializer writes without an end tag.
const VOID_TAGS: &[&str] = &["br", "hr", "img"];

/// Accepted URL shapes: an allowed scheme, something that does not start with
/// a letter (relative, protocol-relative, fragment, query), or a bare
/// relative path whose first segment cannot be a scheme.
#[allow(clippy::expect_used)]
static ALLOWED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:https?|mailto|tel|callto|sms|cid|xmpp|data):|[^a-z]|[a-z+.\-]+(?:[^a-z+.\-:]|$))")
        .expect("valid regex literal")
});

/// Characters browsers ignore inside URLs; stripped before the scheme check.
#[allow(clippy::expect_used)]
static URL_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x20\x{00A0}\x{1680}\x{180E}\x{2000}-\x{2029}\x{205F}\x{3000}]")
        .expect("valid regex literal")
});

/// Character references and named entities that can spell a URL scheme.
#[allow(clippy::expect_used)]
static SCHEME_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i:&#x([0-9a-f]+);?|&#([0-9]+);?)|&(Tab|NewLine|colon|plus|period);")
        .expect("valid regex literal")
});

#[allow(clippy::expect_used)]
static SCHEME_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-z][a-z0-9+.\-]*:").expect("valid regex literal")
});

/// Every scheme a URL attribute in `input` could parse to.
///
/// ammonia removes URLs whose scheme it does not know before any attribute
/// filter runs, so the rich-text policy is widened with these and the
/// protocol decision is made by [`is_allowed_url`] instead. The scan decodes
/// character references and drops the tab and newline characters URL
/// parsers ignore, then collects everything shaped like `scheme:`.
fn url_scheme_candidates(input: &str) -> HashSet<String> {
    let decoded = SCHEME_REFERENCE.replace_all(input, |caps: &Captures<'_>| {
        let code = if let Some(hex) = caps.get(1) {
            u32::from_str_radix(hex.as_str(), 16).ok()
        } else if let Some(dec) = caps.get(2) {
            dec.as_str().parse().ok()
        } else {
            let named = match caps.get(3).map(|m| m.as_str()) {
                Some("Tab") => '\t',
                Some("NewLine") => '\n',
                Some("colon") => ':',
                Some("plus") => '+',
                _ => '.',
            };
            return named.to_string();
        };
        code.and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string()
    });
    let compact: String = decoded
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();

    SCHEME_CANDIDATE
        .find_iter(&compact)
        .map(|m| m.as_str().trim_end_matches(':').to_ascii_lowercase())
        .filter(|scheme| !URL_SCHEMES.contains(&scheme.as_str()))
        .collect()
}

/// URL attribute filter for the rich-text policy.
fn filter_url_attribute<'u>(
    element: &str,
    attribute: &str,
    value: &'u str,
) -> Option<Cow<'u, str>> {
    match (element, attribute) {
        ("a", "href") if !is_allowed_url(value) => Some(Cow::Borrowed(DENIED_HREF)),
        (_, "href" | "src") if !is_allowed_url(value) => None,
        _ => Some(Cow::Borrowed(value)),
    }
}

/// The rich-text allow-list, accepting `schemes` at the URL stage.
fn rich_text_policy<'a>(schemes: HashSet<&'a str>) -> Builder<'a> {
    let mut builder = Builder::empty();
    builder
        .tags(RICH_TEXT_TAGS.iter().copied().collect())
        .generic_attributes(RICH_TEXT_ATTRIBUTES.iter().copied().collect())
        .tag_attributes(HashMap::new())
        .clean_content_tags(STRIPPED_WITH_CONTENT.iter().copied().collect())
        .url_schemes(schemes)
        .url_relative(UrlRelative::PassThrough)
        .link_rel(None)
        .strip_comments(true)
        .attribute_filter(filter_url_attribute);
    builder
}

static PLAIN_TEXT_POLICY: LazyLock<Builder<'static>> = LazyLock::new(|| {
    let mut builder = Builder::empty();
    builder
        .tags(HashSet::new())
        .tag_attributes(HashMap::new())
        .clean_content_tags(STRIPPED_WITH_CONTENT.iter().copied().collect())
        .strip_comments(true);
    builder
});

/// Sanitize user-supplied rich text (HTML) against the allow-list.
///
/// Keeps structural and formatting elements, drops scripts, embeds, forms,
/// inline styles and event handlers, filters `href`/`src` by protocol and
/// forces `rel="noopener noreferrer"` onto every anchor. An anchor whose
/// `href` uses a denied protocol is removed along with its content.
pub fn sanitize_rich_text(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    let candidates = url_scheme_candidates(input);
    let schemes = URL_SCHEMES
        .iter()
        .copied()
        .chain(candidates.iter().map(String::as_str))
        .collect();
    let cleaned = rich_text_policy(schemes).clean(input).to_string();
    apply_anchor_policy(&cleaned)
}

/// Strip all markup and return the (escaped) text content.
pub fn sanitize_plain_text(input: &str) -> String {
    if input.is_empty() {
        return String::new();
    }
    PLAIN_TEXT_POLICY.clean(input).to_string()
}

/// Check a URL attribute value against the protocol allow-list.
pub fn is_allowed_url(value: &str) -> bool {
    let compact = URL_WHITESPACE.replace_all(value, "");
    if !ALLOWED_URL.is_match(&compact) {
        return false;
    }
    // `data:` is only acceptable when no media type follows, which rules out
    // `data:text/html` and friends.
    match compact.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("data:") => compact[5..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphabetic()),
        _ => true,
    }
}

/// A token of ammonia's canonical output.
#[derive(Debug, PartialEq)]
enum Token<'a> {
    Start { name: &'a str, attrs: Vec<(&'a str, &'a str)> },
    End(&'a str),
    Text(&'a str),
}

/// Split a canonical fragment into tokens.
///
/// Only understands what the html5ever serializer emits: `<name a="v">`,
/// `</name>` and escaped text. Anything else is passed on as text and
/// escaped on the way out.
fn tokenize(html: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut rest = html;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("</") {
            if let Some(end) = after.find('>') {
                tokens.push(Token::End(&after[..end]));
                rest = &after[end + 1..];
                continue;
            }
        } else if rest.starts_with('<')
            && let Some((token, remainder)) = parse_start_tag(rest)
        {
            tokens.push(token);
            rest = remainder;
            continue;
        }

        // Text runs to the next '<'; a '<' that failed to parse as a tag is
        // consumed as a one-character text token.
        let end = if rest.starts_with('<') {
            1
        } else {
            rest.find('<').unwrap_or(rest.len())
        };
        tokens.push(Token::Text(&rest[..end]));
        rest = &rest[end..];
    }

    tokens
}

/// Parse `<name attr="value" ...>` at the start of `input`.
fn parse_start_tag(input: &str) -> Option<(Token<'_>, &str)> {
    let body = input.strip_prefix('<')?;
    let name_end = body.find(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/')?;
    let name = &body[..name_end];
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let mut attrs = Vec::new();
    let mut rest = &body[name_end..];
    loop {
        rest = rest.trim_start();
        if let Some(after) = rest.strip_prefix("/>") {
            return Some((Token::Start { name, attrs }, after));
        }
        if let Some(after) = rest.strip_prefix('>') {
            return Some((Token::Start { name, attrs }, after));
        }

        let attr_end = rest.find(|c: char| c == '=' || c == '>' || c.is_ascii_whitespace())?;
        let attr_name = &rest[..attr_end];
        if attr_name.is_empty() {
            return None;
        }
        rest = &rest[attr_end..];

        match rest.strip_prefix("=\"") {
            Some(quoted) => {
                let value_end = quoted.find('"')?;
                attrs.push((attr_name, &quoted[..value_end]));
                rest = &quoted[value_end + 1..];
            }
            None => attrs.push((attr_name, "")),
        }
    }
}

/// Drop anchors with a denied `href` and everything inside them, unwrap
/// anchors without `href` and merge the required `rel` tokens into the ones
/// that stay.
///
/// html5ever drops one newline directly after `<pre>` when parsing, so a
/// `<pre>` whose text starts with a newline gets one written back.
fn apply_anchor_policy(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + 32);
    // (element name, whether its start tag was written)
    let mut open: Vec<(&str, bool)> = Vec::new();
    // Stack depth of the denied anchor being skipped.
    let mut dropping: Option<usize> = None;
    let mut after_pre = false;

    for token in tokenize(html) {
        if dropping.is_some() {
            match token {
                Token::Start { name, .. } if !VOID_TAGS.contains(&name) => {
                    open.push((name, false));
                }
                Token::End(name) => {
                    if let Some(position) = close_element(&mut out, &mut open, name)
                        && dropping.is_some_and(|depth| position <= depth)
                    {
                        dropping = None;
                    }
                }
                _ => {}
            }
            continue;
        }

        match token {
            Token::Text(text) => {
                if after_pre && text.starts_with('\n') {
                    out.push('\n');
                }
                if text == "<" {
                    out.push_str("&lt;");
                } else {
                    out.push_str(text);
                }
                after_pre = false;
            }
            Token::Start { name, attrs } => {
                let is_void = VOID_TAGS.contains(&name);
                if name == "a" {
                    match attrs.iter().find(|(k, _)| *k == "href") {
                        Some((_, href)) if !is_allowed_url(href) => {
                            dropping = Some(open.len());
                            open.push((name, false));
                            continue;
                        }
                        None => {
                            open.push((name, false));
                            continue;
                        }
                        Some(_) => {}
                    }
                }

                out.push('<');
                out.push_str(name);
                let mut saw_rel = false;
                for (key, value) in &attrs {
                    if name == "a" && *key == "rel" {
                        saw_rel = true;
                        write_attr(&mut out, key, &merge_rel(value));
                    } else {
                        write_attr(&mut out, key, value);
                    }
                }
                if name == "a" && !saw_rel {
                    write_attr(&mut out, "rel", &merge_rel(""));
                }
                out.push('>');

                after_pre = name == "pre";
                if !is_void {
                    open.push((name, true));
                }
            }
            Token::End(name) => {
                let written = out.len();
                close_element(&mut out, &mut open, name);
                if out.len() != written {
                    after_pre = false;
                }
            }
        }
    }

    for (closing, written) in open.into_iter().rev() {
        if written {
            write_end_tag(&mut out, closing);
        }
    }

    out
}

/// Pop `name` and everything opened inside it, writing the end tags that
/// have a written start tag. Returns the stack position `name` was at.
fn close_element(out: &mut String, open: &mut Vec<(&str, bool)>, name: &str) -> Option<usize> {
    let position = open.iter().rposition(|(open_name, _)| *open_name == name)?;
    for (closing, written) in open.drain(position..).rev() {
        if written {
            write_end_tag(out, closing);
        }
    }
    Some(position)
}

fn write_end_tag(out: &mut String, name: &str) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn write_attr(out: &mut String, key: &str, value: &str) {
    out.push(' ');
    out.push_str(key);
    out.push_str("=\"");
    out.push_str(value);
    out.push('"');
}

/// Append the required tokens to an existing `rel` value, keeping its tokens.
fn merge_rel(existing: &str) -> String {
    let mut tokens: Vec<&str> = existing.split_ascii_whitespace().collect();
    for required in REQUIRED_REL_TOKENS {
        if !tokens.iter().any(|t| t.eq_ignore_ascii_case(required)) {
            tokens.push(required);
        }
    }
    tokens.join(" ")
}
