//! Secrets substitution in local values.
//!
//! Values use the variable subset of mustache:
//!
//! - `{{name}}` inserts the HTML-escaped secret.
//! - `{{{name}}}` and `{{& name}}` insert it verbatim.
//! - `{{! ...}}` is a comment.
//! - A name missing from the secrets map renders as nothing.
//!
//! Secrets are a flat string map, so nothing else is rendered. Section
//! (`{{#x}}`, `{{^x}}`, `{{/x}}`), partial (`{{>x}}`) and delimiter
//! (`{{=<% %>=}}`) tags fail with [`TemplateError::Unsupported`], which the
//! engine reports as a template failure naming the offending path. A value
//! with such a tag is never stored half-rendered.

use kvsync_source::SecretsMap;
use thiserror::Error;

/// Errors raised while rendering a value.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// A tag was opened and never closed.
    #[error("unclosed tag at byte {0}")]
    Unclosed(usize),

    /// A tag kind other than variable, raw or comment.
    #[error("unsupported tag '{0}'")]
    Unsupported(String),
}

/// Renders `template` against `secrets`.
pub fn render(template: &str, secrets: &SecretsMap) -> Result<String, TemplateError> {
    if !template.contains("{{") {
        return Ok(template.to_string());
    }

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let tag_start = offset + start;
        let after_open = &rest[start + 2..];

        let (inner, consumed) = if let Some(body) = after_open.strip_prefix('{') {
            let end = body.find("}}}").ok_or(TemplateError::Unclosed(tag_start))?;
            (Tag::Raw(body[..end].trim()), 3 + end + 3)
        } else {
            let end = after_open
                .find("}}")
                .ok_or(TemplateError::Unclosed(tag_start))?;
            (Tag::parse(&after_open[..end])?, 2 + end + 2)
        };

        match inner {
            Tag::Escaped(name) => {
                if let Some(value) = secrets.get(name) {
                    escape_into(value, &mut out);
                }
            }
            Tag::Raw(name) => {
                if let Some(value) = secrets.get(name) {
                    out.push_str(value);
                }
            }
            Tag::Comment => {}
        }

        rest = &rest[start + consumed..];
        offset += start + consumed;
    }

    out.push_str(rest);
    Ok(out)
}

enum Tag<'a> {
    Escaped(&'a str),
    Raw(&'a str),
    Comment,
}

impl<'a> Tag<'a> {
    fn parse(body: &'a str) -> Result<Self, TemplateError> {
        let body = body.trim();
        match body.chars().next() {
            Some('&') => Ok(Tag::Raw(body[1..].trim())),
            Some('!') => Ok(Tag::Comment),
            Some(c @ ('#' | '^' | '/' | '>' | '=')) => {
                Err(TemplateError::Unsupported(format!("{}{}", c, &body[1..])))
            }
            _ => Ok(Tag::Escaped(body)),
        }
    }
}

fn escape_into(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> SecretsMap {
        [
            ("db_password", "hunter2"),
            ("html", "<a&b>"),
            ("quote", "it's \"x\""),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(render("no tags here { }", &secrets()).unwrap(), "no tags here { }");
    }

    #[test]
    fn variables() {
        let out = render("password={{ db_password }};", &secrets()).unwrap();
        assert_eq!(out, "password=hunter2;");
        assert_eq!(render("{{missing}}x", &secrets()).unwrap(), "x");
    }

    #[test]
    fn escaping() {
        assert_eq!(render("{{html}}", &secrets()).unwrap(), "&lt;a&amp;b&gt;");
        assert_eq!(render("{{quote}}", &secrets()).unwrap(), "it&#39;s &#34;x&#34;");
        assert_eq!(render("{{{html}}}", &secrets()).unwrap(), "<a&b>");
        assert_eq!(render("{{& html}}", &secrets()).unwrap(), "<a&b>");
    }

    #[test]
    fn comments_and_json_bodies() {
        let doc = r#"{"user": "app", "pass": "{{db_password}}"}{{! trailing }}"#;
        assert_eq!(
            render(doc, &secrets()).unwrap(),
            r#"{"user": "app", "pass": "hunter2"}"#
        );
    }

    #[test]
    fn errors() {
        assert_eq!(
            render("abc {{ db_password", &secrets()).unwrap_err(),
            TemplateError::Unclosed(4)
        );
        assert!(matches!(
            render("{{{raw}}", &secrets()).unwrap_err(),
            TemplateError::Unclosed(0)
        ));
        assert!(matches!(
            render("{{#section}}x{{/section}}", &secrets()).unwrap_err(),
            TemplateError::Unsupported(_)
        ));
    }

    #[test]
    fn non_variable_tags_are_rejected() {
        for template in [
            "{{#flag}}on{{/flag}}",
            "{{^flag}}off{{/flag}}",
            "tail {{/flag}}",
            "{{> header}}",
            "{{=<% %>=}}",
        ] {
            assert!(
                matches!(
                    render(template, &secrets()),
                    Err(TemplateError::Unsupported(_))
                ),
                "{template}"
            );
        }
        assert_eq!(
            render("{{ #flag }}", &secrets()).unwrap_err(),
            TemplateError::Unsupported("#flag".into())
        );
    }
}
