//! Placeholder templates
//!
//! Templates are literal text with `{name}` placeholders. `{{` and `}}`
//! render as literal braces.

/// Template syntax error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// `{` without matching `}`
    #[error("unclosed placeholder starting at byte {0}")]
    Unclosed(usize),

    /// `}` without a preceding `{`
    #[error("stray closing brace at byte {0}")]
    StrayClose(usize),

    /// `{}`
    #[error("empty placeholder at byte {0}")]
    Empty(usize),

    /// The renderer has no value for a placeholder
    #[error("unknown placeholder {{{0}}}")]
    Unknown(String),
}

#[derive(Debug, PartialEq, Eq)]
enum Piece<'a> {
    Text(&'a str),
    Placeholder(&'a str),
}

fn pieces(template: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let bytes = template.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                out.push(Piece::Text(&template[start..=i]));
                i += 2;
                start = i;
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => {
                out.push(Piece::Text(&template[start..=i]));
                i += 2;
                start = i;
            }
            b'{' => {
                out.push(Piece::Text(&template[start..i]));
                let close = template[i..].find('}').ok_or(TemplateError::Unclosed(i))? + i;
                let name = template[i + 1..close].trim();
                if name.is_empty() {
                    return Err(TemplateError::Empty(i));
                }
                out.push(Piece::Placeholder(name));
                i = close + 1;
                start = i;
            }
            b'}' => return Err(TemplateError::StrayClose(i)),
            _ => i += 1,
        }
    }
    out.push(Piece::Text(&template[start..]));
    Ok(out)
}

/// Placeholder names in order of appearance
pub fn placeholders(template: &str) -> Result<Vec<String>, TemplateError> {
    Ok(pieces(template)?
        .into_iter()
        .filter_map(|p| match p {
            Piece::Placeholder(name) => Some(name.to_string()),
            Piece::Text(_) => None,
        })
        .collect())
}

/// Render a template, looking every placeholder up with `lookup`
pub fn render<F>(template: &str, mut lookup: F) -> Result<String, TemplateError>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut rendered = String::with_capacity(template.len());
    for piece in pieces(template)? {
        match piece {
            Piece::Text(text) => rendered.push_str(text),
            Piece::Placeholder(name) => {
                let value = lookup(name).ok_or_else(|| TemplateError::Unknown(name.to_string()))?;
                rendered.push_str(&value);
            }
        }
    }
    Ok(rendered)
}
