//! Path pattern module
//!
//! Parses route patterns such as `/profile/<username>` and matches request paths
//! against them. The whole path is percent-decoded before it is split, so an
//! encoded `%2F` separates segments like a literal `/`.

use percent_encoding::percent_decode_str;

/// One segment of a route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A route path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

/// Path parameters captured by a match, in pattern order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

impl PathPattern {
    /// Parse a pattern. `<name>` marks a parameter matching one non-empty segment.
    pub fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|seg| {
                seg.strip_prefix('<')
                    .and_then(|s| s.strip_suffix('>'))
                    .map_or_else(
                        || Segment::Literal(seg.to_string()),
                        |name| Segment::Param(name.to_string()),
                    )
            })
            .collect();

        Self { segments }
    }

    /// Match a raw (still percent-encoded) request path
    ///
    /// Matching is exact: no trailing-slash tolerance, one segment per parameter.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let decoded = decode_path(path);
        let mut params = Vec::new();
        let mut request_segments = split_path(&decoded);

        for segment in &self.segments {
            let value = request_segments.next()?;
            match segment {
                Segment::Literal(literal) => {
                    if value != literal {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if value.is_empty() {
                        return None;
                    }
                    params.push((name.clone(), value.to_string()));
                }
            }
        }

        if request_segments.next().is_some() {
            return None;
        }
        Some(PathParams(params))
    }
}

/// Split a path into segments; `/` has none, `/a/` has `a` and an empty one
fn split_path(path: &str) -> impl Iterator<Item = &str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    (!trimmed.is_empty())
        .then(|| trimmed.split('/'))
        .into_iter()
        .flatten()
}

fn decode_path(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
