use std::collections::BTreeMap;

use crate::error::SchemaError;

/// One term of a content expression: a set of admissible type names (a single
/// type, or the expansion of a group / alternation) plus a repetition range.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Term {
    pub options: Vec<String>,
    pub min: usize,
    pub max: usize,
}

/// A parsed content expression such as `"block+"` or
/// `"table_head table_body*"` or `"(table_cell | table_header)+"`.
///
/// Group names are expanded to their member types at schema-build time, so
/// matching only ever compares concrete type names.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ContentExpr {
    pub terms: Vec<Term>,
}

impl ContentExpr {
    /// Parse `source`, expanding group names through `groups`. `known` is the
    /// set of declared node type names.
    pub fn parse(
        owner: &str,
        source: &str,
        groups: &BTreeMap<String, Vec<String>>,
        known: &[String],
    ) -> Result<ContentExpr, SchemaError> {
        let mut terms = Vec::new();
        let mut rest = source.trim();
        while !rest.is_empty() {
            let (raw_names, after) = if let Some(stripped) = rest.strip_prefix('(') {
                let close = stripped.find(')').ok_or_else(|| SchemaError::MalformedExpression {
                    owner: owner.to_string(),
                    reason: "unclosed parenthesis".to_string(),
                })?;
                let inner = &stripped[..close];
                let names: Vec<&str> = inner.split('|').map(str::trim).collect();
                (names, &stripped[close + 1..])
            } else {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '?' || c == '*' || c == '+')
                    .unwrap_or(rest.len());
                (vec![&rest[..end]], &rest[end..])
            };

            let (min, max, after) = match after.chars().next() {
                Some('?') => (0, 1, &after[1..]),
                Some('*') => (0, usize::MAX, &after[1..]),
                Some('+') => (1, usize::MAX, &after[1..]),
                _ => (1, 1, after),
            };

            let mut options = Vec::new();
            for name in raw_names {
                if name.is_empty() {
                    return Err(SchemaError::MalformedExpression {
                        owner: owner.to_string(),
                        reason: "empty name in expression".to_string(),
                    });
                }
                if let Some(members) = groups.get(name) {
                    if members.is_empty() {
                        return Err(SchemaError::EmptyGroup(name.to_string()));
                    }
                    for member in members {
                        push_option(owner, &mut options, member.clone())?;
                    }
                } else if known.iter().any(|k| k == name) {
                    push_option(owner, &mut options, name.to_string())?;
                } else {
                    return Err(SchemaError::UnknownContentName {
                        owner: owner.to_string(),
                        name: name.to_string(),
                    });
                }
            }
            terms.push(Term { options, min, max });
            rest = after.trim_start();
        }
        Ok(ContentExpr { terms })
    }

    /// Whether a sequence of child type names satisfies the expression.
    pub fn matches(&self, children: &[&str]) -> bool {
        fn go(terms: &[Term], children: &[&str]) -> bool {
            match terms.first() {
                None => children.is_empty(),
                Some(term) => {
                    // Take as many children as allowed, longest match first,
                    // backtracking when the rest of the sequence fails.
                    let mut taken = 0;
                    while taken < term.max
                        && taken < children.len()
                        && term.options.iter().any(|o| o == children[taken])
                    {
                        taken += 1;
                    }
                    loop {
                        if taken >= term.min && go(&terms[1..], &children[taken..]) {
                            return true;
                        }
                        if taken == 0 {
                            return false;
                        }
                        taken -= 1;
                    }
                }
            }
        }
        go(&self.terms, children)
    }

    /// A minimal child type sequence satisfying the expression, used when a
    /// wrapper node has to be conjured around existing content.
    pub fn fill_types(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for term in &self.terms {
            for _ in 0..term.min {
                out.push(term.options[0].as_str());
            }
        }
        out
    }
}

fn push_option(owner: &str, options: &mut Vec<String>, name: String) -> Result<(), SchemaError> {
    if options.contains(&name) {
        return Err(SchemaError::AmbiguousAlternation {
            owner: owner.to_string(),
            name,
        });
    }
    options.push(name);
    Ok(())
}
