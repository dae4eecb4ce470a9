use serde::Serialize;

use crate::model::attrs::Attrs;
use crate::schema::Schema;

/// A typed annotation on a run of inline content (emphasis, link, code, ...).
///
/// Marks are value types: two marks are the same annotation when the type and
/// attributes match. Mark sets built through [`Mark::add_to_set`] stay sorted
/// by the mark type's schema rank; sets produced by the parser keep the
/// source nesting order instead, so the original delimiter nesting survives
/// serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mark {
    type_name: String,
    attrs: Attrs,
}

impl Mark {
    pub fn new(type_name: impl Into<String>, attrs: Attrs) -> Self {
        Self {
            type_name: type_name.into(),
            attrs,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&crate::model::AttrValue> {
        self.attrs.get(name)
    }

    /// Whether this is the same annotation (type and attributes) as `other`.
    pub fn same_as(&self, other: &Mark) -> bool {
        self == other
    }

    /// Add this mark to a mark set, honoring the schema's exclusivity rules.
    ///
    /// A mark always excludes other instances of its own type; the mark
    /// spec's `excludes` list removes further types. The result stays sorted
    /// by schema rank.
    pub fn add_to_set(&self, set: &[Mark], schema: &Schema) -> Vec<Mark> {
        let excluded = schema.mark_excludes(&self.type_name);
        let mut out: Vec<Mark> = set
            .iter()
            .filter(|m| m.type_name != self.type_name && !excluded.contains(&m.type_name))
            .cloned()
            .collect();
        out.push(self.clone());
        out.sort_by_key(|m| schema.mark_rank(m.type_name()).unwrap_or(usize::MAX));
        out
    }

    /// Remove every instance of this mark's type from a mark set.
    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter()
            .filter(|m| m.type_name != self.type_name)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::attrs::attrs;
    use crate::schema::markdown_schema;

    #[test]
    fn add_keeps_rank_order() {
        let schema = markdown_schema();
        let em = Mark::new("em", attrs([("markup", "*")]));
        let strong = Mark::new("strong", attrs([("markup", "**")]));
        // Insert out of registration order; the set comes back rank-sorted.
        let set = strong.add_to_set(&[], &schema);
        let set = em.add_to_set(&set, &schema);
        let names: Vec<&str> = set.iter().map(|m| m.type_name()).collect();
        assert_eq!(names, ["em", "strong"]);
    }

    #[test]
    fn same_type_replaces() {
        let schema = markdown_schema();
        let star = Mark::new("em", attrs([("markup", "*")]));
        let underscore = Mark::new("em", attrs([("markup", "_")]));
        let set = star.add_to_set(&[], &schema);
        let set = underscore.add_to_set(&set, &schema);
        assert_eq!(set.len(), 1);
        assert_eq!(set[0].attr("markup").and_then(|v| v.as_str()), Some("_"));
    }

    #[test]
    fn code_excludes_emphasis() {
        let schema = markdown_schema();
        let em = Mark::new("em", attrs([("markup", "*")]));
        let code = Mark::new("code", attrs([("markup", "`")]));
        let set = em.add_to_set(&[], &schema);
        let set = code.add_to_set(&set, &schema);
        let names: Vec<&str> = set.iter().map(|m| m.type_name()).collect();
        assert_eq!(names, ["code"]);
    }
}
