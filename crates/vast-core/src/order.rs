use crate::fields::FieldTable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// One sort criterion; serialises as `["field", "asc"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey(pub String, pub Direction);

impl SortKey {
    pub fn field(&self) -> &str {
        &self.0
    }

    pub fn direction(&self) -> Direction {
        self.1
    }
}

/// Parse a comma-separated sort spec such as `num_gpus,score-`.
///
/// A `-` on either end of a name sorts that field descending. Blank entries
/// are skipped and aliases resolve through `fields`.
pub fn parse_order(spec: &str, fields: &FieldTable) -> Vec<SortKey> {
    spec.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter_map(|name| {
            let field = name.trim_matches('-');
            if field.is_empty() {
                return None;
            }
            let direction = if field.len() != name.len() {
                Direction::Desc
            } else {
                Direction::Asc
            };
            Some(SortKey(fields.resolve(field).to_string(), direction))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_order() {
        let order = parse_order("score-", &FieldTable::offers());
        assert_eq!(order, vec![SortKey("score".to_string(), Direction::Desc)]);
    }

    #[test]
    fn test_multiple_keys_with_aliases() {
        let order = parse_order("num_gpus, dph-,,reliability", &FieldTable::offers());

        assert_eq!(
            serde_json::to_value(&order).unwrap(),
            json!([
                ["num_gpus", "asc"],
                ["dph_total", "desc"],
                ["reliability2", "asc"]
            ])
        );
    }

    #[test]
    fn test_blank_spec() {
        assert!(parse_order("", &FieldTable::offers()).is_empty());
        assert!(parse_order(" , -", &FieldTable::offers()).is_empty());
    }
}
