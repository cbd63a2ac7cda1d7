//! Conditional blocks and variant selection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::condition::Condition;

/// A group of mutually exclusive alternative texts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalBlock {
    /// Block id
    pub id: String,

    /// Type tag, always `conditional`
    #[serde(rename = "type", default)]
    pub kind: BlockKind,

    /// Gates the whole block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_condition: Option<Condition>,

    /// Alternatives in priority order
    #[serde(default)]
    pub variants: Vec<Variant>,

    /// Variant used when no condition matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_variant_id: Option<String>,
}

/// Type tag carried by conditional blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// The only block kind
    #[default]
    Conditional,
}

/// One alternative text of a conditional block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// Variant id
    pub id: String,

    /// Display label, e.g. "Singolare" / "Plurale"
    #[serde(default)]
    pub label: String,

    /// Selects this variant when true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    /// Template source of the variant
    #[serde(default)]
    pub content: String,

    /// Fallback marker
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
}

impl Variant {
    /// Create an unconditional variant.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            condition: None,
            content: content.into(),
            is_default: false,
        }
    }

    /// Attach a selection condition.
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Mark as a default variant.
    pub fn default_variant(mut self) -> Self {
        self.is_default = true;
        self
    }
}

impl ConditionalBlock {
    /// Create a block from its variants.
    pub fn new(id: impl Into<String>, variants: Vec<Variant>) -> Self {
        Self {
            id: id.into(),
            kind: BlockKind::Conditional,
            show_condition: None,
            variants,
            default_variant_id: None,
        }
    }

    /// Choose the variant to render for a record, if any.
    pub fn select(&self, record: &Value) -> Option<&Variant> {
        select_variant(self, record)
    }
}

/// Select the variant of a block for a record.
///
/// Precedence:
/// 1. a false show condition hides the block;
/// 2. the first variant whose condition holds;
/// 3. the variant named by `default_variant_id`;
/// 4. the first variant flagged default;
/// 5. the first variant without a condition;
/// 6. the first variant.
///
/// An empty variant list selects nothing.
pub fn select_variant<'a>(block: &'a ConditionalBlock, record: &Value) -> Option<&'a Variant> {
    if let Some(show) = &block.show_condition {
        if !show.evaluate(record) {
            log::debug!("Block '{}' hidden by its show condition", block.id);
            return None;
        }
    }

    let chosen = block
        .variants
        .iter()
        .find(|v| v.condition.as_ref().is_some_and(|c| c.evaluate(record)))
        .or_else(|| {
            block
                .default_variant_id
                .as_deref()
                .and_then(|id| block.variants.iter().find(|v| v.id == id))
        })
        .or_else(|| block.variants.iter().find(|v| v.is_default))
        .or_else(|| block.variants.iter().find(|v| v.condition.is_none()))
        .or_else(|| block.variants.first());

    if chosen.is_none() {
        log::warn!("No valid variant for block '{}'", block.id);
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Operator;
    use serde_json::json;

    fn count_is(n: i64) -> Condition {
        Condition::new("compressori.length", Operator::Eq, n)
    }

    fn record(n: usize) -> Value {
        json!({ "compressori": vec![json!({}); n] })
    }

    #[test]
    fn test_first_matching_condition_wins() {
        let block = ConditionalBlock::new(
            "compressori",
            vec![
                Variant::new("single", "un compressore").when(count_is(1)),
                Variant::new("plural", "più compressori").when(count_is(2)),
                Variant::new("also-two", "due").when(count_is(2)),
            ],
        );
        assert_eq!(block.select(&record(2)).map(|v| v.id.as_str()), Some("plural"));
    }

    #[test]
    fn test_default_variant_id_beats_flags() {
        let mut block = ConditionalBlock::new(
            "b",
            vec![
                Variant::new("flagged", "a").when(count_is(9)).default_variant(),
                Variant::new("named", "b").when(count_is(8)),
            ],
        );
        block.default_variant_id = Some("named".into());
        assert_eq!(block.select(&record(0)).map(|v| v.id.as_str()), Some("named"));

        block.default_variant_id = Some("missing".into());
        assert_eq!(block.select(&record(0)).map(|v| v.id.as_str()), Some("flagged"));
    }

    #[test]
    fn test_first_default_flag_is_used() {
        let block = ConditionalBlock::new(
            "b",
            vec![
                Variant::new("plain", "x"),
                Variant::new("d1", "y").when(count_is(9)).default_variant(),
                Variant::new("d2", "z").default_variant(),
            ],
        );
        assert_eq!(block.select(&record(0)).map(|v| v.id.as_str()), Some("d1"));
    }

    #[test]
    fn test_unconditioned_then_first() {
        let block = ConditionalBlock::new(
            "b",
            vec![
                Variant::new("c1", "x").when(count_is(9)),
                Variant::new("free", "y"),
            ],
        );
        assert_eq!(block.select(&record(0)).map(|v| v.id.as_str()), Some("free"));

        let block = ConditionalBlock::new(
            "b",
            vec![
                Variant::new("c1", "x").when(count_is(9)),
                Variant::new("c2", "y").when(count_is(8)),
            ],
        );
        assert_eq!(block.select(&record(0)).map(|v| v.id.as_str()), Some("c1"));
    }

    #[test]
    fn test_empty_and_hidden_blocks() {
        let empty = ConditionalBlock::new("empty", Vec::new());
        assert!(empty.select(&record(1)).is_none());

        let mut hidden = ConditionalBlock::new("hidden", vec![Variant::new("v", "x")]);
        hidden.show_condition = Some(Condition::new("compressori.length", Operator::Gt, 0));
        assert!(hidden.select(&record(0)).is_none());
        assert!(hidden.select(&record(1)).is_some());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let block = ConditionalBlock::new(
            "b",
            vec![
                Variant::new("a", "x").default_variant(),
                Variant::new("b", "y").default_variant(),
            ],
        );
        let r = record(3);
        let first = block.select(&r).map(|v| v.id.clone());
        assert_eq!(first.as_deref(), Some("a"));
        for _ in 0..5 {
            assert_eq!(block.select(&r).map(|v| v.id.clone()), first);
        }
    }

    #[test]
    fn test_block_json_shape() {
        let raw = json!({
            "id": "intro",
            "type": "conditional",
            "showCondition": {"field": "compressori", "operator": "isNotEmpty"},
            "variants": [
                {"id": "v1", "label": "Uno", "content": "Un compressore", "isDefault": true}
            ],
            "defaultVariantId": "v1"
        });
        let block: ConditionalBlock = serde_json::from_value(raw.clone()).unwrap();
        assert!(block.variants[0].is_default);
        assert_eq!(serde_json::to_value(&block).unwrap(), raw);
    }
}
