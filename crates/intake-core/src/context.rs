use serde_json::{Map, Value};

/// The three scopes visible to expressions and compute definitions.
///
/// `computed` doubles as the memo map while the compute engine is running;
/// by the time rules are evaluated it holds every resolved value.
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    pub answers: Map<String, Value>,
    pub computed: Map<String, Value>,
    pub metadata: Map<String, Value>,
}

impl EvaluationContext {
    pub fn new(answers: Map<String, Value>, metadata: Map<String, Value>) -> Self {
        Self {
            answers,
            computed: Map::new(),
            metadata,
        }
    }

    /// Resolves a dotted path like `answers.sleep.start` to a value.
    ///
    /// The first segment selects a scope, the rest walk nested string-keyed
    /// maps. Any miss (unknown scope, missing key, walking into a non-map)
    /// yields `None`; arrays are never indexed.
    pub fn resolve(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let scope = match segments.next()? {
            "answers" => &self.answers,
            "computed" => &self.computed,
            "metadata" => &self.metadata,
            _ => return None,
        };
        let mut current = scope.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        let answers = json!({
            "age": 24,
            "sleep": { "start": "22:00", "end": "06:00" }
        });
        let metadata = json!({ "site": "main" });
        EvaluationContext::new(
            answers.as_object().unwrap().clone(),
            metadata.as_object().unwrap().clone(),
        )
    }

    #[test]
    fn resolves_top_level_and_nested() {
        let ctx = ctx();
        assert_eq!(ctx.resolve("answers.age"), Some(&json!(24)));
        assert_eq!(ctx.resolve("answers.sleep.start"), Some(&json!("22:00")));
        assert_eq!(ctx.resolve("metadata.site"), Some(&json!("main")));
    }

    #[test]
    fn misses_yield_none() {
        let ctx = ctx();
        assert_eq!(ctx.resolve("answers.missing"), None);
        assert_eq!(ctx.resolve("answers.sleep.start.deeper"), None);
        assert_eq!(ctx.resolve("answers.age.nested"), None);
        assert_eq!(ctx.resolve("unknown.age"), None);
        assert_eq!(ctx.resolve("answers"), None);
    }
}
