//! Tool subsystem for agent-callable capabilities.
//!
//! Each tool implements the [`Tool`] trait defined in [`traits`]: a name, a
//! description, a JSON parameter schema and an async `execute` returning a
//! structured [`ToolResult`]. The document tools are [`QueryEngineTool`]s
//! described by the static [`catalog`]; a [`ToolRetriever`] narrows them to a
//! few candidates per turn.

pub mod catalog;
pub mod query;
pub mod retriever;
pub mod traits;

pub use catalog::{CatalogEntry, CATALOG};
pub use query::QueryEngineTool;
pub use retriever::{EmbeddingToolRetriever, StaticToolRetriever, ToolRetriever};
pub use traits::Tool;
#[allow(unused_imports)]
pub use traits::{ToolResult, ToolSpec};

use std::sync::Arc;

/// Look up a tool by name.
pub fn find_tool<'a>(tools: &'a [Arc<dyn Tool>], name: &str) -> Option<&'a Arc<dyn Tool>> {
    tools.iter().find(|t| t.name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::QueryEngine;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl QueryEngine for Echo {
        async fn query(&self, question: &str) -> anyhow::Result<String> {
            Ok(question.to_string())
        }
    }

    fn catalog_tools() -> Vec<Arc<dyn Tool>> {
        CATALOG
            .iter()
            .flat_map(|entry| {
                [
                    Arc::new(QueryEngineTool::new(
                        entry.summary_tool_name(),
                        entry.summary_description,
                        Arc::new(Echo),
                    )) as Arc<dyn Tool>,
                    Arc::new(QueryEngineTool::new(
                        entry.lookup_tool_name(),
                        entry.lookup_description,
                        Arc::new(Echo),
                    )) as Arc<dyn Tool>,
                ]
            })
            .collect()
    }

    #[test]
    fn catalog_tools_all_have_schemas() {
        let tools = catalog_tools();
        assert_eq!(tools.len(), 14);
        for tool in &tools {
            let schema = tool.parameters_schema();
            assert!(
                schema["properties"].is_object(),
                "Tool {} schema has no properties",
                tool.name()
            );
        }
    }

    #[test]
    fn tool_spec_generation() {
        for tool in &catalog_tools() {
            let spec = tool.spec();
            assert_eq!(spec.name, tool.name());
            assert_eq!(spec.description, tool.description());
            assert!(spec.parameters.is_object());
        }
    }

    #[test]
    fn find_tool_by_name() {
        let tools = catalog_tools();
        assert!(find_tool(&tools, "knowledge_base_lookup").is_some());
        assert!(find_tool(&tools, "shell").is_none());
    }

    #[test]
    fn tool_result_serde() {
        let result = ToolResult::ok("hello");
        let json = serde_json::to_string(&result).unwrap();
        let parsed: ToolResult = serde_json::from_str(&json).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.output, "hello");
        assert!(parsed.error.is_none());
    }

    #[test]
    fn tool_result_with_error_serde() {
        let result = ToolResult::failed("boom");
        let json = serde_json::to_string(&result).unwrap();
        let parsed: ToolResult = serde_json::from_str(&json).unwrap();
        assert!(!parsed.success);
        assert_eq!(parsed.error.as_deref(), Some("boom"));
    }
}
