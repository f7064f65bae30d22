//! Read-only accessor over the registry.

use crate::error::{FastnError, Result};
use crate::registry::{ConnectorEntry, Registry, ToolEntry};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// One row of `list()`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectorSummary {
    pub name: String,
    pub display_name: String,
    pub category: String,
    pub tool_count: usize,
}

/// A search hit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolMatch {
    pub connector: String,
    pub tool: ToolEntry,
    pub score: u32,
}

const NAME_WEIGHT: u32 = 2;
const CONNECTOR_WEIGHT: u32 = 2;
const DESCRIPTION_WEIGHT: u32 = 1;

#[derive(Clone, Debug)]
pub struct Catalog {
    registry: Arc<Registry>,
}

impl Catalog {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Registry::load(path).map(Self::new)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn list(&self) -> Vec<ConnectorSummary> {
        self.registry
            .connectors
            .iter()
            .map(|c| ConnectorSummary {
                name: c.name.clone(),
                display_name: c.display_name.clone(),
                category: c.category.clone(),
                tool_count: c.tools.len(),
            })
            .collect()
    }

    pub fn get(&self, connector: &str) -> Result<Arc<ConnectorEntry>> {
        self.registry
            .connector(connector)
            .cloned()
            .ok_or_else(|| FastnError::ConnectorNotFound {
                connector: connector.to_string(),
            })
    }

    /// Every tool of `connector`. Empty for a connector with no tools.
    pub fn get_tools(&self, connector: &str) -> Result<Vec<ToolEntry>> {
        Ok(self.get(connector)?.tools.clone())
    }

    /// Resolve one tool, falling back to an underscore-stripped match.
    pub fn get_tool(&self, connector: &str, tool: &str) -> Result<ToolEntry> {
        let entry = self.get(connector)?;
        entry
            .resolve_tool(tool)
            .cloned()
            .ok_or_else(|| FastnError::ToolNotFound {
                connector: connector.to_string(),
                tool: tool.to_string(),
                has_tools: entry.has_tools(),
            })
    }

    /// Score every tool against `query`, optionally within one connector.
    ///
    /// The query is lower-cased and split on non-alphanumerics. Each term
    /// found in the tool name adds 2, in the connector name 2, in the
    /// description 1. Zero-score tools are dropped unless the query is empty;
    /// equal scores keep registry order.
    ///
    /// # Returns
    /// * `Err(ConnectorNotFound)` - `connector` given but not installed
    pub fn search(&self, query: &str, connector: Option<&str>) -> Result<Vec<ToolMatch>> {
        let scoped;
        let connectors: &[Arc<ConnectorEntry>] = match connector {
            Some(name) => {
                scoped = [self.get(name)?];
                &scoped
            }
            None => &self.registry.connectors,
        };

        let terms = query_terms(query);
        let mut matches: Vec<ToolMatch> = connectors
            .iter()
            .flat_map(|c| c.tools.iter().map(move |t| (c, t)))
            .filter_map(|(c, t)| {
                let score = score(&terms, c, t);
                (terms.is_empty() || score > 0).then(|| ToolMatch {
                    connector: c.name.clone(),
                    tool: t.clone(),
                    score,
                })
            })
            .collect();

        // Stable sort keeps registry order among equal scores.
        matches.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(matches)
    }
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn score(terms: &[String], connector: &ConnectorEntry, tool: &ToolEntry) -> u32 {
    let name = tool.name.to_lowercase();
    let connector_name = connector.name.to_lowercase();
    let description = tool.description.to_lowercase();

    terms
        .iter()
        .map(|term| {
            let mut s = 0;
            if name.contains(term.as_str()) {
                s += NAME_WEIGHT;
            }
            if connector_name.contains(term.as_str()) {
                s += CONNECTOR_WEIGHT;
            }
            if description.contains(term.as_str()) {
                s += DESCRIPTION_WEIGHT;
            }
            s
        })
        .sum()
}
