//! Plain-text rendering. Every function returns the text to print.

use fastn::client::{Connection, Project, Skill, SkillRun};
use fastn::{ConnectorEntry, ConnectorSummary, FastnError, ToolEntry};
use serde::Serialize;

pub fn json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Left-aligned columns separated by two spaces.
fn table(headers: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.iter().map(|h| h.to_string()).collect())];
    out.extend(rows.into_iter().map(line));
    out.join("\n")
}

pub fn connectors(list: &[ConnectorSummary]) -> String {
    if list.is_empty() {
        return "No connectors installed. Run `fastn kit sync`.".to_string();
    }
    table(
        &["NAME", "DISPLAY NAME", "CATEGORY", "TOOLS"],
        list.iter()
            .map(|c| {
                vec![
                    c.name.clone(),
                    c.display_name.clone(),
                    c.category.clone(),
                    c.tool_count.to_string(),
                ]
            })
            .collect(),
    )
}

pub fn connector(entry: &ConnectorEntry) -> String {
    let mut out = format!(
        "{} ({})\ncategory: {}\ntools: {}",
        entry.display_name,
        entry.name,
        entry.category,
        entry.tools.len()
    );
    if entry.has_tools() {
        out.push_str("\n\n");
        out.push_str(&tools(&entry.tools));
    }
    out
}

pub fn tools(list: &[ToolEntry]) -> String {
    if list.is_empty() {
        return "No tools installed for this connector.".to_string();
    }
    table(
        &["TOOL", "ACTION ID", "DESCRIPTION"],
        list.iter()
            .map(|t| vec![t.name.clone(), t.action_id.clone(), t.description.clone()])
            .collect(),
    )
}

pub fn projects(list: &[Project], current: Option<&str>) -> String {
    if list.is_empty() {
        return "No projects found.".to_string();
    }
    table(
        &["ID", "NAME", "CURRENT"],
        list.iter()
            .map(|p| {
                let marker = if current == Some(p.id.as_str()) { "*" } else { "" };
                vec![p.id.clone(), p.name.clone(), marker.to_string()]
            })
            .collect(),
    )
}

pub fn skills(list: &[Skill]) -> String {
    if list.is_empty() {
        return "No skills in this project.".to_string();
    }
    table(
        &["ID", "NAME", "DESCRIPTION"],
        list.iter()
            .map(|s| {
                vec![
                    s.id.clone(),
                    s.name.clone(),
                    s.description.clone().unwrap_or_default(),
                ]
            })
            .collect(),
    )
}

pub fn run(run: &SkillRun) -> String {
    let mut out = format!("run: {}\nstatus: {}", run.run_id, run.status);
    if let Some(result) = &run.result {
        out.push_str(&format!("\nresult: {}", result));
    }
    out
}

pub fn connections(list: &[Connection]) -> String {
    if list.is_empty() {
        return "No connections configured.".to_string();
    }
    table(
        &["ID", "NAME", "STATUS"],
        list.iter()
            .map(|c| {
                vec![
                    c.id.clone(),
                    c.name.clone().unwrap_or_default(),
                    c.status.clone().unwrap_or_default(),
                ]
            })
            .collect(),
    )
}

/// Error text for stderr. SDK errors print their structured details in
/// JSON mode.
pub fn error(err: &anyhow::Error, as_json: bool) -> String {
    match (as_json, err.downcast_ref::<FastnError>()) {
        (true, Some(fastn_err)) => fastn_err.details().to_string(),
        (true, None) => serde_json::json!({ "kind": "error", "message": format!("{:#}", err) })
            .to_string(),
        (false, _) => format!("Error: {:#}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_alignment() {
        let out = table(
            &["A", "B"],
            vec![
                vec!["long-value".to_string(), "x".to_string()],
                vec!["s".to_string(), "y".to_string()],
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "A           B");
        assert_eq!(lines[1], "long-value  x");
        assert_eq!(lines[2], "s           y");
    }

    #[test]
    fn test_empty_connector_list_hints_sync() {
        assert!(connectors(&[]).contains("fastn kit sync"));
    }

    #[test]
    fn test_projects_mark_current() {
        let list = vec![
            Project {
                id: "p1".to_string(),
                name: "Main".to_string(),
            },
            Project {
                id: "p2".to_string(),
                name: "Side".to_string(),
            },
        ];
        let out = projects(&list, Some("p2"));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "p1  Main");
        assert_eq!(lines[2], "p2  Side  *");
        assert_eq!(projects(&[], None), "No projects found.");
    }

    #[test]
    fn test_error_rendering() {
        let err = anyhow::Error::new(FastnError::ConnectorNotFound {
            connector: "jira".to_string(),
        });
        assert!(error(&err, false).starts_with("Error: Connector 'jira'"));

        let json: serde_json::Value = serde_json::from_str(&error(&err, true)).unwrap();
        assert_eq!(json["kind"], "connector_not_found");
        assert_eq!(json["details"]["connector"], "jira");
    }
}
