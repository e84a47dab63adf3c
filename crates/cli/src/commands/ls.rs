// `atelier ls`: list registered workspaces.

use anyhow::Result;
use atelier_common::types::WorkspaceRecord;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{connect, execute, CommonArgs};

#[derive(Debug, Args)]
pub struct LsArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LsResult {
    #[serde(default)]
    pub items: Vec<WorkspaceRecord>,
    #[serde(default)]
    pub total: usize,
}

pub fn run(args: LsArgs) -> Result<()> {
    execute(args.common.format(), call_ls(args.common.clone()), format_human)
}

async fn call_ls(common: CommonArgs) -> Result<LsResult> {
    connect().await?.call("workspace.list", json!({ "owner_id": common.owner })).await
}

fn format_human(result: &LsResult) -> String {
    if result.items.is_empty() {
        return "No workspaces registered.".into();
    }

    let width = result.items.iter().map(|item| item.name.chars().count()).max().unwrap_or(0);
    let mut lines = vec![format!("{} workspace(s)", result.total)];
    for item in &result.items {
        let published = match item.publish_target_url.as_deref() {
            Some(url) if !url.is_empty() => format!(" -> {url}"),
            _ => String::new(),
        };
        lines.push(format!(
            "  {:<width$}  {}{published}",
            item.name,
            item.bound_directory().unwrap_or("(no directory)"),
        ));
    }
    lines.join("\n")
}
