// `atelier info <name>`: show one workspace.

use anyhow::{anyhow, Result};
use atelier_common::types::OwnerId;
use clap::Args;
use serde_json::json;

use super::{connect, execute, format_record, CommonArgs, WorkspaceResult};

#[derive(Debug, Args)]
pub struct InfoArgs {
    /// Workspace name.
    name: String,

    #[command(flatten)]
    common: CommonArgs,
}

pub fn run(args: InfoArgs) -> Result<()> {
    execute(args.common.format(), call_info(args.name, args.common.owner), format_human)
}

async fn call_info(name: String, owner: Option<OwnerId>) -> Result<WorkspaceResult> {
    let result: WorkspaceResult = connect()
        .await?
        .call("workspace.get", json!({ "owner_id": owner, "name": name }))
        .await?;
    if result.workspace.is_none() {
        return Err(anyhow!("workspace `{name}` not found"));
    }
    Ok(result)
}

fn format_human(result: &WorkspaceResult) -> String {
    result.workspace.as_ref().map(format_record).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::sample_record;

    #[test]
    fn human_format_shows_record() {
        let result = WorkspaceResult { workspace: Some(sample_record("garden")) };
        let output = format_human(&result);
        assert!(output.starts_with("garden"));
        assert!(output.contains("/srv/garden"));
    }

    #[test]
    fn human_format_empty_when_absent() {
        assert_eq!(format_human(&WorkspaceResult { workspace: None }), "");
    }
}
