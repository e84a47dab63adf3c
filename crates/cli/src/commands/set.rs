// `atelier set <name>`: apply a partial update, creating the workspace if
// it does not exist yet.

use anyhow::Result;
use atelier_common::types::WorkspacePatch;
use clap::Args;
use serde_json::json;

use super::{absolute_dir, connect, execute, format_record, CommonArgs, WorkspaceResult};

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Workspace to update.
    name: String,

    /// New name for the workspace.
    #[arg(long)]
    rename: Option<String>,

    /// Directory to serve. Pass an empty string to unbind.
    #[arg(long)]
    path: Option<String>,

    /// Archive key or `dat://` URL to publish to. Pass an empty string to clear.
    #[arg(long)]
    publish_target: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

pub fn run(args: SetArgs) -> Result<()> {
    let format = args.common.format();
    execute(format, call_set(args), format_human)
}

async fn call_set(args: SetArgs) -> Result<WorkspaceResult> {
    let patch = build_patch(&args)?;
    connect()
        .await?
        .call(
            "workspace.set",
            json!({ "owner_id": args.common.owner, "name": args.name, "patch": patch }),
        )
        .await
}

fn build_patch(args: &SetArgs) -> Result<WorkspacePatch> {
    Ok(WorkspacePatch {
        name: args.rename.clone(),
        local_files_path: args.path.as_deref().map(absolute_dir).transpose()?,
        publish_target_url: args.publish_target.clone(),
    })
}

fn format_human(result: &WorkspaceResult) -> String {
    result.workspace.as_ref().map(format_record).unwrap_or_default()
}
