// `atelier new`: register a workspace, generating a name unless one is given.

use anyhow::Result;
use atelier_common::types::WorkspacePatch;
use clap::Args;
use serde_json::json;

use super::{absolute_dir, connect, execute, format_record, CommonArgs, WorkspaceResult};

#[derive(Debug, Args)]
pub struct NewArgs {
    /// Name to use instead of a generated one.
    #[arg(long)]
    name: Option<String>,

    /// Directory to serve (relative paths resolve against the current directory).
    #[arg(long)]
    path: Option<String>,

    /// Archive key or `dat://` URL to publish to.
    #[arg(long)]
    publish_target: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

pub fn run(args: NewArgs) -> Result<()> {
    let format = args.common.format();
    execute(format, call_new(args), format_human)
}

async fn call_new(args: NewArgs) -> Result<WorkspaceResult> {
    let patch = build_patch(&args)?;
    connect()
        .await?
        .call("workspace.create", json!({ "owner_id": args.common.owner, "patch": patch }))
        .await
}

fn build_patch(args: &NewArgs) -> Result<WorkspacePatch> {
    Ok(WorkspacePatch {
        name: args.name.clone(),
        local_files_path: args.path.as_deref().map(absolute_dir).transpose()?,
        publish_target_url: args.publish_target.clone(),
    })
}

fn format_human(result: &WorkspaceResult) -> String {
    match &result.workspace {
        Some(record) => format!("Created {}", format_record(record)),
        None => "Created workspace.".into(),
    }
}
