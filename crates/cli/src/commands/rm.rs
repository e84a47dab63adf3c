// `atelier rm <name>`: remove a workspace.

use anyhow::Result;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{connect, execute, CommonArgs};
use crate::output;

#[derive(Debug, Args)]
pub struct RmArgs {
    /// Workspace to remove.
    name: String,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RmResult {
    pub removed: bool,
}

pub fn run(args: RmArgs) -> Result<()> {
    let format = args.common.format();
    let name = args.name.clone();
    execute(format, call_rm(args), |result: &RmResult| {
        if !result.removed {
            output::print_warning(format, "NOT_FOUND", &format!("no workspace named `{name}`"));
        }
        format_human(&name, result)
    })
}

async fn call_rm(args: RmArgs) -> Result<RmResult> {
    connect()
        .await?
        .call("workspace.remove", json!({ "owner_id": args.common.owner, "name": args.name }))
        .await
}

fn format_human(name: &str, result: &RmResult) -> String {
    if result.removed {
        format!("Removed {name}.")
    } else {
        format!("Nothing to remove for {name}.")
    }
}
