use std::process::ExitCode;

use clap::Parser;
use log::info;
use threadlink_core::{
    LinkOptions, SourceRoots, ThreadInput, forest_report_to_raw_json, link_thread_inputs,
    render_forest_markdown,
};

#[derive(Debug, Parser)]
#[command(
    name = "threadlink",
    version,
    about = "Link Codex threads to the sub-agent threads they spawned"
)]
struct Cli {
    /// Thread inputs: codex://<session_id>, codex://threads/<session_id>, or a path to
    /// a thread JSON document, app-server event stream, or rollout file
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output raw JSON instead of markdown
    #[arg(long)]
    raw: bool,

    /// Workspace id reported with each detected sub-agent thread
    #[arg(
        long,
        env = "THREADLINK_WORKSPACE",
        default_value = threadlink_core::DEFAULT_WORKSPACE_ID
    )]
    workspace: String,

    /// Also load newly detected sub-agent threads from CODEX_HOME
    #[arg(long)]
    follow: bool,
}

fn main() -> ExitCode {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("threadlink=warn,threadlink_core=warn"),
    )
    .format_timestamp_millis()
    .try_init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> threadlink_core::Result<()> {
    let roots = SourceRoots::from_env_or_home()?;
    let inputs = cli
        .inputs
        .iter()
        .map(|input| ThreadInput::parse(input))
        .collect::<threadlink_core::Result<Vec<_>>>()?;
    let options = LinkOptions {
        workspace_id: cli.workspace,
        follow_subagents: cli.follow,
    };

    info!(
        "linking {} inputs in workspace {}",
        inputs.len(),
        options.workspace_id
    );
    let report = link_thread_inputs(&inputs, &roots, &options)?;

    if cli.raw {
        let raw_json = forest_report_to_raw_json(&report)?;
        print!("{raw_json}");
    } else {
        let markdown = render_forest_markdown(&report);
        print!("{markdown}");
    }

    Ok(())
}
