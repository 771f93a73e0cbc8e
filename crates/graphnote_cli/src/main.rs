//! Command-line front end over a local GraphNote database.
//!
//! # Responsibility
//! - Drive a `WorkspaceSession` against `SqliteRowStore` for scripting and
//!   quick local checks.
//! - Print the resulting graph as JSON so output stays deterministic.

use graphnote_core::config::env_vars;
use graphnote_core::{
    default_log_level, init_logging, Category, EngineConfig, LocalAuth, NodeDraft, NodeId,
    SearchOutcome, SqliteRowStore, WorkspaceSession,
};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "usage: graphnote_cli [db_path|:memory:] [workspace] \
[show | add <name> [category] | link <source_id> <target_id> | search <text> | rm <id>]";
const IN_MEMORY: &str = ":memory:";

enum Command {
    Show,
    Add { name: String, category: Option<Category> },
    Link { source: NodeId, target: NodeId },
    Search(String),
    Remove(NodeId),
}

impl Command {
    fn parse(args: &[String]) -> Result<Self, String> {
        let (verb, rest) = match args.split_first() {
            None => return Ok(Self::Show),
            Some((verb, rest)) => (verb.as_str(), rest),
        };
        match (verb, rest) {
            ("show", []) => Ok(Self::Show),
            ("add", [name]) => Ok(Self::Add {
                name: name.clone(),
                category: None,
            }),
            ("add", [name, category]) => Ok(Self::Add {
                name: name.clone(),
                category: Some(Category::parse(category)),
            }),
            ("link", [source, target]) => Ok(Self::Link {
                source: parse_node_id(source)?,
                target: parse_node_id(target)?,
            }),
            ("search", words) if !words.is_empty() => Ok(Self::Search(words.join(" "))),
            ("rm", [id]) => Ok(Self::Remove(parse_node_id(id)?)),
            _ => Err(USAGE.to_string()),
        }
    }
}

fn parse_node_id(raw: &str) -> Result<NodeId, String> {
    raw.parse::<i64>()
        .map(NodeId)
        .map_err(|_| format!("invalid node id `{raw}`"))
}

fn init_logging_from_env() {
    let Ok(dir) = std::env::var(env_vars::LOG_DIR) else {
        return;
    };
    let level =
        std::env::var(env_vars::LOG_LEVEL).unwrap_or_else(|_| default_log_level().to_string());
    if let Err(err) = init_logging(&level, &dir) {
        eprintln!("logging disabled: {err}");
    }
}

async fn run(
    db_path: Option<&str>,
    workspace: Option<&str>,
    command: Command,
) -> Result<(), Box<dyn Error>> {
    let store = match db_path {
        None | Some(IN_MEMORY) => SqliteRowStore::open_in_memory()?,
        Some(path) => SqliteRowStore::open(path)?,
    };
    let mut config = EngineConfig::from_env()?;
    if let Some(workspace) = workspace {
        config.default_workspace = workspace.to_string();
    }
    store.ensure_workspace(&config.default_workspace)?;

    let mut session = WorkspaceSession::new(Arc::new(store), config);
    session.start(&LocalAuth::new("local")).await?;

    match command {
        Command::Show => {}
        Command::Add { name, category } => {
            let mut draft = NodeDraft::new(name);
            if let Some(category) = category {
                draft = draft.with_category(category);
            }
            let node = session.add_node(draft).await?;
            println!("added id={}", node.id);
        }
        Command::Link { source, target } => {
            session.toggle_connect().await?;
            session.node_clicked(source).await?;
            session.node_clicked(target).await?;
        }
        Command::Search(text) => {
            if let SearchOutcome::Results(hits) = session.search(&text) {
                for hit in hits {
                    println!(
                        "{}\t{}\t{}\t{}",
                        hit.id,
                        hit.name,
                        hit.color,
                        hit.preview.unwrap_or_default()
                    );
                }
            }
            return Ok(());
        }
        Command::Remove(id) => {
            let report = session.delete_node(id).await?;
            println!("removed id={} links={}", report.node, report.links_removed);
        }
    }

    let failed = session.flush().await;
    if failed > 0 {
        eprintln!("{failed} notes could not be saved");
    }
    println!("{}", serde_json::to_string_pretty(&*session.snapshot())?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    eprintln!(
        "graphnote_core ping={} version={}",
        graphnote_core::ping(),
        graphnote_core::core_version()
    );
    let args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = args.first().map(String::as_str);
    let workspace = args.get(1).map(String::as_str);
    let rest = args.get(2..).unwrap_or_default();
    let command = match Command::parse(rest) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    init_logging_from_env();
    match run(db_path, workspace, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Command;
    use graphnote_core::{Category, NodeId};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn empty_command_shows_graph() {
        assert!(matches!(Command::parse(&[]), Ok(Command::Show)));
    }

    #[test]
    fn add_accepts_optional_category() {
        match Command::parse(&args(&["add", "Algebra", "math"])) {
            Ok(Command::Add { name, category }) => {
                assert_eq!(name, "Algebra");
                assert_eq!(category, Some(Category::Math));
            }
            _ => panic!("expected add"),
        }
    }

    #[test]
    fn link_requires_numeric_ids() {
        assert!(matches!(
            Command::parse(&args(&["link", "1", "2"])),
            Ok(Command::Link { source: NodeId(1), target: NodeId(2) })
        ));
        assert!(Command::parse(&args(&["link", "1", "x"])).is_err());
    }
}
