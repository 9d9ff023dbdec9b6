// FILE: crates/cli/src/main.rs

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use heirloom_config::ConfigManager;
use heirloom_sync_engine::EntityType;
use std::path::PathBuf;

mod commands;

use commands::Session;

fn build_cli() -> Command {
    Command::new("heirloom")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Heirloom Developers")
        .about("Inspect and manage the Heirloom offline sync queue")
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .value_name("DIR")
                .help("Directory holding the sync queue (overrides config)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("config-dir")
                .long("config-dir")
                .value_name("DIR")
                .help("Directory holding config.toml")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .subcommand(Command::new("init").about("Write the default config and create the queue directory"))
        .subcommand(
            Command::new("enqueue")
                .about("Queue a record for sync")
                .arg(
                    Arg::new("entity-type")
                        .required(true)
                        .value_name("ENTITY_TYPE")
                        .value_parser(EntityType::ALL.map(|e| e.as_str()))
                        .help("Kind of record"),
                )
                .arg(
                    Arg::new("payload")
                        .required(true)
                        .value_name("PAYLOAD_JSON")
                        .help("Record payload as a JSON object"),
                ),
        )
        .subcommand(
            Command::new("status")
                .about("Show queue counts")
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("list")
                .about("List queued items")
                .arg(
                    Arg::new("abandoned")
                        .short('a')
                        .long("abandoned")
                        .help("List abandoned items instead")
                        .action(ArgAction::SetTrue),
                )
                .arg(json_flag()),
        )
        .subcommand(
            Command::new("requeue")
                .about("Move an abandoned item back into the queue")
                .arg(Arg::new("id").required(true).value_name("ITEM_ID").help("Item ID (UUID)")),
        )
        .subcommand(
            Command::new("discard")
                .about("Permanently delete an abandoned item")
                .arg(Arg::new("id").required(true).value_name("ITEM_ID").help("Item ID (UUID)")),
        )
        .subcommand(Command::new("check").about("Probe network connectivity"))
        .subcommand(Command::new("watch").about("Report connectivity changes until interrupted"))
}

fn json_flag() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Print JSON instead of text")
        .action(ArgAction::SetTrue)
}

fn load_session(matches: &ArgMatches) -> Result<(ConfigManager, Session)> {
    let manager = match matches.get_one::<PathBuf>("config-dir") {
        Some(dir) => ConfigManager::with_directory(dir.clone()),
        None => ConfigManager::new(),
    }
    .context("Failed to resolve config directory")?;

    let mut config = manager
        .load_with_env_overrides()
        .with_context(|| format!("Failed to load {}", manager.config_path().display()))?;
    if let Some(dir) = matches.get_one::<PathBuf>("data-dir") {
        config.app.data_dir = Some(dir.clone());
    }

    let data_dir = manager.data_dir(&config);
    Ok((manager, Session { config, data_dir }))
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| anyhow::anyhow!("{} is required", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();
    let (manager, session) = load_session(&matches)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(session.config.app.log_level.to_string()),
    )
    .init();

    match matches.subcommand() {
        Some(("init", _)) => commands::init(&manager, &session),
        Some(("enqueue", sub)) => {
            commands::enqueue(&session, required(sub, "entity-type")?, required(sub, "payload")?)
                .map(|_| ())
        }
        Some(("status", sub)) => commands::status(&session, sub.get_flag("json")),
        Some(("list", sub)) => commands::list(&session, sub.get_flag("abandoned"), sub.get_flag("json")),
        Some(("requeue", sub)) => commands::requeue(&session, required(sub, "id")?).map(|_| ()),
        Some(("discard", sub)) => commands::discard(&session, required(sub, "id")?).map(|_| ()),
        Some(("check", _)) => commands::check(&session).await,
        Some(("watch", _)) => commands::watch(&session).await,
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        build_cli().debug_assert();
    }

    #[test]
    fn test_enqueue_rejects_unknown_entity() {
        let result = build_cli().try_get_matches_from(["heirloom", "enqueue", "painting", "{}"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_data_dir() {
        let matches = build_cli()
            .try_get_matches_from(["heirloom", "list", "--abandoned", "--data-dir", "/tmp/q"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "list");
        assert!(sub.get_flag("abandoned"));
        assert_eq!(
            sub.get_one::<PathBuf>("data-dir"),
            Some(&PathBuf::from("/tmp/q"))
        );
    }
}
