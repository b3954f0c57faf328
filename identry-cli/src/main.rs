use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use identry::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Profile body accepted by `replace`: scalar fields and the three child
/// collections side by side
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileDocument {
    #[serde(flatten)]
    fields: ProfileFields,
    #[serde(flatten)]
    children: ChildCollections,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = build_cli().get_matches();
    let config = load_config(matches.get_one::<String>("config")).await?;

    match matches.subcommand() {
        Some(("schema", sub)) => schema_command(&config, sub).await?,
        Some(("draft", sub)) => draft_command(&config, sub)?,
        Some(("merge", sub)) => merge_command(config, sub).await?,
        Some(("replace", sub)) => replace_command(config, sub).await?,
        Some(("publish", sub)) => publish_command(config, sub).await?,
        Some(("public", sub)) => public_command(config, sub).await?,
        Some(("preview", sub)) => preview_command(config, sub).await?,
        _ => {
            build_cli().print_help()?;
            std::process::exit(1);
        }
    }

    Ok(())
}

fn build_cli() -> Command {
    let account = || {
        Arg::new("account")
            .short('a')
            .long("account")
            .value_name("ID")
            .help("Authenticated account identifier")
            .required(true)
    };

    Command::new("identry")
        .version("0.1.0")
        .about("Manage profile drafts and synchronize them with PostgreSQL")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("YAML configuration file (defaults apply when omitted)"),
        )
        .subcommand(
            Command::new("schema")
                .about("Print the profile schema, or apply it to the database")
                .arg(
                    Arg::new("apply")
                        .long("apply")
                        .action(ArgAction::SetTrue)
                        .help("Run the schema against the configured database"),
                ),
        )
        .subcommand(
            Command::new("draft")
                .about("Inspect or edit the local unauthenticated draft")
                .subcommand_required(true)
                .subcommand(
                    Command::new("save")
                        .about("Store a JSON object as the current draft")
                        .arg(
                            Arg::new("file")
                                .short('f')
                                .long("file")
                                .value_name("FILE")
                                .help("JSON file holding the draft")
                                .required(true),
                        ),
                )
                .subcommand(Command::new("show").about("Print the current draft"))
                .subcommand(Command::new("clear").about("Discard the current draft")),
        )
        .subcommand(
            Command::new("merge")
                .about("Merge the local draft into the account's profile")
                .arg(account())
                .arg(
                    Arg::new("avatar-url")
                        .long("avatar-url")
                        .value_name("URL")
                        .help("Avatar reported by the identity provider"),
                ),
        )
        .subcommand(
            Command::new("replace")
                .about("Overwrite the account's profile from a JSON document")
                .arg(account())
                .arg(
                    Arg::new("file")
                        .short('f')
                        .long("file")
                        .value_name("FILE")
                        .help("JSON document with profile fields and collections")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("publish")
                .about("Change publication settings of the account's profile")
                .arg(account())
                .arg(
                    Arg::new("custom-id")
                        .long("custom-id")
                        .value_name("ID")
                        .help("Public identifier of the profile page"),
                )
                .arg(
                    Arg::new("private")
                        .long("private")
                        .action(ArgAction::SetTrue)
                        .help("Unpublish instead of publish"),
                )
                .arg(
                    Arg::new("hide")
                        .long("hide")
                        .value_name("BLOCK")
                        .action(ArgAction::Append)
                        .help("Hide a block (education, employment, portfolio, skills, social)"),
                )
                .arg(
                    Arg::new("show")
                        .long("show")
                        .value_name("BLOCK")
                        .action(ArgAction::Append)
                        .help("Show a previously hidden block"),
                ),
        )
        .subcommand(
            Command::new("public")
                .about("Print a published profile as visitors see it")
                .arg(Arg::new("custom-id").value_name("ID").required(true))
                .arg(
                    Arg::new("count-view")
                        .long("count-view")
                        .action(ArgAction::SetTrue)
                        .help("Increment the view counter"),
                ),
        )
        .subcommand(
            Command::new("preview")
                .about("Resolve the preview image of a portfolio link")
                .arg(Arg::new("url").value_name("URL").required(true)),
        )
}

async fn load_config(path: Option<&String>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => parse_config_file(path).await?,
        None => EngineConfig::default(),
    };
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = Some(url);
    }
    Ok(config)
}

async fn connect(config: EngineConfig, identity: StaticIdentity) -> Result<Identry> {
    Identry::connect(config, Arc::new(identity)).await
}

fn account_arg(matches: &ArgMatches) -> Result<AccountId> {
    let account = matches
        .get_one::<String>("account")
        .context("--account is required")?;
    Ok(AccountId::new(account.as_str()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_json_file(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

async fn schema_command(config: &EngineConfig, matches: &ArgMatches) -> Result<()> {
    if !matches.get_flag("apply") {
        print!("{}", identry::postgres::SCHEMA_SQL);
        return Ok(());
    }

    let database_url = config
        .database_url
        .as_deref()
        .context("No database_url configured and DATABASE_URL is not set")?;
    let backend = PostgresBackend::connect(database_url).await?;
    backend.test_connection().await?;
    backend.apply_schema().await?;
    info!("profile schema applied");
    Ok(())
}

fn draft_command(config: &EngineConfig, matches: &ArgMatches) -> Result<()> {
    let store = FileDraftStore::new(config.draft_path.clone());

    match matches.subcommand() {
        Some(("save", sub)) => {
            let file = sub.get_one::<String>("file").context("--file is required")?;
            let snapshot = match read_json_file(&PathBuf::from(file))? {
                serde_json::Value::Object(map) => map,
                _ => anyhow::bail!("draft must be a JSON object"),
            };
            store.save(&snapshot);
            info!(path = %store.path().display(), keys = snapshot.len(), "draft saved");
        }
        Some(("show", _)) => match store.load() {
            Some(snapshot) => print_json(&snapshot)?,
            None => println!("No draft stored at {}", store.path().display()),
        },
        Some(("clear", _)) => {
            store.clear();
            info!(path = %store.path().display(), "draft cleared");
        }
        _ => unreachable!("draft subcommand is required"),
    }
    Ok(())
}

async fn merge_command(config: EngineConfig, matches: &ArgMatches) -> Result<()> {
    let mut identity = StaticIdentity::authenticated(account_arg(matches)?);
    if let Some(url) = matches.get_one::<String>("avatar-url") {
        identity = identity.with_avatar(url.as_str());
    }

    let engine = connect(config, identity).await?;
    match engine.coordinator().merge_draft_on_authentication().await? {
        Some(profile) => print_json(&profile)?,
        None => println!("No draft to merge"),
    }
    Ok(())
}

async fn replace_command(config: EngineConfig, matches: &ArgMatches) -> Result<()> {
    let account = account_arg(matches)?;
    let file = matches.get_one::<String>("file").context("--file is required")?;
    let document: ProfileDocument = serde_json::from_value(read_json_file(&PathBuf::from(file))?)
        .with_context(|| format!("{} is not a profile document", file))?;

    let engine = connect(config, StaticIdentity::authenticated(account.clone())).await?;
    let profile = engine
        .coordinator()
        .replace_full_profile(&account, document.fields, document.children)
        .await?;
    print_json(&profile)
}

async fn publish_command(config: EngineConfig, matches: &ArgMatches) -> Result<()> {
    let account = account_arg(matches)?;
    let engine = connect(config, StaticIdentity::authenticated(account.clone())).await?;
    let coordinator = engine.coordinator();

    if let Some(custom_id) = matches.get_one::<String>("custom-id") {
        coordinator.set_custom_id(&account, Some(custom_id.as_str())).await?;
    }
    for (arg, visible) in [("hide", false), ("show", true)] {
        for name in matches.get_many::<String>(arg).into_iter().flatten() {
            let block: Block = name.parse().map_err(anyhow::Error::msg)?;
            coordinator.set_block_visibility(&account, block, visible).await?;
        }
    }

    let profile = coordinator
        .set_public(&account, !matches.get_flag("private"))
        .await?;
    match (&profile.custom_id, profile.is_public) {
        (Some(id), true) => println!("Published at {}", engine.public_url(id)),
        (None, true) => println!("Published, but no custom id is set yet"),
        (_, false) => println!("Profile is private"),
    }
    Ok(())
}

async fn public_command(config: EngineConfig, matches: &ArgMatches) -> Result<()> {
    let custom_id = matches
        .get_one::<String>("custom-id")
        .context("custom id is required")?;
    let engine = connect(config, StaticIdentity::anonymous()).await?;

    match engine.coordinator().get_public_profile(custom_id).await? {
        Some(public) => {
            if matches.get_flag("count-view") {
                engine.coordinator().record_view(public.profile.id).await;
            }
            print_json(&public)?;
        }
        None => anyhow::bail!("No published profile named '{}'", custom_id),
    }
    Ok(())
}

async fn preview_command(config: EngineConfig, matches: &ArgMatches) -> Result<()> {
    let url = matches.get_one::<String>("url").context("url is required")?;
    let source = HttpPageSource::new(config.preview.timeout(), &config.preview.user_agent)?;
    let fetcher = LinkPreviewFetcher::new(Arc::new(source), PreviewCache::new(1))
        .with_timeout(config.preview.timeout());

    match fetcher.get_preview(url).await {
        Some(image) => println!("{}", image),
        None => println!("No preview image for {}", url),
    }
    Ok(())
}
