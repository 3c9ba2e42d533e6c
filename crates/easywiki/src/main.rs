use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use easywiki_core::config::WikiSection;
use easywiki_core::{ClientConfig, PageRef, Params, WikiClient, load_config};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = ".easywiki/config.toml";

#[derive(Debug, Parser)]
#[command(
    name = "easywiki",
    version,
    about = "Read and write MediaWiki pages through the Action API"
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "URL",
        help = "API endpoint (overrides WIKI_API_URL)"
    )]
    api_url: Option<String>,
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long, global = true, value_name = "AGENT")]
    user_agent: Option<String>,
    #[arg(long, global = true, help = "Treat page arguments as numeric page ids")]
    id: bool,
    #[arg(long, global = true, help = "Log in with WIKI_BOT_USER/WIKI_BOT_PASS first")]
    login: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Print the wikitext of a page")]
    Wikitext(PageArgs),
    #[command(about = "Print the rendered HTML of a page")]
    Html(PageArgs),
    #[command(about = "List the categories of a page")]
    Categories(PageArgs),
    #[command(about = "Show prop=info for a page")]
    Info(InfoArgs),
    #[command(about = "Show general site info")]
    Siteinfo(FieldArgs),
    #[command(about = "List namespaces")]
    Namespaces,
    #[command(about = "Fetch a token")]
    Token(TokenArgs),
    #[command(about = "Run action=query with KEY=VALUE params")]
    Query(RawArgs),
    #[command(about = "Run action=parse with KEY=VALUE params")]
    Parse(RawArgs),
    #[command(about = "Replace the text of a page")]
    Edit(TextArgs),
    #[command(about = "Create a page that does not exist yet")]
    Create(TextArgs),
    #[command(about = "Add text to the end of a page")]
    Append(TextArgs),
    #[command(about = "Add text to the start of a page")]
    Prepend(TextArgs),
    #[command(about = "Rename a page")]
    Move(MoveArgs),
    #[command(about = "Delete a page")]
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
struct PageArgs {
    page: String,
}

#[derive(Debug, Args)]
struct InfoArgs {
    page: String,
    #[arg(long, default_value = "", help = "Single key to extract")]
    field: String,
}

#[derive(Debug, Args)]
struct FieldArgs {
    #[arg(long, default_value = "", help = "Single key to extract")]
    field: String,
}

#[derive(Debug, Args)]
struct TokenArgs {
    #[arg(long = "type", default_value = "csrf")]
    kind: String,
}

#[derive(Debug, Args)]
struct RawArgs {
    #[arg(value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,
    #[arg(long, default_value = "", help = "Key to extract from the response")]
    needle: String,
}

#[derive(Debug, Args)]
struct TextArgs {
    page: String,
    #[arg(long)]
    text: String,
    #[arg(long)]
    summary: Option<String>,
}

#[derive(Debug, Args)]
struct MoveArgs {
    from: String,
    to: String,
    #[arg(long)]
    reason: Option<String>,
    #[arg(long, help = "Do not leave a redirect behind")]
    no_redirect: bool,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    page: String,
    #[arg(long)]
    reason: Option<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_client_config(&cli)?;
    if cli.login && config.credentials.is_none() {
        bail!("--login requires WIKI_BOT_USER and WIKI_BOT_PASS");
    }
    let mut wiki = WikiClient::connect(&config).context("failed to connect to MediaWiki")?;

    let output = run_command(&mut wiki, &cli)?;
    print_value(output)
}

fn resolve_client_config(cli: &Cli) -> Result<ClientConfig> {
    let file = load_config(&cli.config)?;
    let explicit = WikiSection {
        api_url: cli.api_url.clone(),
        user_agent: cli.user_agent.clone(),
        ..WikiSection::default()
    };
    let mut config = ClientConfig::resolve_layered(&explicit, &file)?;
    // Credentials only log in up front when asked to.
    if !cli.login {
        config.credentials = None;
    }
    Ok(config)
}

fn run_command(wiki: &mut WikiClient, cli: &Cli) -> Result<Option<Value>> {
    let page = |raw: &str| page_ref(raw, cli.id);
    let output = match &cli.command {
        Commands::Wikitext(args) => wiki
            .get_wikitext(page(&args.page)?, Params::new())?
            .map(Value::String),
        Commands::Html(args) => wiki
            .get_html(page(&args.page)?, Params::new())?
            .map(Value::String),
        Commands::Categories(args) => wiki.get_categories(page(&args.page)?)?,
        Commands::Info(args) => wiki.get_page_info(page(&args.page)?, &args.field)?,
        Commands::Siteinfo(args) => wiki.get_site_info(&args.field)?,
        Commands::Namespaces => wiki.get_namespaces()?,
        Commands::Token(args) => wiki.get_token(&args.kind)?.map(Value::String),
        Commands::Query(args) => wiki.query(raw_params(&args.params), &args.needle)?,
        Commands::Parse(args) => wiki.parse(raw_params(&args.params), &args.needle)?,
        Commands::Edit(args) => wiki.edit(
            page(&args.page)?,
            Params::new()
                .with("text", args.text.as_str())
                .with("summary", args.summary.clone()),
            "",
        )?,
        Commands::Create(args) => {
            if cli.id {
                bail!("create needs a title, not a page id");
            }
            wiki.create(
                &args.page,
                &args.text,
                Params::new().with("summary", args.summary.clone()),
                "",
            )?
        }
        Commands::Append(args) => wiki.append(
            page(&args.page)?,
            &args.text,
            Params::new().with("summary", args.summary.clone()),
            "",
        )?,
        Commands::Prepend(args) => wiki.prepend(
            page(&args.page)?,
            &args.text,
            Params::new().with("summary", args.summary.clone()),
            "",
        )?,
        Commands::Move(args) => wiki.move_page(
            page(&args.from)?,
            &args.to,
            Params::new()
                .with("reason", args.reason.clone())
                .with("noredirect", args.no_redirect),
            "",
        )?,
        Commands::Delete(args) => wiki.delete(
            page(&args.page)?,
            Params::new().with("reason", args.reason.clone()),
            "",
        )?,
    };
    Ok(output)
}

fn print_value(value: Option<Value>) -> Result<()> {
    match value {
        Some(Value::String(text)) => println!("{text}"),
        Some(other) => println!("{}", serde_json::to_string_pretty(&other)?),
        None => bail!("no value found in the API response"),
    }
    Ok(())
}

fn page_ref(raw: &str, by_id: bool) -> Result<PageRef> {
    if by_id {
        let id = raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("page id must be a non-negative integer: {raw}"))?;
        return Ok(PageRef::Id(id));
    }
    Ok(PageRef::Title(raw.to_string()))
}

fn parse_param(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("parameter name is empty in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn raw_params(pairs: &[(String, String)]) -> Params {
    pairs
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use easywiki_core::ParamValue;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_param_splits_on_first_equals() {
        assert_eq!(
            parse_param("list=allpages"),
            Ok(("list".to_string(), "allpages".to_string()))
        );
        assert_eq!(
            parse_param("text=a=b"),
            Ok(("text".to_string(), "a=b".to_string()))
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn page_ref_respects_id_flag() {
        assert_eq!(
            page_ref("42", false).expect("title"),
            PageRef::Title("42".to_string())
        );
        assert_eq!(page_ref("42", true).expect("id"), PageRef::Id(42));
        assert!(page_ref("Main Page", true).is_err());
    }

    #[test]
    fn raw_params_keep_every_pair() {
        let params = raw_params(&[
            ("list".to_string(), "search".to_string()),
            ("srsearch".to_string(), "rust".to_string()),
        ]);
        assert_eq!(params.get("srsearch"), Some(&ParamValue::from("rust")));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn query_subcommand_collects_params() {
        let cli = Cli::try_parse_from([
            "easywiki",
            "--api-url",
            "https://wiki.example.org/api.php",
            "query",
            "list=allpages",
            "aplimit=5",
            "--needle",
            "allpages",
        ])
        .expect("parse");
        match cli.command {
            Commands::Query(args) => {
                assert_eq!(args.params.len(), 2);
                assert_eq!(args.needle, "allpages");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
