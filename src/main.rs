use std::path::PathBuf;

use clap::{Parser, Subcommand};
use kobo_extract::api::{DataQuery, KoboClient};
use kobo_extract::config::{ClientConfig, Endpoint, ExtractOptions};
use kobo_extract::io::excel_read;
use kobo_extract::{ExtractError, Result, form};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    match cli.command {
        Command::Assets(args) => execute_assets(args),
        Command::Export(args) => execute_export(args),
        Command::Questions(args) => execute_questions(args),
        Command::Choices(args) => execute_choices(args),
        Command::Inspect(args) => execute_inspect(args),
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .map_err(|error| ExtractError::Logging(error.to_string()))
}

fn execute_assets(args: ConnectionArgs) -> Result<()> {
    let client = args.client()?;
    for (name, uid) in client.asset_uids()? {
        println!("{uid}  {name}");
    }
    Ok(())
}

fn execute_export(args: ExportArgs) -> Result<()> {
    let client = args.connection.client()?;
    let query = args.data_query();
    let output = match args.output {
        Some(path) => path,
        None => default_output(&client, &args.asset),
    };

    let options = ExtractOptions::default();
    if client.export_excel(&args.asset, &output, &query, &options)? {
        println!("exported {}", output.display());
    } else {
        println!("no submissions to export for {}", args.asset);
    }
    Ok(())
}

fn execute_questions(args: AssetArgs) -> Result<()> {
    let client = args.connection.client()?;
    let asset = client.asset(&args.asset)?;
    let questions = form::questions(&asset);
    println!("{}", serde_json::to_string_pretty(&questions)?);
    Ok(())
}

fn execute_choices(args: AssetArgs) -> Result<()> {
    let client = args.connection.client()?;
    let asset = client.asset(&args.asset)?;
    let choices = form::choices(&asset);
    println!("{}", serde_json::to_string_pretty(&choices)?);
    Ok(())
}

fn execute_inspect(args: InspectArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(ExtractError::MissingInput(args.input));
    }
    for sheet in excel_read::read_workbook(&args.input)? {
        println!(
            "{}: {} rows, {} columns ({})",
            sheet.name,
            sheet.row_count(),
            sheet.columns.len(),
            sheet.columns.join(", ")
        );
    }
    Ok(())
}

/// Builds `./{uid}_{asset name}.xlsx`, keeping only filesystem-friendly
/// characters of the asset name. Falls back to the uid alone when the asset
/// detail cannot be fetched.
fn default_output(client: &KoboClient, uid: &str) -> PathBuf {
    let name = client
        .asset(uid)
        .ok()
        .and_then(|asset| {
            asset
                .get("name")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();

    let safe_name: String = name
        .chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .replace(' ', "_");

    if safe_name.is_empty() {
        PathBuf::from(format!("./{uid}.xlsx"))
    } else {
        PathBuf::from(format!("./{uid}_{safe_name}.xlsx"))
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Fetch KoboToolbox submissions, flatten repeating groups, and export Excel workbooks."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List asset names and uids visible to the token.
    Assets(ConnectionArgs),
    /// Export one asset's submissions to an Excel workbook.
    Export(ExportArgs),
    /// Print the question descriptors of an asset's form definition.
    Questions(AssetArgs),
    /// Print the choice lists of an asset's form definition.
    Choices(AssetArgs),
    /// Summarise the sheets of an exported workbook.
    Inspect(InspectArgs),
}

#[derive(clap::Args)]
struct ConnectionArgs {
    /// API token used for the Authorization header.
    #[arg(long, env = "KOBO_TOKEN")]
    token: String,

    /// Named endpoint (default, humanitarian) or a custom base URL.
    #[arg(long, default_value = "default")]
    endpoint: String,
}

impl ConnectionArgs {
    fn client(&self) -> Result<KoboClient> {
        let config =
            ClientConfig::new(&self.token).with_endpoint(Endpoint::parse(&self.endpoint)?);
        KoboClient::new(&config)
    }
}

#[derive(clap::Args)]
struct AssetArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Asset uid.
    #[arg(long)]
    asset: String,
}

#[derive(clap::Args)]
struct ExportArgs {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Asset uid to export.
    #[arg(long)]
    asset: String,

    /// Output path. Defaults to ./{uid}_{asset name}.xlsx.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Raw MongoDB-style query passed to the data endpoint.
    #[arg(long)]
    query: Option<String>,

    /// Zero-based offset into the submission list.
    #[arg(long)]
    start: Option<u64>,

    /// Maximum number of submissions to fetch.
    #[arg(long)]
    limit: Option<u64>,

    /// Only submissions strictly newer than this timestamp.
    #[arg(long)]
    submitted_after: Option<String>,
}

impl ExportArgs {
    fn data_query(&self) -> DataQuery {
        DataQuery {
            query: self.query.clone(),
            start: self.start,
            limit: self.limit,
            submitted_after: self.submitted_after.clone(),
        }
    }
}

#[derive(clap::Args)]
struct InspectArgs {
    /// Workbook to inspect.
    #[arg(long)]
    input: PathBuf,
}
