//! restmap
//!
//! Runs find/get/create/update/destroy against a REST resource collection
//! described by a JSON file of resource models.

use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow, bail};
use clap::{Parser, Subcommand};
use restmap_rest::transport::ReqwestTransport;
use restmap_rest::{
    AdapterConfig, Condition, FieldKind, Format, Operator, Query, Record, ResourceModel,
    RestAdapter, SortOrder, Value, init_logging,
};
use tracing::info;

/// Command-line client for REST resource collections.
#[derive(Debug, Parser)]
#[command(name = "restmap", version, about)]
struct Cli {
    #[command(flatten)]
    config: AdapterConfig,

    /// JSON file holding an array of resource model definitions.
    #[arg(long, env = "RESTMAP_MODELS")]
    models: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Lists records matching the given predicates.
    Find {
        /// Resource name (singular or plural).
        resource: String,

        /// Predicate in `field:op:value` form, e.g. `year:gte:1965`.
        /// `in` takes a comma-separated list; `null` matches missing values.
        #[arg(long = "where", value_name = "FIELD:OP:VALUE")]
        conditions: Vec<String>,

        /// Sort key; prefix with `-` for descending.
        #[arg(long, allow_hyphen_values = true)]
        order: Vec<String>,

        /// Maximum number of records.
        #[arg(long)]
        limit: Option<u32>,

        /// Number of records to skip.
        #[arg(long)]
        offset: Option<u32>,
    },

    /// Fetches a single record by key.
    Get { resource: String, id: String },

    /// Creates a record from a JSON object.
    Create { resource: String, record: String },

    /// Replaces a record from a JSON object that includes its key.
    Update { resource: String, record: String },

    /// Deletes a record by key.
    Destroy { resource: String, id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.config.log_level);

    if let Err(errors) = cli.config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    let models = load_models(&cli.models)?;
    let transport =
        ReqwestTransport::new(cli.config.timeout())?.with_max_body_size(cli.config.max_body_size);
    let adapter = RestAdapter::from_config(&cli.config, transport)?;

    info!(
        endpoint = %adapter.translator().endpoint(),
        models = models.len(),
        "Starting restmap"
    );

    match cli.command {
        Command::Find {
            resource,
            conditions,
            order,
            limit,
            offset,
        } => {
            let model = find_model(&models, &resource)?;
            let query = build_query(model, &conditions, &order, limit, offset)?;
            let records = adapter.read(model, &query).await?;
            print_json(&Format::Json.encode_collection(model, &records)?)?;
        }
        Command::Get { resource, id } => {
            let model = find_model(&models, &resource)?;
            let id = parse_key(model, &id)?;
            match adapter.get(model, &id).await? {
                Some(record) => print_json(&Format::Json.encode_record(model, &record)?)?,
                None => bail!("{} {} not found", model.name(), id),
            }
        }
        Command::Create { resource, record } => {
            let model = find_model(&models, &resource)?;
            let record = parse_record(model, &record)?;
            let created = adapter.create(model, &record).await?;
            print_json(&Format::Json.encode_record(model, &created)?)?;
        }
        Command::Update { resource, record } => {
            let model = find_model(&models, &resource)?;
            let record = parse_record(model, &record)?;
            let updated = adapter.update(model, &record).await?;
            print_json(&Format::Json.encode_record(model, &updated)?)?;
        }
        Command::Destroy { resource, id } => {
            let model = find_model(&models, &resource)?;
            let id = parse_key(model, &id)?;
            adapter.destroy(model, &id).await?;
            info!(resource = model.name(), id = %id, "Destroyed record");
        }
    }

    Ok(())
}

fn load_models(path: &Path) -> anyhow::Result<Vec<ResourceModel>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading models from {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing models in {}", path.display()))
}

fn find_model<'a>(models: &'a [ResourceModel], name: &str) -> anyhow::Result<&'a ResourceModel> {
    models
        .iter()
        .find(|m| m.name() == name || m.storage_name() == name)
        .ok_or_else(|| anyhow!("no resource model named '{}'", name))
}

fn parse_key(model: &ResourceModel, text: &str) -> anyhow::Result<Value> {
    let key = model.key_field();
    key.kind
        .parse_text(text)
        .map_err(|e| anyhow!("invalid {} key '{}': {}", model.name(), text, e))
}

fn parse_record(model: &ResourceModel, json: &str) -> anyhow::Result<Record> {
    Format::Json
        .decode(model, json.as_bytes())?
        .into_one()
        .ok_or_else(|| anyhow!("expected a single JSON object for {}", model.name()))
}

fn build_query(
    model: &ResourceModel,
    conditions: &[String],
    order: &[String],
    limit: Option<u32>,
    offset: Option<u32>,
) -> anyhow::Result<Query> {
    let mut query = Query::new();
    for text in conditions {
        query = query.condition(parse_condition(model, text)?);
    }
    for key in order {
        let SortOrder { field, direction } = SortOrder::parse(key);
        query = query.order_by(field, direction);
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }
    if let Some(offset) = offset {
        query = query.offset(offset);
    }
    Ok(query)
}

fn parse_condition(model: &ResourceModel, text: &str) -> anyhow::Result<Condition> {
    let mut parts = text.splitn(3, ':');
    let (Some(field), Some(op), Some(raw)) = (parts.next(), parts.next(), parts.next()) else {
        bail!("predicate '{}' is not in field:op:value form", text);
    };
    let operator: Operator = op.parse().map_err(|e: String| anyhow!(e))?;
    let kind = model
        .kind_of(field)
        .ok_or_else(|| anyhow!("{} has no field '{}'", model.name(), field))?;
    let parse = |s: &str| {
        kind.parse_text(s)
            .map_err(|e| anyhow!("invalid value for '{}': {}", field, e))
    };

    if operator == Operator::In {
        let values = raw.split(',').map(parse).collect::<anyhow::Result<Vec<_>>>()?;
        return Ok(Condition::one_of(field, values));
    }

    let value = if raw == "null" && kind != FieldKind::String {
        Value::Null
    } else {
        parse(raw)?
    };
    Ok(Condition::new(field, operator, value))
}

fn print_json(body: &[u8]) -> anyhow::Result<()> {
    let document: serde_json::Value = serde_json::from_slice(body)?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
