//! CLI entry point for Graphlens.
//!
//! Prints the schema of a Neo4j database, runs ad-hoc queries, and imports
//! extracted graph documents read from stdin. Results go to stdout as text
//! or JSON; logs go to stderr.

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use graphlens_core::{GraphDocument, Params, SchemaConfig};
use graphlens_graph::{GraphConfig, GraphStore, Neo4jGraph};

#[derive(Parser)]
#[command(name = "graphlens")]
#[command(about = "Inspect, query, and populate a Neo4j graph")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: graphlens).
    #[arg(short, long, default_value = "graphlens", global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Print the graph schema.
    Schema {
        /// Include value statistics (examples, ranges, list sizes).
        #[arg(long)]
        enhanced: bool,
        /// Print the structured schema as JSON instead of text.
        #[arg(long)]
        structured: bool,
    },
    /// Run a Cypher query and print the records as JSON.
    Query {
        /// Query text.
        cypher: String,
        /// Query parameters as a JSON object.
        #[arg(long)]
        params: Option<String>,
        /// Drop embedding-sized lists from the results.
        #[arg(long)]
        sanitize: bool,
    },
    /// Import graph documents (JSON array read from stdin).
    Import {
        /// Merge nodes on their own label instead of the shared entity label.
        #[arg(long)]
        no_common_label: bool,
        /// Link every imported node to a node for its source document.
        #[arg(long)]
        include_source: bool,
    },
}

/// Settings file layout: `[neo4j]` and `[schema]` sections.
#[derive(Debug, Deserialize)]
struct AppConfig {
    #[serde(default)]
    neo4j: GraphConfig,
    #[serde(default)]
    schema: SchemaConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let AppConfig { neo4j, mut schema } = load_config(&cli.config)?;

    // Only the schema command needs the introspection pass.
    schema.refresh_on_connect = matches!(cli.command, Command::Schema { .. });
    match &cli.command {
        Command::Schema { enhanced, .. } => schema.enhanced_schema |= *enhanced,
        Command::Query { sanitize, .. } => schema.sanitize |= *sanitize,
        Command::Import { .. } => {}
    }

    let graph = Neo4jGraph::connect(&neo4j, schema).await?;

    match cli.command {
        Command::Schema { structured, .. } => {
            if structured {
                let schema = graph.structured_schema();
                println!("{}", serde_json::to_string_pretty(&*schema)?);
            } else {
                println!("{}", graph.schema());
            }
        }
        Command::Query { cypher, params, .. } => {
            let params: Params = match params {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Params::new(),
            };
            let records = graph.query(&cypher, params).await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Import {
            no_common_label,
            include_source,
        } => {
            let input = std::io::read_to_string(std::io::stdin())?;
            let documents: Vec<GraphDocument> = serde_json::from_str(&input)?;
            let summary = graph
                .add_graph_documents(&documents, !no_common_label, include_source)
                .await?;
            println!("{}", serde_json::to_string(&summary)?);
        }
    }

    graph.close();
    Ok(())
}

fn load_config(file_prefix: &str) -> anyhow::Result<AppConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("GRAPHLENS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Missing sections default; present but invalid values are errors.
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> String {
        let path = dir.path().join("graphlens.toml");
        std::fs::write(&path, contents).unwrap();
        dir.path().join("graphlens").to_string_lossy().into_owned()
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent").to_string_lossy().into_owned();

        let config = load_config(&prefix).unwrap();
        assert_eq!(config.schema, SchemaConfig::default());
    }

    #[test]
    fn test_load_config_missing_section_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_config(
            &dir,
            "[neo4j]\nuri = \"bolt://graph-01:7687\"\npassword = \"s3cret\"\n",
        );

        let config = load_config(&prefix).unwrap();
        assert_eq!(config.neo4j.uri, "bolt://graph-01:7687");
        assert_eq!(config.neo4j.password, "s3cret");
        assert_eq!(config.neo4j.user, "neo4j");
        assert_eq!(config.schema, SchemaConfig::default());
    }

    #[test]
    fn test_load_config_reads_schema_section() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_config(
            &dir,
            "[schema]\nlist_limit = 64\nenhanced_schema = true\n",
        );

        let config = load_config(&prefix).unwrap();
        assert_eq!(config.schema.list_limit, 64);
        assert!(config.schema.enhanced_schema);
        assert_eq!(config.schema.distinct_value_limit, 10);
    }

    #[test]
    fn test_load_config_invalid_value_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_config(
            &dir,
            "[neo4j]\nuri = \"bolt://graph-01:7687\"\npassword = \"s3cret\"\n\n\
             [schema]\nlist_limit = \"many\"\n",
        );

        assert!(load_config(&prefix).is_err());
    }
}
