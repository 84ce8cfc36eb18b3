use clap::{Parser, Subcommand};
use formsmith::admin::{AdminState, admin_router};
use formsmith::editor::ConfigEditor;
use formsmith::export::DOCUMENT_FILE_NAME;
use formsmith::grid::{GridQuery, GridView};
use formsmith::schema::SchemaService;
use formsmith::schema::http::HttpSchemaService;
use formsmith::settings::Settings;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "formsmith", about = "Formsmith: schema-driven form and grid configurator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the configurator API (default)
    Serve,
    /// List the tables the schema service exposes
    Entities,
    /// Enrich a table and write its configuration document
    Configure {
        #[arg(long)]
        table: String,
        /// Main-table field to hang a child table off
        #[arg(long, requires = "child_table")]
        child_field: Option<String>,
        #[arg(long, requires = "child_field")]
        child_table: Option<String>,
        #[arg(long, default_value = DOCUMENT_FILE_NAME)]
        out: PathBuf,
    },
    /// Print one page of a table's rows as JSON
    Grid {
        #[arg(long)]
        table: String,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue)]
        desc: bool,
        #[arg(long, default_value_t = 1)]
        page: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init structured logging (respects RUST_LOG; defaults to info)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Load .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    tracing::info!(
        schema_url = %settings.schema_url,
        dynamic_url = %settings.dynamic_url,
        "using schema service"
    );
    let schema: Arc<dyn SchemaService> = Arc::new(HttpSchemaService::from_settings(&settings)?);

    match cli.command {
        None | Some(Commands::Serve) => serve(schema, &settings).await?,
        Some(Commands::Entities) => {
            for entity in schema.list_entities().await? {
                println!("{entity}");
            }
        }
        Some(Commands::Configure {
            table,
            child_field,
            child_table,
            out,
        }) => {
            let mut editor = ConfigEditor::open(schema.as_ref(), &table).await?;
            if let (Some(field), Some(child)) = (child_field, child_table) {
                editor.set_child_table(schema.as_ref(), &field, &child).await?;
            }
            editor.export()?.write_to(&out)?;
            tracing::info!(table = %table, out = %out.display(), "configuration written");
        }
        Some(Commands::Grid {
            table,
            sort,
            desc,
            page,
        }) => {
            let mut grid = GridView::new(schema, table);
            grid.load().await?;
            let query = GridQuery {
                sort,
                descending: desc,
                page,
                ..GridQuery::from_params(&HashMap::new())
            };
            println!("{}", serde_json::to_string_pretty(&grid.page(&query))?);
        }
    }

    Ok(())
}

async fn serve(
    schema: Arc<dyn SchemaService>,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AdminState::new(schema);
    let router = admin_router(state, &settings.cors_allowed_origins, settings.ui_dir.clone());

    let listener = TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "Configurator API online");

    axum::serve(listener, router).await?;
    Ok(())
}
