use anyhow::Context;
use clap::{Parser, Subcommand};
use stacks_kernel::settings::Settings;

/// Library catalog and polls service.
#[derive(Debug, Parser)]
#[command(name = "stacks", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server until Ctrl-C
    Serve,
    /// Print the effective settings as JSON
    Config,
    /// Print the admin configuration table as JSON
    Admin,
    /// Print every routed path from the merged OpenAPI document
    Routes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load Stacks settings")?;

    match cli.command {
        Command::Serve => {
            stacks_telemetry::init(&settings.telemetry)?;
            tracing::info!(env = ?settings.environment, "serving from stacks-cli");
            stacks_app::run(settings).await
        }
        Command::Config => print_json(&settings),
        Command::Admin => {
            let services = stacks_app::Services::from_settings(&settings)?;
            let registry = stacks_app::build_registry(&settings, &services)?;
            print_json(&registry.admin_site())
        }
        Command::Routes => {
            let services = stacks_app::Services::from_settings(&settings)?;
            let registry = stacks_app::build_registry(&settings, &services)?;
            let document = stacks_http::router::merged_openapi(&registry);
            if let Some(paths) = document["paths"].as_object() {
                for (path, item) in paths {
                    let methods: Vec<&str> = item
                        .as_object()
                        .map(|ops| ops.keys().map(String::as_str).collect())
                        .unwrap_or_default();
                    println!("{:<36} {}", path, methods.join(",").to_uppercase());
                }
            }
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{rendered}");
    Ok(())
}
