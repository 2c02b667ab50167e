use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config::{config, TenantDirectory};

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List configured tenant domains")]
    List {
        #[arg(long, help = "Directory file (defaults to TENANTS_FILE)")]
        file: Option<String>,
    },

    #[command(about = "Show the database target for a domain")]
    Resolve {
        #[arg(help = "Request domain, e.g. school.example.com")]
        domain: String,
        #[arg(long, help = "Directory file (defaults to TENANTS_FILE)")]
        file: Option<String>,
    },
}

fn load_directory(file: Option<String>) -> anyhow::Result<TenantDirectory> {
    let settings = &config().database;
    let directory = match file.or_else(|| settings.tenants_file.clone()) {
        Some(path) => TenantDirectory::load(path, settings.url.clone())?,
        None => TenantDirectory::new(settings.url.clone()),
    };
    Ok(directory)
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::List { file } => {
            let directory = load_directory(file)?;
            let domains = directory.domains();
            if domains.is_empty() {
                return output_empty_collection(&output_format, "tenants", "No tenants configured");
            }

            match output_format {
                OutputFormat::Json => {
                    let tenants: Vec<_> = domains
                        .iter()
                        .filter_map(|domain| directory.entry(domain).map(|entry| (domain, entry)))
                        .map(|(domain, entry)| {
                            json!({
                                "domain": domain,
                                "schoolCode": entry.school_code,
                                "database": entry.database,
                                "description": entry.description,
                            })
                        })
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&json!({ "tenants": tenants }))?);
                }
                OutputFormat::Text => {
                    println!("{:<32} {:<12} {:<28} {}", "DOMAIN", "SCHOOL", "DATABASE", "DESCRIPTION");
                    println!("{}", "-".repeat(90));
                    for domain in domains {
                        let Some(entry) = directory.entry(domain) else { continue };
                        println!(
                            "{:<32} {:<12} {:<28} {}",
                            domain,
                            entry.school_code.as_deref().unwrap_or("-"),
                            entry.database.as_deref().unwrap_or("(derived)"),
                            entry.description.as_deref().unwrap_or(""),
                        );
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Resolve { domain, file } => {
            let directory = load_directory(file)?;
            let normalized = TenantDirectory::normalize_domain(&domain)
                .ok_or_else(|| anyhow::anyhow!("invalid domain: {}", domain))?;
            let target = directory.target_for(&normalized)?;
            output_record(&output_format, &serde_json::to_value(&target)?)
        }
    }
}
