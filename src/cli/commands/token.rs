use clap::Subcommand;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_record;
use crate::cli::OutputFormat;
use crate::config::config;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Mint a session token with the configured JWT secret")]
    Issue {
        #[arg(long)]
        domain: String,
        #[arg(long = "school-code")]
        school_code: String,
        #[arg(long = "user-type", help = "school, teacher or student")]
        user_type: String,
        #[arg(long)]
        username: String,
        #[arg(long = "user-id")]
        user_id: String,
        #[arg(long, help = "Lifetime in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue {
            domain,
            school_code,
            user_type,
            username,
            user_id,
            hours,
        } => {
            let security = &config().security;
            let hours = hours.unwrap_or(security.jwt_expiry_hours);
            let claims = Claims::new(user_id, domain, school_code, user_type, username, hours);
            let token = generate_jwt(&claims, &security.jwt_secret)?;

            match output_format {
                OutputFormat::Json => output_record(
                    &output_format,
                    &json!({ "token": token, "expiresAt": claims.exp, "claims": claims }),
                ),
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
