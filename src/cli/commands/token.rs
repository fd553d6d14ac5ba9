use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims, Role};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

pub fn handle(
    config: &AppConfig,
    user_id: Option<Uuid>,
    name: String,
    role: &str,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let role: Role = role.parse().map_err(anyhow::Error::msg)?;
    let user_id = user_id.unwrap_or_else(Uuid::new_v4);
    let claims = Claims::new(user_id, name, role, config.security.jwt_expiry_hours);
    let token = generate_jwt(&claims, &config.security.jwt_secret)?;

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            "Token issued",
            Some(&json!({ "token": token, "userId": user_id, "role": role, "exp": claims.exp })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
