use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success<T: Serialize>(output_format: OutputFormat, message: &str, data: Option<&T>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data) = data {
                response["data"] = serde_json::to_value(data)?;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}
