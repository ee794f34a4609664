use super::OutputFormat;
use anyhow::Result;
use fungal_traits_core::plugin::Plugin;

pub fn run(format: &str) -> Result<()> {
    let plugin = Plugin::fungal_traits();
    match OutputFormat::parse(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plugin)?),
        OutputFormat::Text => print!("{}", plugin.info_text()),
    }
    Ok(())
}
