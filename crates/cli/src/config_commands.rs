use {anyhow::Result, clap::Subcommand, secrecy::Secret};

use indus_config::IndusConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration (file, env overrides, defaults).
    Show {
        /// Print JSON instead of TOML.
        #[arg(long)]
        json: bool,
    },
    /// Print where config files are searched.
    Path,
}

pub fn handle_config(config: &IndusConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { json } => show(config, json),
        ConfigAction::Path => {
            println!("./indus.{{toml,yaml,yml,json}}");
            match indus_config::config_dir() {
                Some(dir) => println!("{}/indus.{{toml,yaml,yml,json}}", dir.display()),
                None => eprintln!("no user config directory on this platform"),
            }
            Ok(())
        },
    }
}

fn show(config: &IndusConfig, json: bool) -> Result<()> {
    let redacted = redact(config);
    if json {
        println!("{}", serde_json::to_string_pretty(&redacted)?);
    } else {
        print!("{}", toml::to_string_pretty(&redacted)?);
    }
    Ok(())
}

fn redact(config: &IndusConfig) -> IndusConfig {
    let mut out = config.clone();
    if out.service.api_key.is_some() {
        out.service.api_key = Some(Secret::new("[REDACTED]".into()));
    }
    out
}
