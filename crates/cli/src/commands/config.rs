use clap::Subcommand;
use explorium_config::{OutputFormat, Settings};

use crate::app::config_path;
use crate::{CliError, GlobalArgs};

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Save an API key, keeping the rest of the file
    Init {
        #[arg(long)]
        api_key: String,
    },

    /// Print the effective settings (file and environment), key redacted
    Show,

    /// Print one effective setting
    Get {
        /// Setting name, e.g. concurrency or retry.max_attempts
        key: String,
    },

    /// Change one setting in the config file
    Set { key: String, value: String },

    /// Print the config file location
    Path,
}

pub fn run(cmd: ConfigCommands, global: &GlobalArgs) -> Result<(), CliError> {
    let path = config_path(global);

    match cmd {
        ConfigCommands::Init { api_key } => {
            if api_key.trim().is_empty() {
                return Err(CliError::args("--api-key is empty"));
            }
            let mut settings = Settings::load_file(&path)?;
            settings.set_value("api_key", &api_key)?;
            settings.save(&path)?;
            eprintln!("Saved API key {} to {}", settings.masked_api_key(), path.display());
        }

        ConfigCommands::Show => {
            let settings = Settings::load(Some(path.as_path()))?.redacted();
            eprintln!("# {}", path.display());
            let text = match global.output {
                Some(OutputFormat::Json) => serde_json::to_string_pretty(&settings)
                    .map_err(|e| CliError::io(format!("cannot serialize settings: {}", e)))?,
                _ => toml::to_string_pretty(&settings)
                    .map_err(|e| CliError::io(format!("cannot serialize settings: {}", e)))?,
            };
            println!("{}", text.trim_end());
        }

        ConfigCommands::Get { key } => {
            let settings = Settings::load(Some(path.as_path()))?;
            let value = if key == "api_key" {
                settings.masked_api_key()
            } else {
                settings.get_value(&key)?
            };
            println!("{}", value);
        }

        ConfigCommands::Set { key, value } => {
            // File only: environment overrides must not leak into the file.
            let mut settings = Settings::load_file(&path)?;
            settings.set_value(&key, &value)?;
            settings.validate()?;
            settings.save(&path)?;
            let shown = if key == "api_key" { settings.masked_api_key() } else { settings.get_value(&key)? };
            eprintln!("Set {} = {} in {}", key, shown, path.display());
        }

        ConfigCommands::Path => println!("{}", path.display()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global(path: &std::path::Path) -> GlobalArgs {
        GlobalArgs { config: Some(path.to_path_buf()), ..GlobalArgs::default() }
    }

    #[test]
    fn set_writes_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let g = global(&path);

        run(ConfigCommands::Set { key: "concurrency".into(), value: "8".into() }, &g).unwrap();
        run(ConfigCommands::Init { api_key: "key_1234567890".into() }, &g).unwrap();

        let saved = Settings::load_file(&path).unwrap();
        assert_eq!(saved.concurrency, 8);
        assert_eq!(saved.api_key, "key_1234567890");
    }

    #[test]
    fn set_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let g = global(&path);

        let err = run(ConfigCommands::Set { key: "min_confidence".into(), value: "1.5".into() }, &g)
            .unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_CONFIG);
        assert!(!path.exists());

        let err = run(ConfigCommands::Set { key: "colour".into(), value: "red".into() }, &g).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);
    }
}
