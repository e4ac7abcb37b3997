use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::TranscoderConfig, ConfigError};

/// Load configuration from file with environment variable overrides.
///
/// Variables are prefixed with `TRANSCODER_` and use `__` between nesting
/// levels, e.g. `TRANSCODER_FFMPEG__TIMEOUT_SECS=600`.
pub fn load_config(path: &Path) -> Result<TranscoderConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: TranscoderConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("TRANSCODER_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<TranscoderConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::{ConflictMode, DirectoryMode};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[defaults]
directory = "create"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.defaults.directory, DirectoryMode::Create);
        assert_eq!(config.defaults.conflict, ConflictMode::Increment);
    }

    #[test]
    fn test_load_config_from_str_invalid() {
        let result = load_config_from_str("[defaults]\nconflict = \"overwrite\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/transcoder.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
file_creation_mode = "0600"

[ffmpeg]
path = "/opt/ffmpeg/bin/ffmpeg"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.file_creation_mode.bits(), 0o600);
        assert_eq!(
            config.ffmpeg.unwrap().path.to_str().unwrap(),
            "/opt/ffmpeg/bin/ffmpeg"
        );
    }
}
