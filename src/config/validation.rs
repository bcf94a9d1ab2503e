//! Configuration validation.

use crate::config::Config;
use hyper::Uri;

/// Validate the configuration.
///
/// Checks for:
/// - At least one backend
/// - Every backend address parses as an absolute `http` URL with a host
/// - No duplicate backend addresses
/// - A recognized log level
///
/// Validation failures are fatal at startup; the process must not begin
/// serving requests with a configuration that fails here.
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push("at least one backend must be defined".to_string());
    }

    let mut seen: Vec<Uri> = Vec::new();

    for address in &config.backends {
        let uri: Uri = match address.parse() {
            Ok(uri) => uri,
            Err(e) => {
                errors.push(format!("invalid backend address '{}': {}", address, e));
                continue;
            }
        };

        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => {
                errors.push(format!(
                    "backend address '{}' has unsupported scheme '{}' (only http is supported)",
                    address, other
                ));
            }
            None => {
                errors.push(format!(
                    "backend address '{}' must be absolute (e.g. http://host:port)",
                    address
                ));
            }
        }

        if uri.host().is_none() {
            errors.push(format!("backend address '{}' has no host", address));
        }

        // Duplicates are compared on the parsed form, not the raw string
        if seen.contains(&uri) {
            errors.push(format!("duplicate backend address: {}", address));
        } else {
            seen.push(uri);
        }
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.global.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.global.log_level,
            valid_levels.join(", ")
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, ProxyConfig};

    fn minimal_config() -> Config {
        Config {
            global: GlobalConfig::default(),
            listen: "127.0.0.1:8080".parse().unwrap(),
            backends: vec![
                "http://127.0.0.1:9001".to_string(),
                "http://127.0.0.1:9002".to_string(),
            ],
            proxy: ProxyConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = minimal_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_no_backends() {
        let mut config = minimal_config();
        config.backends.clear();
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("at least one backend"));
    }

    #[test]
    fn test_unparseable_address() {
        let mut config = minimal_config();
        config.backends.push("http://[not-a-host".to_string());
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("invalid backend address"));
    }

    #[test]
    fn test_unsupported_scheme() {
        let mut config = minimal_config();
        config.backends.push("https://127.0.0.1:9003".to_string());
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("unsupported scheme"));
    }

    #[test]
    fn test_relative_address() {
        let mut config = minimal_config();
        config.backends.push("127.0.0.1:9003".to_string());
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("must be absolute"));
    }

    #[test]
    fn test_duplicate_backends() {
        let mut config = minimal_config();
        config.backends.push("http://127.0.0.1:9001".to_string());
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("duplicate backend address"));
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = minimal_config();
        config.global.log_level = "verbose".to_string();
        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("invalid log level"));
    }
}
