//! `conclave check`.

use conclave_config::{Config, ConfigValidator};

pub(crate) fn check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(config);

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }

    if let Some(err) = result.into_error() {
        return Err(err.into());
    }

    let mut names: Vec<&String> = config.providers.keys().collect();
    names.sort();
    println!(
        "Configuration OK: {} provider(s), ceiling {} agents",
        names.len(),
        config.runtime.max_concurrent_agents
    );
    for name in names {
        if let Some(provider) = config.provider(name) {
            println!(
                "  {} ({}, model: {})",
                name,
                provider.kind_name(),
                provider.model().unwrap_or("default")
            );
        }
    }
    Ok(())
}
