//! Config file commands.

use std::path::Path;

use super::CommandResult;
use cwc_driver::config::Config;

/// Print the effective configuration and where it lives
pub fn show(config: &Config, path: &Path) -> CommandResult {
    let state = if path.exists() { "" } else { " (not found, defaults)" };
    println!("# {}{}", path.display(), state);
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

/// Write `config` to `path`, refusing to clobber an existing file
pub fn init(config: &Config, path: &Path, force: bool) -> CommandResult {
    if path.exists() && !force {
        return Err(format!("{} already exists, use --force to overwrite", path.display()).into());
    }
    config.save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        init(&Config::default(), &path, false).unwrap();
        assert!(init(&Config::default(), &path, false).is_err());
        init(&Config::default(), &path, true).unwrap();
    }
}
