use super::Context;
use crate::display::{print_success, print_warning};
use crate::Result;
use log::debug;
use vast_api::LOGIN_DEPRECATED;

pub fn handle_set_api_key(api_key: &str, ctx: &Context) -> Result<()> {
    ctx.config.set_api_key(api_key)?;
    debug!("API key written to {}", ctx.config.api_key_path.display());

    print_success(&format!(
        "Your api key has been saved in {}",
        ctx.config.api_key_path.display()
    ));
    Ok(())
}

/// `login` and `create account` only point at the web console now.
pub fn handle_deprecated() -> Result<()> {
    print_warning(LOGIN_DEPRECATED);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    #[test]
    fn test_set_api_key_writes_file() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(dir.path(), None).unwrap();
        let ctx = Context::new(config, false);

        handle_set_api_key("secret-key\n", &ctx).unwrap();

        let saved = std::fs::read_to_string(dir.path().join("vast_api_key")).unwrap();
        assert_eq!(saved, "secret-key");
    }
}
