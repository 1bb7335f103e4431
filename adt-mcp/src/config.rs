//! Configuration resolution. Precedence, highest first: CLI flags,
//! environment variables (`SAP_*`), a key=value dotenv file, built-in
//! defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use adt_rs::adapter::auth;
use adt_rs::domain::safety::OperationClass;
use adt_rs::{AuthMaterial, SafetyPolicy, SystemEndpoint};

/// Tool catalog exposure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Focused,
    Expert,
}

impl Mode {
    pub fn parse(input: &str) -> anyhow::Result<Mode> {
        match input.trim().to_ascii_lowercase().as_str() {
            "focused" | "" => Ok(Mode::Focused),
            "expert" => Ok(Mode::Expert),
            other => bail!("invalid mode '{other}' (expected focused or expert)"),
        }
    }
}

/// Values from one configuration layer; `None` falls through to the next.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client: Option<String>,
    pub language: Option<String>,
    pub insecure: Option<bool>,
    pub cookie_file: Option<PathBuf>,
    pub cookie_string: Option<String>,
    pub verbose: Option<bool>,
    pub mode: Option<String>,
    pub read_only: Option<bool>,
    pub block_free_sql: Option<bool>,
    pub allowed_ops: Option<String>,
    pub disallowed_ops: Option<String>,
    pub allowed_packages: Option<String>,
    pub enable_transports: Option<bool>,
    pub transport_read_only: Option<bool>,
    pub allowed_transports: Option<String>,
    pub allow_transportable_edits: Option<bool>,
    pub dry_run: Option<bool>,
}

impl Overrides {
    /// Read one layer from a key=value map (environment or dotenv). Keys
    /// use the `SAP_` prefix.
    pub fn from_map(map: &HashMap<String, String>) -> Overrides {
        let get = |key: &str| map.get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let get_bool = |key: &str| get(key).map(|v| is_truthy(&v));
        Overrides {
            base_url: get("SAP_URL"),
            username: get("SAP_USER"),
            password: get("SAP_PASSWORD"),
            client: get("SAP_CLIENT"),
            language: get("SAP_LANGUAGE"),
            insecure: get_bool("SAP_INSECURE"),
            cookie_file: get("SAP_COOKIE_FILE").map(PathBuf::from),
            cookie_string: get("SAP_COOKIE_STRING"),
            verbose: get_bool("SAP_VERBOSE"),
            mode: get("SAP_MODE"),
            read_only: get_bool("SAP_READ_ONLY"),
            block_free_sql: get_bool("SAP_BLOCK_FREE_SQL"),
            allowed_ops: get("SAP_ALLOWED_OPS"),
            disallowed_ops: get("SAP_DISALLOWED_OPS"),
            allowed_packages: get("SAP_ALLOWED_PACKAGES"),
            enable_transports: get_bool("SAP_ENABLE_TRANSPORTS"),
            transport_read_only: get_bool("SAP_TRANSPORT_READ_ONLY"),
            allowed_transports: get("SAP_ALLOWED_TRANSPORTS"),
            allow_transportable_edits: get_bool("SAP_ALLOW_TRANSPORTABLE_EDITS"),
            dry_run: get_bool("SAP_DRY_RUN"),
        }
    }

    /// Merge `other` underneath `self`: present values win.
    fn or(self, other: Overrides) -> Overrides {
        Overrides {
            base_url: self.base_url.or(other.base_url),
            username: self.username.or(other.username),
            password: self.password.or(other.password),
            client: self.client.or(other.client),
            language: self.language.or(other.language),
            insecure: self.insecure.or(other.insecure),
            cookie_file: self.cookie_file.or(other.cookie_file),
            cookie_string: self.cookie_string.or(other.cookie_string),
            verbose: self.verbose.or(other.verbose),
            mode: self.mode.or(other.mode),
            read_only: self.read_only.or(other.read_only),
            block_free_sql: self.block_free_sql.or(other.block_free_sql),
            allowed_ops: self.allowed_ops.or(other.allowed_ops),
            disallowed_ops: self.disallowed_ops.or(other.disallowed_ops),
            allowed_packages: self.allowed_packages.or(other.allowed_packages),
            enable_transports: self.enable_transports.or(other.enable_transports),
            transport_read_only: self.transport_read_only.or(other.transport_read_only),
            allowed_transports: self.allowed_transports.or(other.allowed_transports),
            allow_transportable_edits: self
                .allow_transportable_edits
                .or(other.allow_transportable_edits),
            dry_run: self.dry_run.or(other.dry_run),
        }
    }
}

/// The fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client: String,
    pub language: String,
    pub insecure: bool,
    pub cookie_file: Option<PathBuf>,
    pub cookie_string: Option<String>,
    pub verbose: bool,
    pub mode: Mode,
    pub read_only: bool,
    pub block_free_sql: bool,
    pub allowed_ops: Option<String>,
    pub disallowed_ops: Option<String>,
    pub allowed_packages: Vec<String>,
    pub enable_transports: bool,
    pub transport_read_only: bool,
    pub allowed_transports: Vec<String>,
    pub allow_transportable_edits: bool,
    pub dry_run: bool,
}

impl Config {
    /// Layer cli over env over dotenv, apply defaults, validate.
    pub fn resolve(
        cli: Overrides,
        env: &HashMap<String, String>,
        dotenv: &HashMap<String, String>,
    ) -> anyhow::Result<Config> {
        let merged = cli
            .or(Overrides::from_map(env))
            .or(Overrides::from_map(dotenv));

        let base_url = merged
            .base_url
            .context("SAP base URL is required (--url or SAP_URL)")?;
        let mode = Mode::parse(merged.mode.as_deref().unwrap_or("focused"))?;

        let config = Config {
            base_url,
            username: merged.username,
            password: merged.password,
            client: merged.client.unwrap_or_else(|| "001".into()),
            language: merged.language.unwrap_or_else(|| "EN".into()),
            insecure: merged.insecure.unwrap_or(false),
            cookie_file: merged.cookie_file,
            cookie_string: merged.cookie_string,
            verbose: merged.verbose.unwrap_or(false),
            mode,
            read_only: merged.read_only.unwrap_or(false),
            block_free_sql: merged.block_free_sql.unwrap_or(false),
            allowed_ops: merged.allowed_ops,
            disallowed_ops: merged.disallowed_ops,
            allowed_packages: split_list(merged.allowed_packages.as_deref()),
            enable_transports: merged.enable_transports.unwrap_or(false),
            transport_read_only: merged.transport_read_only.unwrap_or(false),
            allowed_transports: split_list(merged.allowed_transports.as_deref()),
            allow_transportable_edits: merged.allow_transportable_edits.unwrap_or(false),
            dry_run: merged.dry_run.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let has_basic = self.username.is_some() || self.password.is_some();
        let has_cookies = self.cookie_file.is_some() || self.cookie_string.is_some();
        if has_basic && has_cookies {
            bail!("basic and cookie authentication are mutually exclusive");
        }
        if !has_basic && !has_cookies {
            bail!("authentication is required: user/password or a cookie file/string");
        }
        if self.cookie_file.is_some() && self.cookie_string.is_some() {
            bail!("cookie-file and cookie-string are mutually exclusive");
        }
        if has_basic && (self.username.is_none() || self.password.is_none()) {
            bail!("both user and password are required for basic authentication");
        }
        Ok(())
    }

    /// Build the engine endpoint, reading and parsing cookie material.
    pub fn system_endpoint(&self) -> anyhow::Result<SystemEndpoint> {
        let auth_material = if let (Some(username), Some(password)) =
            (self.username.as_ref(), self.password.as_ref())
        {
            AuthMaterial::Basic {
                username: username.clone(),
                password: password.clone(),
            }
        } else if let Some(path) = &self.cookie_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading cookie file {}", path.display()))?;
            let mut cookies = auth::parse_netscape(&content)?;
            auth::ensure_usercontext(&mut cookies, &self.client, &self.language);
            AuthMaterial::Cookies(cookies)
        } else if let Some(cookie_string) = &self.cookie_string {
            let mut cookies = auth::parse_cookie_string(cookie_string)?;
            auth::ensure_usercontext(&mut cookies, &self.client, &self.language);
            AuthMaterial::Cookies(cookies)
        } else {
            bail!("no authentication material configured");
        };

        Ok(SystemEndpoint::new(
            self.base_url.clone(),
            self.client.clone(),
            self.language.clone(),
            self.insecure,
            auth_material,
        )?)
    }

    pub fn safety_policy(&self) -> anyhow::Result<SafetyPolicy> {
        Ok(SafetyPolicy {
            read_only: self.read_only,
            block_free_sql: self.block_free_sql,
            allowed_ops: match self.allowed_ops.as_deref() {
                Some(letters) => OperationClass::parse_set(letters)?,
                None => Default::default(),
            },
            disallowed_ops: match self.disallowed_ops.as_deref() {
                Some(letters) => OperationClass::parse_set(letters)?,
                None => Default::default(),
            },
            allowed_packages: self.allowed_packages.clone(),
            enable_transports: self.enable_transports,
            transport_read_only: self.transport_read_only,
            allowed_transports: self.allowed_transports.clone(),
            allow_transportable_edits: self.allow_transportable_edits,
            dry_run: self.dry_run,
        })
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a dotenv file: `KEY=value` lines, `#` comments, optional `export `
/// prefix, optional single or double quotes around the value.
pub fn parse_dotenv(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        let mut value = value.trim();
        if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
            || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        {
            value = &value[1..value.len() - 1];
        }
        map.insert(key.to_string(), value.to_string());
    }
    map
}

/// Load the dotenv file if present; a missing file is not an error.
pub fn load_dotenv(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading dotenv file {}", path.display()))?;
    Ok(parse_dotenv(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn basic_cli() -> Overrides {
        Overrides {
            base_url: Some("http://a4h:50000".into()),
            username: Some("DEVELOPER".into()),
            password: Some("secret".into()),
            ..Overrides::default()
        }
    }

    #[test]
    fn defaults_fill_the_gaps() {
        let config = Config::resolve(basic_cli(), &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(config.client, "001");
        assert_eq!(config.language, "EN");
        assert_eq!(config.mode, Mode::Focused);
        assert!(!config.read_only);
        assert!(!config.enable_transports);
    }

    #[test]
    fn precedence_is_cli_env_dotenv() {
        let mut dotenv = HashMap::new();
        dotenv.insert("SAP_CLIENT".to_string(), "100".to_string());
        dotenv.insert("SAP_LANGUAGE".to_string(), "DE".to_string());
        dotenv.insert("SAP_MODE".to_string(), "expert".to_string());

        let mut env = HashMap::new();
        env.insert("SAP_CLIENT".to_string(), "200".to_string());

        let mut cli = basic_cli();
        cli.language = Some("FR".into());

        let config = Config::resolve(cli, &env, &dotenv).unwrap();
        // env beats dotenv; cli beats both; dotenv fills the rest.
        assert_eq!(config.client, "200");
        assert_eq!(config.language, "FR");
        assert_eq!(config.mode, Mode::Expert);
    }

    #[test]
    fn missing_base_url_is_fatal() {
        let cli = Overrides {
            username: Some("U".into()),
            password: Some("P".into()),
            ..Overrides::default()
        };
        let err = Config::resolve(cli, &HashMap::new(), &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("SAP_URL"));
    }

    #[test]
    fn both_auth_styles_are_rejected() {
        let mut cli = basic_cli();
        cli.cookie_string = Some("a=b".into());
        let err = Config::resolve(cli, &HashMap::new(), &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn missing_auth_is_rejected() {
        let cli = Overrides {
            base_url: Some("http://a4h:50000".into()),
            ..Overrides::default()
        };
        assert!(Config::resolve(cli, &HashMap::new(), &HashMap::new()).is_err());
    }

    #[test]
    fn dotenv_parser_handles_comments_quotes_and_export() {
        let content = r#"
# SAP connection
export SAP_URL=http://a4h:50000
SAP_USER="DEVELOPER"
SAP_PASSWORD='se=cret'
SAP_ALLOWED_PACKAGES=$TMP, Z*

garbage line without equals
"#;
        let map = parse_dotenv(content);
        assert_eq!(map["SAP_URL"], "http://a4h:50000");
        assert_eq!(map["SAP_USER"], "DEVELOPER");
        assert_eq!(map["SAP_PASSWORD"], "se=cret");
        assert_eq!(map["SAP_ALLOWED_PACKAGES"], "$TMP, Z*");
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn safety_policy_mapping() {
        let mut cli = basic_cli();
        cli.read_only = Some(true);
        cli.allowed_ops = Some("RSQ".into());
        cli.allowed_packages = Some("$TMP,Z*".into());
        cli.enable_transports = Some(true);
        cli.transport_read_only = Some(true);

        let config = Config::resolve(cli, &HashMap::new(), &HashMap::new()).unwrap();
        let policy = config.safety_policy().unwrap();
        assert!(policy.read_only);
        assert_eq!(policy.allowed_ops.len(), 3);
        assert_eq!(policy.allowed_packages, vec!["$TMP", "Z*"]);
        assert!(policy.enable_transports);
        assert!(policy.transport_read_only);
    }

    #[test]
    fn cookie_file_round_trips_into_the_endpoint() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "a4h.example.com\tFALSE\t/\tFALSE\t0\tSAP_SESSIONID_A4H_001\tabc123"
        )
        .unwrap();

        let cli = Overrides {
            base_url: Some("http://a4h.example.com:50000".into()),
            cookie_file: Some(file.path().to_path_buf()),
            ..Overrides::default()
        };
        let config = Config::resolve(cli, &HashMap::new(), &HashMap::new()).unwrap();
        let endpoint = config.system_endpoint().unwrap();
        match endpoint.auth {
            AuthMaterial::Cookies(cookies) => {
                assert!(cookies.iter().any(|c| c.name == "SAP_SESSIONID_A4H_001"));
                // The usercontext cookie was synthesized.
                assert!(cookies.iter().any(|c| c.name == "sap-usercontext"));
            }
            AuthMaterial::Basic { .. } => panic!("expected cookie auth"),
        }
    }

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "on"] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["0", "false", "no", "off", "maybe"] {
            assert!(!is_truthy(value), "{value}");
        }
    }
}
