//! Server configuration from command-line arguments and the environment.

use std::path::Path;

use crate::error::ConfigError;

/// Default bind address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8082";

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable consulted when no ACL argument is given.
pub const ACL_ENV_VAR: &str = "GATEKEEP_ACL";

/// Usage text printed by `--help`.
pub const USAGE: &str = "\
gatekeep-server - ACL-gated gRPC service with audit streams

USAGE:
    gatekeep-server [OPTIONS]

OPTIONS:
    -l, --listen <ADDR>       Address to listen on [default: 127.0.0.1:8082]
        --acl <JSON>          ACL as JSON: {\"consumer\": [\"/pkg.Service/Method\", ...]}
        --acl-file <PATH>     Read the ACL JSON from a file
        --log-level <FILTER>  Log filter when RUST_LOG is unset [default: info]
    -h, --help                Print help information

The ACL may also be supplied through the GATEKEEP_ACL environment variable.";

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind to.
    pub listen_addr: String,
    /// ACL document as JSON text.
    pub acl_json: String,
    /// Log filter directive.
    pub log_level: String,
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the server with this configuration.
    Run(ServerConfig),
    /// Print usage and exit.
    Help,
}

impl ServerConfig {
    /// Parse arguments (without the program name).
    ///
    /// `env_acl` is the value of [`ACL_ENV_VAR`], used when neither `--acl`
    /// nor `--acl-file` is present.
    pub fn from_args<I>(args: I, env_acl: Option<String>) -> Result<Command, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut listen_addr = DEFAULT_LISTEN_ADDR.to_string();
        let mut log_level = DEFAULT_LOG_LEVEL.to_string();
        let mut acl_json = None;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next().ok_or_else(|| ConfigError::MissingValue {
                    arg: name.to_string(),
                })
            };
            match arg.as_str() {
                "--listen" | "-l" => listen_addr = value(arg.as_str())?,
                "--acl" => acl_json = Some(value(arg.as_str())?),
                "--acl-file" => acl_json = Some(read_acl_file(Path::new(&value(arg.as_str())?))?),
                "--log-level" => log_level = value(arg.as_str())?,
                "--help" | "-h" => return Ok(Command::Help),
                _ => return Err(ConfigError::UnknownArgument { arg }),
            }
        }

        let acl_json = acl_json.or(env_acl).ok_or(ConfigError::MissingAcl)?;
        Ok(Command::Run(Self {
            listen_addr,
            acl_json,
            log_level,
        }))
    }

    /// Parse the process arguments and environment.
    pub fn from_env() -> Result<Command, ConfigError> {
        Self::from_args(std::env::args().skip(1), std::env::var(ACL_ENV_VAR).ok())
    }
}

fn read_acl_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn parses_inline_acl_and_defaults() {
        let cmd = ServerConfig::from_args(args(&["--acl", r#"{"a":[]}"#]), None).unwrap();
        let Command::Run(cfg) = cmd else {
            panic!("expected run command");
        };
        assert_eq!(cfg.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(cfg.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(cfg.acl_json, r#"{"a":[]}"#);
    }

    #[test]
    fn parses_listen_and_log_level() {
        let cmd = ServerConfig::from_args(
            args(&["-l", "0.0.0.0:9000", "--log-level", "debug", "--acl", "{}"]),
            None,
        )
        .unwrap();
        let Command::Run(cfg) = cmd else {
            panic!("expected run command");
        };
        assert_eq!(cfg.listen_addr, "0.0.0.0:9000");
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn falls_back_to_environment() {
        let cmd = ServerConfig::from_args(Vec::new(), Some("{}".to_string())).unwrap();
        assert!(matches!(cmd, Command::Run(ServerConfig { ref acl_json, .. }) if acl_json == "{}"));

        let err = ServerConfig::from_args(Vec::new(), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAcl));
    }

    #[test]
    fn reads_acl_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"logger": ["/gatekeep.Admin/Logging"]}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cmd = ServerConfig::from_args(vec!["--acl-file".to_string(), path], None).unwrap();
        let Command::Run(cfg) = cmd else {
            panic!("expected run command");
        };
        assert!(cfg.acl_json.contains("logger"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json").display().to_string();
        let err = ServerConfig::from_args(vec!["--acl-file".to_string(), path], None).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn rejects_bad_arguments() {
        let err = ServerConfig::from_args(args(&["--listen"]), None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue { .. }));

        let err = ServerConfig::from_args(args(&["--bogus"]), None).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownArgument { .. }));

        assert_eq!(
            ServerConfig::from_args(args(&["--help"]), None).unwrap(),
            Command::Help
        );
    }
}
