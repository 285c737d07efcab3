//! Config generation and reload boundary
//! Template rendering lives outside this crate; this module only triggers it

use crate::access_lists::ProxyHost;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

/// Reverse-proxy config generation and reload operations
#[async_trait]
pub trait HostConfigGenerator: Send + Sync {
    /// Regenerate configs for the given hosts in one batch
    async fn bulk_generate_configs(&self, host_type: &str, hosts: &[ProxyHost]) -> Result<()>;

    /// Reload the reverse proxy so regenerated configs take effect
    async fn reload(&self) -> Result<()>;
}

/// Generator that shells out to configured external commands, argv-style.
///
/// The generate command (if any) receives the host type followed by the
/// affected host ids as arguments; the reload command runs as configured,
/// e.g. `nginx -s reload`.
pub struct CommandGenerator {
    generate_cmd: Option<Vec<String>>,
    reload_cmd: Vec<String>,
}

impl CommandGenerator {
    pub fn new(generate_cmd: Option<Vec<String>>, reload_cmd: Vec<String>) -> Self {
        Self {
            generate_cmd,
            reload_cmd,
        }
    }

    /// Run a command with args passed as a list, never through a shell.
    /// Non-zero exit is an error carrying the captured stderr.
    async fn run(argv: &[String], extra_args: &[String]) -> Result<()> {
        let (program, args) = argv
            .split_first()
            .context("empty command configured")?;

        debug!("Running {} {:?} {:?}", program, args, extra_args);

        let output = Command::new(program)
            .args(args)
            .args(extra_args)
            .output()
            .await
            .with_context(|| format!("failed to spawn '{}'", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "'{}' exited with {}: {}",
                program,
                output.status,
                stderr.trim()
            );
        }

        Ok(())
    }
}

#[async_trait]
impl HostConfigGenerator for CommandGenerator {
    async fn bulk_generate_configs(&self, host_type: &str, hosts: &[ProxyHost]) -> Result<()> {
        let Some(argv) = &self.generate_cmd else {
            debug!("No generate command configured, skipping config generation");
            return Ok(());
        };

        let mut args = Vec::with_capacity(hosts.len() + 1);
        args.push(host_type.to_string());
        args.extend(hosts.iter().map(|h| h.id.clone()));

        info!("Regenerating configs for {} host(s)", hosts.len());
        Self::run(argv, &args).await
    }

    async fn reload(&self) -> Result<()> {
        info!("Reloading reverse proxy");
        Self::run(&self.reload_cmd, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reload_success() {
        let gen = CommandGenerator::new(None, vec!["true".to_string()]);
        assert!(gen.reload().await.is_ok());
    }

    #[tokio::test]
    async fn test_reload_nonzero_exit_is_error() {
        let gen = CommandGenerator::new(None, vec!["false".to_string()]);
        assert!(gen.reload().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let gen = CommandGenerator::new(None, vec!["./no-such-binary-here".to_string()]);
        assert!(gen.reload().await.is_err());
    }

    #[tokio::test]
    async fn test_generate_without_command_is_noop() {
        let gen = CommandGenerator::new(None, vec!["true".to_string()]);
        let hosts = vec![ProxyHost {
            id: "h1".to_string(),
            enabled: true,
            domain_names: vec!["h1.example.com".to_string()],
        }];
        assert!(gen.bulk_generate_configs("proxy_host", &hosts).await.is_ok());
    }
}
