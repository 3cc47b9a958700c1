use anyhow::{bail, Context};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Side channel invoked once per match.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, virtual_host: &str, address: &str) -> anyhow::Result<()>;
}

/// Runs a `%s %s` command template through `sh -c`.
#[derive(Debug, Clone)]
pub struct ShellNotifier {
    template: String,
}

impl ShellNotifier {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn render(&self, virtual_host: &str, address: &str) -> String {
        render_command(&self.template, &[virtual_host, address])
    }
}

#[async_trait]
impl Notifier for ShellNotifier {
    async fn notify(&self, virtual_host: &str, address: &str) -> anyhow::Result<()> {
        let command = self.render(virtual_host, address);
        let status = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("failed to start {command:?}"))?;
        if !status.success() {
            bail!("{command:?} exited with {status}");
        }
        Ok(())
    }
}

/// Fills `%s` slots left to right; `%%` is a literal percent sign. Slots
/// beyond the supplied arguments are left as written.
fn render_command(template: &str, args: &[&str]) -> String {
    let extra: usize = args.iter().map(|arg| arg.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut args = args.iter();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s') => {
                chars.next();
                match args.next() {
                    Some(arg) => out.push_str(arg),
                    None => out.push_str("%s"),
                }
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }
    out
}
