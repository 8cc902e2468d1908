//! Opening the sign-in URL.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Hands a URL to the user.
///
/// A failure is not fatal to the flow: the URL is also reported back to the
/// caller so it can be opened by hand.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Open `url`.
    ///
    /// # Errors
    ///
    /// Any I/O error from launching the browser, or a non-zero exit status.
    async fn open(&self, url: &str) -> std::io::Result<()>;
}

/// How long to wait for the launcher process to report a failure.
const LAUNCHER_EXIT_WAIT: Duration = Duration::from_secs(3);

/// Opens URLs with the platform's default handler.
///
/// `open` on macOS, `cmd /C start` on Windows, `xdg-open` elsewhere. A
/// launcher still running after a few seconds is left alone and counted as
/// opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

#[async_trait]
impl BrowserLauncher for SystemBrowser {
    async fn open(&self, url: &str) -> std::io::Result<()> {
        let mut command = if cfg!(target_os = "macos") {
            let mut c = Command::new("open");
            c.arg(url);
            c
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", "start", ""]).arg(url);
            c
        } else {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        };

        // stdout belongs to the MCP transport.
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        match tokio::time::timeout(LAUNCHER_EXIT_WAIT, child.wait()).await {
            Ok(status) => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(std::io::Error::other(format!(
                        "browser launcher exited with {status}"
                    )))
                }
            }
            Err(_) => {
                tracing::debug!("browser launcher still running, not waiting for it");
                Ok(())
            }
        }
    }
}

/// Never opens anything. For headless environments and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBrowser;

#[async_trait]
impl BrowserLauncher for NoBrowser {
    async fn open(&self, url: &str) -> std::io::Result<()> {
        tracing::debug!(url, "browser launch disabled");
        Ok(())
    }
}
