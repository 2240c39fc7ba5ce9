use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Give the server a moment to start accepting before the page loads.
pub const OPEN_DELAY: Duration = Duration::from_millis(600);

fn opener_command(url: &str) -> Command {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = Command::new("rundll32");
        c.arg("url.dll,FileProtocolHandler");
        c
    } else if cfg!(target_os = "macos") {
        Command::new("open")
    } else {
        Command::new("xdg-open")
    };
    cmd.arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

/// Open `url` in the default browser after [`OPEN_DELAY`]. Failures are only
/// logged; the dashboard works without a browser.
pub fn open_later(url: String) {
    tokio::spawn(async move {
        tokio::time::sleep(OPEN_DELAY).await;
        match opener_command(&url).spawn() {
            Ok(mut child) => {
                let _ = child.wait().await;
            }
            Err(e) => tracing::debug!(%url, error = %e, "could not open browser"),
        }
    });
}
