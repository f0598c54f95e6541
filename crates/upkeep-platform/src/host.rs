use log::debug;
use tokio::process::Command;

pub const X86_64: &str = "x86_64";

/// Detect the running machine architecture.
///
/// Asks `uname -m` first so a 32-bit build on a 64-bit kernel still reports
/// the kernel's view, then falls back to the compile target.
pub async fn detect_host_arch() -> String {
    match Command::new("uname").arg("-m").output().await {
        Ok(output) if output.status.success() => {
            let arch = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !arch.is_empty() {
                return normalize_arch(&arch);
            }
        }
        Ok(output) => debug!("uname -m exited with {}", output.status),
        Err(error) => debug!("uname -m unavailable: {error}"),
    }

    normalize_arch(std::env::consts::ARCH)
}

/// Map common aliases onto the names used in release asset file names.
#[must_use]
pub fn normalize_arch(arch: &str) -> String {
    match arch.trim().to_ascii_lowercase().as_str() {
        "amd64" | "x64" | "x86-64" => X86_64.to_string(),
        "arm64" => "aarch64".to_string(),
        other => other.to_string(),
    }
}
