//! Downloads of release binaries, signing keys, and repo definitions.

use crate::error::{ProvisionError, Result};
use crate::io;
use std::path::Path;
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Download `url` to `path` (atomically), optionally setting the file mode.
/// Redirects are followed; anything but a 2xx is an error.
pub fn download(url: &str, path: &Path, mode: Option<u32>) -> Result<()> {
    let failed = |detail: String| ProvisionError::Download {
        url: url.to_string(),
        detail,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }
    let body = response.bytes().map_err(|e| failed(e.to_string()))?;

    io::atomic_write(path, &body)?;
    if let Some(mode) = mode {
        io::set_mode(path, mode)?;
    }
    tracing::debug!("downloaded {url} -> {} ({} bytes)", path.display(), body.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn downloads_body_to_path() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/minikube-linux-amd64")
            .with_status(200)
            .with_body("#!/bin/sh\nexit 0\n")
            .create();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("minikube");
        download(
            &format!("{}/minikube-linux-amd64", server.url()),
            &dest,
            Some(0o755),
        )
        .unwrap();

        mock.assert();
        assert_eq!(
            std::fs::read_to_string(&dest).unwrap(),
            "#!/bin/sh\nexit 0\n"
        );
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&dest).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn http_error_status_fails() {
        let mut server = mockito::Server::new();
        server
            .mock("GET", "/Release.key")
            .with_status(404)
            .create();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("key.asc");
        let err = download(&format!("{}/Release.key", server.url()), &dest, None).unwrap_err();
        assert!(matches!(err, ProvisionError::Download { .. }));
        assert!(!dest.exists());
    }
}
