use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` via a tempfile in the same directory.
/// A step killed mid-write must not leave a half-written config behind.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

/// Append `line` unless an identical line is already present (exact line
/// match, so re-runs leave the file untouched). Returns true if appended.
pub fn ensure_line(path: &Path, line: &str) -> Result<bool> {
    let existing = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };
    if existing.lines().any(|l| l == line) {
        return Ok(false);
    }
    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(line);
    updated.push('\n');
    atomic_write(path, updated.as_bytes())?;
    Ok(true)
}

/// Replace the first occurrence of `from` with `to`. Returns true if the
/// file changed, false if `from` was not found (already-replaced files pass
/// through untouched, which is what makes re-runs safe).
pub fn replace_once(path: &Path, from: &str, to: &str) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(path)?;
    let Some(pos) = content.find(from) else {
        return Ok(false);
    };
    let mut updated = String::with_capacity(content.len() + to.len());
    updated.push_str(&content[..pos]);
    updated.push_str(to);
    updated.push_str(&content[pos + from.len()..]);
    atomic_write(path, updated.as_bytes())?;
    Ok(true)
}

/// Comment out (prefix with `#`) every uncommented line containing `needle`.
/// Returns the number of lines changed.
pub fn comment_lines_containing(path: &Path, needle: &str) -> Result<usize> {
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(path)?;
    let (updated, changed) = comment_lines(&content, needle);
    if changed > 0 {
        atomic_write(path, updated.as_bytes())?;
    }
    Ok(changed)
}

fn comment_lines(content: &str, needle: &str) -> (String, usize) {
    let mut out = String::with_capacity(content.len() + 8);
    let mut changed = 0;
    for line in content.lines() {
        if !line.trim_start().starts_with('#') && line.contains(needle) {
            out.push('#');
            changed += 1;
        }
        out.push_str(line);
        out.push('\n');
    }
    (out, changed)
}

/// Apply a chmod-style mode to an existing file.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file_and_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("etc/sysctl.d/k8s.conf");
        atomic_write(&path, b"net.ipv4.ip_forward = 1\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "net.ipv4.ip_forward = 1\n"
        );
    }

    #[test]
    fn write_if_missing_preserves_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf");
        std::fs::write(&path, b"original").unwrap();
        assert!(!write_if_missing(&path, b"new").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn ensure_line_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("modules");
        assert!(ensure_line(&path, "br_netfilter").unwrap());
        assert!(!ensure_line(&path, "br_netfilter").unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.matches("br_netfilter").count(), 1);
    }

    #[test]
    fn replace_once_toggles_exactly_one_occurrence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "SystemdCgroup = false\nother = false\n").unwrap();
        assert!(replace_once(&path, "SystemdCgroup = false", "SystemdCgroup = true").unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("SystemdCgroup = true"));
        assert!(content.contains("other = false"));
        // Second run finds nothing to do.
        assert!(!replace_once(&path, "SystemdCgroup = false", "SystemdCgroup = true").unwrap());
    }

    #[test]
    fn comment_lines_skips_already_commented() {
        let (out, changed) = comment_lines(
            "# /swapfile none swap sw 0 0\n/dev/sda2 none swap sw 0 0\nUUID=abc / ext4 defaults 0 1\n",
            "swap",
        );
        assert_eq!(changed, 1);
        assert!(out.contains("#/dev/sda2 none swap sw 0 0"));
        assert!(out.contains("UUID=abc / ext4 defaults 0 1"));
    }

    #[test]
    fn comment_lines_containing_missing_file_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fstab");
        assert_eq!(comment_lines_containing(&path, "swap").unwrap(), 0);
    }
}
