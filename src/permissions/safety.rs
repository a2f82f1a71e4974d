//! Hard-coded path safety layer
//!
//! Not policy-configurable: traversal components and dangerous system
//! directories are denied even when policy says allow, and paths matching
//! the sensitivity classifier escalate the decision (high denies without an
//! explicit allow rule, medium forces confirmation).

use std::path::{Component, Path};

/// System directories no tool may touch regardless of policy
pub const DANGEROUS_DIRS: &[&str] = &[
    "/etc", "/boot", "/sys", "/proc", "/dev", "/bin", "/sbin", "/usr/bin", "/usr/sbin", "/lib",
    "/lib64",
];

/// Sensitivity class of an affected path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Sensitivity {
    None,
    /// Forces confirmation even when policy allows
    Medium,
    /// Denied unless an explicit allow rule matches
    High,
}

/// An unconditional safety denial
#[derive(Debug, Clone)]
pub struct SafetyViolation {
    pub path: String,
    pub reason: String,
}

/// Check affected paths for traversal and dangerous system directories
pub fn check_paths(paths: &[String]) -> Option<SafetyViolation> {
    for path in paths {
        if has_traversal(path) {
            return Some(SafetyViolation {
                path: path.clone(),
                reason: "path contains '..' traversal".to_string(),
            });
        }
        if let Some(dir) = dangerous_dir(path) {
            return Some(SafetyViolation {
                path: path.clone(),
                reason: format!("path is under protected system directory {}", dir),
            });
        }
    }
    None
}

fn has_traversal(path: &str) -> bool {
    Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

fn dangerous_dir(path: &str) -> Option<&'static str> {
    let path = Path::new(path);
    DANGEROUS_DIRS
        .iter()
        .find(|dir| path.starts_with(dir))
        .copied()
}

/// Classify a single path
pub fn classify(path: &str) -> Sensitivity {
    let lower = path.to_ascii_lowercase();
    let name = Path::new(&lower)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Key material and credential stores
    let high_extensions = [".pem", ".key", ".p12", ".pfx"];
    if high_extensions.iter().any(|ext| name.ends_with(ext))
        || name.starts_with("id_rsa")
        || name.starts_with("id_ed25519")
        || name.ends_with("_rsa")
        || name == "credentials"
        || name == "credentials.json"
        || lower.contains("/.ssh/")
        || lower.contains("/.aws/")
        || lower.contains("/.gnupg/")
    {
        return Sensitivity::High;
    }

    // Environment files and token-bearing rc files
    if name.starts_with(".env")
        || name.ends_with(".env")
        || name == ".npmrc"
        || name == ".netrc"
        || name == ".pgpass"
        || name.contains("secret")
    {
        return Sensitivity::Medium;
    }

    Sensitivity::None
}

/// The highest sensitivity across all affected paths
pub fn classify_paths(paths: &[String]) -> Sensitivity {
    paths
        .iter()
        .map(|p| classify(p))
        .max()
        .unwrap_or(Sensitivity::None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_denied() {
        let violation = check_paths(&["/home/user/../../etc/passwd".to_string()]).unwrap();
        assert!(violation.reason.contains("traversal"));
    }

    #[test]
    fn test_dangerous_dirs_denied() {
        assert!(check_paths(&["/etc/passwd".to_string()]).is_some());
        assert!(check_paths(&["/sys/kernel/x".to_string()]).is_some());
        assert!(check_paths(&["/home/user/etc-notes.txt".to_string()]).is_none());
    }

    #[test]
    fn test_classify_high() {
        assert_eq!(classify("/home/u/.ssh/config"), Sensitivity::High);
        assert_eq!(classify("server.pem"), Sensitivity::High);
        assert_eq!(classify("api.key"), Sensitivity::High);
        assert_eq!(classify("/home/u/.aws/credentials"), Sensitivity::High);
        assert_eq!(classify("backup_rsa"), Sensitivity::High);
    }

    #[test]
    fn test_classify_medium() {
        assert_eq!(classify(".env"), Sensitivity::Medium);
        assert_eq!(classify("/app/.env.production"), Sensitivity::Medium);
        assert_eq!(classify("client-secrets.txt"), Sensitivity::Medium);
        assert_eq!(classify("/home/u/.netrc"), Sensitivity::Medium);
    }

    #[test]
    fn test_classify_none() {
        assert_eq!(classify("src/main.rs"), Sensitivity::None);
        assert_eq!(classify("README.md"), Sensitivity::None);
    }

    #[test]
    fn test_classify_paths_takes_max() {
        let paths = vec!["README.md".to_string(), ".env".to_string()];
        assert_eq!(classify_paths(&paths), Sensitivity::Medium);
        assert_eq!(classify_paths(&[]), Sensitivity::None);
    }
}
