use anyhow::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Default)]
struct CredentialsData {
    #[serde(flatten)]
    data: HashMap<String, String>,
}

/// Flat key/value secrets file (TOML), kept apart from `config.toml`.
pub struct CredentialStore {
    path: PathBuf,
    credentials: HashMap<String, String>,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            credentials: HashMap::new(),
        }
    }

    pub fn load(&mut self) -> Result<()> {
        if self.path.exists() {
            let content = std::fs::read_to_string(&self.path)?;
            let creds_data: CredentialsData = toml::from_str(&content)?;
            self.credentials = creds_data.data;
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.credentials.get(key)
    }

    // Pre-issued bearer token; overrides the service account key when present
    pub fn get_sheets_access_token(&self) -> Option<&String> {
        self.get("google_sheets_access_token")
            .filter(|token| !token.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_credential_store_load() {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"google_sheets_access_token = \"ya29.token\"\nother = \"x\"\n").unwrap();

        let mut store = CredentialStore::new(file.path().to_path_buf());
        store.load().unwrap();
        assert_eq!(store.get_sheets_access_token(), Some(&"ya29.token".to_string()));
        assert_eq!(store.get("other"), Some(&"x".to_string()));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CredentialStore::new(dir.path().join("absent.toml"));
        store.load().unwrap();
        assert!(store.get_sheets_access_token().is_none());
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"google_sheets_access_token = \"  \"\n").unwrap();
        let mut store = CredentialStore::new(file.path().to_path_buf());
        store.load().unwrap();
        assert!(store.get_sheets_access_token().is_none());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"not = [valid").unwrap();
        let mut store = CredentialStore::new(file.path().to_path_buf());
        assert!(store.load().is_err());
    }
}
