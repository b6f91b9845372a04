//! Session directory: opaque transport credentials, one JSON file per key.

use std::{
    fs,
    path::{Path, PathBuf},
};

use base64::Engine as _;

use crate::{errors::Error, storage::write_atomic, Result};

const QR_IMAGE_FILE: &str = "qr.png";

#[derive(Clone, Debug)]
pub struct SessionDir {
    root: PathBuf,
}

impl SessionDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True when no credentials were saved yet (fresh pairing needed).
    pub fn is_empty(&self) -> bool {
        let Ok(rd) = fs::read_dir(&self.root) else {
            return true;
        };
        !rd.flatten()
            .any(|e| e.path().extension().is_some_and(|ext| ext == "json"))
    }

    pub fn load(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let txt = fs::read_to_string(&path)?;
        if txt.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&txt)?))
    }

    pub fn save(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let path = self.path_for(key)?;
        let txt = serde_json::to_string_pretty(value)?;
        write_atomic(&path, txt.as_bytes())
    }

    /// Decode a `data:image/png;base64,...` (or bare base64) QR and write it
    /// next to the credentials. Returns the written path.
    pub fn save_qr_image(&self, data: &str) -> Result<PathBuf> {
        let b64 = data
            .split_once(";base64,")
            .map(|(_, rest)| rest)
            .unwrap_or(data)
            .trim();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map_err(|e| Error::External(format!("invalid QR image data: {e}")))?;
        let path = self.root.join(QR_IMAGE_FILE);
        write_atomic(&path, &bytes)?;
        Ok(path)
    }

    /// Drop a previously written QR image; a missing one is fine.
    pub fn remove_qr_image(&self) -> Result<()> {
        match fs::remove_file(self.root.join(QR_IMAGE_FILE)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(Error::Config(format!("invalid credential key: {key:?}")));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_and_load_round_trip_and_emptiness() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionDir::new(dir.path().join("auth"));
        assert!(session.is_empty());
        assert_eq!(session.load("creds").unwrap(), None);

        session
            .save("creds", &json!({ "instance": "demo", "hash": "t0k" }))
            .unwrap();
        assert!(!session.is_empty());
        assert_eq!(
            session.load("creds").unwrap(),
            Some(json!({ "instance": "demo", "hash": "t0k" }))
        );
    }

    #[test]
    fn rejects_path_like_keys() {
        let session = SessionDir::new("/tmp/unused");
        assert!(session.save("../escape", &json!({})).is_err());
        assert!(session.save("a/b", &json!({})).is_err());
        assert!(session.save("", &json!({})).is_err());
    }

    #[test]
    fn qr_image_is_decoded_from_data_url() {
        let dir = tempfile::tempdir().unwrap();
        let session = SessionDir::new(dir.path());
        let path = session
            .save_qr_image("data:image/png;base64,iVBORw0KGgo=")
            .unwrap();
        assert_eq!(
            fs::read(path).unwrap(),
            vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]
        );
        // The QR image is not a credential.
        assert!(session.is_empty());
        assert!(session.save_qr_image("not base64!").is_err());

        session.remove_qr_image().unwrap();
        assert!(!dir.path().join("qr.png").exists());
        session.remove_qr_image().unwrap();
    }
}
