//! Output tree: `<root>/<job_id>/<format>/<file_id>.<ext>`.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::api::OutputFormat;

/// Writes downloaded results below a root directory.
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(sanitize(job_id))
    }

    pub fn path_for(&self, job_id: &str, file_id: &str, format: OutputFormat) -> PathBuf {
        self.job_dir(job_id)
            .join(format.as_str())
            .join(format!("{}.{}", sanitize(file_id), format.extension()))
    }

    /// Write one result. The bytes go to a sibling temp file first and are
    /// renamed into place, so readers never see a partial file. An existing
    /// file is overwritten.
    pub async fn write(
        &self,
        job_id: &str,
        file_id: &str,
        format: OutputFormat,
        bytes: &[u8],
    ) -> std::io::Result<PathBuf> {
        let target = self.path_for(job_id, file_id, format);
        let dir = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&dir).await?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = dir.join(format!(".{file_name}.part"));
        fs::write(&temp, bytes).await?;
        if let Err(e) = fs::rename(&temp, &target).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }
        Ok(target)
    }
}

/// Turn an id into a single path component. File ids come from the
/// manifest and may contain path separators. Distinct ids always map to
/// distinct names: `%` and the separators are percent-encoded, and the
/// special names `.` and `..` are spelled out in `%2E`.
fn sanitize(id: &str) -> String {
    match id {
        "" => return "%".to_string(),
        "." => return "%2E".to_string(),
        ".." => return "%2E%2E".to_string(),
        _ => {}
    }
    let mut encoded = String::with_capacity(id.len());
    for c in id.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            '/' => encoded.push_str("%2F"),
            '\\' => encoded.push_str("%5C"),
            ':' => encoded.push_str("%3A"),
            '\0' => encoded.push_str("%00"),
            c => encoded.push(c),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_into_job_and_format_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());

        let path = store
            .write("J1", "page-001.jpg", OutputFormat::Txt, b"hello")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("J1").join("txt").join("page-001.jpg.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn overwrites_existing_result_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());

        store.write("J1", "a", OutputFormat::Alto, b"old").await.unwrap();
        let path = store.write("J1", "a", OutputFormat::Alto, b"new").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        let names: Vec<String> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.alto.xml".to_string()]);
    }

    #[test]
    fn file_ids_cannot_escape_the_job_directory() {
        let store = OutputStore::new("/out");
        let path = store.path_for("J1", "../../etc/passwd", OutputFormat::Page);
        assert_eq!(
            path,
            PathBuf::from("/out/J1/page/..%2F..%2Fetc%2Fpasswd.page.xml")
        );

        assert_eq!(sanitize(".."), "%2E%2E");
        assert_eq!(sanitize("."), "%2E");
        assert_eq!(sanitize(""), "%");
    }

    #[test]
    fn distinct_ids_get_distinct_names() {
        let ids = [
            "scans/p1", "scans_p1", "scans%2Fp1", "scans\\p1", "scans:p1", "..", "%2E%2E", "", "%",
        ];
        let names: std::collections::BTreeSet<String> = ids.iter().map(|id| sanitize(id)).collect();
        assert_eq!(names.len(), ids.len());
    }

    #[tokio::test]
    async fn ids_differing_only_in_separators_keep_both_results() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path());

        let first = store
            .write("J1", "scans/p1", OutputFormat::Txt, b"first")
            .await
            .unwrap();
        let second = store
            .write("J1", "scans_p1", OutputFormat::Txt, b"second")
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"first");
        assert_eq!(std::fs::read(&second).unwrap(), b"second");
    }
}
