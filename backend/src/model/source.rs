use log::{info, warn};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

use super::backend::LoadError;

/// Where the model weights come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    Local(PathBuf),
    Remote { url: Url, sha256: Option<String> },
}

impl ModelSource {
    /// `http(s)://` values are downloaded, anything else is a local path.
    /// The checksum only applies to downloads.
    pub fn parse(raw: &str, sha256: Option<String>) -> Result<Self, url::ParseError> {
        let raw = raw.trim();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Ok(ModelSource::Remote {
                url: Url::parse(raw)?,
                sha256: sha256.map(|s| s.trim().to_ascii_lowercase()),
            })
        } else {
            Ok(ModelSource::Local(PathBuf::from(raw)))
        }
    }

    /// Returns a local path holding the weights, downloading into
    /// `cache_dir` first when needed.
    pub async fn materialize(
        &self,
        http: &reqwest::Client,
        cache_dir: &Path,
    ) -> Result<PathBuf, LoadError> {
        match self {
            ModelSource::Local(path) => {
                if tokio::fs::try_exists(path).await? {
                    Ok(path.clone())
                } else {
                    Err(LoadError::MissingArtifact(path.clone()))
                }
            }
            ModelSource::Remote { url, sha256 } => {
                let target = cache_dir.join(cache_file_name(url));
                if tokio::fs::try_exists(&target).await? {
                    match sha256 {
                        None => return Ok(target),
                        Some(expected) => {
                            let actual = calculate_hash(&tokio::fs::read(&target).await?);
                            if &actual == expected {
                                return Ok(target);
                            }
                            warn!(
                                "Cached model {} has checksum {}, downloading again",
                                target.display(),
                                actual
                            );
                        }
                    }
                }
                download(http, url, sha256.as_deref(), cache_dir, &target).await?;
                Ok(target)
            }
        }
    }
}

async fn download(
    http: &reqwest::Client,
    url: &Url,
    expected: Option<&str>,
    cache_dir: &Path,
    target: &Path,
) -> Result<(), LoadError> {
    info!("Downloading model from {}", url);
    let bytes = http
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    let actual = calculate_hash(&bytes);
    if let Some(expected) = expected {
        if actual != expected {
            return Err(LoadError::Checksum {
                expected: expected.to_string(),
                actual,
            });
        }
    }

    tokio::fs::create_dir_all(cache_dir).await?;
    let partial = target.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, target).await?;
    info!("Model cached at {} ({} bytes)", target.display(), bytes.len());
    Ok(())
}

pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn cache_file_name(url: &Url) -> String {
    let digest = calculate_hash(url.as_str().as_bytes());
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("model.pt");
    format!("{}-{}", &digest[..16], name)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Nothing listens on the discard port, so any download attempt fails fast.
    const UNREACHABLE: &str = "http://127.0.0.1:9/weights/mobilenet_v2.pt";

    #[test]
    fn parses_paths_and_urls() {
        assert_eq!(
            ModelSource::parse("models/net.pt", Some("AB".into())).unwrap(),
            ModelSource::Local(PathBuf::from("models/net.pt"))
        );

        match ModelSource::parse(" https://example.com/m.pt ", Some("ABCD".into())).unwrap() {
            ModelSource::Remote { url, sha256 } => {
                assert_eq!(url.as_str(), "https://example.com/m.pt");
                assert_eq!(sha256.as_deref(), Some("abcd"));
            }
            other => panic!("expected remote source, got {:?}", other),
        }

        assert!(ModelSource::parse("http://", None).is_err());
    }

    #[test]
    fn cache_names_are_stable_and_keep_the_file_name() {
        let url = Url::parse(UNREACHABLE).unwrap();
        let name = cache_file_name(&url);
        assert!(name.ends_with("-mobilenet_v2.pt"));
        assert_eq!(name, cache_file_name(&url));

        let bare = Url::parse("https://example.com/").unwrap();
        assert!(cache_file_name(&bare).ends_with("-model.pt"));
    }

    #[tokio::test]
    async fn local_sources_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let http = reqwest::Client::new();

        let path = dir.path().join("net.pt");
        std::fs::write(&path, b"weights").unwrap();
        let resolved = ModelSource::Local(path.clone())
            .materialize(&http, dir.path())
            .await
            .unwrap();
        assert_eq!(resolved, path);

        let missing = dir.path().join("absent.pt");
        let err = ModelSource::Local(missing)
            .materialize(&http, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingArtifact(_)));
    }

    #[tokio::test]
    async fn verified_cache_hit_skips_the_network() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(UNREACHABLE).unwrap();
        let cached = dir.path().join(cache_file_name(&url));
        std::fs::write(&cached, b"weights").unwrap();

        let source = ModelSource::Remote {
            url,
            sha256: Some(calculate_hash(b"weights")),
        };
        let resolved = source
            .materialize(&reqwest::Client::new(), dir.path())
            .await
            .unwrap();
        assert_eq!(resolved, cached);
    }

    #[tokio::test]
    async fn stale_cache_is_downloaded_again() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::parse(UNREACHABLE).unwrap();
        std::fs::write(dir.path().join(cache_file_name(&url)), b"corrupted").unwrap();

        let source = ModelSource::Remote {
            url,
            sha256: Some(calculate_hash(b"weights")),
        };
        let err = source
            .materialize(&reqwest::Client::new(), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Download(_)));
    }
}
