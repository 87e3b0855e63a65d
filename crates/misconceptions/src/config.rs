use std::path::PathBuf;

use crate::error::AppError;

/// Runtime paths. The data directory holds the collection artifact
/// and the generated images; it must be given explicitly.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolves the data directory from the `--data-dir` flag, falling
    /// back to `MISCONCEPTIONS_DATA_DIR`.
    pub fn resolve(flag: Option<PathBuf>) -> Result<Self, AppError> {
        let data_dir = match flag {
            Some(dir) => dir,
            None => std::env::var("MISCONCEPTIONS_DATA_DIR")
                .map(PathBuf::from)
                .map_err(|_| {
                    AppError::Config(
                        "data directory is required: pass --data-dir or set MISCONCEPTIONS_DATA_DIR"
                            .to_string(),
                    )
                })?,
        };
        Ok(Self { data_dir })
    }

    pub fn collection_path(&self) -> PathBuf {
        self.data_dir.join("misconceptions.json")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Image files are joined to records by id.
    pub fn image_path(&self, id: &str) -> PathBuf {
        self.images_dir().join(format!("{id}.png"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_takes_precedence() {
        let config = Config::resolve(Some(PathBuf::from("/tmp/motd"))).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/motd"));
    }

    #[test]
    fn derived_paths() {
        let config = Config {
            data_dir: PathBuf::from("/var/lib/motd"),
        };
        assert_eq!(
            config.collection_path(),
            PathBuf::from("/var/lib/motd/misconceptions.json")
        );
        assert_eq!(
            config.image_path("napoleonwasshort-6f7"),
            PathBuf::from("/var/lib/motd/images/napoleonwasshort-6f7.png")
        );
    }
}
