//! Deployment properties of the Backstage stack
//!
//! Every field has a default; a TOML file may override any subset.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Most availability zones any region offers
pub const MAX_AZS: usize = 6;

/// Properties loading error
#[derive(Debug, thiserror::Error)]
pub enum PropsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse properties: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid properties: {0}")]
    Invalid(String),
}

/// CPU architecture the container image is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Architecture {
    X86_64,
    Arm64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackstageProps {
    /// Container image (registry/repository[:tag])
    pub image: String,
    pub container_port: u16,
    pub listener_port: u16,
    pub cpu: u32,
    pub memory_mib: u32,
    pub architecture: Architecture,
    pub desired_count: u32,
    pub max_azs: usize,
    pub log_stream_prefix: String,

    pub database_name: String,
    pub database_username: String,
    pub engine_version: String,
    pub instance_class: String,
    pub database_instances: usize,
    pub min_capacity: f64,
    pub max_capacity: f64,
}

impl Default for BackstageProps {
    fn default() -> Self {
        Self {
            image: "975050238273.dkr.ecr.ap-south-1.amazonaws.com/backstage".to_string(),
            container_port: 7007,
            listener_port: 80,
            cpu: 512,
            memory_mib: 1024,
            architecture: Architecture::Arm64,
            desired_count: 1,
            max_azs: 2,
            log_stream_prefix: "Backstage".to_string(),
            database_name: "backstage".to_string(),
            database_username: "postgres".to_string(),
            engine_version: "13.12".to_string(),
            instance_class: "db.t3.medium".to_string(),
            database_instances: 2,
            min_capacity: 0.5,
            max_capacity: 4.0,
        }
    }
}

impl BackstageProps {
    /// Load properties from a TOML file
    pub fn load(path: &Path) -> Result<Self, PropsError> {
        let content = std::fs::read_to_string(path).map_err(|source| PropsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let props = Self::from_toml_str(&content)?;
        log::debug!("loaded properties from {}", path.display());
        Ok(props)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PropsError> {
        let props: Self = toml::from_str(content)?;
        props.validate()?;
        Ok(props)
    }

    /// Checks that do not belong to any single construct
    pub fn validate(&self) -> Result<(), PropsError> {
        if self.image.trim().is_empty() {
            return Err(PropsError::Invalid("image must not be empty".to_string()));
        }
        if self.container_port == 0 || self.listener_port == 0 {
            return Err(PropsError::Invalid("ports must be non-zero".to_string()));
        }
        if !(1..=MAX_AZS).contains(&self.max_azs) {
            return Err(PropsError::Invalid(format!(
                "max_azs must be between 1 and {}, got {}",
                MAX_AZS, self.max_azs
            )));
        }
        if self.database_username.is_empty() {
            return Err(PropsError::Invalid(
                "database_username must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_portal_deployment() {
        let props = BackstageProps::default();
        assert_eq!(props.container_port, 7007);
        assert_eq!(props.listener_port, 80);
        assert_eq!((props.cpu, props.memory_mib), (512, 1024));
        assert_eq!(props.architecture, Architecture::Arm64);
        assert_eq!((props.min_capacity, props.max_capacity), (0.5, 4.0));
        assert!(props.validate().is_ok());
    }

    #[test]
    fn toml_overrides_a_subset() {
        let props = BackstageProps::from_toml_str(
            r#"
            image = "registry.example.com/backstage:1.2"
            desired_count = 2
            architecture = "X86_64"
            max_capacity = 8.0
            "#,
        )
        .unwrap();
        assert_eq!(props.image, "registry.example.com/backstage:1.2");
        assert_eq!(props.desired_count, 2);
        assert_eq!(props.architecture, Architecture::X86_64);
        assert_eq!(props.max_capacity, 8.0);
        assert_eq!(props.container_port, 7007);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = BackstageProps::from_toml_str("imgae = \"typo\"");
        assert!(matches!(result, Err(PropsError::Parse(_))));
    }

    #[test]
    fn zero_port_is_invalid() {
        let result = BackstageProps::from_toml_str("container_port = 0");
        assert!(matches!(result, Err(PropsError::Invalid(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        let result = BackstageProps::load(Path::new("/nonexistent/backstage.toml"));
        assert!(matches!(result, Err(PropsError::Io { .. })));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "desired_count = 3").unwrap();

        let props = BackstageProps::load(file.path()).unwrap();
        assert_eq!(props.desired_count, 3);
    }

    #[test]
    fn availability_zone_count_is_bounded() {
        for max_azs in [0, MAX_AZS + 1, usize::MAX] {
            let props = BackstageProps {
                max_azs,
                ..Default::default()
            };
            assert!(matches!(props.validate(), Err(PropsError::Invalid(_))));
        }
        assert!(matches!(
            BackstageProps::from_toml_str("max_azs = 7"),
            Err(PropsError::Invalid(_))
        ));
        let props = BackstageProps::from_toml_str("max_azs = 3").unwrap();
        assert_eq!(props.max_azs, 3);
    }
}
