use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, warn};
use rusoto_core::{HttpClient, Region};
use rusoto_s3::S3Client;

/// Parse a region name, falling back to the environment's default region.
pub fn resolve_region(region_name: Option<&str>) -> Region {
    match region_name {
        Some(name) => match name.parse::<Region>() {
            Ok(region) => region,
            Err(_) => {
                warn!("Invalid region '{}', using default", name);
                Region::default()
            }
        },
        None => Region::default(),
    }
}

/// Create an S3 client with the specified region and credentials profile.
///
/// Without a profile, or when the profile file cannot be read, the default
/// credential chain (environment, profile, instance metadata) is used.
pub fn create_s3_client(region_name: Option<&str>, profile: Option<&str>) -> Result<Arc<S3Client>> {
    let region = resolve_region(region_name);
    debug!("Using S3 region {}", region.name());

    let profile_name = match profile {
        Some(name) => name,
        None => return Ok(Arc::new(S3Client::new(region))),
    };

    match rusoto_credential::ProfileProvider::new() {
        Ok(mut provider) => {
            provider.set_profile(profile_name);
            let http_client = HttpClient::new().context("Failed to create HTTP client for S3")?;
            Ok(Arc::new(S3Client::new_with(http_client, provider, region)))
        }
        Err(e) => {
            warn!("Failed to load AWS profile '{}': {}, using default credentials", profile_name, e);
            Ok(Arc::new(S3Client::new(region)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_region() {
        assert_eq!(resolve_region(Some("eu-west-1")), Region::EuWest1);
    }

    #[test]
    fn test_resolve_invalid_region_falls_back() {
        assert_eq!(resolve_region(Some("moon-base-1")), Region::default());
    }

    #[tokio::test]
    async fn test_client_without_profile() {
        assert!(create_s3_client(Some("us-east-1"), None).is_ok());
    }
}
