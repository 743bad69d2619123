//! Tests for the public configuration builder

use std::path::PathBuf;
use std::time::Duration;

use site_archiver::{ArchiveConfig, ConfigError, DownloadBudget};

#[test]
fn test_custom_sites_dir_is_normalized() {
    let config = ArchiveConfig::builder()
        .sites_dir("/web/archive/")
        .project_root("/srv/notes")
        .build()
        .unwrap();

    assert_eq!(config.sites_dir(), "web/archive");
    assert_eq!(config.sites_path(), PathBuf::from("/srv/notes/web/archive"));
}

#[test]
fn test_setters_apply_after_project_root() {
    let config = ArchiveConfig::builder()
        .project_root("/srv/notes")
        .max_css_depth(2)
        .max_concurrent_fetches(3)
        .user_agent("archiver-test/1.0")
        .connect_timeout(Duration::from_secs(2))
        .build()
        .unwrap();

    assert_eq!(config.budget().max_css_depth, 2);
    assert_eq!(config.max_concurrent_fetches(), 3);
    assert_eq!(config.user_agent(), "archiver-test/1.0");
    assert_eq!(config.budget().connect_timeout, Duration::from_secs(2));
}

#[test]
fn test_budget_replaces_every_limit() {
    let budget = DownloadBudget {
        max_resource_bytes: 10,
        max_image_bytes: 20,
        max_page_bytes: 30,
        request_timeout: Duration::from_secs(1),
        connect_timeout: Duration::from_secs(1),
        max_css_depth: 0,
    };
    let config = ArchiveConfig::builder()
        .budget(budget)
        .project_root("/srv/notes")
        .build()
        .unwrap();

    assert_eq!(*config.budget(), budget);
}

#[test]
fn test_invalid_settings_are_rejected() {
    let empty_root = ArchiveConfig::builder().project_root("").build();
    assert!(matches!(empty_root, Err(ConfigError::EmptyProjectRoot)));

    let empty_sites = ArchiveConfig::builder()
        .sites_dir("/")
        .project_root("/srv/notes")
        .build();
    assert!(matches!(empty_sites, Err(ConfigError::InvalidSitesDir(_))));

    let zero_timeout = ArchiveConfig::builder()
        .project_root("/srv/notes")
        .request_timeout(Duration::ZERO)
        .build();
    assert!(matches!(
        zero_timeout,
        Err(ConfigError::Zero {
            field: "request_timeout"
        })
    ));

    let zero_fetches = ArchiveConfig::builder()
        .project_root("/srv/notes")
        .max_concurrent_fetches(0)
        .build();
    assert!(matches!(
        zero_fetches,
        Err(ConfigError::Zero {
            field: "max_concurrent_fetches"
        })
    ));
}
