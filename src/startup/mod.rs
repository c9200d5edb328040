//! Startup self-checks module
//!
//! Verifies the environment before the server starts accepting requests:
//! - Configuration values are usable
//! - Database is reachable and the schema is migrated
//! - The uploads directory is writable (local image storage)
//! - The image store responds

use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

use crate::config::{Config, StorageBackend};
use crate::storage::ImageStore;
use crate::DbPool;

const REQUIRED_TABLES: [&str; 5] = ["users", "products", "cart", "orders", "order_items"];

/// Result of a single startup check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Failure should abort startup
    pub critical: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            critical: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>, critical: bool) -> Self {
        Self {
            name: name.into(),
            passed: false,
            critical,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Aggregated startup check results
#[derive(Debug, Clone, Serialize)]
pub struct StartupCheckReport {
    pub checks: Vec<CheckResult>,
    pub all_critical_passed: bool,
    pub all_passed: bool,
    pub summary: String,
}

impl StartupCheckReport {
    pub fn new(checks: Vec<CheckResult>) -> Self {
        let all_critical_passed = checks.iter().filter(|c| c.critical).all(|c| c.passed);
        let all_passed = checks.iter().all(|c| c.passed);

        let failed_critical = checks.iter().filter(|c| c.critical && !c.passed).count();
        let failed_non_critical = checks.iter().filter(|c| !c.critical && !c.passed).count();
        let total = checks.len();
        let passed = checks.iter().filter(|c| c.passed).count();

        let summary = if all_passed {
            format!("All {} startup checks passed", total)
        } else if all_critical_passed {
            format!(
                "{}/{} checks passed ({} non-critical warnings)",
                passed, total, failed_non_critical
            )
        } else {
            format!(
                "{}/{} checks passed ({} critical failures)",
                passed, total, failed_critical
            )
        };

        Self {
            checks,
            all_critical_passed,
            all_passed,
            summary,
        }
    }

    /// Names of critical checks that failed
    pub fn critical_failures(&self) -> Vec<&str> {
        self.checks
            .iter()
            .filter(|c| c.critical && !c.passed)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Run all startup self-checks
pub async fn run_startup_checks(
    config: &Config,
    db: &DbPool,
    images: &dyn ImageStore,
) -> StartupCheckReport {
    info!("Running startup self-checks...");

    let mut checks = vec![
        check_configuration(config),
        check_database_connectivity(db).await,
        check_database_schema(db).await,
    ];
    if config.storage.backend == StorageBackend::Local {
        checks.push(check_directory_writability(&config.uploads_dir()));
    }
    checks.push(check_image_store(images).await);

    let report = StartupCheckReport::new(checks);

    for check in &report.checks {
        if check.passed {
            info!(check = %check.name, message = %check.message, "Startup check PASSED");
        } else if check.critical {
            error!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (CRITICAL)"
            );
        } else {
            warn!(
                check = %check.name,
                message = %check.message,
                details = ?check.details,
                "Startup check FAILED (non-critical)"
            );
        }
    }

    info!(
        summary = %report.summary,
        all_passed = report.all_passed,
        all_critical_passed = report.all_critical_passed,
        "Startup checks completed"
    );

    report
}

fn check_configuration(config: &Config) -> CheckResult {
    match config.validate() {
        Ok(()) => CheckResult::pass("configuration", "Configuration is valid").with_details(
            format!(
                "Storage: {:?}, {} images of up to {} bytes",
                config.storage.backend, config.storage.max_images, config.storage.max_file_bytes
            ),
        ),
        Err(e) => CheckResult::fail("configuration", "Configuration is invalid", true)
            .with_details(e.to_string()),
    }
}

async fn check_database_connectivity(db: &DbPool) -> CheckResult {
    match sqlx::query("SELECT 1").fetch_one(db).await {
        Ok(_) => CheckResult::pass("database_connectivity", "Database connection successful"),
        Err(e) => CheckResult::fail(
            "database_connectivity",
            "Failed to connect to database",
            true,
        )
        .with_details(e.to_string()),
    }
}

fn missing_tables(present: &[String]) -> Vec<&'static str> {
    REQUIRED_TABLES
        .iter()
        .filter(|t| !present.iter().any(|p| p == *t))
        .copied()
        .collect()
}

async fn check_database_schema(db: &DbPool) -> CheckResult {
    let result: Result<Vec<String>, _> = sqlx::query_scalar(
        "SELECT table_name::TEXT FROM information_schema.tables WHERE table_schema = current_schema()",
    )
    .fetch_all(db)
    .await;

    match result {
        Ok(tables) => {
            let missing = missing_tables(&tables);
            if missing.is_empty() {
                CheckResult::pass(
                    "database_schema",
                    format!("Database schema valid ({} tables)", tables.len()),
                )
            } else {
                CheckResult::fail("database_schema", "Missing database tables", true)
                    .with_details(format!("Missing: {}", missing.join(", ")))
            }
        }
        Err(e) => CheckResult::fail("database_schema", "Failed to query database schema", true)
            .with_details(e.to_string()),
    }
}

fn check_directory_writability(dir: &Path) -> CheckResult {
    if let Err(e) = std::fs::create_dir_all(dir) {
        return CheckResult::fail(
            "uploads_directory",
            "Uploads directory cannot be created",
            true,
        )
        .with_details(format!("{}: {}", dir.display(), e));
    }

    let test_file = dir.join(".retrade_write_test");
    match std::fs::write(&test_file, "test") {
        Ok(_) => {
            let _ = std::fs::remove_file(&test_file);
            CheckResult::pass("uploads_directory", "Uploads directory is writable")
                .with_details(format!("Path: {}", dir.display()))
        }
        Err(e) => CheckResult::fail(
            "uploads_directory",
            "Uploads directory is not writable",
            true,
        )
        .with_details(format!("{}: {}", dir.display(), e)),
    }
}

/// Non-critical: the catalogue works without uploads
async fn check_image_store(images: &dyn ImageStore) -> CheckResult {
    if images.is_available().await {
        CheckResult::pass("image_storage", format!("{} image storage available", images.name()))
    } else {
        CheckResult::fail(
            "image_storage",
            format!("{} image storage not reachable", images.name()),
            false,
        )
        .with_details("Sellers will not be able to upload photos")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalImageStore;

    #[test]
    fn test_check_result_pass() {
        let result = CheckResult::pass("test", "Test passed");
        assert!(result.passed);
        assert!(!result.critical);
        assert_eq!(result.name, "test");
    }

    #[test]
    fn test_startup_check_report_all_passed() {
        let checks = vec![
            CheckResult::pass("check1", "ok"),
            CheckResult::pass("check2", "ok"),
        ];
        let report = StartupCheckReport::new(checks);
        assert!(report.all_passed);
        assert!(report.all_critical_passed);
        assert_eq!(report.summary, "All 2 startup checks passed");
    }

    #[test]
    fn test_startup_check_report_critical_failure() {
        let checks = vec![
            CheckResult::pass("check1", "ok"),
            CheckResult::fail("database_schema", "fail", true),
        ];
        let report = StartupCheckReport::new(checks);
        assert!(!report.all_passed);
        assert!(!report.all_critical_passed);
        assert_eq!(report.critical_failures(), vec!["database_schema"]);
    }

    #[test]
    fn test_startup_check_report_non_critical_failure() {
        let checks = vec![
            CheckResult::pass("check1", "ok"),
            CheckResult::fail("image_storage", "warn", false),
        ];
        let report = StartupCheckReport::new(checks);
        assert!(!report.all_passed);
        assert!(report.all_critical_passed);
        assert!(report.critical_failures().is_empty());
    }

    #[test]
    fn test_missing_tables() {
        let present: Vec<String> = ["users", "products", "cart", "_sqlx_migrations"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(missing_tables(&present), vec!["orders", "order_items"]);
    }

    #[test]
    fn test_configuration_check() {
        assert!(check_configuration(&Config::default()).passed);

        let mut config = Config::default();
        config.auth.session_secret = "short".to_string();
        let result = check_configuration(&config);
        assert!(!result.passed);
        assert!(result.critical);
    }

    #[test]
    fn test_directory_writability() {
        let dir = tempfile::tempdir().unwrap();
        let uploads = dir.path().join("uploads");
        assert!(check_directory_writability(&uploads).passed);
        assert!(uploads.exists());
    }

    #[tokio::test]
    async fn test_image_store_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalImageStore::new(dir.path().join("uploads"), "/uploads");
        store.ensure_dir().await.unwrap();
        assert!(check_image_store(&store).await.passed);
    }
}
