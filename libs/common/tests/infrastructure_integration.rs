//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL database is properly configured and
//! accessible from the application. They need a running database reachable
//! through `DATABASE_URL` and are ignored by default.

use common::database::{DatabaseConfig, health_check, init_pool};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires a running PostgreSQL instance"]
async fn test_database_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    Ok(())
}

#[tokio::test]
async fn test_init_pool_rejects_malformed_url() {
    let config = DatabaseConfig {
        database_url: "not a url".to_string(),
        max_connections: 1,
        min_connections: 0,
        connection_timeout: 1,
    };

    let err = init_pool(&config).await.unwrap_err();
    assert!(matches!(err, common::error::DatabaseError::Configuration(_)));
}
