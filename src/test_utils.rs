#[cfg(test)]
pub mod test_utils {
    use crate::auth::{hash_password, issue_pair};
    use crate::config::{build_app_state, AppConfig};
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::Router;
    use axum_test::TestServer;
    use migration::{Migrator, MigratorTrait};
    use model::entities::{breed, user};
    use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};
    use std::ops::Deref;
    use std::path::PathBuf;
    use tempfile::TempDir;
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    /// Password every fixture user is created with.
    pub const TEST_PASSWORD: &str = "Whiskers-2024!";

    /// Configuration for tests: in-memory database and fast hashing.
    pub fn test_config() -> AppConfig {
        let media_root = PathBuf::from("media");
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            secret_key: "test-secret-key".to_string(),
            access_token_lifetime_days: 7,
            refresh_token_lifetime_days: 14,
            page_size: 10,
            media_root,
            media_url: "/backend_media/".to_string(),
            password_hash_cost: 4,
            request_timeout_secs: 30,
        }
    }

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");
        db.execute_unprepared("PRAGMA foreign_keys = ON;")
            .await
            .expect("Failed to enable foreign keys");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// App state of one test. Its media directory is deleted on drop.
    pub struct TestState {
        state: AppState,
        _media: TempDir,
    }

    impl Deref for TestState {
        type Target = AppState;

        fn deref(&self) -> &AppState {
            &self.state
        }
    }

    /// Create AppState for testing, with media stored in a temporary directory
    pub async fn setup_test_app_state() -> TestState {
        let media = TempDir::new().expect("Failed to create media directory");
        let config = AppConfig {
            media_root: media.path().to_path_buf(),
            ..test_config()
        };
        let db = setup_test_db().await;
        TestState {
            state: build_app_state(db, config),
            _media: media,
        }
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is determined by the RUST_LOG environment variable,
    /// defaulting to WARN if not set.
    pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> Router {
        let db = setup_test_db().await;
        create_router(build_app_state(db, test_config()))
    }

    /// Test server plus the state behind it, for tests that seed data directly.
    pub async fn setup_test_server() -> (TestServer, TestState) {
        let state = setup_test_app_state().await;
        let server = TestServer::new(create_router(state.state.clone())).unwrap();
        (server, state)
    }

    /// Insert an active user with [`TEST_PASSWORD`].
    pub async fn create_test_user(state: &AppState, username: &str, is_staff: bool) -> user::Model {
        let password = hash_password(TEST_PASSWORD.to_string(), state.config.password_hash_cost)
            .await
            .unwrap();
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{}@example.com", username)),
            first_name: Set(None),
            last_name: Set(None),
            password: Set(password),
            is_staff: Set(is_staff),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap()
    }

    pub async fn create_test_breed(state: &AppState, name: &str) -> breed::Model {
        breed::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap()
    }

    /// A fresh access token for the user.
    pub async fn access_token_for(state: &AppState, user: &user::Model) -> String {
        issue_pair(&state.db, &state.config, user.id).await.unwrap().access
    }

    /// `Authorization` header value for the user.
    pub async fn bearer_for(state: &AppState, user: &user::Model) -> String {
        format!("Bearer {}", access_token_for(state, user).await)
    }

    #[tokio::test]
    async fn test_media_directory_removed_on_drop() {
        let state = setup_test_app_state().await;
        let media_root = state.config.media_root.clone();
        std::fs::write(media_root.join("cat.png"), b"png").unwrap();
        assert!(media_root.exists());

        drop(state);
        assert!(!media_root.exists());
    }
}
