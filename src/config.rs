use std::env;

/// Local fallback for the token signing secret. Never accepted in production.
const LOCAL_JWT_SECRET: &str = "blog-backend-local-secret";

/// AppConfig
///
/// Holds the application's entire configuration state. Loaded exactly once in `main`
/// and handed to every component through `AppState`, so nothing reads the environment
/// after startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Database connection string (Postgres). `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Runtime environment marker. Controls log format and secret requirements.
    pub env: Env,
    // Shared secret used to sign and verify session tokens (HS256).
    pub jwt_secret: String,
    // TCP port the HTTP server binds to.
    pub port: u16,
    // Argon2 memory cost in KiB.
    pub argon2_memory_kib: u32,
    // Argon2 iteration count.
    pub argon2_iterations: u32,
}

/// Env
///
/// Defines the runtime context: pretty logs and relaxed secrets locally, JSON logs and
/// mandatory secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for tests. Uses the in-memory store and a deliberately
    /// cheap Argon2 cost so hashing does not dominate test time.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: "super-secure-test-secret-value-local".to_string(),
            port: 3000,
            argon2_memory_kib: 256,
            argon2_iterations: 1,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and implements the **fail-fast**
    /// principle.
    ///
    /// # Panics
    /// Panics if `DATABASE_URL` or `JWT_SECRET` is missing in production, or if a numeric
    /// variable cannot be parsed. The server must not start half-configured.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in production"),
            ),
            Env::Local => env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        };

        let port = env::var("SERVER_PORT")
            .ok()
            .map(|raw| raw.parse().expect("FATAL: SERVER_PORT must be a port number"))
            .unwrap_or(3000);

        // Defaults are the argon2 crate's recommended parameters.
        let argon2_memory_kib = env::var("ARGON2_MEMORY_KIB")
            .ok()
            .map(|raw| raw.parse().expect("FATAL: ARGON2_MEMORY_KIB must be an integer"))
            .unwrap_or(argon2::Params::DEFAULT_M_COST);
        let argon2_iterations = env::var("ARGON2_ITERATIONS")
            .ok()
            .map(|raw| raw.parse().expect("FATAL: ARGON2_ITERATIONS must be an integer"))
            .unwrap_or(argon2::Params::DEFAULT_T_COST);

        Self {
            db_url,
            env,
            jwt_secret,
            port,
            argon2_memory_kib,
            argon2_iterations,
        }
    }
}
