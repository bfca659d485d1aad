//! Common test utilities for E2E tests

#![allow(dead_code)]

use platzigram::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const PASSWORD: &str = "correct-horse-battery";

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    /// Client that does not follow redirects
    pub client: reqwest::Client,
}

pub fn test_config(temp_dir: &TempDir) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "localhost".to_string(),
            protocol: "http".to_string(),
        },
        database: config::DatabaseConfig {
            path: temp_dir.path().join("test.db"),
        },
        media: config::MediaConfig {
            root: temp_dir.path().join("media"),
            url: "/media".to_string(),
            max_upload_bytes: 1024 * 1024,
        },
        auth: config::AuthConfig {
            session_secret: "test-secret-key-that-is-32-bytes!".to_string(),
            session_max_age: 3600,
            session_cleanup_interval_seconds: 3600,
        },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: "pretty".to_string(),
        },
    }
}

impl TestServer {
    /// Create a new test server instance
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        Self::with_config(test_config(&temp_dir), temp_dir).await
    }

    pub async fn with_config(config: config::AppConfig, temp_dir: TempDir) -> Self {
        platzigram::metrics::init_metrics();

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = platzigram::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get full URL for a path
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// POST the signup form
    pub async fn signup(&self, username: &str, email: &str) -> reqwest::Response {
        self.client
            .post(self.url("/users/signup/"))
            .form(&[
                ("username", username),
                ("password", PASSWORD),
                ("password_confirmation", PASSWORD),
                ("first_name", "Test"),
                ("last_name", "User"),
                ("email", email),
            ])
            .send()
            .await
            .expect("signup request succeeds")
    }

    /// POST the login form
    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/users/login/"))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .expect("login request succeeds")
    }

    /// Sign up and log in, returning the `Cookie` header value
    pub async fn create_user(&self, username: &str) -> String {
        let response = self
            .signup(username, &format!("{}@example.com", username))
            .await;
        assert_eq!(response.status(), 303, "signup of {username} failed");

        let response = self.login(username, PASSWORD).await;
        assert_eq!(response.status(), 303, "login of {username} failed");
        session_cookie(&response).expect("login sets the session cookie")
    }

    /// GET with a session cookie
    pub async fn get_as(&self, cookie: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .header("Cookie", cookie)
            .send()
            .await
            .expect("request succeeds")
    }

    /// POST a new post with a PNG photo
    pub async fn create_post(&self, cookie: &str, title: &str) -> reqwest::Response {
        let form = reqwest::multipart::Form::new()
            .text("title", title.to_string())
            .part("photo", png_part());

        self.client
            .post(self.url("/posts/new/"))
            .header("Cookie", cookie)
            .multipart(form)
            .send()
            .await
            .expect("create post request succeeds")
    }
}

/// `sessionid=...` pair from a response's Set-Cookie headers
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("sessionid="))
        .and_then(|value| value.split(';').next())
        .map(ToOwned::to_owned)
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .expect("location header")
        .to_string()
}

/// A small valid PNG
pub fn png_bytes() -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
        4,
        4,
        image::Rgb([200, 40, 90]),
    ));
    let mut out = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .expect("png encodes");
    out.into_inner()
}

pub fn png_part() -> reqwest::multipart::Part {
    reqwest::multipart::Part::bytes(png_bytes())
        .file_name("photo.png")
        .mime_str("image/png")
        .expect("valid mime")
}
