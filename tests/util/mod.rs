use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }

    pub fn unset(key: &str) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::remove_var(key) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Schema and rows shared by the integration tests.
///
/// `sales` holds daily rows for 2021-01-01..05 (north on the 1st and 3rd,
/// south on the 2nd) and monthly rows for Feb..May 2021.
#[allow(dead_code)]
pub const METRICS_SQL: &str = r#"
    CREATE TABLE sales (
        date DATE NOT NULL,
        period TEXT NOT NULL,
        region TEXT NOT NULL,
        amount INTEGER NOT NULL
    );
    INSERT INTO sales VALUES
        ('2021-01-01', 'date', 'north', 120),
        ('2021-01-03', 'date', 'north', 80),
        ('2021-01-02', 'date', 'south', 40),
        ('2021-01-05', 'date', 'east', 10),
        ('2021-02-01', 'month', 'north', 100),
        ('2021-03-01', 'month', 'north', 110),
        ('2021-04-01', 'month', 'north', 0),
        ('2021-05-01', 'month', 'north', 30);
    CREATE TABLE shares (date DATE, period TEXT, channel TEXT, amount REAL);
    INSERT INTO shares VALUES
        ('2021-01-01', 'date', 'web', 30),
        ('2021-01-02', 'date', 'web', 20),
        ('2021-01-01', 'date', 'store', 150);
"#;

#[allow(dead_code)]
pub fn metrics_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    conn.execute_batch(METRICS_SQL).expect("seed metrics");
    conn
}

#[allow(dead_code)]
pub struct TempFixtureDir {
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TempFixtureDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Seeded metrics database file in this directory.
    pub fn metrics_db(&self) -> PathBuf {
        let path = self.dir.path().join("metrics.db");
        let conn = Connection::open(&path).expect("open db file");
        conn.execute_batch(METRICS_SQL).expect("seed metrics");
        path
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        write_file(&path, contents);
        path
    }
}

#[allow(dead_code)]
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dir");
    }
    std::fs::write(path, contents).expect("write fixture");
}
