use crate::errors::RowscopeError;
use crossterm::tty::IsTty;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
    fn sleep_until(&self, deadline: SystemTime) -> Result<(), RowscopeError>;
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, RowscopeError>;
    fn write_string(&self, path: &Path, contents: &str) -> Result<(), RowscopeError>;
    fn exists(&self, path: &Path) -> bool;
}

pub trait Terminal: Send + Sync {
    fn stdout_is_tty(&self) -> bool;
    fn write_line(&self, line: &str) -> Result<(), RowscopeError>;
    fn draw(&self, frame: &str) -> Result<(), RowscopeError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ProductionClock;

impl Clock for ProductionClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), RowscopeError> {
        if let Ok(duration) = deadline.duration_since(SystemTime::now()) {
            std::thread::sleep(duration);
        }
        Ok(())
    }
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, RowscopeError> {
        std::fs::read_to_string(path)
            .map_err(|e| RowscopeError::Io(format!("{}: {e}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), RowscopeError> {
        std::fs::write(path, contents)
            .map_err(|e| RowscopeError::Io(format!("{}: {e}", path.display())))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn stdout_is_tty(&self) -> bool {
        std::io::stdout().is_tty()
    }

    fn write_line(&self, line: &str) -> Result<(), RowscopeError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| RowscopeError::Io(e.to_string()))
    }

    fn draw(&self, frame: &str) -> Result<(), RowscopeError> {
        self.write_line(frame)
    }
}

pub struct ProductionRuntime {
    pub clock: Arc<dyn Clock>,
    pub file_system: Arc<dyn FileSystem>,
    pub terminal: Arc<dyn Terminal>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ProductionClock),
            file_system: Arc::new(ProductionFileSystem),
            terminal: Arc::new(ProductionTerminal),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct FakeClock {
    now: Arc<Mutex<SystemTime>>,
    sleeps: Arc<Mutex<Vec<SystemTime>>>,
}

impl FakeClock {
    pub fn new(now: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sleeps(&self) -> Vec<SystemTime> {
        lock(&self.sleeps).clone()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }
}

impl Clock for FakeClock {
    fn now(&self) -> SystemTime {
        *lock(&self.now)
    }

    fn sleep_until(&self, deadline: SystemTime) -> Result<(), RowscopeError> {
        lock(&self.sleeps).push(deadline);
        *lock(&self.now) = deadline;
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    fail_next: Arc<Mutex<Option<RowscopeError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        lock(&fs.files).insert(path.into(), contents.into());
        fs
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        lock(&self.files).insert(path.into(), contents.into());
    }

    pub fn set_fail_next(&self, error: RowscopeError) {
        *lock(&self.fail_next) = Some(error);
    }

    fn maybe_fail(&self) -> Result<(), RowscopeError> {
        match lock(&self.fail_next).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, RowscopeError> {
        self.maybe_fail()?;
        lock(&self.files)
            .get(path)
            .cloned()
            .ok_or_else(|| RowscopeError::Io(format!("missing file {}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), RowscopeError> {
        self.maybe_fail()?;
        lock(&self.files).insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        lock(&self.files).contains_key(path)
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    pub is_tty: bool,
    writes: Arc<Mutex<Vec<String>>>,
    draws: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn new(is_tty: bool) -> Self {
        Self {
            is_tty,
            ..Self::default()
        }
    }

    pub fn written_lines(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }

    pub fn drawn_frames(&self) -> Vec<String> {
        lock(&self.draws).clone()
    }
}

impl Terminal for FakeTerminal {
    fn stdout_is_tty(&self) -> bool {
        self.is_tty
    }

    fn write_line(&self, line: &str) -> Result<(), RowscopeError> {
        lock(&self.writes).push(line.to_string());
        Ok(())
    }

    fn draw(&self, frame: &str) -> Result<(), RowscopeError> {
        lock(&self.draws).push(frame.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, FakeClock, FakeFileSystem, FakeTerminal, FileSystem, Terminal};
    use crate::errors::RowscopeError;
    use std::path::Path;
    use std::time::{Duration, SystemTime};

    #[test]
    fn fake_clock_jumps_to_each_deadline() {
        let clock = FakeClock::default();
        let deadline = SystemTime::UNIX_EPOCH + Duration::from_secs(3);
        clock.sleep_until(deadline).expect("sleep");
        assert_eq!(clock.now(), deadline);
        assert_eq!(clock.sleeps(), vec![deadline]);
    }

    #[test]
    fn fake_file_system_fails_once_when_asked() {
        let fs = FakeFileSystem::with_file("/cfg.toml", "x = 1");
        fs.set_fail_next(RowscopeError::Io("disk gone".to_string()));
        assert!(fs.read_to_string(Path::new("/cfg.toml")).is_err());
        assert_eq!(fs.read_to_string(Path::new("/cfg.toml")).expect("read"), "x = 1");
        assert!(!fs.exists(Path::new("/other.toml")));
    }

    #[test]
    fn fake_terminal_keeps_lines_and_frames_apart() {
        let terminal = FakeTerminal::new(true);
        terminal.write_line("line").expect("write");
        terminal.draw("frame").expect("draw");
        assert!(terminal.stdout_is_tty());
        assert_eq!(terminal.written_lines(), vec!["line".to_string()]);
        assert_eq!(terminal.drawn_frames(), vec!["frame".to_string()]);
    }
}
