use crate::columns::{ColumnConfig, DynamicColumns};
use crate::errors::RowscopeError;
use crate::logging::{DEFAULT_DISK_BUDGET_BYTES, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::runtime::FileSystem;
use crate::screens::{DynamicScreens, ScreenConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const MIN_WIDTH: u16 = 20;
pub const MIN_HEIGHT: u16 = 3;

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub snapshot_path: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub screen: Option<String>,
    pub tree_view: bool,
    pub width: Option<u16>,
    pub height: Option<u16>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub display: DisplayConfig,
    pub snapshot: SnapshotConfig,
    pub columns: Vec<ColumnConfig>,
    pub screens: Vec<ScreenConfig>,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DisplayConfig {
    pub highlight_delay_secs: u64,
    pub highlight_changes: bool,
    pub coloring: bool,
    pub tree_view: bool,
    pub hide_kernel_threads: bool,
    pub width: u16,
    pub height: u16,
    pub refresh_ms: u64,
    pub active_screen: Option<String>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
    pub budget_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig {
                highlight_delay_secs: 5,
                highlight_changes: true,
                coloring: true,
                tree_view: false,
                hide_kernel_threads: false,
                width: 120,
                height: 30,
                refresh_ms: 1500,
                active_screen: None,
                filter: None,
            },
            snapshot: SnapshotConfig { path: None },
            columns: Vec::new(),
            screens: Vec::new(),
            log: LogConfig {
                path: None,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
                budget_bytes: DEFAULT_DISK_BUDGET_BYTES,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    display: Option<PartialDisplayConfig>,
    snapshot: Option<SnapshotConfig>,
    columns: Option<Vec<ColumnConfig>>,
    screens: Option<Vec<ScreenConfig>>,
    log: Option<PartialLogConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialDisplayConfig {
    highlight_delay_secs: Option<u64>,
    highlight_changes: Option<bool>,
    coloring: Option<bool>,
    tree_view: Option<bool>,
    hide_kernel_threads: Option<bool>,
    width: Option<u16>,
    height: Option<u16>,
    refresh_ms: Option<u64>,
    active_screen: Option<String>,
    filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLogConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
    budget_bytes: Option<u64>,
}

pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
    fs: &dyn FileSystem,
) -> Result<AppConfig, RowscopeError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let path = absolutize_path(process_cwd, path);
        let file_contents = fs.read_to_string(&path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| RowscopeError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
        // paths inside the file are relative to the file itself
        let base = path.parent().unwrap_or(process_cwd).to_path_buf();
        cfg.snapshot.path = cfg.snapshot.path.map(|p| absolutize_path(&base, &p));
        cfg.log.path = cfg.log.path.map(|p| absolutize_path(&base, &p));
    }

    apply_cli_overrides(&mut cfg, overrides, process_cwd);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(display) = partial.display {
        if let Some(value) = display.highlight_delay_secs {
            cfg.display.highlight_delay_secs = value;
        }
        if let Some(value) = display.highlight_changes {
            cfg.display.highlight_changes = value;
        }
        if let Some(value) = display.coloring {
            cfg.display.coloring = value;
        }
        if let Some(value) = display.tree_view {
            cfg.display.tree_view = value;
        }
        if let Some(value) = display.hide_kernel_threads {
            cfg.display.hide_kernel_threads = value;
        }
        if let Some(value) = display.width {
            cfg.display.width = value;
        }
        if let Some(value) = display.height {
            cfg.display.height = value;
        }
        if let Some(value) = display.refresh_ms {
            cfg.display.refresh_ms = value;
        }
        if display.active_screen.is_some() {
            cfg.display.active_screen = display.active_screen;
        }
        if display.filter.is_some() {
            cfg.display.filter = display.filter;
        }
    }

    if let Some(snapshot) = partial.snapshot {
        cfg.snapshot = snapshot;
    }

    if let Some(columns) = partial.columns {
        cfg.columns = columns;
    }

    if let Some(screens) = partial.screens {
        cfg.screens = screens;
    }

    if let Some(log) = partial.log {
        if log.path.is_some() {
            cfg.log.path = log.path;
        }
        if let Some(value) = log.max_payload_bytes {
            cfg.log.max_payload_bytes = value;
        }
        if let Some(value) = log.budget_bytes {
            cfg.log.budget_bytes = value;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides, process_cwd: &Path) {
    if let Some(path) = &overrides.snapshot_path {
        cfg.snapshot.path = Some(absolutize_path(process_cwd, path));
    }
    if let Some(path) = &overrides.log_path {
        cfg.log.path = Some(absolutize_path(process_cwd, path));
    }
    if let Some(screen) = &overrides.screen {
        cfg.display.active_screen = Some(screen.clone());
    }
    if overrides.tree_view {
        cfg.display.tree_view = true;
    }
    if let Some(width) = overrides.width {
        cfg.display.width = width;
    }
    if let Some(height) = overrides.height {
        cfg.display.height = height;
    }
    if let Some(filter) = &overrides.filter {
        cfg.display.filter = Some(filter.clone());
    }
}

fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

fn validate_config(cfg: &AppConfig) -> Result<(), RowscopeError> {
    if cfg.display.width < MIN_WIDTH || cfg.display.height < MIN_HEIGHT {
        return Err(RowscopeError::InvalidConfig(format!(
            "display must be at least {MIN_WIDTH}x{MIN_HEIGHT}, got {}x{}",
            cfg.display.width, cfg.display.height
        )));
    }
    if cfg.log.max_payload_bytes < 64 {
        return Err(RowscopeError::InvalidConfig(
            "log.max_payload_bytes must be at least 64".to_string(),
        ));
    }
    if cfg.log.budget_bytes == 0 {
        return Err(RowscopeError::InvalidConfig(
            "log.budget_bytes must be greater than zero".to_string(),
        ));
    }
    DynamicColumns::from_config(&cfg.columns)?;
    DynamicScreens::from_config(&cfg.screens)?;
    Ok(())
}
