//! # Matrix Document Module / 矩阵文档模块
//!
//! The declarative input of the orchestrator, loaded from a TOML file: the
//! ordered axes, the override fragment for every axis value, optional cache and
//! toolchain settings, and the step list every variant executes.
//!
//! 编排器的声明式输入，从 TOML 文件加载：有序的轴、每个轴值的覆盖片段、
//! 可选的缓存和工具链设置，以及每个变体执行的步骤列表。

use crate::core::error::ConfigError;
use crate::core::models::{Action, Condition, Step};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A named matrix dimension with its ordered values.
/// 一个具名的矩阵维度及其有序取值。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Axis {
    pub name: String,
    pub values: Vec<String>,
}

impl Axis {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// A scalar field value inside an override fragment.
/// 覆盖片段中的标量字段值。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Integer(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::String(s.to_string())
    }
}

/// Flat `field -> scalar` mapping merged into a variant when its axis value is selected.
/// 当选中某个轴值时合并到变体中的扁平 `字段 -> 标量` 映射。
pub type Fragment = BTreeMap<String, Scalar>;

/// Override fragments keyed by axis value name.
/// 以轴值名称为键的覆盖片段。
pub type Overrides = BTreeMap<String, Fragment>;

/// Settings for the default cache steps.
/// 默认缓存步骤的设置。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Path, relative to each job's working directory, that is restored and saved.
    /// 相对于每个作业工作目录的路径，用于恢复和保存。
    pub path: PathBuf,
    /// Optional namespace prefix for cache keys.
    /// 缓存键的可选命名空间前缀。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// How toolchains are installed and activated.
/// 工具链的安装和激活方式。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolchainSettings {
    /// Install command template; `{toolchain}` is replaced with the selector.
    /// 安装命令模板；`{toolchain}` 会被替换为工具链选择器。
    #[serde(default = "default_install_template")]
    pub install: String,
    /// Environment variable that selects the installed toolchain for later steps.
    /// 为后续步骤选择已安装工具链的环境变量。
    #[serde(default = "default_toolchain_env")]
    pub env: String,
}

impl Default for ToolchainSettings {
    fn default() -> Self {
        Self {
            install: default_install_template(),
            env: default_toolchain_env(),
        }
    }
}

fn default_install_template() -> String {
    "rustup toolchain install {toolchain} --profile minimal".to_string()
}

fn default_toolchain_env() -> String {
    "RUSTUP_TOOLCHAIN".to_string()
}

/// Kind of a declared step, as written in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    CacheRestore,
    CacheSave,
    Install,
    InstallToolchain,
    RunCommand,
}

/// A step as declared in the document, before validation.
/// 文档中声明的步骤（校验前）。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StepConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub action: ActionKind,
    /// Command line for `install` steps.
    #[serde(default)]
    pub command: Option<String>,
    /// Local path for cache steps; falls back to `[cache].path`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// All listed fields must equal the given values for the step to run.
    #[serde(default)]
    pub when: BTreeMap<String, String>,
    /// The step is skipped if all listed fields equal the given values.
    #[serde(default)]
    pub unless: BTreeMap<String, String>,
}

/// The entire matrix document.
/// 完整的矩阵文档。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatrixDocument {
    /// The language for the runner's output messages (e.g., "en", "zh-CN").
    /// 运行器输出消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,
    /// Default test command, overridable per axis value with a `command` field.
    /// 默认测试命令，可通过 `command` 字段按轴值覆盖。
    #[serde(default = "default_command")]
    pub command: String,
    /// Default extra argument string.
    #[serde(default)]
    pub args: String,
    /// Designated lock artifact, relative to the document.
    /// 指定的锁文件，相对于文档所在目录。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lockfile: Option<PathBuf>,
    /// Directory copied into each job's working directory before its steps run.
    /// 在步骤运行前复制到每个作业工作目录中的目录。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,
    #[serde(rename = "axis")]
    pub axes: Vec<Axis>,
    pub overrides: Overrides,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheSettings>,
    #[serde(default)]
    pub toolchain: ToolchainSettings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepConfig>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_command() -> String {
    "cargo test".to_string()
}

/// Document-level defaults every variant starts from before overrides apply.
/// 每个变体在应用覆盖之前的文档级默认值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTemplate {
    pub command: String,
    pub args: String,
    pub steps: Vec<Step>,
}

impl MatrixDocument {
    /// Parses a document from TOML text. `origin` is only used in errors.
    pub fn from_toml(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Validates the declared steps and builds the job template.
    /// 校验声明的步骤并构建作业模板。
    pub fn template(&self) -> Result<JobTemplate, ConfigError> {
        let steps = if self.steps.is_empty() {
            self.default_steps()
        } else {
            self.steps
                .iter()
                .enumerate()
                .map(|(i, config)| self.build_step(i, config))
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(JobTemplate {
            command: self.command.clone(),
            args: self.args.clone(),
            steps,
        })
    }

    /// Restore cache, install the toolchain when one is pinned, run, save cache.
    fn default_steps(&self) -> Vec<Step> {
        let mut steps = Vec::new();
        if let Some(cache) = &self.cache {
            steps.push(Step {
                name: "Restore cache".to_string(),
                condition: Condition::Always,
                action: Action::CacheRestore { path: cache.path.clone() },
            });
        }
        steps.push(Step {
            name: "Install toolchain".to_string(),
            condition: Condition::Present { field: "toolchain".to_string() },
            action: Action::InstallToolchain,
        });
        steps.push(Step {
            name: "Run tests".to_string(),
            condition: Condition::Always,
            action: Action::RunCommand,
        });
        if let Some(cache) = &self.cache {
            steps.push(Step {
                name: "Save cache".to_string(),
                condition: Condition::Always,
                action: Action::CacheSave { path: cache.path.clone() },
            });
        }
        steps
    }

    fn build_step(&self, index: usize, config: &StepConfig) -> Result<Step, ConfigError> {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("step {}", index + 1));
        let invalid = |reason: &str| ConfigError::InvalidStep {
            name: name.clone(),
            reason: reason.to_string(),
        };

        let cache_path = || {
            config
                .path
                .clone()
                .or_else(|| self.cache.as_ref().map(|c| c.path.clone()))
                .ok_or_else(|| invalid("cache steps need a `path` or a [cache] section"))
        };

        let action = match config.action {
            ActionKind::CacheRestore => Action::CacheRestore { path: cache_path()? },
            ActionKind::CacheSave => Action::CacheSave { path: cache_path()? },
            ActionKind::Install => {
                let command = config
                    .command
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| invalid("install steps need a non-empty `command`"))?;
                Action::Install { command }
            }
            ActionKind::InstallToolchain => Action::InstallToolchain,
            ActionKind::RunCommand => Action::RunCommand,
        };

        if let Action::CacheRestore { path } | Action::CacheSave { path } = &action {
            if path.is_absolute() || path.components().any(|c| c.as_os_str() == "..") {
                return Err(invalid("cache paths must stay inside the job working directory"));
            }
        }

        let mut condition = Condition::all_equal(&config.when);
        if !config.unless.is_empty() {
            let negated = Condition::Not(Box::new(Condition::all_equal(&config.unless)));
            condition = match condition {
                Condition::Always => negated,
                other => Condition::All(vec![other, negated]),
            };
        }

        Ok(Step { name, condition, action })
    }

    /// Resolves the lock artifact path against the document's directory.
    pub fn lockfile_path(&self, base_dir: &Path) -> Option<PathBuf> {
        self.lockfile.as_ref().map(|p| base_dir.join(p))
    }

    /// Resolves the workspace seed directory against the document's directory.
    pub fn workspace_path(&self, base_dir: &Path) -> Option<PathBuf> {
        self.workspace.as_ref().map(|p| base_dir.join(p))
    }

    /// Reads the lock artifact. A missing file is not an error here: the
    /// content is simply absent and only variants that cache will fail.
    ///
    /// 读取锁文件。文件不存在在此处不算错误：内容仅为空，
    /// 只有需要缓存的变体才会因此失败。
    pub fn read_lock_content(&self, base_dir: &Path) -> Result<Option<Vec<u8>>, ConfigError> {
        let Some(path) = self.lockfile_path(base_dir) else {
            return Ok(None);
        };
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::LockRead { path, source }),
        }
    }
}

/// Loads and parses a matrix document from disk.
/// 从磁盘加载并解析矩阵文档。
pub fn load_matrix(path: &Path) -> Result<MatrixDocument, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    MatrixDocument::from_toml(&content, path)
}
