//! # Toolchain Installer Module / 工具链安装模块
//!
//! Makes a toolchain available to the steps that follow the install. The
//! command-template implementation runs an installer (by default `rustup`) and
//! activates the toolchain through an environment variable.
//!
//! 使工具链对安装之后的步骤可用。命令模板实现会运行安装程序（默认为
//! `rustup`），并通过环境变量激活该工具链。

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::core::config::ToolchainSettings;
use crate::core::error::StepError;
use crate::infra::command::{parse_command_line, CommandSpec, ProcessLauncher};

/// What a successful install produced.
/// 安装成功后的产物。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    /// Variables that select the toolchain for subsequent steps.
    /// 为后续步骤选择该工具链的环境变量。
    pub env: BTreeMap<String, String>,
    /// Installer output, appended to the job's diagnostic stream.
    pub output: String,
}

/// Installs toolchains by identifier.
#[async_trait]
pub trait ToolchainInstaller: Send + Sync {
    /// # Errors
    /// A [`StepError`] if the installer could not run or failed. The job runner
    /// treats this as fatal to the variant.
    async fn install(
        &self,
        step: &str,
        toolchain: &str,
        env: &BTreeMap<String, String>,
        work_dir: &Path,
    ) -> Result<Activation, StepError>;
}

/// Runs a command template such as `rustup toolchain install {toolchain}`.
pub struct CommandInstaller {
    launcher: Arc<dyn ProcessLauncher>,
    settings: ToolchainSettings,
}

impl CommandInstaller {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, settings: ToolchainSettings) -> Self {
        Self { launcher, settings }
    }
}

#[async_trait]
impl ToolchainInstaller for CommandInstaller {
    async fn install(
        &self,
        step: &str,
        toolchain: &str,
        env: &BTreeMap<String, String>,
        work_dir: &Path,
    ) -> Result<Activation, StepError> {
        let line = self.settings.install.replace("{toolchain}", toolchain);
        let (program, args) = parse_command_line(step, &line, env)?;
        let spec = CommandSpec {
            program: program.clone(),
            args,
            env: env.clone(),
            current_dir: work_dir.to_path_buf(),
        };

        let result = self
            .launcher
            .launch(&spec)
            .await
            .map_err(|source| StepError::Spawn {
                step: step.to_string(),
                program: program.clone(),
                source,
            })?;

        let output = format!("$ {}\n{}", spec.display_line(), result.output);
        if !result.success() {
            return Err(StepError::NonZeroExit {
                step: step.to_string(),
                program,
                code: result.exit_code,
                output,
            });
        }

        let mut activation_env = BTreeMap::new();
        if !self.settings.env.is_empty() {
            activation_env.insert(self.settings.env.clone(), toolchain.to_string());
        }
        Ok(Activation {
            env: activation_env,
            output,
        })
    }
}
