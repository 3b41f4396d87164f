//! # Matrix Initialization Module / 矩阵初始化模块
//!
//! Interactive wizard that writes a starter `Matrix.toml`: one `toolchain`
//! axis, the matching overrides, and a dependency cache when the project has a
//! lockfile to key it on.
//!
//! 交互式向导，生成初始的 `Matrix.toml`：一个 `toolchain` 轴、对应的覆盖片段，
//! 以及在项目有锁文件可作为键时启用的依赖缓存。

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{Confirm, Input, MultiSelect, theme::ColorfulTheme};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::config::{
    Axis, CacheSettings, Fragment, MatrixDocument, Overrides, Scalar, ToolchainSettings,
};
use crate::infra::t;

const TOOLCHAINS: [&str; 3] = ["stable", "beta", "nightly"];
const LOCKFILE: &str = "Cargo.lock";

#[derive(Deserialize)]
struct Package {
    name: String,
}

#[derive(Deserialize)]
struct Manifest {
    package: Package,
}

/// Runs the wizard and writes the document to `output`.
///
/// With `non_interactive` the default document is written without prompting,
/// and an existing file is only replaced when `force` is set.
///
/// 运行向导并将文档写入 `output`。非交互模式下直接写入默认文档，
/// 仅当设置了 `force` 时才会覆盖已有文件。
pub fn run_init_wizard(language: &str, non_interactive: bool, force: bool, output: &Path) -> Result<()> {
    let theme = ColorfulTheme::default();
    let project_dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let has_lockfile = project_dir.join(LOCKFILE).exists();

    if !non_interactive {
        println!("\n{}", t!("init_wizard_welcome", locale = language).cyan().bold());
        println!("{}", t!("init_wizard_description", locale = language));
    }

    if output.exists() && !force {
        if non_interactive {
            println!(
                "{}",
                t!("init_exists_skipped", locale = language, path = output.display()).yellow()
            );
            return Ok(());
        }
        let confirmation = Confirm::with_theme(&theme)
            .with_prompt(t!("init_overwrite_prompt", locale = language, path = output.display()))
            .default(false)
            .interact()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;
        if !confirmation {
            println!("{}", t!("init_aborted", locale = language));
            return Ok(());
        }
    }

    let crate_name = detect_crate_name(&project_dir).ok();

    if non_interactive {
        let document = default_document(language, &TOOLCHAINS, None, has_lockfile, crate_name);
        return write_config(output, &document, language);
    }

    if let Some(name) = &crate_name {
        println!(
            "{}",
            t!("init_detected_crate_name", locale = language, name = name.green())
        );
    }

    let selections = MultiSelect::with_theme(&theme)
        .with_prompt(t!("init_toolchain_selection_prompt", locale = language))
        .items(&TOOLCHAINS)
        .defaults(&[true, true, true])
        .interact()
        .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    let toolchains: Vec<&str> = if selections.is_empty() {
        println!("{}", t!("init_no_toolchains_selected", locale = language).yellow());
        vec![TOOLCHAINS[0]]
    } else {
        selections.into_iter().map(|i| TOOLCHAINS[i]).collect()
    };

    let command: String = Input::with_theme(&theme)
        .with_prompt(t!("init_command_prompt", locale = language))
        .default("cargo test".to_string())
        .interact_text()?;

    let use_cache = has_lockfile
        && Confirm::with_theme(&theme)
            .with_prompt(t!("init_cache_prompt", locale = language))
            .default(true)
            .interact()
            .context(t!("init_user_confirmation_failed", locale = language).to_string())?;

    let document = default_document(language, &toolchains, Some(command), use_cache, crate_name);
    write_config(output, &document, language)
}

/// Builds the starter document for the given toolchains.
fn default_document(
    language: &str,
    toolchains: &[&str],
    command: Option<String>,
    use_cache: bool,
    crate_name: Option<String>,
) -> MatrixDocument {
    let overrides: Overrides = toolchains
        .iter()
        .map(|name| {
            let fragment: Fragment =
                BTreeMap::from([("toolchain".to_string(), Scalar::from(*name))]);
            (name.to_string(), fragment)
        })
        .collect();

    MatrixDocument {
        language: language.to_string(),
        command: command.unwrap_or_else(|| "cargo test".to_string()),
        args: String::new(),
        lockfile: use_cache.then(|| PathBuf::from(LOCKFILE)),
        workspace: Some(PathBuf::from(".")),
        axes: vec![Axis::new("toolchain", toolchains)],
        overrides,
        cache: use_cache.then(|| CacheSettings {
            path: PathBuf::from("target"),
            prefix: crate_name,
        }),
        toolchain: ToolchainSettings::default(),
        steps: Vec::new(),
    }
}

fn write_config(path: &Path, document: &MatrixDocument, language: &str) -> Result<()> {
    let toml_string = toml::to_string_pretty(document)
        .context(t!("init_serialize_failed", locale = language).to_string())?;

    fs::write(path, toml_string)
        .with_context(|| t!("init_write_failed", locale = language, path = path.display()).to_string())?;

    println!(
        "\n{} {}",
        "✔".green(),
        t!("init_success_created", locale = language, path = path.display()).bold()
    );
    println!("{}", t!("init_usage_hint", locale = language));

    Ok(())
}

/// Reads the package name from `Cargo.toml` in `dir`; used as the cache prefix.
fn detect_crate_name(dir: &Path) -> Result<String> {
    let content = fs::read_to_string(dir.join("Cargo.toml"))?;
    let manifest: Manifest = toml::from_str(&content)?;
    Ok(manifest.package.name)
}
