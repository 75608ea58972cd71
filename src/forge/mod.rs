//! FMU generation pipeline.
//!
//! [`Forge`] drives one model through a fixed sequence of stages, from
//! input validation to the packaged `.fmu` archive:
//!
//! ```text
//! ValidateInputs -> PrepareTargetTree -> CopyTemplate -> PersistRecoveryInput
//!     -> AllocateReferences -> SubstitutePlaceholders -> InvokeExternalBuild
//!     -> PostEditDescriptor -> CollectBinaryArtifact -> AssembleArchive -> Done
//! ```
//!
//! Each stage runs exactly once and the first failure aborts the run.
//! Nothing is rolled back on failure: the partial project tree and the
//! recovery input file stay on disk so the run can be diagnosed and
//! restarted. The recovery file is written before value references are
//! allocated, so a restarted run re-allocates from the same input.
//!
//! External tools (the CMake build and the optional FMU checker) are
//! reached through the [`toolchain`] traits, so tests substitute fakes and
//! the pipeline itself never spawns processes.

pub mod archive;
pub mod toolchain;

use std::path::{Path, PathBuf};
use std::time::Duration;

use strum_macros::{Display, EnumString};
use tracing::{debug, info};

use crate::allocator::allocate_value_references;
use crate::descriptor::{self, DESCRIPTOR_FILE_NAME, PackageIdentity};
use crate::descriptor::postedit::post_edit_descriptor;
use crate::error::{Error, Result};
use crate::model::{AUTO_VALUE_REF, ModelSpec};
use crate::progress::ProgressSink;
use crate::source;
use crate::template::TreeSubstitution;
use toolchain::{BuildTool, CHECK_LOG_NAME, CheckTool, CmakeBuild, FmuCheck};

/// Directory inside the template project that holds the descriptor.
const PROJECT_DATA_DIR: &str = "data";

/// File the TCP endpoint of the generated binary is written to.
const ENDPOINT_FILE_NAME: &str = "addr.config";

/// Name of the intermediate archive left in the project tree.
const INTERMEDIATE_ARCHIVE_NAME: &str = "temp.zip";

/// Target platform of the packaged binary, named after the FMI 2.0
/// `binaries/` subdirectory convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    Win32,
    Win64,
    Linux32,
    Linux64,
    Darwin64,
}

impl Platform {
    /// Platform of the machine this process runs on.
    pub fn host() -> Self {
        if cfg!(target_os = "windows") {
            if cfg!(target_pointer_width = "64") {
                Platform::Win64
            } else {
                Platform::Win32
            }
        } else if cfg!(target_os = "macos") {
            Platform::Darwin64
        } else if cfg!(target_pointer_width = "64") {
            Platform::Linux64
        } else {
            Platform::Linux32
        }
    }

    /// Shared-library extension used for the packaged binary.
    pub fn binary_extension(&self) -> &'static str {
        match self {
            Platform::Win32 | Platform::Win64 => "dll",
            Platform::Linux32 | Platform::Linux64 => "so",
            Platform::Darwin64 => "dylib",
        }
    }
}

/// TCP endpoint written next to the finished archive so the generated
/// binary knows where its simulator peer lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpEndpoint {
    /// Port the generated binary listens on.
    pub local_port: u16,
    /// Address of the remote simulator.
    pub remote_ip: String,
    /// Port of the remote simulator.
    pub remote_port: u16,
}

impl Default for TcpEndpoint {
    fn default() -> Self {
        Self {
            local_port: 12000,
            remote_ip: "127.0.0.1".to_string(),
            remote_port: 5500,
        }
    }
}

/// Configuration for a generation run.
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// Template project to copy. Its directory name is the base name
    /// replaced with the model name throughout the copied tree.
    pub template_dir: PathBuf,
    /// Platform the binary is built for.
    pub platform: Platform,
    /// Package version written into the descriptor.
    pub version: String,
    /// Author written into the descriptor.
    pub author: String,
    /// Copyright notice written into the descriptor.
    pub copyright: String,
    /// License notice written into the descriptor.
    pub license: String,
    /// Wall-clock budget for each external tool invocation.
    pub tool_timeout: Duration,
    /// TCP endpoint written to `addr.config`, or `None` to skip the file.
    pub endpoint: Option<TcpEndpoint>,
    /// Run the external FMU checker against the finished archive.
    pub run_check: bool,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("FMI_template"),
            platform: Platform::host(),
            version: "1.0.0".to_string(),
            author: "not specified".to_string(),
            copyright: "not specified".to_string(),
            license: "not specified".to_string(),
            tool_timeout: Duration::from_secs(600),
            endpoint: Some(TcpEndpoint::default()),
            run_check: true,
        }
    }
}

impl ForgeConfig {
    /// Base name of the template project, taken from the template
    /// directory name. Every occurrence of it in the copied tree, in file
    /// names and file contents alike, is replaced with the model name.
    pub fn template_base_name(&self) -> Result<String> {
        self.template_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                Error::MissingInput(format!(
                    "template directory {} has no base name",
                    self.template_dir.display()
                ))
            })
    }
}

/// The stages of a generation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Model, template and target directory are checked up front.
    ValidateInputs,
    /// The target directory is created; a stale project tree from a
    /// previous run of the same model is discarded.
    PrepareTargetTree,
    /// The template project is copied, renaming files and directories
    /// whose names contain the template base name.
    CopyTemplate,
    /// The pre-allocation model is persisted next to the project tree.
    PersistRecoveryInput,
    /// Automatic value references are assigned.
    AllocateReferences,
    /// Descriptor and source placeholders are substituted.
    SubstitutePlaceholders,
    /// The external build tool compiles the shared library.
    InvokeExternalBuild,
    /// The rendered descriptor is rewritten for co-simulation export.
    PostEditDescriptor,
    /// Descriptor and binary are copied into the staging layout.
    CollectBinaryArtifact,
    /// The staged tree is zipped and placed at the target path.
    AssembleArchive,
    /// The run completed.
    Done,
}

impl Stage {
    /// Short human-readable description, used for progress events.
    pub fn describe(&self) -> &'static str {
        match self {
            Stage::ValidateInputs => "validating inputs",
            Stage::PrepareTargetTree => "preparing target directory",
            Stage::CopyTemplate => "copying template project",
            Stage::PersistRecoveryInput => "writing recovery input",
            Stage::AllocateReferences => "allocating value references",
            Stage::SubstitutePlaceholders => "substituting placeholders",
            Stage::InvokeExternalBuild => "building shared library",
            Stage::PostEditDescriptor => "post-editing model description",
            Stage::CollectBinaryArtifact => "collecting built binary",
            Stage::AssembleArchive => "assembling FMU archive",
            Stage::Done => "finished",
        }
    }
}

/// Outcome of a completed generation run.
#[derive(Debug)]
pub struct ForgeResult {
    /// Path of the finished `.fmu` archive.
    pub fmu_path: PathBuf,
    /// Path of the persisted recovery input file.
    pub recovery_path: PathBuf,
    /// Root of the generated project tree.
    pub project_dir: PathBuf,
    /// GUID stamped into descriptor and source.
    pub guid: String,
    /// Contents of the checker log, when the checker ran.
    pub check_log: Option<String>,
}

/// Drives generation runs. Holds the configuration and the external
/// tools; each call to [`Forge::generate`] is one independent run.
pub struct Forge {
    config: ForgeConfig,
    build_tool: Box<dyn BuildTool>,
    check_tool: Option<Box<dyn CheckTool>>,
}

impl Forge {
    /// Create a forge using the external CMake build and, when enabled,
    /// the external FMU checker.
    pub fn new(config: ForgeConfig) -> Self {
        let build_tool: Box<dyn BuildTool> =
            Box::new(CmakeBuild::new(config.platform, config.tool_timeout));
        let check_tool: Option<Box<dyn CheckTool>> = config
            .run_check
            .then(|| Box::new(FmuCheck::new(config.tool_timeout)) as Box<dyn CheckTool>);
        Self {
            config,
            build_tool,
            check_tool,
        }
    }

    /// Create a forge with explicit tools. Used by tests and by callers
    /// that bring their own build integration.
    pub fn with_tools(
        config: ForgeConfig,
        build_tool: Box<dyn BuildTool>,
        check_tool: Option<Box<dyn CheckTool>>,
    ) -> Self {
        Self {
            config,
            build_tool,
            check_tool,
        }
    }

    /// Run the full pipeline for one model, reporting progress to `sink`.
    ///
    /// On success the finished archive sits at `<target>/<model>.fmu` and
    /// the recovery input at `<target>/<model>.input`. On failure the
    /// partial project tree is left in place for diagnosis.
    pub fn generate(
        &self,
        model: ModelSpec,
        target_dir: &Path,
        sink: &mut dyn ProgressSink,
    ) -> Result<ForgeResult> {
        info!(model = %model.model_name, "generating FMU");
        let mut run = GenerateRun::new(self, model, target_dir);

        sink.stage(Stage::ValidateInputs.describe());
        run.validate(sink)?;

        sink.stage(Stage::PrepareTargetTree.describe());
        run.prepare_target(sink)?;

        sink.stage(Stage::CopyTemplate.describe());
        run.copy_template()?;

        sink.stage(Stage::PersistRecoveryInput.describe());
        run.persist_recovery(sink)?;

        sink.stage(Stage::AllocateReferences.describe());
        run.allocate(sink)?;

        sink.stage(Stage::SubstitutePlaceholders.describe());
        run.substitute()?;

        sink.stage(Stage::InvokeExternalBuild.describe());
        let binary = run.build(sink)?;

        sink.stage(Stage::PostEditDescriptor.describe());
        run.post_edit()?;

        sink.stage(Stage::CollectBinaryArtifact.describe());
        let staging = run.collect_binary(&binary)?;

        sink.stage(Stage::AssembleArchive.describe());
        run.assemble(&staging, sink)?;

        if let Some(endpoint) = &self.config.endpoint {
            run.write_endpoint_config(endpoint, sink)?;
        }
        let check_log = match &self.check_tool {
            Some(tool) => Some(run.check(tool.as_ref(), sink)?),
            None => None,
        };

        sink.stage(Stage::Done.describe());
        Ok(ForgeResult {
            fmu_path: run.fmu_path,
            recovery_path: run.recovery_path,
            project_dir: run.project_dir,
            guid: run.identity.guid,
            check_log,
        })
    }
}

/// State of one generation run. Owns the model while the pipeline
/// reshapes it; paths are fixed at construction.
struct GenerateRun<'a> {
    forge: &'a Forge,
    model: ModelSpec,
    target_dir: PathBuf,
    project_dir: PathBuf,
    recovery_path: PathBuf,
    fmu_path: PathBuf,
    identity: PackageIdentity,
}

impl<'a> GenerateRun<'a> {
    fn new(forge: &'a Forge, model: ModelSpec, target_dir: &Path) -> Self {
        let config = &forge.config;
        let project_dir = target_dir.join(&model.model_name);
        let recovery_path = target_dir.join(format!("{}.input", model.model_name));
        let fmu_path = target_dir.join(format!("{}.fmu", model.model_name));
        let identity = PackageIdentity::generate(
            &config.version,
            &config.author,
            &config.copyright,
            &config.license,
        );
        Self {
            forge,
            model,
            target_dir: target_dir.to_path_buf(),
            project_dir,
            recovery_path,
            fmu_path,
            identity,
        }
    }

    /// Everything that can be rejected before touching the disk.
    ///
    /// The target directory must be absent or empty; files left behind by
    /// a previous run of the same model are tolerated, so a run can be
    /// restarted from its recovery input without clearing the directory.
    fn validate(&self, sink: &mut dyn ProgressSink) -> Result<()> {
        self.model.validate()?;

        let config = &self.forge.config;
        if !config.template_dir.is_dir() {
            return Err(Error::MissingInput(format!(
                "template directory {}",
                config.template_dir.display()
            )));
        }
        let base = config.template_base_name()?;
        if base == self.model.model_name {
            sink.warning(&format!(
                "model name '{}' is the same as the template base name; this may not work",
                self.model.model_name
            ));
        }

        if self.target_dir.exists() {
            let own = [
                self.model.model_name.clone(),
                format!("{}.input", self.model.model_name),
                format!("{}.fmu", self.model.model_name),
                ENDPOINT_FILE_NAME.to_string(),
                CHECK_LOG_NAME.to_string(),
            ];
            for entry in std::fs::read_dir(&self.target_dir)? {
                let name = entry?.file_name().to_string_lossy().into_owned();
                if !own.contains(&name) {
                    return Err(Error::NonEmptyTarget(self.target_dir.clone()));
                }
            }
        }

        sink.message(&format!(
            "model: {} ({} variables)",
            self.model.model_name,
            self.model.variables.len()
        ));
        sink.message(&format!("target directory: {}", self.target_dir.display()));
        sink.message(&format!(
            "template location: {}",
            config.template_dir.display()
        ));
        Ok(())
    }

    fn prepare_target(&self, sink: &mut dyn ProgressSink) -> Result<()> {
        std::fs::create_dir_all(&self.target_dir)?;
        if self.project_dir.exists() {
            sink.message(&format!(
                "discarding stale output tree {}",
                self.project_dir.display()
            ));
            std::fs::remove_dir_all(&self.project_dir)?;
        }
        Ok(())
    }

    fn copy_template(&self) -> Result<()> {
        let base = self.forge.config.template_base_name()?;
        copy_renamed(
            &self.forge.config.template_dir,
            &self.project_dir,
            &base,
            &self.model.model_name,
        )?;
        debug!(project = %self.project_dir.display(), "template copied");
        Ok(())
    }

    /// The model is persisted before allocation so that a restarted run
    /// sees the same automatic sentinels the original run saw.
    fn persist_recovery(&self, sink: &mut dyn ProgressSink) -> Result<()> {
        self.model.save(&self.recovery_path)?;
        sink.message(&format!(
            "recovery input written to {}",
            self.recovery_path.display()
        ));
        Ok(())
    }

    fn allocate(&mut self, sink: &mut dyn ProgressSink) -> Result<()> {
        let automatic = self
            .model
            .variables
            .iter()
            .filter(|var| var.value_ref == AUTO_VALUE_REF)
            .count();
        allocate_value_references(&mut self.model)?;
        sink.message(&format!("assigned {} automatic value references", automatic));
        Ok(())
    }

    fn substitute(&self) -> Result<()> {
        let base = self.forge.config.template_base_name()?;
        let descriptor_values = descriptor::descriptor_values(&self.model, &self.identity);
        let source_values = source::source_values(&self.model, &self.identity.guid);
        TreeSubstitution::new(&base, &self.model.model_name)
            .pass(DESCRIPTOR_FILE_NAME, descriptor_values)
            .pass(format!("{}.cpp", self.model.model_name), source_values)
            .apply(&self.project_dir)
    }

    fn build(&self, sink: &mut dyn ProgressSink) -> Result<PathBuf> {
        let binary = self
            .forge
            .build_tool
            .build(&self.project_dir, &self.model.model_name)?;
        sink.message(&format!("built binary: {}", binary.display()));
        Ok(binary)
    }

    fn descriptor_path(&self) -> PathBuf {
        self.project_dir
            .join(PROJECT_DATA_DIR)
            .join(DESCRIPTOR_FILE_NAME)
    }

    fn post_edit(&self) -> Result<()> {
        let path = self.descriptor_path();
        if !path.is_file() {
            return Err(Error::MissingInput(format!(
                "generated descriptor {}",
                path.display()
            )));
        }
        post_edit_descriptor(&path)
    }

    fn collect_binary(&self, binary: &Path) -> Result<PathBuf> {
        archive::stage_package(
            &self.project_dir,
            &self.descriptor_path(),
            binary,
            &self.model.model_name,
            self.forge.config.platform,
        )
    }

    fn assemble(&self, staging: &Path, sink: &mut dyn ProgressSink) -> Result<()> {
        let intermediate = self.project_dir.join(INTERMEDIATE_ARCHIVE_NAME);
        archive::write_archive(staging, &intermediate)?;
        std::fs::copy(&intermediate, &self.fmu_path)?;
        sink.message(&format!("FMU written to {}", self.fmu_path.display()));
        Ok(())
    }

    fn write_endpoint_config(
        &self,
        endpoint: &TcpEndpoint,
        sink: &mut dyn ProgressSink,
    ) -> Result<()> {
        let path = self.target_dir.join(ENDPOINT_FILE_NAME);
        std::fs::write(
            &path,
            endpoint_config_text(&self.model.model_name, endpoint),
        )?;
        sink.message(&format!("endpoint config written to {}", path.display()));
        Ok(())
    }

    fn check(&self, tool: &dyn CheckTool, sink: &mut dyn ProgressSink) -> Result<String> {
        let log = tool.check(&self.fmu_path)?;
        match log.lines().next() {
            Some(line) if !line.trim().is_empty() => {
                sink.message(&format!("checker: {}", line.trim()))
            }
            _ => sink.message("checker log is empty"),
        }
        Ok(log)
    }
}

/// Contents of the endpoint config file. One `<model>_<key>=<value>` line
/// per setting, no trailing newline; the generated binary parses this
/// format at startup.
fn endpoint_config_text(model_name: &str, endpoint: &TcpEndpoint) -> String {
    format!(
        "{model}_local_port={}\n{model}_remote_ip={}\n{model}_remote_port={}",
        endpoint.local_port,
        endpoint.remote_ip,
        endpoint.remote_port,
        model = model_name
    )
}

/// Recursively copy `src` into `dst`, replacing `from` with `to` in every
/// file and directory name.
fn copy_renamed(src: &Path, dst: &Path, from: &str, to: &str) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let target = dst.join(name.replace(from, to));
        if entry.file_type()?.is_dir() {
            copy_renamed(&entry.path(), &target, from, to)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
