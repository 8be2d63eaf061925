use crate::command::{build_command, render_command};
use crate::config::DEFAULT_IMAGE_REPOSITORY;
use crate::error::Result;
use crate::kubernetes::VersionSource;
use crate::paths::locate_output_subdirectory;
use crate::runner::CommandRunner;
use crate::types::{
    CollectionKind, CollectionRequest, CollectionResult, CommandOutput, CsvVersion, TimeWindow,
};
use std::path::Path;
use tracing::{debug, info, warn};

pub const OUTPUT_LOG: &str = "output.log";

/// Drives `oc adm must-gather` through a [`CommandRunner`].
pub struct Collector<R> {
    runner: R,
    image_repository: String,
}

impl<R: CommandRunner> Collector<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            image_repository: DEFAULT_IMAGE_REPOSITORY.to_string(),
        }
    }

    pub fn with_image_repository(mut self, repository: impl Into<String>) -> Self {
        self.image_repository = repository.into();
        self
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Product must-gather image for an installed version.
    pub fn image_for(&self, version: CsvVersion) -> String {
        format!("{}:{}", self.image_repository, version.image_tag())
    }

    /// Run a built command; a failing tool still yields its output.
    pub async fn run_collection(&self, command: &[String]) -> Result<CommandOutput> {
        info!("Running {}", render_command(command));
        let output = self.runner.run(command).await?;
        if !output.success {
            warn!(
                "must-gather exited with {:?}; keeping partial output",
                output.exit_code
            );
        }
        Ok(output)
    }

    pub async fn gather(&self, request: &CollectionRequest) -> Result<CommandOutput> {
        let command = build_command(request)?;
        self.run_collection(&command).await
    }

    /// Collect into `target_dir` and return the directory the tool created.
    pub async fn collect<V: VersionSource>(
        &self,
        kind: CollectionKind,
        target_dir: &Path,
        since: TimeWindow,
        save_output: bool,
        versions: &V,
    ) -> Result<CollectionResult> {
        let mut request = CollectionRequest::new().target_dir(target_dir).since(since);
        if kind == CollectionKind::Rhoai {
            let version = versions.installed_version().await?;
            let image = self.image_for(version);
            debug!("Resolved must-gather image {}", image);
            request = request.image(image);
        }

        tokio::fs::create_dir_all(target_dir).await?;
        let output = self.gather(&request).await?;

        let log_file = if save_output {
            let path = target_dir.join(OUTPUT_LOG);
            tokio::fs::write(&path, &output.output).await?;
            debug!("Saved must-gather output to {}", path.display());
            Some(path)
        } else {
            None
        };

        let output_dir = locate_output_subdirectory(target_dir)?;
        info!("must-gather output in {}", output_dir.display());
        Ok(CollectionResult {
            output_dir,
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollectorError;
    use crate::kubernetes::StaticVersion;
    use std::sync::Mutex;

    /// Records commands and mimics the tool by creating a directory in `--dest-dir`.
    struct FakeRunner {
        output: String,
        success: bool,
        create_dir: bool,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeRunner {
        fn new(output: &str) -> Self {
            Self {
                output: output.to_string(),
                success: true,
                create_dir: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        async fn run(&self, command: &[String]) -> Result<CommandOutput> {
            self.calls.lock().unwrap().push(command.to_vec());
            if self.create_dir
                && let Some(dest) = command.iter().find_map(|t| t.strip_prefix("--dest-dir="))
            {
                std::fs::create_dir_all(Path::new(dest).join("must-gather.local.42"))?;
            }
            Ok(CommandOutput {
                success: self.success,
                exit_code: Some(if self.success { 0 } else { 1 }),
                output: self.output.clone(),
            })
        }
    }

    const V2_5: StaticVersion = StaticVersion(CsvVersion { major: 2, minor: 5 });

    #[tokio::test]
    async fn test_collect_rhoai() {
        let out = tempfile::tempdir().unwrap();
        let collector = Collector::new(FakeRunner::new("gathered\n"));

        let result = collector
            .collect(
                CollectionKind::Rhoai,
                out.path(),
                TimeWindow::from_secs(60),
                true,
                &V2_5,
            )
            .await
            .unwrap();

        assert_eq!(result.output_dir, out.path().join("must-gather.local.42"));
        let log = result.log_file.unwrap();
        assert_eq!(log, out.path().join("output.log"));
        assert_eq!(std::fs::read_to_string(log).unwrap(), "gathered\n");

        let calls = collector.runner().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            vec![
                "oc".to_string(),
                "adm".to_string(),
                "must-gather".to_string(),
                format!("--dest-dir={}", out.path().display()),
                "--since=60s".to_string(),
                "--image=quay.io/repository/modh/must-gather:rhoai-2.5".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_collect_ocp_has_no_image() {
        let out = tempfile::tempdir().unwrap();
        let collector = Collector::new(FakeRunner::new("ok"));

        collector
            .collect(
                CollectionKind::Ocp,
                out.path(),
                "5m".parse().unwrap(),
                true,
                &V2_5,
            )
            .await
            .unwrap();

        let calls = collector.runner().calls();
        assert!(calls[0].iter().all(|t| !t.starts_with("--image=")));
        assert!(calls[0].contains(&"--since=5m".to_string()));
    }

    #[tokio::test]
    async fn test_collect_without_saving_output() {
        let out = tempfile::tempdir().unwrap();
        let collector = Collector::new(FakeRunner::new("ok"));

        let result = collector
            .collect(CollectionKind::Ocp, out.path(), TimeWindow::default(), false, &V2_5)
            .await
            .unwrap();

        assert!(result.log_file.is_none());
        assert!(!out.path().join(OUTPUT_LOG).exists());
    }

    #[tokio::test]
    async fn test_collect_creates_missing_target_dir() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("nested/target");
        let collector = Collector::new(FakeRunner::new("ok"));

        let result = collector
            .collect(CollectionKind::Ocp, &target, TimeWindow::default(), true, &V2_5)
            .await
            .unwrap();

        assert!(result.output_dir.starts_with(&target));
    }

    #[tokio::test]
    async fn test_collect_failed_tool_still_returns_result() {
        let out = tempfile::tempdir().unwrap();
        let mut runner = FakeRunner::new("error: partial gather");
        runner.success = false;
        let collector = Collector::new(runner);

        let result = collector
            .collect(CollectionKind::Rhoai, out.path(), TimeWindow::from_secs(5), true, &V2_5)
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(result.log_file.unwrap()).unwrap(),
            "error: partial gather"
        );
    }

    #[tokio::test]
    async fn test_collect_no_output_directory() {
        let out = tempfile::tempdir().unwrap();
        let mut runner = FakeRunner::new("nothing");
        runner.create_dir = false;
        let collector = Collector::new(runner);

        let err = collector
            .collect(CollectionKind::Ocp, out.path(), TimeWindow::default(), true, &V2_5)
            .await
            .unwrap_err();

        assert!(matches!(err, CollectorError::NotFound(_)));
        // the log is written before the lookup fails
        assert!(out.path().join(OUTPUT_LOG).exists());
    }

    #[tokio::test]
    async fn test_gather_rejects_invalid_request_before_running() {
        let collector = Collector::new(FakeRunner::new(""));
        let request = CollectionRequest::new()
            .component("foo")
            .namespaces("operator=ns1".parse().unwrap());

        let err = collector.gather(&request).await.unwrap_err();

        assert!(matches!(err, CollectorError::InvalidArgument(_)));
        assert!(collector.runner().calls().is_empty());
    }

    #[test]
    fn test_image_for_custom_repository() {
        let collector = Collector::new(FakeRunner::new("")).with_image_repository("registry.local/mg");
        assert_eq!(
            collector.image_for(CsvVersion { major: 2, minor: 16 }),
            "registry.local/mg:rhoai-2.16"
        );
    }
}
