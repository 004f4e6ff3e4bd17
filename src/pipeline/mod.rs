//! Pipeline orchestrator: one task per asset, each running download, mirror
//! and describe in order, with rows funnelled through a single report writer.
//! Tasks run concurrently up to an optional ceiling and are joined once.

pub mod cache;
pub mod report;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use self::cache::LocalCache;
pub use self::report::{DescriptionRecord, ReportWriter};
use crate::config::Config;
use crate::describe::{ContentGenerator, Describer, Description};
use crate::drive::{Asset, AssetSource};
use crate::storage::{self, MirrorStore};

/// Subset of application config consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub(crate) local_folder: PathBuf,
    pub(crate) gcs_bucket: String,
    pub(crate) gcs_path: String,
    pub(crate) always_upload: bool,
    pub(crate) describe: bool,
    pub(crate) prompt_template: Option<PathBuf>,
    pub(crate) max_assets: Option<usize>,
    pub(crate) concurrency: Option<usize>,
    pub(crate) no_progress_bar: bool,
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            local_folder: config.local_folder.clone(),
            gcs_bucket: config.gcs_bucket.clone(),
            gcs_path: config.gcs_path.clone(),
            always_upload: config.always_upload,
            describe: config.describe,
            prompt_template: config.prompt_template.clone(),
            max_assets: config.max_assets,
            concurrency: config.concurrency,
            no_progress_bar: config.no_progress_bar,
        }
    }
}

/// Totals reported after the join point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub errors: usize,
    pub rows_written: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
    cache: LocalCache,
    mirror: Arc<dyn MirrorStore>,
    describer: Describer,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn AssetSource>,
        mirror: Arc<dyn MirrorStore>,
        generator: Arc<dyn ContentGenerator>,
    ) -> Self {
        let cache = LocalCache::new(source, config.local_folder.clone());
        let describer = Describer::new(generator, config.describe, config.prompt_template.clone());
        Self {
            config,
            cache,
            mirror,
            describer,
        }
    }

    /// Process the first `max_assets` of `assets` and write one row per asset.
    pub async fn run(&self, assets: Vec<Asset>, report: ReportWriter) -> anyhow::Result<RunSummary> {
        let started = Instant::now();

        let cap = self
            .config
            .max_assets
            .map_or(assets.len(), |max| max.min(assets.len()));
        let assets: Vec<Asset> = assets.into_iter().take(cap).collect();
        let concurrency = self.config.concurrency.unwrap_or(assets.len()).max(1);
        tracing::debug!(assets = assets.len(), concurrency, "Starting pipeline");

        tokio::fs::create_dir_all(&self.config.local_folder)
            .await
            .with_context(|| {
                format!(
                    "Unable to create local folder {}",
                    self.config.local_folder.display()
                )
            })?;

        let pb = create_progress_bar(self.config.no_progress_bar, assets.len() as u64);
        let tx = report.sender();

        let outcomes: Vec<bool> = stream::iter(&assets)
            .map(|asset| {
                let tx = tx.clone();
                let pb = &pb;
                async move {
                    pb.set_message(asset.name.clone());
                    let (record, failed) = self.process(asset, pb).await;
                    pb.suspend(|| {
                        tracing::info!(
                            "{} ({}) {} = {}",
                            record.name,
                            record.mime_type,
                            record.id,
                            record.description
                        )
                    });
                    submit(&tx, record).await;
                    pb.inc(1);
                    failed
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        drop(tx);
        let rows_written = report.finish().await?;
        pb.finish_and_clear();

        let summary = RunSummary {
            processed: outcomes.len(),
            errors: outcomes.iter().filter(|failed| **failed).count(),
            rows_written,
        };
        tracing::info!("── Summary ──");
        tracing::info!(
            "  {} processed, {} failed, {} rows written",
            summary.processed,
            summary.errors,
            summary.rows_written
        );
        tracing::info!("  elapsed: {}", format_duration(started.elapsed()));
        Ok(summary)
    }

    /// Run one asset through download, mirror and describe. Always yields a
    /// record; the flag is set when the record carries an error.
    async fn process(&self, asset: &Asset, pb: &ProgressBar) -> (DescriptionRecord, bool) {
        let bytes = match self.cache.fetch(asset).await {
            Ok((bytes, _)) => bytes,
            Err(e) => {
                pb.suspend(|| tracing::error!("unable to describe {}: {}", asset.name, e));
                return (record_for(asset, 0, format!("Error: {}", e)), true);
            }
        };

        if let Err(e) = storage::mirror_object(
            self.mirror.as_ref(),
            &self.config.gcs_bucket,
            &self.config.gcs_path,
            &asset.name,
            &asset.mime_type,
            &bytes,
            self.config.always_upload,
        )
        .await
        {
            pb.suspend(|| tracing::warn!("Unable to upload {} to GCS: {}", asset.name, e));
        }

        if self.config.describe {
            pb.suspend(|| tracing::info!("Describing {} ...", asset.name));
        }
        match self
            .describer
            .describe(&asset.name, &asset.mime_type, &bytes)
            .await
        {
            Ok(Description::Text(text)) => (record_for(asset, bytes.len(), text), false),
            // A failed model call keeps the row but reports no size or text.
            Ok(Description::ModelFailed) => (record_for(asset, 0, String::new()), true),
            Err(e) => {
                pb.suspend(|| tracing::error!("unable to describe {}: {}", asset.name, e));
                (record_for(asset, 0, format!("Error: {}", e)), true)
            }
        }
    }
}

fn record_for(asset: &Asset, size: usize, description: String) -> DescriptionRecord {
    DescriptionRecord {
        name: asset.name.clone(),
        size,
        mime_type: asset.mime_type.clone(),
        id: asset.id.clone(),
        description,
    }
}

async fn submit(tx: &mpsc::Sender<DescriptionRecord>, record: DescriptionRecord) {
    if let Err(e) = tx.send(record).await {
        tracing::error!("failed to write to CSV: report writer closed ({})", e.0.name);
    }
}

/// Returns `ProgressBar::hidden()` when `--no-progress-bar` was passed or
/// stdout is not a TTY.
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner} describing [{bar:30.green/white}] {pos}/{len} assets, {eta} left: {wide_msg}",
        )
        .expect("valid template")
        .progress_chars("#>-"),
    );
    pb
}

fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {:02}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::describe::error::DescribeError;
    use crate::describe::SKIPPED_PLACEHOLDER;
    use crate::drive::error::DriveError;
    use crate::storage::error::StorageError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::io::Write;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeDrive {
        failing_ids: HashSet<String>,
    }

    #[async_trait]
    impl AssetSource for FakeDrive {
        async fn list_assets(
            &self,
            _folder_id: &str,
            _mime_types: &[String],
        ) -> Result<Vec<Asset>, DriveError> {
            Ok(Vec::new())
        }

        async fn download(&self, asset: &Asset) -> Result<Vec<u8>, DriveError> {
            if self.failing_ids.contains(&asset.id) {
                return Err(DriveError::DownloadStatus {
                    status: 500,
                    name: asset.name.clone(),
                });
            }
            Ok(format!("bytes of {}", asset.name).into_bytes())
        }
    }

    #[derive(Default)]
    struct FakeBucket {
        objects: Mutex<HashSet<String>>,
        uploads: AtomicUsize,
    }

    #[async_trait]
    impl MirrorStore for FakeBucket {
        async fn exists(&self, _bucket: &str, object: &str) -> Result<bool, StorageError> {
            Ok(self.objects.lock().unwrap().contains(object))
        }

        async fn put(
            &self,
            _bucket: &str,
            object: &str,
            _content_type: &str,
            _bytes: &[u8],
        ) -> Result<(), StorageError> {
            self.uploads.fetch_add(1, Ordering::SeqCst);
            self.objects.lock().unwrap().insert(object.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeModel {
        failing_names: HashSet<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ContentGenerator for FakeModel {
        async fn generate(
            &self,
            bytes: &[u8],
            mime_type: &str,
            prompt: &str,
        ) -> Result<String, DescribeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_names.iter().any(|n| prompt.contains(n.as_str())) {
                return Err(DescribeError::Status {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(format!("{} bytes of {}", bytes.len(), mime_type))
        }
    }

    fn assets(n: usize) -> Vec<Asset> {
        (0..n)
            .map(|i| Asset {
                id: format!("id{}", i),
                name: format!("img{}.jpg", i),
                mime_type: "image/jpeg".into(),
                size: None,
            })
            .collect()
    }

    fn test_config(local: &Path) -> PipelineConfig {
        PipelineConfig {
            local_folder: local.to_path_buf(),
            gcs_bucket: "proj-media".into(),
            gcs_path: "media".into(),
            always_upload: false,
            describe: true,
            prompt_template: None,
            max_assets: None,
            concurrency: None,
            no_progress_bar: true,
        }
    }

    struct Harness {
        dir: tempfile::TempDir,
        bucket: Arc<FakeBucket>,
        model: Arc<FakeModel>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                bucket: Arc::new(FakeBucket::default()),
                model: Arc::new(FakeModel::default()),
            }
        }

        fn local(&self) -> PathBuf {
            self.dir.path().join("local")
        }

        fn report_path(&self) -> PathBuf {
            self.dir.path().join("descriptions.csv")
        }

        async fn run(
            &self,
            config: PipelineConfig,
            failing: &[&str],
            input: Vec<Asset>,
        ) -> (RunSummary, Vec<csv::StringRecord>) {
            let drive = Arc::new(FakeDrive {
                failing_ids: failing.iter().map(|s| s.to_string()).collect(),
            });
            let pipeline = Pipeline::new(config, drive, self.bucket.clone(), self.model.clone());
            let report = ReportWriter::create(&self.report_path()).unwrap();
            let summary = pipeline.run(input, report).await.unwrap();

            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .from_path(self.report_path())
                .unwrap();
            let rows = reader.records().map(|r| r.unwrap()).collect();
            (summary, rows)
        }
    }

    fn row_for<'a>(rows: &'a [csv::StringRecord], name: &str) -> &'a csv::StringRecord {
        rows.iter().find(|r| &r[0] == name).unwrap()
    }

    #[tokio::test]
    async fn test_one_row_per_asset_including_failures() {
        let h = Harness::new();
        let (summary, rows) = h.run(test_config(&h.local()), &["id1"], assets(4)).await;

        assert_eq!(rows.len(), 4);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.rows_written, 4);

        let failed = row_for(&rows, "img1.jpg");
        assert_eq!(&failed[1], "0");
        assert!(failed[4].starts_with("Error: "));
        // A failed download skips mirror and describe.
        assert_eq!(h.bucket.uploads.load(Ordering::SeqCst), 3);
        assert_eq!(h.model.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_max_caps_rows() {
        let h = Harness::new();
        let mut config = test_config(&h.local());
        config.max_assets = Some(2);
        let (summary, rows) = h.run(config, &[], assets(5)).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(summary.processed, 2);

        let h = Harness::new();
        let mut config = test_config(&h.local());
        config.max_assets = Some(10);
        let (_, rows) = h.run(config, &[], assets(3)).await;
        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn test_bounded_concurrency_processes_everything() {
        let h = Harness::new();
        let mut config = test_config(&h.local());
        config.concurrency = Some(2);
        let (summary, rows) = h.run(config, &[], assets(7)).await;
        assert_eq!(rows.len(), 7);
        assert_eq!(summary.errors, 0);
    }

    #[tokio::test]
    async fn test_local_files_match_downloaded_length() {
        let h = Harness::new();
        let (_, rows) = h.run(test_config(&h.local()), &[], assets(3)).await;
        for row in &rows {
            let on_disk = std::fs::read(h.local().join(&row[0])).unwrap();
            assert_eq!(on_disk.len().to_string(), &row[1]);
        }
    }

    #[tokio::test]
    async fn test_second_run_does_not_reupload() {
        let h = Harness::new();
        h.run(test_config(&h.local()), &[], assets(3)).await;
        assert_eq!(h.bucket.uploads.load(Ordering::SeqCst), 3);
        assert!(h.bucket.objects.lock().unwrap().contains("media/img0.jpg"));

        h.run(test_config(&h.local()), &[], assets(3)).await;
        assert_eq!(h.bucket.uploads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_upload_overwrites() {
        let h = Harness::new();
        h.run(test_config(&h.local()), &[], assets(2)).await;

        let mut config = test_config(&h.local());
        config.always_upload = true;
        h.run(config, &[], assets(2)).await;
        assert_eq!(h.bucket.uploads.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_existing_local_file_is_kept_and_still_described() {
        let h = Harness::new();
        std::fs::create_dir_all(h.local()).unwrap();
        std::fs::write(h.local().join("img0.jpg"), b"stale").unwrap();

        let (_, rows) = h.run(test_config(&h.local()), &[], assets(1)).await;
        assert_eq!(std::fs::read(h.local().join("img0.jpg")).unwrap(), b"stale");
        let expected = "bytes of img0.jpg".len();
        assert_eq!(&rows[0][1], expected.to_string().as_str());
        assert_eq!(
            &rows[0][4],
            format!("{} bytes of image/jpeg", expected).as_str()
        );
    }

    #[tokio::test]
    async fn test_describe_disabled_uses_placeholder_without_model_calls() {
        let h = Harness::new();
        let mut config = test_config(&h.local());
        config.describe = false;
        let (_, rows) = h.run(config, &[], assets(3)).await;

        assert!(rows.iter().all(|r| &r[4] == SKIPPED_PLACEHOLDER));
        assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_template_yields_error_rows_without_aborting() {
        let h = Harness::new();
        let mut tpl = tempfile::NamedTempFile::new().unwrap();
        write!(tpl, "Describe {{{{.ImageName").unwrap();

        let mut config = test_config(&h.local());
        config.prompt_template = Some(tpl.path().to_path_buf());
        let (summary, rows) = h.run(config, &[], assets(3)).await;

        assert_eq!(rows.len(), 3);
        assert_eq!(summary.errors, 3);
        for row in &rows {
            assert!(row[4].starts_with("Error: "));
            assert_eq!(&row[1], "0");
        }
        assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.bucket.uploads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_model_failure_row_has_zero_size_and_empty_description() {
        let mut h = Harness::new();
        h.model = Arc::new(FakeModel {
            failing_names: ["img1.jpg".to_string()].into_iter().collect(),
            ..Default::default()
        });
        let (_, rows) = h.run(test_config(&h.local()), &[], assets(2)).await;

        let failed = row_for(&rows, "img1.jpg");
        assert_eq!(&failed[1], "0");
        assert_eq!(&failed[4], "");
        // The download still happened and the local copy was kept.
        assert!(h.local().join("img1.jpg").exists());

        let fine = row_for(&rows, "img0.jpg");
        assert_eq!(&fine[1], "bytes of img0.jpg".len().to_string().as_str());
        assert!(!fine[4].is_empty());
    }

    #[tokio::test]
    async fn test_uncreatable_local_folder_aborts_run() {
        let h = Harness::new();
        let blocker = h.dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let drive = Arc::new(FakeDrive {
            failing_ids: HashSet::new(),
        });
        let pipeline = Pipeline::new(
            test_config(&blocker),
            drive,
            h.bucket.clone(),
            h.model.clone(),
        );
        let report = ReportWriter::create(&h.report_path()).unwrap();
        let result = pipeline.run(assets(3), report).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Unable to create local folder"));
        assert_eq!(h.bucket.uploads.load(Ordering::SeqCst), 0);
        assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_template_only_affects_describe() {
        let h = Harness::new();
        let mut config = test_config(&h.local());
        config.prompt_template = Some(h.dir.path().join("no-such.tpl"));
        let (_, rows) = h.run(config, &["id0"], assets(2)).await;

        let download_failed = row_for(&rows, "img0.jpg");
        assert_eq!(&download_failed[1], "0");
        let template_failed = row_for(&rows, "img1.jpg");
        assert!(template_failed[4].contains("failed to read prompt template"));
    }

    #[tokio::test]
    async fn test_empty_listing_writes_empty_report() {
        let h = Harness::new();
        let (summary, rows) = h.run(test_config(&h.local()), &[], Vec::new()).await;
        assert!(rows.is_empty());
        assert_eq!(summary.processed, 0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0s");
        assert_eq!(format_duration(Duration::from_secs(59)), "59s");
        assert_eq!(format_duration(Duration::from_secs(61)), "1m 01s");
        assert_eq!(format_duration(Duration::from_secs(5025)), "1h 23m 45s");
    }

    #[test]
    fn test_create_progress_bar_hidden_when_disabled() {
        let pb = create_progress_bar(true, 10);
        assert!(pb.is_hidden());
    }
}
