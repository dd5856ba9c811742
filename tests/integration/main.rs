//! Integration tests for scanfold

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

mod cli_tests {
    use super::fixture;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;

    /// Config that keeps the cache inside `dir` and never waits on retries
    fn write_config(dir: &Path) -> String {
        let path = dir.join("config.toml");
        let cache_dir = dir.join("cache");
        std::fs::write(
            &path,
            format!(
                "[cache]\ndir = {:?}\n\n[remote]\nmax_attempts = 1\ntimeout_secs = 5\n",
                cache_dir.display().to_string()
            ),
        )
        .unwrap();
        path.display().to_string()
    }

    fn scanfold(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("scanfold");
        cmd.env("SCANFOLD_CONFIG", write_config(dir))
            .env_remove("SCANFOLD_REMOTE");
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("report"))
            .stdout(predicate::str::contains("client"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("scanfold"));
    }

    #[test]
    fn report_all_merges_and_shows_errors() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args(["report", &fixture("cluster_report.json")])
            .assert()
            .success()
            .stdout(predicate::str::contains("Default/Deployment/Web"))
            .stdout(predicate::str::contains(
                "Tests: 2 (SUCCESSES: 1, FAILURES: 1, EXCEPTIONS: 0)",
            ))
            .stdout(predicate::str::contains("CVE-2023-4911"))
            .stdout(predicate::str::contains(
                "Error: image pull failed: manifest unknown",
            ));
    }

    #[test]
    fn report_summary_table() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args([
                "report",
                &fixture("cluster_report.json"),
                "--report",
                "summary",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Summary Report for kind-dev"))
            .stdout(predicate::str::contains("Deployment/Web"))
            .stdout(predicate::str::contains("H:1"))
            .stdout(predicate::str::contains("M:1"));
    }

    #[test]
    fn report_summary_json_has_one_entry_per_resource() {
        let temp = TempDir::new().unwrap();
        let output = scanfold(temp.path())
            .args([
                "report",
                &fixture("cluster_report.json"),
                "--format",
                "json",
                "--report",
                "summary",
            ])
            .output()
            .unwrap();
        assert!(output.status.success());

        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let resources = value["Resources"].as_array().unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0]["Name"], "Web");
        assert_eq!(resources[0]["Vulnerabilities"]["HIGH"], 1);
        assert_eq!(resources[0]["Misconfigurations"]["MEDIUM"], 1);
        assert_eq!(resources[1]["Error"], "image pull failed: manifest unknown");
    }

    #[test]
    fn report_exit_code_on_findings() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args(["report", &fixture("cluster_report.json"), "--exit-code", "5"])
            .assert()
            .code(5);
    }

    #[test]
    fn report_exit_code_clean() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args([
                "report",
                &fixture("clean_cluster_report.json"),
                "--exit-code",
                "5",
            ])
            .assert()
            .success();
    }

    #[test]
    fn unknown_format_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args(["report", &fixture("cluster_report.json"), "--format", "xml"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown format \"xml\""))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn unknown_report_type_fails() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args(["report", &fixture("cluster_report.json"), "--report", "brief"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown report type"));
    }

    #[test]
    fn results_severity_filter() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args(["results", &fixture("results.json"), "--severity", "HIGH,CRITICAL"])
            .assert()
            .success()
            .stdout(predicate::str::contains("package-lock.json (npm)"))
            .stdout(predicate::str::contains("Total: 1 (HIGH: 1, CRITICAL: 0)"));
    }

    #[test]
    fn results_dependency_tree() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args(["results", &fixture("results.json"), "--dependency-tree"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Dependency Origin Tree"))
            .stdout(predicate::str::contains("└── app@1.0.0"));
    }

    #[test]
    fn results_written_to_file() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("report.json");
        scanfold(temp.path())
            .args([
                "results",
                &fixture("results.json"),
                "--format",
                "json",
                "--output",
                out.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
        assert_eq!(value["ArtifactName"], "app");
    }

    #[test]
    fn scan_reports_secrets_and_fails_threshold() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args([
                "scan",
                &fixture("blob_secrets.json"),
                "--name",
                "alpine:3.19",
                "--cache-backend",
                "memory",
                "--exit-code",
                "1",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("app/.env (secrets)"))
            .stdout(predicate::str::contains("AWS Access Key ID"))
            .stdout(predicate::str::contains("alpine:3.19 (alpine 3.19.1)"));
    }

    #[test]
    fn scan_config_checks() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args([
                "scan",
                &fixture("blob_config.json"),
                "--artifact-type",
                "filesystem",
                "--mode",
                "fs",
                "--security-checks",
                "config",
                "--cache-backend",
                "memory",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Dockerfile (dockerfile)"))
            .stdout(predicate::str::contains("HIGH: Specify at least 1 USER command"));
    }

    #[test]
    fn scan_populates_fs_cache() {
        let temp = TempDir::new().unwrap();

        scanfold(temp.path())
            .args(["cache", "missing", &fixture("blob_secrets.json")])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 of 1 blob(s) need analysis"));

        scanfold(temp.path())
            .args(["scan", &fixture("blob_secrets.json"), "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"RuleID\": \"aws-access-key-id\""));

        scanfold(temp.path())
            .args(["cache", "missing", &fixture("blob_secrets.json")])
            .assert()
            .success()
            .stdout(predicate::str::contains("0 of 1 blob(s) need analysis"));

        scanfold(temp.path())
            .args(["cache", "list", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("sha256:"));

        scanfold(temp.path())
            .args(["cache", "clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("cleared 2 entry(ies)"));

        scanfold(temp.path())
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cached entries"));
    }

    #[test]
    fn client_without_remote_fails() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args(["client", &fixture("blob_secrets.json")])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Remote server URL is not configured"));
    }

    #[test]
    fn client_unreachable_server_names_target() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args([
                "client",
                &fixture("blob_secrets.json"),
                "--name",
                "alpine:3.19",
                "--remote",
                "http://127.0.0.1:9",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to scan alpine:3.19"))
            .stderr(predicate::str::contains("1 attempt(s)"));
    }

    #[test]
    fn client_rejects_malformed_header() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args([
                "client",
                &fixture("blob_secrets.json"),
                "--remote",
                "http://127.0.0.1:9",
                "--custom-header",
                "no-colon-here",
            ])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid header"));
    }

    #[test]
    fn invalid_config_aborts_before_scanning() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("bad.toml");
        std::fs::write(&config, "[report]\nseverities = \"SEVERE\"\n").unwrap();

        let mut cmd = cargo_bin_cmd!("scanfold");
        cmd.env("SCANFOLD_CONFIG", config.to_str().unwrap())
            .args(["report", &fixture("cluster_report.json")])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn config_path() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let temp = TempDir::new().unwrap();
        scanfold(temp.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[report]"))
            .stdout(predicate::str::contains("max_attempts = 1"));
    }

    #[test]
    fn config_init_writes_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fresh").join("config.toml");

        let mut cmd = cargo_bin_cmd!("scanfold");
        cmd.env("SCANFOLD_CONFIG", path.to_str().unwrap())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration initialized"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[remote]"));
    }
}

mod pipeline_tests {
    use async_trait::async_trait;
    use scanfold::cache::{ArtifactCache, LocalArtifactCache, MemoryCache};
    use scanfold::report::{K8sArtifact, Report, Resource};
    use scanfold::rpc::wire::{ScanRequest, ScanResponse};
    use scanfold::rpc::{CustomHeaders, DispatchContext, RemoteScanner, RetryPolicy, RpcError, ScanTransport};
    use scanfold::scanner::local::Detector;
    use scanfold::scanner::{
        ArtifactSource, BlobFile, BlobSource, InspectOptions, Inspector, LocalScanner, Scanner,
    };
    use scanfold::types::{
        ArtifactType, DetectedVulnerability, Os, Package, Results, ScanOptions, ScanReport,
        ScanResult, Severity, TYPE_KUBERNETES,
    };
    use scanfold::ScanfoldResult;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Reports one fixed vulnerability per OS package
    struct StubDetector;

    #[async_trait]
    impl Detector for StubDetector {
        async fn detect_os(
            &self,
            _os: &Os,
            packages: &[Package],
        ) -> ScanfoldResult<Vec<DetectedVulnerability>> {
            Ok(packages
                .iter()
                .map(|p| DetectedVulnerability {
                    vulnerability_id: "CVE-2025-26519".to_string(),
                    pkg_id: p.id.clone(),
                    pkg_name: p.name.clone(),
                    installed_version: p.version.clone(),
                    severity: Severity::High,
                    ..Default::default()
                })
                .collect())
        }

        async fn detect_library(
            &self,
            _app_type: &str,
            _libraries: &[Package],
        ) -> ScanfoldResult<Vec<DetectedVulnerability>> {
            Ok(Vec::new())
        }
    }

    fn local_scanner(cache: Arc<MemoryCache>) -> Scanner {
        let reader: Arc<dyn LocalArtifactCache> = cache.clone();
        let writer: Arc<dyn ArtifactCache> = cache;
        Scanner::new(
            Inspector::new(writer, InspectOptions::default()),
            Arc::new(LocalScanner::new(reader).with_detector(Arc::new(StubDetector))),
        )
    }

    #[tokio::test]
    async fn blob_file_scan_uses_detector_and_cache() {
        let cache = Arc::new(MemoryCache::new());
        let scanner = local_scanner(cache.clone());
        let blob = BlobFile::open(super::fixture("blob_secrets.json")).unwrap();
        let source = ArtifactSource::from_blobs(
            "alpine:3.19",
            ArtifactType::ContainerImage,
            vec![Arc::new(blob) as Arc<dyn BlobSource>],
        );

        let report = scanner
            .scan_artifact(&DispatchContext::new(), &source, &ScanOptions::default())
            .await
            .unwrap();

        let os_result = &report.results[0];
        assert_eq!(os_result.target, "alpine:3.19 (alpine 3.19.1)");
        assert_eq!(os_result.vulnerabilities[0].pkg_name, "musl");
        assert!(report.failed());
        assert_eq!(cache.blob_count().await, 1);

        // Second scan of the same content analyzes nothing new
        scanner
            .scan_artifact(&DispatchContext::new(), &source, &ScanOptions::default())
            .await
            .unwrap();
        assert_eq!(cache.blob_count().await, 1);
    }

    /// Scan server that fails `failures` times with a transport error
    struct FlakyServer {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ScanTransport for FlakyServer {
        async fn scan(
            &self,
            request: &ScanRequest,
            _headers: &CustomHeaders,
        ) -> Result<ScanResponse, RpcError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(RpcError::Transport("connection reset by peer".to_string()));
            }
            Ok(ScanResponse {
                results: Results::from(vec![ScanResult {
                    target: request.target.clone(),
                    vulnerabilities: vec![DetectedVulnerability {
                        vulnerability_id: "CVE-2024-6119".to_string(),
                        pkg_name: "openssl".to_string(),
                        severity: Severity::Critical,
                        ..Default::default()
                    }],
                    ..Default::default()
                }]),
                os: None,
            })
        }
    }

    #[tokio::test]
    async fn remote_dispatch_recovers_within_retry_budget() {
        let server = Arc::new(FlakyServer {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        let scanner = RemoteScanner::new(server.clone(), CustomHeaders::new())
            .with_retry(RetryPolicy::immediate(3));

        let (results, _) = scanner
            .scan(
                &DispatchContext::new(),
                "nginx:1.25",
                "sha256:artifact",
                &["sha256:layer".to_string()],
                &ScanOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(server.calls.load(Ordering::SeqCst), 3);
        assert_eq!(results[0].vulnerabilities[0].vulnerability_id, "CVE-2024-6119");
    }

    #[test]
    fn cluster_scenario_consolidates_per_resource() {
        let web = K8sArtifact {
            namespace: "default".to_string(),
            kind: "Deployment".to_string(),
            name: "web".to_string(),
        };
        let misconf_scan = ScanReport {
            results: Results::from(vec![ScanResult {
                target: "/tmp/manifest-4711.yaml".to_string(),
                r#type: TYPE_KUBERNETES.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let vuln_scan = ScanReport {
            results: Results::from(vec![ScanResult {
                target: "nginx:1.25 (debian 12.4)".to_string(),
                vulnerabilities: vec![DetectedVulnerability {
                    vulnerability_id: "CVE-2023-4911".to_string(),
                    severity: Severity::High,
                    ..Default::default()
                }],
                ..Default::default()
            }]),
            ..Default::default()
        };
        let cache_pod = K8sArtifact {
            namespace: "default".to_string(),
            kind: "Pod".to_string(),
            name: "cache".to_string(),
        };

        let report = Report {
            cluster_name: "kind-dev".to_string(),
            misconfigurations: vec![Resource::from_scan(&web, misconf_scan, None)],
            vulnerabilities: vec![
                Resource::from_scan(&web, vuln_scan, None),
                Resource::from_scan(
                    &cache_pod,
                    ScanReport::default(),
                    Some("image pull failed".to_string()),
                ),
            ],
            ..Default::default()
        };

        let consolidated = report.consolidate().sorted();
        assert_eq!(consolidated.findings.len(), 2);

        let merged = &consolidated.findings[0];
        assert_eq!(merged.full_name(), "default/deployment/web");
        let targets: Vec<_> = merged.results.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["Deployment/web", "nginx:1.25 (debian 12.4)"]);

        assert_eq!(consolidated.findings[1].error, "image pull failed");
        assert!(report.failed());
        assert!(consolidated.failed());
    }
}
