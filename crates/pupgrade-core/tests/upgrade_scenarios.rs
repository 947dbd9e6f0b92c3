//! # Upgrade Scenario Tests
//!
//! End-to-end runs against a complete 3.0.5 bundle written to a temporary
//! directory.
//!
//! ## Groups
//! - Upgrade: in-place run, backups, rewritten content
//! - Idempotence: second run is a no-op
//! - Dry run and relocation: what lands on disk
//! - Failures: resolution errors and failed rules leave files untouched

use pupgrade_core::{
    Bundle, Outcome, RuleRegistry, RunOptions, Strictness, Upgrade30xTo31x,
    UpgradeError, UpgradeRule, Upgrader, Version, VersionPattern,
};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// FIXTURE
// =============================================================================

const NS: &str = "http://purl.org/pion/config";

fn pion(version: &str, body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<PionConfig xmlns=\"{NS}\" pion_version=\"{version}\">\n{body}\n</PionConfig>\n"
    )
}

fn rooted(root: &str, version: &str) -> String {
    format!("<{root} xmlns=\"{NS}\" pion_version=\"{version}\">\n</{root}>\n")
}

const PLATFORM: &str = r#"  <LogConfig>logconfig.txt</LogConfig>
  <PluginPath>../plugins</PluginPath>
  <DataDirectory>data</DataDirectory>
  <CodecConfig>codecs.xml</CodecConfig>
  <DatabaseConfig>databases.xml</DatabaseConfig>
  <ReactorConfig>reactors.xml</ReactorConfig>
  <ServiceConfig>services.xml</ServiceConfig>
  <ProtocolConfig>protocols.xml</ProtocolConfig>
  <UserConfig>users.xml</UserConfig>
  <VocabularyConfig>vocabularies.xml</VocabularyConfig>"#;

const USERS: &str = r#"  <User id="admin">
    <Password>x</Password>
    <Permit>/config</Permit>
  </User>
  <User id="analyst">
    <Password>y</Password>
    <Permit>/config/reactors</Permit>
    <Permit>/replay</Permit>
  </User>"#;

const REACTORS: &str = r#"  <Reactor id="log-in">
    <Plugin>LogInputReactor</Plugin>
    <Workspace>Default</Workspace>
  </Reactor>
  <Reactor id="mdr">
    <Plugin>MultiDatabaseReactor</Plugin>
    <Workspace>Default</Workspace>
    <TableDef>
      <Table>requests</Table>
      <Field term="urn:vocab:clickstream#uri">uri</Field>
    </TableDef>
  </Reactor>"#;

const SERVICES: &str = r#"  <Server id="main-server">
    <Port>8888</Port>
    <WebService id="log-service">
      <Plugin>LogService</Plugin>
      <Resource>/log</Resource>
    </WebService>
    <WebService id="query-service">
      <Plugin>QueryService</Plugin>
      <Resource>/query</Resource>
    </WebService>
  </Server>"#;

const SERVICES_WITHOUT_LOG: &str = r#"  <Server id="main-server">
    <Port>8888</Port>
  </Server>"#;

const PROTOCOLS: &str = r#"  <Protocol id="http">
    <Plugin>HTTPProtocol</Plugin>
    <Extract term="urn:vocab:clickstream#content-type">
      <Source>sc-header</Source>
      <Name>Content-Type</Name>
    </Extract>
  </Protocol>"#;

const VOCAB_INDEX: &str = r#"  <VocabularyConfig id="urn:vocab:clickstream">vocabularies/clickstream.xml</VocabularyConfig>"#;

const CLICKSTREAM: &str = r#"  <Vocabulary id="urn:vocab:clickstream">
    <Term id="urn:vocab:clickstream#content-type">
      <Type>string</Type>
    </Term>
    <Term id="urn:vocab:clickstream#new-page">
      <Type>uint32</Type>
    </Term>
    <Term id="urn:vocab:clickstream#tcp-status">
      <Type>uint8</Type>
      <Comment>TCP status</Comment>
    </Term>
  </Vocabulary>"#;

/// Write a complete bundle at `version` into a fresh temporary directory.
fn bundle_dir(version: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    fs::create_dir_all(root.join("vocabularies")).expect("mkdir");

    let files = [
        ("platform.xml", pion(version, PLATFORM)),
        ("codecs.xml", pion(version, "")),
        ("databases.xml", pion(version, "")),
        ("reactors.xml", pion(version, REACTORS)),
        ("services.xml", pion(version, SERVICES)),
        ("protocols.xml", pion(version, PROTOCOLS)),
        ("users.xml", pion(version, USERS)),
        ("vocabularies.xml", pion(version, VOCAB_INDEX)),
        ("vocabularies/clickstream.xml", pion(version, CLICKSTREAM)),
        // Shipped with 3.1.2 and not yet listed in the index.
        ("vocabularies/omniture.xml", pion("3.1.2", "")),
        ("robots.xml", rooted("RobotConfig", version)),
        ("SearchEngines.xml", rooted("SearchEngineConfig", version)),
        ("ReplayQueries.xml", rooted("ReplayTemplates", version)),
        ("dbengines.xml", rooted("DatabaseTemplates", version)),
    ];
    for (name, content) in files {
        fs::write(root.join(name), content).expect("write fixture");
    }
    dir
}

/// Every file under `dir`, keyed by relative path.
fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in fs::read_dir(dir).expect("read_dir") {
            let path = entry.expect("entry").path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let relative = path.strip_prefix(base).expect("prefix").to_path_buf();
                out.insert(relative, fs::read(&path).expect("read"));
            }
        }
    }
    let mut out = BTreeMap::new();
    walk(dir, dir, &mut out);
    out
}

fn read(dir: &Path, file: &str) -> String {
    fs::read_to_string(dir.join(file)).expect("read")
}

fn upgrader(options: RunOptions) -> Upgrader {
    Upgrader::with_builtin_rules(options).expect("builtin rules")
}

// =============================================================================
// UPGRADE
// =============================================================================

mod upgrade {
    use super::*;

    #[test]
    fn in_place_upgrade_reports_and_backs_up() {
        let dir = bundle_dir("3.0.5");
        let before = snapshot(dir.path());

        let report = upgrader(RunOptions::default())
            .run(dir.path())
            .expect("upgrade");

        assert_eq!(report.original_version.as_str(), "3.0.5");
        assert_eq!(report.final_version.as_str(), "3.1.2");
        assert_eq!(report.applied, vec![Version::new("3.1.2")]);
        let backup = dir.path().join("backup-3.0.5");
        assert_eq!(
            report.outcome,
            Outcome::Upgraded {
                backup_dir: Some(backup.clone()),
                output_dir: None,
            }
        );

        // Backups are byte-identical to the pre-upgrade files.
        for (relative, bytes) in &before {
            if relative == Path::new("vocabularies/omniture.xml") {
                continue;
            }
            let copy = fs::read(backup.join(relative)).expect("backup copy");
            assert_eq!(&copy, bytes, "backup of {}", relative.display());
        }
        assert!(!backup.join("vocabularies/omniture.xml").exists());
    }

    #[test]
    fn every_document_is_stamped() {
        let dir = bundle_dir("3.0.5");
        upgrader(RunOptions::default())
            .run(dir.path())
            .expect("upgrade");

        let bundle = Bundle::open(dir.path()).expect("reopen");
        assert_eq!(bundle.version().as_str(), "3.1.2");
        assert!(bundle.documents().all(|(_, d)| d.version().as_str() == "3.1.2"));
        assert!(bundle.vocabularies().all(|d| d.version().as_str() == "3.1.2"));
        assert!(bundle.vocabulary("urn:vocab:omniture").is_some());
    }

    #[test]
    fn documents_carry_the_new_content() {
        let dir = bundle_dir("3.0.5");
        upgrader(RunOptions::default())
            .run(dir.path())
            .expect("upgrade");

        let users = read(dir.path(), "users.xml");
        assert!(users.contains(r#"<Permission type="Admin"/>"#));
        assert!(users.contains(r#"<Permission type="ReplayService">"#));
        assert!(!users.contains("<Permit>"));

        let services = read(dir.path(), "services.xml");
        assert!(!services.contains("log-service"));
        assert!(services.contains(r#"<PlatformService id="monitor-service">"#));
        assert!(services.contains(r#"<PlatformService id="xml-log-service">"#));

        let reactors = read(dir.path(), "reactors.xml");
        assert!(reactors.contains("cs_content_type"));
        assert!(!reactors.contains("<Workspace>Default</Workspace>"));
        assert_eq!(reactors.matches("<Name>Default</Name>").count(), 1);

        let protocols = read(dir.path(), "protocols.xml");
        let cs = protocols
            .find("urn:vocab:clickstream#cs-content-type")
            .expect("cs-content-type extract");
        let plain = protocols
            .find("urn:vocab:clickstream#content-type")
            .expect("content-type extract");
        assert!(cs < plain);

        let index = read(dir.path(), "vocabularies.xml");
        assert!(index.contains("vocabularies/omniture.xml"));

        let clickstream = read(dir.path(), "vocabularies/clickstream.xml");
        assert!(clickstream.contains("urn:vocab:clickstream#refused"));
        assert!(clickstream.contains("TCP handshake status (0=OK, 1=RESET, 2=IGNORED)"));
        assert!(clickstream.starts_with("<?xml"));
        assert!(clickstream.ends_with('\n'));
    }

    #[test]
    fn auxiliary_documents_keep_their_roots() {
        let dir = bundle_dir("3.0.5");
        upgrader(RunOptions::default())
            .run(dir.path())
            .expect("upgrade");

        let robots = read(dir.path(), "robots.xml");
        assert!(robots.contains("<RobotConfig"));
        assert!(robots.contains(r#"pion_version="3.1.2""#));

        let bundle = Bundle::open(dir.path()).expect("reopen");
        for (kind, doc) in bundle.documents() {
            assert_eq!(doc.root_tag(), kind.root_tag(), "{}", kind.name());
        }
    }
}

// =============================================================================
// IDEMPOTENCE
// =============================================================================

mod idempotence {
    use super::*;

    #[test]
    fn second_run_changes_nothing() {
        let dir = bundle_dir("3.0.5");
        upgrader(RunOptions::default())
            .run(dir.path())
            .expect("first run");
        let after_first = snapshot(dir.path());

        let report = upgrader(RunOptions::default())
            .run(dir.path())
            .expect("second run");

        assert_eq!(report.outcome, Outcome::UpToDate);
        assert!(report.applied.is_empty());
        assert_eq!(report.final_version.as_str(), "3.1.2");
        assert_eq!(snapshot(dir.path()), after_first);
    }

    #[test]
    fn current_bundle_is_up_to_date() {
        let dir = bundle_dir("3.1.2");
        let before = snapshot(dir.path());

        let report = upgrader(RunOptions::default())
            .run(dir.path())
            .expect("run");

        assert!(!report.is_upgraded());
        assert_eq!(snapshot(dir.path()), before);
    }
}

// =============================================================================
// DRY RUN AND RELOCATION
// =============================================================================

mod outputs {
    use super::*;

    #[test]
    fn dry_run_touches_no_file() {
        let dir = bundle_dir("3.0.5");
        let before = snapshot(dir.path());

        let report = upgrader(RunOptions::default().with_dry_run(true))
            .run(dir.path())
            .expect("dry run");

        assert!(report.dry_run);
        assert!(report.is_upgraded());
        assert_eq!(report.final_version.as_str(), "3.1.2");
        assert_eq!(snapshot(dir.path()), before);
        assert!(!dir.path().join("backup-3.0.5").exists());
    }

    #[test]
    fn output_directory_receives_the_upgrade() {
        let dir = bundle_dir("3.0.5");
        let out = tempfile::tempdir().expect("tempdir");
        let target = out.path().join("upgraded");
        let before = snapshot(dir.path());

        let report = upgrader(RunOptions::default().with_output(Some(target.clone())))
            .run(dir.path())
            .expect("relocated upgrade");

        assert_eq!(
            report.outcome,
            Outcome::Upgraded {
                backup_dir: None,
                output_dir: Some(target.clone()),
            }
        );
        assert_eq!(snapshot(dir.path()), before);
        assert!(!dir.path().join("backup-3.0.5").exists());

        assert!(read(&target, "platform.xml").contains(r#"pion_version="3.1.2""#));
        assert!(read(&target, "dbengines.xml").contains("<DatabaseTemplates"));
        assert!(target.join("vocabularies/clickstream.xml").exists());
    }

    #[test]
    fn dry_run_with_output_creates_nothing() {
        let dir = bundle_dir("3.0.5");
        let out = tempfile::tempdir().expect("tempdir");
        let target = out.path().join("upgraded");

        upgrader(
            RunOptions::default()
                .with_dry_run(true)
                .with_output(Some(target.clone())),
        )
        .run(dir.path())
        .expect("dry run");

        assert!(!target.exists());
    }

    #[test]
    fn dry_run_applies_the_same_edits() {
        let dir = bundle_dir("3.0.5");
        let mut dry = Bundle::open(dir.path()).expect("open");
        let mut wet = Bundle::open(dir.path()).expect("open");

        let dry_applied = upgrader(RunOptions::default().with_dry_run(true))
            .apply(&mut dry)
            .expect("dry apply");
        let wet_applied = upgrader(RunOptions::default())
            .apply(&mut wet)
            .expect("apply");

        assert_eq!(dry_applied, wet_applied);
        assert_eq!(dry.version(), wet.version());

        // Workspace ids are fresh v4 uuids on every run.
        let uuid = Regex::new(
            r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        )
        .expect("regex");
        let masked = |bundle: &Bundle| -> Vec<String> {
            bundle
                .documents()
                .map(|(_, doc)| doc)
                .chain(bundle.vocabularies())
                .map(|doc| {
                    let xml = doc.tree().to_xml().expect("serialize");
                    let xml = String::from_utf8(xml).expect("utf8");
                    uuid.replace_all(&xml, "<uuid>").into_owned()
                })
                .collect()
        };

        let dry_xml = masked(&dry);
        assert_eq!(dry_xml, masked(&wet));
        assert!(dry_xml.iter().any(|xml| xml.contains("<uuid>")));
    }

    #[test]
    fn blocked_output_directory_writes_nothing() {
        let dir = bundle_dir("3.0.5");
        let out = tempfile::tempdir().expect("tempdir");
        let target = out.path().join("upgraded");
        fs::create_dir_all(&target).expect("mkdir");
        fs::write(target.join("vocabularies"), "in the way").expect("write");
        let before = snapshot(dir.path());

        let err = upgrader(RunOptions::default().with_output(Some(target.clone())))
            .run(dir.path())
            .expect_err("must fail");

        assert!(matches!(err, UpgradeError::Io { .. }));
        assert!(!target.join("platform.xml").exists());
        assert_eq!(
            fs::read_dir(&target).expect("read_dir").count(),
            1,
            "only the blocking file remains"
        );
        assert_eq!(snapshot(dir.path()), before);
    }
}

// =============================================================================
// FAILURES
// =============================================================================

mod failures {
    use super::*;

    #[test]
    fn missing_reference_is_unresolved() {
        let dir = bundle_dir("3.0.5");
        fs::remove_file(dir.path().join("codecs.xml")).expect("remove");

        let err = upgrader(RunOptions::default())
            .run(dir.path())
            .expect_err("must fail");

        assert!(matches!(
            &err,
            UpgradeError::UnresolvedReference { path, .. } if path.ends_with("codecs.xml")
        ));
        assert!(!dir.path().join("backup-3.0.5").exists());
    }

    #[test]
    fn missing_vocabulary_is_unresolved() {
        let dir = bundle_dir("3.0.5");
        fs::remove_file(dir.path().join("vocabularies/clickstream.xml")).expect("remove");

        let err = upgrader(RunOptions::default())
            .run(dir.path())
            .expect_err("must fail");
        assert!(matches!(err, UpgradeError::UnresolvedReference { .. }));
    }

    #[test]
    fn wrong_root_is_a_schema_mismatch() {
        let dir = bundle_dir("3.0.5");
        fs::write(
            dir.path().join("robots.xml"),
            format!(r#"<Robots xmlns="{NS}" pion_version="3.0.5"/>"#),
        )
        .expect("write");

        let err = Bundle::open(dir.path()).expect_err("must fail");
        assert!(matches!(err, UpgradeError::SchemaMismatch { .. }));
    }

    #[test]
    fn unversioned_document_is_rejected() {
        let dir = bundle_dir("3.0.5");
        fs::write(
            dir.path().join("users.xml"),
            format!(r#"<PionConfig xmlns="{NS}"/>"#),
        )
        .expect("write");

        let err = Bundle::open(dir.path()).expect_err("must fail");
        assert!(matches!(err, UpgradeError::MissingVersion { .. }));
    }

    #[test]
    fn missing_platform_field_is_reported() {
        let dir = bundle_dir("3.0.5");
        let platform = PLATFORM.replace("  <UserConfig>users.xml</UserConfig>\n", "");
        fs::write(dir.path().join("platform.xml"), pion("3.0.5", &platform)).expect("write");

        let err = Bundle::open(dir.path()).expect_err("must fail");
        assert!(matches!(
            &err,
            UpgradeError::MissingField { field, .. } if field == "UserConfig"
        ));
    }

    #[test]
    fn strict_run_fails_without_log_service() {
        let dir = bundle_dir("3.0.5");
        fs::write(
            dir.path().join("services.xml"),
            pion("3.0.5", SERVICES_WITHOUT_LOG),
        )
        .expect("write");
        let before = snapshot(dir.path());

        let err = upgrader(RunOptions::default().with_strictness(Strictness::Strict))
            .run(dir.path())
            .expect_err("strict must fail");

        assert!(matches!(
            &err,
            UpgradeError::TransformFailure { rule, .. } if rule == "3.1.2"
        ));
        assert_eq!(snapshot(dir.path()), before);
    }

    #[test]
    fn lenient_run_tolerates_missing_log_service() {
        let dir = bundle_dir("3.0.5");
        fs::write(
            dir.path().join("services.xml"),
            pion("3.0.5", SERVICES_WITHOUT_LOG),
        )
        .expect("write");

        upgrader(RunOptions::default())
            .run(dir.path())
            .expect("lenient upgrade");
        assert!(read(dir.path(), "services.xml").contains("monitor-service"));
    }

    /// Applies the real 3.1.2 edits, then fails.
    struct Sabotaged(Upgrade30xTo31x);

    impl UpgradeRule for Sabotaged {
        fn target_version(&self) -> &Version {
            self.0.target_version()
        }
        fn pattern(&self) -> &VersionPattern {
            self.0.pattern()
        }
        fn process(&self, bundle: &mut Bundle, options: &RunOptions) -> Result<(), UpgradeError> {
            self.0.process(bundle, options)?;
            Err(UpgradeError::Xml("disk full".to_string()))
        }
    }

    #[test]
    fn failed_rule_leaves_bundle_untouched() {
        let dir = bundle_dir("3.0.5");
        let before = snapshot(dir.path());

        let mut registry = RuleRegistry::new();
        registry.register(Sabotaged(Upgrade30xTo31x::new().expect("rule")));
        let err = Upgrader::new(registry, RunOptions::default())
            .run(dir.path())
            .expect_err("must fail");

        assert!(matches!(
            &err,
            UpgradeError::TransformFailure { reason, .. } if reason.contains("disk full")
        ));
        assert_eq!(snapshot(dir.path()), before);
        assert!(!dir.path().join("backup-3.0.5").exists());
    }
}
