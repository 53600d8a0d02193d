//! Orchestration scenarios over in-memory packages

use pretty_assertions::assert_eq;
use rstest::rstest;
use stanza_build::{
    resolve, BaseEnvironment, BuildError, CancelToken, Define, Environment, FileLister,
    LinkMode, MemoryLister, Orchestrator, OrchestratorConfig, Outcome, PackageDescriptor,
    PackageError, Registry, Report, TargetKind, TargetType,
};
use stanza_config::FileSelector;
use std::io;
use std::path::{Path, PathBuf};

fn lib(name: &str, deps: &[&str]) -> PackageDescriptor {
    PackageDescriptor::new(name, TargetType::LibraryShared)
        .with_root(name)
        .with_sources(["*.cpp"])
        .with_dependencies(deps.iter().copied())
}

/// One `<name>/<name>.cpp` source per package
fn sources_for(names: &[&str]) -> MemoryLister {
    MemoryLister::new().with_files(names.iter().map(|n| format!("{}/{}.cpp", n, n)))
}

fn run(packages: &[PackageDescriptor], lister: &MemoryLister) -> (Report, Registry) {
    let factory = BaseEnvironment::default();
    let mut registry = Registry::new();
    let report = Orchestrator::new(&factory, lister)
        .run(packages, &mut registry)
        .unwrap();
    (report, registry)
}

fn environment_of<'r>(registry: &'r Registry, name: &str) -> &'r Environment {
    &registry
        .get(name)
        .and_then(|entry| entry.target.as_ref())
        .unwrap()
        .environment
}

// ============================================================================
// Ordering
// ============================================================================

#[rstest]
#[case(vec![lib("A", &[]), lib("B", &["A"]), lib("C", &["B"])])]
#[case(vec![lib("C", &["B"]), lib("B", &["A"]), lib("A", &[])])]
#[case(vec![
    lib("app", &["net", "log"]),
    lib("net", &["core"]),
    lib("log", &["core"]),
    lib("core", &[]),
    lib("extra", &["log"]),
])]
#[case(vec![lib("x", &[]), lib("y", &[]), lib("z", &["x", "y"])])]
fn test_order_places_dependencies_first(#[case] packages: Vec<PackageDescriptor>) {
    let order = resolve(&packages).unwrap();
    assert_eq!(order.len(), packages.len());

    for (position, package) in order.iter().enumerate() {
        for dep in &package.link_dependencies {
            let dep_position = order.iter().position(|p| &p.name == dep).unwrap();
            assert!(
                dep_position < position,
                "{} must come before {}",
                dep,
                package.name
            );
        }
    }
}

#[test]
fn test_chain_scenario() {
    let packages = vec![
        PackageDescriptor::new("A", TargetType::LibraryShared)
            .with_root("A")
            .with_sources(["a.cpp"]),
        PackageDescriptor::new("B", TargetType::LibraryShared)
            .with_root("B")
            .with_sources(["b.cpp"])
            .with_dependencies(["A"])
            .with_public_includes(["b.h"]),
        PackageDescriptor::new("C", TargetType::LibraryShared)
            .with_root("C")
            .with_sources(["c.cpp"])
            .with_dependencies(["B"]),
    ];
    let lister = MemoryLister::new().with_files(["A/a.cpp", "B/b.cpp", "C/c.cpp"]);

    let (report, registry) = run(&packages, &lister);

    assert_eq!(report.succeeded, vec!["A", "B", "C"]);
    assert!(environment_of(&registry, "C").has_include("b.h"));
    assert!(!environment_of(&registry, "A").has_include("b.h"));
}

#[rstest]
#[case(vec![lib("A", &["B"]), lib("B", &["A"])], vec!["A", "B"])]
#[case(vec![lib("A", &["A"])], vec!["A"])]
#[case(vec![lib("root", &["A"]), lib("A", &["B"]), lib("B", &["C"]), lib("C", &["A"])], vec!["A", "B", "C"])]
fn test_cycles_are_fatal(#[case] packages: Vec<PackageDescriptor>, #[case] expected: Vec<&str>) {
    let factory = BaseEnvironment::default();
    let lister = sources_for(&["A", "B", "C", "root"]);
    let mut registry = Registry::new();

    let err = Orchestrator::new(&factory, &lister)
        .run(&packages, &mut registry)
        .unwrap_err();

    match &err {
        BuildError::Cycle { cycle } => assert_eq!(cycle, &expected),
        other => panic!("Expected Cycle error, got {:?}", other),
    }
    assert!(registry.is_empty());
}

#[test]
fn test_cycle_message_names_the_loop() {
    let packages = vec![lib("A", &["B"]), lib("B", &["A"])];
    let err = resolve(&packages).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Circular dependency detected: A -> B -> A"
    );
}

// ============================================================================
// Settings propagation
// ============================================================================

#[test]
fn test_public_defines_are_transitive_private_are_not() {
    let packages = vec![
        lib("C", &[]).with_public_defines(["X"]).with_private_defines(["Y"]),
        lib("B", &["C"]),
        lib("A", &["B"]),
    ];
    let lister = sources_for(&["A", "B", "C"]);

    let (_, registry) = run(&packages, &lister);

    assert!(environment_of(&registry, "A").has_define("X"));
    assert!(!environment_of(&registry, "A").has_define("Y"));
    assert!(!environment_of(&registry, "B").has_define("Y"));
    assert!(environment_of(&registry, "C").has_define("Y"));
}

#[test]
fn test_implementation_marker_stays_with_its_library() {
    let packages = vec![lib("CoastFoundation", &[]), lib("CoastEBCDIC", &["CoastFoundation"])];
    let lister = sources_for(&["CoastFoundation", "CoastEBCDIC"]);

    let (_, registry) = run(&packages, &lister);

    let ebcdic = environment_of(&registry, "CoastEBCDIC");
    assert!(ebcdic.has_define("COASTEBCDIC_IMPL"));
    assert!(!ebcdic.has_define("COASTFOUNDATION_IMPL"));
}

#[test]
fn test_later_declared_dependency_wins() {
    let packages = vec![
        lib("A", &[]).with_public_defines(["X=1"]),
        lib("D", &[]).with_public_defines(["X=2"]),
        lib("B", &["A", "D"]),
        lib("C", &["A"]),
    ];
    let lister = sources_for(&["A", "B", "C", "D"]);

    let (report, registry) = run(&packages, &lister);

    assert!(report.is_success());
    assert_eq!(environment_of(&registry, "B").define_value("X"), Some(Some("2")));
    assert_eq!(environment_of(&registry, "C").define_value("X"), Some(Some("1")));
}

#[test]
fn test_reexporting_package_keeps_its_own_value() {
    let packages = vec![
        lib("A", &[]).with_public_defines(["X=1"]),
        lib("D", &["A"]).with_public_defines(["X=2"]),
        lib("B", &["A", "D"]),
    ];
    let lister = sources_for(&["A", "B", "D"]);

    let (report, registry) = run(&packages, &lister);

    assert!(report.is_success());
    assert_eq!(environment_of(&registry, "D").define_value("X"), Some(Some("2")));
    assert_eq!(environment_of(&registry, "B").define_value("X"), Some(Some("2")));
}

#[test]
fn test_link_order_follows_dependencies() {
    let packages = vec![
        lib("core", &[]),
        lib("net", &["core"]),
        lib("log", &["core"]),
        lib("app", &["net", "log"]).with_lazy_linking(true),
    ];
    let lister = sources_for(&["core", "net", "log", "app"]);

    let (_, registry) = run(&packages, &lister);

    let app = registry.get("app").and_then(|e| e.target.as_ref()).unwrap();
    let names: Vec<&str> = app.link_order.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["net", "core", "log"]);
    assert!(app.link_order.iter().all(|l| l.mode == LinkMode::RunTime));
}

// ============================================================================
// Failure isolation
// ============================================================================

#[test]
fn test_empty_target_degrades_dependents() {
    let packages = vec![
        PackageDescriptor::new("A", TargetType::LibraryShared).with_root("A"),
        lib("B", &["A"]),
        lib("E", &[]),
    ];
    let lister = sources_for(&["B", "E"]);

    let (report, registry) = run(&packages, &lister);

    assert_eq!(
        report.failed["A"],
        PackageError::EmptyTarget {
            package: "A".to_string(),
            patterns: vec![],
        }
    );
    assert_eq!(report.outcome("B"), Some(Outcome::Succeeded));
    assert_eq!(report.degraded["B"], vec!["A"]);
    assert_eq!(report.outcome("E"), Some(Outcome::Succeeded));
    assert!(!report.is_degraded("E"));
    assert_ne!(report.exit_code(), 0);
    assert!(registry.contains("B"));
    assert!(!registry.contains("A"));
}

#[test]
fn test_configuration_errors_are_recorded() {
    let packages = vec![
        lib("CoastFoundation", &[]),
        PackageDescriptor::new("tool", TargetType::Program)
            .with_root("tool")
            .with_sources(["*.cpp"]),
        lib("plugin", &["tool"]),
        PackageDescriptor::new("foundationTest", TargetType::ProgramTest)
            .with_root("foundationTest")
            .with_sources(["*.cpp"])
            .with_dependencies(["CoastFoundation"]),
    ];
    let lister = sources_for(&["CoastFoundation", "tool", "plugin", "foundationTest"]);

    let (report, _) = run(&packages, &lister);

    assert_eq!(report.succeeded, vec!["CoastFoundation", "tool"]);
    assert!(matches!(
        report.failed["plugin"],
        PackageError::Configuration { .. }
    ));
    assert!(matches!(
        report.failed["foundationTest"],
        PackageError::Configuration { .. }
    ));
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_registration_only_package_registers_fixtures() {
    let packages = vec![
        PackageDescriptor::new("FoundationData", TargetType::None)
            .with_root("data")
            .with_auxiliary(stanza_build::AuxiliaryRule {
                selector: FileSelector::Patterns {
                    patterns: vec!["*.txt".to_string()],
                },
                mode: 0o444,
            }),
        lib("testfw", &[]),
        PackageDescriptor::new("foundationTest", TargetType::ProgramTest)
            .with_root("foundationTest")
            .with_sources(["*.cpp"])
            .with_dependencies(["testfw", "FoundationData"]),
    ];
    let lister = sources_for(&["testfw", "foundationTest"]).with_files(["data/input.txt"]);

    let (report, registry) = run(&packages, &lister);

    assert!(report.is_success());
    let data = registry.get("FoundationData").unwrap();
    assert!(data.target.is_none());
    assert_eq!(data.auxiliary[0].path, PathBuf::from("data/input.txt"));
    assert_eq!(data.auxiliary[0].mode, Some(0o444));

    let apps: Vec<&str> = registry.test_apps().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(apps, vec!["foundationTest"]);
    assert_eq!(
        registry.get("foundationTest").and_then(|e| e.target.as_ref()).unwrap().kind,
        TargetKind::TestProgram
    );
}

#[test]
fn test_rerun_over_same_registry_overwrites() {
    let packages = vec![lib("A", &[]), lib("B", &["A"])];
    let factory = BaseEnvironment::default();
    let lister = sources_for(&["A", "B"]);
    let orchestrator = Orchestrator::new(&factory, &lister);
    let mut registry = Registry::new();

    let first = orchestrator.run(&packages, &mut registry).unwrap();
    let snapshot = registry.clone();
    let second = orchestrator.run(&packages, &mut registry).unwrap();

    assert_eq!(first, second);
    assert_eq!(registry, snapshot);
    assert_eq!(registry.len(), 2);
}

// ============================================================================
// Determinism and parallelism
// ============================================================================

fn mixed_workspace() -> (Vec<PackageDescriptor>, MemoryLister) {
    let packages = vec![
        lib("app", &["net", "log"]).with_public_defines(["APP"]),
        lib("net", &["core"]).with_public_includes(["net/net.h"]),
        lib("log", &["core"]).with_public_defines(["LOG_LEVEL=2"]),
        lib("core", &[]).with_public_defines(["LOG_LEVEL=1"]),
        lib("broken", &["core"]),
        lib("downstream", &["broken", "log"]),
        lib("testfw", &["core"]).with_lazy_linking(true),
        PackageDescriptor::new("coreTest", TargetType::ProgramTest)
            .with_root("coreTest")
            .with_sources(["*.cpp"])
            .with_dependencies(["testfw"]),
    ];
    let lister = sources_for(&["app", "net", "log", "core", "downstream", "testfw", "coreTest"]);
    (packages, lister)
}

#[test]
fn test_runs_are_bit_identical() {
    let (packages, lister) = mixed_workspace();

    let (first_report, first_registry) = run(&packages, &lister);
    let (second_report, second_registry) = run(&packages, &lister);

    assert_eq!(first_report, second_report);
    assert_eq!(
        serde_json::to_string(&first_report).unwrap(),
        serde_json::to_string(&second_report).unwrap()
    );
    assert_eq!(
        first_registry.fingerprint().unwrap(),
        second_registry.fingerprint().unwrap()
    );
}

#[test]
fn test_parallel_run_matches_sequential() {
    let (packages, lister) = mixed_workspace();
    let factory = BaseEnvironment::new(
        Environment::new().with_define(&Define::parse("PS_OS=linux")),
    );

    let mut sequential = Registry::new();
    let seq_report = Orchestrator::new(&factory, &lister)
        .run(&packages, &mut sequential)
        .unwrap();

    let mut parallel = Registry::new();
    let par_report = Orchestrator::new(&factory, &lister)
        .with_config(OrchestratorConfig {
            parallel: true,
            ..OrchestratorConfig::default()
        })
        .run(&packages, &mut parallel)
        .unwrap();

    assert_eq!(seq_report, par_report);
    assert_eq!(sequential.to_json().unwrap(), parallel.to_json().unwrap());
    assert_eq!(par_report.degraded["downstream"], vec!["broken"]);
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cancels the run while listing files of one package
struct CancellingLister {
    inner: MemoryLister,
    token: CancelToken,
    trigger: PathBuf,
}

impl FileLister for CancellingLister {
    fn list_files(&self, root: &Path, patterns: &[String]) -> io::Result<Vec<PathBuf>> {
        if root == self.trigger {
            self.token.cancel();
        }
        self.inner.list_files(root, patterns)
    }

    fn find_files(
        &self,
        root: &Path,
        dirs: &[String],
        extensions: &[String],
    ) -> io::Result<Vec<PathBuf>> {
        self.inner.find_files(root, dirs, extensions)
    }
}

#[test]
fn test_cancel_stops_after_current_package() {
    let packages = vec![lib("A", &[]), lib("B", &["A"]), lib("C", &["B"])];
    let token = CancelToken::new();
    let lister = CancellingLister {
        inner: sources_for(&["A", "B", "C"]),
        token: token.clone(),
        trigger: PathBuf::from("B"),
    };
    let factory = BaseEnvironment::default();
    let mut registry = Registry::new();

    let report = Orchestrator::new(&factory, &lister)
        .with_cancel_token(token)
        .run(&packages, &mut registry)
        .unwrap();

    // B was in flight when cancelled and still completes
    assert_eq!(report.succeeded, vec!["A", "B"]);
    assert_eq!(report.skipped, vec!["C"]);
    assert_eq!(report.exit_code(), 1);
    assert!(!registry.contains("C"));
}

#[test]
fn test_cancel_in_parallel_stops_before_next_wave() {
    let packages = vec![lib("A", &[]), lib("B", &[]), lib("C", &["A"])];
    let token = CancelToken::new();
    let lister = CancellingLister {
        inner: sources_for(&["A", "B", "C"]),
        token: token.clone(),
        trigger: PathBuf::from("B"),
    };
    let factory = BaseEnvironment::default();
    let mut registry = Registry::new();

    let report = Orchestrator::new(&factory, &lister)
        .with_config(OrchestratorConfig {
            parallel: true,
            ..OrchestratorConfig::default()
        })
        .with_cancel_token(token)
        .run(&packages, &mut registry)
        .unwrap();

    assert_eq!(report.succeeded, vec!["A", "B"]);
    assert_eq!(report.skipped, vec!["C"]);
}
