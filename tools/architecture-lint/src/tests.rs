//! Unit tests for the architecture lint.

use std::path::PathBuf;

use rstest::rstest;

use super::*;

fn lint_one(file: &str, contents: &str) -> Result<(), ArchitectureLintError> {
    lint_sources(&[LintSource {
        file: PathBuf::from(file),
        contents: contents.to_owned(),
    }])
}

#[rstest]
#[case(
    "inbound/cli/app.rs",
    "use crate::domain::SessionStore; fn run(store: &SessionStore) { let _ = store.state(); }",
    true
)]
#[case(
    "inbound/cli/sheet_file.rs",
    "use cap_std::fs::Dir; fn open() { let _ = Dir::open_ambient_dir; }",
    true
)]
#[case(
    "inbound/cli/app.rs",
    "use crate::outbound::hosted::HostedClient; fn run() { let _ = HostedClient::new; }",
    false
)]
#[case(
    "inbound/cli/app.rs",
    "use portal::outbound::completion::HttpCompletionSource; fn run() {}",
    false
)]
#[case(
    "inbound/cli/app.rs",
    "use super::super::outbound::hosted; fn run() {}",
    false
)]
#[case("inbound/cli/app.rs", "fn run() { let _ = reqwest::Client::new(); }", false)]
#[case(
    "domain/session_store/mod.rs",
    "use crate::inbound::cli::Cli; fn thing() { let _ = 1; }",
    false
)]
#[case(
    "domain/role.rs",
    "use crate::settings::PortalSettings; fn thing() { let _ = 1; }",
    false
)]
#[case("domain/manuscript.rs", "use url::Url; struct Link(Url);", false)]
#[case(
    "domain/catalogue_service.rs",
    "use tracing::info; use mockable::Clock; fn thing() { info!(\"ok\"); }",
    true
)]
#[case(
    "outbound/hosted/client.rs",
    "use crate::inbound::cli::Command; fn thing() { let _ = 1; }",
    false
)]
#[case(
    "outbound/hosted/client.rs",
    "use reqwest::Client; use crate::domain::ports::SessionSource; fn thing() {}",
    true
)]
#[case("outbound/completion/dto.rs", "use clap::Parser; fn thing() {}", false)]
#[case(
    "inbound/cli/sheet_file.rs",
    "fn read() { let _ = std::fs::read_to_string(\"sheet.json\"); }",
    false
)]
#[case("domain/manuscript_sheet.rs", "use std::fs; fn thing() {}", false)]
fn detects_boundary_violations(#[case] file: &str, #[case] contents: &str, #[case] ok: bool) {
    let result = lint_one(file, contents);
    assert_eq!(result.is_ok(), ok, "result: {result:?}");
}

#[rstest]
fn reports_each_rule_once_per_file() {
    let err = lint_one(
        "domain/role.rs",
        "use crate::outbound::hosted; use crate::outbound::completion; fn f() { let _ = crate::outbound::hosted::HostedClient::new; }",
    )
    .expect_err("violation");
    let ArchitectureLintError::Violations(violations) = err else {
        panic!("expected violations, got {err}");
    };
    assert_eq!(
        violations,
        vec![Violation {
            file: PathBuf::from("domain/role.rs"),
            message: "domain module must not depend on crate::outbound".to_owned(),
        }]
    );
}

#[rstest]
fn rejects_files_outside_the_layers() {
    let err = lint_one("settings.rs", "fn f() {}").expect_err("unknown layer");
    assert!(matches!(err, ArchitectureLintError::Parse { .. }));
}

#[rstest]
#[case(&["std", "fs", "read"], Some("std::fs"))]
#[case(&["std", "fs"], Some("std::fs"))]
#[case(&["std", "io"], None)]
#[case(&["cap_std", "fs", "Dir"], None)]
fn std_fs_paths_are_flagged(#[case] segments: &[&str], #[case] expected: Option<&str>) {
    let segments: Vec<String> = segments.iter().map(|segment| (*segment).to_owned()).collect();
    assert_eq!(forbidden_std_path(&segments).as_deref(), expected);
}
