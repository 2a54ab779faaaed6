//! End-to-end checks of the architecture lint against source trees on disk.

use std::path::Path;

use architecture_lint::{ArchitectureLintError, Violation, lint_backend_sources};
use cap_std::{ambient_authority, fs::Dir};
use rstest::{fixture, rstest};
use tempfile::TempDir;

const VALID_DOMAIN: &str = "use crate::domain::ports::SessionSource; pub struct Store;";
const VALID_INBOUND: &str = "use crate::domain::SessionStore; pub fn run(_: &SessionStore) {}";
const VALID_OUTBOUND: &str =
    "use crate::domain::ports::SessionSource; use reqwest::Client; pub struct Source(Client);";

/// Temporary `backend/` directory with a `src/` tree.
struct Backend {
    root: TempDir,
}

impl Backend {
    fn write(&self, relative: &str, contents: &str) {
        let src = self.root.path().join("src");
        let path = Path::new(relative);
        let dir = Dir::open_ambient_dir(&src, ambient_authority()).expect("open src");
        if let Some(parent) = path.parent() {
            dir.create_dir_all(parent).expect("create layer dirs");
        }
        dir.write(path, contents).expect("write source");
    }

    fn lint(&self) -> Result<(), ArchitectureLintError> {
        lint_backend_sources(self.root.path())
    }
}

#[fixture]
fn backend() -> Backend {
    let root = TempDir::new().expect("tempdir");
    Dir::open_ambient_dir(root.path(), ambient_authority())
        .and_then(|dir| dir.create_dir("src"))
        .expect("create src");
    let backend = Backend { root };
    backend.write("domain/session_store/mod.rs", VALID_DOMAIN);
    backend.write("inbound/cli/app.rs", VALID_INBOUND);
    backend.write("outbound/hosted/session_source.rs", VALID_OUTBOUND);
    backend.write("lib.rs", "pub mod domain;");
    backend.write("outbound/hosted/README.md", "not rust");
    backend
}

fn violations(result: Result<(), ArchitectureLintError>) -> Vec<Violation> {
    match result {
        Err(ArchitectureLintError::Violations(found)) => found,
        other => panic!("expected violations, got {other:?}"),
    }
}

#[rstest]
fn clean_tree_passes(backend: Backend) {
    backend.lint().expect("clean tree");
}

#[rstest]
fn every_violation_is_reported_with_its_file(backend: Backend) {
    backend.write(
        "inbound/cli/bad.rs",
        "use portal::outbound::hosted::HostedClient; fn f() {}",
    );
    backend.write(
        "domain/bad.rs",
        "use reqwest::Client; use crate::inbound::cli::Cli; fn f() {}",
    );
    backend.write("outbound/hosted/bad.rs", "fn f() { let _ = std::fs::read(\"x\"); }");

    let mut found: Vec<String> = violations(backend.lint())
        .iter()
        .map(ToString::to_string)
        .collect();
    found.sort();
    assert_eq!(
        found,
        [
            "domain/bad.rs: domain module must not depend on crate::inbound",
            "domain/bad.rs: domain module must not depend on external crate `reqwest`",
            "inbound/cli/bad.rs: inbound module must not depend on crate::outbound",
            "outbound/hosted/bad.rs: outbound module must use cap_std instead of `std::fs`",
        ]
    );
}

#[rstest]
fn unparsable_sources_fail_with_the_file_name(backend: Backend) {
    backend.write("domain/broken.rs", "fn (");
    let err = backend.lint().expect_err("parse failure");
    assert!(
        matches!(&err, ArchitectureLintError::Parse { file, .. } if file.ends_with("broken.rs")),
        "{err}"
    );
}

#[rstest]
fn missing_source_directory_is_an_io_error() {
    let root = TempDir::new().expect("tempdir");
    let err = lint_backend_sources(root.path()).expect_err("no src");
    assert!(matches!(err, ArchitectureLintError::Io(_)));
}
