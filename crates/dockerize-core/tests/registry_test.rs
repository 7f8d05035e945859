use dockerize_core::{ArtifactKind, Registry, RegistryError, StackId};

/// A one-stack registry whose templates and extra declarations are supplied
/// by the test.
fn single_stack(variables: &str, manifest: &str) -> String {
    format!(
        r##"
[[stack]]
id = "nodejs"
priority = 10
markers = [{{ exists = "package.json" }}]
default_port = 3000
build_command = "npm run build"
start_command = "node server.js"
{variables}

[[template_set]]
stack = "nodejs"
build_recipe = {{ path = "Dockerfile", template = "FROM node\nEXPOSE ${{PORT}}\n" }}
manifest = {{ path = "coolify.env", template = "{manifest}" }}
entrypoint = {{ path = "docker-entrypoint.sh", template = "#!/bin/sh\nexec \"$@\"\n" }}
"##
    )
}

fn load(content: &str) -> Result<Registry, RegistryError> {
    Registry::from_toml_str(content, "test")
}

// ── Valid registries ──

#[test]
fn single_stack_loads() {
    let registry = load(&single_stack("", "PORT=${PORT}")).unwrap();
    assert_eq!(registry.stack_ids(), ["nodejs"]);

    let set = registry.template_set(&StackId::new("nodejs")).unwrap();
    let kinds: Vec<_> = set.artifacts().map(|(k, _)| k).collect();
    assert_eq!(kinds, ArtifactKind::ALL);
}

#[test]
fn profiles_sorted_by_priority_not_file_order() {
    let content = r#"
[[stack]]
id = "late"
priority = 90
markers = [{ exists = "b" }, { absent = "a" }]
default_port = 1
build_command = "true"
start_command = "true"

[[stack]]
id = "early"
priority = 5
markers = [{ exists = "a" }]
default_port = 1
build_command = "true"
start_command = "true"

[[template_set]]
stack = "late"
build_recipe = { path = "Dockerfile", template = "" }
manifest = { path = "env", template = "" }
entrypoint = { path = "entry.sh", template = "" }

[[template_set]]
stack = "early"
build_recipe = { path = "Dockerfile", template = "" }
manifest = { path = "env", template = "" }
entrypoint = { path = "entry.sh", template = "" }
"#;
    let registry = load(content).unwrap();
    assert_eq!(registry.stack_ids(), ["early", "late"]);
}

#[test]
fn cur_dir_marker_paths_count_as_the_same_file() {
    let content = r#"
[[stack]]
id = "php-laravel"
priority = 10
markers = [{ exists = "./composer.json" }]
default_port = 8080
build_command = "true"
start_command = "true"

[[stack]]
id = "static-site"
priority = 20
markers = [{ exists = "index.html" }, { absent = "composer.json" }]
default_port = 80
build_command = "true"
start_command = "true"

[[template_set]]
stack = "php-laravel"
build_recipe = { path = "Dockerfile", template = "" }
manifest = { path = "env", template = "" }
entrypoint = { path = "entry.sh", template = "" }

[[template_set]]
stack = "static-site"
build_recipe = { path = "Dockerfile", template = "" }
manifest = { path = "env", template = "" }
entrypoint = { path = "entry.sh", template = "" }
"#;
    let registry = load(content).unwrap();
    assert_eq!(registry.stack_ids(), ["php-laravel", "static-site"]);

    let contradictory = single_stack("", "").replace(
        r#"[{ exists = "package.json" }]"#,
        r#"[{ exists = "./package.json" }, { absent = "package.json" }]"#,
    );
    assert!(matches!(
        load(&contradictory).unwrap_err(),
        RegistryError::ContradictoryMarkers { .. }
    ));
}

#[test]
fn shared_variables_are_merged_into_stacks() {
    let content = format!(
        "[variables.COOLIFY_FQDN]\nrequired = true\n{}",
        single_stack("", "HOST=${COOLIFY_FQDN}")
    );
    let registry = load(&content).unwrap();
    let profile = registry.profile(&StackId::new("nodejs")).unwrap();
    assert!(profile.variables["COOLIFY_FQDN"].required);
}

#[test]
fn unknown_stack_lookup_lists_known_stacks() {
    let registry = Registry::builtin().unwrap();
    let err = registry.template_set(&StackId::new("cobol")).unwrap_err();
    assert_eq!(err.stack, StackId::new("cobol"));
    let msg = err.to_string();
    assert!(msg.contains("cobol"), "got: {msg}");
    assert!(msg.contains("nodejs"), "got: {msg}");
}

// ── Load-time errors ──

#[test]
fn undeclared_placeholder_rejected() {
    let err = load(&single_stack("", "DATABASE_URL=${DATABASE_URL}")).unwrap_err();
    match err {
        RegistryError::UndeclaredPlaceholder {
            stack,
            artifact,
            placeholder,
        } => {
            assert_eq!(stack.as_str(), "nodejs");
            assert_eq!(artifact, "manifest");
            assert_eq!(placeholder, "DATABASE_URL");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn cyclic_defaults_rejected() {
    let vars = r#"
[stack.variables.A]
default = "${B}"
[stack.variables.B]
default = "x-${A}"
"#;
    let err = load(&single_stack(vars, "A=${A}")).unwrap_err();
    match err {
        RegistryError::CyclicDefault { cycle, .. } => {
            assert_eq!(cycle, ["A", "B", "A"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn default_referencing_undeclared_variable_rejected() {
    let vars = r#"
[stack.variables.APP_URL]
default = "https://${COOLIFY_FQDN}"
"#;
    let err = load(&single_stack(vars, "APP_URL=${APP_URL}")).unwrap_err();
    assert!(
        matches!(err, RegistryError::UnknownDefaultReference { ref reference, .. } if reference == "COOLIFY_FQDN"),
        "got: {err}"
    );
}

#[test]
fn command_placeholders_must_be_declared() {
    let content = single_stack("", "").replace("node server.js", "node ${ENTRY}");
    let err = load(&content).unwrap_err();
    assert!(
        matches!(err, RegistryError::UnknownDefaultReference { ref variable, .. } if variable == "START_COMMAND"),
        "got: {err}"
    );
}

#[test]
fn overlapping_markers_rejected() {
    let content = r#"
[[stack]]
id = "nodejs"
priority = 10
markers = [{ exists = "package.json" }]
default_port = 3000
build_command = "true"
start_command = "true"

[[stack]]
id = "php-laravel"
priority = 20
markers = [{ exists = "composer.json" }]
default_port = 8080
build_command = "true"
start_command = "true"
"#;
    let err = load(content).unwrap_err();
    match err {
        RegistryError::AmbiguousMarkers { first, second } => {
            assert_eq!(first.as_str(), "nodejs");
            assert_eq!(second.as_str(), "php-laravel");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn contradictory_markers_rejected() {
    let content = single_stack("", "").replace(
        r#"[{ exists = "package.json" }]"#,
        r#"[{ exists = "package.json" }, { absent = "package.json" }]"#,
    );
    assert!(matches!(
        load(&content).unwrap_err(),
        RegistryError::ContradictoryMarkers { .. }
    ));
}

#[test]
fn empty_markers_rejected() {
    let content = single_stack("", "").replace(r#"[{ exists = "package.json" }]"#, "[]");
    assert!(matches!(load(&content).unwrap_err(), RegistryError::NoMarkers(_)));
}

#[test]
fn absolute_marker_path_rejected() {
    let content = single_stack("", "").replace("\"package.json\"", "\"/etc/passwd\"");
    assert!(matches!(
        load(&content).unwrap_err(),
        RegistryError::InvalidMarkerPath { .. }
    ));
}

#[test]
fn missing_template_set_rejected() {
    let content = single_stack("", "");
    let without_set = content.split("[[template_set]]").next().unwrap();
    assert!(matches!(
        load(without_set).unwrap_err(),
        RegistryError::MissingTemplateSet(_)
    ));
}

#[test]
fn orphan_and_duplicate_template_sets_rejected() {
    let content = single_stack("", "");
    let set = content.split_once("[[template_set]]").unwrap().1;

    let orphan = format!("{content}\n[[template_set]]{}", set.replace("\"nodejs\"", "\"ghost\""));
    assert!(matches!(
        load(&orphan).unwrap_err(),
        RegistryError::OrphanTemplateSet(_)
    ));

    let duplicate = format!("{content}\n[[template_set]]{set}");
    assert!(matches!(
        load(&duplicate).unwrap_err(),
        RegistryError::DuplicateTemplateSet(_)
    ));
}

#[test]
fn duplicate_stack_and_priority_rejected() {
    let content = single_stack("", "");
    let stack = content.split("[[template_set]]").next().unwrap();

    let duplicate = format!("{content}\n{stack}");
    assert!(matches!(
        load(&duplicate).unwrap_err(),
        RegistryError::DuplicateStack(_)
    ));

    let same_priority = format!(
        "{content}\n{}",
        stack
            .replace("\"nodejs\"", "\"other\"")
            .replace(r#"{ exists = "package.json" }"#, r#"{ absent = "package.json" }"#)
    );
    assert!(matches!(
        load(&same_priority).unwrap_err(),
        RegistryError::DuplicatePriority { priority: 10, .. }
    ));
}

#[test]
fn artifact_path_escaping_destination_rejected() {
    let content = single_stack("", "").replace("\"coolify.env\"", "\"../coolify.env\"");
    assert!(matches!(
        load(&content).unwrap_err(),
        RegistryError::InvalidArtifactPath { .. }
    ));
}

#[test]
fn duplicate_artifact_path_rejected() {
    let content = single_stack("", "").replace("\"coolify.env\"", "\"./Dockerfile\"");
    assert!(matches!(
        load(&content).unwrap_err(),
        RegistryError::DuplicateArtifactPath { .. }
    ));
}

#[test]
fn unknown_fields_rejected_as_parse_error() {
    let content = single_stack("", "").replace("priority = 10", "priority = 10\npriorty = 3");
    let err = load(&content).unwrap_err();
    assert!(matches!(err, RegistryError::Parse { .. }));
    assert!(err.to_string().contains("test"));
}

#[test]
fn load_reads_registry_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("stacks.toml");
    std::fs::write(&path, single_stack("", "PORT=${PORT}")).unwrap();
    assert_eq!(Registry::load(&path).unwrap().stack_ids(), ["nodejs"]);
}

// ── Exclusivity of the built-in registry ──

mod proptests {
    use std::collections::BTreeSet;

    use dockerize_core::{FileOracle, MemoryOracle, Registry, detect};
    use proptest::prelude::*;

    /// Every path any built-in marker mentions, plus noise.
    fn universe() -> Vec<String> {
        let registry = Registry::builtin().unwrap();
        let mut paths: BTreeSet<String> = registry
            .profiles()
            .iter()
            .flat_map(|p| p.markers.iter())
            .map(|m| m.path().display().to_string())
            .collect();
        paths.insert("README.md".to_owned());
        paths.insert("turbo.json".to_owned());
        paths.into_iter().collect()
    }

    proptest! {
        #[test]
        fn at_most_one_builtin_profile_matches(mask in proptest::collection::vec(any::<bool>(), 16)) {
            let registry = Registry::builtin().unwrap();
            let files: Vec<String> = universe()
                .into_iter()
                .zip(mask)
                .filter_map(|(p, keep)| keep.then_some(p))
                .collect();
            let oracle = MemoryOracle::new(files.iter().map(String::as_str));

            let matching: Vec<&str> = registry
                .profiles()
                .iter()
                .filter(|p| p.matches(&oracle as &dyn FileOracle))
                .map(|p| p.id.as_str())
                .collect();
            prop_assert!(matching.len() <= 1, "files {:?} matched {:?}", files, matching);

            match detect(&registry, &oracle) {
                Ok(profile) => prop_assert_eq!(vec![profile.id.as_str()], matching),
                Err(_) => prop_assert!(matching.is_empty()),
            }
        }
    }
}
